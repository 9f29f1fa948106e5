//! Interactive terminal chat.
//!
//! Drives one `ConnectionSupervisor` from a readline prompt: typed lines are
//! sent to the room, slash commands control the session, and supervisor
//! events are printed above the prompt. Entry point:
//! `loop_runner::run_chat_loop`.

pub mod commands;
pub mod input;
pub mod loop_runner;
pub mod renderer;
