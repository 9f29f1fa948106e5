//! Async readline input for the chat loop.
//!
//! Wraps `rustyline_async::Readline` so the loop can `select!` between the
//! prompt and supervisor events while output is printed above the prompt.

use rustyline_async::{Readline, ReadlineError, ReadlineEvent, SharedWriter};

/// Events produced by the input handler.
#[derive(Debug)]
pub enum InputEvent {
    /// User submitted a line (already trimmed).
    Line(String),
    /// End of file (Ctrl+D).
    Eof,
    /// Interrupt signal (Ctrl+C).
    Interrupted,
}

pub struct ChatInput {
    rl: Readline,
}

impl ChatInput {
    /// Create the input handler and the writer used for all chat output.
    pub fn new(prompt: String) -> Result<(Self, SharedWriter), ReadlineError> {
        let (rl, stdout) = Readline::new(prompt)?;
        Ok((Self { rl }, stdout))
    }

    pub fn update_prompt(&mut self, prompt: &str) {
        if let Err(err) = self.rl.update_prompt(prompt) {
            tracing::debug!(error = %err, "failed to update prompt");
        }
    }

    /// Read a line of input. Cancel safe.
    pub async fn read_line(&mut self) -> InputEvent {
        match self.rl.readline().await {
            Ok(ReadlineEvent::Line(line)) => {
                let trimmed = line.trim().to_string();
                if !trimmed.is_empty() {
                    self.rl.add_history_entry(trimmed.clone());
                }
                InputEvent::Line(trimmed)
            }
            Ok(ReadlineEvent::Eof) => InputEvent::Eof,
            Ok(ReadlineEvent::Interrupted) => InputEvent::Interrupted,
            Err(err) => {
                tracing::debug!(error = %err, "readline failed, treating as eof");
                InputEvent::Eof
            }
        }
    }

    /// Restore the terminal before exit.
    pub fn flush(&mut self) {
        if let Err(err) = self.rl.flush() {
            tracing::debug!(error = %err, "failed to flush readline");
        }
    }
}
