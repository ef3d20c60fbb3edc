use crate::error::Result;
use std::io::{self, BufRead, Write};

/// Operator decision point in front of (or after) an expensive step.
pub trait Gate {
    /// Returns `true` when the operator says to go ahead.
    fn confirm(&mut self, question: &str) -> Result<bool>;
}

/// Reads `y`/`n` answers from a line-oriented reader (stdin in the binary).
pub struct PromptGate<R, W> {
    input: R,
    output: W,
}

impl PromptGate<io::StdinLock<'static>, io::Stdout> {
    pub fn stdin() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> PromptGate<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> Gate for PromptGate<R, W> {
    fn confirm(&mut self, question: &str) -> Result<bool> {
        write!(self.output, "\n{question} (y/n): ")?;
        self.output.flush()?;

        let mut answer = String::new();
        // EOF reads as an empty answer, i.e. "no"
        self.input.read_line(&mut answer)?;
        Ok(is_yes(&answer))
    }
}

/// Says yes to everything; used for `--yes` and unattended runs.
pub struct AutoApprove;

impl Gate for AutoApprove {
    fn confirm(&mut self, question: &str) -> Result<bool> {
        tracing::debug!(question, "auto-approved");
        Ok(true)
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
