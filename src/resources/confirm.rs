//! Confirmation prompts used by interactive creates.

use std::io::{self, BufRead, Write};

/// Asks the operator whether to proceed.
pub trait Confirm {
    /// Show `prompt` and return the answer. Anything but an explicit yes is a
    /// refusal.
    fn confirm(&self, prompt: &str) -> bool;
}

/// Prompts on stderr and reads a `y`/`yes` answer from stdin.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        let mut stderr = io::stderr();
        if write!(stderr, "{prompt} [y/N] ").and_then(|_| stderr.flush()).is_err() {
            return false;
        }
        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(_) => is_affirmative(&line),
            Err(_) => false,
        }
    }
}

/// Always gives the same answer. Useful for scripted runs and tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedAnswer(pub bool);

impl Confirm for FixedAnswer {
    fn confirm(&self, _prompt: &str) -> bool {
        self.0
    }
}

fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_yes_is_affirmative() {
        assert!(is_affirmative("y\n"));
        assert!(is_affirmative(" YES "));
        assert!(!is_affirmative(""));
        assert!(!is_affirmative("no"));
        assert!(!is_affirmative("yep"));
    }

    #[test]
    fn fixed_answer_ignores_prompt() {
        assert!(FixedAnswer(true).confirm("create duplicate?"));
        assert!(!FixedAnswer(false).confirm("create duplicate?"));
    }
}
