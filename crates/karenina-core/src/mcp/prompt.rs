//! User interaction capability injected into MCP actions.

/// Asks the user for input or confirmation.
///
/// Implementations may block (terminal) or answer from a script (tests).
pub trait UserPrompt: Send + Sync {
    /// Ask for a line of text. `None` means the user cancelled.
    fn prompt(&self, message: &str, default: Option<&str>) -> Option<String>;

    /// Ask a yes/no question.
    fn confirm(&self, message: &str) -> bool;
}

/// Answers every prompt with its default and declines every confirmation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NonInteractive;

impl UserPrompt for NonInteractive {
    fn prompt(&self, _message: &str, default: Option<&str>) -> Option<String> {
        default.map(str::to_string)
    }

    fn confirm(&self, _message: &str) -> bool {
        false
    }
}
