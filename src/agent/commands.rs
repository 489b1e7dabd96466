//! Slash commands handled locally, without a model call.

/// Commands surfaced to the end user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// List capabilities and commands
    Help,
    /// Clear this conversation's history
    Clear,
    /// Report service status
    Status,
}

impl Command {
    /// Parse a command from message text.
    ///
    /// Matches on the first whitespace-delimited token,
    /// case-insensitively, so `/clear please` clears but `/clearly`
    /// does not.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let token = text.trim().split_whitespace().next()?;
        match token.to_lowercase().as_str() {
            "/help" => Some(Self::Help),
            "/clear" => Some(Self::Clear),
            "/status" => Some(Self::Status),
            _ => None,
        }
    }
}

/// Fixed reply for `/help`
pub const HELP_MESSAGE: &str = "🤖 **Digital Agent Help**

**Available Commands:**
• `/help` - Show this help message
• `/clear` - Clear conversation history
• `/status` - Check bot status

**What I can do:**
✅ Answer questions and provide information
✅ Help with analysis and problem-solving
✅ Maintain conversation context
✅ Process and analyze shared documents
✅ Provide assistance across various topics

**Tips:**
• I remember our conversation context
• Feel free to ask follow-up questions
• Share documents for analysis
• Use natural language - no special formatting needed

Just ask me anything! 😊";

/// Confirmation reply for `/clear`
pub const CLEAR_MESSAGE: &str = "✅ Conversation history cleared! Starting fresh.";

/// Greeting sent when new members join the conversation
pub const WELCOME_MESSAGE: &str = "👋 **Welcome to your Digital Agent!**

I'm here to help you with questions, analysis, and various tasks within Teams.

Type `/help` to see what I can do, or just start chatting with me naturally!

How can I assist you today? 😊";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_commands() {
        assert_eq!(Command::parse("/help"), Some(Command::Help));
        assert_eq!(Command::parse("/clear"), Some(Command::Clear));
        assert_eq!(Command::parse("/status"), Some(Command::Status));
    }

    #[test]
    fn test_parse_is_case_insensitive_and_trims() {
        assert_eq!(Command::parse("  /HELP  "), Some(Command::Help));
        assert_eq!(Command::parse("/Clear please"), Some(Command::Clear));
    }

    #[test]
    fn test_parse_requires_exact_token() {
        assert_eq!(Command::parse("/clearly wrong"), None);
        assert_eq!(Command::parse("/helpme"), None);
        assert_eq!(Command::parse("help"), None);
        assert_eq!(Command::parse(""), None);
    }
}
