//! Request modes and their system instructions.

use std::fmt;

/// Named preset selecting the system instruction that frames a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Chat,
    Summarize,
    CodeExplain,
    Grammar,
}

impl Mode {
    pub const ALL: [Mode; 4] = [Mode::Chat, Mode::Summarize, Mode::CodeExplain, Mode::Grammar];

    /// Resolve a mode key. Unknown keys fall back to [`Mode::Chat`].
    pub fn parse(key: &str) -> Self {
        match key {
            "chat" => Mode::Chat,
            "summarize" => Mode::Summarize,
            "code_explain" => Mode::CodeExplain,
            "grammar" => Mode::Grammar,
            other => {
                tracing::debug!(mode = %other, "Unknown mode, using chat");
                Mode::Chat
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Chat => "chat",
            Mode::Summarize => "summarize",
            Mode::CodeExplain => "code_explain",
            Mode::Grammar => "grammar",
        }
    }

    pub fn system_instruction(&self) -> &'static str {
        match self {
            Mode::Chat => {
                "You are a helpful AI assistant for students and developers. \
                 Answer questions clearly and concisely."
            }
            Mode::Summarize => {
                "You are an expert summarizer. Provide a concise summary of the \
                 following text, capturing the main points."
            }
            Mode::CodeExplain => {
                "You are a coding tutor. Explain the following code step-by-step \
                 for a beginner."
            }
            Mode::Grammar => {
                "You are a grammar corrector. Correct the grammar of the following \
                 text and provide a brief explanation of the changes."
            }
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_modes_round_trip_keys() {
        for mode in Mode::ALL {
            assert_eq!(Mode::parse(mode.as_str()), mode);
        }
    }

    #[test]
    fn test_unknown_mode_uses_chat_instruction() {
        let chat = Mode::Chat.system_instruction();
        for key in ["", "poetry", "CHAT", "code-explain", "summarize "] {
            assert_eq!(Mode::parse(key).system_instruction(), chat, "key {:?}", key);
        }
    }

    #[test]
    fn test_instructions_are_distinct() {
        assert_eq!(
            Mode::Chat.system_instruction(),
            "You are a helpful AI assistant for students and developers. Answer questions clearly and concisely."
        );
        assert!(Mode::Grammar.system_instruction().starts_with("You are a grammar corrector."));
        assert_ne!(
            Mode::Summarize.system_instruction(),
            Mode::CodeExplain.system_instruction()
        );
    }
}
