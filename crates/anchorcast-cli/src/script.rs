//! Script line syntax for `anchorcast speak`.

use anchorcast_core::Priority;

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptLine {
    /// Queue `text` at `priority`.
    Speak { text: String, priority: Priority },
    /// Synthesize `text` with one of the voices, ahead of everything.
    VoiceTest { text: String, assistant: bool },
}

impl ScriptLine {
    /// Parse one line. Blank lines and `#` comments give `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }

        let parsed = if let Some(rest) = line.strip_prefix("??") {
            Self::VoiceTest {
                text: rest.trim().to_string(),
                assistant: true,
            }
        } else if let Some(rest) = line.strip_prefix('?') {
            Self::VoiceTest {
                text: rest.trim().to_string(),
                assistant: false,
            }
        } else if let Some(rest) = line.strip_prefix('!') {
            Self::speak(rest, Priority::Interrupt)
        } else if let Some(rest) = line.strip_prefix('~') {
            Self::speak(rest, Priority::Auto)
        } else {
            Self::speak(line, Priority::Normal)
        };

        (!parsed.text().is_empty()).then_some(parsed)
    }

    fn speak(text: &str, priority: Priority) -> Self {
        Self::Speak {
            text: text.trim().to_string(),
            priority,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Speak { text, .. } | Self::VoiceTest { text, .. } => text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn speak(text: &str, priority: Priority) -> Option<ScriptLine> {
        Some(ScriptLine::Speak {
            text: text.to_string(),
            priority,
        })
    }

    #[test]
    fn test_prefixes_select_priority() {
        assert_eq!(ScriptLine::parse("欢迎大家"), speak("欢迎大家", Priority::Normal));
        assert_eq!(ScriptLine::parse("!感谢火箭"), speak("感谢火箭", Priority::Interrupt));
        assert_eq!(ScriptLine::parse("~ 聊聊天"), speak("聊聊天", Priority::Auto));
    }

    #[test]
    fn test_voice_tests() {
        assert_eq!(
            ScriptLine::parse("?测试主播"),
            Some(ScriptLine::VoiceTest {
                text: "测试主播".to_string(),
                assistant: false
            })
        );
        assert_eq!(
            ScriptLine::parse("?? 测试助手"),
            Some(ScriptLine::VoiceTest {
                text: "测试助手".to_string(),
                assistant: true
            })
        );
    }

    #[test]
    fn test_skipped_lines() {
        assert_eq!(ScriptLine::parse(""), None);
        assert_eq!(ScriptLine::parse("   "), None);
        assert_eq!(ScriptLine::parse("# 注释"), None);
        assert_eq!(ScriptLine::parse("!"), None);
        assert_eq!(ScriptLine::parse("??  "), None);
    }

    #[test]
    fn test_sound_token_is_plain_text() {
        assert_eq!(ScriptLine::parse("[咳嗽]"), speak("[咳嗽]", Priority::Normal));
    }
}
