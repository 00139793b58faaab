//! Wake phrase detection
//!
//! The wake pattern must expose exactly three groups: leading filler, the
//! bot-name token, and whatever followed it in the same utterance.

use super::template::{compile, CompiledPattern, Placeholders};
use super::PatternError;

/// Matches "hey/ok/okay/yo <bot name>" anywhere in the utterance
pub const DEFAULT_WAKE_PATTERN: &str =
    r"^(.*?)\b(?:hey|ok|okay|yo)\b[\s,.!]*(<BOT_NAME>)\b(.*)$";

/// A wake pattern validated to carry the three expected groups
#[derive(Debug, Clone)]
pub struct WakePattern {
    pattern: CompiledPattern,
}

/// Groups extracted from a wake phrase match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WakeMatch {
    pub filler: String,
    pub bot_name: String,
    pub trailing: String,
}

impl WakePattern {
    pub const GROUPS: usize = 3;

    pub fn compile(template: &str, placeholders: &Placeholders) -> Result<Self, PatternError> {
        let pattern = compile(template, placeholders)?;
        let found = pattern.group_count();
        if found != Self::GROUPS {
            return Err(PatternError::WakeGroupCount {
                expected: Self::GROUPS,
                found,
            });
        }
        Ok(Self { pattern })
    }

    pub fn detect(&self, text: &str) -> Option<WakeMatch> {
        let mut groups = self.pattern.captures(text)?.into_iter();
        // group count is validated at compile time
        let filler = groups.next().unwrap_or_default();
        let bot_name = groups.next().unwrap_or_default();
        let trailing = groups.next().unwrap_or_default();
        Some(WakeMatch {
            filler,
            bot_name,
            trailing,
        })
    }

    pub fn template(&self) -> &str {
        self.pattern.template()
    }
}

impl WakeMatch {
    /// Command spoken in the same breath as the wake phrase.
    ///
    /// One leading punctuation or space character is dropped and the rest
    /// trimmed. `None` when nothing meaningful remains.
    pub fn command(&self) -> Option<&str> {
        let mut chars = self.trailing.chars();
        let rest = match chars.next() {
            Some(c) if c.is_whitespace() || c.is_ascii_punctuation() => chars.as_str(),
            _ => self.trailing.as_str(),
        };
        let command = rest.trim();
        if command.chars().any(char::is_alphanumeric) {
            Some(command)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wake() -> WakePattern {
        let placeholders = Placeholders::new(Some("Jarvis".to_string()), None);
        WakePattern::compile(DEFAULT_WAKE_PATTERN, &placeholders).unwrap()
    }

    #[test]
    fn test_bare_wake_phrase() {
        let m = wake().detect("hey Jarvis").unwrap();
        assert_eq!(m.bot_name, "Jarvis");
        assert_eq!(m.trailing, "");
        assert_eq!(m.command(), None);
    }

    #[test]
    fn test_wake_with_command() {
        let m = wake().detect("hey Jarvis, what time is it").unwrap();
        assert_eq!(m.trailing, ", what time is it");
        assert_eq!(m.command(), Some("what time is it"));
    }

    #[test]
    fn test_variants_and_filler() {
        let w = wake();
        assert!(w.detect("OK jarvis").is_some());
        assert!(w.detect("okay, Jarvis.").is_some());
        let m = w.detect("um yo jarvis turn it up").unwrap();
        assert_eq!(m.filler, "um ");
        assert_eq!(m.command(), Some("turn it up"));
    }

    #[test]
    fn test_punctuation_only_trailing_is_empty() {
        let m = wake().detect("hey jarvis?!").unwrap();
        assert_eq!(m.command(), None);
    }

    #[test]
    fn test_no_wake() {
        let w = wake();
        assert!(w.detect("jarvis is a name").is_none());
        assert!(w.detect("hey jarvisson").is_none());
        assert!(w.detect("they jarvis").is_none());
    }

    #[test]
    fn test_group_count_enforced() {
        let placeholders = Placeholders::new(Some("Jarvis".to_string()), None);
        let err = WakePattern::compile(r"hey (<BOT_NAME>)", &placeholders).unwrap_err();
        assert!(matches!(
            err,
            PatternError::WakeGroupCount {
                expected: 3,
                found: 1
            }
        ));
    }

    #[test]
    fn test_missing_bot_name() {
        let err = WakePattern::compile(DEFAULT_WAKE_PATTERN, &Placeholders::default()).unwrap_err();
        assert!(matches!(err, PatternError::MissingPlaceholder("<BOT_NAME>")));
    }
}
