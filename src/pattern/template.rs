//! Template compilation: placeholder substitution followed by regex compilation

use regex::{Regex, RegexBuilder};

use super::PatternError;

/// Placeholder slots recognized in pattern and response templates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    BotName,
    UserName,
}

impl Placeholder {
    pub const ALL: [Placeholder; 2] = [Placeholder::BotName, Placeholder::UserName];

    /// Literal token as written in templates
    pub fn token(self) -> &'static str {
        match self {
            Placeholder::BotName => "<BOT_NAME>",
            Placeholder::UserName => "<USER_NAME>",
        }
    }
}

/// Current values for each placeholder
#[derive(Debug, Clone, Default)]
pub struct Placeholders {
    bot_name: Option<String>,
    user_name: Option<String>,
}

impl Placeholders {
    pub fn new(bot_name: Option<String>, user_name: Option<String>) -> Self {
        Self {
            bot_name,
            user_name,
        }
    }

    /// Configured value, treating blank strings as unset
    pub fn get(&self, placeholder: Placeholder) -> Option<&str> {
        let value = match placeholder {
            Placeholder::BotName => self.bot_name.as_deref(),
            Placeholder::UserName => self.user_name.as_deref(),
        };
        value.map(str::trim).filter(|v| !v.is_empty())
    }

    /// Replace every placeholder token in `template`.
    ///
    /// With `escape` set, values are regex-escaped so a name such as "R2.D2"
    /// matches literally.
    pub fn substitute(&self, template: &str, escape: bool) -> Result<String, PatternError> {
        let mut out = template.to_string();
        for placeholder in Placeholder::ALL {
            let token = placeholder.token();
            if !out.contains(token) {
                continue;
            }
            let value = self
                .get(placeholder)
                .ok_or(PatternError::MissingPlaceholder(token))?;
            let value = if escape {
                regex::escape(value)
            } else {
                value.to_string()
            };
            out = out.replace(token, &value);
        }
        Ok(out)
    }
}

/// A template compiled into a case-insensitive regex
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    template: String,
    regex: Regex,
}

/// Substitute placeholders into `template` and compile it
pub fn compile(template: &str, placeholders: &Placeholders) -> Result<CompiledPattern, PatternError> {
    let source = placeholders.substitute(template, true)?;
    let regex = RegexBuilder::new(&source)
        .case_insensitive(true)
        .build()
        .map_err(|source_err| PatternError::Invalid {
            pattern: source.clone(),
            source: source_err,
        })?;

    Ok(CompiledPattern {
        template: template.to_string(),
        regex,
    })
}

impl CompiledPattern {
    /// Template the pattern was compiled from, before substitution
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Number of capture groups, not counting the implicit whole-match group
    pub fn group_count(&self) -> usize {
        self.regex.captures_len().saturating_sub(1)
    }

    /// Capture groups of the first match in `text`, or `None`.
    ///
    /// Groups that did not participate in the match are empty strings.
    pub fn captures(&self, text: &str) -> Option<Vec<String>> {
        self.regex.captures(text).map(|caps| group_texts(&caps))
    }

    pub(super) fn regex(&self) -> &Regex {
        &self.regex
    }
}

/// Texts of every explicit group, skipping the implicit whole-match group
pub(super) fn group_texts(caps: &regex::Captures<'_>) -> Vec<String> {
    caps.iter()
        .skip(1)
        .map(|m| m.map(|m| m.as_str().to_string()).unwrap_or_default())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> Placeholders {
        Placeholders::new(Some("Jarvis".to_string()), Some("Ben".to_string()))
    }

    #[test]
    fn test_substitutes_placeholders() {
        let out = names().substitute("hi <USER_NAME>, I'm <BOT_NAME>", false).unwrap();
        assert_eq!(out, "hi Ben, I'm Jarvis");
    }

    #[test]
    fn test_missing_placeholder() {
        let placeholders = Placeholders::new(Some("Jarvis".to_string()), None);
        let err = compile("thanks <USER_NAME>", &placeholders).unwrap_err();
        assert!(matches!(err, PatternError::MissingPlaceholder("<USER_NAME>")));
    }

    #[test]
    fn test_blank_value_counts_as_missing() {
        let placeholders = Placeholders::new(Some("  ".to_string()), None);
        assert!(compile("<BOT_NAME>", &placeholders).is_err());
    }

    #[test]
    fn test_unreferenced_placeholder_not_required() {
        let placeholders = Placeholders::default();
        assert!(compile("how are you", &placeholders).is_ok());
    }

    #[test]
    fn test_values_are_escaped() {
        let placeholders = Placeholders::new(Some("R2.D2".to_string()), None);
        let pattern = compile("^<BOT_NAME>$", &placeholders).unwrap();
        assert!(pattern.captures("r2.d2").is_some());
        assert!(pattern.captures("R2xD2").is_none());
    }

    #[test]
    fn test_case_insensitive_unanchored() {
        let pattern = compile("how are (you|ya)", &names()).unwrap();
        let groups = pattern.captures("So, HOW ARE YOU today").unwrap();
        assert_eq!(groups, vec!["YOU".to_string()]);
    }

    #[test]
    fn test_non_participating_group_is_empty() {
        let pattern = compile("(a)|(b)", &names()).unwrap();
        let groups = pattern.captures("b").unwrap();
        assert_eq!(groups, vec!["".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_invalid_regex() {
        let err = compile("(unclosed", &names()).unwrap_err();
        assert!(matches!(err, PatternError::Invalid { .. }));
    }
}
