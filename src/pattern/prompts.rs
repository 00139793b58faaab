//! Custom prompts: user-configured pattern/response pairs answered locally
//! without involving the dialogue backend.

use rand::seq::SliceRandom;
use rand::Rng;
use regex::Regex;
use tracing::warn;

use super::template::{compile, group_texts, CompiledPattern, Placeholders};
use super::PatternError;

/// One compiled custom prompt
#[derive(Debug, Clone)]
pub struct CustomPrompt {
    pattern: CompiledPattern,
    responses: Vec<String>,
}

/// A custom prompt that matched an utterance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptMatch {
    /// Position of the prompt in declared order
    pub index: usize,
    /// Capture groups of the match
    pub groups: Vec<String>,
    /// Selected response, with `$N` group references expanded
    pub response: String,
}

impl CustomPrompt {
    /// Compile a prompt definition.
    ///
    /// Response templates may use placeholders as well as `$1`, `$name` or
    /// `${name}` references to the pattern's capture groups. A `$` that does
    /// not name an existing group is spoken literally, so "It's $5 today"
    /// survives a pattern without five groups.
    pub fn compile(
        pattern: &str,
        responses: &[String],
        placeholders: &Placeholders,
    ) -> Result<Self, PatternError> {
        let pattern = compile(pattern, placeholders)?;
        let responses = responses
            .iter()
            .map(|r| placeholders.substitute(r, false))
            .map(|r| r.map(|r| escape_unknown_refs(&r, pattern.regex())))
            .collect::<Result<Vec<_>, _>>()?;

        if responses.is_empty() {
            warn!(pattern = pattern.template(), "custom prompt has no responses and will never match");
        }

        Ok(Self { pattern, responses })
    }
}

/// Ordered, immutable set of custom prompts
#[derive(Debug, Clone, Default)]
pub struct CustomPromptTable {
    prompts: Vec<CustomPrompt>,
}

impl CustomPromptTable {
    pub fn new(prompts: Vec<CustomPrompt>) -> Self {
        Self { prompts }
    }

    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    /// First prompt, in declared order, that matches `text` and has at least
    /// one response. One of its responses is picked uniformly at random.
    pub fn lookup<R: Rng + ?Sized>(&self, text: &str, rng: &mut R) -> Option<PromptMatch> {
        for (index, prompt) in self.prompts.iter().enumerate() {
            if prompt.responses.is_empty() {
                continue;
            }
            let Some(caps) = prompt.pattern.regex().captures(text) else {
                continue;
            };
            let template = prompt.responses.choose(rng)?;

            let mut response = String::new();
            caps.expand(template, &mut response);

            let groups = group_texts(&caps);
            return Some(PromptMatch {
                index,
                groups,
                response,
            });
        }
        None
    }
}

/// Double every `$` that does not start a reference to a group of `regex`.
///
/// Reference names follow `Captures::expand`: `${...}` or the longest run of
/// `[_0-9A-Za-z]` after the `$`.
fn escape_unknown_refs(template: &str, regex: &Regex) -> String {
    let known = |name: &str| match name.parse::<usize>() {
        Ok(index) => index < regex.captures_len(),
        Err(_) => regex.capture_names().flatten().any(|n| n == name),
    };

    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        if let Some(tail) = after.strip_prefix('$') {
            out.push_str("$$");
            rest = tail;
            continue;
        }

        let (name, consumed) = match after.strip_prefix('{') {
            Some(braced) => match braced.find('}') {
                Some(end) => (&braced[..end], end + 2),
                None => ("", 0),
            },
            None => {
                let end = after
                    .find(|c: char| c != '_' && !c.is_ascii_alphanumeric())
                    .unwrap_or(after.len());
                (&after[..end], end)
            }
        };

        if !name.is_empty() && known(name) {
            out.push('$');
            out.push_str(&after[..consumed]);
            rest = &after[consumed..];
        } else {
            out.push_str("$$");
            rest = after;
        }
    }
    out.push_str(rest);
    out
}
