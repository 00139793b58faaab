//! Pattern matching for wake phrases and custom prompts
//!
//! Templates are compiled once at startup: placeholders such as `<BOT_NAME>`
//! are substituted from configuration and the result is compiled as a
//! case-insensitive regular expression.

mod prompts;
mod template;
mod wake;

pub use prompts::{CustomPrompt, CustomPromptTable};
pub use template::Placeholders;
pub use wake::{WakePattern, DEFAULT_WAKE_PATTERN};

/// Errors raised while compiling pattern templates
///
/// All of these point at a broken configuration and are fatal.
#[derive(Debug, thiserror::Error)]
pub enum PatternError {
    #[error("pattern references {0} but no value is configured")]
    MissingPlaceholder(&'static str),

    #[error("invalid pattern {pattern:?}: {source}")]
    Invalid {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("wake pattern must have exactly {expected} capture groups, found {found}")]
    WakeGroupCount { expected: usize, found: usize },
}
