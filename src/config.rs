//! Configuration loading and management
//!
//! Defaults, overlaid by an optional TOML file, overlaid by environment
//! variables. Pattern templates are compiled once by [`Config::compile`]; any
//! failure there means the deployment is broken and the daemon must not start.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::info;

use crate::audio::DEFAULT_SAMPLE_RATE;
use crate::pattern::{CustomPrompt, CustomPromptTable, PatternError, Placeholders, WakePattern, DEFAULT_WAKE_PATTERN};
use crate::router::AttentionStyle;
use crate::state::DialogueRules;

pub const DEFAULT_BOT_NAME: &str = "Jarvis";

const ENV_HOME: &str = "HOME";
const ENV_CONFIG: &str = "VOICE_AGENT_CONFIG";
const ENV_BOT_NAME: &str = "VOICE_AGENT_BOT_NAME";
const ENV_USER_NAME: &str = "VOICE_AGENT_USER_NAME";
const ENV_SOCKET: &str = "VOICE_AGENT_SOCKET";

/// Errors raised while loading or compiling configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("HOME is not set")]
    MissingHome,

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("sample rate must be positive")]
    InvalidSampleRate,

    #[error("spoken attention style needs at least one response")]
    NoAcknowledgements,

    #[error(transparent)]
    Pattern(#[from] PatternError),
}

/// A custom prompt as written in the config file
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PromptConfig {
    /// Pattern template; may use `<BOT_NAME>` and `<USER_NAME>`
    pub pattern: String,

    /// Candidate replies; one is picked at random
    #[serde(default)]
    pub responses: Vec<String>,
}

/// How the wake phrase is acknowledged
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttentionKind {
    #[default]
    Cue,
    Spoken,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AttentionConfig {
    #[serde(default)]
    pub style: AttentionKind,

    /// Acknowledgements used by the spoken style
    #[serde(default)]
    pub responses: Vec<String>,
}

/// Config file schema; every field is optional
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    bot_name: Option<String>,
    user_name: Option<String>,
    wake_pattern: Option<String>,
    sample_rate: Option<u32>,
    socket_path: Option<PathBuf>,
    #[serde(default)]
    attention: AttentionConfig,
    #[serde(default)]
    prompts: Vec<PromptConfig>,
}

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the Unix domain socket for IPC
    pub socket_path: PathBuf,

    /// Display name of the assistant, substituted for `<BOT_NAME>`
    pub bot_name: String,

    /// Display name of the user, substituted for `<USER_NAME>`
    pub user_name: Option<String>,

    /// Wake phrase template; must yield exactly three capture groups
    pub wake_pattern: String,

    /// Capture sample rate in Hz
    pub sample_rate: u32,

    pub attention: AttentionConfig,

    /// Custom prompts in match order
    pub prompts: Vec<PromptConfig>,
}

/// Compiled, validated matching rules
#[derive(Debug, Clone)]
pub struct CompiledConfig {
    pub rules: DialogueRules,
    pub attention: AttentionStyle,
}

impl Config {
    /// Load configuration from the config file, environment and defaults
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Load configuration using `lookup` for environment variables
    pub fn load_with(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let home = lookup(ENV_HOME).map(PathBuf::from).ok_or(ConfigError::MissingHome)?;

        let file = match lookup(ENV_CONFIG) {
            Some(path) => read_config_file(Path::new(&path))?,
            None => {
                let path = home.join(".config").join("voice-agent").join("config.toml");
                if path.exists() {
                    read_config_file(&path)?
                } else {
                    ConfigFile::default()
                }
            }
        };

        let socket_path = lookup(ENV_SOCKET)
            .map(PathBuf::from)
            .or(file.socket_path)
            .unwrap_or_else(|| {
                home.join(".local")
                    .join("share")
                    .join("voice-agent")
                    .join("daemon.sock")
            });

        let sample_rate = file.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE);
        if sample_rate == 0 {
            return Err(ConfigError::InvalidSampleRate);
        }

        Ok(Self {
            socket_path,
            bot_name: lookup(ENV_BOT_NAME)
                .or(file.bot_name)
                .unwrap_or_else(|| DEFAULT_BOT_NAME.to_string()),
            user_name: lookup(ENV_USER_NAME).or(file.user_name),
            wake_pattern: file
                .wake_pattern
                .unwrap_or_else(|| DEFAULT_WAKE_PATTERN.to_string()),
            sample_rate,
            attention: file.attention,
            prompts: file.prompts,
        })
    }

    pub fn placeholders(&self) -> Placeholders {
        Placeholders::new(Some(self.bot_name.clone()), self.user_name.clone())
    }

    /// Compile the wake pattern, custom prompts and acknowledgements
    pub fn compile(&self) -> Result<CompiledConfig, ConfigError> {
        let placeholders = self.placeholders();

        let wake = WakePattern::compile(&self.wake_pattern, &placeholders)?;
        let prompts = self
            .prompts
            .iter()
            .map(|p| CustomPrompt::compile(&p.pattern, &p.responses, &placeholders))
            .collect::<Result<Vec<_>, _>>()?;

        let attention = match self.attention.style {
            AttentionKind::Cue => AttentionStyle::Cue,
            AttentionKind::Spoken => {
                if self.attention.responses.is_empty() {
                    return Err(ConfigError::NoAcknowledgements);
                }
                let responses = self
                    .attention
                    .responses
                    .iter()
                    .map(|r| placeholders.substitute(r, false))
                    .collect::<Result<Vec<_>, _>>()?;
                AttentionStyle::Spoken(responses)
            }
        };

        info!(
            bot_name = %self.bot_name,
            prompts = prompts.len(),
            wake_pattern = wake.template(),
            "patterns compiled"
        );

        Ok(CompiledConfig {
            rules: DialogueRules {
                wake,
                prompts: CustomPromptTable::new(prompts),
            },
            attention,
        })
    }
}

fn read_config_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_owned(),
        source,
    })?;
    let file = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_owned(),
        source,
    })?;
    info!(path = %path.display(), "loaded config file");
    Ok(file)
}
