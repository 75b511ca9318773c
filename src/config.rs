//! Layered settings: defaults, then `.repotidy.toml`, then environment.
//!
//! CLI flags are applied on top by the binary.

use std::env;
use std::path::Path;
use std::time::Duration;

use toml_edit::{DocumentMut, Item};
use tracing::{debug, warn};

use crate::assistant::{DEFAULT_RESPONSE_MARKER, RequestTimeouts};
use crate::error::ConfigError;
use crate::git::Identity;
use crate::monitor::{DEFAULT_EXTENSIONS, DEFAULT_THRESHOLD, FileSizeMonitor};

/// Settings file looked up in the working directory.
pub const CONFIG_FILE: &str = ".repotidy.toml";

pub const THRESHOLD_ENV_VAR: &str = "REPOTIDY_THRESHOLD";
pub const ANALYSIS_TIMEOUT_ENV_VAR: &str = "REPOTIDY_ANALYSIS_TIMEOUT";
pub const COMMIT_TIMEOUT_ENV_VAR: &str = "REPOTIDY_COMMIT_TIMEOUT";
pub const ASSISTANT_ENV_VAR: &str = "REPOTIDY_ASSISTANT";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Line count above which a file gets an advisory.
    pub threshold: usize,
    pub analysis_timeout_secs: u64,
    pub commit_timeout_secs: u64,
    /// Assistant command line, e.g. `claude -p`. `None` disables the assistant.
    pub assistant: Option<String>,
    pub response_marker: String,
    pub extensions: Vec<String>,
    /// Commit author overriding git config.
    pub author: Option<Identity>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            analysis_timeout_secs: 30,
            commit_timeout_secs: 5,
            assistant: None,
            response_marker: DEFAULT_RESPONSE_MARKER.to_string(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            author: None,
        }
    }
}

impl Settings {
    /// Defaults, overlaid with `<workdir>/.repotidy.toml` if present, then
    /// with environment variables.
    pub fn load(workdir: &Path) -> Result<Self, ConfigError> {
        let mut settings = Self::default();
        settings.apply_file(&workdir.join(CONFIG_FILE))?;
        settings.apply_env();
        Ok(settings)
    }

    /// Overlay a settings file. A missing file is not an error.
    ///
    /// Returns whether the file existed.
    pub fn apply_file(&mut self, path: &Path) -> Result<bool, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(source) => {
                return Err(ConfigError::ReadFailed {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        debug!("Loading settings from {}", path.display());
        self.apply_toml(path, &content)?;
        Ok(true)
    }

    /// Overlay settings from TOML text. `path` is only used in errors.
    pub fn apply_toml(&mut self, path: &Path, content: &str) -> Result<(), ConfigError> {
        let doc = content
            .parse::<DocumentMut>()
            .map_err(|e| ConfigError::InvalidToml {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        let field = FieldReader { path };

        if let Some(item) = doc.get("threshold") {
            self.threshold = field.unsigned(item, "threshold")? as usize;
        }
        if let Some(item) = doc.get("analysis_timeout_secs") {
            self.analysis_timeout_secs = field.unsigned(item, "analysis_timeout_secs")?;
        }
        if let Some(item) = doc.get("commit_timeout_secs") {
            self.commit_timeout_secs = field.unsigned(item, "commit_timeout_secs")?;
        }
        if let Some(item) = doc.get("assistant") {
            self.assistant = non_blank(field.string(item, "assistant")?);
        }
        if let Some(item) = doc.get("response_marker") {
            let marker = field.string(item, "response_marker")?;
            if marker.trim().is_empty() {
                return Err(field.invalid("response_marker", "must not be empty"));
            }
            self.response_marker = marker;
        }
        if let Some(item) = doc.get("extensions") {
            self.extensions = field.string_list(item, "extensions")?;
        }
        if let Some(author) = doc.get("author") {
            let name = author.get("name").map(|i| field.string(i, "author.name"));
            let email = author.get("email").map(|i| field.string(i, "author.email"));
            match (name, email) {
                (Some(name), Some(email)) => {
                    self.author = Some(Identity {
                        name: name?,
                        email: email?,
                    });
                }
                _ => return Err(field.invalid("author", "needs both name and email")),
            }
        }

        Ok(())
    }

    /// Overlay environment variables. Invalid values are logged and ignored.
    pub fn apply_env(&mut self) {
        if let Some(threshold) = env_parse::<usize>(THRESHOLD_ENV_VAR) {
            self.threshold = threshold;
        }
        if let Some(secs) = env_parse::<u64>(ANALYSIS_TIMEOUT_ENV_VAR) {
            self.analysis_timeout_secs = secs;
        }
        if let Some(secs) = env_parse::<u64>(COMMIT_TIMEOUT_ENV_VAR) {
            self.commit_timeout_secs = secs;
        }
        if let Ok(command) = env::var(ASSISTANT_ENV_VAR) {
            self.assistant = non_blank(command);
        }
    }

    pub fn request_timeouts(&self) -> RequestTimeouts {
        RequestTimeouts {
            analysis: Duration::from_secs(self.analysis_timeout_secs),
            commit_message: Duration::from_secs(self.commit_timeout_secs),
        }
    }

    pub fn monitor(&self) -> FileSizeMonitor {
        FileSizeMonitor::new(self.threshold, self.extensions.clone())
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Parse an environment variable, warning and returning `None` when it is
/// set to something unparsable.
fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    match env::var(name) {
        Ok(v) if !v.trim().is_empty() => match v.trim().parse::<T>() {
            Ok(parsed) => Some(parsed),
            Err(_) => {
                warn!("Invalid {} value '{}', keeping configured value", name, v);
                None
            }
        },
        _ => None,
    }
}

struct FieldReader<'a> {
    path: &'a Path,
}

impl FieldReader<'_> {
    fn invalid(&self, key: &str, reason: &str) -> ConfigError {
        ConfigError::InvalidValue {
            path: self.path.to_path_buf(),
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }

    fn unsigned(&self, item: &Item, key: &str) -> Result<u64, ConfigError> {
        let value = item
            .as_integer()
            .ok_or_else(|| self.invalid(key, "expected an integer"))?;
        u64::try_from(value).map_err(|_| self.invalid(key, "must not be negative"))
    }

    fn string(&self, item: &Item, key: &str) -> Result<String, ConfigError> {
        item.as_str()
            .map(str::to_string)
            .ok_or_else(|| self.invalid(key, "expected a string"))
    }

    fn string_list(&self, item: &Item, key: &str) -> Result<Vec<String>, ConfigError> {
        let array = item
            .as_array()
            .ok_or_else(|| self.invalid(key, "expected an array of strings"))?;
        array
            .iter()
            .map(|v| {
                v.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| self.invalid(key, "expected an array of strings"))
            })
            .collect()
    }
}
