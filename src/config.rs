use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::ConfigError;

pub type ConfigMapping = HashMap<String, String>;

/// Which tier answers first when both the file and the environment define a key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Precedence {
    #[default]
    FileFirst,
    EnvFirst,
}

/// Secondary lookup tier, usually the process environment.
pub trait EnvSource: Send + Sync {
    fn get_var(&self, key: &str) -> Option<String>;
}

/// Reads from `std::env`. Variables that are unset or not valid UTF-8 are absent.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn get_var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn get_var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

pub fn env_path(dir: impl AsRef<Path>, file: impl AsRef<Path>) -> PathBuf {
    dir.as_ref().join(file)
}

pub fn default_env_path() -> PathBuf {
    env_path(".", ".env")
}

// Missing files and unparseable lines are not errors here: a missing file is an
// empty mapping and a bad line is skipped. Only other read failures are logged
// at warn, and those still produce an empty mapping.
pub fn load_config(path: impl AsRef<Path>) -> ConfigMapping {
    let path = path.as_ref();
    match ConfigLoader::try_load_mapping(path) {
        Ok(map) => map,
        Err(e) => {
            warn!("{}; continuing with empty config", e);
            ConfigMapping::new()
        }
    }
}

/// One-shot load and lookup.
pub fn load_secret(path: impl AsRef<Path>, key: &str) -> Option<String> {
    load_config(path).remove(key)
}

pub fn parse_config(content: &str) -> ConfigMapping {
    let mut map = HashMap::new();
    for (idx, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match parse_line(line) {
            Some((key, value)) => {
                map.insert(key, value);
            }
            None => debug!("Skipping malformed config line {}", idx + 1),
        }
    }
    map
}

fn parse_line(line: &str) -> Option<(String, String)> {
    let line = line
        .strip_prefix("export")
        .filter(|rest| rest.starts_with(char::is_whitespace))
        .map(str::trim_start)
        .unwrap_or(line);
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key.to_string(), parse_value(value.trim()).to_string()))
}

// A quoted value ends at its closing quote and anything after it is ignored.
// Unquoted values end at the first `#` preceded by whitespace.
fn parse_value(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(rest) = value.strip_prefix(quote) {
            if let Some(end) = rest.find(quote) {
                return &rest[..end];
            }
        }
    }
    strip_inline_comment(value)
}

fn strip_inline_comment(value: &str) -> &str {
    let mut after_space = false;
    for (idx, c) in value.char_indices() {
        if c == '#' && after_space {
            return value[..idx].trim_end();
        }
        after_space = c.is_whitespace();
    }
    value
}

pub struct ConfigLoader {
    path: PathBuf,
    mapping: ConfigMapping,
    env: Option<Box<dyn EnvSource>>,
    precedence: Precedence,
}

impl ConfigLoader {
    /// Reads `path` immediately. The process environment is not consulted.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mapping = load_config(&path);
        debug!("Loaded {} entries from {}", mapping.len(), path.display());
        Self {
            path,
            mapping,
            env: None,
            precedence: Precedence::FileFirst,
        }
    }

    pub fn with_env(
        path: impl Into<PathBuf>,
        env: impl EnvSource + 'static,
        precedence: Precedence,
    ) -> Self {
        let mut loader = Self::new(path);
        loader.env = Some(Box::new(env));
        loader.precedence = precedence;
        loader
    }

    pub fn try_load_mapping(path: &Path) -> Result<ConfigMapping, ConfigError> {
        match fs::read_to_string(path) {
            Ok(content) => Ok(parse_config(&content)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Config file {} not found, using empty config", path.display());
                Ok(ConfigMapping::new())
            }
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn reload(&mut self) {
        self.mapping = load_config(&self.path);
        debug!("Reloaded {} entries from {}", self.mapping.len(), self.path.display());
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let from_file = || self.mapping.get(key).cloned();
        let from_env = || self.env.as_ref().and_then(|env| env.get_var(key));
        match self.precedence {
            Precedence::FileFirst => from_file().or_else(from_env),
            Precedence::EnvFirst => from_env().or_else(from_file),
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn precedence(&self) -> Precedence {
        self.precedence
    }

    /// File entries only, without the environment tier.
    pub fn mapping(&self) -> &ConfigMapping {
        &self.mapping
    }

    /// Number of file entries. The environment tier is not counted.
    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    /// True when the file produced no entries, even if the environment tier is set.
    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }
}
