use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::cache::CacheBackend;
use crate::domain::notes::Grouping;
use crate::error::{AppError, AppResult};

const CONFIG_DIR_NAME: &str = ".relnotes";
const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub github: GitHubConfig,
    pub llm: LlmConfig,
    pub cache: CacheConfig,
    pub filters: FilterConfig,
    pub grouping: Grouping,
    pub prompt_path: Option<PathBuf>,
    pub concurrency: Concurrency,
    pub force_use_commits: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    pub token: Option<String>,
    pub owner: Option<String>,
    pub api_url: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            owner: None,
            api_url: "https://api.github.com".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub api_url: String,
    /// Patches longer than this many characters are replaced by commit messages.
    pub max_patch_size: usize,
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gpt-4.1".to_string(),
            api_url: "https://api.openai.com/v1".to_string(),
            max_patch_size: 10_000,
            max_retries: 6,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    /// File name without extension; relative names live in the config directory.
    pub name: String,
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            name: "stored_lines".to_string(),
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub exclude_types: BTreeSet<String>,
    pub exclude_labels: BTreeSet<String>,
    /// Bot accounts and similar, never credited as authors or reviewers.
    pub exclude_authors: BTreeSet<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Concurrency(pub usize);

impl Default for Concurrency {
    fn default() -> Self {
        Self(8)
    }
}

impl Concurrency {
    pub fn get(self) -> usize {
        self.0.max(1)
    }
}

impl AppConfig {
    /// Load from `path`, or from the default location when `None`.
    ///
    /// A missing default file yields defaults; a missing explicit file is an
    /// error. Environment variables override the file.
    pub fn load(path: Option<&Path>) -> AppResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = config_file_path()?;
                match fs::read_to_string(&default_path) {
                    Ok(contents) => Self::from_toml(&contents)?,
                    Err(err) if err.kind() == io::ErrorKind::NotFound => Self::default(),
                    Err(err) => return Err(AppError::Io(err)),
                }
            }
        };
        config.apply_env(|key| env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> AppResult<Self> {
        let contents = fs::read_to_string(path).map_err(|err| {
            AppError::Configuration(format!("cannot read {}: {err}", path.display()))
        })?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> AppResult<Self> {
        toml::from_str(contents)
            .map_err(|err| AppError::Configuration(format!("invalid config file: {err}")))
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(token) = non_empty("GH_TOKEN").or_else(|| non_empty("GITHUB_TOKEN")) {
            self.github.token = Some(token);
        }
        if let Some(key) = non_empty("OPENAI_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Some(model) = non_empty("OPENAI_MODEL") {
            self.llm.model = model;
        }
    }

    /// Prompt template text: the configured file, else the built-in prompt.
    pub fn prompt_template(&self) -> AppResult<String> {
        match &self.prompt_path {
            Some(path) => fs::read_to_string(path).map_err(|err| {
                AppError::Configuration(format!("cannot read prompt {}: {err}", path.display()))
            }),
            None => Ok(DEFAULT_PROMPT.to_string()),
        }
    }
}

pub const DEFAULT_PROMPT: &str = include_str!("prompt.txt");

pub fn config_directory() -> AppResult<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(CONFIG_DIR_NAME))
        .ok_or_else(|| AppError::Configuration("cannot determine home directory".to_string()))
}

pub fn config_file_path() -> AppResult<PathBuf> {
    Ok(config_directory()?.join(CONFIG_FILE_NAME))
}
