//! Configuration parsing: the typed project config and untyped YAML mappings.

use crate::markdown::MarkdownEngine;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Project config file name, looked up at the project root.
pub const CONFIG_FILE: &str = "sitegen.yml";

/// Reserved content subfolder holding site-wide settings.
pub const GLOBAL_DIR: &str = "_global";

/// Reserved content subfolder holding image assets.
pub const IMAGES_DIR: &str = "_images";

pub const GLOBAL_FILE: &str = "global.yaml";
pub const NAV_FILE: &str = "top_nav.yaml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("YAML error in {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("YAML error in {0:?}: top level must be a mapping")]
    NotAMapping(PathBuf),
}

/// Project configuration matching the sitegen.yml schema
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,

    /// Output subdirectory for every page other than the root index
    #[serde(default = "default_pages_dir")]
    pub pages_dir: String,

    /// Prefix substituted for `{{image}}` tokens
    #[serde(default = "default_image_base_url")]
    pub image_base_url: String,

    #[serde(default)]
    pub markdown: MarkdownEngine,

    // Internal: directory relative paths resolve against
    #[serde(skip)]
    root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathsConfig {
    #[serde(default = "default_content")]
    pub content: PathBuf,

    #[serde(default = "default_templates")]
    pub templates: PathBuf,

    #[serde(default = "default_output")]
    pub output: PathBuf,
}

fn default_pages_dir() -> String {
    String::from("pages")
}

fn default_image_base_url() -> String {
    String::from("/content/_images/")
}

fn default_content() -> PathBuf {
    PathBuf::from("content")
}

fn default_templates() -> PathBuf {
    PathBuf::from("templates")
}

fn default_output() -> PathBuf {
    PathBuf::from(".")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            content: default_content(),
            templates: default_templates(),
            output: default_output(),
        }
    }
}

impl Config {
    /// Default configuration rooted at `root`
    pub fn with_root<P: AsRef<Path>>(root: P) -> Self {
        Self {
            paths: PathsConfig::default(),
            pages_dir: default_pages_dir(),
            image_base_url: default_image_base_url(),
            markdown: MarkdownEngine::default(),
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Load configuration from a YAML file; paths resolve against its directory
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config: Config = if contents.trim().is_empty() {
            Config::with_root(".")
        } else {
            serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?
        };

        config.root = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(config)
    }

    /// Load `config_path` (relative to `root`) when present, defaults otherwise
    pub fn load(root: &Path, config_path: &Path) -> Result<Self, ConfigError> {
        let path = if config_path.is_absolute() {
            config_path.to_path_buf()
        } else {
            root.join(config_path)
        };

        if path.exists() {
            Config::from_file(&path)
        } else {
            tracing::debug!("No config at {:?}; using defaults", path);
            Ok(Config::with_root(root))
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn content_dir(&self) -> PathBuf {
        self.resolve_path(&self.paths.content)
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.resolve_path(&self.paths.templates)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.resolve_path(&self.paths.output)
    }

    pub fn global_dir(&self) -> PathBuf {
        self.content_dir().join(GLOBAL_DIR)
    }

    pub fn images_dir(&self) -> PathBuf {
        self.content_dir().join(IMAGES_DIR)
    }

    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

/// Load a YAML file into a mapping.
///
/// A missing file or an empty document yields an empty mapping. Anything
/// that is not valid YAML, or not a mapping at the top level, is an error
/// naming the file.
pub fn load_mapping(path: &Path) -> Result<Mapping, ConfigError> {
    if !path.exists() {
        return Ok(Mapping::new());
    }

    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    if contents.trim().is_empty() {
        return Ok(Mapping::new());
    }

    let value: Value = serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    match value {
        Value::Null => Ok(Mapping::new()),
        Value::Mapping(mapping) => Ok(mapping),
        _ => Err(ConfigError::NotAMapping(path.to_path_buf())),
    }
}

/// Whether a page configuration is flagged as a draft.
///
/// Checks the top-level `draft` field and `draft` inside the `meta` or
/// `page` blocks.
pub fn is_draft(config: &Mapping) -> bool {
    if config.get("draft").is_some_and(is_truthy) {
        return true;
    }

    ["meta", "page"].iter().any(|block| {
        config
            .get(*block)
            .and_then(Value::as_mapping)
            .and_then(|m| m.get("draft"))
            .is_some_and(is_truthy)
    })
}

/// YAML truthiness; strings such as `"false"` or `"no"` count as false.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => {
            let s = s.trim().to_ascii_lowercase();
            !(s.is_empty() || matches!(s.as_str(), "false" | "no" | "off" | "0"))
        }
        Value::Sequence(seq) => !seq.is_empty(),
        Value::Mapping(map) => !map.is_empty(),
        Value::Tagged(tagged) => is_truthy(&tagged.value),
    }
}
