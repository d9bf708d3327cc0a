use crate::config::TetherConfig;
use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the project configuration file.
pub const CONFIG_FILE: &str = "tether.json";

/// A Tether project directory: its root and its (possibly default) config.
#[derive(Debug, Clone)]
pub struct TetherProject {
    pub root: PathBuf,
    pub config: TetherConfig,
}

impl TetherProject {
    /// Load a project from the given directory.
    ///
    /// A missing `tether.json` is fine and yields the default config; a
    /// present but malformed one is an error.
    pub fn load(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE);
        let config = if config_path.exists() {
            let raw = fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read {CONFIG_FILE}"))?;
            TetherConfig::from_json(&raw).with_context(|| format!("Failed to parse {CONFIG_FILE}"))?
        } else {
            TetherConfig::default()
        };
        Ok(Self {
            root: dir.to_path_buf(),
            config,
        })
    }

    /// Load a project from the current working directory.
    pub fn load_cwd() -> Result<Self> {
        let cwd = std::env::current_dir()?;
        Self::load(&cwd)
    }

    /// Resolve a path relative to the project root. Absolute paths pass through.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// The template to use: the argument if given, else the configured one.
    pub fn template_path(&self, arg: Option<&Path>) -> Result<PathBuf> {
        match pick(arg, self.config.template.as_deref()) {
            Some(path) => Ok(self.resolve(&path)),
            None => bail!("No template given and none configured in {CONFIG_FILE}"),
        }
    }

    pub fn read_template(&self, arg: Option<&Path>) -> Result<String> {
        let path = self.template_path(arg)?;
        fs::read_to_string(&path).with_context(|| format!("Failed to read template {}", path.display()))
    }

    /// The initial model: the argument or configured file, else an empty object.
    pub fn load_model(&self, arg: Option<&Path>) -> Result<Value> {
        match pick(arg, self.config.model.as_deref()) {
            Some(path) => read_json(&self.resolve(&path)),
            None => Ok(Value::Object(Default::default())),
        }
    }

    /// The raw mutation script, if one is given or configured.
    pub fn load_ops(&self, arg: Option<&Path>) -> Result<Option<Value>> {
        pick(arg, self.config.ops.as_deref())
            .map(|path| read_json(&self.resolve(&path)))
            .transpose()
    }
}

fn pick(arg: Option<&Path>, configured: Option<&str>) -> Option<PathBuf> {
    arg.map(Path::to_path_buf).or_else(|| configured.map(PathBuf::from))
}

fn read_json(path: &Path) -> Result<Value> {
    let raw = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}
