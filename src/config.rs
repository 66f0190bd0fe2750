//! Config Module for the Relay tag rewriter
//!
//! Loads the Relay project configuration the external generator also
//! reads, so rewriter and generator agree on artifact locations and
//! module format. Discovery order matches the generator's own:
//! `relay.config.json`, `.config/relay.config.json`, then the `relay`
//! key of `package.json`.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::rewrite::{CompileOptions, ModuleFormat};

pub const DEFAULT_CODEGEN_COMMAND: &str = "relay-compiler";

/// File names probed relative to the project root, in order.
const CONFIG_FILE_CANDIDATES: &[&str] = &["relay.config.json", ".config/relay.config.json"];

// ═══════════════════════════════════════════════════════════════════════════════
// CONFIG SHAPE
// ═══════════════════════════════════════════════════════════════════════════════

/// Single-project Relay configuration. Only the keys the rewriter acts
/// on are modeled; the generator's many other knobs pass through it
/// untouched and unvalidated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayConfig {
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub src: Option<String>,
    #[serde(default)]
    pub artifact_directory: Option<String>,
    #[serde(default)]
    pub codegen_command: Option<String>,
    #[serde(default, alias = "eagerESModules")]
    pub eager_es_modules: Option<bool>,
}

/// Multi-project configuration (the generator's `projects` form). The
/// rewriter needs one project picked out of it before it can derive
/// compile options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayMultiProjectConfig {
    #[serde(default)]
    pub root: Option<String>,
    #[serde(default)]
    pub sources: std::collections::BTreeMap<String, String>,
    pub projects: std::collections::BTreeMap<String, RelayConfig>,
}

/// Either config shape. Multi-project is tried first since its required
/// `projects` key never appears in the single-project form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RelayConfigFile {
    MultiProject(RelayMultiProjectConfig),
    SingleProject(RelayConfig),
}

impl RelayConfigFile {
    /// Resolve to a single project's config. `project` is required for
    /// the multi-project form and ignored otherwise.
    pub fn project_config(&self, project: Option<&str>) -> Result<RelayConfig, ConfigError> {
        match self {
            RelayConfigFile::SingleProject(config) => Ok(config.clone()),
            RelayConfigFile::MultiProject(multi) => {
                let name = project.ok_or(ConfigError::ProjectRequired)?;
                multi
                    .projects
                    .get(name)
                    .cloned()
                    .ok_or_else(|| ConfigError::UnknownProject {
                        project: name.to_string(),
                        available: multi.projects.keys().cloned().collect(),
                    })
            }
        }
    }
}

impl RelayConfig {
    /// Derive rewrite options. Module format defaults to CommonJS, the
    /// generator's own default, flipping to ES modules only when the
    /// config opts in.
    pub fn compile_options(&self, is_development: bool) -> CompileOptions {
        CompileOptions {
            module: if self.eager_es_modules.unwrap_or(false) {
                ModuleFormat::EsModule
            } else {
                ModuleFormat::CommonJs
            },
            codegen_command: self
                .codegen_command
                .clone()
                .unwrap_or_else(|| DEFAULT_CODEGEN_COMMAND.to_string()),
            is_development,
            artifact_directory: self.artifact_directory.clone(),
            omit_tag_import: false,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DISCOVERY
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
pub enum ConfigError {
    Io { path: String, message: String },
    Parse { path: String, message: String },
    ProjectRequired,
    UnknownProject { project: String, available: Vec<String> },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, message } => write!(f, "failed to read {}: {}", path, message),
            ConfigError::Parse { path, message } => {
                write!(f, "failed to parse {}: {}", path, message)
            }
            ConfigError::ProjectRequired => {
                write!(f, "multi-project relay config requires a project name")
            }
            ConfigError::UnknownProject { project, available } => write!(
                f,
                "unknown relay project `{}` (available: {})",
                project,
                available.join(", ")
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Locate and parse the project's Relay config. Returns the parsed
/// config and the path it came from, for `--config` forwarding. A
/// project with no config at all is `Ok(None)`: everything the rewriter
/// needs has a default.
pub fn load_config(root: &str) -> Result<Option<(RelayConfigFile, PathBuf)>, ConfigError> {
    for candidate in CONFIG_FILE_CANDIDATES {
        let path = Path::new(root).join(candidate);
        if !path.is_file() {
            continue;
        }
        let text = fs::read_to_string(&path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let config = parse_config(&text, &path)?;
        return Ok(Some((config, path)));
    }

    // Fall back to the `relay` key of package.json.
    let package_json = Path::new(root).join("package.json");
    if package_json.is_file() {
        let text = fs::read_to_string(&package_json).map_err(|e| ConfigError::Io {
            path: package_json.display().to_string(),
            message: e.to_string(),
        })?;
        let value: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| ConfigError::Parse {
                path: package_json.display().to_string(),
                message: e.to_string(),
            })?;
        if let Some(relay) = value.get("relay") {
            let config = serde_json::from_value(relay.clone()).map_err(|e| ConfigError::Parse {
                path: package_json.display().to_string(),
                message: e.to_string(),
            })?;
            return Ok(Some((config, package_json)));
        }
    }

    Ok(None)
}

fn parse_config(text: &str, path: &Path) -> Result<RelayConfigFile, ConfigError> {
    serde_json::from_str(text).map_err(|e| ConfigError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
