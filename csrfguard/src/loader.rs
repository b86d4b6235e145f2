// Configuration file loaders

use crate::config::{ActionSpec, GuardConfig};
use crate::error::{GuardError, Result};
use crate::matcher::PathPattern;
use std::fs;
use std::path::Path;

const PROPERTY_PREFIX: &str = "org.owasp.csrfguard.";
const ACTION_PREFIX: &str = "org.owasp.csrfguard.action.";
const UNPROTECTED_PAGE_PREFIX: &str = "org.owasp.csrfguard.unprotected.";

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FileFormat {
    /// Java-style `key=value` properties using the `org.owasp.csrfguard.*` keys
    Properties,
    Toml,
}

impl FileFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "properties" => Some(FileFormat::Properties),
            "toml" => Some(FileFormat::Toml),
            _ => None,
        }
    }
}

/// Guard configuration loader
pub struct ConfigLoader {
    format: FileFormat,
}

impl ConfigLoader {
    pub fn new(format: FileFormat) -> Self {
        Self { format }
    }

    /// Auto-detect format from file extension
    pub fn auto(path: &str) -> Result<Self> {
        let ext = Path::new(path)
            .extension()
            .and_then(|s| s.to_str())
            .ok_or_else(|| GuardError::config(format!("no file extension found on {path}")))?;

        let format = FileFormat::from_extension(ext)
            .ok_or_else(|| GuardError::config(format!("unsupported config format: {ext}")))?;

        Ok(Self::new(format))
    }

    /// Load and validate configuration from a file
    pub fn load_file(&self, path: &str) -> Result<GuardConfig> {
        let content = fs::read_to_string(path)
            .map_err(|e| GuardError::config(format!("unable to read {path}: {e}")))?;

        self.parse(&content)
    }

    /// Parse and validate configuration from a string
    pub fn parse(&self, content: &str) -> Result<GuardConfig> {
        let config = match self.format {
            FileFormat::Properties => parse_properties(content)?,
            FileFormat::Toml => toml::from_str(content)
                .map_err(|e| GuardError::config(format!("TOML parse error: {e}")))?,
        };

        config.validate()?;
        Ok(config)
    }
}

/// Split properties text into ordered key/value pairs.
fn property_pairs(content: &str) -> Vec<(&str, &str)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('!'))
        .filter_map(|line| {
            let split = line.find(['=', ':'])?;
            Some((line[..split].trim(), line[split + 1..].trim()))
        })
        .collect()
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(GuardError::config(format!(
            "{key} must be true or false, got '{value}'"
        ))),
    }
}

fn parse_properties(content: &str) -> Result<GuardConfig> {
    let pairs = property_pairs(content);
    let mut config = GuardConfig::default();

    for &(key, value) in &pairs {
        if key.starts_with(ACTION_PREFIX) || key.starts_with(UNPROTECTED_PAGE_PREFIX) {
            continue;
        }
        let Some(setting) = key.strip_prefix(PROPERTY_PREFIX) else {
            continue;
        };

        match setting {
            "TokenName" => config.token_name = value.to_string(),
            "TokenLength" => {
                config.token_length = value.parse().map_err(|_| {
                    GuardError::config(format!(
                        "TokenLength must be a positive integer, got '{value}'"
                    ))
                })?;
            }
            "Rotate" => config.rotate = parse_bool(key, value)?,
            "TokenPerPage" => config.token_per_page = parse_bool(key, value)?,
            "Ajax" => config.ajax = parse_bool(key, value)?,
            "SessionKey" => config.session_key = value.to_string(),
            "NewTokenLandingPage" => config.landing_page = Some(value.to_string()),
            "AjaxHeader" => config.ajax_header = value.to_string(),
            // Logger and PRNG are chosen in code
            _ => tracing::debug!(key = %key, "Ignoring unrecognised property"),
        }
    }

    // first pass: declare actions in file order
    for &(key, value) in &pairs {
        if let Some(directive) = key.strip_prefix(ACTION_PREFIX) {
            if !directive.contains('.') {
                config.actions.push(ActionSpec::new(directive, value));
            }
        }
    }

    // second pass: attach parameters
    for &(key, value) in &pairs {
        let Some(directive) = key.strip_prefix(ACTION_PREFIX) else {
            continue;
        };
        let Some((action_name, parameter)) = directive.split_once('.') else {
            continue;
        };

        let action = config
            .actions
            .iter_mut()
            .find(|action| action.name == action_name)
            .ok_or_else(|| {
                GuardError::config(format!(
                    "action class {action_name} has not yet been specified"
                ))
            })?;
        action.parameters.insert(parameter.to_string(), value.to_string());
    }

    for &(key, value) in &pairs {
        if let Some(directive) = key.strip_prefix(UNPROTECTED_PAGE_PREFIX) {
            if !directive.contains('.') {
                config.unprotected_pages.push(PathPattern::parse(value)?);
            }
        }
    }

    Ok(config)
}
