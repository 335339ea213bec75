//! Flat key/value configuration of a [crate::RuleSet].
//!
//! It's usually a section of an `INI` file:
//!
//! ```ini
//! [rules]
//! event_types=open,exec
//! supported_discarders=open.filename,unlink.filename
//! reserved_rule_ids=ruleset_loaded
//! constant.ROOT_UID=0
//! ```

use std::{
    collections::HashMap,
    fmt::Display,
    path::Path,
    str::FromStr,
};

use secl_eval::Value;
use thiserror::Error;

use crate::opts::{ALL_EVENT_TYPES, Opts};

const EVENT_TYPES: &str = "event_types";
const SUPPORTED_DISCARDERS: &str = "supported_discarders";
const RESERVED_RULE_IDS: &str = "reserved_rule_ids";
const CONSTANT_PREFIX: &str = "constant.";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSetConfig {
    inner: HashMap<String, String>,
}

#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    #[error("{value} is not a valid value for field {field}: {err}")]
    InvalidValue {
        field: String,
        value: String,
        err: String,
    },
    #[error("error loading configuration: {0}")]
    Load(String),
    #[error("section [{0}] not found")]
    SectionNotFound(String),
}

impl RuleSetConfig {
    /// Reads `section` of an `INI` file.
    pub fn from_ini_file<P: AsRef<Path>>(path: P, section: &str) -> Result<Self, ConfigError> {
        let conf = ini::Ini::load_from_file(path.as_ref())
            .map_err(|err| ConfigError::Load(format!("{}: {err}", path.as_ref().display())))?;
        Self::from_ini(&conf, section)
    }

    /// Reads `section` of an `INI` document.
    pub fn from_ini_str(content: &str, section: &str) -> Result<Self, ConfigError> {
        let conf = ini::Ini::load_from_str(content).map_err(|err| ConfigError::Load(err.to_string()))?;
        Self::from_ini(&conf, section)
    }

    fn from_ini(conf: &ini::Ini, section: &str) -> Result<Self, ConfigError> {
        let prop = conf
            .section(Some(section))
            .ok_or_else(|| ConfigError::SectionNotFound(section.to_string()))?;

        let mut config = Self::default();
        for (key, value) in prop.iter() {
            log::debug!("{}.{}={}", section, key, value);
            config.insert(key.to_string(), value.to_string());
        }
        Ok(config)
    }

    /// Inserts a new configuration value.
    pub fn insert(&mut self, key: String, value: String) -> Option<String> {
        self.inner.insert(key, value)
    }

    /// Returns an option of raw configuration value.
    pub fn get_raw(&self, config_name: &str) -> Option<&str> {
        self.inner.get(config_name).map(String::as_str)
    }

    /// Return a comma separed list of values. Return empty vector if field is missing.
    pub fn get_list<T>(&self, config_name: &str) -> Result<Vec<T>, ConfigError>
    where
        T: FromStr,
        <T as FromStr>::Err: Display,
    {
        self.inner
            .get(config_name)
            .iter()
            .flat_map(|config| config.split(','))
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(|item| parse(item, config_name))
            .collect()
    }

    /// Return a comma separed list of values. Return default vector if field is missing.
    pub fn get_list_with_default<T>(
        &self,
        config_name: &str,
        default: Vec<T>,
    ) -> Result<Vec<T>, ConfigError>
    where
        T: FromStr,
        <T as FromStr>::Err: Display,
    {
        if self.inner.contains_key(config_name) {
            self.get_list(config_name)
        } else {
            Ok(default)
        }
    }

    /// `constant.<name>` entries, with the prefix stripped.
    pub fn constants(&self) -> HashMap<String, Value> {
        self.inner
            .iter()
            .filter_map(|(key, value)| {
                key.strip_prefix(CONSTANT_PREFIX)
                    .map(|name| (name.to_string(), Value::parse_loose(value.trim())))
            })
            .collect()
    }
}

fn parse<T>(value: &str, config_name: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    <T as FromStr>::Err: Display,
{
    T::from_str(value).map_err(|err| ConfigError::InvalidValue {
        field: config_name.to_string(),
        value: value.to_string(),
        err: err.to_string(),
    })
}

impl TryFrom<&RuleSetConfig> for Opts {
    type Error = ConfigError;

    fn try_from(config: &RuleSetConfig) -> Result<Self, Self::Error> {
        let event_types: Vec<String> =
            config.get_list_with_default(EVENT_TYPES, vec![ALL_EVENT_TYPES.to_string()])?;
        if event_types.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: EVENT_TYPES.to_string(),
                value: config.get_raw(EVENT_TYPES).unwrap_or_default().to_string(),
                err: "at least one event type is needed".to_string(),
            });
        }

        let supported_discarders = match config.get_raw(SUPPORTED_DISCARDERS) {
            Some(_) => Some(config.get_list::<String>(SUPPORTED_DISCARDERS)?),
            None => None,
        };

        let mut opts = Opts::default()
            .with_event_types(event_types)
            .with_reserved_rule_ids(config.get_list::<String>(RESERVED_RULE_IDS)?);
        opts.supported_discarders = supported_discarders.map(|fields| fields.into_iter().collect());
        opts.constants = config.constants();
        Ok(opts)
    }
}
