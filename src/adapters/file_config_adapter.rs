//! INI file configuration adapter.

use crate::domain::error::EngineError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, &path.display().to_string())
    }

    pub fn from_string(content: &str) -> Result<Self, EngineError> {
        Self::parse(content, "<string>")
    }

    fn parse(content: &str, file: &str) -> Result<Self, EngineError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| EngineError::ConfigParse {
                file: file.to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.trim().to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(true),
            "false" | "no" | "off" | "0" => Some(false),
            _ => None,
        }
    }

    fn typed<T>(&self, section: &str, key: &str) -> Result<Option<T>, EngineError>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.get_string(section, key)
            .map(|raw| {
                raw.parse().map_err(|e: T::Err| {
                    EngineError::invalid(section, key, format!("cannot parse '{raw}': {e}"))
                })
            })
            .transpose()
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config
            .get(section, key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn get_int(&self, section: &str, key: &str) -> Result<Option<i64>, EngineError> {
        self.typed(section, key)
    }

    fn get_double(&self, section: &str, key: &str) -> Result<Option<f64>, EngineError> {
        self.typed(section, key)
    }

    fn get_bool(&self, section: &str, key: &str) -> Result<Option<bool>, EngineError> {
        self.get_string(section, key)
            .map(|raw| {
                Self::parse_bool(&raw).ok_or_else(|| {
                    EngineError::invalid(section, key, format!("expected a boolean, got '{raw}'"))
                })
            })
            .transpose()
    }
}
