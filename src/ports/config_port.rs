//! Configuration access port trait.
//!
//! Typed getters return `Ok(None)` for an absent or blank key and
//! `ConfigInvalid` for a value that does not parse; range checks belong to
//! [`EngineConfig::validate`].
//!
//! [`EngineConfig::validate`]: crate::domain::config::EngineConfig::validate

use crate::domain::error::EngineError;

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_int(&self, section: &str, key: &str) -> Result<Option<i64>, EngineError>;
    fn get_double(&self, section: &str, key: &str) -> Result<Option<f64>, EngineError>;
    fn get_bool(&self, section: &str, key: &str) -> Result<Option<bool>, EngineError>;
}
