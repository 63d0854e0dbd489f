//! Data access port trait.

use crate::domain::error::EngineError;
use crate::domain::ohlcv::Series;
use crate::domain::timeframe::Timeframe;

pub trait DataPort {
    /// Load the series named `label`, tagging it with `timeframe`.
    ///
    /// Bars are returned in source order; integrity checks happen in the engine.
    fn load_series(&self, label: &str, timeframe: Timeframe) -> Result<Series, EngineError>;
}
