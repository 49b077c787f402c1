//! Named strategy persistence port trait.
//!
//! Strategies are stored as flat key/value records keyed by name; loading
//! tolerates unknown keys and fills missing ones with defaults, so the store
//! format survives config evolution.

use crate::domain::config::StrategyConfig;
use crate::domain::error::QuantlabError;

pub trait StrategyStore {
    /// Stored strategy names, sorted.
    fn list(&self) -> Result<Vec<String>, QuantlabError>;

    /// Loads one strategy; `UnknownStrategy` when the name is absent.
    fn load(&self, name: &str) -> Result<StrategyConfig, QuantlabError>;

    /// Saves under a name, overwriting any existing record.
    fn save(&self, name: &str, config: &StrategyConfig) -> Result<(), QuantlabError>;

    /// Removes a strategy; `UnknownStrategy` when the name is absent.
    fn delete(&self, name: &str) -> Result<(), QuantlabError>;
}
