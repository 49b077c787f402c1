//! JSON file strategy store adapter.
//!
//! The whole store is one JSON object, `name -> flat strategy record`. A
//! missing file reads as an empty store; saves rewrite the file.

use crate::domain::config::StrategyConfig;
use crate::domain::error::QuantlabError;
use crate::ports::strategy_store::StrategyStore;
use serde_json::{Map, Value};
use std::fs;
use std::path::PathBuf;

pub struct JsonStoreAdapter {
    path: PathBuf,
}

impl JsonStoreAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn read_map(&self) -> Result<Map<String, Value>, QuantlabError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&content).map_err(|e| QuantlabError::Store {
            reason: format!("malformed store {}: {}", self.path.display(), e),
        })
    }

    fn write_map(&self, map: &Map<String, Value>) -> Result<(), QuantlabError> {
        let content =
            serde_json::to_string_pretty(map).map_err(|e| QuantlabError::Store {
                reason: format!("serialize store: {}", e),
            })?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

impl StrategyStore for JsonStoreAdapter {
    fn list(&self) -> Result<Vec<String>, QuantlabError> {
        let mut names: Vec<String> = self.read_map()?.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn load(&self, name: &str) -> Result<StrategyConfig, QuantlabError> {
        let map = self.read_map()?;
        let record = map.get(name).ok_or_else(|| QuantlabError::UnknownStrategy {
            name: name.to_string(),
        })?;
        let config: StrategyConfig =
            serde_json::from_value(record.clone()).map_err(|e| QuantlabError::Store {
                reason: format!("malformed strategy \"{}\": {}", name, e),
            })?;
        config.validate()?;
        Ok(config)
    }

    fn save(&self, name: &str, config: &StrategyConfig) -> Result<(), QuantlabError> {
        config.validate()?;
        let mut map = self.read_map()?;
        let record = serde_json::to_value(config).map_err(|e| QuantlabError::Store {
            reason: format!("serialize strategy \"{}\": {}", name, e),
        })?;
        map.insert(name.to_string(), record);
        self.write_map(&map)
    }

    fn delete(&self, name: &str) -> Result<(), QuantlabError> {
        let mut map = self.read_map()?;
        if map.remove(name).is_none() {
            return Err(QuantlabError::UnknownStrategy {
                name: name.to_string(),
            });
        }
        self.write_map(&map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::SellOperator;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> JsonStoreAdapter {
        JsonStoreAdapter::new(dir.path().join("strategies.json"))
    }

    #[test]
    fn missing_file_is_empty_store() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn save_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let config = StrategyConfig {
            ma_buy: 60,
            sell_operator: SellOperator::Off,
            stop_loss_pct: 7.5,
            ..StrategyConfig::default()
        };
        store.save("dip buyer", &config).unwrap();

        let loaded = store.load("dip buyer").unwrap();
        assert_eq!(loaded, config);
        assert_eq!(store.list().unwrap(), vec!["dip buyer"]);
    }

    #[test]
    fn save_overwrites_existing_name() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store.save("s", &StrategyConfig::default()).unwrap();
        let updated = StrategyConfig {
            ma_buy: 99,
            ..StrategyConfig::default()
        };
        store.save("s", &updated).unwrap();

        assert_eq!(store.load("s").unwrap().ma_buy, 99);
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn unknown_name_errors() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert!(matches!(
            store.load("ghost"),
            Err(QuantlabError::UnknownStrategy { name }) if name == "ghost"
        ));
        assert!(matches!(
            store.delete("ghost"),
            Err(QuantlabError::UnknownStrategy { .. })
        ));
    }

    #[test]
    fn delete_removes_only_that_name() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.save("a", &StrategyConfig::default()).unwrap();
        store.save("b", &StrategyConfig::default()).unwrap();

        store.delete("a").unwrap();
        assert_eq!(store.list().unwrap(), vec!["b"]);
    }

    #[test]
    fn stored_records_tolerate_unknown_and_missing_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("strategies.json");
        fs::write(
            &path,
            r#"{"legacy": {"ma_buy": 33, "retired_knob": "x"}}"#,
        )
        .unwrap();
        let store = JsonStoreAdapter::new(path);

        let loaded = store.load("legacy").unwrap();
        assert_eq!(loaded.ma_buy, 33);
        assert_eq!(loaded.ma_sell, StrategyConfig::default().ma_sell);
    }

    #[test]
    fn malformed_store_file_errors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("strategies.json");
        fs::write(&path, "not json").unwrap();
        let store = JsonStoreAdapter::new(path);
        assert!(matches!(store.list(), Err(QuantlabError::Store { .. })));
    }
}
