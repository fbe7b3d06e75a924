use std::cell::{
    Cell,
    RefCell,
    RefMut
};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::Deserialize;

use crate::manager::managererror::ManagerError;
use crate::manager::manager::{
    IManager,
    Manager
};
use crate::math::symbolic::segmentfunction::{
    SegmentFunction,
    SegmentFunctionJsonProp
};
use crate::settings::EngineSettings;

#[derive(Deserialize)]
struct ConfigurationJsonProp {
    #[serde(default)]
    settings: EngineSettings,
    #[serde(default)]
    segment_function: Vec<serde_json::Value>,
}

/// `name` 以外的欄位即為 segment function 本身；項目不合法時回傳 `ManagerError::Symbolic`。
fn segment_function_from_json(json_value: serde_json::Value) -> Result<SegmentFunction, ManagerError> {
    let prop: SegmentFunctionJsonProp = serde_json::from_value(json_value)?;
    Ok(SegmentFunction::try_from(prop)?)
}

/// 由 JSON 讀入的引擎設定與具名 segment function。
///
/// ```json
/// { "settings": { "max_antiderivative_depth": 64 },
///   "segment_function": [
///     { "name": "discount",
///       "terms": [ { "exp_coef": -0.03, "coefficients": [1.0] } ] } ] }
/// ```
pub struct Configuration {
    settings_cell: Cell<EngineSettings>,
    segment_function_manager_cell: RefCell<Manager<SegmentFunction>>,
}

impl Configuration {
    pub fn new() -> Configuration {
        Configuration {
            settings_cell: Cell::new(EngineSettings::default()),
            segment_function_manager_cell: RefCell::new(Manager::new(segment_function_from_json)),
        }
    }

    pub fn settings(&self) -> EngineSettings {
        self.settings_cell.get()
    }

    pub fn segment_function_manager(&self) -> RefMut<'_, Manager<SegmentFunction>> {
        self.segment_function_manager_cell.borrow_mut()
    }

    pub fn segment_function(&self, name: &str) -> Result<SegmentFunction, ManagerError> {
        self.segment_function_manager().get(name)
    }

    pub fn from_reader(&self, file_path: impl AsRef<Path>) -> Result<(), ManagerError> {
        let file = File::open(file_path.as_ref())?;
        let reader = BufReader::new(file);
        let json_prop: ConfigurationJsonProp = serde_json::from_reader(reader)?;
        self.load(json_prop)?;
        log::info!("configuration loaded from {}", file_path.as_ref().display());
        Ok(())
    }

    pub fn from_json_str(&self, json_text: &str) -> Result<(), ManagerError> {
        let json_prop: ConfigurationJsonProp = serde_json::from_str(json_text)?;
        self.load(json_prop)
    }

    fn load(&self, json_prop: ConfigurationJsonProp) -> Result<(), ManagerError> {
        let manager = self.segment_function_manager();
        manager.insert_obj_from_json_vec(&json_prop.segment_function)?;
        self.settings_cell.set(json_prop.settings);
        log::info!(
            "configuration: {} segment functions, max antiderivative depth {}",
            manager.len(),
            json_prop.settings.max_antiderivative_depth
        );
        Ok(())
    }
}

impl Default for Configuration {
    fn default() -> Configuration {
        Configuration::new()
    }
}
