use std::cell::{
    Ref,
    RefCell
};
use std::collections::HashMap;

use serde::Deserialize;

use super::managererror::ManagerError;

/// 以名稱索引的物件庫，物件由 JSON 建立。
pub trait IManager<V> where
    V: Clone {
    fn map(&self) -> Ref<'_, HashMap<String, V>>;

    fn insert(&self, name: String, value: V) -> Result<(), ManagerError>;

    fn insert_obj_from_json(&self, json_value: serde_json::Value) -> Result<(), ManagerError>;

    fn get(&self, name: &str) -> Result<V, ManagerError> {
        self.map()
            .get(name)
            .cloned()
            .ok_or_else(|| ManagerError::map_elem_not_found(name))
    }

    fn contains(&self, name: &str) -> bool {
        self.map().contains_key(name)
    }

    /// 依名稱排序
    fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.map().keys().cloned().collect();
        names.sort();
        names
    }

    fn insert_obj_from_json_vec(&self, json_vec: &[serde_json::Value]) -> Result<(), ManagerError> {
        for json_value in json_vec {
            self.insert_obj_from_json(json_value.clone())?;
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct NamedJsonObject {
    name: String,
}

pub struct Manager<V> {
    map_cell: RefCell<HashMap<String, V>>,
    get_obj_from_json: fn(serde_json::Value) -> Result<V, ManagerError>,
}

impl<V> Manager<V> where
    V: Clone {
    pub fn new(get_obj_from_json: fn(serde_json::Value) -> Result<V, ManagerError>) -> Manager<V> {
        Manager { map_cell: RefCell::new(HashMap::new()), get_obj_from_json }
    }

    pub fn len(&self) -> usize {
        self.map_cell.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map_cell.borrow().is_empty()
    }
}

impl<V> IManager<V> for Manager<V> where
    V: Clone {
    fn map(&self) -> Ref<'_, HashMap<String, V>> {
        self.map_cell.borrow()
    }

    /// 同名物件只允許定義一次
    fn insert(&self, name: String, value: V) -> Result<(), ManagerError> {
        let mut map = self.map_cell.borrow_mut();
        if map.contains_key(&name) {
            return Err(ManagerError::DuplicateNameError(name));
        }
        map.insert(name, value);
        Ok(())
    }

    fn insert_obj_from_json(&self, json_value: serde_json::Value) -> Result<(), ManagerError> {
        let named_object: NamedJsonObject = serde_json::from_value(json_value.clone())?;
        let value = (self.get_obj_from_json)(json_value)?;
        self.insert(named_object.name, value)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn parse_number(json_value: serde_json::Value) -> Result<f64, ManagerError> {
        #[derive(Deserialize)]
        struct NumberJsonProp {
            value: f64,
        }
        let prop: NumberJsonProp = serde_json::from_value(json_value)?;
        Ok(prop.value)
    }

    #[test]
    fn inserts_and_looks_up_by_name() {
        let manager = Manager::new(parse_number);
        manager
            .insert_obj_from_json_vec(&[
                json!({"name": "b", "value": 2.0}),
                json!({"name": "a", "value": 1.0}),
            ])
            .unwrap();
        assert_eq!(manager.len(), 2);
        assert_eq!(manager.get("a").unwrap(), 1.0);
        assert_eq!(manager.names(), vec!["a".to_owned(), "b".to_owned()]);
        assert!(matches!(manager.get("c"), Err(ManagerError::NameNotFoundError(_))));
    }

    #[test]
    fn rejects_duplicates_and_unnamed_objects() {
        let manager = Manager::new(parse_number);
        manager.insert("a".to_owned(), 1.0).unwrap();
        assert!(matches!(
            manager.insert_obj_from_json(json!({"name": "a", "value": 3.0})),
            Err(ManagerError::DuplicateNameError(_))
        ));
        assert!(matches!(
            manager.insert_obj_from_json(json!({"value": 3.0})),
            Err(ManagerError::JsonParseError(_))
        ));
        assert_eq!(manager.get("a").unwrap(), 1.0);
    }
}
