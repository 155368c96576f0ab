//! Record: one Model instance as a field-name → value mapping.

use crate::error::AppError;
use crate::model::registry::ModelDef;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Relationship fields hold the nested related record once resolved; until then they are absent.
#[derive(Clone, Debug)]
pub struct Record {
    model: Arc<ModelDef>,
    values: Map<String, Value>,
}

impl Record {
    pub fn new(model: Arc<ModelDef>) -> Self {
        Record {
            model,
            values: Map::new(),
        }
    }

    /// Populate from external input. Body must be a JSON object whose keys are declared fields.
    pub fn load(model: Arc<ModelDef>, data: &Value) -> Result<Self, AppError> {
        let obj = data
            .as_object()
            .ok_or_else(|| AppError::BadRequest("body must be a JSON object".into()))?;
        let mut record = Record::new(model);
        for (k, v) in obj {
            record.set(k, v.clone())?;
        }
        Ok(record)
    }

    pub fn set(&mut self, field: &str, value: Value) -> Result<(), AppError> {
        if self.model.field(field).is_none() {
            return Err(AppError::BadRequest(format!(
                "unknown field '{}' for {}",
                field,
                self.model.name()
            )));
        }
        self.values.insert(field.to_string(), value);
        Ok(())
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    pub fn model(&self) -> &Arc<ModelDef> {
        &self.model
    }

    /// JSON object of the set fields; unset fields are omitted.
    pub fn dump(&self) -> Value {
        let mut out = Map::new();
        for (name, _) in self.model.fields() {
            if let Some(v) = self.values.get(name) {
                out.insert(name.to_string(), v.clone());
            }
        }
        Value::Object(out)
    }

    /// Same Model and equal values on every stored field.
    pub fn same_stored_values(&self, other: &Record) -> bool {
        self.model.table() == other.model.table()
            && self
                .model
                .stored_fields()
                .all(|(name, _)| self.get(name).unwrap_or(&Value::Null) == other.get(name).unwrap_or(&Value::Null))
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.model.table() == other.model.table() && self.values == other.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::field::{ColumnOptions, FieldDescriptor};
    use serde_json::json;

    fn user_model() -> Arc<ModelDef> {
        Arc::new(
            ModelDef::new(
                "UserModel",
                vec![
                    ("id_user", FieldDescriptor::uuid(ColumnOptions::new().primary_key())),
                    ("first_name", FieldDescriptor::string(255, ColumnOptions::new())),
                    ("test_id", FieldDescriptor::foreign_key("TestModel", "id_test", "UUID")),
                    ("test", FieldDescriptor::relationship("test_id")),
                ],
            )
            .unwrap(),
        )
    }

    #[test]
    fn load_then_dump() {
        let input = json!({ "test_id": "t1", "first_name": "Ada", "id_user": "u1" });
        let record = Record::load(user_model(), &input).unwrap();
        assert_eq!(record.get("first_name"), Some(&json!("Ada")));
        assert_eq!(record.get("test"), None);
        assert_eq!(record.dump(), input);
    }

    #[test]
    fn unknown_fields_rejected() {
        let err = Record::load(user_model(), &json!({ "password": "x" })).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        let err = Record::load(user_model(), &json!(["not", "an", "object"])).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn stored_value_comparison_ignores_relationships() {
        let model = user_model();
        let a = Record::load(model.clone(), &json!({ "id_user": "u1", "first_name": "Ada" })).unwrap();
        let mut b = a.clone();
        b.set("test", json!({ "id_test": "t1" })).unwrap();
        assert!(a.same_stored_values(&b));
        assert_ne!(a, b);
        b.set("first_name", json!("Grace")).unwrap();
        assert!(!a.same_stored_values(&b));
    }
}
