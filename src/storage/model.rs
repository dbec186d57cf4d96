use std::sync::Arc;

use serde_json::Value;

use crate::broker::Broker;
use crate::error::StorageError;
use crate::storage::DataSource;

/// A live model instance: a typed record of one model name.
#[derive(Clone, Debug, PartialEq)]
pub struct Model {
    /// Model type, e.g. `"Customer"`.
    pub model_name: String,
    /// Record identifier.
    pub id: String,
    /// Plain-data state.
    pub data: Value,
}

impl Model {
    pub fn new(model_name: impl Into<String>, id: impl Into<String>, data: Value) -> Self {
        Self {
            model_name: model_name.into(),
            id: id.into(),
            data,
        }
    }
}

/// Rehydrates plain data into live models.
///
/// Implementations may bind the model to the unit's broker (to raise domain
/// events) and to its datasource (for lazy relations).
pub trait ModelFactory: Send + Sync + 'static {
    fn load_model(
        &self,
        broker: &Arc<Broker>,
        datasource: &Arc<dyn DataSource>,
        raw: Value,
        model_name: &str,
    ) -> Result<Model, StorageError>;
}

/// Factory for models that are plain JSON objects with an optional `id` field.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlainModelFactory;

impl ModelFactory for PlainModelFactory {
    fn load_model(
        &self,
        _broker: &Arc<Broker>,
        _datasource: &Arc<dyn DataSource>,
        raw: Value,
        model_name: &str,
    ) -> Result<Model, StorageError> {
        let Value::Object(fields) = &raw else {
            return Err(StorageError::InvalidModel {
                model: model_name.to_string(),
                reason: "expected an object".to_string(),
            });
        };
        let id = match fields.get("id") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        };
        Ok(Model::new(model_name, id, raw))
    }
}
