use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::commands::Command;
use crate::error::ServiceError;
use crate::service::{Operation, Service};

/// Service built from a validated set of named operations.
#[derive(Clone, Default)]
pub struct ServiceTable {
    ops: HashMap<String, Arc<dyn Operation>>,
}

impl ServiceTable {
    pub fn builder() -> ServiceTableBuilder {
        ServiceTableBuilder::default()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

#[async_trait]
impl Service for ServiceTable {
    fn operations(&self) -> Vec<String> {
        let mut names: Vec<String> = self.ops.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    fn has_operation(&self, name: &str) -> bool {
        self.ops.contains_key(name)
    }

    async fn invoke(&self, name: &str, data: Value) -> Result<Value, ServiceError> {
        match self.ops.get(name) {
            Some(op) => op.call(data).await,
            None => Err(ServiceError::fail(name, "no such operation")),
        }
    }
}

/// Collects operations; [`build`](Self::build) validates the set.
#[derive(Default)]
pub struct ServiceTableBuilder {
    ops: Vec<Arc<dyn Operation>>,
}

impl ServiceTableBuilder {
    pub fn operation(mut self, op: Arc<dyn Operation>) -> Self {
        self.ops.push(op);
        self
    }

    /// Validates and freezes the table.
    ///
    /// Rejects empty and duplicate names. A name that is also a command is
    /// accepted with a warning: the command always wins at dispatch.
    pub fn build(self) -> Result<ServiceTable, ServiceError> {
        let mut ops = HashMap::with_capacity(self.ops.len());
        for op in self.ops {
            let name = op.name().to_string();
            if name.is_empty() {
                return Err(ServiceError::InvalidTable {
                    reason: "operation with empty name".into(),
                });
            }
            if Command::is_reserved(&name) {
                tracing::warn!(operation = %name, "operation is shadowed by a command and will never be invoked");
            }
            if ops.insert(name.clone(), op).is_some() {
                return Err(ServiceError::InvalidTable {
                    reason: format!("duplicate operation '{name}'"),
                });
            }
        }
        Ok(ServiceTable { ops })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::OperationFn;
    use serde_json::json;

    fn echo(name: &'static str) -> Arc<dyn Operation> {
        OperationFn::arc(name, |data: Value| async move { Ok::<_, String>(data) })
    }

    #[tokio::test]
    async fn dispatches_by_name() {
        let table = ServiceTable::builder()
            .operation(echo("a"))
            .operation(echo("b"))
            .build()
            .unwrap();

        assert_eq!(table.operations(), vec!["a", "b"]);
        assert!(table.has_operation("a"));
        assert!(!table.has_operation("c"));
        assert_eq!(table.invoke("b", json!(5)).await.unwrap(), json!(5));
        assert!(table.invoke("c", json!(5)).await.is_err());
    }

    #[test]
    fn rejects_duplicates_and_empty_names() {
        let dup = ServiceTable::builder()
            .operation(echo("a"))
            .operation(echo("a"))
            .build();
        assert!(matches!(dup, Err(ServiceError::InvalidTable { .. })));

        let empty = ServiceTable::builder().operation(echo("")).build();
        assert!(matches!(empty, Err(ServiceError::InvalidTable { .. })));
    }

    #[test]
    fn shadowed_operation_is_kept() {
        let table = ServiceTable::builder()
            .operation(echo("showData"))
            .build()
            .unwrap();
        assert!(table.has_operation("showData"));
    }
}
