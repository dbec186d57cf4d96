//! # Named service operations.
//!
//! [`Operation`] is one async, one-argument entry point of a bound service.
//! [`OperationFn`] wraps a closure `F: Fn(Value) -> Fut`, producing a fresh
//! future per call; the typed result is converted to plain data before it
//! leaves the operation.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use serde_json::{Value, json};
//! use workerlink::service::{Operation, OperationFn};
//!
//! let op: Arc<dyn Operation> = OperationFn::arc("echo", |data: Value| async move {
//!     Ok::<_, String>(json!({ "echo": data }))
//! });
//! assert_eq!(op.name(), "echo");
//! ```

use std::borrow::Cow;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::Value;

use crate::codec;
use crate::error::ServiceError;

/// Boxed future returned by [`Operation::call`].
pub type BoxOpFuture = BoxFuture<'static, Result<Value, ServiceError>>;

/// One named operation of a service.
pub trait Operation: Send + Sync + 'static {
    /// Stable operation name; the key used for dispatch.
    fn name(&self) -> &str;

    /// Starts one invocation with `data` as the single argument.
    fn call(&self, data: Value) -> BoxOpFuture;
}

/// Function-backed operation.
#[derive(Debug)]
pub struct OperationFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> OperationFn<F> {
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the operation and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

impl<F, Fut, T, E> Operation for OperationFn<F>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Serialize + Send + 'static,
    E: Display + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn call(&self, data: Value) -> BoxOpFuture {
        let op = self.name.to_string();
        let fut = (self.f)(data);
        Box::pin(async move {
            let out = fut.await.map_err(|e| ServiceError::fail(op.as_str(), e))?;
            codec::to_plain(&out).map_err(|e| ServiceError::Unserializable {
                op,
                reason: e.to_string(),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::ser::{Error as _, Serializer};
    use serde_json::json;

    struct Handle;

    impl Serialize for Handle {
        fn serialize<S: Serializer>(&self, _s: S) -> Result<S::Ok, S::Error> {
            Err(S::Error::custom("handles are not data"))
        }
    }

    #[tokio::test]
    async fn typed_result_becomes_plain_data() {
        #[derive(Serialize)]
        struct Total {
            sum: i64,
        }
        let op = OperationFn::new("sum", |data: Value| async move {
            let xs: Vec<i64> = serde_json::from_value(data).map_err(|e| e.to_string())?;
            Ok::<_, String>(Total {
                sum: xs.iter().sum(),
            })
        });
        assert_eq!(op.call(json!([1, 2, 3])).await.unwrap(), json!({"sum": 6}));

        let err = op.call(json!("nope")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Fail { ref op, .. } if op == "sum"));
    }

    #[tokio::test]
    async fn unserializable_result_is_rejected() {
        let op = OperationFn::new("leak", |_data: Value| async { Ok::<_, String>(Handle) });
        let err = op.call(Value::Null).await.unwrap_err();
        assert_eq!(err.as_label(), "service_unserializable");
    }
}
