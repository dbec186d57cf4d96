//! # Service layer seams.
//!
//! A worker invokes business logic only through a bound [`Service`]: a set of
//! named async operations taking one plain-data argument. The service is
//! produced by a [`Bind`] implementation while the worker is `Binding`.
//!
//! ## Contents
//! - [`Service`] capability interface: "operation by name"
//! - [`ServiceTable`] map of [`Operation`]s validated at bind time
//! - [`Operation`], [`OperationFn`] one operation, closure-backed
//! - [`Bind`], [`BindFn`], [`Prebound`] resolve the service (module loading is out of scope)

mod operation;
mod table;

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ServiceError;

pub use operation::{BoxOpFuture, Operation, OperationFn};
pub use table::{ServiceTable, ServiceTableBuilder};

/// Named async operations of the bound use-case layer.
#[async_trait]
pub trait Service: Send + Sync + 'static {
    /// Sorted operation names.
    fn operations(&self) -> Vec<String>;

    fn has_operation(&self, name: &str) -> bool;

    /// Runs operation `name` with `data`; the result is plain data.
    async fn invoke(&self, name: &str, data: Value) -> Result<Value, ServiceError>;
}

/// Resolves and binds the service of a worker.
#[async_trait]
pub trait Bind: Send + Sync + 'static {
    async fn bind(&self) -> Result<Arc<dyn Service>, ServiceError>;
}

/// Closure-backed binder; the closure runs once per binding attempt.
pub struct BindFn<F> {
    f: F,
}

impl<F, Fut> BindFn<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Arc<dyn Service>, ServiceError>> + Send + 'static,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }

    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

#[async_trait]
impl<F, Fut> Bind for BindFn<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Arc<dyn Service>, ServiceError>> + Send + 'static,
{
    async fn bind(&self) -> Result<Arc<dyn Service>, ServiceError> {
        (self.f)().await
    }
}

/// Binder that hands out an already-built service.
pub struct Prebound(pub Arc<dyn Service>);

#[async_trait]
impl Bind for Prebound {
    async fn bind(&self) -> Result<Arc<dyn Service>, ServiceError> {
        Ok(self.0.clone())
    }
}
