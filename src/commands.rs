//! # Commands: reserved names handled by local control logic.
//!
//! Every message reaching a worker is offered to the [`CommandDispatcher`]
//! first. What happens to a name that is not a command depends on where it
//! arrived:
//!
//! ```text
//! event channel (Bridge)          control port (Worker)
//!   command? ─► run, reply          command? ─► run, reply
//!   else     ─► publish External    else service op? ─► invoke, reply
//!                                   else ─► warn, drop
//! ```
//!
//! | Name         | Argument          | Reply                                  |
//! |--------------|-------------------|----------------------------------------|
//! | `shutdown`   | exit code or none | none; the worker stops with that code  |
//! | `showData`   | model name        | `list_sync()` of that model            |
//! | `showEvents` | ignored           | broker history, oldest first           |

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::Value;

use crate::broker::{Broker, panic_message};
use crate::core::ShutdownSignal;
use crate::error::{RuntimeError, ServiceError};
use crate::messages::{Envelope, ReplyMode};
use crate::service::Service;
use crate::storage::DataSources;

/// The fixed command set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Stop the worker with an exit code.
    Shutdown(i32),
    /// List the cached records of a model.
    ShowData(String),
    /// List the events recorded by the broker.
    ShowEvents,
}

impl Command {
    pub const SHUTDOWN: &'static str = "shutdown";
    pub const SHOW_DATA: &'static str = "showData";
    pub const SHOW_EVENTS: &'static str = "showEvents";

    /// True when `name` belongs to the command set.
    pub fn is_reserved(name: &str) -> bool {
        matches!(name, Self::SHUTDOWN | Self::SHOW_DATA | Self::SHOW_EVENTS)
    }

    /// Parses `{name, data}`.
    ///
    /// `None` when the name is not a command; `Some(Err)` when it is one but
    /// the argument has the wrong shape.
    pub fn parse(name: &str, data: &Value) -> Option<Result<Command, RuntimeError>> {
        let cmd = match name {
            Self::SHUTDOWN => Ok(Command::Shutdown(exit_code(data))),
            Self::SHOW_DATA => match data {
                Value::String(model) => Ok(Command::ShowData(model.clone())),
                other => Err(RuntimeError::InvalidArgument {
                    command: Self::SHOW_DATA,
                    reason: format!("expected a model name, got {other}"),
                }),
            },
            Self::SHOW_EVENTS => Ok(Command::ShowEvents),
            _ => return None,
        };
        Some(cmd)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Shutdown(_) => Self::SHUTDOWN,
            Command::ShowData(_) => Self::SHOW_DATA,
            Command::ShowEvents => Self::SHOW_EVENTS,
        }
    }
}

/// Exit code carried by `shutdown`: absent, `null`, `false` and `0` mean `0`.
fn exit_code(data: &Value) -> i32 {
    match data {
        Value::Null | Value::Bool(false) => 0,
        Value::Number(n) => match n
            .as_i64()
            .and_then(|c| i32::try_from(c).ok())
            .or_else(|| integral_f64(n.as_f64()?))
        {
            Some(code) => code,
            None => {
                tracing::warn!(code = %n, "shutdown code out of range; using 0");
                0
            }
        },
        other => {
            tracing::warn!(code = %other, "shutdown code is not a number; using 0");
            0
        }
    }
}

/// `3.0` counts as `3`; fractions and out-of-range values do not.
fn integral_f64(f: f64) -> Option<i32> {
    let in_range = f >= f64::from(i32::MIN) && f <= f64::from(i32::MAX);
    (f.fract() == 0.0 && in_range).then_some(f as i32)
}

/// Result of routing one control-port message.
///
/// Exactly one variant is produced per message.
#[derive(Debug)]
pub enum Dispatch {
    /// A command ran; `Ok(None)` means it yields nothing to send back.
    Command(Result<Option<Value>, RuntimeError>),
    /// A service operation was invoked.
    Service(Result<Value, RuntimeError>),
    /// Neither a command nor an operation of the bound service.
    Dropped(RuntimeError),
}

impl Dispatch {
    /// Reply to send back, shaped by `mode`.
    pub fn into_reply(self, mode: ReplyMode) -> Option<Value> {
        match self {
            Dispatch::Command(Ok(out)) => out.map(|v| mode.ok(v)),
            Dispatch::Service(Ok(v)) => Some(mode.ok(v)),
            Dispatch::Command(Err(e)) | Dispatch::Service(Err(e)) | Dispatch::Dropped(e) => {
                mode.error(&e)
            }
        }
    }
}

/// Runs commands against the state of one worker.
#[derive(Clone)]
pub struct CommandDispatcher {
    broker: Arc<Broker>,
    datasources: Arc<DataSources>,
    shutdown: ShutdownSignal,
}

impl CommandDispatcher {
    pub fn new(
        broker: Arc<Broker>,
        datasources: Arc<DataSources>,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            broker,
            datasources,
            shutdown,
        }
    }

    /// Runs `cmd`. `Ok(Some(v))` is sent back to the caller.
    pub async fn run(&self, cmd: Command) -> Result<Option<Value>, RuntimeError> {
        match cmd {
            Command::Shutdown(code) => {
                tracing::info!(code, "shutdown requested");
                self.shutdown.request(code);
                Ok(None)
            }
            Command::ShowData(model) => {
                let ds = self
                    .datasources
                    .get(&model)
                    .ok_or(RuntimeError::UnknownModel { name: model })?;
                Ok(Some(Value::Array(ds.list_sync())))
            }
            Command::ShowEvents => {
                let events = self.broker.events().await;
                Ok(Some(Value::Array(
                    events.iter().map(|e| e.to_record()).collect(),
                )))
            }
        }
    }

    /// Runs `{name, data}` if it is a command; `None` otherwise.
    pub async fn try_run(
        &self,
        name: &str,
        data: &Value,
    ) -> Option<Result<Option<Value>, RuntimeError>> {
        let parsed = Command::parse(name, data)?;
        Some(match parsed {
            Ok(cmd) => self.run(cmd).await,
            Err(e) => Err(e),
        })
    }

    /// Routes a control-port message: command, then service operation, then drop.
    pub async fn dispatch(&self, msg: Envelope, service: Option<&Arc<dyn Service>>) -> Dispatch {
        if let Some(res) = self.try_run(&msg.name, &msg.data).await {
            if let Err(e) = &res {
                tracing::warn!(command = %msg.name, label = e.as_label(), error = %e, "command failed");
            }
            return Dispatch::Command(res);
        }

        let Some(service) = service.filter(|s| s.has_operation(&msg.name)) else {
            let err = if service.is_none() {
                RuntimeError::NotBound
            } else {
                RuntimeError::UnknownOperation {
                    name: msg.name.clone(),
                }
            };
            tracing::warn!(name = %msg.name, label = err.as_label(), "not a service function; dropped");
            return Dispatch::Dropped(err);
        };

        let res = invoke_isolated(service, &msg.name, msg.data).await;
        if let Err(e) = &res {
            tracing::warn!(operation = %msg.name, label = e.as_label(), error = %e, "service invocation failed");
        }
        Dispatch::Service(res.map_err(RuntimeError::from))
    }
}

/// Invokes an operation; a panic inside it becomes [`ServiceError::Fail`].
async fn invoke_isolated(
    service: &Arc<dyn Service>,
    name: &str,
    data: Value,
) -> Result<Value, ServiceError> {
    match AssertUnwindSafe(service.invoke(name, data))
        .catch_unwind()
        .await
    {
        Ok(res) => res,
        Err(panic_err) => Err(ServiceError::fail(
            name,
            format!("panicked: {}", panic_message(&*panic_err)),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{OperationFn, ServiceTable};
    use crate::storage::{MemoryDataSource, Model};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn dispatcher() -> (CommandDispatcher, ShutdownSignal) {
        let ds = MemoryDataSource::new("Customer").with_records([
            Model::new("Customer", "1", json!({"id": "1", "name": "Ada"})),
            Model::new("Customer", "2", json!({"id": "2", "name": "Grace"})),
        ]);
        let shutdown = ShutdownSignal::new();
        let d = CommandDispatcher::new(
            Arc::new(Broker::new()),
            Arc::new(DataSources::new().with(Arc::new(ds))),
            shutdown.clone(),
        );
        (d, shutdown)
    }

    #[test]
    fn shutdown_code_accepts_integral_floats() {
        assert_eq!(exit_code(&json!(3.0)), 3);
        assert_eq!(exit_code(&json!(-1.0)), -1);
        assert_eq!(exit_code(&json!(3.5)), 0);
        assert_eq!(exit_code(&json!(1e12)), 0);
        assert_eq!(
            Command::parse("shutdown", &json!(7.0)).unwrap().unwrap(),
            Command::Shutdown(7)
        );
    }

    #[test]
    fn parses_command_set() {
        assert_eq!(
            Command::parse("shutdown", &json!(3)).unwrap().unwrap(),
            Command::Shutdown(3)
        );
        assert_eq!(
            Command::parse("shutdown", &Value::Null).unwrap().unwrap(),
            Command::Shutdown(0)
        );
        assert_eq!(
            Command::parse("shutdown", &json!("soon")).unwrap().unwrap(),
            Command::Shutdown(0)
        );
        assert_eq!(
            Command::parse("showData", &json!("Customer")).unwrap().unwrap(),
            Command::ShowData("Customer".into())
        );
        assert!(Command::parse("showData", &json!(1)).unwrap().is_err());
        assert!(Command::parse("orderPlaced", &Value::Null).is_none());
    }

    #[tokio::test]
    async fn shutdown_carries_exit_code() {
        let (d, shutdown) = dispatcher();
        let out = d.try_run("shutdown", &json!(3)).await.unwrap().unwrap();
        assert_eq!(out, None);
        assert!(shutdown.is_requested());
        assert_eq!(shutdown.exit_code(), 3);
    }

    #[tokio::test]
    async fn show_data_lists_model_verbatim() {
        let (d, _) = dispatcher();
        let out = d.try_run("showData", &json!("Customer")).await.unwrap().unwrap();
        assert_eq!(
            out,
            Some(json!([{"id": "1", "name": "Ada"}, {"id": "2", "name": "Grace"}]))
        );

        let missing = d.try_run("showData", &json!("Order")).await.unwrap();
        assert!(matches!(missing, Err(RuntimeError::UnknownModel { .. })));
    }

    #[tokio::test]
    async fn show_events_returns_history() {
        let (d, _) = dispatcher();
        d.broker.notify("orderPlaced", json!({"id": 1})).await;
        let out = d.try_run("showEvents", &Value::Null).await.unwrap().unwrap().unwrap();
        let list = out.as_array().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0]["name"], "orderPlaced");
    }

    #[tokio::test]
    async fn command_wins_over_service_operation() {
        let (d, shutdown) = dispatcher();
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let svc: Arc<dyn Service> = Arc::new(
            ServiceTable::builder()
                .operation(OperationFn::arc("shutdown", move |_data: Value| {
                    let c = c.clone();
                    async move {
                        c.fetch_add(1, Ordering::SeqCst);
                        Ok::<_, String>(Value::Null)
                    }
                }))
                .build()
                .unwrap(),
        );

        let out = d.dispatch(Envelope::new("shutdown", json!(2)), Some(&svc)).await;
        assert!(matches!(out, Dispatch::Command(Ok(None))));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(shutdown.exit_code(), 2);
    }

    #[tokio::test]
    async fn falls_through_to_service_then_drop() {
        let (d, shutdown) = dispatcher();
        let svc: Arc<dyn Service> = Arc::new(
            ServiceTable::builder()
                .operation(OperationFn::arc("double", |data: Value| async move {
                    let n = data.as_i64().ok_or("expected a number")?;
                    Ok::<_, &str>(n * 2)
                }))
                .operation(OperationFn::arc("explode", |_data: Value| async move {
                    if true {
                        panic!("boom");
                    }
                    Ok::<_, String>(Value::Null)
                }))
                .build()
                .unwrap(),
        );

        let out = d.dispatch(Envelope::new("double", json!(21)), Some(&svc)).await;
        assert_eq!(out.into_reply(ReplyMode::Bare), Some(json!(42)));

        let out = d.dispatch(Envelope::new("frobnicate", json!(1)), Some(&svc)).await;
        assert!(matches!(out, Dispatch::Dropped(RuntimeError::UnknownOperation { .. })));
        assert_eq!(out.into_reply(ReplyMode::Bare), None);

        let out = d.dispatch(Envelope::new("double", json!(1)), None).await;
        assert!(matches!(out, Dispatch::Dropped(RuntimeError::NotBound)));

        let out = d.dispatch(Envelope::new("explode", Value::Null), Some(&svc)).await;
        assert!(matches!(out, Dispatch::Service(Err(_))));

        assert!(!shutdown.is_requested());
    }

    #[tokio::test]
    async fn enveloped_replies_report_failures() {
        let (d, _) = dispatcher();
        let out = d.dispatch(Envelope::new("frobnicate", Value::Null), None).await;
        let reply = out.into_reply(ReplyMode::Enveloped).unwrap();
        assert_eq!(reply["error"]["label"], "runtime_not_bound");

        let out = d.dispatch(Envelope::new("showData", json!("Customer")), None).await;
        let reply = out.into_reply(ReplyMode::Enveloped).unwrap();
        assert_eq!(reply["ok"].as_array().unwrap().len(), 2);
    }
}
