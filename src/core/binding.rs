//! # Service binding with retries.
//!
//! ```text
//! loop attempt = 0..attempts {
//!   ├─► binder.bind()   (panic → failure)
//!   │     ├─► Ok(service) → return
//!   │     └─► Err(e)      → warn
//!   └─► if attempts left:
//!        └─► sleep(backoff.next(attempt))   (cancellable)
//! }
//! → RuntimeError::BindingFailed { attempts, reason }
//! ```
//!
//! ## Rules
//! - Attempts run **sequentially**.
//! - Cancellation interrupts a running attempt and the backoff sleep.
//! - Failing to bind never ends the worker; the caller stays unbound.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::{select, time};
use tokio_util::sync::CancellationToken;

use crate::broker::panic_message;
use crate::error::RuntimeError;
use crate::policies::BackoffPolicy;
use crate::service::{Bind, Service};

/// Binds a service, retrying up to `attempts` times.
pub(crate) async fn bind_with_retry(
    binder: &dyn Bind,
    attempts: u32,
    backoff: &BackoffPolicy,
    token: &CancellationToken,
    unit: u32,
) -> Result<Arc<dyn Service>, RuntimeError> {
    let attempts = attempts.max(1);
    let mut done = 0;
    let mut reason = String::from("cancelled before first attempt");

    for attempt in 0..attempts {
        if token.is_cancelled() {
            break;
        }
        done += 1;

        let outcome = select! {
            out = AssertUnwindSafe(binder.bind()).catch_unwind() => out,
            _ = token.cancelled() => {
                reason = String::from("cancelled during binding");
                break;
            }
        };
        let res = match outcome {
            Ok(res) => res.map_err(|e| e.to_string()),
            Err(panic_err) => Err(format!("binder panicked: {}", panic_message(&*panic_err))),
        };
        match res {
            Ok(service) => {
                tracing::info!(unit, attempt = done, operations = ?service.operations(), "service bound");
                return Ok(service);
            }
            Err(e) => {
                tracing::warn!(unit, attempt = done, error = %e, "service binding failed");
                reason = e;
            }
        }

        if attempt + 1 < attempts {
            let delay = backoff.next(attempt);
            let sleep = time::sleep(delay);
            tokio::pin!(sleep);
            select! {
                _ = &mut sleep => {}
                _ = token.cancelled() => break,
            }
        }
    }

    Err(RuntimeError::BindingFailed {
        attempts: done,
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::policies::JitterPolicy;
    use crate::service::{BindFn, ServiceTable};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn fast() -> BackoffPolicy {
        BackoffPolicy {
            first: Duration::from_millis(1),
            max: Duration::from_millis(5),
            factor: 2.0,
            jitter: JitterPolicy::None,
        }
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let binder = BindFn::new(move || {
            let n = c.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    return Err(ServiceError::InvalidTable {
                        reason: "module not found".into(),
                    });
                }
                let svc: Arc<dyn Service> = Arc::new(ServiceTable::default());
                Ok(svc)
            }
        });

        let token = CancellationToken::new();
        let svc = bind_with_retry(&binder, 3, &fast(), &token, 1).await;
        assert!(svc.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_configured_attempts() {
        let binder = BindFn::new(|| async {
            if true {
                panic!("loader crashed");
            }
            let svc: Arc<dyn Service> = Arc::new(ServiceTable::default());
            Ok::<_, ServiceError>(svc)
        });

        let token = CancellationToken::new();
        let err = bind_with_retry(&binder, 2, &fast(), &token, 1)
            .await
            .err()
            .unwrap();
        match err {
            RuntimeError::BindingFailed { attempts, reason } => {
                assert_eq!(attempts, 2);
                assert!(reason.contains("loader crashed"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn cancellation_stops_retrying() {
        let binder = BindFn::new(|| async {
            Err::<Arc<dyn Service>, _>(ServiceError::InvalidTable {
                reason: "nope".into(),
            })
        });
        let token = CancellationToken::new();
        token.cancel();
        let err = bind_with_retry(&binder, 5, &fast(), &token, 1)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, RuntimeError::BindingFailed { attempts: 0, .. }));
    }

    #[tokio::test]
    async fn cancellation_interrupts_a_hanging_binder() {
        let binder = BindFn::new(|| async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            let svc: Arc<dyn Service> = Arc::new(ServiceTable::default());
            Ok::<_, ServiceError>(svc)
        });
        let token = CancellationToken::new();
        let cancel = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel.cancel();
        });

        let res = tokio::time::timeout(
            Duration::from_secs(2),
            bind_with_retry(&binder, 3, &fast(), &token, 1),
        )
        .await
        .expect("binding must stop on cancellation");
        match res {
            Err(RuntimeError::BindingFailed { attempts, reason }) => {
                assert_eq!(attempts, 1);
                assert!(reason.contains("cancelled"));
            }
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }
}
