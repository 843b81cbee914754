//! Panic containment for service bodies.
//!
//! A panic inside the body of an operation must not skip the rollback. The
//! body future is polled under `catch_unwind`; an unwinding panic becomes a
//! [`PanicError`] that flows into `defer_error_context` like any other
//! failure.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tracing::error;

use crate::error::PanicError;

pub async fn catch_panic<F, T, E>(body: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: From<PanicError>,
{
    match AssertUnwindSafe(body).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => {
            let panic = PanicError {
                message: panic_message(payload.as_ref()),
            };
            error!(message = %panic.message, "Operation panicked");
            Err(E::from(panic))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
