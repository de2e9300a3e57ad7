//! Error boundary for fire-and-forget tasks.
//!
//! A detached task's result is never observed by whoever spawned it, so the
//! task itself must log its failure. [`spawn_detached`] does that for avatar
//! control runs: errors are logged by class, panics are caught and logged,
//! and nothing escapes into the caller.
//!
//! Before the runtime shuts down, [`join_detached`] gives outstanding runs a
//! bounded chance to finish, so an expression is not left switched on.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::join_all;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::avatar::error::{AvatarError, ErrorClass};

/// Spawn `fut` on the runtime with its errors contained.
///
/// The returned handle resolves to `()` whatever happened inside; callers may
/// drop it. Tests await it to observe completion.
pub fn spawn_detached<F>(label: &'static str, fut: F) -> JoinHandle<()>
where
    F: Future<Output = Result<(), AvatarError>> + Send + 'static,
{
    tokio::spawn(async move {
        match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log_failure(label, &e),
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_owned())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "<non-string panic>".to_owned());
                error!(task = label, panic = %message, "detached task panicked");
            }
        }
    })
}

/// Wait up to `bound` for `handles` to finish, aborting whatever is left.
///
/// Returns how many tasks had to be aborted.
pub async fn join_detached(handles: Vec<JoinHandle<()>>, bound: Duration) -> usize {
    let pending: Vec<_> = handles.into_iter().filter(|h| !h.is_finished()).collect();
    if pending.is_empty() {
        return 0;
    }
    debug!(count = pending.len(), "waiting for detached tasks");

    let aborts: Vec<_> = pending.iter().map(JoinHandle::abort_handle).collect();
    if tokio::time::timeout(bound, join_all(pending)).await.is_ok() {
        return 0;
    }
    let unfinished = aborts.iter().filter(|a| !a.is_finished()).count();
    for abort in &aborts {
        abort.abort();
    }
    warn!(count = unfinished, "detached tasks did not finish in time");
    unfinished
}

fn log_failure(label: &'static str, e: &AvatarError) {
    match e.class() {
        ErrorClass::Configuration => warn!(task = label, error = %e, "detached task skipped"),
        ErrorClass::Transport => error!(task = label, error = %e, "detached task transport failure"),
        ErrorClass::Protocol => error!(task = label, error = %e, "detached task protocol failure"),
    }
}
