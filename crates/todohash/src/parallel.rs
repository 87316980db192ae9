//! Fan-out executor.
//!
//! [`parallel`] starts one Tokio task per unit of work against a shared child
//! [`Scope`] and joins every one of them before returning. The first error
//! reported by any worker is kept and the child scope is cancelled so that
//! the remaining workers can bail out early. Later errors are dropped.

use crate::Scope;
use core::future::Future;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinSet;

/// Runs every unit of `work` concurrently and returns the first error, if
/// any.
///
/// Each item receives a clone of a child scope derived from `scope`. The
/// child is cancelled on the first failure and unconditionally on return, so
/// workers still running (or not yet polled) observe cancellation. There is no
/// pool and no backpressure: one task is spawned per item.
///
/// The call does not return until every spawned task has finished. The
/// executor imposes no timeout of its own; it only reacts to cancellation
/// propagated through `scope`.
///
/// # Panics
///
/// If a worker panics, the child scope is cancelled, the remaining workers are
/// joined, and the panic is resumed on the caller.
///
/// # Example
///
/// ```
/// use todohash::{Scope, parallel};
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let work = (0..3).map(|i| {
///     move |_scope: Scope| async move {
///         if i == 1 { Err("boom") } else { Ok(()) }
///     }
/// });
/// assert_eq!(parallel(&Scope::new(), work).await, Err("boom"));
/// # });
/// ```
pub async fn parallel<I, F, Fut, E>(scope: &Scope, work: I) -> Result<(), E>
where
    I: IntoIterator<Item = F>,
    F: FnOnce(Scope) -> Fut,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Send + 'static,
{
    let child = scope.child();
    // Released on every exit path, including the caller being dropped.
    let _release = child.drop_guard();

    let first_error = Arc::new(Mutex::new(None));
    let mut tasks = JoinSet::new();

    for unit in work {
        let fut = unit(child.clone());
        let child = child.clone();
        let first_error = Arc::clone(&first_error);

        tasks.spawn(async move {
            if let Err(err) = fut.await {
                {
                    let mut slot = first_error.lock();
                    if slot.is_none() {
                        *slot = Some(err);
                    }
                }
                child.cancel();
            }
        });
    }

    let mut _joined = 0_usize;
    let mut panic = None;
    while let Some(res) = tasks.join_next().await {
        _joined += 1;
        if let Err(join_err) = res {
            if join_err.is_panic() {
                child.cancel();
                panic.get_or_insert(join_err.into_panic());
            }
        }
    }

    #[cfg(feature = "tracing")]
    tracing::trace!("Joined {_joined} workers");

    if let Some(payload) = panic {
        std::panic::resume_unwind(payload);
    }

    match first_error.lock().take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
