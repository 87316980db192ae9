use crate::{Scope, parallel};
use core::future::Future;
use parking_lot::Mutex;
use std::sync::Arc;

/// Workers push onto one shared `Vec` behind a mutex. Output order is the
/// order in which workers finish.
pub(super) async fn locked_append<In, T, E, F, Fut>(
    scope: &Scope,
    inputs: Vec<In>,
    transform: &F,
    preallocate: bool,
) -> Result<Vec<T>, E>
where
    F: Fn(Scope, In) -> Fut,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    let results = if preallocate {
        Vec::with_capacity(inputs.len())
    } else {
        Vec::new()
    };
    let results = Arc::new(Mutex::new(results));

    let work = inputs.into_iter().map(|input| {
        let results = Arc::clone(&results);
        move |scope: Scope| {
            let fut = transform(scope, input);
            async move {
                let output = fut.await?;
                results.lock().push(output);
                Ok(())
            }
        }
    });

    parallel(scope, work).await?;

    Ok(core::mem::take(&mut *results.lock()))
}
