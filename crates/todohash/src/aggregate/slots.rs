use crate::{Scope, parallel};
use core::future::Future;
use parking_lot::Mutex;
use std::sync::Arc;

/// One shared vector of cells, addressed by input index. Worker `i` only
/// ever locks cell `i`, so the locks are never contended.
pub(super) async fn indexed_slot<In, T, E, F, Fut>(
    scope: &Scope,
    inputs: Vec<In>,
    transform: &F,
) -> Result<Vec<T>, E>
where
    F: Fn(Scope, In) -> Fut,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    let slots: Arc<Vec<Mutex<Option<T>>>> =
        Arc::new((0..inputs.len()).map(|_| Mutex::new(None)).collect());

    let work = inputs.into_iter().enumerate().map(|(index, input)| {
        let slots = Arc::clone(&slots);
        move |scope: Scope| {
            let fut = transform(scope, input);
            async move {
                let output = fut.await?;
                *slots[index].lock() = Some(output);
                Ok(())
            }
        }
    });

    parallel(scope, work).await?;

    Ok(slots.iter().filter_map(|slot| slot.lock().take()).collect())
}

/// Pre-creates one holder per input and hands each worker its own handle.
pub(super) async fn slot_handle<In, T, E, F, Fut>(
    scope: &Scope,
    inputs: Vec<In>,
    transform: &F,
) -> Result<Vec<T>, E>
where
    F: Fn(Scope, In) -> Fut,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    let holders: Vec<Arc<Mutex<Option<T>>>> =
        (0..inputs.len()).map(|_| Arc::new(Mutex::new(None))).collect();

    let work = inputs.into_iter().zip(&holders).map(|(input, holder)| {
        let holder = Arc::clone(holder);
        move |scope: Scope| {
            let fut = transform(scope, input);
            async move {
                let output = fut.await?;
                *holder.lock() = Some(output);
                Ok(())
            }
        }
    });

    parallel(scope, work).await?;

    Ok(holders
        .iter()
        .filter_map(|holder| holder.lock().take())
        .collect())
}
