use crate::{Scope, parallel};
use core::future::Future;
use tokio::{sync::mpsc, task::JoinHandle};

/// Workers send outputs over a channel with room for every item; a separate
/// collector task drains it until all senders are gone.
pub(super) async fn channel_relay<In, T, E, F, Fut>(
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
    let len = inputs.len();
    let (tx, mut rx) = mpsc::channel::<T>(len);

    let collector = tokio::spawn(async move {
        let mut results = Vec::with_capacity(len);
        while let Some(output) = rx.recv().await {
            results.push(output);
        }
        results
    });

    let work = inputs.into_iter().map(|input| {
        let tx = tx.clone();
        move |scope: Scope| {
            let fut = transform(scope, input);
            async move {
                let output = fut.await?;
                // Capacity covers every item, so this never waits. The
                // collector outlives all senders.
                let _ = tx.send(output).await;
                Ok(())
            }
        }
    });

    let outcome = parallel(scope, work).await;
    drop(tx);
    outcome?;

    join_collector(collector).await
}

/// Like [`channel_relay`], but each message carries the input index and the
/// collector writes it back into the matching slot.
pub(super) async fn indexed_channel_relay<In, T, E, F, Fut>(
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
    let len = inputs.len();
    let (tx, mut rx) = mpsc::channel::<(usize, T)>(len);

    let collector = tokio::spawn(async move {
        let mut slots: Vec<Option<T>> = (0..len).map(|_| None).collect();
        while let Some((index, output)) = rx.recv().await {
            slots[index] = Some(output);
        }
        slots.into_iter().flatten().collect()
    });

    let work = inputs.into_iter().enumerate().map(|(index, input)| {
        let tx = tx.clone();
        move |scope: Scope| {
            let fut = transform(scope, input);
            async move {
                let output = fut.await?;
                let _ = tx.send((index, output)).await;
                Ok(())
            }
        }
    });

    let outcome = parallel(scope, work).await;
    drop(tx);
    outcome?;

    join_collector(collector).await
}

async fn join_collector<T, E>(collector: JoinHandle<Vec<T>>) -> Result<Vec<T>, E> {
    match collector.await {
        Ok(results) => Ok(results),
        Err(join_err) => std::panic::resume_unwind(join_err.into_panic()),
    }
}
