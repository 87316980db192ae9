use super::{next_tick, ticker};
use core::time::Duration;
use todohash_tonic_core::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tonic::Status;

/// Sends `items` to `tx`, one per `interval`, and returns how many were sent.
///
/// Errors are returned to the caller, which forwards them to the client as
/// the final status of the stream.
pub async fn send_paced<T>(
    items: Vec<T>,
    interval: Duration,
    token: &CancellationToken,
    tx: &mpsc::Sender<Result<T, Status>>,
) -> Result<usize, Error> {
    let mut ticker = ticker(interval);
    let mut sent = 0;

    for item in items {
        next_tick(&mut ticker, token, tx).await?;
        tx.send(Ok(item))
            .await
            .map_err(|_| Error::RequestCancelled)?;
        sent += 1;
    }

    #[cfg(feature = "tracing")]
    tracing::debug!("Paced stream finished after {sent} items");
    Ok(sent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    const TICK: Duration = Duration::from_millis(100);

    #[tokio::test(start_paused = true)]
    async fn sends_one_item_per_tick() {
        let (tx, mut rx) = mpsc::channel(8);
        let token = CancellationToken::new();
        let start = Instant::now();

        let task = tokio::spawn(async move { send_paced(vec![1, 2, 3], TICK, &token, &tx).await });

        let mut arrivals = Vec::new();
        while let Some(item) = rx.recv().await {
            arrivals.push((item.unwrap(), start.elapsed()));
        }

        assert_eq!(task.await.unwrap().unwrap(), 3);
        let items: Vec<i32> = arrivals.iter().map(|(item, _)| *item).collect();
        assert_eq!(items, vec![1, 2, 3]);
        for (n, (_, at)) in arrivals.iter().enumerate() {
            assert!(*at >= TICK * (n as u32 + 1), "item {n} arrived at {at:?}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn empty_list_finishes_immediately() {
        let (tx, mut rx) = mpsc::channel::<Result<i32, Status>>(1);
        let start = Instant::now();

        let sent = send_paced(Vec::new(), TICK, &CancellationToken::new(), &tx).await;

        assert_eq!(sent.unwrap(), 0);
        assert!(start.elapsed() < TICK);
        drop(tx);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn client_disconnect_stops_the_stream() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let res = send_paced(vec![1, 2, 3], TICK, &CancellationToken::new(), &tx).await;
        assert!(matches!(res, Err(Error::RequestCancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_the_stream() {
        let (tx, mut rx) = mpsc::channel(8);
        let token = CancellationToken::new();
        let canceller = token.clone();

        let task = tokio::spawn(async move { send_paced(vec![1, 2, 3], TICK, &token, &tx).await });

        assert_eq!(rx.recv().await.unwrap().unwrap(), 1);
        canceller.cancel();

        assert!(matches!(task.await.unwrap(), Err(Error::ServiceShutdown)));
        assert!(rx.recv().await.is_none());
    }
}
