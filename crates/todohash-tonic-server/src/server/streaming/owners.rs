use super::{next_tick, ticker};
use core::time::Duration;
use std::sync::Arc;
use todohash_tonic_core::{
    Error,
    proto::{ListOwnerRecordsRequest, ListOwnerRecordsResponse},
    todohash::{RecordStore, run_blocking},
    types::to_proto_records,
};
use tokio::sync::mpsc;
use tokio_stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tonic::Status;

/// Answers every owner id read from `inbound` with that owner's records.
///
/// Each answer waits for the next tick. Returns the number of answers sent
/// once the client half-closes its side.
pub async fn answer_owner_requests<S, I>(
    store: Arc<S>,
    mut inbound: I,
    interval: Duration,
    token: &CancellationToken,
    tx: &mpsc::Sender<Result<ListOwnerRecordsResponse, Status>>,
) -> Result<usize, Error>
where
    S: RecordStore + ?Sized + 'static,
    I: Stream<Item = Result<ListOwnerRecordsRequest, Status>> + Unpin,
{
    let mut ticker = ticker(interval);
    let mut answered = 0;

    loop {
        let next = tokio::select! {
            biased;
            () = token.cancelled() => return Err(Error::ServiceShutdown),
            next = inbound.next() => next,
        };

        let owner_id = match next {
            None => {
                #[cfg(feature = "tracing")]
                tracing::debug!("Client closed after {answered} owner requests");
                return Ok(answered);
            }
            Some(Ok(request)) => request.owner_id,
            Some(Err(status)) => {
                return Err(Error::ChannelError {
                    context: format!("inbound stream failed: {}", status.message()),
                });
            }
        };

        next_tick(&mut ticker, token, tx).await?;

        let records = run_blocking(&store, move |store| store.list_by_owner(owner_id)).await?;
        let response = ListOwnerRecordsResponse {
            owner_id,
            records: to_proto_records(records),
        };

        tx.send(Ok(response))
            .await
            .map_err(|_| Error::RequestCancelled)?;
        answered += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use todohash_tonic_core::todohash::{MemoryStore, OwnerId, Record, StoreError};

    const TICK: Duration = Duration::from_millis(10);

    fn store() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::seeded([
            Record::new(1, "Task 1").with_id(1),
            Record::new(2, "Task 1").with_id(2),
            Record::new(1, "Task 2").with_id(3),
        ]).unwrap())
    }

    fn requests(
        owners: &[OwnerId],
    ) -> impl Stream<Item = Result<ListOwnerRecordsRequest, Status>> + Unpin {
        let requests: Vec<_> = owners
            .iter()
            .map(|&owner_id| Ok(ListOwnerRecordsRequest { owner_id }))
            .collect();
        tokio_stream::iter(requests)
    }

    #[tokio::test(start_paused = true)]
    async fn answers_each_owner_in_order() {
        let (tx, mut rx) = mpsc::channel(8);
        let token = CancellationToken::new();

        let answered = answer_owner_requests(store(), requests(&[1, 2, 4]), TICK, &token, &tx)
            .await
            .unwrap();
        drop(tx);

        assert_eq!(answered, 3);
        let mut responses = Vec::new();
        while let Some(response) = rx.recv().await {
            responses.push(response.unwrap());
        }
        let owners: Vec<OwnerId> = responses.iter().map(|r| r.owner_id).collect();
        assert_eq!(owners, vec![1, 2, 4]);

        let ids: Vec<i32> = responses[0].records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(responses[1].records.len(), 1);
        assert!(responses[2].records.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn half_close_without_requests_sends_nothing() {
        let (tx, _rx) = mpsc::channel(1);
        let answered =
            answer_owner_requests(store(), requests(&[]), TICK, &CancellationToken::new(), &tx)
                .await
                .unwrap();
        assert_eq!(answered, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn inbound_error_ends_the_stream() {
        let (tx, _rx) = mpsc::channel(1);
        let inbound = tokio_stream::iter(vec![Err(Status::aborted("reset"))]);

        let res =
            answer_owner_requests(store(), inbound, TICK, &CancellationToken::new(), &tx).await;
        assert!(matches!(res, Err(Error::ChannelError { .. })));
    }

    struct BrokenStore;

    impl RecordStore for BrokenStore {
        fn insert(&self, _record: &Record) -> Result<i32, StoreError> {
            unreachable!()
        }
        fn list_all(&self) -> Result<Vec<Record>, StoreError> {
            unreachable!()
        }
        fn list_by_owner(&self, _owner_id: OwnerId) -> Result<Vec<Record>, StoreError> {
            Err(StoreError::Unavailable {
                reason: "Invalid".to_string(),
            })
        }
        fn delete_by_owner(&self, _owner_id: OwnerId) -> Result<(), StoreError> {
            unreachable!()
        }
        fn truncate(&self) -> Result<(), StoreError> {
            unreachable!()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn store_error_ends_the_stream() {
        let (tx, mut rx) = mpsc::channel(1);
        let res = answer_owner_requests(
            Arc::new(BrokenStore),
            requests(&[1]),
            TICK,
            &CancellationToken::new(),
            &tx,
        )
        .await;

        assert!(matches!(res, Err(Error::Hashing(_))));
        drop(tx);
        assert!(rx.recv().await.is_none());
    }
}
