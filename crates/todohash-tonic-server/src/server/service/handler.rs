//! gRPC service implementation for owner-scoped records.
//!
//! [`RecordHandler`] implements the [`RecordService`] trait generated from
//! `todohash.proto`. Unary calls talk to the store on Tokio's blocking pool;
//! streaming calls hand the work to a background task and return the
//! receiving end of a bounded channel.
//!
//! ## Responsibilities
//!
//! - Admit requests while the service is live and track them until they
//!   finish, so shutdown can drain them.
//! - Derive a request scope for `HashOwnerRecords` from the shutdown token
//!   and the effective deadline.
//! - Translate domain errors into gRPC status codes.

use crate::server::{
    config::ServerConfig,
    service::{
        deadline::effective_timeout,
        lifecycle::{InflightGuard, Lifecycle},
    },
    streaming::{owners::answer_owner_requests, paced::send_paced},
    telemetry::{
        increment_records_hashed, increment_request_errors, increment_requests,
        record_hash_duration, record_records_per_request,
    },
};
use core::pin::Pin;
use std::sync::Arc;
use todohash_tonic_core::{
    Error,
    proto::{
        self, AddRecordRequest, AddRecordResponse, DeleteOwnerRecordsRequest, Empty,
        HashOwnerRecordsRequest, HashOwnerRecordsResponse, ListOwnerRecordsRequest,
        ListOwnerRecordsResponse, ListRecordsResponse, record_service_server::RecordService,
    },
    todohash::{HashingService, Record, RecordStore, Scope, run_blocking},
    types::{required, to_proto_records},
};
use tokio::sync::mpsc;
use tokio_stream::{Stream, wrappers::ReceiverStream};
use tonic::{Request, Response, Status, Streaming, metadata::MetadataMap};

type ResponseStream<T> = Pin<Box<dyn Stream<Item = Result<T, Status>> + Send>>;

/// gRPC front end of the record store and the hashing service.
#[derive(Clone)]
pub struct RecordHandler {
    config: ServerConfig,
    hashing: HashingService<dyn RecordStore>,
    lifecycle: Arc<Lifecycle>,
}

impl RecordHandler {
    pub fn new(config: ServerConfig, store: Arc<dyn RecordStore>) -> Self {
        let hashing = HashingService::new(store, config.hashing);
        let lifecycle = Arc::new(Lifecycle::new(config.shutdown_timeout));
        Self {
            config,
            hashing,
            lifecycle,
        }
    }

    /// Refuses new requests, drains in-flight ones for up to the configured
    /// shutdown timeout, then cancels the rest.
    pub async fn shutdown(&self) {
        self.lifecycle.shutdown().await;
    }

    fn store(&self) -> &Arc<dyn RecordStore> {
        self.hashing.store()
    }

    /// Admits a request and counts it in the request metrics.
    fn admit(&self, method: &'static str) -> Result<InflightGuard, Status> {
        increment_requests(method);
        self.lifecycle
            .admit()
            .map_err(|e| Self::reject(method, e))
    }

    fn reject(_method: &'static str, err: Error) -> Status {
        increment_request_errors(_method);
        #[cfg(feature = "tracing")]
        tracing::warn!("{_method} failed: {err}");
        err.into()
    }

    /// Scope of one hashing request: cancelled on shutdown and bounded by the
    /// earlier of the client deadline and the server cap.
    fn request_scope(&self, metadata: &MetadataMap) -> Scope {
        let timeout = effective_timeout(metadata, self.config.hash_timeout);
        Scope::from_token(self.lifecycle.token().child_token()).with_timeout(timeout)
    }

    /// Runs a streaming producer in the background and forwards its error,
    /// if any, as the final status of the stream.
    fn spawn_stream<T, F>(
        &self,
        method: &'static str,
        guard: InflightGuard,
        tx: mpsc::Sender<Result<T, Status>>,
        producer: F,
    ) where
        T: Send + 'static,
        F: Future<Output = Result<usize, Error>> + Send + 'static,
    {
        let fut = async move {
            match producer.await {
                Ok(_sent) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!("{method} sent {_sent} messages");
                }
                Err(Error::RequestCancelled) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!("{method}: client went away");
                }
                Err(e) => {
                    let _ = tx.send(Err(Self::reject(method, e))).await;
                }
            }
            drop(guard);
        };
        #[cfg(feature = "tracing")]
        let fut = {
            use tracing::Instrument;
            fut.instrument(tracing::info_span!("streaming", method))
        };

        tokio::spawn(fut);
    }
}

#[tonic::async_trait]
impl RecordService for RecordHandler {
    type ListRecordsPacedStream = ResponseStream<proto::Record>;
    type ListOwnerRecordsStream = ResponseStream<ListOwnerRecordsResponse>;

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    async fn add_record(
        &self,
        req: Request<AddRecordRequest>,
    ) -> Result<Response<AddRecordResponse>, Status> {
        const METHOD: &str = "AddRecord";
        let _guard = self.admit(METHOD)?;

        let record = required(req.into_inner().record, "record")
            .map(Record::from)
            .map_err(|e| Self::reject(METHOD, e))?;

        let stored = run_blocking(self.store(), move |store| {
            let id = store.insert(&record)?;
            Ok(record.with_id(id))
        })
        .await
        .map_err(|e| Self::reject(METHOD, e.into()))?;

        #[cfg(feature = "tracing")]
        tracing::debug!("Stored record {} for owner {}", stored.id, stored.owner_id);

        Ok(Response::new(AddRecordResponse {
            record: Some(stored.into()),
        }))
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    async fn list_records(
        &self,
        _req: Request<Empty>,
    ) -> Result<Response<ListRecordsResponse>, Status> {
        const METHOD: &str = "ListRecords";
        let _guard = self.admit(METHOD)?;

        let records = run_blocking(self.store(), |store| store.list_all())
            .await
            .map_err(|e| Self::reject(METHOD, e.into()))?;

        Ok(Response::new(ListRecordsResponse {
            records: to_proto_records(records),
        }))
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    async fn list_records_paced(
        &self,
        _req: Request<Empty>,
    ) -> Result<Response<Self::ListRecordsPacedStream>, Status> {
        const METHOD: &str = "ListRecordsPaced";
        let guard = self.admit(METHOD)?;

        // A store failure fails the call before any item is streamed.
        let records = run_blocking(self.store(), |store| store.list_all())
            .await
            .map_err(|e| Self::reject(METHOD, e.into()))?;

        let (tx, rx) = mpsc::channel(self.config.stream_buffer_size);
        let interval = self.config.stream_interval;
        let token = self.lifecycle.token().clone();
        let producer_tx = tx.clone();
        self.spawn_stream(METHOD, guard, tx, async move {
            send_paced(to_proto_records(records), interval, &token, &producer_tx).await
        });

        Ok(Response::new(Box::pin(ReceiverStream::new(rx))))
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    async fn list_owner_records(
        &self,
        req: Request<Streaming<ListOwnerRecordsRequest>>,
    ) -> Result<Response<Self::ListOwnerRecordsStream>, Status> {
        const METHOD: &str = "ListOwnerRecords";
        let guard = self.admit(METHOD)?;

        let inbound = req.into_inner();
        let (tx, rx) = mpsc::channel(self.config.stream_buffer_size);
        let store = Arc::clone(self.store());
        let interval = self.config.stream_interval;
        let token = self.lifecycle.token().clone();
        let producer_tx = tx.clone();
        self.spawn_stream(METHOD, guard, tx, async move {
            answer_owner_requests(store, inbound, interval, &token, &producer_tx).await
        });

        Ok(Response::new(Box::pin(ReceiverStream::new(rx))))
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(owner_id = req.get_ref().owner_id)))]
    async fn delete_owner_records(
        &self,
        req: Request<DeleteOwnerRecordsRequest>,
    ) -> Result<Response<Empty>, Status> {
        const METHOD: &str = "DeleteOwnerRecords";
        let _guard = self.admit(METHOD)?;

        let owner_id = req.into_inner().owner_id;
        run_blocking(self.store(), move |store| store.delete_by_owner(owner_id))
            .await
            .map_err(|e| Self::reject(METHOD, e.into()))?;

        Ok(Response::new(Empty {}))
    }

    /// Hashes every record of the requested owner.
    ///
    /// If `metrics` is enabled, records the call duration, the number of
    /// records hashed, and the per-request record count.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(owner_id = req.get_ref().owner_id)))]
    async fn hash_owner_records(
        &self,
        req: Request<HashOwnerRecordsRequest>,
    ) -> Result<Response<HashOwnerRecordsResponse>, Status> {
        const METHOD: &str = "HashOwnerRecords";
        let start = std::time::Instant::now();
        let _guard = self.admit(METHOD)?;

        let scope = self.request_scope(req.metadata());
        let owner_id = req.into_inner().owner_id;

        let hashed = match self.hashing.hash_owner_records(&scope, owner_id).await {
            Ok(hashed) => hashed,
            Err(_) if self.lifecycle.token().is_cancelled() => {
                return Err(Self::reject(METHOD, Error::ServiceShutdown));
            }
            Err(e) => return Err(Self::reject(METHOD, e.into())),
        };

        record_hash_duration(start.elapsed().as_secs_f64() * 1000.0);
        increment_records_hashed(hashed.len() as u64);
        record_records_per_request(hashed.len() as f64);

        Ok(Response::new(HashOwnerRecordsResponse {
            records: hashed.into_iter().map(Into::into).collect(),
        }))
    }
}
