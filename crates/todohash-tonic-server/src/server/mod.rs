pub mod config;
pub mod service;
pub mod streaming;
pub mod telemetry;

use config::ServerConfig;
use core::future::Future;
use futures::Stream;
use service::handler::RecordHandler;
use todohash_tonic_core::proto::{FILE_DESCRIPTOR_SET, record_service_server::RecordServiceServer};
use tokio::io::{AsyncRead, AsyncWrite};
use tonic::codec::CompressionEncoding;
use tonic::transport::{Server, server::Connected};
use tonic_web::GrpcWebLayer;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};

type RecordServer = RecordServiceServer<RecordHandler>;

/// Serves the record, health and reflection services on `incoming` until
/// `signal` resolves. The health status flips to `NOT_SERVING` first, then
/// in-flight requests drain before the listener closes.
pub async fn serve<I, IO, IE>(
    config: ServerConfig,
    incoming: I,
    signal: impl Future<Output = ()>,
) -> anyhow::Result<()>
where
    I: Stream<Item = Result<IO, IE>>,
    IO: AsyncRead + AsyncWrite + Connected + Unpin + Send + 'static,
    IE: Into<tower::BoxError>,
{
    let store = config.open_store()?;
    let handler = RecordHandler::new(config, store);

    let (health, health_service) = tonic_health::server::health_reporter();
    health.set_serving::<RecordServer>().await;

    let reflection = tonic_reflection::server::Builder::configure()
        .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
        .build_v1()?;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let drain = {
        let handler = handler.clone();
        async move {
            signal.await;
            health.set_not_serving::<RecordServer>().await;
            handler.shutdown().await;
        }
    };

    Server::builder()
        .accept_http1(true)
        .http2_adaptive_window(Some(true))
        .layer(ServiceBuilder::new().layer(cors).layer(GrpcWebLayer::new()))
        .add_service(health_service)
        .add_service(reflection)
        .add_service(compressed(handler))
        .serve_with_incoming_shutdown(incoming, drain)
        .await?;

    #[cfg(feature = "tracing")]
    tracing::info!("record service stopped");
    Ok(())
}

fn compressed(handler: RecordHandler) -> RecordServer {
    [
        CompressionEncoding::Zstd,
        CompressionEncoding::Gzip,
        CompressionEncoding::Deflate,
    ]
    .into_iter()
    .fold(RecordServiceServer::new(handler), |server, encoding| {
        server.send_compressed(encoding).accept_compressed(encoding)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;
    use todohash_tonic_core::proto::{
        self, AddRecordRequest, Empty, record_service_client::RecordServiceClient,
    };
    use todohash_tonic_core::todohash::{HashingConfig, Strategy};
    use tokio::net::TcpListener;
    use tokio_stream::wrappers::TcpListenerStream;
    use tokio_util::sync::CancellationToken;

    fn loopback_config() -> ServerConfig {
        ServerConfig {
            server_addr: "127.0.0.1:0".to_string(),
            uds: false,
            database_url: config::IN_MEMORY_DATABASE.to_string(),
            hashing: HashingConfig {
                delay: Duration::from_millis(1),
                strategy: Strategy::ChannelRelay,
            },
            hash_timeout: Duration::from_secs(5),
            stream_interval: Duration::from_millis(5),
            stream_buffer_size: 8,
            shutdown_timeout: Duration::from_millis(200),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn serves_until_signalled() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let stop = CancellationToken::new();
        let server = tokio::spawn(serve(
            loopback_config(),
            TcpListenerStream::new(listener),
            stop.clone().cancelled_owned(),
        ));

        let mut client = RecordServiceClient::connect(format!("http://{addr}"))
            .await
            .unwrap()
            .accept_compressed(CompressionEncoding::Gzip)
            .send_compressed(CompressionEncoding::Gzip);
        let added = client
            .add_record(AddRecordRequest {
                record: Some(proto::Record {
                    id: -1,
                    owner_id: 7,
                    payload: "write docs".to_string(),
                }),
            })
            .await
            .unwrap()
            .into_inner()
            .record
            .unwrap();
        assert_eq!(added.id, 1);

        let listed = client.list_records(Empty {}).await.unwrap().into_inner();
        assert_eq!(listed.records, vec![added]);

        drop(client);
        stop.cancel();
        server.await.unwrap().unwrap();
    }
}
