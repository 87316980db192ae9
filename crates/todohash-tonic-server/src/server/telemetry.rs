//! Logging, tracing and metrics setup for the record server.
//!
//! A pretty `fmt` layer filtered by `RUST_LOG` (default `info`) is always
//! installed. OpenTelemetry export is opt-in through cargo features:
//!
//! - `tracing`: export spans.
//! - `metrics`: export the request instruments defined below.
//! - `stdout`: print exported spans and metrics to stdout.
//! - `otlp`: send them over OTLP/gRPC. The collector is configured through
//!   the standard `OTEL_EXPORTER_OTLP_*` variables.
//!
//! ```bash
//! cargo run -p todohash-tonic-server --features tracing,metrics,stdout
//! ```

#[cfg(all(
    any(feature = "stdout", feature = "otlp"),
    not(any(feature = "tracing", feature = "metrics"))
))]
compile_error!("exporters require at least one of the 'tracing' or 'metrics' features");

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(any(feature = "metrics", feature = "tracing"))]
use opentelemetry::{InstrumentationScope, KeyValue};
#[cfg(any(feature = "metrics", feature = "tracing"))]
use opentelemetry_sdk::Resource;
#[cfg(any(feature = "metrics", feature = "tracing"))]
use opentelemetry_semantic_conventions as semvcns;

#[cfg(feature = "metrics")]
use opentelemetry::metrics::{Counter, Histogram, Meter, UpDownCounter};
#[cfg(feature = "metrics")]
use opentelemetry_sdk::metrics as sdkmetrics;
#[cfg(feature = "metrics")]
use std::sync::OnceLock;

#[cfg(feature = "tracing")]
use opentelemetry::trace::TracerProvider;
#[cfg(feature = "tracing")]
use opentelemetry_sdk::trace as sdktrace;

#[cfg(any(feature = "stdout", feature = "otlp"))]
const EXPORT_INTERVAL: std::time::Duration = std::time::Duration::from_secs(5);

/// Handles to the installed OpenTelemetry providers. Empty when neither
/// `tracing` nor `metrics` is enabled.
pub struct Telemetry {
    #[cfg(feature = "tracing")]
    tracer_provider: sdktrace::SdkTracerProvider,
    #[cfg(feature = "metrics")]
    meter_provider: sdkmetrics::SdkMeterProvider,
}

impl Telemetry {
    /// Installs the global subscriber and, when enabled, the span and metric
    /// pipelines.
    pub fn init() -> anyhow::Result<Self> {
        #[cfg(any(feature = "metrics", feature = "tracing"))]
        let scope = InstrumentationScope::builder("todohash")
            .with_version(env!("CARGO_PKG_VERSION"))
            .with_schema_url(semvcns::SCHEMA_URL)
            .build();

        let registry = tracing_subscriber::registry()
            .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
            .with(
                tracing_subscriber::fmt::layer()
                    .with_thread_ids(true)
                    .with_line_number(true)
                    .with_target(false)
                    .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
                    .pretty(),
            );

        #[cfg(feature = "tracing")]
        let (registry, tracer_provider) = {
            opentelemetry::global::set_text_map_propagator(
                opentelemetry_sdk::propagation::TraceContextPropagator::new(),
            );
            let provider = tracer_provider()?;
            opentelemetry::global::set_tracer_provider(provider.clone());
            let layer = tracing_opentelemetry::layer()
                .with_tracer(provider.tracer_with_scope(scope.clone()))
                .with_error_records_to_exceptions(true);
            (registry.with(layer), provider)
        };

        #[cfg(feature = "metrics")]
        let (registry, meter_provider) = {
            let provider = meter_provider()?;
            opentelemetry::global::set_meter_provider(provider.clone());
            Instruments::install(opentelemetry::global::meter_with_scope(scope));
            let layer = tracing_opentelemetry::MetricsLayer::new(provider.clone());
            (registry.with(layer), provider)
        };

        registry.try_init()?;

        Ok(Self {
            #[cfg(feature = "tracing")]
            tracer_provider,
            #[cfg(feature = "metrics")]
            meter_provider,
        })
    }

    /// Flushes whatever is still buffered and stops the exporters.
    pub fn shutdown(self) {
        #[cfg(feature = "tracing")]
        if let Err(err) = self.tracer_provider.shutdown() {
            eprintln!("failed to shut down tracer provider: {err:?}");
        }

        #[cfg(feature = "metrics")]
        if let Err(err) = self.meter_provider.shutdown() {
            eprintln!("failed to shut down meter provider: {err:?}");
        }
    }
}

#[cfg(any(feature = "metrics", feature = "tracing"))]
fn resource() -> Resource {
    Resource::builder()
        .with_service_name("todohash")
        .with_schema_url(
            [KeyValue::new(
                semvcns::resource::SERVICE_VERSION,
                env!("CARGO_PKG_VERSION"),
            )],
            semvcns::SCHEMA_URL,
        )
        .build()
}

#[cfg(feature = "tracing")]
fn tracer_provider() -> anyhow::Result<sdktrace::SdkTracerProvider> {
    #[cfg(any(feature = "stdout", feature = "otlp"))]
    fn batched<E: opentelemetry_sdk::trace::SpanExporter + 'static>(
        exporter: E,
    ) -> sdktrace::BatchSpanProcessor {
        sdktrace::BatchSpanProcessor::builder(exporter)
            .with_batch_config(
                sdktrace::BatchConfigBuilder::default()
                    .with_scheduled_delay(EXPORT_INTERVAL)
                    .build(),
            )
            .build()
    }

    let builder = sdktrace::SdkTracerProvider::builder().with_resource(resource());

    #[cfg(feature = "stdout")]
    let builder =
        builder.with_span_processor(batched(opentelemetry_stdout::SpanExporter::default()));

    #[cfg(feature = "otlp")]
    let builder = {
        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .build()?;
        builder.with_span_processor(batched(exporter))
    };

    Ok(builder.build())
}

#[cfg(feature = "metrics")]
fn meter_provider() -> anyhow::Result<sdkmetrics::SdkMeterProvider> {
    let builder = sdkmetrics::SdkMeterProvider::builder().with_resource(resource());

    #[cfg(feature = "stdout")]
    let builder = builder.with_reader(
        sdkmetrics::PeriodicReader::builder(opentelemetry_stdout::MetricExporter::default())
            .with_interval(EXPORT_INTERVAL)
            .build(),
    );

    #[cfg(feature = "otlp")]
    let builder = {
        let exporter = opentelemetry_otlp::MetricExporter::builder()
            .with_tonic()
            .build()?;
        builder.with_reader(
            sdkmetrics::PeriodicReader::builder(exporter)
                .with_interval(EXPORT_INTERVAL)
                .build(),
        )
    };

    Ok(builder.build())
}

#[cfg(feature = "metrics")]
struct Instruments {
    requests: Counter<u64>,
    request_errors: Counter<u64>,
    streams_inflight: UpDownCounter<i64>,
    hash_duration_ms: Histogram<f64>,
    records_hashed: Counter<u64>,
    records_per_request: Histogram<f64>,
}

#[cfg(feature = "metrics")]
static INSTRUMENTS: OnceLock<Instruments> = OnceLock::new();

#[cfg(feature = "metrics")]
impl Instruments {
    fn install(meter: Meter) {
        let _ = INSTRUMENTS.set(Self {
            requests: meter
                .u64_counter("requests")
                .with_description("Total gRPC requests, by method")
                .build(),
            request_errors: meter
                .u64_counter("request_errors")
                .with_description("Failed or cancelled requests, by method")
                .build(),
            streams_inflight: meter
                .i64_up_down_counter("streams_inflight")
                .with_description("Requests and streams currently being served")
                .build(),
            hash_duration_ms: meter
                .f64_histogram("hash_duration")
                .with_unit("ms")
                .with_description("End-to-end duration of HashOwnerRecords")
                .build(),
            records_hashed: meter
                .u64_counter("records_hashed")
                .with_description("Total records hashed")
                .build(),
            records_per_request: meter
                .f64_histogram("records_per_request")
                .with_description("Records returned per HashOwnerRecords call")
                .build(),
        });
    }
}

/// Runs `record` against the installed instruments. Without the `metrics`
/// feature, or before [`Telemetry::init`], nothing is recorded.
#[cfg(feature = "metrics")]
fn with_instruments(record: impl FnOnce(&Instruments)) {
    if let Some(instruments) = INSTRUMENTS.get() {
        record(instruments);
    }
}

pub fn increment_requests(method: &'static str) {
    #[cfg(feature = "metrics")]
    with_instruments(|m| m.requests.add(1, &[KeyValue::new("method", method)]));
    #[cfg(not(feature = "metrics"))]
    let _ = method;
}

pub fn increment_request_errors(method: &'static str) {
    #[cfg(feature = "metrics")]
    with_instruments(|m| m.request_errors.add(1, &[KeyValue::new("method", method)]));
    #[cfg(not(feature = "metrics"))]
    let _ = method;
}

pub fn increment_streams_inflight() {
    #[cfg(feature = "metrics")]
    with_instruments(|m| m.streams_inflight.add(1, &[]));
}

pub fn decrement_streams_inflight() {
    #[cfg(feature = "metrics")]
    with_instruments(|m| m.streams_inflight.add(-1, &[]));
}

pub fn record_hash_duration(duration_ms: f64) {
    #[cfg(feature = "metrics")]
    with_instruments(|m| m.hash_duration_ms.record(duration_ms, &[]));
    #[cfg(not(feature = "metrics"))]
    let _ = duration_ms;
}

pub fn increment_records_hashed(count: u64) {
    #[cfg(feature = "metrics")]
    with_instruments(|m| m.records_hashed.add(count, &[]));
    #[cfg(not(feature = "metrics"))]
    let _ = count;
}

pub fn record_records_per_request(count: f64) {
    #[cfg(feature = "metrics")]
    with_instruments(|m| m.records_per_request.record(count, &[]));
    #[cfg(not(feature = "metrics"))]
    let _ = count;
}
