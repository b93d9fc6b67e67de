use lazy_static::lazy_static;
use prometheus::exponential_buckets;
use prometheus::HistogramOpts;
use prometheus::HistogramVec;
use prometheus::IntCounterVec;
use prometheus::IntGaugeVec;
use prometheus::Opts;
use prometheus::Registry;
use tokio::sync::watch;
use tracing::info;
use tracing::warn;
use warp::Filter;
use warp::Rejection;
use warp::Reply;


lazy_static! {
    pub static ref QUEUE_DEPTH_METRIC: IntGaugeVec = IntGaugeVec::new(
        Opts::new("workqueue_depth", "Current number of pending keys"),
        &["name"]
    )
    .expect("metric can not be created");

    pub static ref QUEUE_ADDS_METRIC: IntCounterVec = IntCounterVec::new(
        Opts::new("workqueue_adds_total", "Keys accepted by the queue (coalesced adds excluded)"),
        &["name"]
    )
    .expect("metric can not be created");

    pub static ref QUEUE_RETRIES_METRIC: IntCounterVec = IntCounterVec::new(
        Opts::new("workqueue_retries_total", "Rate limited re-adds"),
        &["name"]
    )
    .expect("metric can not be created");

    pub static ref RECONCILE_TOTAL_METRIC: IntCounterVec = IntCounterVec::new(
        Opts::new("reconcile_total", "Reconcile passes by result"),
        &["name", "result"]
    )
    .expect("metric can not be created");

    pub static ref RECONCILE_DURATION_METRIC: HistogramVec = HistogramVec::new(
        HistogramOpts::new("reconcile_duration_ms", "Histogram of reconcile pass duration in ms")
            .buckets(exponential_buckets(1.0, 2.0, 16).expect("valid buckets")),
        &["name"]
    )
    .expect("metric can not be created");

    pub static ref DROPPED_KEYS_METRIC: IntCounterVec = IntCounterVec::new(
        Opts::new("dropped_keys_total", "Keys abandoned after exhausting their retries"),
        &["name"]
    )
    .expect("metric can not be created");

    pub static ref REGISTRY: Registry = {
        let registry = Registry::new();
        register_custom_metrics(&registry);
        registry
    };
}

pub(crate) fn register_custom_metrics(registry: &Registry) {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(QUEUE_DEPTH_METRIC.clone()),
        Box::new(QUEUE_ADDS_METRIC.clone()),
        Box::new(QUEUE_RETRIES_METRIC.clone()),
        Box::new(RECONCILE_TOTAL_METRIC.clone()),
        Box::new(RECONCILE_DURATION_METRIC.clone()),
        Box::new(DROPPED_KEYS_METRIC.clone()),
    ];
    for collector in collectors {
        if let Err(e) = registry.register(collector) {
            warn!("collector can not be registered: {}", e);
        }
    }
}

/// Serves `/metrics` until `shutdown_signal` fires.
pub async fn start_server(
    port: u16,
    mut shutdown_signal: watch::Receiver<()>,
) {
    let metrics_route = warp::path!("metrics").and_then(metrics_handler);

    info!("metrics server listening on port {}", port);
    let (_, server) =
        warp::serve(metrics_route).bind_with_graceful_shutdown(([0, 0, 0, 0], port), async move {
            let _ = shutdown_signal.changed().await;
        });
    server.await;
}

async fn metrics_handler() -> Result<impl Reply, Rejection> {
    Ok(gather_metrics_text())
}

pub(crate) fn gather_metrics_text() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        warn!("could not encode custom metrics: {}", e);
    };
    match String::from_utf8(buffer) {
        Ok(v) => v,
        Err(e) => {
            warn!("custom metrics could not be from_utf8'd: {}", e);
            String::default()
        }
    }
}
