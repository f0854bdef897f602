use prometheus::{
    Encoder, Histogram, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

fn encode_registry(registry: &Registry) -> Result<String, String> {
    let metric_families = registry.gather();
    let mut buffer = Vec::new();

    TextEncoder::new()
        .encode(&metric_families, &mut buffer)
        .map_err(|err| format!("failed to encode metrics: {err}"))?;

    String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
}

/// Main-service metrics.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub dispatches_total: IntCounterVec,
    pub accepts_total: IntCounterVec,
    pub rejects_total: IntCounter,
    pub otp_verifications_total: IntCounterVec,
    pub broadcast_pool_size: Histogram,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let dispatches_total = IntCounterVec::new(
            Opts::new("dispatches_total", "Order dispatches by outcome"),
            &["outcome"],
        )
        .expect("valid dispatches_total metric");

        let accepts_total = IntCounterVec::new(
            Opts::new("accepts_total", "Assignment accept attempts by outcome"),
            &["outcome"],
        )
        .expect("valid accepts_total metric");

        let rejects_total = IntCounter::new("rejects_total", "Assignment rejections")
            .expect("valid rejects_total metric");

        let otp_verifications_total = IntCounterVec::new(
            Opts::new("otp_verifications_total", "Delivery OTP checks by outcome"),
            &["outcome"],
        )
        .expect("valid otp_verifications_total metric");

        let broadcast_pool_size = Histogram::with_opts(
            prometheus::HistogramOpts::new(
                "broadcast_pool_size",
                "Candidate couriers per broadcast",
            )
            .buckets(vec![1.0, 2.0, 5.0, 10.0, 20.0]),
        )
        .expect("valid broadcast_pool_size metric");

        registry
            .register(Box::new(dispatches_total.clone()))
            .expect("register dispatches_total");
        registry
            .register(Box::new(accepts_total.clone()))
            .expect("register accepts_total");
        registry
            .register(Box::new(rejects_total.clone()))
            .expect("register rejects_total");
        registry
            .register(Box::new(otp_verifications_total.clone()))
            .expect("register otp_verifications_total");
        registry
            .register(Box::new(broadcast_pool_size.clone()))
            .expect("register broadcast_pool_size");

        Self {
            registry,
            dispatches_total,
            accepts_total,
            rejects_total,
            otp_verifications_total,
            broadcast_pool_size,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        encode_registry(&self.registry)
    }
}

/// Relay-process metrics.
#[derive(Clone)]
pub struct RelayMetrics {
    registry: Registry,
    pub connected_clients: IntGauge,
    pub pushes_total: IntCounterVec,
    pub callback_failures_total: IntCounter,
}

impl RelayMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let connected_clients =
            IntGauge::new("connected_clients", "Currently open live connections")
                .expect("valid connected_clients metric");

        let pushes_total = IntCounterVec::new(
            Opts::new("pushes_total", "Events pushed to live connections"),
            &["kind"],
        )
        .expect("valid pushes_total metric");

        let callback_failures_total = IntCounter::new(
            "callback_failures_total",
            "Failed persistence callbacks to the main service",
        )
        .expect("valid callback_failures_total metric");

        registry
            .register(Box::new(connected_clients.clone()))
            .expect("register connected_clients");
        registry
            .register(Box::new(pushes_total.clone()))
            .expect("register pushes_total");
        registry
            .register(Box::new(callback_failures_total.clone()))
            .expect("register callback_failures_total");

        Self {
            registry,
            connected_clients,
            pushes_total,
            callback_failures_total,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        encode_registry(&self.registry)
    }
}
