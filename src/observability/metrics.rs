use prometheus::{
    Encoder, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub jobs_total: IntCounterVec,
    pub job_latency_seconds: HistogramVec,
    pub dispatch_queue_depth: IntGauge,
    pub notifications_sent_total: IntCounterVec,
    pub accepts_total: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let jobs_total = IntCounterVec::new(
            Opts::new("jobs_total", "Total dispatch jobs by kind and outcome"),
            &["kind", "outcome"],
        )
        .expect("valid jobs_total metric");

        let job_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "job_latency_seconds",
                "Latency of dispatch job execution in seconds",
            ),
            &["kind"],
        )
        .expect("valid job_latency_seconds metric");

        let dispatch_queue_depth = IntGauge::new(
            "dispatch_queue_depth",
            "Jobs submitted to the dispatch loop and not yet picked up",
        )
        .expect("valid dispatch_queue_depth metric");

        let notifications_sent_total = IntCounterVec::new(
            Opts::new(
                "notifications_sent_total",
                "Courier notification sends by outcome",
            ),
            &["outcome"],
        )
        .expect("valid notifications_sent_total metric");

        let accepts_total = IntCounterVec::new(
            Opts::new("accepts_total", "Order accept attempts by outcome"),
            &["outcome"],
        )
        .expect("valid accepts_total metric");

        registry
            .register(Box::new(jobs_total.clone()))
            .expect("register jobs_total");
        registry
            .register(Box::new(job_latency_seconds.clone()))
            .expect("register job_latency_seconds");
        registry
            .register(Box::new(dispatch_queue_depth.clone()))
            .expect("register dispatch_queue_depth");
        registry
            .register(Box::new(notifications_sent_total.clone()))
            .expect("register notifications_sent_total");
        registry
            .register(Box::new(accepts_total.clone()))
            .expect("register accepts_total");

        Self {
            registry,
            jobs_total,
            job_latency_seconds,
            dispatch_queue_depth,
            notifications_sent_total,
            accepts_total,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}
