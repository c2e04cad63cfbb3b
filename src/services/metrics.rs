use lazy_static::lazy_static;
use prometheus::{register_counter_vec, register_gauge_vec, CounterVec, GaugeVec};

lazy_static! {
    // ── Event counters ──────────────────────────────────────────────────────
    pub static ref AUTH_DECISIONS_COUNTER: CounterVec = register_counter_vec!(
        "auth_decisions_total",
        "Authorization decisions on guarded routes by outcome",
        &["outcome"]
    ).unwrap();

    pub static ref RATE_LIMIT_REJECTIONS_COUNTER: CounterVec = register_counter_vec!(
        "rate_limit_rejections_total",
        "Requests rejected with 429 by limiter",
        &["limiter"]
    ).unwrap();

    pub static ref TOKENS_ISSUED_COUNTER: CounterVec = register_counter_vec!(
        "tokens_issued_total",
        "Signed tokens issued by purpose",
        &["token_type"]
    ).unwrap();

    // ── State gauges ────────────────────────────────────────────────────────
    pub static ref RATE_LIMIT_BUCKETS_GAUGE: GaugeVec = register_gauge_vec!(
        "rate_limit_buckets",
        "Live token buckets held in memory by limiter",
        &["limiter"]
    ).unwrap();
}

pub fn record_decision(outcome: &str) {
    AUTH_DECISIONS_COUNTER.with_label_values(&[outcome]).inc();
}

pub fn record_rejection(limiter: &str) {
    RATE_LIMIT_REJECTIONS_COUNTER.with_label_values(&[limiter]).inc();
}

pub fn record_issued(token_type: &str) {
    TOKENS_ISSUED_COUNTER.with_label_values(&[token_type]).inc();
}

pub fn set_bucket_count(limiter: &str, count: usize) {
    RATE_LIMIT_BUCKETS_GAUGE.with_label_values(&[limiter]).set(count as f64);
}
