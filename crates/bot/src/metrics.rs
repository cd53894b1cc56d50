//! Prometheus registry for the bot process.

use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// Updates received from the chat service, by kind.
pub static UPDATES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("animedl_updates_total", "Total chat updates handled"),
        &["kind"], // "text", "callback", "ignored"
    )
    .unwrap()
});

fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(UPDATES_TOTAL.clone()))
        .unwrap();

    // Core metrics (search, selection, downloads)
    for metric in animedl_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_includes_core_metrics() {
        UPDATES_TOTAL.with_label_values(&["text"]).inc();
        animedl_core::metrics::SEARCHES
            .with_label_values(&["ok"])
            .inc();

        let text = encode_metrics();
        assert!(text.contains("animedl_updates_total"));
        assert!(text.contains("animedl_searches_total"));
    }
}
