use crate::wol;
use lazy_static::lazy_static;
use prometheus::{register_int_counter_vec, IntCounterVec, TextEncoder};

lazy_static! {
    static ref MAGIC_PACKETS: IntCounterVec = register_int_counter_vec!(
        "wol_magic_packets_total",
        "Magic packets requested, by outcome.",
        &["result"]
    )
    .unwrap();
}

pub fn record(result: &Result<(), wol::Error>) {
    let label = match result {
        Ok(()) => "sent",
        Err(e) => e.stage(),
    };
    MAGIC_PACKETS.with_label_values(&[label]).inc();
}

/// Renders every registered metric in the Prometheus text format.
pub fn render() -> Result<String, prometheus::Error> {
    let metrics = prometheus::gather();
    let encoder = TextEncoder::new();
    encoder.encode_to_string(&metrics)
}
