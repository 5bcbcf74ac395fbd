//! Dispatch metrics integration tests

use opentelemetry::metrics::MeterProvider as _;
use opentelemetry_sdk::metrics::data::{AggregatedMetrics, MetricData, ResourceMetrics};
use opentelemetry_sdk::metrics::{InMemoryMetricExporter, PeriodicReader, SdkMeterProvider};
use scoperpc_core::{Error, Fault};
use scoperpc_server::{from_fn, from_sync_fn, no_transport, DispatchMetrics, Dispatcher};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn metered_dispatcher() -> (Dispatcher, SdkMeterProvider, InMemoryMetricExporter) {
    let exporter = InMemoryMetricExporter::default();
    let reader = PeriodicReader::builder(exporter.clone())
        .with_interval(Duration::from_secs(3600))
        .build();
    let provider = SdkMeterProvider::builder().with_reader(reader).build();
    let meter = provider.meter("scoperpc-test");

    let dispatcher = Dispatcher::builder()
        .method("echo", from_sync_fn(|args| Ok(args.into_iter().next().unwrap_or_default())))
        .method("explode", from_fn(|_cx, _args, _done| Err(Fault::new("boom"))))
        .metrics(Arc::new(DispatchMetrics::new_with_meter(&meter)))
        .build()
        .unwrap();

    (dispatcher, provider, exporter)
}

fn names(exported: &[ResourceMetrics]) -> Vec<String> {
    exported
        .iter()
        .flat_map(|resource| resource.scope_metrics())
        .flat_map(|scope| scope.metrics())
        .map(|metric| metric.name().to_string())
        .collect()
}

/// Sum of a u64 counter, or of a u64 histogram's sample counts
fn total(exported: &[ResourceMetrics], name: &str) -> u64 {
    exported
        .iter()
        .flat_map(|resource| resource.scope_metrics())
        .flat_map(|scope| scope.metrics())
        .filter(|metric| metric.name() == name)
        .map(|metric| -> u64 {
            match metric.data() {
                AggregatedMetrics::U64(MetricData::Sum(sum)) => {
                    sum.data_points().map(|point| point.value()).sum()
                }
                AggregatedMetrics::U64(MetricData::Histogram(histogram)) => {
                    histogram.data_points().map(|point| point.count()).sum()
                }
                AggregatedMetrics::F64(MetricData::Histogram(histogram)) => {
                    histogram.data_points().map(|point| point.count()).sum()
                }
                _ => 0,
            }
        })
        .sum()
}

#[test]
fn test_dispatch_records_every_instrument() {
    let (dispatcher, provider, exporter) = metered_dispatcher();

    // The fault comes last: it stops the batch loop, so the batch never replies
    let result = dispatcher.handle(
        &json!([
            {"method": "echo", "params": [1], "id": 1},
            {"method": "nope", "params": [], "id": 2},
            {"method": "explode", "params": [], "id": 3}
        ]),
        no_transport(),
        |_| {},
    );
    assert!(matches!(result, Err(Error::Fault(_))));

    provider.force_flush().unwrap();
    let exported = exporter.get_finished_metrics().unwrap();

    let exported_names = names(&exported);
    for name in [
        "scoperpc.dispatch.payloads.total",
        "scoperpc.dispatch.requests.total",
        "scoperpc.dispatch.request.duration",
        "scoperpc.dispatch.batch.size",
        "scoperpc.dispatch.rejections.total",
        "scoperpc.dispatch.faults.total",
    ] {
        assert!(exported_names.iter().any(|n| n == name), "missing {}", name);
    }

    assert_eq!(total(&exported, "scoperpc.dispatch.payloads.total"), 1);
    assert_eq!(total(&exported, "scoperpc.dispatch.batch.size"), 1);
    assert_eq!(total(&exported, "scoperpc.dispatch.requests.total"), 1);
    assert_eq!(total(&exported, "scoperpc.dispatch.request.duration"), 1);
    assert_eq!(total(&exported, "scoperpc.dispatch.rejections.total"), 1);
    assert_eq!(total(&exported, "scoperpc.dispatch.faults.total"), 1);

    let _ = provider.shutdown();
}

#[test]
fn test_single_requests_are_counted_per_payload() {
    let (dispatcher, provider, exporter) = metered_dispatcher();

    for id in 1..=3 {
        dispatcher
            .handle(&json!({"method": "echo", "params": [id], "id": id}), no_transport(), |_| {})
            .unwrap();
    }
    dispatcher
        .handle(&json!("not a request"), no_transport(), |_| {})
        .unwrap();

    provider.force_flush().unwrap();
    let exported = exporter.get_finished_metrics().unwrap();

    assert_eq!(total(&exported, "scoperpc.dispatch.payloads.total"), 4);
    assert_eq!(total(&exported, "scoperpc.dispatch.requests.total"), 3);
    assert_eq!(total(&exported, "scoperpc.dispatch.rejections.total"), 1);
    assert_eq!(total(&exported, "scoperpc.dispatch.faults.total"), 0);
    assert_eq!(total(&exported, "scoperpc.dispatch.batch.size"), 0);

    let _ = provider.shutdown();
}
