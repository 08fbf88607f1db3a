use std::{
    sync::atomic::{AtomicU64, Ordering},
    thread,
    time::Duration,
};

use metrics_exporter_stats::{
    AggregatedSample, ExporterConfig, PrometheusSink, SampleMap, Snapshotter, StatsExporter,
};

/// Fakes the stats of a busy node: peer count drifts, traffic comes in bursts.
#[derive(Default)]
struct NodeStats {
    ticks: AtomicU64,
}

impl Snapshotter for NodeStats {
    type Snapshot = u64;
    type Error = String;

    fn snapshot(&self) -> u64 {
        self.ticks.fetch_add(1, Ordering::Relaxed)
    }

    fn restore(&self, tick: u64) -> Result<SampleMap, String> {
        // Every tenth snapshot is "expired", to show cycles being skipped.
        if tick % 10 == 9 {
            return Err(format!("snapshot {tick} expired"));
        }

        let peers = (8 + tick % 5) as f64;
        let bytes: Vec<f64> = (1..=tick % 7 + 1).map(|i| (i * 256) as f64 / 1000.0).collect();
        let max_bytes = bytes.iter().copied().fold(0.0, f64::max);

        let mut metrics = SampleMap::new();
        metrics.insert("node.peers".to_owned(), AggregatedSample::new(peers, vec![peers]));
        metrics.insert("node.conns".to_owned(), AggregatedSample::new(peers * 2.0, vec![]));
        metrics.insert("rcv.bytes".to_owned(), AggregatedSample::new(max_bytes, bytes));
        metrics.insert("send.msgs".to_owned(), AggregatedSample::new(1.0, vec![0.5, 1.0]));
        metrics.insert("gc.pauses".to_owned(), AggregatedSample::new(0.01, vec![0.01]));
        Ok(metrics)
    }
}

fn main() {
    tracing_subscriber::fmt::init();

    let sink = PrometheusSink::new();
    let handle = sink.handle();

    let exporter = StatsExporter::new(NodeStats::default(), sink);
    exporter
        .configure(ExporterConfig::new().with_interval(Duration::from_millis(500)))
        .expect("failed to start exporter");

    for _ in 0..6 {
        thread::sleep(Duration::from_secs(1));
        println!("{}", handle.render());
    }

    exporter.close();
    println!("{:?}", exporter.telemetry());
}
