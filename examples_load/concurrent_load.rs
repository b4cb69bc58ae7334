use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use tracing::{error, info, info_span};
use tracing_human_sink::init::{build_layer, LayerConfig};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

fn main() {
    let config = LayerConfig::from_env().unwrap_or_default();
    let layer = build_layer(std::io::stderr(), &config);
    let written = Arc::clone(&layer.written_events);
    let failed = Arc::clone(&layer.failed_writes);
    tracing::subscriber::set_global_default(Registry::default().with(layer))
        .expect("set global subscriber");

    let threads: u64 = 8;
    let per_thread: u64 = 10_000;
    let start = Instant::now();

    let handles: Vec<_> = (0..threads)
        .map(|worker| {
            thread::spawn(move || {
                let span = info_span!("worker", worker);
                let _guard = span.enter();
                for i in 0..per_thread {
                    info!(component = "load", iteration = i, "concurrent load test");
                }
                error!(component = "load", worker, "worker finished");
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("worker panicked");
    }

    let elapsed = start.elapsed();
    let n = threads * per_thread;
    println!(
        "concurrent load: {} events from {} threads in {:?} (~{:.0} ev/s), {} written, {} failed",
        n,
        threads,
        elapsed,
        n as f64 / elapsed.as_secs_f64(),
        written.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
    );
}
