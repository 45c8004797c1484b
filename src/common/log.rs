use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};
use tracing_tree::HierarchicalLayer;
use tracing_tree::time::UtcDateTime;

/// Installs the global subscriber. `RUST_LOG` overrides the default `info`
/// level; `verbose` raises the default to `debug`.
pub fn init(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let tree = HierarchicalLayer::default()
        .with_indent_amount(2)
        .with_indent_lines(true)
        .with_deferred_spans(true)
        .with_span_retrace(true)
        .with_targets(true)
        .with_writer(std::io::stderr)
        .with_timer(UtcDateTime::default());
    // Already set in tests that share a process.
    _ = Registry::default().with(filter).with(tree).try_init();
}
