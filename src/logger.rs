pub const INIT_TAR: &str = "octeon::init";
pub const IPSEC_TAR: &str = "octeon::ipsec";
pub const STATICS_TAR: &str = "octeon::statics";
pub const STATICS_LEVEL: tracing::Level = tracing::Level::INFO;

use tracing::Subscriber;
use tracing_chrome::{ChromeLayer, ChromeLayerBuilder};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, filter, fmt, registry};

/// Chrome trace of hardware-visible accesses, written to `<file>.trace.json`.
pub fn statics<S>(file: &str) -> (ChromeLayer<S>, tracing_chrome::FlushGuard)
where
    S: Subscriber + for<'span> registry::LookupSpan<'span> + Send + Sync,
{
    ChromeLayerBuilder::new()
        .include_args(true)
        .file(format!("{}.trace.json", file))
        .include_locations(false)
        .build()
}

pub fn default<S>() -> filter::Filtered<
    fmt::Layer<
        S,
        fmt::format::Pretty,
        fmt::format::Format<fmt::format::Pretty>,
        tracing_appender::non_blocking::NonBlocking,
    >,
    EnvFilter,
    S,
>
where
    S: Subscriber + for<'span> registry::LookupSpan<'span> + Send + Sync,
{
    let (non_blocking, _guard) = tracing_appender::non_blocking(std::io::stdout());
    std::mem::forget(_guard);
    let filter_layer = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(""));
    fmt::layer()
        .pretty()
        .with_writer(non_blocking)
        .with_filter(filter_layer)
}

/// Filter keeping only statistics events.
pub fn statics_filter() -> filter::FilterFn<impl Fn(&tracing::Metadata<'_>) -> bool> {
    filter::filter_fn(|metadata| {
        metadata.level() == &STATICS_LEVEL && metadata.target() == STATICS_TAR
    })
}
