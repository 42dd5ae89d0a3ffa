use std::sync::OnceLock;

use log::{debug, error};
use supports_color::Stream;
use tracing_subscriber::prelude::*;
use tracing_subscriber::reload::Handle;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

use crate::commands::Verbosity;

static LOGGER_HANDLE: OnceLock<Handle<EnvFilter, Registry>> = OnceLock::new();

/// Install the global subscriber on first use and set the filter for `verbosity`.
///
/// `RUST_LOG` takes precedence over the verbosity flags.
pub(crate) fn init_logger(verbosity: Option<Verbosity>) {
    let verbosity = verbosity.unwrap_or_default();
    let log_filter = log_filter(verbosity);

    let filter_handle = LOGGER_HANDLE.get_or_init(|| {
        let (subscriber, reload_handle) = create_registry_and_filter_reload_handle();
        subscriber.init();
        reload_handle
    });

    update_filters(filter_handle, log_filter);
}

fn log_filter(verbosity: Verbosity) -> &'static str {
    match verbosity {
        // Show only errors
        Verbosity::Quiet => "off,verge=error",
        // Only show warnings
        Verbosity::Verbose(0) => "off,verge=warn",
        // Show our own info logs
        Verbosity::Verbose(1) => "off,verge=info",
        // Also show debug from our libraries
        Verbosity::Verbose(2) => "off,verge=debug,verge_rust_sdk=debug,verge_catalog=debug",
        Verbosity::Verbose(3) => "off,verge=trace,verge_rust_sdk=trace,verge_catalog=trace",
        // Also show the http stack
        Verbosity::Verbose(4) => "debug,verge=trace,verge_rust_sdk=trace,verge_catalog=trace",
        Verbosity::Verbose(_) => "trace",
    }
}

pub fn update_filters(filter_handle: &Handle<EnvFilter, Registry>, log_filter: &str) {
    let result = filter_handle.modify(|layer| {
        match EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(log_filter)) {
            Ok(new_filter) => *layer = new_filter,
            Err(err) => {
                error!("Updating logger filter failed: {}", err);
            },
        };
    });
    if let Err(err) = result {
        error!("Updating logger filter failed: {}", err);
    }
}

pub fn create_registry_and_filter_reload_handle() -> (
    impl tracing_subscriber::layer::SubscriberExt,
    Handle<EnvFilter, Registry>,
) {
    debug!("Initializing logger (how are you seeing this?)");
    // The first filter sets an upper bound for `log` verbosity,
    // so start at `trace` and narrow it down through the reload handle.
    let filter = EnvFilter::new("trace");
    let (filter, filter_reload_handle) = tracing_subscriber::reload::Layer::new(filter);
    let log_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(supports_color::on(Stream::Stderr).is_some())
        .event_format(tracing_subscriber::fmt::format())
        .with_filter(filter);
    let registry = tracing_subscriber::registry().with(log_layer);

    (registry, filter_reload_handle)
}
