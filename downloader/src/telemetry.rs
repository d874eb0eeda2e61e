//! Operator log layer.
//!
//! Only classified monitoring API failures reach the operator log; everything
//! else stays on the stdout layer.

use tracing::{Level, Subscriber};
use tracing_subscriber::{
    filter::Targets,
    fmt::MakeWriter,
    registry::LookupSpan,
    Layer,
};

/// Target of the events `Gateway::call` emits on failure.
pub const GATEWAY_TARGET: &str = "solaredge::gateway";

/// JSON lines (timestamp, level, message, fields) for API failures only.
pub fn operator_layer<S, W>(writer: W) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    tracing_subscriber::fmt::layer()
        .json()
        .with_ansi(false)
        .with_writer(writer)
        .with_filter(Targets::new().with_target(GATEWAY_TARGET, Level::ERROR))
}
