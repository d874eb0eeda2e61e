//! SolarEdge monitoring API access and tabular export.
//!
//! - [`operation`]: the fixed set of supported queries and their parameters.
//! - [`gateway`]: HTTP calls with API key injection and error classification.
//! - [`flatten`]: per-operation reshaping of responses into rows.
//! - [`export`]: raw JSON / CSV packaging and file naming.

pub mod export;
pub mod flatten;
pub mod gateway;
pub mod operation;

pub use export::{package, ExportBundle, ExportError, NamingContext};
pub use flatten::{flatten, Flattened, Row};
pub use gateway::{ApiError, Gateway};
pub use operation::{Operation, ParamError, ParamSchema, PreparedCall, RawParams, TimeUnit};
