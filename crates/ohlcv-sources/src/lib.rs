//! Source connectors for bar series.
//!
//! Every connector loads a raw series for one request and hands it to its
//! own post-processing pipeline. The factory builds connectors from
//! configuration and the batch runner fans requests out concurrently.

pub mod alpaca;
pub mod batch;
pub mod csv_source;
pub mod factory;
pub mod json_source;
pub mod memory;
pub mod timestamps;

pub use alpaca::{AlpacaCredentials, AlpacaSource};
pub use batch::{BatchOutcome, BatchRunner, DEFAULT_CONCURRENCY, MAX_CONCURRENCY};
pub use csv_source::{ColumnMap, CsvSource};
pub use factory::{available_sources, make_connector};
pub use json_source::{JsonSource, SNAPSHOTS_OPTION};
pub use memory::MemorySource;
pub use timestamps::TimestampFormat;
