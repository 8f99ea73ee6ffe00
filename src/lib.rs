//! Parallel ingestion and aggregation for very large `key;value` measurement
//! files.
//!
//! The input is planned into line-aligned byte ranges, streamed by a pool of
//! readers into whole-lines buffers, tokenized and locally aggregated by a
//! pool of workers, and merged by a single reducer thread so the global map
//! never needs a lock. The only output is the sorted
//! `{key=min/mean/max, ...}` report.
//!
//! ```no_run
//! use onebrc_pipeline::{Pipeline, PipelineConfig};
//!
//! # fn main() -> Result<(), onebrc_pipeline::PipelineError> {
//! let report = Pipeline::new(PipelineConfig::default())
//!     .process("measurements.txt".as_ref())?;
//! println!("{report}");
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod chunk;
pub mod config;
pub mod error;
pub mod parse;
pub mod pipeline;
pub mod stats;

mod reader;

pub use config::PipelineConfig;
pub use error::PipelineError;
pub use pipeline::Pipeline;
pub use stats::{Aggregate, Stats};
