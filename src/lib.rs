//! Declarative remote-data access: describe what you need as a composable
//! [`Muse`] plan, and let the evaluator worry about concurrency, batching,
//! deduplication and caching.
//!
//! ```ignore
//! use muse::{collect, run_blocking, source, RunOptions};
//!
//! let plan = collect(vec![source(UserById(1)), source(UserById(2))]);
//! let users = run_blocking(plan, RunOptions::new())?;
//! ```

mod any;
mod cache;
mod env;
mod error;
mod evaluator;
mod fetch;
mod identity;
mod kind;
mod muse;
mod node;
mod run;
mod source;

pub use cache::Cache;
pub use env::{Env, RunOptions};
pub use error::MuseError;
pub use kind::KindId;
pub use muse::{batched_source, collect, flat_map, map, source, traverse, value, Muse};
pub use run::{execute, run, run_blocking};
pub use source::{BatchedSource, DataSource};
