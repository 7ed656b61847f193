#![forbid(unsafe_code)]

mod config;
mod engine;
mod error;
mod executor;
mod migration;
mod registry;
mod runner;
mod target;
mod tracker;

pub use config::*;
pub use engine::*;
pub use error::*;
pub use executor::*;
pub use migration::*;
pub use registry::*;
pub use runner::*;
pub use target::*;
pub use tracker::*;
pub use tokio_util::sync::CancellationToken;
