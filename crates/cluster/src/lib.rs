//! Cluster side of thoth-s2i: the `oc` client and the image catalog download.

pub mod catalog;
pub mod executor;
pub mod oc;

pub use catalog::fetch_catalog;
pub use executor::{CommandOutput, Executor, LocalExecutor};
pub use oc::OcClient;
