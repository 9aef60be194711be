pub mod cluster;
pub mod config;
pub mod error;
pub mod java;
pub mod node;
pub mod package;
pub mod ports;
pub mod process;
pub mod properties;
pub mod retry;

pub use cluster::Orchestrator;
pub use error::{NacosctlError, Result};
pub use ports::{PortAllocator, PortSet};
