pub mod bridge;
pub mod config;
pub mod error;
pub mod server;
pub mod transport;

pub use error::{Error, Result};
