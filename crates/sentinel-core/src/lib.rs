pub mod config;
pub mod content;
pub mod error;
pub mod io;
pub mod paths;
pub mod publisher;
pub mod scheduler;
pub mod store;
pub mod types;

pub use error::{Result, SentinelError};
