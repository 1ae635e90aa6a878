pub mod cache;
pub mod config;
pub mod embedding;
pub mod error;
pub mod monitoring;
pub mod processor;
pub mod query;
pub mod registry;
pub mod response;
pub mod search;
pub mod server;
pub mod types;
pub mod vector;

pub use config::Config;
pub use error::{CoreError, CoreResult};
pub use processor::QueryProcessor;
pub use server::SearchServer;
pub use types::*;
