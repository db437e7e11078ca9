pub mod auth;
pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod fetch;
pub mod item;
pub mod job;
pub mod progress;
pub mod reassemble;
pub mod verification;
pub mod worker;

pub use config::Config;
pub use error::DepotFetchError;
