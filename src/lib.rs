pub mod airdrop;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod merkle;
pub mod models;
pub mod points;
pub mod rpc;
pub mod store;
pub mod updaters;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use error::IndexerError;
