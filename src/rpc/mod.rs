pub mod fetcher;
pub mod ingester;
pub mod parser;
pub mod submitter;
