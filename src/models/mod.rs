pub mod db_model;
pub mod event_model;
pub mod queries;
pub mod rpc_model;

pub use db_model::*;
pub use event_model::*;
pub use rpc_model::*;
