#![forbid(unsafe_code)]

pub mod account_store;
pub mod api;
pub mod clock;
pub mod config;
pub mod error;
pub mod operation_types;
pub mod transaction_log;
pub mod transaction_processor;
pub mod types;
