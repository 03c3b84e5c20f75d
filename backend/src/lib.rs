pub mod batch;
pub mod config;
pub mod db;
pub mod metrics;
pub mod notify;
pub mod records;
pub mod scheduler;
pub mod source;

pub mod error;
pub mod logger;
pub mod time;
