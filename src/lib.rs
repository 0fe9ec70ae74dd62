pub mod aggregate;
pub mod config;
pub mod dataset;
pub mod output;
pub mod server;
