pub mod catalog;
pub mod config;
pub mod countries;
pub mod fetch;
pub mod render;
pub mod schedule;
pub mod server;
pub mod session;
pub mod snapshot;
pub mod table;
