pub mod archiver;
pub mod config;
pub mod db;
pub mod discord;
pub mod error;
pub mod model;
pub mod source;
pub mod store;
