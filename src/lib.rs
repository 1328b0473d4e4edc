pub mod analyzer;
pub mod api;
pub mod classifier;
pub mod config;
pub mod db;
pub mod error;
pub mod history;
pub mod models;
pub mod report;
pub mod search;
pub mod store;
