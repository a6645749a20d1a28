pub mod account;
pub mod artifacts;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod models;
pub mod normalize;
pub mod ownership;
pub mod routes;
pub mod schema;
pub mod state;
pub mod storage;
pub mod summarizer;
