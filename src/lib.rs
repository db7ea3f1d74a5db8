pub mod cache;
pub mod cities;
pub mod client;
pub mod config;
pub mod routes;
pub mod weather;
