// Library root: configuration, persistence, data model, weight vector and the
// upstream statistics client shared by the engine and the application.

pub mod config;
pub mod db;
pub mod model;
pub mod stats_api;
pub mod weather;
pub mod weights;
