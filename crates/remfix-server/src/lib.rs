pub mod app;
pub mod auth;
pub mod error;
pub mod redis;
pub mod routes;
pub mod state;
pub mod telemetry;
