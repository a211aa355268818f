pub mod dashboard;
pub mod health;
pub mod ping;
pub mod stats;
pub mod webhook;
