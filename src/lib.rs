pub mod auth;
pub mod avatar;
pub mod clock;
pub mod configuration;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod startup;
pub mod store;
pub mod telemetry;
pub mod transport;
pub mod validators;
