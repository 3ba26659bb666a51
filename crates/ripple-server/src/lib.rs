pub mod health;
pub mod routes;
pub mod server;
pub mod ws;

pub use health::{ComponentHealth, HealthReport, HealthReporter};
pub use server::{build_router, start, AppState, ServerConfig, ServerHandle};
