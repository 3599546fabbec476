// Service modules (daemon functionality)
pub(crate) mod database;
pub mod fuse;
pub mod http_server;
pub mod process;
pub mod remote;
pub mod service_config;
pub mod service_state;

// Re-exports for the binary and integration tests
pub use database::models::Volume;
pub use database::{Database, DatabaseSetupError};
pub use process::{init_logging, shutdown_on_signal, start_service, ServiceError};
pub use service_config::Config as ServiceConfig;
pub use service_state::State as ServiceState;
