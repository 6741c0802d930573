pub mod adapters;
pub mod auth;
pub mod config;
pub mod core;
pub mod domain;
pub mod http;
pub mod utils;

pub use config::{DeployArgs, GatewayArgs, GatewayConfig};
pub use http::{router, AppState};
pub use utils::error::{DonlyError, Result};
