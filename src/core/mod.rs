pub mod contract;
pub mod deploy;
pub mod donation_service;
pub mod monitor;
pub mod static_service;
pub mod user_service;
pub mod wish_service;

pub use deploy::{ContractDeployer, DeployConfig, DeploymentInfo};
pub use donation_service::DonationService;
pub use monitor::{ChainMonitor, MonitorConfig};
pub use static_service::StaticService;
pub use user_service::UserService;
pub use wish_service::WishService;
