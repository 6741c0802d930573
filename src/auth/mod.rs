pub mod jwt;
pub mod telegram;

pub use jwt::JwtService;
pub use telegram::{InitDataVerifier, TelegramUser};
