pub mod mail;
pub mod metrics;
pub mod rate_limiter;
pub mod token;
pub mod users;
