// Domain layer - Core business models and pure rules
pub mod battery;
pub mod classification;
pub mod daily_profile;
pub mod device;
pub mod gauge;
pub mod risk;
pub mod session;
pub mod telemetry;
