// src/config/mod.rs
pub mod collector;
pub mod social;

pub use collector::CollectorConfig;
pub use social::SocialConfig;
