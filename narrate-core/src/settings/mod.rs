pub mod config;
pub mod manager;

#[cfg(test)]
mod tests;

pub use config::{ProviderConfig, RetrySettings, Settings};
pub use manager::SettingsManager;
