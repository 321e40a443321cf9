pub mod config;
pub mod constants;
pub mod plugin_system;
pub mod utils;

// Re-export key public types for easier use by the binary
pub use config::{ConfigError, RegistryConfig};
pub use plugin_system::{
    PluginDependency, PluginDescriptor, PluginManager, PluginManifest, PluginRegistry, PluginSystemError,
};
