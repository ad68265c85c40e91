// src/config/mod.rs
pub mod cache;
pub mod loader;
pub mod model;

pub use cache::ConfigCache;
pub use loader::{ConfigLoader, TomlFileLoader};
pub use model::{AppConfig, CacheSettings, ExecutorSettings, HttpSettings, SourceConfig, SourceKind};
