//! First-Party Sets Service
//!
//! Startup loading and the long-lived handler that serves the finalized sets,
//! enterprise customizations and site-data clearing decisions.
//!
//! # Modules
//!
//! - `config`: Handler configuration
//! - `loader`: Two-input loader that emits the public sets once
//! - `handler`: The shared service object
//! - `persistence`: File access and the sites-to-clear store

pub mod config;
pub mod handler;
pub mod loader;
pub mod persistence;

pub use config::{ConfigError, HandlerConfig};
pub use handler::{CustomizationCallback, FirstPartySetsHandler, SetsCallback};
pub use loader::{parse_component_sets, LoadCompleteCallback, SetsLoader};
pub use persistence::{
    FilePersistence, InMemorySitesToClearStore, PersistenceError, SetsPersistence, SitesToClearStore,
};
