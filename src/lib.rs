pub mod actor;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod manager;
pub mod models;
pub mod reference;
pub mod repo;
pub mod request; // transition -> backend request mapping
pub mod validate;

// Re-export commonly used items for tests / external users
pub use actor::Role;
pub use config::Config;
pub use error::{LifecycleError, ValidationError};
pub use lifecycle::{ItemViews, Transition};
pub use manager::LifecycleManager;
