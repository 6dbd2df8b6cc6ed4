pub mod types;
pub mod tables;
pub mod preferences;
pub mod delivery;
pub mod config;
pub mod error;

pub use types::*;
pub use preferences::*;
pub use delivery::*;
pub use config::Config;
pub use error::ClearPerksError;
