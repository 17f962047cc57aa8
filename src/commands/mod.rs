pub mod auth;
pub mod backup;
pub mod entry_models;
pub mod stats;
pub mod trades;

pub use auth::*;
pub use backup::*;
pub use entry_models::*;
pub use stats::*;
pub use trades::*;
