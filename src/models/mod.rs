pub mod entry_model;
pub mod trade;
pub mod user;

pub use entry_model::*;
pub use trade::*;
pub use user::*;
