pub mod aggregate;
pub mod calendar;

pub use aggregate::*;
pub use calendar::*;
