//! Request handlers.

pub mod admin;
pub mod credits;
pub mod generations;
pub mod health;
pub mod uploads;

pub use admin::*;
pub use credits::*;
pub use generations::*;
pub use health::*;
pub use uploads::*;
