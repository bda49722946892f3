//! Request handlers.

pub mod health;
pub mod info;
pub mod tasks;

pub use health::*;
pub use info::*;
pub use tasks::*;
