//! Token and identity models produced by the adapters.

pub mod identity;
pub mod token;

pub use identity::*;
pub use token::*;
