//! mapgate core - fundamental types and utilities shared by every crate

mod error;
mod types;
mod idgen;
mod positions;
mod tick;

pub use error::*;
pub use types::*;
pub use idgen::*;
pub use positions::*;
pub use tick::*;
