//! # mapgate Game State
//!
//! World model the broadcast router resolves scopes against.
//!
//! ## Modules
//!
//! - `unit` - Units and player state
//! - `groups` - Parties, guilds, battlegrounds, duels, clans and chat rooms
//! - `spatial` - Block index for area queries
//! - `world` - Owner of all units and groups
//! - `scope` - Delivery scopes and their predicates

pub mod unit;
pub mod groups;
pub mod spatial;
pub mod world;
pub mod scope;

// Re-export commonly used types
pub use unit::{PlayerState, Unit};
pub use groups::{ChatRoom, Group};
pub use spatial::{MapBlocks, BLOCK_SIZE};
pub use world::World;
pub use scope::{AreaFilter, AreaRadius, GroupRange, Scope};
