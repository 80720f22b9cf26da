//! # Packet Handler System
//!
//! Maps each [`PacketAction`] to the game-logic function that runs for it.
//!
//! # Architecture
//!
//! ## Handler Registry
//!
//! Handlers are registered per action, not per opcode: the same action lives
//! under different opcodes depending on the client revision. When the server
//! starts, [`HandlerRegistry::install`] builds the descriptor table for the
//! configured revision and resolves each definition's action to its handler.
//! Actions without a registered handler are still framed and consumed.
//!
//! # Thread Safety
//!
//! Handlers run synchronously inside the game loop with exclusive access to
//! sessions and world state through the [`HandlerContext`]. They must be
//! `Send + Sync` only so the built table can be shared behind an `Arc`.
//!
//! # Example
//!
//! ```no_run
//! use mapgate_network::HandlerRegistry;
//! use mapgate_protocol::PacketAction;
//!
//! let mut registry = HandlerRegistry::new();
//! registry.register_function(PacketAction::ChatLeave, |ctx, _frame| {
//!     tracing::debug!("chat leave from {}", ctx.conn);
//!     Ok(())
//! });
//! ```

use crate::context::HandlerContext;
use mapgate_core::{PacketVersion, Result};
use mapgate_protocol::{build_table, Frame, PacketAction, PacketTable};
use std::collections::HashMap;
use std::sync::Arc;

/// Type for packet handler functions
///
/// # Purpose
/// Receives the game-loop context and the complete frame. An error is logged
/// by the dispatch loop; the frame is consumed either way.
pub type HandlerFunction =
    Arc<dyn Fn(&mut HandlerContext<'_>, &Frame<'_>) -> Result<()> + Send + Sync>;

/// Registry of packet handlers
///
/// # Purpose
/// Maintains a mapping from packet actions to handler functions.
pub struct HandlerRegistry {
    /// Map from packet action to handler function
    handlers: HashMap<PacketAction, HandlerFunction>,
}

impl HandlerRegistry {
    /// Create a new handler registry
    ///
    /// # Returns
    /// An empty registry ready for handler registration
    #[inline]
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a function-based handler
    ///
    /// # Arguments
    /// * `action` - The packet action to handle
    /// * `handler` - Function to call for frames of this action
    ///
    /// Registering an action twice replaces the earlier handler.
    pub fn register_function<F>(&mut self, action: PacketAction, handler: F)
    where
        F: Fn(&mut HandlerContext<'_>, &Frame<'_>) -> Result<()> + Send + Sync + 'static,
    {
        tracing::debug!("Registered handler for packet action: {}", action.as_str());
        self.handlers.insert(action, Arc::new(handler));
    }

    /// Handler registered for an action
    pub fn get(&self, action: PacketAction) -> Option<HandlerFunction> {
        self.handlers.get(&action).cloned()
    }

    /// Check if a handler is registered for an action
    pub fn has_handler(&self, action: PacketAction) -> bool {
        self.handlers.contains_key(&action)
    }

    /// Get the number of registered handlers
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Build the descriptor table for a client revision
    ///
    /// # Errors
    /// A definition that fails table validation (startup error)
    pub fn install(&self, version: PacketVersion) -> Result<PacketTable<HandlerFunction>> {
        let table = build_table(version, |action| self.get(action))?;
        let bound = table.iter().filter(|d| d.handler.is_some()).count();
        tracing::info!("Installed {} packet handlers for version {}", bound, version);
        Ok(table)
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_register() {
        let mut registry = HandlerRegistry::new();
        registry.register_function(PacketAction::LoadEndAck, |_ctx, _frame| Ok(()));

        assert!(registry.has_handler(PacketAction::LoadEndAck));
        assert!(!registry.has_handler(PacketAction::WalkToXY));
        assert_eq!(registry.handler_count(), 1);
    }

    #[test]
    fn test_install_resolves_actions() {
        let mut registry = HandlerRegistry::new();
        registry.register_function(PacketAction::WalkToXY, |_ctx, _frame| Ok(()));

        let table = registry.install(PacketVersion::V2013_12_23).unwrap();
        assert!(table.lookup(0x0437).unwrap().handler.is_some());
        assert!(table.lookup(0x0085).unwrap().handler.is_some());
        assert!(table.lookup(0x035f).unwrap().handler.is_none());
    }
}
