//! # mapgate Networking Layer
//!
//! Inbound dispatch, outbound broadcast routing and the tokio transport of the
//! zone server.
//!
//! ## Modules
//!
//! - [`buffer`] - Per-connection byte queues
//! - [`session`] - Sessions and the session registry
//! - [`handlers`] - Packet handler registry
//! - [`context`] - What a handler may touch
//! - [`dispatch`] - Inbound dispatch loop
//! - [`router`] - Outbound broadcast router
//! - [`config`] - Networking options
//! - [`server`] - Tokio listener and game loop

pub mod buffer;
pub mod session;
pub mod handlers;
pub mod context;
pub mod dispatch;
pub mod router;
pub mod config;
pub mod server;

// Re-export commonly used items
pub use buffer::ConnectionBuffer;
pub use session::{Session, SessionRegistry, SessionState};
pub use handlers::{HandlerFunction, HandlerRegistry};
pub use context::HandlerContext;
pub use dispatch::{DispatchTarget, Dispatcher, ParseReport, ParseStop};
pub use router::{BroadcastRouter, RouterConfig};
pub use config::NetworkConfig;
pub use server::{TransportEvent, ZoneServer, ZoneState};
