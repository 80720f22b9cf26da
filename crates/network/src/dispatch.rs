//! # Inbound Dispatch Loop
//!
//! Turns the bytes queued on a session into handler calls.
//!
//! ```text
//! WAIT_OPCODE ──► WAIT_FULL_FRAME ──► DISPATCH ──► ADVANCE ──┐
//!      ▲                │ (short)                            │
//!      │             suspend                                 │
//!      └─────────────────────────────────────────────────────┘
//! ```
//!
//! At most `max_frames` frames are handled per call, so one chatty client
//! cannot starve the tick. A truncated frame leaves the buffer and the opcode
//! key untouched; it is retried on the next tick. An unknown opcode or a bad
//! variable length flags the session end-of-file without consuming anything.

use crate::context::HandlerContext;
use crate::handlers::HandlerFunction;
use crate::router::BroadcastRouter;
use crate::session::SessionRegistry;
use mapgate_core::{ConnectionId, Tick};
use mapgate_game::World;
use mapgate_protocol::{
    Frame, FrameLength, PacketAction, PacketTable, MAX_VARIABLE_FRAME, MIN_VARIABLE_FRAME,
    OPCODE_SIZE, VARIABLE_HEADER_SIZE,
};
use std::fmt::Write;
use std::sync::Arc;

/// Default frame budget per connection per tick
pub const DEFAULT_MAX_FRAMES: usize = 3;

/// Why a parse call returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStop {
    /// Fewer bytes than the next frame needs
    Suspended,
    /// Frame budget for this call spent
    Budget,
    /// Session is end-of-file
    Closed,
}

/// Outcome of one parse call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseReport {
    /// Frames consumed (handled or ignored)
    pub frames: usize,
    /// Frames consumed without running a handler
    pub ignored: usize,
    pub stop: ParseStop,
}

/// Shared game-loop state a handler may touch
pub struct DispatchTarget<'a> {
    pub sessions: &'a mut SessionRegistry,
    pub world: &'a mut World,
    pub router: &'a BroadcastRouter,
    pub tick: Tick,
}

pub struct Dispatcher {
    table: Arc<PacketTable<HandlerFunction>>,
    max_frames: usize,
    dump_invalid: bool,
}

impl Dispatcher {
    pub fn new(table: Arc<PacketTable<HandlerFunction>>) -> Self {
        Self {
            table,
            max_frames: DEFAULT_MAX_FRAMES,
            dump_invalid: false,
        }
    }

    pub fn with_max_frames(mut self, max_frames: usize) -> Self {
        self.max_frames = max_frames.max(1);
        self
    }

    /// Log a hex dump of the offending bytes on protocol violations
    pub fn with_dump_invalid(mut self, dump: bool) -> Self {
        self.dump_invalid = dump;
        self
    }

    pub fn table(&self) -> &PacketTable<HandlerFunction> {
        &self.table
    }

    /// Handle up to `max_frames` complete frames queued on `conn`
    pub fn parse(&self, conn: ConnectionId, target: &mut DispatchTarget<'_>) -> ParseReport {
        let mut report = ParseReport {
            frames: 0,
            ignored: 0,
            stop: ParseStop::Budget,
        };

        for _ in 0..self.max_frames {
            let Some(session) = target.sessions.get_mut(conn) else {
                report.stop = ParseStop::Closed;
                return report;
            };

            if session.eof {
                report.stop = ParseStop::Closed;
                return report;
            }

            //=== WAIT_OPCODE ===//
            let Some(raw) = session.buffer.peek_u16_le(0) else {
                report.stop = ParseStop::Suspended;
                return report;
            };
            let opcode = match &session.cipher {
                Some(cipher) => cipher.decode(raw),
                None => raw,
            };

            let Some(desc) = self.table.lookup(opcode) else {
                tracing::warn!("Session {}: unknown packet 0x{:04x} ({} bytes buffered), disconnecting",
                    conn, opcode, session.buffer.bytes_available());
                if self.dump_invalid {
                    tracing::warn!("Session {} buffer:\n{}", conn, hex_dump(session.buffer.peek(0, session.buffer.bytes_available()).unwrap_or(&[])));
                }
                session.close();
                report.stop = ParseStop::Closed;
                return report;
            };

            //=== WAIT_FULL_FRAME ===//
            let frame_len = match desc.length {
                FrameLength::Fixed(len) => len as usize,
                FrameLength::Variable => {
                    let Some(len) = session.buffer.peek_u16_le(OPCODE_SIZE) else {
                        report.stop = ParseStop::Suspended;
                        return report;
                    };
                    let len = len as usize;
                    if !(MIN_VARIABLE_FRAME..=MAX_VARIABLE_FRAME).contains(&len) {
                        tracing::warn!("Session {}: packet 0x{:04x} has invalid length {} (header {}), disconnecting",
                            conn, opcode, len, VARIABLE_HEADER_SIZE);
                        if self.dump_invalid {
                            tracing::warn!("Session {} buffer:\n{}", conn, hex_dump(session.buffer.peek(0, session.buffer.bytes_available()).unwrap_or(&[])));
                        }
                        session.close();
                        report.stop = ParseStop::Closed;
                        return report;
                    }
                    len
                }
            };

            if session.buffer.bytes_available() < frame_len {
                report.stop = ParseStop::Suspended;
                return report;
            }

            //=== ADVANCE (frame is complete; it will be consumed whatever happens) ===//
            let bytes = session.buffer.consume(frame_len);
            if let Some(cipher) = session.cipher.as_mut() {
                cipher.advance();
            }
            session.stats.frames_received += 1;
            report.frames += 1;

            //=== DISPATCH ===//
            let action = desc.action;
            let runnable = if action == PacketAction::Debug {
                tracing::info!("Session {}: debug packet 0x{:04x} ({} bytes)\n{}",
                    conn, opcode, frame_len, hex_dump(&bytes));
                false
            } else if !session.is_authenticated() {
                action.is_handshake()
            } else if !session.is_in_world() {
                action.allowed_before_world()
            } else {
                true
            };

            let handler = match (&desc.handler, runnable) {
                (Some(handler), true) => handler.clone(),
                _ => {
                    if action != PacketAction::Debug {
                        tracing::debug!("Session {}: ignored packet 0x{:04x} ({})", conn, opcode, action.as_str());
                    }
                    session.stats.frames_ignored += 1;
                    report.ignored += 1;
                    continue;
                }
            };

            let frame = Frame::new(opcode, &bytes, &desc.offsets);
            let mut ctx = HandlerContext {
                conn,
                sessions: &mut *target.sessions,
                world: &mut *target.world,
                router: target.router,
                tick: target.tick,
            };

            if let Err(e) = handler(&mut ctx, &frame) {
                tracing::warn!("Session {}: handler for packet 0x{:04x} ({}) failed: {}",
                    conn, opcode, action.as_str(), e);
            }
        }

        report
    }
}

/// Classic 16-bytes-per-row hex dump
pub fn hex_dump(data: &[u8]) -> String {
    let mut out = String::new();
    for (row, chunk) in data.chunks(16).enumerate() {
        let _ = write!(out, "{:04x}: ", row * 16);
        for b in chunk {
            let _ = write!(out, "{:02x} ", b);
        }
        for _ in chunk.len()..16 {
            out.push_str("   ");
        }
        out.push(' ');
        out.extend(chunk.iter().map(|&b| if b.is_ascii_graphic() { b as char } else { '.' }));
        out.push('\n');
    }
    out
}
