//! Server tick clock
//!
//! Handlers read the current tick to stamp outbound messages (movement start
//! times, time sync replies). The core never interprets the value.

use parking_lot::Mutex;
use std::time::Instant;

/// Millisecond tick count
pub type Tick = u64;

enum TickSource {
    System(Instant),
    Manual(Mutex<Tick>),
}

/// Monotonic millisecond clock
pub struct TickClock {
    source: TickSource,
}

impl TickClock {
    /// Clock that counts milliseconds since creation
    pub fn system() -> Self {
        Self {
            source: TickSource::System(Instant::now()),
        }
    }

    /// Clock that only moves when [`TickClock::advance`] is called
    pub fn manual(start: Tick) -> Self {
        Self {
            source: TickSource::Manual(Mutex::new(start)),
        }
    }

    pub fn current_tick(&self) -> Tick {
        match &self.source {
            TickSource::System(started) => started.elapsed().as_millis() as Tick,
            TickSource::Manual(tick) => *tick.lock(),
        }
    }

    /// Move a manual clock forward; no effect on a system clock
    pub fn advance(&self, millis: Tick) {
        if let TickSource::Manual(tick) = &self.source {
            *tick.lock() += millis;
        }
    }
}

impl Default for TickClock {
    fn default() -> Self {
        Self::system()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock() {
        let clock = TickClock::manual(1000);
        assert_eq!(clock.current_tick(), 1000);
        clock.advance(40);
        assert_eq!(clock.current_tick(), 1040);
    }

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = TickClock::system();
        let a = clock.current_tick();
        let b = clock.current_tick();
        assert!(b >= a);
    }
}
