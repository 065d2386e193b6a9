//! Master-side receive session state machine
//!
//! The handlers run in interrupt context and are the only writers while the
//! edge reaction or a timer is armed. The foreground writes only in
//! [`LineDecoder::arm`], which it calls while the session is terminal.

use portable_atomic::{AtomicU16, AtomicU8, Ordering};

use crate::config::ProtocolTiming;
use crate::hal::{ReceiverControl, Yield};
use crate::types::{EdgeTrigger, LineLevel, ReceiveFault, SessionOutcome, SessionState};

/// Receive session shared between interrupt handlers and the foreground
pub struct LineDecoder {
    timing: ProtocolTiming,
    state: AtomicU8,
    edges: AtomicU16,
    idle_windows: AtomicU8,
    fault: AtomicU8,
}

impl LineDecoder {
    /// Create a decoder in the terminal `Error` state; call [`arm`](Self::arm)
    /// to start a session
    pub const fn new(timing: ProtocolTiming) -> Self {
        Self {
            timing,
            state: AtomicU8::new(SessionState::Error as u8),
            edges: AtomicU16::new(0),
            idle_windows: AtomicU8::new(0),
            fault: AtomicU8::new(ReceiveFault::NoTrigger as u8),
        }
    }

    pub fn timing(&self) -> &ProtocolTiming {
        &self.timing
    }

    /// Reset the session and wait for a trigger
    pub fn arm<H: ReceiverControl>(&self, hw: &mut H) {
        self.edges.store(0, Ordering::Relaxed);
        self.idle_windows.store(0, Ordering::Relaxed);
        self.fault.store(0, Ordering::Relaxed);
        self.state.store(SessionState::Idle as u8, Ordering::Release);

        hw.arm_edge(EdgeTrigger::LowLevel);
        hw.start_idle_window(self.timing.idle_window);
    }

    /// Line interrupt handler
    pub fn on_edge<H: ReceiverControl>(&self, hw: &mut H) {
        match self.state() {
            SessionState::Idle => {
                hw.stop_idle_window();
                hw.disarm_edge();
                self.state.store(SessionState::VerifyTrigger as u8, Ordering::Release);
                hw.start_session_timer(self.timing.verify_window);
            }
            SessionState::Reading => {
                self.edges.fetch_add(1, Ordering::Relaxed);
            }
            // Stale interrupt
            _ => {}
        }
    }

    /// Session timer expiry handler
    pub fn on_session_timer<H: ReceiverControl>(&self, hw: &mut H) {
        match self.state() {
            SessionState::VerifyTrigger => {
                if hw.line_level() == LineLevel::High {
                    #[cfg(feature = "defmt")]
                    defmt::trace!("trigger glitch filtered");
                    self.arm(hw);
                    return;
                }
                self.edges.store(0, Ordering::Relaxed);
                self.state.store(SessionState::Reading as u8, Ordering::Release);
                hw.start_session_timer(self.timing.reading_timeout);
                hw.arm_edge(EdgeTrigger::Falling);
            }
            SessionState::Reading => {
                hw.stop_session_timer();
                hw.disarm_edge();
                if hw.line_level() == LineLevel::High {
                    self.state.store(SessionState::Complete as u8, Ordering::Release);
                } else {
                    self.fail(ReceiveFault::LineHeldLow);
                }
            }
            _ => {}
        }
    }

    /// Idle supervisory window handler
    pub fn on_idle_window<H: ReceiverControl>(&self, hw: &mut H) {
        if self.state() != SessionState::Idle {
            return;
        }
        let windows = self.idle_windows.load(Ordering::Relaxed).saturating_add(1);
        if windows > self.timing.max_idle_windows {
            hw.stop_idle_window();
            hw.disarm_edge();
            self.idle_windows.store(0, Ordering::Relaxed);
            self.fail(ReceiveFault::NoTrigger);
        } else {
            self.idle_windows.store(windows, Ordering::Relaxed);
        }
    }

    fn fail(&self, fault: ReceiveFault) {
        self.fault.store(fault as u8, Ordering::Relaxed);
        self.state.store(SessionState::Error as u8, Ordering::Release);
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_raw(self.state.load(Ordering::Acquire))
    }

    /// Falling edges counted in the current or last session
    pub fn edge_count(&self) -> u16 {
        self.edges.load(Ordering::Relaxed)
    }

    /// Idle windows elapsed without a trigger
    pub fn idle_windows(&self) -> u8 {
        self.idle_windows.load(Ordering::Relaxed)
    }

    /// Outcome of the session, or `None` while it is still running
    pub fn outcome(&self) -> Option<SessionOutcome> {
        match self.state() {
            SessionState::Complete => Some(SessionOutcome::Received(self.edge_count())),
            SessionState::Error => {
                let fault = ReceiveFault::from_raw(self.fault.load(Ordering::Relaxed))
                    .unwrap_or(ReceiveFault::LineHeldLow);
                Some(SessionOutcome::Failed(fault))
            }
            _ => None,
        }
    }

    /// Run one receive session to completion.
    ///
    /// The session always ends: either the reading window or the idle
    /// supervisory limit expires.
    pub fn listen<H: ReceiverControl, Y: Yield>(&self, hw: &mut H, yield_hook: &mut Y) -> SessionOutcome {
        self.arm(hw);
        loop {
            if let Some(outcome) = self.outcome() {
                #[cfg(feature = "defmt")]
                defmt::debug!("session ended: {}", outcome);
                return outcome;
            }
            yield_hook.yield_now();
        }
    }
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::new(ProtocolTiming::DEFAULT)
    }
}
