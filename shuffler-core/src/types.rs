//! Core data types for the balancing link

use crate::hal::Duration;

/// Averaged cell-voltage reading on the ADC calibration scale
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct VoltageReading(u16);

impl VoltageReading {
    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    pub const fn raw(&self) -> u16 {
        self.0
    }

    /// A reading of 0 means a grounded input, above `max` means over-range.
    /// Both are sensor faults.
    pub const fn is_valid(&self, max: u16) -> bool {
        self.0 != 0 && self.0 <= max
    }
}

/// Level of the shared signal line (idle is high)
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LineLevel {
    High,
    Low,
}

impl LineLevel {
    pub const fn from_high(is_high: bool) -> Self {
        if is_high {
            LineLevel::High
        } else {
            LineLevel::Low
        }
    }

    pub const fn is_high(&self) -> bool {
        matches!(self, LineLevel::High)
    }
}

/// Condition that fires the receiver's line interrupt
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EdgeTrigger {
    /// Fires while the line is low, including when it is already low at arm time
    LowLevel,
    /// Fires on every high-to-low transition
    Falling,
}

/// One constant-level stretch of a transmission
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct LineSegment {
    pub level: LineLevel,
    /// `None` means the level is held indefinitely
    pub duration: Option<Duration>,
}

/// What the client puts on the line for one report
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Transmission {
    /// Trigger followed by `n` unary ticks
    Data(u16),
    /// Line held low with no terminating edge
    ExplicitFault,
}

/// Receive session states
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum SessionState {
    /// Armed for a trigger, counting idle supervisory windows
    Idle = 0,
    /// Low level seen, waiting for the verification window to rule out a glitch
    VerifyTrigger = 1,
    /// Counting falling edges until the reading window expires
    Reading = 2,
    /// Reading window expired with the line idle-high: the count is valid.
    /// This is the successful terminal state.
    Complete = 3,
    /// Reading window expired with the line low, or no trigger ever arrived
    Error = 4,
}

impl SessionState {
    pub const fn from_raw(raw: u8) -> Self {
        match raw {
            0 => SessionState::Idle,
            1 => SessionState::VerifyTrigger,
            2 => SessionState::Reading,
            3 => SessionState::Complete,
            _ => SessionState::Error,
        }
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Complete | SessionState::Error)
    }
}

/// Why a receive session ended in [`SessionState::Error`]
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ReceiveFault {
    /// Reading window expired while the sender still held the line low
    LineHeldLow = 1,
    /// Too many idle windows passed without a trigger
    NoTrigger = 2,
}

impl ReceiveFault {
    pub const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            1 => Some(ReceiveFault::LineHeldLow),
            2 => Some(ReceiveFault::NoTrigger),
            _ => None,
        }
    }
}

/// Result of one completed receive session
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SessionOutcome {
    /// Unary count received and the line returned idle
    Received(u16),
    Failed(ReceiveFault),
}

/// Control loop verdict for the next sub-cycle
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Decision {
    /// Keep the remote enabled and listen again without sleeping
    Continue,
    /// Stop transferring and sleep
    Stop,
}

/// How one master outer cycle ended
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CycleOutcome {
    /// Transfer continues; the remote stays powered and the next cycle starts at once
    Charging { local: VoltageReading, remote: u16 },
    /// Remote caught up with the local cell; transfer stops until the next wake
    Balanced { local: VoltageReading, remote: u16 },
    /// The receive session failed
    LinkFault(ReceiveFault),
    /// Local supply too low to power the remote
    LowSupply(VoltageReading),
}

impl CycleOutcome {
    /// True if the node should run the duty-cycled sleep after this cycle
    pub const fn sleeps(&self) -> bool {
        !matches!(self, CycleOutcome::Charging { .. })
    }
}
