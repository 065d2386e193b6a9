//! Hardware Abstraction Layer for the balancing link

// Re-export time types based on feature
#[cfg(feature = "embassy-time")]
pub use embassy_time::Duration;

#[cfg(not(feature = "embassy-time"))]
pub use self::mock_time::Duration;

#[cfg(not(feature = "embassy-time"))]
mod mock_time {
    /// Mock duration type with microsecond resolution, API-compatible with
    /// the subset of `embassy_time::Duration` used by this crate
    #[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
    pub struct Duration(u64);

    impl Duration {
        pub const fn from_micros(us: u64) -> Self {
            Self(us)
        }

        pub const fn from_millis(ms: u64) -> Self {
            Self(ms * 1_000)
        }

        pub const fn from_secs(s: u64) -> Self {
            Self(s * 1_000_000)
        }

        pub const fn as_micros(&self) -> u64 {
            self.0
        }

        pub const fn as_millis(&self) -> u64 {
            self.0 / 1_000
        }
    }

    impl core::ops::Add for Duration {
        type Output = Duration;

        fn add(self, rhs: Duration) -> Duration {
            Duration(self.0 + rhs.0)
        }
    }

    impl core::ops::Div<u32> for Duration {
        type Output = Duration;

        fn div(self, rhs: u32) -> Duration {
            Duration(self.0 / rhs as u64)
        }
    }

    impl core::ops::Mul<u32> for Duration {
        type Output = Duration;

        fn mul(self, rhs: u32) -> Duration {
            Duration(self.0 * rhs as u64)
        }
    }
}

use crate::types::{EdgeTrigger, LineLevel};

/// Error types for HAL operations
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HalError {
    /// GPIO operation failed
    GpioError,
    /// Analog conversion failed
    AdcError,
    /// Timing operation failed
    TimingError,
    /// Interrupt configuration failed
    InterruptError,
    /// Hardware not initialized
    NotInitialized,
    /// Invalid configuration
    InvalidConfig,
}

#[cfg(feature = "std")]
impl core::fmt::Display for HalError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            HalError::GpioError => write!(f, "GPIO operation failed"),
            HalError::AdcError => write!(f, "Analog conversion failed"),
            HalError::TimingError => write!(f, "Timing operation failed"),
            HalError::InterruptError => write!(f, "Interrupt configuration failed"),
            HalError::NotInitialized => write!(f, "Hardware not initialized"),
            HalError::InvalidConfig => write!(f, "Invalid configuration"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for HalError {}

/// Single-channel analog front end
pub trait AnalogInput {
    type Error: Into<HalError>;

    /// Start one single-shot conversion
    fn start_conversion(&mut self) -> Result<(), Self::Error>;

    /// True while the conversion started last is still running
    fn is_converting(&mut self) -> Result<bool, Self::Error>;

    /// Result of the last completed conversion, already on the calibration scale
    fn read_result(&mut self) -> Result<u16, Self::Error>;
}

/// Trait for the status indicator (LED)
pub trait StatusIndicator {
    type Error: Into<HalError>;

    /// Set indicator state (true = lit)
    fn set_state(&mut self, on: bool) -> Result<(), Self::Error>;

    /// Get current indicator state
    fn get_state(&self) -> Result<bool, Self::Error>;

    /// Toggle indicator state
    fn toggle(&mut self) -> Result<(), Self::Error> {
        let current = self.get_state()?;
        self.set_state(!current)
    }
}

/// Power switch for the remote (client) node, owned by the master
pub trait RemoteSupply {
    type Error: Into<HalError>;

    /// Power the remote node
    fn enable(&mut self) -> Result<(), Self::Error>;

    /// Cut power to the remote node
    fn disable(&mut self) -> Result<(), Self::Error>;
}

/// Receive-side line and timer control.
///
/// These calls are made from interrupt context by [`crate::LineDecoder`] and
/// are therefore infallible: implementations are plain register writes.
pub trait ReceiverControl {
    /// Current level of the shared line
    fn line_level(&mut self) -> LineLevel;

    /// Enable the line interrupt with the given trigger condition
    fn arm_edge(&mut self, trigger: EdgeTrigger);

    /// Disable the line interrupt
    fn disarm_edge(&mut self);

    /// Start the one-shot session timer (verification or reading window)
    fn start_session_timer(&mut self, timeout: Duration);

    /// Stop the session timer without firing
    fn stop_session_timer(&mut self);

    /// Start the periodic idle supervisory window timer from zero
    fn start_idle_window(&mut self, window: Duration);

    /// Stop the idle supervisory window timer
    fn stop_idle_window(&mut self);
}

/// Peripheral gating, supervisory timer and low-power halt
pub trait PowerControl {
    /// Power the analog front end and timers up or down
    fn set_peripherals_powered(&mut self, powered: bool);

    /// Acknowledge (feed) the supervisory watchdog
    fn acknowledge_watchdog(&mut self);

    /// Halt until the next wake-up source fires
    fn halt_until_wake(&mut self);
}

/// Explicit scheduler hook invoked by every polling wait
pub trait Yield {
    fn yield_now(&mut self);
}

impl<Y: Yield + ?Sized> Yield for &mut Y {
    fn yield_now(&mut self) {
        (**self).yield_now()
    }
}

/// Yield hook that only hints the CPU it is spinning
#[derive(Copy, Clone, Debug, Default)]
pub struct SpinYield;

impl Yield for SpinYield {
    fn yield_now(&mut self) {
        core::hint::spin_loop();
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    //! Mock implementations for testing

    use super::*;
    use heapless::Vec;

    /// Analog input replaying a fixed list of conversion results.
    /// The last value repeats once the list is exhausted.
    pub struct MockAnalog {
        results: Vec<u16, 16>,
        next: usize,
        busy_polls: u8,
        remaining_busy: u8,
        conversions: usize,
        converting: bool,
    }

    impl MockAnalog {
        pub fn new(results: &[u16]) -> Self {
            Self {
                results: Vec::from_slice(results).unwrap(),
                next: 0,
                busy_polls: 0,
                remaining_busy: 0,
                conversions: 0,
                converting: false,
            }
        }

        /// Number of polls reporting "in progress" after each start
        pub fn with_busy_polls(mut self, polls: u8) -> Self {
            self.busy_polls = polls;
            self
        }

        pub fn conversions(&self) -> usize {
            self.conversions
        }
    }

    impl AnalogInput for MockAnalog {
        type Error = HalError;

        fn start_conversion(&mut self) -> Result<(), Self::Error> {
            if self.converting {
                return Err(HalError::AdcError);
            }
            self.converting = true;
            self.remaining_busy = self.busy_polls;
            Ok(())
        }

        fn is_converting(&mut self) -> Result<bool, Self::Error> {
            if self.remaining_busy > 0 {
                self.remaining_busy -= 1;
                return Ok(true);
            }
            Ok(false)
        }

        fn read_result(&mut self) -> Result<u16, Self::Error> {
            if !self.converting {
                return Err(HalError::NotInitialized);
            }
            self.converting = false;
            self.conversions += 1;
            let value = self
                .results
                .get(self.next)
                .or(self.results.last())
                .copied()
                .ok_or(HalError::AdcError)?;
            if self.next < self.results.len() {
                self.next += 1;
            }
            Ok(value)
        }
    }

    /// Indicator recording every level it was driven to
    #[derive(Default)]
    pub struct MockIndicator {
        state: bool,
        history: Vec<bool, 128>,
    }

    impl MockIndicator {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn is_lit(&self) -> bool {
            self.state
        }

        pub fn history(&self) -> &[bool] {
            &self.history
        }
    }

    impl StatusIndicator for MockIndicator {
        type Error = HalError;

        fn set_state(&mut self, on: bool) -> Result<(), Self::Error> {
            self.state = on;
            self.history.push(on).ok();
            Ok(())
        }

        fn get_state(&self) -> Result<bool, Self::Error> {
            Ok(self.state)
        }
    }

    #[derive(Default)]
    pub struct MockRemote {
        enabled: bool,
        enables: usize,
    }

    impl MockRemote {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn is_enabled(&self) -> bool {
            self.enabled
        }

        pub fn enable_count(&self) -> usize {
            self.enables
        }
    }

    impl RemoteSupply for MockRemote {
        type Error = HalError;

        fn enable(&mut self) -> Result<(), Self::Error> {
            self.enabled = true;
            self.enables += 1;
            Ok(())
        }

        fn disable(&mut self) -> Result<(), Self::Error> {
            self.enabled = false;
            Ok(())
        }
    }

    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub enum PowerEvent {
        PeripheralsOn,
        PeripheralsOff,
        WatchdogAck,
        Halt,
    }

    #[derive(Default)]
    pub struct MockPower {
        events: Vec<PowerEvent, 256>,
    }

    impl MockPower {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn events(&self) -> &[PowerEvent] {
            &self.events
        }

        pub fn count(&self, event: PowerEvent) -> usize {
            self.events.iter().filter(|e| **e == event).count()
        }
    }

    impl PowerControl for MockPower {
        fn set_peripherals_powered(&mut self, powered: bool) {
            let event = if powered { PowerEvent::PeripheralsOn } else { PowerEvent::PeripheralsOff };
            self.events.push(event).ok();
        }

        fn acknowledge_watchdog(&mut self) {
            self.events.push(PowerEvent::WatchdogAck).ok();
        }

        fn halt_until_wake(&mut self) {
            self.events.push(PowerEvent::Halt).ok();
        }
    }

    /// Delay that only accumulates the requested time
    #[derive(Default)]
    pub struct MockDelay {
        total_ns: u64,
        calls: usize,
    }

    impl MockDelay {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn total(&self) -> Duration {
            Duration::from_micros(self.total_ns / 1_000)
        }

        pub fn calls(&self) -> usize {
            self.calls
        }
    }

    impl embedded_hal::delay::DelayNs for MockDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.total_ns += ns as u64;
            self.calls += 1;
        }
    }

    /// Receiver control exposing what the decoder configured
    pub struct MockReceiver {
        pub level: LineLevel,
        pub edge: Option<EdgeTrigger>,
        pub session_timer: Option<Duration>,
        pub idle_window: Option<Duration>,
        pub idle_window_starts: usize,
    }

    impl MockReceiver {
        pub fn new() -> Self {
            Self {
                level: LineLevel::High,
                edge: None,
                session_timer: None,
                idle_window: None,
                idle_window_starts: 0,
            }
        }
    }

    impl Default for MockReceiver {
        fn default() -> Self {
            Self::new()
        }
    }

    impl ReceiverControl for MockReceiver {
        fn line_level(&mut self) -> LineLevel {
            self.level
        }

        fn arm_edge(&mut self, trigger: EdgeTrigger) {
            self.edge = Some(trigger);
        }

        fn disarm_edge(&mut self) {
            self.edge = None;
        }

        fn start_session_timer(&mut self, timeout: Duration) {
            self.session_timer = Some(timeout);
        }

        fn stop_session_timer(&mut self) {
            self.session_timer = None;
        }

        fn start_idle_window(&mut self, window: Duration) {
            self.idle_window = Some(window);
            self.idle_window_starts += 1;
        }

        fn stop_idle_window(&mut self) {
            self.idle_window = None;
        }
    }

    /// Yield hook counting how often a wait polled
    #[derive(Default)]
    pub struct CountingYield {
        pub count: usize,
    }

    impl Yield for CountingYield {
        fn yield_now(&mut self) {
            self.count += 1;
        }
    }
}
