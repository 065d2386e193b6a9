//! Timing, threshold and power configuration for both nodes

use crate::hal::Duration;

/// Line protocol timing shared by encoder and decoder
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ProtocolTiming {
    /// Duration of each half of one unary tick
    pub bit_period: Duration,
    /// How long the sender holds the line low to start a transmission
    pub trigger_hold: Duration,
    /// Low time the receiver requires before it accepts a trigger
    pub verify_window: Duration,
    /// Receiver window for the whole data burst, started once the trigger is verified
    pub reading_timeout: Duration,
    /// One idle supervisory window
    pub idle_window: Duration,
    /// Idle windows tolerated without a trigger before the session errors out
    pub max_idle_windows: u8,
    /// Largest reading that can be transmitted
    pub max_reading: u16,
}

impl ProtocolTiming {
    pub const DEFAULT: Self = Self {
        bit_period: Duration::from_micros(250),
        trigger_hold: Duration::from_micros(500),
        verify_window: Duration::from_micros(128), // 4 ticks at 31.25 kHz
        reading_timeout: Duration::from_millis(500),
        idle_window: Duration::from_micros(2_097_152), // 65536 ticks at 31.25 kHz
        max_idle_windows: 5,
        max_reading: 237, // about 4.20 V on the client cell
    };

    /// Create a timing set with validation
    pub fn new(
        bit_period: Duration,
        trigger_hold: Duration,
        verify_window: Duration,
        reading_timeout: Duration,
        max_reading: u16,
    ) -> Result<Self, &'static str> {
        let timing = Self {
            bit_period,
            trigger_hold,
            verify_window,
            reading_timeout,
            max_reading,
            ..Self::DEFAULT
        };
        timing.validate()?;
        Ok(timing)
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if self.bit_period.as_micros() == 0 {
            return Err("Bit period must be non-zero");
        }
        if self.verify_window.as_micros() == 0 || self.verify_window >= self.bit_period {
            return Err("Verify window must be non-zero and shorter than one bit period");
        }
        if self.trigger_hold <= self.bit_period {
            return Err("Trigger hold must be longer than one bit period");
        }
        if self.max_reading == 0 {
            return Err("Maximum reading must be at least 1");
        }
        if self.max_idle_windows == 0 {
            return Err("At least one idle window is required");
        }
        if self.reading_timeout < self.longest_transmission() {
            return Err("Reading timeout shorter than the longest transmission");
        }
        Ok(())
    }

    /// Line time of a `Data(count)` transmission from the first falling edge
    /// until the line returns idle for good
    pub fn transmission_length(&self, count: u16) -> Duration {
        self.trigger_hold + self.bit_period * (2 * count as u32 + 1)
    }

    /// Line time of the largest valid transmission
    pub fn longest_transmission(&self) -> Duration {
        self.transmission_length(self.max_reading)
    }
}

impl Default for ProtocolTiming {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Averaging parameters for one voltage sample
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SamplerConfig {
    /// Conversions averaged into one reading
    pub count: u8,
    /// Delay before every conversion except the first
    pub inter_sample_delay: Duration,
}

impl SamplerConfig {
    pub const fn new(count: u8, inter_sample_delay: Duration) -> Self {
        Self { count, inter_sample_delay }
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if self.count == 0 {
            return Err("Sample count must be at least 1");
        }
        Ok(())
    }
}

/// Master charge-transfer policy
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ControlConfig {
    /// The remote is only powered while the local reading is above this
    pub min_supply: u16,
    /// Transfer stops once the remote reaches this absolute maximum
    pub max_remote: u16,
    /// Threshold applied after a continue decision
    pub threshold_high: u16,
    /// Threshold applied after a stop decision
    pub threshold_low: u16,
    /// Quick check deciding whether to power the remote at all
    pub presence_sample: SamplerConfig,
    /// Averaged re-sample taken after a successful receive
    pub decision_sample: SamplerConfig,
    /// Time the remote needs to power up after being enabled
    pub remote_settle: Duration,
}

impl ControlConfig {
    pub const DEFAULT: Self = Self {
        min_supply: 163,  // about 2.90 V
        max_remote: 232,  // about 4.12 V
        threshold_high: 7, // about 0.124 V
        threshold_low: 4,  // about 0.071 V
        presence_sample: SamplerConfig::new(1, Duration::from_millis(0)),
        decision_sample: SamplerConfig::new(4, Duration::from_millis(10)),
        remote_settle: Duration::from_millis(50),
    };

    pub fn validate(&self) -> Result<(), &'static str> {
        if self.threshold_low > self.threshold_high {
            return Err("Low threshold must not exceed the high threshold");
        }
        if self.min_supply >= self.max_remote {
            return Err("Minimum supply must be below the remote maximum");
        }
        self.presence_sample.validate()?;
        self.decision_sample.validate()
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Indicator pattern timing
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct IndicatorTiming {
    /// On or off time of a short blink
    pub brief_blink: Duration,
    /// On time of the heartbeat blip after each wake
    pub heartbeat_blip: Duration,
    /// Yield calls between activity blinker toggles
    pub activity_toggle_every: u16,
}

impl IndicatorTiming {
    pub const DEFAULT: Self = Self {
        brief_blink: Duration::from_millis(30),
        heartbeat_blip: Duration::from_millis(30),
        activity_toggle_every: 16384,
    };
}

impl Default for IndicatorTiming {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Duty-cycled sleep and power-on settle parameters
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PowerConfig {
    /// Power-on debounce delay before the first cycle
    pub settle: Duration,
    /// Longest stretch between watchdog acknowledgments during the settle delay
    pub watchdog_slice: Duration,
    /// Halt/wake iterations composing one idle sleep
    pub wake_cycles: u8,
    /// Blip the indicator on every wake
    pub heartbeat: bool,
}

impl PowerConfig {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.watchdog_slice.as_micros() == 0 {
            return Err("Watchdog slice must be non-zero");
        }
        if self.wake_cycles == 0 {
            return Err("At least one wake cycle is required");
        }
        Ok(())
    }
}

/// Complete master node configuration
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MasterConfig {
    pub timing: ProtocolTiming,
    pub control: ControlConfig,
    pub power: PowerConfig,
    pub indicator: IndicatorTiming,
}

impl MasterConfig {
    pub const DEFAULT: Self = Self {
        timing: ProtocolTiming::DEFAULT,
        control: ControlConfig::DEFAULT,
        power: PowerConfig {
            settle: Duration::from_secs(3),
            watchdog_slice: Duration::from_secs(1),
            wake_cycles: 30, // roughly five minutes between cycles
            heartbeat: true,
        },
        indicator: IndicatorTiming::DEFAULT,
    };

    pub fn validate(&self) -> Result<(), &'static str> {
        self.timing.validate()?;
        self.control.validate()?;
        self.power.validate()
    }
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Complete client node configuration
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    pub timing: ProtocolTiming,
    pub sampler: SamplerConfig,
    pub power: PowerConfig,
    pub indicator: IndicatorTiming,
}

impl ClientConfig {
    pub const DEFAULT: Self = Self {
        timing: ProtocolTiming::DEFAULT,
        sampler: SamplerConfig::new(3, Duration::from_millis(10)),
        power: PowerConfig {
            settle: Duration::from_secs(1),
            watchdog_slice: Duration::from_secs(1),
            wake_cycles: 1,
            heartbeat: false,
        },
        indicator: IndicatorTiming {
            brief_blink: Duration::from_millis(50),
            ..IndicatorTiming::DEFAULT
        },
    };

    pub fn validate(&self) -> Result<(), &'static str> {
        self.timing.validate()?;
        self.sampler.validate()?;
        self.power.validate()
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
