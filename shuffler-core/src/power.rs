//! Duty-cycled sleep, power-on settle and watchdog discipline

use embedded_hal::delay::DelayNs;

use crate::config::PowerConfig;
use crate::hal::{Duration, HalError, PowerControl, StatusIndicator};
use crate::indicator::blip;

/// Counts halt/wake iterations of one sleep
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DutyCycleCounter {
    remaining: u8,
}

impl DutyCycleCounter {
    pub const fn new(cycles: u8) -> Self {
        Self { remaining: cycles }
    }

    pub const fn remaining(&self) -> u8 {
        self.remaining
    }
}

impl Iterator for DutyCycleCounter {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        Some(self.remaining)
    }
}

pub struct PowerManager {
    config: PowerConfig,
    heartbeat_blip: Duration,
}

impl PowerManager {
    pub const fn new(config: PowerConfig, heartbeat_blip: Duration) -> Self {
        Self { config, heartbeat_blip }
    }

    pub fn config(&self) -> &PowerConfig {
        &self.config
    }

    /// Power-on debounce delay, acknowledging the watchdog after every slice
    pub fn settle<P: PowerControl, D: DelayNs>(&self, power: &mut P, delay: &mut D) {
        let slice = self.config.watchdog_slice.as_micros().max(1);
        let mut remaining = self.config.settle.as_micros();

        while remaining > 0 {
            let step = remaining.min(slice);
            delay.delay_us(step as u32);
            power.acknowledge_watchdog();
            remaining -= step;
        }
    }

    /// Called at the top of every outer iteration
    pub fn begin_cycle<P: PowerControl>(&self, power: &mut P) {
        power.acknowledge_watchdog();
    }

    /// Idle sleep between cycles.
    ///
    /// Peripherals are powered back on even if the heartbeat fails.
    pub fn sleep<P, I, D>(&self, power: &mut P, indicator: &mut I, delay: &mut D) -> Result<(), HalError>
    where
        P: PowerControl,
        I: StatusIndicator,
        D: DelayNs,
    {
        #[cfg(feature = "defmt")]
        defmt::debug!("sleeping for {} wake cycles", self.config.wake_cycles);

        power.set_peripherals_powered(false);
        let result = self.duty_cycle(power, indicator, delay);
        power.set_peripherals_powered(true);
        result
    }

    fn duty_cycle<P, I, D>(&self, power: &mut P, indicator: &mut I, delay: &mut D) -> Result<(), HalError>
    where
        P: PowerControl,
        I: StatusIndicator,
        D: DelayNs,
    {
        for _ in DutyCycleCounter::new(self.config.wake_cycles) {
            power.acknowledge_watchdog();
            power.halt_until_wake();
            if self.config.heartbeat {
                blip(indicator, delay, self.heartbeat_blip)?;
            }
        }
        Ok(())
    }
}
