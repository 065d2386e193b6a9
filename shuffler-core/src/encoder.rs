//! Client-side line encoder
//!
//! A reading `n` in `1..=max_reading` goes out as one trigger pulse followed
//! by `n` unary ticks:
//!
//! ```text
//!  idle ‾‾‾‾\___________/‾‾‾‾\____/‾‾‾‾\____/‾‾‾‾ ... ‾‾‾‾ idle
//!           |  trigger  | bit | bit| bit | bit|
//! ```
//!
//! Any other reading is a sensor fault and the line is held low with no
//! terminating edge.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use crate::config::{ClientConfig, IndicatorTiming, ProtocolTiming, SamplerConfig};
use crate::hal::{AnalogInput, Duration, HalError, StatusIndicator, Yield};
use crate::sampler::VoltageSampler;
use crate::types::{LineLevel, LineSegment, Transmission, VoltageReading};

impl Transmission {
    /// Line segments of this transmission in order
    pub fn segments(&self, timing: &ProtocolTiming) -> Segments {
        let total = match *self {
            Transmission::Data(count) => 2 + 2 * count as u32,
            Transmission::ExplicitFault => 1,
        };
        Segments {
            transmission: *self,
            trigger_hold: timing.trigger_hold,
            bit_period: timing.bit_period,
            index: 0,
            total,
        }
    }
}

/// Iterator over the [`LineSegment`]s of a [`Transmission`]
#[derive(Clone, Debug)]
pub struct Segments {
    transmission: Transmission,
    trigger_hold: Duration,
    bit_period: Duration,
    index: u32,
    total: u32,
}

impl Iterator for Segments {
    type Item = LineSegment;

    fn next(&mut self) -> Option<LineSegment> {
        if self.index >= self.total {
            return None;
        }
        let index = self.index;
        self.index += 1;

        let segment = match self.transmission {
            Transmission::ExplicitFault => LineSegment { level: LineLevel::Low, duration: None },
            Transmission::Data(_) if index == 0 => LineSegment {
                level: LineLevel::Low,
                duration: Some(self.trigger_hold),
            },
            Transmission::Data(_) => LineSegment {
                // odd segments are the high halves
                level: if index % 2 == 1 { LineLevel::High } else { LineLevel::Low },
                duration: Some(self.bit_period),
            },
        };
        Some(segment)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.total - self.index) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Segments {}

/// Client node transmitter
#[derive(Copy, Clone, Debug)]
pub struct LineEncoder {
    timing: ProtocolTiming,
    sampler: SamplerConfig,
    indicator: IndicatorTiming,
}

impl LineEncoder {
    /// Encoder with the given protocol timing and default client sampling
    pub const fn new(timing: ProtocolTiming) -> Self {
        Self {
            timing,
            sampler: ClientConfig::DEFAULT.sampler,
            indicator: ClientConfig::DEFAULT.indicator,
        }
    }

    pub const fn from_config(config: &ClientConfig) -> Self {
        Self {
            timing: config.timing,
            sampler: config.sampler,
            indicator: config.indicator,
        }
    }

    pub fn timing(&self) -> &ProtocolTiming {
        &self.timing
    }

    /// Choose what goes on the line for `reading`
    pub fn encode(&self, reading: VoltageReading) -> Transmission {
        if reading.is_valid(self.timing.max_reading) {
            Transmission::Data(reading.raw())
        } else {
            Transmission::ExplicitFault
        }
    }

    /// Drive `line` with the transmission for `reading`.
    ///
    /// Blocks for the whole data burst. On `ExplicitFault` the line is left
    /// low when this returns.
    pub fn transmit<P: OutputPin, D: DelayNs>(
        &self,
        reading: VoltageReading,
        line: &mut P,
        delay: &mut D,
    ) -> Result<Transmission, HalError> {
        let transmission = self.encode(reading);

        #[cfg(feature = "defmt")]
        defmt::debug!("transmit {}", transmission);

        for segment in transmission.segments(&self.timing) {
            let driven = match segment.level {
                LineLevel::High => line.set_high(),
                LineLevel::Low => line.set_low(),
            };
            driven.map_err(|_| HalError::GpioError)?;

            if let Some(duration) = segment.duration {
                delay.delay_us(duration.as_micros() as u32);
            }
        }

        Ok(transmission)
    }

    /// One client report cycle: sample, transmit and signal the result.
    ///
    /// Success blinks the indicator once. A fault leaves it solid on with
    /// the line held low.
    pub fn report<A, P, I, D, Y>(
        &self,
        sampler: &mut VoltageSampler<A>,
        line: &mut P,
        indicator: &mut I,
        delay: &mut D,
        yield_hook: &mut Y,
    ) -> Result<Transmission, HalError>
    where
        A: AnalogInput,
        P: OutputPin,
        I: StatusIndicator,
        D: DelayNs,
        Y: Yield,
    {
        indicator.set_state(false).map_err(Into::into)?;
        let reading = sampler.sample(&self.sampler, delay, yield_hook)?;
        let transmission = self.transmit(reading, line, delay)?;

        let blink_us = self.indicator.brief_blink.as_micros() as u32;
        match transmission {
            Transmission::Data(_) => {
                indicator.set_state(true).map_err(Into::into)?;
                delay.delay_us(blink_us);
                indicator.set_state(false).map_err(Into::into)?;
            }
            Transmission::ExplicitFault => {
                #[cfg(feature = "defmt")]
                defmt::warn!("sensor fault, reading {}", reading.raw());

                indicator.set_state(false).map_err(Into::into)?;
                delay.delay_us(blink_us);
                indicator.set_state(true).map_err(Into::into)?;
            }
        }

        Ok(transmission)
    }
}

impl Default for LineEncoder {
    fn default() -> Self {
        Self::from_config(&ClientConfig::DEFAULT)
    }
}
