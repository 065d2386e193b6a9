//! Averaged cell-voltage sampling

use embedded_hal::delay::DelayNs;

use crate::config::SamplerConfig;
use crate::hal::{AnalogInput, HalError, Yield};
use crate::types::VoltageReading;

/// Averages several single-shot conversions into one reading
pub struct VoltageSampler<A: AnalogInput> {
    adc: A,
}

impl<A: AnalogInput> VoltageSampler<A> {
    pub fn new(adc: A) -> Self {
        Self { adc }
    }

    /// Take `config.count` conversions, delaying `config.inter_sample_delay`
    /// before every conversion but the first, and return the truncated mean.
    ///
    /// The conversion wait polls without a bound, calling `yield_hook` on
    /// every poll.
    pub fn sample<D: DelayNs, Y: Yield>(
        &mut self,
        config: &SamplerConfig,
        delay: &mut D,
        yield_hook: &mut Y,
    ) -> Result<VoltageReading, HalError> {
        if config.count == 0 {
            return Err(HalError::InvalidConfig);
        }

        let mut sum: u32 = 0;
        for i in 0..config.count {
            if i > 0 {
                delay.delay_us(config.inter_sample_delay.as_micros() as u32);
            }
            sum += self.convert_once(yield_hook)? as u32;
        }

        let mean = sum / config.count as u32;
        #[cfg(feature = "defmt")]
        defmt::trace!("sampled {} conversions, mean {}", config.count, mean);

        Ok(VoltageReading::new(mean as u16))
    }

    fn convert_once<Y: Yield>(&mut self, yield_hook: &mut Y) -> Result<u16, HalError> {
        self.adc.start_conversion().map_err(Into::into)?;
        while self.adc.is_converting().map_err(Into::into)? {
            yield_hook.yield_now();
        }
        self.adc.read_result().map_err(Into::into)
    }

    /// Get mutable access to the analog input
    pub fn adc_mut(&mut self) -> &mut A {
        &mut self.adc
    }

    /// Release the analog input
    pub fn release(self) -> A {
        self.adc
    }
}
