//! Status indicator patterns
//!
//! | Pattern       | Meaning                          |
//! |---------------|----------------------------------|
//! | rapid blink   | waiting on the line or the ADC   |
//! | solid on      | link or sensor fault             |
//! | off           | idle or balanced                 |
//! | double blink  | local supply too low             |
//! | periodic blip | heartbeat while sleeping         |

use embedded_hal::delay::DelayNs;

use crate::hal::{Duration, HalError, StatusIndicator, Yield};

/// Yield hook that toggles an indicator every `every` polls so a busy wait
/// shows as rapid blinking
pub struct ActivityBlinker<I: StatusIndicator> {
    indicator: I,
    every: u16,
    count: u16,
}

impl<I: StatusIndicator> ActivityBlinker<I> {
    pub fn new(indicator: I, every: u16) -> Self {
        Self {
            indicator,
            every: every.max(1),
            count: 0,
        }
    }

    pub fn indicator(&self) -> &I {
        &self.indicator
    }
}

impl<I: StatusIndicator> Yield for ActivityBlinker<I> {
    fn yield_now(&mut self) {
        self.count += 1;
        if self.count >= self.every {
            self.count = 0;
            self.indicator.toggle().ok();
        }
    }
}

fn delay_for<D: DelayNs>(delay: &mut D, duration: Duration) {
    delay.delay_us(duration.as_micros() as u32);
}

/// Low-supply pattern: off, then four toggles `period` apart
pub fn double_blink<I: StatusIndicator, D: DelayNs>(
    indicator: &mut I,
    delay: &mut D,
    period: Duration,
) -> Result<(), HalError> {
    indicator.set_state(false).map_err(Into::into)?;
    for _ in 0..4 {
        delay_for(delay, period);
        indicator.toggle().map_err(Into::into)?;
    }
    Ok(())
}

/// Invert the indicator for `on_time`, then restore it
pub fn blip<I: StatusIndicator, D: DelayNs>(
    indicator: &mut I,
    delay: &mut D,
    on_time: Duration,
) -> Result<(), HalError> {
    indicator.toggle().map_err(Into::into)?;
    delay_for(delay, on_time);
    indicator.toggle().map_err(Into::into)
}
