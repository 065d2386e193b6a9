//! Master charge-transfer control loop

use embedded_hal::delay::DelayNs;

use crate::config::ControlConfig;
use crate::decoder::LineDecoder;
use crate::hal::{AnalogInput, Duration, HalError, ReceiverControl, RemoteSupply, StatusIndicator, Yield};
use crate::indicator;
use crate::sampler::VoltageSampler;
use crate::types::{CycleOutcome, Decision, SessionOutcome, VoltageReading};

/// Hardware the master touches during one cycle
pub struct MasterPeripherals<A, R, H, I, D>
where
    A: AnalogInput,
    R: RemoteSupply,
    H: ReceiverControl,
    I: StatusIndicator,
    D: DelayNs,
{
    pub sampler: VoltageSampler<A>,
    pub remote: R,
    pub receiver: H,
    pub indicator: I,
    pub delay: D,
}

/// Hysteresis controller deciding whether to keep charging the remote cell.
///
/// The threshold only remembers the previous decision: a continue widens it
/// to `threshold_high`, a stop narrows it to `threshold_low`.
pub struct ControlLoop {
    config: ControlConfig,
    brief_blink: Duration,
    threshold: u16,
}

impl ControlLoop {
    pub fn new(config: ControlConfig, brief_blink: Duration) -> Self {
        Self {
            threshold: config.threshold_high,
            config,
            brief_blink,
        }
    }

    pub fn config(&self) -> &ControlConfig {
        &self.config
    }

    /// Threshold the next decision will use
    pub fn threshold(&self) -> u16 {
        self.threshold
    }

    pub fn decide(&mut self, local: VoltageReading, remote: u16) -> Decision {
        let below_local = (remote as u32) < local.raw() as u32 + self.threshold as u32;
        let below_max = remote < self.config.max_remote;

        if below_local && below_max {
            self.threshold = self.config.threshold_high;
            Decision::Continue
        } else {
            self.threshold = self.config.threshold_low;
            Decision::Stop
        }
    }

    /// One outer master cycle: check supply, power the remote, receive its
    /// reading and decide.
    ///
    /// On `Charging` the remote is left powered and the caller starts the
    /// next cycle without sleeping.
    pub fn run_cycle<A, R, H, I, D, Y>(
        &mut self,
        decoder: &LineDecoder,
        p: &mut MasterPeripherals<A, R, H, I, D>,
        yield_hook: &mut Y,
    ) -> Result<CycleOutcome, HalError>
    where
        A: AnalogInput,
        R: RemoteSupply,
        H: ReceiverControl,
        I: StatusIndicator,
        D: DelayNs,
        Y: Yield,
    {
        let local = p.sampler.sample(&self.config.presence_sample, &mut p.delay, yield_hook)?;
        if local.raw() <= self.config.min_supply {
            #[cfg(feature = "defmt")]
            defmt::info!("supply too low: {}", local.raw());

            indicator::double_blink(&mut p.indicator, &mut p.delay, self.brief_blink)?;
            p.remote.disable().map_err(Into::into)?;
            return Ok(CycleOutcome::LowSupply(local));
        }

        p.remote.enable().map_err(Into::into)?;
        p.delay.delay_us(self.config.remote_settle.as_micros() as u32);

        let remote = match decoder.listen(&mut p.receiver, yield_hook) {
            SessionOutcome::Received(count) => count,
            SessionOutcome::Failed(fault) => {
                #[cfg(feature = "defmt")]
                defmt::warn!("link fault: {}", fault);

                p.indicator.set_state(true).map_err(Into::into)?;
                p.remote.disable().map_err(Into::into)?;
                return Ok(CycleOutcome::LinkFault(fault));
            }
        };

        let local = p.sampler.sample(&self.config.decision_sample, &mut p.delay, yield_hook)?;
        let decision = self.decide(local, remote);

        #[cfg(feature = "defmt")]
        defmt::info!("local {} remote {} -> {}", local.raw(), remote, decision);

        match decision {
            Decision::Continue => Ok(CycleOutcome::Charging { local, remote }),
            Decision::Stop => {
                p.indicator.set_state(false).map_err(Into::into)?;
                p.remote.disable().map_err(Into::into)?;
                Ok(CycleOutcome::Balanced { local, remote })
            }
        }
    }
}

impl Default for ControlLoop {
    fn default() -> Self {
        Self::new(ControlConfig::DEFAULT, crate::config::IndicatorTiming::DEFAULT.brief_blink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::mock::{MockAnalog, MockDelay, MockIndicator, MockReceiver, MockRemote};
    use crate::types::{LineLevel, ReceiveFault};

    type Peripherals = MasterPeripherals<MockAnalog, MockRemote, MockReceiver, MockIndicator, MockDelay>;

    fn peripherals(samples: &[u16]) -> Peripherals {
        MasterPeripherals {
            sampler: VoltageSampler::new(MockAnalog::new(samples)),
            remote: MockRemote::new(),
            receiver: MockReceiver::new(),
            indicator: MockIndicator::new(),
            delay: MockDelay::new(),
        }
    }

    /// Yield hook playing the remote side by firing decoder handlers directly
    struct ScriptedLink<'a> {
        decoder: &'a LineDecoder,
        hw: MockReceiver,
        reply: Option<u16>,
        done: bool,
    }

    impl<'a> ScriptedLink<'a> {
        fn new(decoder: &'a LineDecoder, reply: Option<u16>) -> Self {
            Self { decoder, hw: MockReceiver::new(), reply, done: false }
        }
    }

    impl Yield for ScriptedLink<'_> {
        fn yield_now(&mut self) {
            if self.done || self.decoder.outcome().is_some() {
                return;
            }
            self.done = true;
            match self.reply {
                Some(count) => {
                    self.hw.level = LineLevel::Low;
                    self.decoder.on_edge(&mut self.hw);
                    self.decoder.on_session_timer(&mut self.hw);
                    for _ in 0..count {
                        self.decoder.on_edge(&mut self.hw);
                    }
                    self.hw.level = LineLevel::High;
                    self.decoder.on_session_timer(&mut self.hw);
                }
                None => {
                    for _ in 0..6 {
                        self.decoder.on_idle_window(&mut self.hw);
                    }
                }
            }
        }
    }

    #[test]
    fn test_decide_scenarios() {
        let mut control = ControlLoop::default();
        let local = VoltageReading::new(200);

        assert_eq!(control.decide(local, 190), Decision::Continue);
        assert_eq!(control.threshold(), 7);

        assert_eq!(control.decide(local, 210), Decision::Stop);
        assert_eq!(control.threshold(), 4);

        // Narrowed threshold: 204 is no longer below 200 + 4
        assert_eq!(control.decide(local, 204), Decision::Stop);
        assert_eq!(control.decide(local, 203), Decision::Continue);
        assert_eq!(control.threshold(), 7);
    }

    #[test]
    fn test_decide_respects_remote_maximum() {
        let mut control = ControlLoop::default();
        assert_eq!(control.decide(VoltageReading::new(236), 232), Decision::Stop);
        assert_eq!(control.decide(VoltageReading::new(236), 231), Decision::Continue);
    }

    #[test]
    fn test_low_supply_skips_remote() {
        let decoder = LineDecoder::default();
        let mut control = ControlLoop::default();
        let mut p = peripherals(&[163]);

        let outcome = control
            .run_cycle(&decoder, &mut p, &mut ScriptedLink::new(&decoder, Some(100)))
            .unwrap();
        assert_eq!(outcome, CycleOutcome::LowSupply(VoltageReading::new(163)));
        assert_eq!(p.remote.enable_count(), 0);
        assert!(!p.remote.is_enabled());
        assert_eq!(p.indicator.history(), &[false, true, false, true, false]);
    }

    #[test]
    fn test_charging_keeps_remote_on() {
        let decoder = LineDecoder::default();
        let mut control = ControlLoop::default();
        let mut p = peripherals(&[200]);

        let outcome = control
            .run_cycle(&decoder, &mut p, &mut ScriptedLink::new(&decoder, Some(190)))
            .unwrap();
        assert_eq!(outcome, CycleOutcome::Charging { local: VoltageReading::new(200), remote: 190 });
        assert!(p.remote.is_enabled());
        assert_eq!(control.threshold(), 7);
        // presence sample plus four decision samples
        assert_eq!(p.sampler.adc_mut().conversions(), 5);
    }

    #[test]
    fn test_balanced_powers_down_remote() {
        let decoder = LineDecoder::default();
        let mut control = ControlLoop::default();
        let mut p = peripherals(&[200]);

        let outcome = control
            .run_cycle(&decoder, &mut p, &mut ScriptedLink::new(&decoder, Some(210)))
            .unwrap();
        assert_eq!(outcome, CycleOutcome::Balanced { local: VoltageReading::new(200), remote: 210 });
        assert!(!p.remote.is_enabled());
        assert!(!p.indicator.is_lit());
        assert_eq!(control.threshold(), 4);
    }

    #[test]
    fn test_link_fault_leaves_threshold() {
        let decoder = LineDecoder::default();
        let mut control = ControlLoop::default();
        control.decide(VoltageReading::new(200), 210);
        let mut p = peripherals(&[200]);

        let outcome = control
            .run_cycle(&decoder, &mut p, &mut ScriptedLink::new(&decoder, None))
            .unwrap();
        assert_eq!(outcome, CycleOutcome::LinkFault(ReceiveFault::NoTrigger));
        assert!(p.indicator.is_lit());
        assert!(!p.remote.is_enabled());
        assert_eq!(control.threshold(), 4);
        assert_eq!(p.delay.total(), ControlConfig::DEFAULT.remote_settle);
    }
}
