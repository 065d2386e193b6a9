//! Master cycle scenarios against a simulated client

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use shuffler_core::hal::mock::{MockAnalog, MockDelay, MockIndicator, MockRemote};
    use shuffler_core::test_utils::line_sim::{LineSimulator, SimReceiver};
    use shuffler_core::{
        ControlLoop, CycleOutcome, Duration, LineDecoder, MasterConfig, MasterPeripherals, ReceiveFault,
        Transmission, VoltageReading, VoltageSampler,
    };

    type Peripherals<'a> = MasterPeripherals<MockAnalog, MockRemote, SimReceiver<'a>, MockIndicator, MockDelay>;

    fn peripherals(sim: &LineSimulator, local: u16) -> Peripherals<'_> {
        MasterPeripherals {
            sampler: VoltageSampler::new(MockAnalog::new(&[local])),
            remote: MockRemote::new(),
            receiver: sim.receiver(),
            indicator: MockIndicator::new(),
            delay: MockDelay::new(),
        }
    }

    fn control() -> ControlLoop {
        let config = MasterConfig::DEFAULT;
        ControlLoop::new(config.control, config.indicator.brief_blink)
    }

    /// Run one master cycle with the client answering `reply`
    fn cycle(control: &mut ControlLoop, local: u16, reply: Option<Transmission>) -> (CycleOutcome, bool, bool) {
        let config = MasterConfig::DEFAULT;
        let sim = LineSimulator::new();
        let decoder = LineDecoder::new(config.timing);
        if let Some(transmission) = reply {
            sim.schedule(Duration::from_millis(2), &transmission, &config.timing);
        }

        let mut p = peripherals(&sim, local);
        let outcome = control
            .run_cycle(&decoder, &mut p, &mut sim.yielder(&decoder))
            .expect("mock hardware never fails");
        (outcome, p.remote.is_enabled(), p.indicator.is_lit())
    }

    #[rstest]
    #[case::keeps_charging(200, 190, 7)]
    #[case::caught_up(200, 210, 4)]
    #[case::inside_threshold(200, 206, 7)]
    #[case::at_threshold(200, 207, 4)]
    #[case::remote_at_maximum(236, 232, 4)]
    fn test_received_reading_decision(#[case] local: u16, #[case] remote: u16, #[case] threshold: u16) {
        let mut control = control();
        assert_eq!(control.threshold(), 7);

        let (outcome, remote_on, lit) = cycle(&mut control, local, Some(Transmission::Data(remote)));
        let local = VoltageReading::new(local);

        if threshold == 7 {
            assert_eq!(outcome, CycleOutcome::Charging { local, remote });
            assert!(remote_on);
        } else {
            assert_eq!(outcome, CycleOutcome::Balanced { local, remote });
            assert!(!remote_on);
            assert!(!lit);
        }
        assert_eq!(control.threshold(), threshold);
    }

    #[rstest]
    #[case::silent_client(None, ReceiveFault::NoTrigger)]
    #[case::sensor_fault(Some(Transmission::ExplicitFault), ReceiveFault::LineHeldLow)]
    fn test_link_faults_light_indicator(#[case] reply: Option<Transmission>, #[case] fault: ReceiveFault) {
        let mut control = control();
        let (outcome, remote_on, lit) = cycle(&mut control, 200, reply);

        assert_eq!(outcome, CycleOutcome::LinkFault(fault));
        assert!(outcome.sleeps());
        assert!(!remote_on);
        assert!(lit);
        assert_eq!(control.threshold(), 7);
    }

    #[rstest]
    #[case::at_minimum(163)]
    #[case::far_below(100)]
    fn test_low_supply_never_powers_remote(#[case] local: u16) {
        let mut control = control();
        let (outcome, remote_on, lit) = cycle(&mut control, local, Some(Transmission::Data(150)));

        assert_eq!(outcome, CycleOutcome::LowSupply(VoltageReading::new(local)));
        assert!(!remote_on);
        assert!(!lit);
    }

    #[test]
    fn test_threshold_remembers_only_last_decision() {
        let mut control = control();

        let (outcome, ..) = cycle(&mut control, 200, Some(Transmission::Data(210)));
        assert!(matches!(outcome, CycleOutcome::Balanced { .. }));
        assert_eq!(control.threshold(), 4);

        // 203 < 200 + 4 restarts charging and widens the threshold again
        let (outcome, ..) = cycle(&mut control, 200, Some(Transmission::Data(203)));
        assert!(matches!(outcome, CycleOutcome::Charging { .. }));
        assert_eq!(control.threshold(), 7);

        let (outcome, ..) = cycle(&mut control, 200, Some(Transmission::Data(206)));
        assert!(matches!(outcome, CycleOutcome::Charging { .. }));

        // A link fault does not touch the threshold
        let (outcome, ..) = cycle(&mut control, 200, None);
        assert_eq!(outcome, CycleOutcome::LinkFault(ReceiveFault::NoTrigger));
        assert_eq!(control.threshold(), 7);
    }
}
