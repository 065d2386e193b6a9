//! End-to-end line protocol tests: encoder output replayed into the decoder

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rstest::rstest;
    use shuffler_core::test_utils::line_sim::LineSimulator;
    use shuffler_core::{
        Duration, LineDecoder, LineEncoder, LineLevel, ProtocolTiming, ReceiveFault, SessionOutcome, SessionState,
        Transmission, VoltageReading,
    };

    fn link() -> (LineEncoder, LineDecoder, LineSimulator) {
        let timing = ProtocolTiming::DEFAULT;
        (LineEncoder::new(timing), LineDecoder::new(timing), LineSimulator::new())
    }

    fn send(encoder: &LineEncoder, sim: &LineSimulator, offset: Duration, reading: u16) -> Transmission {
        let transmission = encoder.encode(VoltageReading::new(reading));
        sim.schedule(offset, &transmission, encoder.timing());
        transmission
    }

    proptest! {
        #[test]
        fn prop_every_valid_reading_round_trips(reading in 1u16..=237, start_ms in 0u64..2_000) {
            let (encoder, decoder, sim) = link();
            let sent = send(&encoder, &sim, Duration::from_millis(start_ms), reading);

            prop_assert_eq!(sent, Transmission::Data(reading));
            prop_assert_eq!(sim.run_session(&decoder), SessionOutcome::Received(reading));
            prop_assert_eq!(decoder.state(), SessionState::Complete);
        }

        #[test]
        fn prop_out_of_range_is_explicit_fault(reading in 238u16..=u16::MAX) {
            let (encoder, _, _) = link();
            prop_assert_eq!(encoder.encode(VoltageReading::new(reading)), Transmission::ExplicitFault);
        }
    }

    #[rstest]
    #[case::zero(0)]
    #[case::just_over_max(238)]
    #[case::full_scale(255)]
    fn test_sensor_fault_reaches_error(#[case] reading: u16) {
        let (encoder, decoder, sim) = link();
        let timing = *encoder.timing();

        let sent = send(&encoder, &sim, Duration::from_millis(1), reading);
        assert_eq!(sent, Transmission::ExplicitFault);

        assert_eq!(sim.run_session(&decoder), SessionOutcome::Failed(ReceiveFault::LineHeldLow));
        assert_eq!(decoder.edge_count(), 0);
        // trigger at 1 ms, verified, then the full reading window
        assert_eq!(
            sim.now(),
            Duration::from_millis(1) + timing.verify_window + timing.reading_timeout
        );
    }

    #[rstest]
    #[case::one_tick(Duration::from_micros(32))]
    #[case::just_short(Duration::from_micros(120))]
    fn test_short_glitch_never_reaches_reading(#[case] width: Duration) {
        let (encoder, decoder, sim) = link();
        let timing = *encoder.timing();
        assert!(width < timing.verify_window);

        sim.pulse_low(Duration::from_millis(1), width);
        send(&encoder, &sim, Duration::from_millis(10), 150);

        assert_eq!(sim.run_session(&decoder), SessionOutcome::Received(150));
    }

    #[test]
    fn test_glitch_resets_idle_supervision() {
        let (encoder, decoder, sim) = link();
        let timing = *encoder.timing();
        let glitch_at = timing.idle_window * 3 + Duration::from_millis(1);

        sim.pulse_low(glitch_at, Duration::from_micros(50));

        assert_eq!(sim.run_session(&decoder), SessionOutcome::Failed(ReceiveFault::NoTrigger));
        // Six fresh windows counted from the glitch
        assert_eq!(sim.now(), glitch_at + timing.verify_window + timing.idle_window * 6);
    }

    #[test]
    fn test_no_trigger_times_out_with_zero_edges() {
        let (encoder, decoder, sim) = link();
        let timing = *encoder.timing();

        assert_eq!(sim.run_session(&decoder), SessionOutcome::Failed(ReceiveFault::NoTrigger));
        assert_eq!(decoder.edge_count(), 0);
        assert_eq!(decoder.idle_windows(), 0);
        assert_eq!(sim.now(), timing.idle_window * 6);
    }

    #[test]
    fn test_trigger_in_last_idle_window_is_accepted() {
        let (encoder, decoder, sim) = link();
        let timing = *encoder.timing();

        send(&encoder, &sim, timing.idle_window * 5 + Duration::from_millis(100), 42);
        assert_eq!(sim.run_session(&decoder), SessionOutcome::Received(42));
    }

    #[test]
    fn test_line_low_at_arm_is_verified_as_trigger() {
        let (encoder, decoder, sim) = link();

        // Fault hold begins with the first session and outlasts it
        send(&encoder, &sim, Duration::from_millis(0), 0);
        assert_eq!(sim.run_session(&decoder), SessionOutcome::Failed(ReceiveFault::LineHeldLow));
        assert_eq!(sim.level(), LineLevel::Low);

        // No falling edge left to see: the level trigger alone starts verification
        let started = sim.now();
        assert_eq!(sim.run_session(&decoder), SessionOutcome::Failed(ReceiveFault::LineHeldLow));
        assert_eq!(sim.edges_delivered(), 0);
        assert_eq!(decoder.edge_count(), 0);
        let timing = *encoder.timing();
        assert_eq!(sim.now(), started + timing.verify_window + timing.reading_timeout);
    }

    #[test]
    fn test_sessions_are_independent() {
        let (encoder, decoder, sim) = link();

        send(&encoder, &sim, Duration::from_millis(1), 0);
        assert_eq!(sim.run_session(&decoder), SessionOutcome::Failed(ReceiveFault::LineHeldLow));

        // Sender recovers and releases the line
        sim.pulse_low(Duration::from_millis(0), Duration::from_micros(1));

        let mut results = Vec::new();
        for _ in 0..3 {
            send(&encoder, &sim, Duration::from_millis(5), 199);
            results.push(sim.run_session(&decoder));
        }
        assert_eq!(results, vec![SessionOutcome::Received(199); 3]);
    }
}
