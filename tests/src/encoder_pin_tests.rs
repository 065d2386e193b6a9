//! Client encoder output checked pin transaction by pin transaction

#[cfg(test)]
mod tests {
    use embedded_hal_mock::eh1::delay::NoopDelay;
    use embedded_hal_mock::eh1::pin::{Mock as PinMock, State, Transaction};
    use rstest::rstest;
    use shuffler_core::hal::mock::{CountingYield, MockAnalog, MockDelay, MockIndicator};
    use shuffler_core::{LineEncoder, ProtocolTiming, Transmission, VoltageReading, VoltageSampler};

    fn expected_data(count: u16) -> Vec<Transaction> {
        let mut expected = vec![Transaction::set(State::Low), Transaction::set(State::High)];
        for _ in 0..count {
            expected.push(Transaction::set(State::Low));
            expected.push(Transaction::set(State::High));
        }
        expected
    }

    #[rstest]
    #[case(1)]
    #[case(2)]
    #[case(117)]
    #[case(237)]
    fn test_data_pin_sequence(#[case] reading: u16) {
        let encoder = LineEncoder::default();
        let mut line = PinMock::new(&expected_data(reading));

        let sent = encoder
            .transmit(VoltageReading::new(reading), &mut line, &mut NoopDelay::new())
            .unwrap();
        assert_eq!(sent, Transmission::Data(reading));
        line.done();
    }

    #[rstest]
    #[case(0)]
    #[case(238)]
    fn test_fault_pin_sequence(#[case] reading: u16) {
        let encoder = LineEncoder::default();
        let mut line = PinMock::new(&[Transaction::set(State::Low)]);

        let sent = encoder
            .transmit(VoltageReading::new(reading), &mut line, &mut NoopDelay::new())
            .unwrap();
        assert_eq!(sent, Transmission::ExplicitFault);
        line.done();
    }

    #[test]
    fn test_transmit_duration_matches_timing() {
        let timing = ProtocolTiming::DEFAULT;
        let encoder = LineEncoder::new(timing);
        let mut line = PinMock::new(&expected_data(10));
        let mut delay = MockDelay::new();

        encoder.transmit(VoltageReading::new(10), &mut line, &mut delay).unwrap();
        assert_eq!(delay.total(), timing.transmission_length(10));
        // trigger, first high, then two halves per tick
        assert_eq!(delay.calls(), 22);
        line.done();
    }

    #[test]
    fn test_report_averages_before_sending() {
        let encoder = LineEncoder::default();
        // (120 + 121 + 125) / 3 = 122
        let mut sampler = VoltageSampler::new(MockAnalog::new(&[120, 121, 125]));
        let mut line = PinMock::new(&expected_data(122));
        let mut led = MockIndicator::new();

        let sent = encoder
            .report(&mut sampler, &mut line, &mut led, &mut MockDelay::new(), &mut CountingYield::default())
            .unwrap();
        assert_eq!(sent, Transmission::Data(122));
        assert_eq!(led.history(), &[false, true, false]);
        line.done();
    }
}
