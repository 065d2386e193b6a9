//! HAL layer tests with mock implementations

use crate::hal::mock::*;
use crate::hal::*;
use crate::types::*;
use embedded_hal::delay::DelayNs;

#[test]
fn test_mock_analog_replays_results() {
    let mut adc = MockAnalog::new(&[10, 20]);

    for expected in [10, 20, 20] {
        adc.start_conversion().unwrap();
        assert!(!adc.is_converting().unwrap());
        assert_eq!(adc.read_result().unwrap(), expected);
    }
    assert_eq!(adc.conversions(), 3);
}

#[test]
fn test_mock_analog_protocol_errors() {
    let mut adc = MockAnalog::new(&[10]);

    // Reading without a conversion
    assert_eq!(adc.read_result(), Err(HalError::NotInitialized));

    // Starting twice
    adc.start_conversion().unwrap();
    assert_eq!(adc.start_conversion(), Err(HalError::AdcError));
}

#[test]
fn test_mock_analog_busy_polls() {
    let mut adc = MockAnalog::new(&[10]).with_busy_polls(2);
    adc.start_conversion().unwrap();
    assert!(adc.is_converting().unwrap());
    assert!(adc.is_converting().unwrap());
    assert!(!adc.is_converting().unwrap());
}

#[test]
fn test_indicator_toggle_default() {
    let mut led = MockIndicator::new();
    assert!(!led.get_state().unwrap());

    led.toggle().unwrap();
    assert!(led.is_lit());
    led.toggle().unwrap();
    assert!(!led.is_lit());
    assert_eq!(led.history(), &[true, false]);
}

#[test]
fn test_mock_remote_switching() {
    let mut remote = MockRemote::new();
    remote.enable().unwrap();
    remote.enable().unwrap();
    assert!(remote.is_enabled());
    remote.disable().unwrap();
    assert!(!remote.is_enabled());
    assert_eq!(remote.enable_count(), 2);
}

#[test]
fn test_mock_delay_accumulates() {
    let mut delay = MockDelay::new();
    delay.delay_us(250);
    delay.delay_ms(3);
    assert_eq!(delay.total(), Duration::from_micros(3_250));
}

#[test]
fn test_mock_receiver_tracks_configuration() {
    let mut hw = MockReceiver::new();
    assert_eq!(hw.line_level(), LineLevel::High);

    hw.arm_edge(EdgeTrigger::Falling);
    hw.start_session_timer(Duration::from_millis(500));
    assert_eq!(hw.edge, Some(EdgeTrigger::Falling));
    assert_eq!(hw.session_timer, Some(Duration::from_millis(500)));

    hw.disarm_edge();
    hw.stop_session_timer();
    assert_eq!(hw.edge, None);
    assert_eq!(hw.session_timer, None);
}

#[test]
fn test_yield_through_reference() {
    fn spin<Y: Yield>(mut hook: Y, times: usize) {
        for _ in 0..times {
            hook.yield_now();
        }
    }

    let mut counter = CountingYield::default();
    spin(&mut counter, 3);
    spin(&mut counter, 2);
    assert_eq!(counter.count, 5);
}

#[test]
fn test_duration_arithmetic() {
    let bit = Duration::from_micros(250);
    assert_eq!(bit * 4, Duration::from_millis(1));
    assert_eq!(Duration::from_secs(1) / 4, Duration::from_micros(250_000));
    assert_eq!((bit + bit).as_micros(), 500);
}
