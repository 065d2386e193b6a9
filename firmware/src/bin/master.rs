#![no_std]
#![no_main]

// Logging support
#[cfg(feature = "defmt")]
use defmt::{info, warn};
#[cfg(feature = "defmt")]
use defmt_rtt as _;
use panic_halt as _;

// Define simple logging macros when defmt is not available
#[cfg(not(feature = "defmt"))]
macro_rules! info {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "defmt"))]
macro_rules! warn {
    ($($arg:tt)*) => {};
}

use riscv_rt::entry;
use shuffler_firmware::{
    clear_idle_window_interrupt, clear_line_interrupt, clear_session_timer_interrupt, clear_wakeup_interrupt,
    feed_watchdog, init_master, ActivityBlinker, CellSense, ClientSwitch, ControlLoop, Delay, LineDecoder,
    LineReceiver, MasterConfig, MasterPeripherals, PowerManager, PowerUnit, StatusLed, VoltageSampler,
};
use shuffler_firmware::hal::{RemoteSupply, StatusIndicator};

const CONFIG: MasterConfig = MasterConfig::DEFAULT;

/// Receive session shared with the interrupt handlers
static DECODER: LineDecoder = LineDecoder::new(CONFIG.timing);

#[entry]
fn main() -> ! {
    init_master();

    if CONFIG.validate().is_err() {
        // Solid LED, let the watchdog retry
        let _ = StatusLed.set_state(true);
        loop {}
    }

    info!("PowerShuffler master v{}", shuffler_firmware::VERSION);

    let power_manager = PowerManager::new(CONFIG.power, CONFIG.indicator.heartbeat_blip);
    let mut control = ControlLoop::new(CONFIG.control, CONFIG.indicator.brief_blink);
    let mut power = PowerUnit;
    let mut activity = ActivityBlinker::new(StatusLed, CONFIG.indicator.activity_toggle_every);
    let mut p = MasterPeripherals {
        sampler: VoltageSampler::new(CellSense),
        remote: ClientSwitch,
        receiver: LineReceiver,
        indicator: StatusLed,
        delay: Delay,
    };

    unsafe { riscv::interrupt::enable() };
    power_manager.settle(&mut power, &mut p.delay);

    loop {
        power_manager.begin_cycle(&mut power);

        match control.run_cycle(&DECODER, &mut p, &mut activity) {
            Ok(outcome) => {
                info!("cycle: {}", outcome);
                if !outcome.sleeps() {
                    continue;
                }
            }
            Err(_e) => {
                warn!("cycle failed: {}", _e);
                let _ = p.indicator.set_state(true);
                let _ = p.remote.disable();
            }
        }

        if power_manager.sleep(&mut power, &mut p.indicator, &mut p.delay).is_err() {
            let _ = p.indicator.set_state(true);
        }
    }
}

// ========================================
// Interrupt Handlers
// ========================================

/// Data line edge (EXTI4)
#[no_mangle]
extern "C" fn EXTI7_0_IRQHandler() {
    clear_line_interrupt();
    DECODER.on_edge(&mut LineReceiver);
}

/// Session timer expiry (verification or reading window)
#[no_mangle]
extern "C" fn TIM2_IRQHandler() {
    clear_session_timer_interrupt();
    DECODER.on_session_timer(&mut LineReceiver);
}

/// Idle supervisory window. A listen can span several windows, so the
/// watchdog is fed here as well.
#[no_mangle]
extern "C" fn TIM1_UP_IRQHandler() {
    clear_idle_window_interrupt();
    feed_watchdog();
    DECODER.on_idle_window(&mut LineReceiver);
}

/// Auto-wakeup from standby
#[no_mangle]
extern "C" fn AWU_IRQHandler() {
    clear_wakeup_interrupt();
}
