#![no_std]
#![no_main]

// Logging support
#[cfg(feature = "defmt")]
use defmt::{debug, info};
#[cfg(feature = "defmt")]
use defmt_rtt as _;
use panic_halt as _;

// Define simple logging macros when defmt is not available
#[cfg(not(feature = "defmt"))]
macro_rules! info {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "defmt"))]
macro_rules! debug {
    ($($arg:tt)*) => {};
}

use riscv_rt::entry;
use shuffler_firmware::hal::StatusIndicator;
use shuffler_firmware::{
    clear_wakeup_interrupt, init_client, ActivityBlinker, CellSense, ClientConfig, Delay, LineDriver, LineEncoder,
    PowerManager, PowerUnit, StatusLed, VoltageSampler,
};

const CONFIG: ClientConfig = ClientConfig::DEFAULT;

/// The client runs only while the master powers it. Each cycle reports
/// the cell voltage once and then sleeps until the master samples again.
#[entry]
fn main() -> ! {
    init_client();

    if CONFIG.validate().is_err() {
        let _ = StatusLed.set_state(true);
        loop {}
    }

    info!("PowerShuffler client v{}", shuffler_firmware::VERSION);

    let encoder = LineEncoder::from_config(&CONFIG);
    let power_manager = PowerManager::new(CONFIG.power, CONFIG.indicator.heartbeat_blip);
    let mut power = PowerUnit;
    let mut sampler = VoltageSampler::new(CellSense);
    let mut line = LineDriver;
    let mut led = StatusLed;
    let mut delay = Delay;
    let mut activity = ActivityBlinker::new(StatusLed, CONFIG.indicator.activity_toggle_every);

    unsafe { riscv::interrupt::enable() };
    power_manager.settle(&mut power, &mut delay);

    loop {
        power_manager.begin_cycle(&mut power);

        match encoder.report(&mut sampler, &mut line, &mut led, &mut delay, &mut activity) {
            Ok(_sent) => debug!("sent {}", _sent),
            Err(_) => {
                let _ = led.set_state(true);
            }
        }

        if power_manager.sleep(&mut power, &mut led, &mut delay).is_err() {
            let _ = led.set_state(true);
        }
    }
}

/// Auto-wakeup from standby
#[no_mangle]
extern "C" fn AWU_IRQHandler() {
    clear_wakeup_interrupt();
}
