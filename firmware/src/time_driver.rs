//! Embassy time driver on the CH32V003 SysTick counter
//!
//! SysTick runs from HCLK/8 (1 MHz at the 8 MHz system clock) as a free
//! running 32-bit up-counter. `now()` extends it to 64 bits, which holds as
//! long as it is called at least once per wrap (about 71 minutes).
//! Only blocking delays are used, so alarms are not supported.

use embassy_time_driver::{AlarmHandle, Driver};
use portable_atomic::{AtomicU32, Ordering};

const STK_BASE: usize = 0xE000_F000;
const STK_CTLR: usize = 0x00;
const STK_CNTL: usize = 0x08;

/// STE: counter enable. STCLK left clear selects HCLK/8.
const STK_CTLR_STE: u32 = 1 << 0;

pub struct SysTickDriver {
    last: AtomicU32,
    wraps: AtomicU32,
}

impl SysTickDriver {
    const fn new() -> Self {
        Self {
            last: AtomicU32::new(0),
            wraps: AtomicU32::new(0),
        }
    }

    fn counter() -> u32 {
        unsafe { core::ptr::read_volatile((STK_BASE + STK_CNTL) as *const u32) }
    }
}

impl Driver for SysTickDriver {
    fn now(&self) -> u64 {
        critical_section::with(|_| {
            let count = Self::counter();
            let mut wraps = self.wraps.load(Ordering::Relaxed);
            if count < self.last.load(Ordering::Relaxed) {
                wraps = wraps.wrapping_add(1);
                self.wraps.store(wraps, Ordering::Relaxed);
            }
            self.last.store(count, Ordering::Relaxed);
            ((wraps as u64) << 32) | count as u64
        })
    }

    unsafe fn allocate_alarm(&self) -> Option<AlarmHandle> {
        None
    }

    fn set_alarm_callback(&self, _alarm: AlarmHandle, _callback: fn(*mut ()), _ctx: *mut ()) {}

    fn set_alarm(&self, _alarm: AlarmHandle, _timestamp: u64) -> bool {
        false
    }
}

embassy_time_driver::time_driver_impl!(static DRIVER: SysTickDriver = SysTickDriver::new());

/// Start the SysTick counter from zero
pub fn init() {
    unsafe {
        core::ptr::write_volatile((STK_BASE + STK_CNTL) as *mut u32, 0);
        core::ptr::write_volatile((STK_BASE + STK_CTLR) as *mut u32, STK_CTLR_STE);
    }
}

// Critical section implementation for single-core RISC-V
struct RiscvCriticalSection;
critical_section::set_impl!(RiscvCriticalSection);

unsafe impl critical_section::Impl for RiscvCriticalSection {
    unsafe fn acquire() -> critical_section::RawRestoreState {
        let mstatus = riscv::register::mstatus::read();
        riscv::register::mstatus::clear_mie();
        mstatus.mie() as u8
    }

    unsafe fn release(was_enabled: critical_section::RawRestoreState) {
        if was_enabled != 0 {
            riscv::register::mstatus::set_mie();
        }
    }
}
