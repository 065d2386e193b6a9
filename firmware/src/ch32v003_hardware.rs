//! CH32V003 specific hardware implementations
//!
//! Register-level implementations of the shuffler HAL traits.
//!
//! Pin assignments:
//! - PD4 = shared data line (EXTI4; input with pull-up on the master, open-drain output on the client)
//! - PD6 = status LED (active high)
//! - PA1 = cell voltage divider (ADC channel 1)
//! - PC4 = client supply switch on the master (open-drain, low = on)
//!
//! Timers run from the 8 MHz HCLK with a /256 prescaler (32 us ticks):
//! TIM2 is the one-shot session timer, TIM1 the periodic idle window.

use core::convert::Infallible;

use embedded_hal::digital::{ErrorType, OutputPin};
use shuffler_core::hal::{AnalogInput, Duration, HalError, PowerControl, ReceiverControl, RemoteSupply, StatusIndicator};
use shuffler_core::{EdgeTrigger, LineLevel};

// Base addresses
const RCC_BASE: usize = 0x4002_1000;
const GPIOA_BASE: usize = 0x4001_0800;
const GPIOC_BASE: usize = 0x4001_1000;
const GPIOD_BASE: usize = 0x4001_1400;
const AFIO_BASE: usize = 0x4001_0000;
const EXTI_BASE: usize = 0x4001_0400;
const ADC1_BASE: usize = 0x4001_2400;
const TIM1_BASE: usize = 0x4001_2C00;
const TIM2_BASE: usize = 0x4000_0000;
const IWDG_BASE: usize = 0x4000_3000;
const PWR_BASE: usize = 0x4000_7000;
const PFIC_BASE: usize = 0xE000_E000;

// RCC
const RCC_CFGR0: usize = 0x04;
const RCC_APB2PCENR: usize = 0x18;
const RCC_APB1PCENR: usize = 0x1C;
const RCC_RSTSCKR: usize = 0x24;
const APB2_AFIO: u32 = 1 << 0;
const APB2_IOPA: u32 = 1 << 2;
const APB2_IOPC: u32 = 1 << 4;
const APB2_IOPD: u32 = 1 << 5;
const APB2_ADC1: u32 = 1 << 9;
const APB2_TIM1: u32 = 1 << 11;
const APB1_TIM2: u32 = 1 << 0;
const APB1_PWR: u32 = 1 << 28;
/// HPRE = /3: 24 MHz HSI down to 8 MHz
const CFGR0_HPRE_DIV3: u32 = 0b0010 << 4;
const CFGR0_HPRE_MASK: u32 = 0b1111 << 4;
const RSTSCKR_LSION: u32 = 1 << 0;
const RSTSCKR_LSIRDY: u32 = 1 << 1;

// GPIO
const GPIO_CFGLR: usize = 0x00;
const GPIO_INDR: usize = 0x08;
const GPIO_OUTDR: usize = 0x0C;
const GPIO_BSHR: usize = 0x10;
const PIN_INPUT_PULL: u32 = 0x8;
const PIN_OUTPUT_PP: u32 = 0x1;
const PIN_OUTPUT_OD: u32 = 0x5;
const PIN_ANALOG: u32 = 0x0;

const LINE_PIN: u8 = 4; // PD4
const LED_PIN: u8 = 6; // PD6
const SWITCH_PIN: u8 = 4; // PC4
const SENSE_PIN: u8 = 1; // PA1
const SENSE_CHANNEL: u32 = 1;

// AFIO / EXTI
const AFIO_EXTICR: usize = 0x08;
const EXTI_INTENR: usize = 0x00;
const EXTI_RTENR: usize = 0x08;
const EXTI_FTENR: usize = 0x0C;
const EXTI_SWIEVR: usize = 0x10;
const EXTI_INTFR: usize = 0x14;
const LINE_EXTI: u32 = 1 << LINE_PIN;
const AWU_EXTI: u32 = 1 << 9;

// ADC
const ADC_STATR: usize = 0x00;
const ADC_CTLR2: usize = 0x08;
const ADC_SAMPTR2: usize = 0x10;
const ADC_RSQR3: usize = 0x34;
const ADC_RDATAR: usize = 0x4C;
const ADC_STATR_EOC: u32 = 1 << 1;
const ADC_CTLR2_ADON: u32 = 1 << 0;
const ADC_CTLR2_EXTSEL_SW: u32 = 0b111 << 17;
const ADC_CTLR2_EXTTRIG: u32 = 1 << 20;
const ADC_CTLR2_SWSTART: u32 = 1 << 22;

// Timers
const TIM_CTLR1: usize = 0x00;
const TIM_DMAINTENR: usize = 0x0C;
const TIM_INTFR: usize = 0x10;
const TIM_SWEVGR: usize = 0x14;
const TIM_CNT: usize = 0x24;
const TIM_PSC: usize = 0x28;
const TIM_ATRLR: usize = 0x2C;
const TIM_CTLR1_CEN: u32 = 1 << 0;
const TIM_CTLR1_URS: u32 = 1 << 2;
const TIM_CTLR1_OPM: u32 = 1 << 3;
const TIM_UIE: u32 = 1 << 0;
const TIM_UIF: u32 = 1 << 0;
const TIM_UG: u32 = 1 << 0;
const TIMER_PRESCALER: u32 = 255;
const TIMER_TICK_US: u64 = 32;

// IWDG
const IWDG_CTLR: usize = 0x00;
const IWDG_PSCR: usize = 0x04;
const IWDG_RLDR: usize = 0x08;
const IWDG_KEY_RELOAD: u32 = 0xAAAA;
const IWDG_KEY_UNLOCK: u32 = 0x5555;
const IWDG_KEY_START: u32 = 0xCCCC;

// PWR / auto-wakeup
const PWR_CTLR: usize = 0x00;
const PWR_AWUCSR: usize = 0x08;
const PWR_AWUWR: usize = 0x0C;
const PWR_AWUPSC: usize = 0x10;
const PWR_CTLR_PDDS: u32 = 1 << 1;
const PWR_AWUCSR_AWUEN: u32 = 1 << 1;
/// LSI / 61440, about 0.48 s per count
const AWUPSC_DIV61440: u32 = 0b1111;
const PFIC_SCTLR: usize = 0xD10;
const SCTLR_SLEEPDEEP: u32 = 1 << 2;

// Interrupt numbers
pub const IRQ_EXTI7_0: u8 = 20;
pub const IRQ_AWU: u8 = 21;
pub const IRQ_TIM1_UP: u8 = 35;
pub const IRQ_TIM2: u8 = 38;

#[inline(always)]
fn read_reg(addr: usize) -> u32 {
    unsafe { core::ptr::read_volatile(addr as *const u32) }
}

#[inline(always)]
fn write_reg(addr: usize, value: u32) {
    unsafe { core::ptr::write_volatile(addr as *mut u32, value) }
}

#[inline(always)]
fn modify_reg(addr: usize, f: impl FnOnce(u32) -> u32) {
    write_reg(addr, f(read_reg(addr)));
}

fn configure_pin(port: usize, pin: u8, mode: u32) {
    let shift = pin as u32 * 4;
    modify_reg(port + GPIO_CFGLR, |v| (v & !(0xF << shift)) | (mode << shift));
}

fn set_pin(port: usize, pin: u8, high: bool) {
    let bit = if high { 1 << pin } else { 1 << (pin + 16) };
    write_reg(port + GPIO_BSHR, bit);
}

fn pin_output(port: usize, pin: u8) -> bool {
    read_reg(port + GPIO_OUTDR) & (1 << pin) != 0
}

fn pin_input(port: usize, pin: u8) -> bool {
    read_reg(port + GPIO_INDR) & (1 << pin) != 0
}

/// Enable an interrupt in the PFIC
pub fn enable_irq(irq: u8) {
    let reg = PFIC_BASE + 0x100 + (irq as usize / 32) * 4;
    write_reg(reg, 1 << (irq % 32));
}

fn duration_to_ticks(duration: Duration) -> u32 {
    let ticks = duration.as_micros().div_ceil(TIMER_TICK_US);
    ticks.clamp(1, 0x1_0000) as u32
}

/// Watchdog timeout selection
#[derive(Copy, Clone, Debug)]
pub enum WatchdogTimeout {
    /// LSI/256, 4096 counts: about 8.2 s
    Long,
    /// LSI/128, 4000 counts: about 4 s
    Short,
}

/// Common clock, LED, ADC, watchdog and wakeup setup
fn init_common(watchdog: WatchdogTimeout, awu_window: u32) {
    modify_reg(RCC_BASE + RCC_CFGR0, |v| (v & !CFGR0_HPRE_MASK) | CFGR0_HPRE_DIV3);
    modify_reg(RCC_BASE + RCC_APB2PCENR, |v| {
        v | APB2_AFIO | APB2_IOPA | APB2_IOPC | APB2_IOPD | APB2_ADC1 | APB2_TIM1
    });
    modify_reg(RCC_BASE + RCC_APB1PCENR, |v| v | APB1_TIM2 | APB1_PWR);

    configure_pin(GPIOD_BASE, LED_PIN, PIN_OUTPUT_PP);
    set_pin(GPIOD_BASE, LED_PIN, false);
    configure_pin(GPIOA_BASE, SENSE_PIN, PIN_ANALOG);

    // Single conversion of channel 1, longest sample time, software trigger
    modify_reg(ADC1_BASE + ADC_SAMPTR2, |v| v | (0b111 << (SENSE_CHANNEL * 3)));
    write_reg(ADC1_BASE + ADC_RSQR3, SENSE_CHANNEL);
    write_reg(ADC1_BASE + ADC_CTLR2, ADC_CTLR2_ADON | ADC_CTLR2_EXTSEL_SW | ADC_CTLR2_EXTTRIG);

    // LSI feeds both the watchdog and the auto-wakeup counter
    modify_reg(RCC_BASE + RCC_RSTSCKR, |v| v | RSTSCKR_LSION);
    while read_reg(RCC_BASE + RCC_RSTSCKR) & RSTSCKR_LSIRDY == 0 {}

    let (prescaler, reload) = match watchdog {
        WatchdogTimeout::Long => (0b110, 4095),
        WatchdogTimeout::Short => (0b101, 4000),
    };
    write_reg(IWDG_BASE + IWDG_CTLR, IWDG_KEY_UNLOCK);
    write_reg(IWDG_BASE + IWDG_PSCR, prescaler);
    write_reg(IWDG_BASE + IWDG_RLDR, reload);
    write_reg(IWDG_BASE + IWDG_CTLR, IWDG_KEY_RELOAD);
    write_reg(IWDG_BASE + IWDG_CTLR, IWDG_KEY_START);

    // Auto-wakeup through EXTI line 9
    write_reg(PWR_BASE + PWR_AWUPSC, AWUPSC_DIV61440);
    write_reg(PWR_BASE + PWR_AWUWR, awu_window & 0x3F);
    modify_reg(PWR_BASE + PWR_AWUCSR, |v| v | PWR_AWUCSR_AWUEN);
    modify_reg(EXTI_BASE + EXTI_RTENR, |v| v | AWU_EXTI);
    modify_reg(EXTI_BASE + EXTI_INTENR, |v| v | AWU_EXTI);
    enable_irq(IRQ_AWU);

    crate::time_driver::init();
}

/// Master node setup. The AWU period (about 7.7 s) stays below the 8.2 s
/// watchdog so every halt is acknowledged in time.
pub fn init_master() {
    init_common(WatchdogTimeout::Long, 15);

    configure_pin(GPIOC_BASE, SWITCH_PIN, PIN_OUTPUT_OD);
    set_pin(GPIOC_BASE, SWITCH_PIN, true);

    configure_pin(GPIOD_BASE, LINE_PIN, PIN_INPUT_PULL);
    set_pin(GPIOD_BASE, LINE_PIN, true);
    // EXTI4 from port D
    modify_reg(AFIO_BASE + AFIO_EXTICR, |v| (v & !(0b11 << 8)) | (0b11 << 8));
    modify_reg(EXTI_BASE + EXTI_FTENR, |v| v | LINE_EXTI);

    for base in [TIM1_BASE, TIM2_BASE] {
        write_reg(base + TIM_PSC, TIMER_PRESCALER);
        write_reg(base + TIM_CTLR1, TIM_CTLR1_URS);
        write_reg(base + TIM_DMAINTENR, TIM_UIE);
    }

    enable_irq(IRQ_EXTI7_0);
    enable_irq(IRQ_TIM1_UP);
    enable_irq(IRQ_TIM2);
}

/// Client node setup. The client halts about 1.9 s, well inside its 4 s watchdog.
pub fn init_client() {
    init_common(WatchdogTimeout::Short, 3);

    configure_pin(GPIOD_BASE, LINE_PIN, PIN_OUTPUT_OD);
    set_pin(GPIOD_BASE, LINE_PIN, true);
}

/// Clear the pending flag of the line interrupt
pub fn clear_line_interrupt() {
    write_reg(EXTI_BASE + EXTI_INTFR, LINE_EXTI);
}

/// Clear the pending flag of the auto-wakeup interrupt
pub fn clear_wakeup_interrupt() {
    write_reg(EXTI_BASE + EXTI_INTFR, AWU_EXTI);
}

/// Clear the update flag of the session timer
pub fn clear_session_timer_interrupt() {
    write_reg(TIM2_BASE + TIM_INTFR, !TIM_UIF);
}

/// Clear the update flag of the idle window timer
pub fn clear_idle_window_interrupt() {
    write_reg(TIM1_BASE + TIM_INTFR, !TIM_UIF);
}

/// Status LED on PD6
#[derive(Copy, Clone, Debug, Default)]
pub struct StatusLed;

impl StatusIndicator for StatusLed {
    type Error = HalError;

    fn set_state(&mut self, on: bool) -> Result<(), Self::Error> {
        set_pin(GPIOD_BASE, LED_PIN, on);
        Ok(())
    }

    fn get_state(&self) -> Result<bool, Self::Error> {
        Ok(pin_output(GPIOD_BASE, LED_PIN))
    }
}

/// ADC channel 1 on PA1, scaled from 10 bits to the 8-bit calibration scale
#[derive(Copy, Clone, Debug, Default)]
pub struct CellSense;

impl AnalogInput for CellSense {
    type Error = HalError;

    fn start_conversion(&mut self) -> Result<(), Self::Error> {
        if read_reg(ADC1_BASE + ADC_CTLR2) & ADC_CTLR2_ADON == 0 {
            return Err(HalError::NotInitialized);
        }
        modify_reg(ADC1_BASE + ADC_CTLR2, |v| v | ADC_CTLR2_SWSTART);
        Ok(())
    }

    fn is_converting(&mut self) -> Result<bool, Self::Error> {
        Ok(read_reg(ADC1_BASE + ADC_STATR) & ADC_STATR_EOC == 0)
    }

    fn read_result(&mut self) -> Result<u16, Self::Error> {
        // Reading RDATAR clears EOC
        let raw = read_reg(ADC1_BASE + ADC_RDATAR) & 0x3FF;
        Ok((raw >> 2) as u16)
    }
}

/// Client supply switch on PC4
#[derive(Copy, Clone, Debug, Default)]
pub struct ClientSwitch;

impl RemoteSupply for ClientSwitch {
    type Error = HalError;

    fn enable(&mut self) -> Result<(), Self::Error> {
        set_pin(GPIOC_BASE, SWITCH_PIN, false);
        Ok(())
    }

    fn disable(&mut self) -> Result<(), Self::Error> {
        set_pin(GPIOC_BASE, SWITCH_PIN, true);
        Ok(())
    }
}

/// Master-side data line interrupt and session timers
#[derive(Copy, Clone, Debug, Default)]
pub struct LineReceiver;

impl LineReceiver {
    fn start_timer(base: usize, duration: Duration, one_shot: bool) {
        let mut ctlr = TIM_CTLR1_URS;
        if one_shot {
            ctlr |= TIM_CTLR1_OPM;
        }
        write_reg(base + TIM_CTLR1, ctlr);
        write_reg(base + TIM_ATRLR, duration_to_ticks(duration) - 1);
        write_reg(base + TIM_CNT, 0);
        // Load the prescaler without raising an update interrupt
        write_reg(base + TIM_SWEVGR, TIM_UG);
        write_reg(base + TIM_INTFR, !TIM_UIF);
        write_reg(base + TIM_CTLR1, ctlr | TIM_CTLR1_CEN);
    }

    fn stop_timer(base: usize) {
        modify_reg(base + TIM_CTLR1, |v| v & !TIM_CTLR1_CEN);
        write_reg(base + TIM_INTFR, !TIM_UIF);
    }
}

impl ReceiverControl for LineReceiver {
    fn line_level(&mut self) -> LineLevel {
        LineLevel::from_high(pin_input(GPIOD_BASE, LINE_PIN))
    }

    fn arm_edge(&mut self, trigger: EdgeTrigger) {
        clear_line_interrupt();
        modify_reg(EXTI_BASE + EXTI_INTENR, |v| v | LINE_EXTI);
        // EXTI only detects edges: a line already low fires through a software event
        if trigger == EdgeTrigger::LowLevel && !pin_input(GPIOD_BASE, LINE_PIN) {
            write_reg(EXTI_BASE + EXTI_SWIEVR, LINE_EXTI);
        }
    }

    fn disarm_edge(&mut self) {
        modify_reg(EXTI_BASE + EXTI_INTENR, |v| v & !LINE_EXTI);
        clear_line_interrupt();
    }

    fn start_session_timer(&mut self, timeout: Duration) {
        Self::start_timer(TIM2_BASE, timeout, true);
    }

    fn stop_session_timer(&mut self) {
        Self::stop_timer(TIM2_BASE);
    }

    fn start_idle_window(&mut self, window: Duration) {
        Self::start_timer(TIM1_BASE, window, false);
    }

    fn stop_idle_window(&mut self) {
        Self::stop_timer(TIM1_BASE);
    }
}

/// Client-side data line driver
#[derive(Copy, Clone, Debug, Default)]
pub struct LineDriver;

impl ErrorType for LineDriver {
    type Error = Infallible;
}

impl OutputPin for LineDriver {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        set_pin(GPIOD_BASE, LINE_PIN, false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        set_pin(GPIOD_BASE, LINE_PIN, true);
        Ok(())
    }
}

/// Feed the independent watchdog
pub fn feed_watchdog() {
    write_reg(IWDG_BASE + IWDG_CTLR, IWDG_KEY_RELOAD);
}

/// Peripheral gating, watchdog and standby
#[derive(Copy, Clone, Debug, Default)]
pub struct PowerUnit;

impl PowerControl for PowerUnit {
    fn set_peripherals_powered(&mut self, powered: bool) {
        if powered {
            modify_reg(RCC_BASE + RCC_APB2PCENR, |v| v | APB2_ADC1 | APB2_TIM1);
            modify_reg(RCC_BASE + RCC_APB1PCENR, |v| v | APB1_TIM2);
            modify_reg(ADC1_BASE + ADC_CTLR2, |v| v | ADC_CTLR2_ADON);
        } else {
            modify_reg(ADC1_BASE + ADC_CTLR2, |v| v & !ADC_CTLR2_ADON);
            modify_reg(RCC_BASE + RCC_APB2PCENR, |v| v & !(APB2_ADC1 | APB2_TIM1));
            modify_reg(RCC_BASE + RCC_APB1PCENR, |v| v & !APB1_TIM2);
        }
    }

    fn acknowledge_watchdog(&mut self) {
        feed_watchdog();
    }

    fn halt_until_wake(&mut self) {
        // Standby keeps SRAM and resumes after wfi on the AWU interrupt
        modify_reg(PWR_BASE + PWR_CTLR, |v| v | PWR_CTLR_PDDS);
        modify_reg(PFIC_BASE + PFIC_SCTLR, |v| v | SCTLR_SLEEPDEEP);
        unsafe { riscv::asm::wfi() };
        modify_reg(PFIC_BASE + PFIC_SCTLR, |v| v & !SCTLR_SLEEPDEEP);
    }
}
