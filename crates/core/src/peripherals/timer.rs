//! 8-bit Timer/Counter n.
//!
//! Registers TCCRnA, TCCRnB, TCNTn, OCRnA, OCRnB, TIMSKn and TIFRn are
//! registered by name. The overflow and compare-match flags live in the
//! chip's interrupt lines (vectors `TIMERn_OVF`, `TIMERn_COMPA`,
//! `TIMERn_COMPB`), so TIFRn reads them back from there and a write of 1
//! clears them; TIMSKn drives the enables.
//!
//! | WGM | Mode          | TOP  | TOV set at |
//! |-----|---------------|------|------------|
//! | 0   | Normal        | 0xFF | MAX        |
//! | 1   | Phase correct | 0xFF | BOTTOM     |
//! | 2   | CTC           | OCRA | MAX        |
//! | 3   | Fast PWM      | 0xFF | TOP        |
//! | 5   | Phase correct | OCRA | BOTTOM     |
//! | 7   | Fast PWM      | OCRA | TOP        |
//!
//! Modes 4 and 6 are reserved and count as Normal. External clock sources
//! (CS = 6, 7) stop the timer.
//!
//! ## Output compare pins
//!
//! Each compare unit can drive a GPIO pin connected with
//! [`Timer::connect_output`]. COMnx in TCCRnA selects the action:
//!
//! | COM | Normal / CTC    | Fast PWM                      | Phase correct                        |
//! |-----|-----------------|-------------------------------|--------------------------------------|
//! | 0   | disconnected    | disconnected                  | disconnected                         |
//! | 1   | toggle on match | A: toggle if WGMn2, else off  | A: toggle if WGMn2, else off         |
//! | 2   | clear on match  | clear on match, set at BOTTOM | clear on match up, set on match down |
//! | 3   | set on match    | set on match, clear at BOTTOM | set on match up, clear on match down |
//!
//! While connected the unit overrides the pin's PORT bit; DDR still has to
//! select output. FOCnA/FOCnB in TCCRnB force a match action in the non-PWM
//! modes without raising the flag.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::debug;

use crate::clock::Process;
use crate::emulator::Emulator;
use crate::error::{Error, Result};
use crate::interrupt::Interrupts;
use crate::peripherals::Gpio;
use crate::port::Port;

const TOV: u8 = 0x01;
const OCFA: u8 = 0x02;
const OCFB: u8 = 0x04;
const WGM2: u8 = 0x08;
const FOCA: u8 = 0x80;
const FOCB: u8 = 0x40;

/// Output compare unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    A,
    B,
}

impl Channel {
    const BOTH: [Channel; 2] = [Channel::A, Channel::B];

    fn index(self) -> usize {
        self as usize
    }
}

struct OutputLink {
    gpio: Rc<RefCell<Gpio>>,
    pin: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Normal,
    PhaseCorrect,
    Ctc,
    FastPwm,
}

#[derive(Debug, Clone, Copy)]
struct Vectors {
    ovf: u8,
    compa: u8,
    compb: u8,
}

pub struct Timer {
    n: u8,
    irq: Interrupts,
    vectors: Vectors,
    tccr_a: u8,
    tccr_b: u8,
    tcnt: u8,
    ocr_a: u8,
    ocr_b: u8,
    timsk: u8,
    /// Counting down (phase correct only)
    down: bool,
    /// OCnA / OCnB output levels
    oc: [bool; 2],
    links: [Option<OutputLink>; 2],
    /// CPU ticks not yet worth one timer clock
    prescale_count: u64,
}

impl Timer {
    /// Create timer `n` and register its ports on `em`. Fails with
    /// [`Error::UnknownVector`] or [`Error::UnknownPort`] before registering
    /// anything when the chip lacks one of the names.
    pub fn attach(em: &mut Emulator, n: u8) -> Result<Rc<RefCell<Timer>>> {
        let chip = em.chip();
        let vector = |suffix: &str| {
            let name = format!("TIMER{}_{}", n, suffix);
            chip.vector(&name).ok_or_else(|| Error::UnknownVector { chip: chip.label.clone(), name })
        };
        let vectors = Vectors { ovf: vector("OVF")?, compa: vector("COMPA")?, compb: vector("COMPB")? };

        let regs = [
            (format!("TCCR{}A", n), TimerRegister::TccrA),
            (format!("TCCR{}B", n), TimerRegister::TccrB),
            (format!("TCNT{}", n), TimerRegister::Tcnt),
            (format!("OCR{}A", n), TimerRegister::OcrA),
            (format!("OCR{}B", n), TimerRegister::OcrB),
            (format!("TIMSK{}", n), TimerRegister::Timsk),
            (format!("TIFR{}", n), TimerRegister::Tifr),
        ];
        for (name, _) in &regs {
            em.port_ref(name)?;
        }

        let timer = Rc::new(RefCell::new(Timer::new(n, em.interrupts().clone(), vectors)));
        for (name, reg) in regs {
            em.register_port_by_name(&name, TimerPort { timer: timer.clone(), reg })?;
        }
        debug!(timer = n, ovf = vectors.ovf, compa = vectors.compa, compb = vectors.compb, "timer attached");
        Ok(timer)
    }

    fn new(n: u8, irq: Interrupts, vectors: Vectors) -> Self {
        Timer {
            n,
            irq,
            vectors,
            tccr_a: 0,
            tccr_b: 0,
            tcnt: 0,
            ocr_a: 0,
            ocr_b: 0,
            timsk: 0,
            down: false,
            oc: [false; 2],
            links: [None, None],
            prescale_count: 0,
        }
    }

    pub fn number(&self) -> u8 {
        self.n
    }

    pub fn count(&self) -> u8 {
        self.tcnt
    }

    /// Current level of the OCnx output.
    pub fn output(&self, ch: Channel) -> bool {
        self.oc[ch.index()]
    }

    /// Drive `pin` of `gpio` from compare unit `ch` whenever COMnx connects
    /// it.
    pub fn connect_output(&mut self, ch: Channel, gpio: Rc<RefCell<Gpio>>, pin: u8) {
        self.links[ch.index()] = Some(OutputLink { gpio, pin });
        self.sync_output(ch);
    }

    /// CPU clocks per timer clock, 0 when stopped.
    pub fn prescale(&self) -> u64 {
        match self.tccr_b & 7 {
            1 => 1,
            2 => 8,
            3 => 64,
            4 => 256,
            5 => 1024,
            _ => 0, // stopped or external clock
        }
    }

    fn wgm(&self) -> u8 {
        (self.tccr_a & 3) | ((self.tccr_b >> 1) & 4)
    }

    fn mode(&self) -> Mode {
        match self.wgm() {
            1 | 5 => Mode::PhaseCorrect,
            2 => Mode::Ctc,
            3 | 7 => Mode::FastPwm,
            _ => Mode::Normal,
        }
    }

    fn top(&self) -> u8 {
        match self.wgm() {
            2 | 5 | 7 => self.ocr_a,
            _ => 0xFF,
        }
    }

    fn flags(&self) -> u8 {
        let mut f = 0;
        if self.irq.is_raised(self.vectors.ovf) { f |= TOV; }
        if self.irq.is_raised(self.vectors.compa) { f |= OCFA; }
        if self.irq.is_raised(self.vectors.compb) { f |= OCFB; }
        f
    }

    fn clear_flags(&self, mask: u8) {
        if mask & TOV != 0 { self.irq.clear(self.vectors.ovf); }
        if mask & OCFA != 0 { self.irq.clear(self.vectors.compa); }
        if mask & OCFB != 0 { self.irq.clear(self.vectors.compb); }
    }

    fn set_timsk(&mut self, v: u8) {
        self.timsk = v & 7;
        self.irq.set_enabled(self.vectors.ovf, v & TOV != 0);
        self.irq.set_enabled(self.vectors.compa, v & OCFA != 0);
        self.irq.set_enabled(self.vectors.compb, v & OCFB != 0);
    }

    fn com(&self, ch: Channel) -> u8 {
        (self.tccr_a >> (6 - 2 * ch.index())) & 3
    }

    /// Toggle-on-match in the PWM modes exists only for unit A with WGMn2.
    fn pwm_toggle(&self, ch: Channel) -> bool {
        ch == Channel::A && self.tccr_b & WGM2 != 0
    }

    fn connected(&self, ch: Channel) -> bool {
        match (self.com(ch), self.mode()) {
            (0, _) => false,
            (1, Mode::FastPwm | Mode::PhaseCorrect) => self.pwm_toggle(ch),
            _ => true,
        }
    }

    fn sync_output(&self, ch: Channel) {
        if let Some(link) = &self.links[ch.index()] {
            let level = self.connected(ch).then_some(self.oc[ch.index()]);
            link.gpio.borrow_mut().override_pin(link.pin, level);
        }
    }

    fn sync_outputs(&self) {
        for ch in Channel::BOTH {
            self.sync_output(ch);
        }
    }

    /// Apply the COMnx action for this timer clock.
    fn output_action(&mut self, ch: Channel, matched: bool, at_bottom: bool, counting_down: bool) {
        let level = self.oc[ch.index()];
        let next = match (self.mode(), self.com(ch)) {
            (_, 0) => return,
            (Mode::Normal | Mode::Ctc, com) if matched => match com {
                1 => !level,
                2 => false,
                _ => true,
            },
            (Mode::FastPwm | Mode::PhaseCorrect, 1) if matched && self.pwm_toggle(ch) => !level,
            (Mode::FastPwm, com @ 2..=3) => {
                let mut next = level;
                if at_bottom { next = com == 2; }
                if matched { next = com == 3; }
                next
            }
            (Mode::PhaseCorrect, com @ 2..=3) if matched => (com == 2) == counting_down,
            _ => return,
        };
        if next != level {
            self.oc[ch.index()] = next;
            self.sync_output(ch);
        }
    }

    fn compare(&mut self, at_bottom: bool, counting_down: bool) {
        for ch in Channel::BOTH {
            let (ocr, vector) = match ch {
                Channel::A => (self.ocr_a, self.vectors.compa),
                Channel::B => (self.ocr_b, self.vectors.compb),
            };
            let matched = self.tcnt == ocr;
            if matched {
                self.irq.raise(vector);
            }
            self.output_action(ch, matched, at_bottom, counting_down);
        }
    }

    fn write_tccr_a(&mut self, v: u8) {
        self.tccr_a = v;
        self.sync_outputs();
    }

    fn write_tccr_b(&mut self, v: u8) {
        // FOC bits are strobes and read back as zero
        self.tccr_b = v & 0x3F;
        self.sync_outputs();
        if matches!(self.mode(), Mode::Normal | Mode::Ctc) {
            if v & FOCA != 0 { self.output_action(Channel::A, true, false, false); }
            if v & FOCB != 0 { self.output_action(Channel::B, true, false, false); }
        }
    }

    /// Advance by one timer clock.
    fn clock_once(&mut self) {
        let top = self.top();
        let mut at_bottom = false;
        let mut counting_down = false;
        match self.mode() {
            Mode::PhaseCorrect => {
                counting_down = self.down || self.tcnt >= top;
                if counting_down {
                    self.tcnt = self.tcnt.min(top).saturating_sub(1);
                    self.down = self.tcnt != 0;
                    if !self.down {
                        self.irq.raise(self.vectors.ovf);
                    }
                } else {
                    self.tcnt += 1;
                }
            }
            mode => {
                if self.tcnt == top {
                    self.tcnt = 0;
                    at_bottom = true;
                    let at_max = top == 0xFF;
                    if mode == Mode::FastPwm || at_max {
                        self.irq.raise(self.vectors.ovf);
                    }
                } else {
                    self.tcnt = self.tcnt.wrapping_add(1);
                }
            }
        }
        self.compare(at_bottom, counting_down);
    }
}

impl Process for Timer {
    fn run(&mut self, ticks: u64) -> Result<()> {
        let prescale = self.prescale();
        if prescale == 0 {
            return Ok(());
        }
        let total = self.prescale_count + ticks;
        self.prescale_count = total % prescale;
        for _ in 0..total / prescale {
            self.clock_once();
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerRegister {
    TccrA,
    TccrB,
    Tcnt,
    OcrA,
    OcrB,
    Timsk,
    Tifr,
}

struct TimerPort {
    timer: Rc<RefCell<Timer>>,
    reg: TimerRegister,
}

impl Port for TimerPort {
    fn read(&mut self) -> u8 {
        let t = self.timer.borrow();
        match self.reg {
            TimerRegister::TccrA => t.tccr_a,
            TimerRegister::TccrB => t.tccr_b,
            TimerRegister::Tcnt => t.tcnt,
            TimerRegister::OcrA => t.ocr_a,
            TimerRegister::OcrB => t.ocr_b,
            TimerRegister::Timsk => t.timsk,
            TimerRegister::Tifr => t.flags(),
        }
    }

    fn write(&mut self, value: u8) {
        let mut t = self.timer.borrow_mut();
        match self.reg {
            TimerRegister::TccrA => t.write_tccr_a(value),
            TimerRegister::TccrB => t.write_tccr_b(value),
            TimerRegister::Tcnt => t.tcnt = value,
            TimerRegister::OcrA => t.ocr_a = value,
            TimerRegister::OcrB => t.ocr_b = value,
            TimerRegister::Timsk => t.set_timsk(value),
            TimerRegister::Tifr => t.clear_flags(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ChipConfig;

    // ATmega168 data addresses
    const TIFR0: u16 = 0x35;
    const TCCR0A: u16 = 0x44;
    const TCCR0B: u16 = 0x45;
    const TCNT0: u16 = 0x46;
    const OCR0A: u16 = 0x47;
    const OCR0B: u16 = 0x48;
    const TIMSK0: u16 = 0x6E;

    fn setup() -> (Emulator, Rc<RefCell<Timer>>) {
        let mut em = Emulator::new(ChipConfig::atmega168()).unwrap();
        let timer = Timer::attach(&mut em, 0).unwrap();
        (em, timer)
    }

    #[test]
    fn test_normal_mode_overflow() {
        let (mut em, timer) = setup();
        em.store_byte(TCCR0B, 0x02); // clk/8
        timer.borrow_mut().run(8 * 255).unwrap();
        assert_eq!(em.load_byte(TCNT0), 0xFF);
        assert_eq!(em.load_byte(TIFR0) & TOV, 0);

        timer.borrow_mut().run(7).unwrap();
        assert_eq!(em.load_byte(TCNT0), 0xFF);
        timer.borrow_mut().run(1).unwrap();
        assert_eq!(em.load_byte(TCNT0), 0x00);
        assert_eq!(em.load_byte(TIFR0) & TOV, TOV);

        // Write 1 to clear
        em.store_byte(TIFR0, TOV);
        assert_eq!(em.load_byte(TIFR0) & TOV, 0);
    }

    #[test]
    fn test_ctc_mode() {
        let (mut em, timer) = setup();
        em.store_byte(OCR0A, 9);
        em.store_byte(TCCR0A, 0x02);
        em.store_byte(TCCR0B, 0x01);
        timer.borrow_mut().run(9).unwrap();
        assert_eq!(em.load_byte(TIFR0), OCFA);
        timer.borrow_mut().run(1).unwrap();
        assert_eq!(em.load_byte(TCNT0), 0);
        timer.borrow_mut().run(300).unwrap();
        // TOP below MAX: no overflow flag in CTC
        assert_eq!(em.load_byte(TIFR0) & TOV, 0);
    }

    #[test]
    fn test_fast_pwm_ocra_top() {
        let (mut em, timer) = setup();
        em.store_byte(OCR0A, 99);
        em.store_byte(OCR0B, 50);
        em.store_byte(TCCR0A, 0x03);
        em.store_byte(TCCR0B, 0x09); // WGM02, clk/1
        timer.borrow_mut().run(100).unwrap();
        assert_eq!(em.load_byte(TCNT0), 0);
        assert_eq!(em.load_byte(TIFR0), TOV | OCFA | OCFB);
    }

    #[test]
    fn test_phase_correct() {
        let (mut em, timer) = setup();
        em.store_byte(TCCR0A, 0x01);
        em.store_byte(TCCR0B, 0x01);
        timer.borrow_mut().run(255).unwrap();
        assert_eq!(em.load_byte(TCNT0), 0xFF);
        timer.borrow_mut().run(1).unwrap();
        assert_eq!(em.load_byte(TCNT0), 0xFE);
        assert_eq!(em.load_byte(TIFR0) & TOV, 0);
        timer.borrow_mut().run(254).unwrap();
        assert_eq!(em.load_byte(TCNT0), 0);
        assert_eq!(em.load_byte(TIFR0) & TOV, TOV);
    }

    #[test]
    fn test_timsk_enables_vector() {
        let (mut em, timer) = setup();
        em.store_byte(TCCR0B, 0x01);
        em.store_byte(TCNT0, 0xFF);
        timer.borrow_mut().run(1).unwrap();
        assert_eq!(em.interrupts().pending(), None);
        em.store_byte(TIMSK0, 0x01);
        assert_eq!(em.load_byte(TIMSK0), 0x01);
        assert_eq!(em.interrupts().pending(), Some(16));
    }

    #[test]
    fn test_stopped_timer() {
        let (mut em, timer) = setup();
        timer.borrow_mut().run(10_000).unwrap();
        assert_eq!(em.load_byte(TCNT0), 0);
    }

    // Port D on the ATmega168; OC0A is PD6 and OC0B is PD5
    const PIND: u16 = 0x29;
    const DDRD: u16 = 0x2A;
    const PORTD: u16 = 0x2B;

    fn with_outputs() -> (Emulator, Rc<RefCell<Timer>>) {
        let (mut em, timer) = setup();
        let gpio = Gpio::attach(&mut em, 'D').unwrap();
        timer.borrow_mut().connect_output(Channel::A, gpio.clone(), 6);
        timer.borrow_mut().connect_output(Channel::B, gpio, 5);
        em.store_byte(DDRD, 0x60);
        (em, timer)
    }

    #[test]
    fn test_ctc_toggles_oc0a() {
        let (mut em, timer) = with_outputs();
        em.store_byte(OCR0A, 9);
        em.store_byte(TCCR0A, 0x42); // COM0A = toggle, CTC
        em.store_byte(TCCR0B, 0x01);
        timer.borrow_mut().run(8).unwrap();
        assert_eq!(em.load_byte(PIND) & 0x40, 0);
        timer.borrow_mut().run(1).unwrap();
        assert_eq!(em.load_byte(PIND) & 0x40, 0x40);
        timer.borrow_mut().run(10).unwrap();
        assert_eq!(em.load_byte(PIND) & 0x40, 0);
        timer.borrow_mut().run(10).unwrap();
        assert!(timer.borrow().output(Channel::A));
        // OC0B is disconnected and follows PORTD
        assert_eq!(em.load_byte(PIND) & 0x20, 0);
        em.store_byte(PORTD, 0x60);
        assert_eq!(em.load_byte(PIND) & 0x60, 0x60);
    }

    #[test]
    fn test_fast_pwm_non_inverting_and_inverting() {
        let (mut em, timer) = with_outputs();
        em.store_byte(OCR0A, 63);
        em.store_byte(OCR0B, 127);
        // COM0A = clear on match, COM0B = set on match, fast PWM to 0xFF
        em.store_byte(TCCR0A, 0xB3);
        em.store_byte(TCCR0B, 0x01);
        timer.borrow_mut().run(256).unwrap();
        assert_eq!(em.load_byte(TCNT0), 0);
        assert_eq!(em.load_byte(PIND) & 0x60, 0x40);

        timer.borrow_mut().run(62).unwrap();
        assert_eq!(em.load_byte(PIND) & 0x60, 0x40);
        timer.borrow_mut().run(1).unwrap();
        assert_eq!(em.load_byte(PIND) & 0x60, 0x00);

        timer.borrow_mut().run(64).unwrap();
        assert_eq!(em.load_byte(TCNT0), 127);
        assert_eq!(em.load_byte(PIND) & 0x60, 0x20);

        // PORTD does not reach connected pins
        em.store_byte(PORTD, 0x40);
        assert_eq!(em.load_byte(PIND) & 0x60, 0x20);
    }

    #[test]
    fn test_phase_correct_output() {
        let (mut em, timer) = with_outputs();
        em.store_byte(OCR0A, 100);
        em.store_byte(TCCR0A, 0x81); // clear up, set down; phase correct
        em.store_byte(TCCR0B, 0x01);
        timer.borrow_mut().run(409).unwrap();
        assert_eq!(em.load_byte(TCNT0), 101);
        assert!(!timer.borrow().output(Channel::A));
        timer.borrow_mut().run(1).unwrap();
        assert!(timer.borrow().output(Channel::A));
        assert_eq!(em.load_byte(PIND) & 0x40, 0x40);
        // Down to BOTTOM and back up to 100
        timer.borrow_mut().run(199).unwrap();
        assert!(timer.borrow().output(Channel::A));
        timer.borrow_mut().run(1).unwrap();
        assert!(!timer.borrow().output(Channel::A));
    }

    #[test]
    fn test_pwm_toggle_needs_wgm2() {
        let (mut em, timer) = with_outputs();
        em.store_byte(OCR0A, 9);
        em.store_byte(TCCR0A, 0x53); // COM0A = COM0B = toggle, fast PWM
        em.store_byte(TCCR0B, 0x01);
        timer.borrow_mut().run(9).unwrap();
        assert!(!timer.borrow().output(Channel::A));

        // WGM = 7: TOP = OCR0A, unit A toggles at each match
        em.store_byte(TCNT0, 0);
        em.store_byte(TCCR0B, 0x09);
        timer.borrow_mut().run(9).unwrap();
        assert!(timer.borrow().output(Channel::A));
        timer.borrow_mut().run(10).unwrap();
        assert!(!timer.borrow().output(Channel::A));
        // Unit B has no toggle mode in PWM
        assert!(!timer.borrow().output(Channel::B));
    }

    #[test]
    fn test_force_output_compare() {
        let (mut em, timer) = with_outputs();
        em.store_byte(TCCR0A, 0x40); // COM0A = toggle, normal mode
        em.store_byte(TCCR0B, 0x80); // FOC0A, timer stopped
        assert!(timer.borrow().output(Channel::A));
        assert_eq!(em.load_byte(PIND) & 0x40, 0x40);
        assert_eq!(em.load_byte(TIFR0), 0);
        assert_eq!(em.load_byte(TCCR0B), 0);
    }

    #[test]
    fn test_attach_missing_timer() {
        let mut em = Emulator::new(ChipConfig::atmega168()).unwrap();
        assert!(matches!(Timer::attach(&mut em, 5), Err(Error::UnknownVector { .. })));
        // ATtiny timers use the TIM0_ vector names
        let mut tiny = Emulator::new(ChipConfig::attiny10()).unwrap();
        assert!(Timer::attach(&mut tiny, 0).is_err());
    }
}
