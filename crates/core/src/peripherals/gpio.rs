//! General-purpose I/O port (PORTx / DDRx / PINx).
//!
//! | Register | Read                                   | Write                  |
//! |----------|----------------------------------------|------------------------|
//! | PORTx    | output latch                           | set output latch       |
//! | DDRx     | direction (1 = output)                 | set direction          |
//! | PINx     | inputs on input pins, latch on outputs | toggle latch bits      |
//!
//! With no input source attached, input pins read back their PORT bit, which
//! is the level the internal pull-up would produce on an open pin. An input
//! source is told which pull-ups are enabled (DDR = 0, PORT = 1) whenever
//! that set changes.
//!
//! Another peripheral can take over an output pin with
//! [`Gpio::override_pin`]; the pin then drives the given level and ignores
//! its PORT bit until released.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::debug;

use crate::emulator::Emulator;
use crate::error::Result;
use crate::port::Port;

/// Supplies the external level of every pin of a port.
pub trait InputPins {
    fn levels(&mut self) -> u8;

    /// Pins with their pull-up enabled, reported on every change.
    fn pullups_changed(&mut self, _pullups: u8) {}
}

/// Notified when a driven output pin changes level.
pub trait OutputPin {
    fn changed(&mut self, pin: u8, high: bool);
}

pub struct Gpio {
    name: char,
    port: u8,
    ddr: u8,
    /// Driven levels as of the last notification
    driven: u8,
    /// Pull-up mask as of the last notification
    reported_pullups: u8,
    override_mask: u8,
    override_level: u8,
    input: Option<Box<dyn InputPins>>,
    outputs: Vec<Box<dyn OutputPin>>,
}

impl Gpio {
    pub fn new(name: char) -> Self {
        Gpio {
            name: name.to_ascii_uppercase(),
            port: 0,
            ddr: 0,
            driven: 0,
            reported_pullups: 0,
            override_mask: 0,
            override_level: 0,
            input: None,
            outputs: Vec::new(),
        }
    }

    /// Create a GPIO port and register its PORTx, DDRx and PINx registers on
    /// `em`. Nothing is registered if any of the three names is missing.
    pub fn attach(em: &mut Emulator, name: char) -> Result<Rc<RefCell<Gpio>>> {
        let gpio = Rc::new(RefCell::new(Gpio::new(name)));
        let letter = gpio.borrow().name;
        let names = [
            (format!("PORT{}", letter), GpioRegister::Port),
            (format!("DDR{}", letter), GpioRegister::Ddr),
            (format!("PIN{}", letter), GpioRegister::Pin),
        ];
        for (n, _) in &names {
            em.port_ref(n)?;
        }
        for (n, reg) in names {
            em.register_port_by_name(&n, GpioPort { gpio: gpio.clone(), reg })?;
        }
        debug!(port = %letter, "gpio attached");
        Ok(gpio)
    }

    pub fn set_input(&mut self, mut input: Box<dyn InputPins>) {
        input.pullups_changed(self.reported_pullups);
        self.input = Some(input);
    }

    pub fn add_output(&mut self, output: Box<dyn OutputPin>) {
        self.outputs.push(output);
    }

    pub fn port(&self) -> u8 {
        self.port
    }

    pub fn ddr(&self) -> u8 {
        self.ddr
    }

    /// Input pins with their pull-up enabled.
    pub fn pullups(&self) -> u8 {
        self.port & !self.ddr
    }

    /// Force output `pin` to `Some(level)`, or hand it back to PORT with
    /// `None`. The pin still only drives while its DDR bit is set.
    pub fn override_pin(&mut self, pin: u8, level: Option<bool>) {
        let bit = 1 << (pin & 7);
        match level {
            Some(high) => {
                self.override_mask |= bit;
                if high { self.override_level |= bit; } else { self.override_level &= !bit; }
            }
            None => self.override_mask &= !bit,
        }
        self.notify();
    }

    fn output_levels(&self) -> u8 {
        (self.port & !self.override_mask) | (self.override_level & self.override_mask)
    }

    pub fn pin(&mut self) -> u8 {
        let outside = match &mut self.input {
            Some(input) => input.levels(),
            None => self.port,
        };
        (outside & !self.ddr) | (self.output_levels() & self.ddr)
    }

    fn set_port(&mut self, v: u8) {
        self.port = v;
        self.notify();
    }

    fn set_ddr(&mut self, v: u8) {
        self.ddr = v;
        self.notify();
    }

    /// Tell outputs about driven pins whose level changed and the input
    /// source about pull-up changes. A pin switched to input is reported
    /// low.
    fn notify(&mut self) {
        let driven = self.output_levels() & self.ddr;
        let changed = driven ^ self.driven;
        self.driven = driven;
        for pin in (0..8).filter(|p| changed & (1 << p) != 0) {
            let high = driven & (1 << pin) != 0;
            for out in &mut self.outputs {
                out.changed(pin, high);
            }
        }

        let pullups = self.pullups();
        if pullups != self.reported_pullups {
            self.reported_pullups = pullups;
            if let Some(input) = &mut self.input {
                input.pullups_changed(pullups);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GpioRegister {
    Port,
    Ddr,
    Pin,
}

struct GpioPort {
    gpio: Rc<RefCell<Gpio>>,
    reg: GpioRegister,
}

impl Port for GpioPort {
    fn read(&mut self) -> u8 {
        let mut g = self.gpio.borrow_mut();
        match self.reg {
            GpioRegister::Port => g.port,
            GpioRegister::Ddr => g.ddr,
            GpioRegister::Pin => g.pin(),
        }
    }

    fn write(&mut self, value: u8) {
        let mut g = self.gpio.borrow_mut();
        match self.reg {
            GpioRegister::Port => g.set_port(value),
            GpioRegister::Ddr => g.set_ddr(value),
            GpioRegister::Pin => {
                let toggled = g.port ^ value;
                g.set_port(toggled);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ChipConfig;

    struct Recorder(Rc<RefCell<Vec<(u8, bool)>>>);

    impl OutputPin for Recorder {
        fn changed(&mut self, pin: u8, high: bool) {
            self.0.borrow_mut().push((pin, high));
        }
    }

    struct Fixed(u8);

    impl InputPins for Fixed {
        fn levels(&mut self) -> u8 {
            self.0
        }
    }

    #[test]
    fn test_output_changes_reported() {
        let mut em = Emulator::new(ChipConfig::atmega168()).unwrap();
        let gpio = Gpio::attach(&mut em, 'b').unwrap();
        let log = Rc::new(RefCell::new(Vec::new()));
        gpio.borrow_mut().add_output(Box::new(Recorder(log.clone())));

        // DDRB = 0x20; PORTB = 0x20 through the data space
        em.store_byte(0x24, 0x20);
        em.store_byte(0x25, 0x20);
        assert_eq!(*log.borrow(), vec![(5, true)]);

        // Writing PINB toggles PB5
        em.store_byte(0x23, 0x20);
        assert_eq!(gpio.borrow().port(), 0x00);
        assert_eq!(log.borrow().last(), Some(&(5, false)));

        // Latch changes on input pins are not reported
        let before = log.borrow().len();
        em.store_byte(0x25, 0x01);
        assert_eq!(log.borrow().len(), before);
    }

    #[test]
    fn test_pin_reads_inputs_and_latch() {
        let mut em = Emulator::new(ChipConfig::atmega168()).unwrap();
        let gpio = Gpio::attach(&mut em, 'D').unwrap();
        em.store_byte(0x2B, 0x0F);
        // Pull-up level without an input source
        assert_eq!(em.load_byte(0x29), 0x0F);

        gpio.borrow_mut().set_input(Box::new(Fixed(0xA0)));
        em.store_byte(0x2A, 0x03);
        assert_eq!(em.load_byte(0x29), 0xA3);
        assert_eq!(em.load_byte(0x2A), 0x03);
    }

    struct Pulled {
        level: u8,
        log: Rc<RefCell<Vec<u8>>>,
    }

    impl InputPins for Pulled {
        fn levels(&mut self) -> u8 {
            self.level
        }

        fn pullups_changed(&mut self, pullups: u8) {
            self.log.borrow_mut().push(pullups);
        }
    }

    #[test]
    fn test_pullup_changes_reported() {
        let mut em = Emulator::new(ChipConfig::atmega168()).unwrap();
        let gpio = Gpio::attach(&mut em, 'B').unwrap();
        let log = Rc::new(RefCell::new(Vec::new()));
        gpio.borrow_mut().set_input(Box::new(Pulled { level: 0, log: log.clone() }));
        assert_eq!(*log.borrow(), vec![0x00]);

        // PORTB = 0x03 with every pin an input
        em.store_byte(0x25, 0x03);
        // DDRB = 0x01: PB0 becomes an output and loses its pull-up
        em.store_byte(0x24, 0x01);
        // Same pull-ups again: no report
        em.store_byte(0x25, 0x03);
        // PINB toggles PB1 off
        em.store_byte(0x23, 0x02);
        assert_eq!(*log.borrow(), vec![0x00, 0x03, 0x02, 0x00]);
        assert_eq!(gpio.borrow().pullups(), 0x00);
    }

    #[test]
    fn test_override_replaces_port_bit() {
        let mut em = Emulator::new(ChipConfig::atmega168()).unwrap();
        let gpio = Gpio::attach(&mut em, 'D').unwrap();
        let log = Rc::new(RefCell::new(Vec::new()));
        gpio.borrow_mut().add_output(Box::new(Recorder(log.clone())));

        gpio.borrow_mut().override_pin(6, Some(true));
        // Not driven until DDRD6 is set
        assert!(log.borrow().is_empty());
        em.store_byte(0x2A, 0x40);
        assert_eq!(*log.borrow(), vec![(6, true)]);
        assert_eq!(em.load_byte(0x29), 0x40);

        // PORTD has no effect on an overridden pin
        em.store_byte(0x2B, 0x00);
        assert_eq!(em.load_byte(0x29), 0x40);

        gpio.borrow_mut().override_pin(6, None);
        assert_eq!(*log.borrow(), vec![(6, true), (6, false)]);
        assert_eq!(em.load_byte(0x29), 0x00);
    }

    #[test]
    fn test_attach_unknown_port() {
        let mut em = Emulator::new(ChipConfig::attiny10()).unwrap();
        assert!(Gpio::attach(&mut em, 'C').is_err());
        assert!(Gpio::attach(&mut em, 'B').is_ok());
    }
}
