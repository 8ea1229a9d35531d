//! Small programs run through the clock together with peripherals.

use std::cell::RefCell;
use std::rc::Rc;

use avrem_core::peripherals::{Gpio, OutputPin, Timer};
use avrem_core::{ChipConfig, Clock, Emulator};

struct Toggles(Rc<RefCell<Vec<bool>>>);

impl OutputPin for Toggles {
    fn changed(&mut self, pin: u8, high: bool) {
        if pin == 5 {
            self.0.borrow_mut().push(high);
        }
    }
}

fn program(chip: ChipConfig, words: &[(u32, &[u16])]) -> Emulator {
    let mut em = Emulator::new(chip).unwrap();
    for (at, w) in words {
        em.write_program(*at, w).unwrap();
    }
    em
}

#[test]
fn timer_overflow_interrupt_counts() {
    let mut em = program(
        ChipConfig::atmega168(),
        &[
            (0, &[0xC027]),           // RJMP main
            (32, &[0x9503, 0x9518]),  // TIMER0_OVF: INC R16; RETI
            (40, &[
                0xE011,               // main: LDI R17, 1
                0x9310, 0x006E,       // STS TIMSK0, R17
                0xBD15,               // OUT TCCR0B, R17 (clk/1)
                0x9478,               // SEI
                0xCFFF,               // RJMP .-2
            ]),
        ],
    );
    let timer = Timer::attach(&mut em, 0).unwrap();
    let em = Rc::new(RefCell::new(em));

    let mut clock = Clock::new();
    clock.add(em.clone());
    clock.add(timer.clone());
    for _ in 0..100 {
        clock.run(100).unwrap();
    }

    assert_eq!(clock.now(), 10_000);
    let em = em.borrow();
    let count = em.reg(16);
    assert!((37..=39).contains(&count), "{} overflows serviced", count);
    assert_eq!(em.cpu().sp, 0x04FF);
}

#[test]
fn gpio_blink_through_pin_register() {
    let mut em = program(
        ChipConfig::atmega88(),
        &[(0, &[
            0x9A25, // SBI DDRB, 5
            0x9A1D, // loop: SBI PINB, 5
            0xCFFE, // RJMP loop
        ])],
    );
    let gpio = Gpio::attach(&mut em, 'B').unwrap();
    let levels = Rc::new(RefCell::new(Vec::new()));
    gpio.borrow_mut().add_output(Box::new(Toggles(levels.clone())));

    let mut clock = Clock::new();
    clock.add(Rc::new(RefCell::new(em)));
    clock.run(402).unwrap();

    let levels = levels.borrow();
    assert_eq!(levels.len(), 100);
    assert!(levels.iter().step_by(2).all(|&h| h));
    assert!(levels.iter().skip(1).step_by(2).all(|&h| !h));
}

#[test]
fn split_batches_match_single_run() {
    // LDI R16, 0; loop: INC R16; BRNE loop; RJMP .-2
    let words: &[u16] = &[0xE000, 0x9503, 0xF7F1, 0xCFFF];
    let mut a = Emulator::new(ChipConfig::attiny10()).unwrap();
    a.write_program(0, words).unwrap();
    let mut b = Emulator::new(ChipConfig::attiny10()).unwrap();
    b.write_program(0, words).unwrap();

    let a = Rc::new(RefCell::new(a));
    let b = Rc::new(RefCell::new(b));
    let mut one = Clock::new();
    one.add(a.clone());
    one.run(1000).unwrap();

    let mut many = Clock::new();
    many.add(b.clone());
    for n in [3, 1, 500, 7, 489] {
        many.run(n).unwrap();
    }

    assert_eq!(a.borrow().cpu(), b.borrow().cpu());
    assert_eq!(a.borrow().excess_ticks(), b.borrow().excess_ticks());
}
