//! ATtiny4/5/9/10 (reduced core).
//!
//! The register file is not mapped into the data space on these parts; I/O
//! occupies 0x00-0x3F and the 32 bytes of SRAM start at 0x40.

use super::{availability, port_table, vector_table, ChipConfig, Family};
use crate::memory::{Region, RegionKind};

const PORTS: &[(&str, usize, u16)] = &[
    ("PINB", 0, 0x00), ("DDRB", 0, 0x01), ("PORTB", 0, 0x02), ("PUEB", 0, 0x03),
    ("PORTCR", 0, 0x0C), ("PCMSK", 0, 0x10), ("PCIFR", 0, 0x11), ("PCICR", 0, 0x12),
    ("EIMSK", 0, 0x13), ("EIFR", 0, 0x14), ("EICRA", 0, 0x15), ("ACSR", 0, 0x1F),
    ("ICR0L", 0, 0x22), ("ICR0H", 0, 0x23),
    ("OCR0BL", 0, 0x24), ("OCR0BH", 0, 0x25), ("OCR0AL", 0, 0x26), ("OCR0AH", 0, 0x27),
    ("TCNT0L", 0, 0x28), ("TCNT0H", 0, 0x29), ("TIFR0", 0, 0x2A), ("TIMSK0", 0, 0x2B),
    ("TCCR0C", 0, 0x2C), ("TCCR0B", 0, 0x2D), ("TCCR0A", 0, 0x2E), ("GTCCR", 0, 0x2F),
    ("WDTCSR", 0, 0x31), ("NVMCSR", 0, 0x32), ("NVMCMD", 0, 0x33), ("VLMCSR", 0, 0x34),
    ("PRR", 0, 0x35), ("CLKPSR", 0, 0x36), ("CLKMSR", 0, 0x37), ("OSCCAL", 0, 0x39),
    ("SMCR", 0, 0x3A), ("RSTFLR", 0, 0x3B), ("CCP", 0, 0x3C),
    ("SPL", 0, 0x3D), ("SPH", 0, 0x3E), ("SREG", 0, 0x3F),
];

const ADC_PORTS: &[(&str, usize, u16)] = &[
    ("DIDR0", 0, 0x17), ("ADCL", 0, 0x19), ("ADMUX", 0, 0x1B),
    ("ADCSRB", 0, 0x1C), ("ADCSRA", 0, 0x1D),
];

const VECTORS: &[(&str, u8)] = &[
    ("RESET", 0), ("INT0", 1), ("PCINT0", 2), ("TIM0_CAPT", 3),
    ("TIM0_OVF", 4), ("TIM0_COMPA", 5), ("TIM0_COMPB", 6),
    ("ANA_COMP", 7), ("WDT", 8), ("VLM", 9),
];

pub(super) fn attiny(label: &str, log_prog: u8, has_adc: bool) -> ChipConfig {
    let mut ports = port_table(PORTS);
    let mut vectors = vector_table(VECTORS);
    if has_adc {
        ports.extend(port_table(ADC_PORTS));
        vectors.insert("ADC".to_string(), 10);
    }
    ChipConfig {
        label: label.to_string(),
        family: Family::ReducedCore,
        num_regs: 16,
        log_prog_mem_size: log_prog,
        log_data_space_size: 7,
        log_ram_size: 5,
        log_eeprom_size: 0,
        io_bank_sizes: vec![64],
        regions: vec![
            Region::new(0x0000, 64, RegionKind::Io { bank: 0 }),
            Region::new(0x0040, 32, RegionKind::Ram),
        ],
        ports,
        vectors,
        vector_words: 1,
        available: availability(Family::ReducedCore),
    }
}
