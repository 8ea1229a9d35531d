//! ATmega48/88/168 and ATmega2560.

use super::{availability, port_table, vector_table, ChipConfig, Family};
use crate::memory::{Region, RegionKind};

const X8_PORTS: &[(&str, usize, u16)] = &[
    ("PINB", 0, 0x03), ("DDRB", 0, 0x04), ("PORTB", 0, 0x05),
    ("PINC", 0, 0x06), ("DDRC", 0, 0x07), ("PORTC", 0, 0x08),
    ("PIND", 0, 0x09), ("DDRD", 0, 0x0A), ("PORTD", 0, 0x0B),
    ("TIFR0", 0, 0x15), ("TIFR1", 0, 0x16), ("TIFR2", 0, 0x17),
    ("PCIFR", 0, 0x1B), ("EIFR", 0, 0x1C), ("EIMSK", 0, 0x1D),
    ("GPIOR0", 0, 0x1E), ("EECR", 0, 0x1F), ("EEDR", 0, 0x20),
    ("EEARL", 0, 0x21), ("EEARH", 0, 0x22), ("GTCCR", 0, 0x23),
    ("TCCR0A", 0, 0x24), ("TCCR0B", 0, 0x25), ("TCNT0", 0, 0x26),
    ("OCR0A", 0, 0x27), ("OCR0B", 0, 0x28),
    ("GPIOR1", 0, 0x2A), ("GPIOR2", 0, 0x2B),
    ("SPCR", 0, 0x2C), ("SPSR", 0, 0x2D), ("SPDR", 0, 0x2E),
    ("ACSR", 0, 0x30), ("SMCR", 0, 0x33), ("MCUSR", 0, 0x34),
    ("MCUCR", 0, 0x35), ("SPMCSR", 0, 0x37),
    ("SPL", 0, 0x3D), ("SPH", 0, 0x3E), ("SREG", 0, 0x3F),
    // Extended I/O, indexed from data address 0x60
    ("WDTCSR", 1, 0x00), ("CLKPR", 1, 0x01), ("PRR", 1, 0x04),
    ("OSCCAL", 1, 0x06), ("PCICR", 1, 0x08), ("EICRA", 1, 0x09),
    ("PCMSK0", 1, 0x0B), ("PCMSK1", 1, 0x0C), ("PCMSK2", 1, 0x0D),
    ("TIMSK0", 1, 0x0E), ("TIMSK1", 1, 0x0F), ("TIMSK2", 1, 0x10),
    ("ADCL", 1, 0x18), ("ADCH", 1, 0x19), ("ADCSRA", 1, 0x1A),
    ("ADCSRB", 1, 0x1B), ("ADMUX", 1, 0x1C), ("DIDR0", 1, 0x1E), ("DIDR1", 1, 0x1F),
    ("TCCR1A", 1, 0x20), ("TCCR1B", 1, 0x21), ("TCCR1C", 1, 0x22),
    ("TCNT1L", 1, 0x24), ("TCNT1H", 1, 0x25), ("ICR1L", 1, 0x26), ("ICR1H", 1, 0x27),
    ("OCR1AL", 1, 0x28), ("OCR1AH", 1, 0x29), ("OCR1BL", 1, 0x2A), ("OCR1BH", 1, 0x2B),
    ("TCCR2A", 1, 0x50), ("TCCR2B", 1, 0x51), ("TCNT2", 1, 0x52),
    ("OCR2A", 1, 0x53), ("OCR2B", 1, 0x54), ("ASSR", 1, 0x56),
    ("TWBR", 1, 0x58), ("TWSR", 1, 0x59), ("TWAR", 1, 0x5A),
    ("TWDR", 1, 0x5B), ("TWCR", 1, 0x5C), ("TWAMR", 1, 0x5D),
    ("UCSR0A", 1, 0x60), ("UCSR0B", 1, 0x61), ("UCSR0C", 1, 0x62),
    ("UBRR0L", 1, 0x64), ("UBRR0H", 1, 0x65), ("UDR0", 1, 0x66),
];

const X8_VECTORS: &[(&str, u8)] = &[
    ("RESET", 0), ("INT0", 1), ("INT1", 2),
    ("PCINT0", 3), ("PCINT1", 4), ("PCINT2", 5), ("WDT", 6),
    ("TIMER2_COMPA", 7), ("TIMER2_COMPB", 8), ("TIMER2_OVF", 9),
    ("TIMER1_CAPT", 10), ("TIMER1_COMPA", 11), ("TIMER1_COMPB", 12), ("TIMER1_OVF", 13),
    ("TIMER0_COMPA", 14), ("TIMER0_COMPB", 15), ("TIMER0_OVF", 16),
    ("SPI_STC", 17), ("USART_RX", 18), ("USART_UDRE", 19), ("USART_TX", 20),
    ("ADC", 21), ("EE_READY", 22), ("ANALOG_COMP", 23), ("TWI", 24), ("SPM_READY", 25),
];

/// ATmega48/88/168 share one layout; only memory sizes and vector width differ.
pub(super) fn atmega_x8(
    label: &str,
    family: Family,
    log_prog: u8,
    log_ram: u8,
    log_eeprom: u8,
    vector_words: u8,
) -> ChipConfig {
    // Data space rounds up to the next power of two past 0x100 + RAM.
    let log_data = if log_ram >= 10 { 11 } else { 10 };
    let available = availability(family);
    ChipConfig {
        label: label.to_string(),
        family,
        num_regs: 32,
        log_prog_mem_size: log_prog,
        log_data_space_size: log_data,
        log_ram_size: log_ram,
        log_eeprom_size: log_eeprom,
        io_bank_sizes: vec![64, 160],
        regions: vec![
            Region::new(0x0000, 32, RegionKind::Regs),
            Region::new(0x0020, 64, RegionKind::Io { bank: 0 }),
            Region::new(0x0060, 160, RegionKind::Io { bank: 1 }),
            Region::new(0x0100, 1 << log_ram, RegionKind::Ram),
        ],
        ports: port_table(X8_PORTS),
        vectors: vector_table(X8_VECTORS),
        vector_words,
        available,
    }
}

const M2560_PORTS: &[(&str, usize, u16)] = &[
    ("PINA", 0, 0x00), ("DDRA", 0, 0x01), ("PORTA", 0, 0x02),
    ("PINB", 0, 0x03), ("DDRB", 0, 0x04), ("PORTB", 0, 0x05),
    ("PINC", 0, 0x06), ("DDRC", 0, 0x07), ("PORTC", 0, 0x08),
    ("PIND", 0, 0x09), ("DDRD", 0, 0x0A), ("PORTD", 0, 0x0B),
    ("PINE", 0, 0x0C), ("DDRE", 0, 0x0D), ("PORTE", 0, 0x0E),
    ("PINF", 0, 0x0F), ("DDRF", 0, 0x10), ("PORTF", 0, 0x11),
    ("TIFR0", 0, 0x15), ("TIFR1", 0, 0x16), ("TIFR2", 0, 0x17),
    ("GPIOR0", 0, 0x1E), ("GTCCR", 0, 0x23),
    ("TCCR0A", 0, 0x24), ("TCCR0B", 0, 0x25), ("TCNT0", 0, 0x26),
    ("OCR0A", 0, 0x27), ("OCR0B", 0, 0x28),
    ("SMCR", 0, 0x33), ("MCUSR", 0, 0x34), ("MCUCR", 0, 0x35), ("SPMCSR", 0, 0x37),
    ("RAMPZ", 0, 0x3B), ("EIND", 0, 0x3C),
    ("SPL", 0, 0x3D), ("SPH", 0, 0x3E), ("SREG", 0, 0x3F),
    ("TIMSK0", 1, 0x0E), ("TIMSK1", 1, 0x0F), ("TIMSK2", 1, 0x10),
    ("TCCR2A", 1, 0x50), ("TCCR2B", 1, 0x51), ("TCNT2", 1, 0x52),
    ("OCR2A", 1, 0x53), ("OCR2B", 1, 0x54),
];

const M2560_VECTORS: &[(&str, u8)] = &[
    ("RESET", 0), ("INT0", 1), ("INT1", 2),
    ("TIMER2_COMPA", 13), ("TIMER2_COMPB", 14), ("TIMER2_OVF", 15),
    ("TIMER0_COMPA", 21), ("TIMER0_COMPB", 22), ("TIMER0_OVF", 23),
];

pub(super) fn atmega2560() -> ChipConfig {
    let family = Family::EnhancedCore4M;
    ChipConfig {
        label: "ATmega2560".to_string(),
        family,
        num_regs: 32,
        log_prog_mem_size: 17,
        log_data_space_size: 16,
        log_ram_size: 13,
        log_eeprom_size: 12,
        io_bank_sizes: vec![64, 416],
        regions: vec![
            Region::new(0x0000, 32, RegionKind::Regs),
            Region::new(0x0020, 64, RegionKind::Io { bank: 0 }),
            Region::new(0x0060, 416, RegionKind::Io { bank: 1 }),
            Region::new(0x0200, 1 << 13, RegionKind::Ram),
        ],
        ports: port_table(M2560_PORTS),
        vectors: vector_table(M2560_VECTORS),
        vector_words: 2,
        available: availability(family),
    }
}
