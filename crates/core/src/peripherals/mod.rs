//! Peripheral models.
//!
//! Peripherals reach the CPU only through ports registered on the
//! [`Emulator`](crate::Emulator) and through its interrupt lines. A
//! peripheral that keeps time implements [`Process`](crate::Process) and is
//! added to the same [`Clock`](crate::Clock) as the CPU.
//!
//! - [`Gpio`] — PORTx / DDRx / PINx with pluggable pin adapters
//! - [`Timer`] — 8-bit Timer/Counter with overflow and compare interrupts
//!   and output compare pins

mod gpio;
mod timer;

pub use gpio::{Gpio, InputPins, OutputPin};
pub use timer::{Channel, Timer};
