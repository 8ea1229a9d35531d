//! Interrupt request lines shared between peripherals and the CPU.
//!
//! Each vector number (0..63) has a flag bit and an enable bit. A peripheral
//! sets the flag when its event occurs and mirrors its interrupt mask
//! register into the enable bits; the CPU services the lowest-numbered
//! vector whose flag and enable are both set, clearing the flag as it
//! enters the handler. Vector 0 is reset and is never serviced. Vector
//! numbers from [`VECTOR_COUNT`] up have no line and are ignored.

use std::cell::Cell;
use std::rc::Rc;

/// Number of interrupt lines.
pub const VECTOR_COUNT: u8 = 64;

fn line(vector: u8) -> u64 {
    1u64.checked_shl(vector as u32).unwrap_or(0)
}

#[derive(Debug, Clone, Copy, Default)]
struct Lines {
    flags: u64,
    enabled: u64,
}

/// Cloneable handle to one chip's interrupt lines.
#[derive(Debug, Clone, Default)]
pub struct Interrupts {
    lines: Rc<Cell<Lines>>,
}

impl Interrupts {
    pub fn new() -> Self {
        Self::default()
    }

    fn update(&self, f: impl FnOnce(&mut Lines)) {
        let mut l = self.lines.get();
        f(&mut l);
        self.lines.set(l);
    }

    pub fn raise(&self, vector: u8) {
        self.update(|l| l.flags |= line(vector));
    }

    pub fn clear(&self, vector: u8) {
        self.update(|l| l.flags &= !line(vector));
    }

    pub fn is_raised(&self, vector: u8) -> bool {
        self.lines.get().flags & line(vector) != 0
    }

    pub fn set_enabled(&self, vector: u8, enabled: bool) {
        self.update(|l| {
            if enabled { l.enabled |= line(vector); } else { l.enabled &= !line(vector); }
        });
    }

    /// Lowest-numbered vector that is both raised and enabled.
    pub fn pending(&self) -> Option<u8> {
        let l = self.lines.get();
        let ready = l.flags & l.enabled & !1;
        if ready == 0 { None } else { Some(ready.trailing_zeros() as u8) }
    }

    /// Take the highest-priority pending vector, clearing its flag.
    pub fn acknowledge(&self) -> Option<u8> {
        let v = self.pending()?;
        self.clear(v);
        Some(v)
    }

    /// Raw `(flags, enabled)` bitsets.
    pub fn snapshot(&self) -> (u64, u64) {
        let l = self.lines.get();
        (l.flags, l.enabled)
    }

    pub fn restore(&self, flags: u64, enabled: u64) {
        self.lines.set(Lines { flags, enabled });
    }
}
