//! I/O port registry.
//!
//! Peripheral registers are reached through the [`Port`] trait. Ports are
//! keyed by [`PortRef`] (bank and index); the data-space I/O regions and the
//! IN/OUT/SBI/CBI instructions both resolve through the same registry.
//!
//! The CPU's own registers that are visible as I/O (SREG, SPH, SPL, the RAMP
//! bytes and EIND) are bound as [`Binding::Cpu`] and read or written
//! straight from [`CpuState`].

use std::collections::HashMap;

use crate::chip::PortRef;
use crate::cpu::CpuState;

/// A memory-mapped peripheral register.
pub trait Port {
    fn read(&mut self) -> u8;
    fn write(&mut self, value: u8);
}

/// CPU registers that can be bound as ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuRegister {
    Sreg,
    Sph,
    Spl,
    Rampx,
    Rampy,
    Rampz,
    Rampd,
    Eind,
}

impl CpuRegister {
    /// Standard port names, bound automatically when the chip defines them.
    pub const NAMED: [(&'static str, CpuRegister); 8] = [
        ("SREG", CpuRegister::Sreg),
        ("SPH", CpuRegister::Sph),
        ("SPL", CpuRegister::Spl),
        ("RAMPX", CpuRegister::Rampx),
        ("RAMPY", CpuRegister::Rampy),
        ("RAMPZ", CpuRegister::Rampz),
        ("RAMPD", CpuRegister::Rampd),
        ("EIND", CpuRegister::Eind),
    ];

    pub fn read(self, cpu: &CpuState) -> u8 {
        match self {
            CpuRegister::Sreg => cpu.sreg,
            CpuRegister::Sph => (cpu.sp >> 8) as u8,
            CpuRegister::Spl => cpu.sp as u8,
            CpuRegister::Rampx => cpu.rampx,
            CpuRegister::Rampy => cpu.rampy,
            CpuRegister::Rampz => cpu.rampz,
            CpuRegister::Rampd => cpu.rampd,
            CpuRegister::Eind => cpu.eind,
        }
    }

    pub fn write(self, cpu: &mut CpuState, v: u8) {
        match self {
            CpuRegister::Sreg => cpu.sreg = v,
            CpuRegister::Sph => cpu.sp = (cpu.sp & 0x00FF) | ((v as u16) << 8),
            CpuRegister::Spl => cpu.sp = (cpu.sp & 0xFF00) | v as u16,
            CpuRegister::Rampx => cpu.rampx = v,
            CpuRegister::Rampy => cpu.rampy = v,
            CpuRegister::Rampz => cpu.rampz = v,
            CpuRegister::Rampd => cpu.rampd = v,
            CpuRegister::Eind => cpu.eind = v,
        }
    }
}

/// What a registered port address is bound to.
pub enum Binding {
    Cpu(CpuRegister),
    Device(Box<dyn Port>),
}

#[derive(Default)]
pub struct PortRegistry {
    ports: HashMap<PortRef, Binding>,
}

impl PortRegistry {
    pub fn new() -> Self {
        PortRegistry { ports: HashMap::new() }
    }

    /// Bind `port` at `at`, returning the previous binding if any.
    pub fn register(&mut self, at: PortRef, binding: Binding) -> Option<Binding> {
        self.ports.insert(at, binding)
    }

    pub fn unregister(&mut self, at: PortRef) -> Option<Binding> {
        self.ports.remove(&at)
    }

    pub fn is_registered(&self, at: PortRef) -> bool {
        self.ports.contains_key(&at)
    }

    /// Read a port; `None` when nothing is registered at `at`.
    pub fn read(&mut self, at: PortRef, cpu: &CpuState) -> Option<u8> {
        match self.ports.get_mut(&at)? {
            Binding::Cpu(r) => Some(r.read(cpu)),
            Binding::Device(p) => Some(p.read()),
        }
    }

    /// Write a port; returns false when nothing is registered at `at`.
    pub fn write(&mut self, at: PortRef, cpu: &mut CpuState, v: u8) -> bool {
        match self.ports.get_mut(&at) {
            Some(Binding::Cpu(r)) => {
                r.write(cpu, v);
                true
            }
            Some(Binding::Device(p)) => {
                p.write(v);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Latch(u8);

    impl Port for Latch {
        fn read(&mut self) -> u8 {
            self.0
        }
        fn write(&mut self, value: u8) {
            self.0 = value;
        }
    }

    #[test]
    fn test_stack_pointer_halves() {
        let mut cpu = CpuState::new();
        let mut reg = PortRegistry::new();
        reg.register(PortRef::new(0, 0x3D), Binding::Cpu(CpuRegister::Spl));
        reg.register(PortRef::new(0, 0x3E), Binding::Cpu(CpuRegister::Sph));
        assert!(reg.write(PortRef::new(0, 0x3E), &mut cpu, 0x04));
        assert!(reg.write(PortRef::new(0, 0x3D), &mut cpu, 0xFF));
        assert_eq!(cpu.sp, 0x04FF);
        assert_eq!(reg.read(PortRef::new(0, 0x3E), &cpu), Some(0x04));
    }

    #[test]
    fn test_device_and_unregister() {
        let mut cpu = CpuState::new();
        let mut reg = PortRegistry::new();
        let at = PortRef::new(1, 0x0E);
        reg.register(at, Binding::Device(Box::new(Latch(7))));
        assert_eq!(reg.read(at, &cpu), Some(7));
        reg.write(at, &mut cpu, 9);
        assert_eq!(reg.read(at, &cpu), Some(9));
        assert!(reg.unregister(at).is_some());
        assert_eq!(reg.read(at, &cpu), None);
        assert!(!reg.write(at, &mut cpu, 1));
    }
}
