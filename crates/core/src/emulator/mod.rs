//! The emulator: one CPU, its data address space, program memory and ports.
//!
//! Execution is driven either one instruction at a time with
//! [`Emulator::step`] or by tick budget with [`Emulator::run`], which is
//! what the [`Clock`](crate::clock::Clock) calls. Guest faults that a real
//! chip would silently tolerate (unknown opcodes, accesses to unmapped
//! addresses or ports) never stop execution; they cost one cycle or read as
//! zero and are reported as [`Warning`]s when diagnostics are on.

mod handlers;

use tracing::{debug, trace, warn};

use crate::chip::{ChipConfig, PortRef};
use crate::clock::Process;
use crate::cpu::CpuState;
use crate::decode::Decoder;
use crate::error::{Error, Result, Warning};
use crate::instruction::Instruction;
use crate::interrupt::Interrupts;
use crate::memory::{ProgramMemory, RegionKind, RegionTable};
use crate::port::{Binding, CpuRegister, Port, PortRegistry};
use crate::savestate::SaveState;
use crate::SREG_I;

/// Warnings kept for [`Emulator::take_warnings`]; older ones are only logged.
const MAX_KEPT_WARNINGS: usize = 1024;

pub struct Emulator {
    chip: ChipConfig,
    cpu: CpuState,
    regions: RegionTable,
    ports: PortRegistry,
    prog: ProgramMemory,
    ram: Vec<u8>,
    decoder: Decoder,
    interrupts: Interrupts,
    /// Cycles already executed beyond the last `run` budget
    excess_ticks: u64,
    log_warnings: bool,
    warnings: Vec<Warning>,
    /// Address of the instruction currently executing
    inst_pc: u32,
}

impl Emulator {
    /// Build an emulator for `chip`, binding the standard CPU ports the chip
    /// names (SREG, SPH, SPL and any RAMP/EIND registers).
    ///
    /// The stack pointer starts at the last RAM address.
    pub fn new(chip: ChipConfig) -> Result<Self> {
        chip.validate()?;

        let mut ports = PortRegistry::new();
        for (name, reg) in CpuRegister::NAMED {
            if let Some(at) = chip.port(name) {
                ports.register(at, Binding::Cpu(reg));
            }
        }

        let mut cpu = CpuState::new();
        cpu.sp = chip
            .regions
            .iter()
            .filter(|r| r.kind == RegionKind::Ram && r.size > 0)
            .map(|r| (r.start as u32 + r.size - 1) as u16)
            .max()
            .unwrap_or(0);

        debug!(chip = %chip.label, prog_words = chip.prog_words(), ram = chip.ram_size(), "emulator created");

        Ok(Emulator {
            regions: RegionTable::new(chip.regions.clone()),
            prog: ProgramMemory::new(chip.prog_words()),
            ram: vec![0; chip.ram_size()],
            decoder: Decoder::new(chip.is_reduced_core()),
            interrupts: Interrupts::new(),
            cpu,
            ports,
            chip,
            excess_ticks: 0,
            log_warnings: false,
            warnings: Vec::new(),
            inst_pc: 0,
        })
    }

    pub fn chip(&self) -> &ChipConfig {
        &self.chip
    }

    pub fn cpu(&self) -> &CpuState {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut CpuState {
        &mut self.cpu
    }

    pub fn reg(&self, r: usize) -> u8 {
        self.cpu.regs[r]
    }

    pub fn set_reg(&mut self, r: usize, v: u8) {
        self.cpu.regs[r] = v;
    }

    pub fn pc(&self) -> u32 {
        self.cpu.pc
    }

    pub fn set_pc(&mut self, pc: u32) {
        self.cpu.pc = pc & self.prog.mask();
    }

    pub fn program(&self) -> &ProgramMemory {
        &self.prog
    }

    pub fn ram(&self) -> &[u8] {
        &self.ram
    }

    /// Interrupt lines; clone the handle to give it to a peripheral.
    pub fn interrupts(&self) -> &Interrupts {
        &self.interrupts
    }

    pub fn excess_ticks(&self) -> u64 {
        self.excess_ticks
    }

    // --- Diagnostics ---

    /// Enable or disable reporting of non-fatal execution warnings.
    pub fn set_diagnostics(&mut self, enabled: bool) {
        self.log_warnings = enabled;
    }

    pub fn diagnostics(&self) -> bool {
        self.log_warnings
    }

    /// Drain warnings collected while diagnostics were enabled.
    pub fn take_warnings(&mut self) -> Vec<Warning> {
        std::mem::take(&mut self.warnings)
    }

    fn report(&mut self, w: Warning) {
        if !self.log_warnings {
            return;
        }
        warn!("{}", w);
        if self.warnings.len() < MAX_KEPT_WARNINGS {
            self.warnings.push(w);
        }
    }

    // --- Program memory ---

    /// Copy `words` into program memory at word `address`.
    pub fn write_program(&mut self, address: u32, words: &[u16]) -> Result<()> {
        self.prog.write(address, words)?;
        debug!(address, len = words.len(), "program written");
        Ok(())
    }

    /// Copy bytes into program memory at byte address `byte_addr`.
    pub fn write_program_bytes(&mut self, byte_addr: u32, bytes: &[u8]) -> Result<()> {
        self.prog.write_bytes(byte_addr, bytes)
    }

    fn fetch(&mut self) -> u16 {
        let word = self.prog.read(self.cpu.pc);
        self.cpu.pc = (self.cpu.pc + 1) & self.prog.mask();
        word
    }

    /// Skip the next instruction; returns the number of words skipped.
    fn skip(&mut self) -> u32 {
        let word = self.fetch();
        match self.decoder.decode(word) {
            Some(inst) if inst.is_two_word() => {
                self.fetch();
                2
            }
            _ => 1,
        }
    }

    // --- Data space ---

    pub fn load_byte(&mut self, addr: u16) -> u8 {
        match self.regions.demap(addr) {
            Some((RegionKind::Regs, off)) => self.cpu.regs[off as usize],
            Some((RegionKind::Io { bank }, off)) => self.read_port(bank, off),
            Some((RegionKind::Ram, off)) => self.ram[off as usize],
            None => {
                self.report(Warning::UnmappedAddress { pc: self.inst_pc, address: addr });
                0
            }
        }
    }

    pub fn store_byte(&mut self, addr: u16, v: u8) {
        match self.regions.demap(addr) {
            Some((RegionKind::Regs, off)) => self.cpu.regs[off as usize] = v,
            Some((RegionKind::Io { bank }, off)) => self.write_port(bank, off, v),
            Some((RegionKind::Ram, off)) => self.ram[off as usize] = v,
            None => self.report(Warning::UnmappedAddress { pc: self.inst_pc, address: addr }),
        }
    }

    /// Store at SP, then decrement SP.
    pub fn push(&mut self, v: u8) {
        let sp = self.cpu.sp;
        self.store_byte(sp, v);
        self.cpu.sp = sp.wrapping_sub(1);
    }

    /// Increment SP, then load from SP.
    pub fn pop(&mut self) -> u8 {
        self.cpu.sp = self.cpu.sp.wrapping_add(1);
        self.load_byte(self.cpu.sp)
    }

    /// Push a return address, low byte first (two or three bytes).
    pub fn push_pc(&mut self, pc: u32) {
        self.push(pc as u8);
        self.push((pc >> 8) as u8);
        if self.chip.has_22bit_pc() {
            self.push((pc >> 16) as u8);
        }
    }

    pub fn pop_pc(&mut self) -> u32 {
        let mut pc = 0u32;
        if self.chip.has_22bit_pc() {
            pc = (self.pop() as u32) << 16;
        }
        pc |= (self.pop() as u32) << 8;
        pc |= self.pop() as u32;
        pc & self.prog.mask()
    }

    // --- Ports ---

    pub fn register_port<P: Port + 'static>(&mut self, at: PortRef, port: P) {
        debug!(bank = at.bank, index = at.index, "port registered");
        self.ports.register(at, Binding::Device(Box::new(port)));
    }

    /// Register a port under the chip's name for it (e.g. `PORTB`).
    pub fn register_port_by_name<P: Port + 'static>(&mut self, name: &str, port: P) -> Result<PortRef> {
        let at = self.port_ref(name)?;
        debug!(name, "port registered");
        self.ports.register(at, Binding::Device(Box::new(port)));
        Ok(at)
    }

    /// Remove whatever is bound at `at`, standard CPU ports included.
    pub fn unregister_port(&mut self, at: PortRef) -> bool {
        self.ports.unregister(at).is_some()
    }

    pub fn unregister_port_by_name(&mut self, name: &str) -> Result<bool> {
        let at = self.port_ref(name)?;
        Ok(self.unregister_port(at))
    }

    pub fn port_ref(&self, name: &str) -> Result<PortRef> {
        self.chip.port(name).ok_or_else(|| Error::UnknownPort {
            chip: self.chip.label.clone(),
            name: name.to_string(),
        })
    }

    pub fn read_port(&mut self, bank: usize, index: u16) -> u8 {
        match self.ports.read(PortRef::new(bank, index), &self.cpu) {
            Some(v) => v,
            None => {
                self.report(Warning::UnmappedPort { pc: self.inst_pc, bank, index });
                0
            }
        }
    }

    pub fn write_port(&mut self, bank: usize, index: u16, v: u8) {
        if !self.ports.write(PortRef::new(bank, index), &mut self.cpu, v) {
            self.report(Warning::UnmappedPort { pc: self.inst_pc, bank, index });
        }
    }

    // --- Execution ---

    fn service_interrupt(&mut self) -> Option<u32> {
        if !self.cpu.flag(SREG_I) {
            return None;
        }
        let vector = self.interrupts.acknowledge()?;
        let ret = self.cpu.pc;
        self.inst_pc = ret;
        self.push_pc(ret);
        self.cpu.set_flag(SREG_I, false);
        self.cpu.pc = (vector as u32 * self.chip.vector_words as u32) & self.prog.mask();
        trace!(vector, "interrupt");
        Some(if self.chip.has_22bit_pc() { 5 } else { 4 })
    }

    /// Execute one instruction (or enter one interrupt handler) and return
    /// the cycles it took.
    ///
    /// Unimplemented opcodes leave the PC on the offending instruction and
    /// return [`Error::Unimplemented`].
    pub fn step(&mut self) -> Result<u32> {
        if let Some(cycles) = self.service_interrupt() {
            self.cpu.tick += cycles as u64;
            return Ok(cycles);
        }

        let pc = self.cpu.pc;
        self.inst_pc = pc;
        let word = self.fetch();
        let cycles = match self.decoder.decode(word) {
            None => {
                self.report(Warning::InvalidInstruction { pc, word });
                1
            }
            Some(inst) if !self.chip.is_available(inst) => {
                self.report(Warning::UnavailableInstruction {
                    pc,
                    instruction: inst,
                    chip: self.chip.label.clone(),
                });
                1
            }
            Some(inst) => {
                trace!("${:06X}: {:04X} {}", pc, word, inst);
                match handlers::dispatch(self, inst, word) {
                    Ok(cycles) => cycles,
                    Err(e) => {
                        self.cpu.pc = pc;
                        return Err(e);
                    }
                }
            }
        };
        self.cpu.tick += cycles as u64;
        Ok(cycles)
    }

    /// Run whole instructions until `ticks` cycles have been covered.
    ///
    /// The last instruction may overshoot; the overshoot is banked and
    /// deducted from the next call, so splitting a run into several smaller
    /// runs ends in the same state.
    pub fn run(&mut self, ticks: u64) -> Result<()> {
        if ticks <= self.excess_ticks {
            self.excess_ticks -= ticks;
            return Ok(());
        }
        let mut budget = ticks - self.excess_ticks;
        self.excess_ticks = 0;
        while budget > 0 {
            let cycles = self.step()? as u64;
            if cycles >= budget {
                self.excess_ticks = cycles - budget;
                budget = 0;
            } else {
                budget -= cycles;
            }
        }
        Ok(())
    }

    /// Register file, PC, SP, SREG and pointer registers as text.
    pub fn dump_regs(&self) -> String {
        let mut s = String::new();
        // The reduced core only has R16..R31
        let first = 32 - self.chip.num_regs as usize;
        for i in first..32 {
            if i > first && (i - first) % 8 == 0 { s.push('\n'); }
            s.push_str(&format!("R{:2}={:02X} ", i, self.cpu.regs[i]));
        }
        s.push_str(&format!("\nPC={:06X} SP={:04X} SREG={} (0x{:02X})",
            self.cpu.pc * 2, self.cpu.sp, format_sreg(self.cpu.sreg), self.cpu.sreg));
        s.push_str(&format!("\nX={:04X} Y={:04X} Z={:04X} cycles={}",
            self.cpu.x(), self.cpu.y(), self.cpu.z(), self.cpu.tick));
        s
    }

    fn unimplemented(&self, instruction: Instruction) -> Result<u32> {
        Err(Error::Unimplemented { pc: self.inst_pc, instruction })
    }

    // --- Save states ---

    pub fn save_state(&self) -> SaveState {
        let (irq_flags, irq_enabled) = self.interrupts.snapshot();
        SaveState {
            chip: self.chip.label.clone(),
            cpu: self.cpu.clone(),
            ram: self.ram.clone(),
            program: self.prog.as_slice().to_vec(),
            excess_ticks: self.excess_ticks,
            irq_flags,
            irq_enabled,
        }
    }

    /// Restore a state captured from an emulator of the same chip.
    pub fn restore_state(&mut self, state: SaveState) -> Result<()> {
        if state.chip != self.chip.label {
            return Err(Error::SaveState(format!(
                "state is for {}, emulator is {}", state.chip, self.chip.label
            )));
        }
        if state.ram.len() != self.ram.len() || state.program.len() != self.prog.len() {
            return Err(Error::SaveState("memory sizes do not match".into()));
        }
        self.prog.write(0, &state.program)?;
        self.cpu = state.cpu;
        self.ram = state.ram;
        self.excess_ticks = state.excess_ticks;
        self.interrupts.restore(state.irq_flags, state.irq_enabled);
        Ok(())
    }
}

/// SREG as `ITHSVNZC`, upper case for set flags.
pub fn format_sreg(sreg: u8) -> String {
    "ITHSVNZC"
        .chars()
        .enumerate()
        .map(|(i, f)| if sreg & (0x80 >> i) != 0 { f } else { f.to_ascii_lowercase() })
        .collect()
}

impl Process for Emulator {
    fn run(&mut self, ticks: u64) -> Result<()> {
        Emulator::run(self, ticks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ChipConfig;

    fn mega(words: &[u16]) -> Emulator {
        let mut em = Emulator::new(ChipConfig::atmega168()).unwrap();
        em.write_program(0, words).unwrap();
        em
    }

    #[test]
    fn test_stack_starts_at_ram_end() {
        let em = mega(&[]);
        assert_eq!(em.cpu().sp, 0x04FF);
        let tiny = Emulator::new(ChipConfig::attiny10()).unwrap();
        assert_eq!(tiny.cpu().sp, 0x005F);
    }

    #[test]
    fn test_push_pop_and_pc_byte_order() {
        let mut em = mega(&[]);
        em.cpu_mut().sp = 0x0200;
        em.push(0xAB);
        assert_eq!(em.cpu().sp, 0x01FF);
        assert_eq!(em.load_byte(0x0200), 0xAB);
        assert_eq!(em.pop(), 0xAB);
        assert_eq!(em.cpu().sp, 0x0200);

        em.push_pc(0x1234);
        assert_eq!(em.load_byte(0x0200), 0x34);
        assert_eq!(em.load_byte(0x01FF), 0x12);
        assert_eq!(em.pop_pc(), 0x1234);
        assert_eq!(em.cpu().sp, 0x0200);
    }

    #[test]
    fn test_three_byte_pc() {
        let mut em = Emulator::new(ChipConfig::atmega2560()).unwrap();
        em.cpu_mut().sp = 0x1000;
        em.push_pc(0x01_2345);
        assert_eq!(em.cpu().sp, 0x0FFD);
        assert_eq!(em.load_byte(0x1000), 0x45);
        assert_eq!(em.load_byte(0x0FFE), 0x01);
        assert_eq!(em.pop_pc(), 0x01_2345);
    }

    #[test]
    fn test_run_partitions_agree() {
        // LDI R16, 1; loop: INC R16; RJMP loop
        let prog = [0xE001, 0x9503, 0xCFFE];
        let mut whole = mega(&prog);
        let mut split = mega(&prog);
        whole.run(100).unwrap();
        for chunk in [1, 33, 7, 2, 57] {
            split.run(chunk).unwrap();
        }
        assert_eq!(whole.cpu(), split.cpu());
        assert_eq!(whole.excess_ticks(), split.excess_ticks());
        // RJMP takes 2 cycles, so some budgets end mid-instruction
        assert!(whole.cpu().tick >= 100 && whole.cpu().tick <= 101);
    }

    #[test]
    fn test_interrupt_entry_and_reti() {
        let mut prog = vec![0u16; 34];
        prog[0] = 0x9478; // SEI
        prog[1] = 0xCFFF; // RJMP .-2
        prog[32] = 0x9503; // vector 16: INC R16
        prog[33] = 0x9518; // RETI
        let mut em = mega(&prog);
        em.step().unwrap();

        let irq = em.interrupts().clone();
        irq.raise(16);
        assert_eq!(em.step().unwrap(), 2); // disabled: RJMP runs
        irq.set_enabled(16, true);
        assert_eq!(em.step().unwrap(), 4);
        assert_eq!(em.pc(), 32);
        assert!(!em.cpu().flag(SREG_I));
        assert!(!irq.is_raised(16));

        em.step().unwrap();
        em.step().unwrap();
        assert_eq!(em.reg(16), 1);
        assert_eq!(em.pc(), 1);
        assert!(em.cpu().flag(SREG_I));
        assert_eq!(em.cpu().sp, 0x04FF);
    }

    #[test]
    fn test_interrupt_masked_by_i_flag() {
        let mut em = mega(&[0x0000, 0x0000]);
        em.interrupts().raise(16);
        em.interrupts().set_enabled(16, true);
        assert_eq!(em.step().unwrap(), 1);
        assert_eq!(em.pc(), 1);
    }

    #[test]
    fn test_diagnostics() {
        // invalid word; LDS R16, $0600; IN R16, $01
        let mut em = mega(&[0xFFFF, 0x9100, 0x0600, 0xB101]);
        em.set_diagnostics(true);
        assert_eq!(em.step().unwrap(), 1);
        em.step().unwrap();
        em.step().unwrap();
        assert_eq!(
            em.take_warnings(),
            vec![
                Warning::InvalidInstruction { pc: 0, word: 0xFFFF },
                Warning::UnmappedAddress { pc: 1, address: 0x0600 },
                Warning::UnmappedPort { pc: 3, bank: 0, index: 0x01 },
            ]
        );
        assert_eq!(em.reg(16), 0);
        assert!(em.take_warnings().is_empty());
    }

    #[test]
    fn test_unavailable_instruction() {
        // MUL R0, R0 on a reduced core
        let mut em = Emulator::new(ChipConfig::attiny10()).unwrap();
        em.write_program(0, &[0x9C00]).unwrap();
        em.set_diagnostics(true);
        assert_eq!(em.step().unwrap(), 1);
        assert_eq!(em.pc(), 1);
        assert!(matches!(
            em.take_warnings().as_slice(),
            [Warning::UnavailableInstruction { instruction: Instruction::MUL, .. }]
        ));
    }

    #[test]
    fn test_warnings_off_by_default() {
        let mut em = mega(&[0xFFFF]);
        em.step().unwrap();
        assert!(em.take_warnings().is_empty());
    }

    struct Constant(u8);

    impl Port for Constant {
        fn read(&mut self) -> u8 {
            self.0
        }
        fn write(&mut self, _value: u8) {}
    }

    #[test]
    fn test_ports_by_name() {
        let mut em = mega(&[]);
        assert!(matches!(
            em.register_port_by_name("PORTZ", Constant(0)),
            Err(Error::UnknownPort { .. })
        ));
        let at = em.register_port_by_name("GPIOR0", Constant(0x5A)).unwrap();
        assert_eq!(at, PortRef::new(0, 0x1E));
        assert_eq!(em.load_byte(0x3E), 0x5A);
        assert!(em.unregister_port_by_name("GPIOR0").unwrap());
        assert!(!em.unregister_port_by_name("GPIOR0").unwrap());
    }

    #[test]
    fn test_sreg_is_a_port() {
        let mut em = mega(&[]);
        em.store_byte(0x5F, 0x81);
        assert!(em.cpu().flag(SREG_I));
        assert_eq!(em.cpu().sreg, 0x81);
    }

    #[test]
    fn test_format_sreg() {
        assert_eq!(format_sreg(0x83), "IthsvnZC");
        assert_eq!(format_sreg(0x00), "ithsvnzc");
    }

    #[test]
    fn test_dump_regs_lists_live_registers() {
        let mut em = Emulator::new(ChipConfig::attiny10()).unwrap();
        em.set_reg(16, 0xAB);
        let dump = em.dump_regs();
        assert!(dump.starts_with("R16=AB "));
        assert!(dump.contains("R31=00"));
        assert!(!dump.contains("R15"));

        let dump = Emulator::new(ChipConfig::atmega88()).unwrap().dump_regs();
        assert!(dump.starts_with("R 0=00 "));
        assert_eq!(dump.lines().take_while(|l| l.starts_with('R')).count(), 4);
    }

    #[test]
    fn test_program_out_of_range() {
        let mut em = Emulator::new(ChipConfig::attiny4()).unwrap();
        let err = em.write_program(250, &[0; 10]).unwrap_err();
        assert!(matches!(err, Error::ProgramOutOfRange { address: 250, len: 10, size: 256 }));
        assert_eq!(em.program().read(250), 0);
    }
}
