//! Command-line AVR emulator.
//!
//! Loads an Intel HEX program onto a built-in chip, wires GPIO port B and
//! Timer/Counter 0, and runs the clock for a number of batches.

use std::cell::RefCell;
use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;

use clap::{ArgAction, Parser};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use avrem_core::peripherals::{Gpio, OutputPin, Timer};
use avrem_core::{ChipConfig, Clock, Emulator, Error};

#[derive(Parser, Debug)]
#[command(name = "avrem", version)]
#[command(about = "Cycle-counting AVR microcontroller emulator", long_about = None)]
struct Args {
    /// Intel HEX program to load
    program: PathBuf,

    /// Target chip (atmega48, atmega88, atmega168, atmega2560, attiny4/5/9/10)
    #[arg(long, default_value = "atmega168")]
    chip: String,

    /// Number of batches to run
    #[arg(long, default_value_t = 100)]
    batches: u64,

    /// Clock ticks per batch
    #[arg(long, default_value_t = 160_000)]
    batch_ticks: u64,

    /// Throttle to this clock frequency in MHz (0 runs as fast as possible)
    #[arg(long, default_value_t = 0.0)]
    freq: f64,

    /// Report invalid instructions and unmapped accesses
    #[arg(long, action = ArgAction::SetTrue)]
    warnings: bool,

    /// Port B pin with an LED; level changes are logged
    #[arg(long)]
    led: Option<u8>,

    /// Write a save state here after the run
    #[arg(long)]
    save_state: Option<PathBuf>,

    /// More logging (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

struct Led {
    pin: u8,
    toggles: u64,
}

impl OutputPin for Led {
    fn changed(&mut self, pin: u8, high: bool) {
        if pin == self.pin {
            self.toggles += 1;
            info!(pin, on = high, toggles = self.toggles, "LED");
        }
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn run(args: &Args) -> Result<(), Error> {
    let chip = ChipConfig::by_name(&args.chip).ok_or_else(|| Error::InvalidChip {
        chip: args.chip.clone(),
        reason: format!("unknown chip; expected one of {}", ChipConfig::NAMES.join(", ")),
    })?;

    let mut em = Emulator::new(chip)?;
    em.set_diagnostics(args.warnings);
    let text = std::fs::read_to_string(&args.program)?;
    let size = avrem_core::hex::load_hex(&mut em, &text)?;
    info!(bytes = size, program = %args.program.display(), chip = %em.chip().label, "loaded");

    let gpio = Gpio::attach(&mut em, 'B')?;
    if let Some(pin) = args.led {
        gpio.borrow_mut().add_output(Box::new(Led { pin, toggles: 0 }));
    }
    let timer = match Timer::attach(&mut em, 0) {
        Ok(t) => Some(t),
        Err(e @ (Error::UnknownVector { .. } | Error::UnknownPort { .. })) => {
            warn!("timer 0 not available: {}", e);
            None
        }
        Err(e) => return Err(e),
    };

    let em = Rc::new(RefCell::new(em));
    let mut clock = Clock::new();
    clock.add(em.clone());
    if let Some(t) = timer {
        clock.add(t);
    }

    let freq_hz = args.freq * 1e6;
    let mut result = Ok(());
    for batch in 0..args.batches {
        if let Err(e) = clock.run(args.batch_ticks) {
            error!(batch, "{}", e);
            result = Err(e);
            break;
        }
        if batch % 10 == 9 {
            clock.log_frequency();
        }
        clock.throttle(freq_hz);
    }

    let em = em.borrow();
    println!("{}", em.dump_regs());
    if let Some(path) = &args.save_state {
        em.save_state().save_to_file(path)?;
        info!(path = %path.display(), "state saved");
    }
    result
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
