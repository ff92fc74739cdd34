//! Headless Uno monitor.
//!
//! Runs the potentiometer report loop against the simulated board and writes
//! everything the USART puts on the wire to stdout, the way a serial terminal
//! attached to the real board would show it. Diagnostics go to stderr.
//!
//! The `USART_UDRE` handler runs on its own thread, paced at one byte time
//! for the configured baud rate (`--byte-time-us 0` drains instantly).

use std::env;
use std::io::{self, Write};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, error, info, Level};
use uno_telemetry_core::config::flag_value;
use uno_telemetry_core::edge::SwitchEdge;
use uno_telemetry_core::peripherals::ADC_MAX;
use uno_telemetry_core::regs::PB4;
use uno_telemetry_core::{savestate, Board, ConfigError, LineState, MonitorConfig, PotReporter, StateError};

/// Reports produced when `--reports` is not given
const DEFAULT_REPORTS: usize = 20;
/// Pot level when neither `--input` nor `--sweep` is given
const DEFAULT_INPUT: u16 = 600;
/// Start bit + 8 data bits + stop bit
const BITS_PER_FRAME: u64 = 10;

#[derive(Debug, Error)]
enum MonitorError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    State(#[from] StateError),
    #[error("stdout: {0}")]
    Io(#[from] io::Error),
}

fn usage(program: &str) {
    eprintln!("Uno monitor v{} - simulated ATmega328P serial telemetry", env!("CARGO_PKG_VERSION"));
    eprintln!("Usage: {} [options]", program);
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --reports N          Number of reports to produce (default {})", DEFAULT_REPORTS);
    eprintln!("  --input V            Fixed ADC level 0-1023 (default {})", DEFAULT_INPUT);
    eprintln!("  --sweep              Ramp the ADC level from 0 to 1023 across the run");
    eprintln!("  --baud B             Serial rate (default 9600)");
    eprintln!("  --prescale F         ADC clock division: 4, 8, 16, 32, 64 or 128 (default 128)");
    eprintln!("  --channel C          ADC channel 0-7 (default 0)");
    eprintln!("  --threshold T        LED on above T (default 512)");
    eprintln!("  --interval-ms T      Delay between reports (default 50)");
    eprintln!("  --press N            Press the PB4 switch during report N");
    eprintln!("  --byte-time-us U     Wire time per byte (default: from baud rate)");
    eprintln!("  --load-state PATH    Restore a board save state before starting");
    eprintln!("  --save-state PATH    Write a board save state when done");
    eprintln!("  --debug              Verbose diagnostics on stderr");
}

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        usage(&args[0]);
        return;
    }

    let debug = args.iter().any(|a| a == "--debug");
    tracing_subscriber::fmt()
        .with_max_level(if debug { Level::DEBUG } else { Level::INFO })
        .with_writer(io::stderr)
        .init();

    if let Err(e) = run(&args) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: &[String]) -> Result<(), MonitorError> {
    let mut config = MonitorConfig::default();
    config.apply_args(args)?;

    let reports: usize = flag_value(args, "--reports")?.unwrap_or(DEFAULT_REPORTS);
    let sweep = args.iter().any(|a| a == "--sweep");
    let input: Option<u16> = flag_value(args, "--input")?;
    let press: Option<usize> = flag_value(args, "--press")?;
    let byte_time = match flag_value::<u64>(args, "--byte-time-us")? {
        Some(us) => Duration::from_micros(us),
        None => Duration::from_micros(BITS_PER_FRAME * 1_000_000 / config.baud as u64),
    };
    let load_path: Option<String> = flag_value(args, "--load-state")?;
    let save_path: Option<String> = flag_value(args, "--save-state")?;

    let board = Board::new();
    if let Some(ref path) = load_path {
        board.load_state(&savestate::load_from_file(Path::new(path))?);
        info!("Loaded save state {}", path);
    }
    if input.is_some() || load_path.is_none() {
        board.set_adc_input(config.channel, input.unwrap_or(DEFAULT_INPUT).min(ADC_MAX));
    }

    let (mut reporter, drain) = PotReporter::setup(board.clone(), &config)?;
    let mut switch = SwitchEdge::setup(board.clone());
    let isr = board.attach_udre(drain, byte_time);
    debug!(?config, ?byte_time, reports, "Running");

    let mut stdout = io::stdout().lock();
    let mut led = board.led();
    for n in 0..reports {
        if sweep {
            let level = (n as u64 * ADC_MAX as u64 / (reports.max(2) - 1) as u64) as u16;
            board.set_adc_input(config.channel, level);
        }
        board.set_pin_b(PB4, press == Some(n));

        let report = reporter.process();
        if switch.is_rising_edge() {
            info!(report = n + 1, value = report.value, "Switch pressed");
        }
        if report.led != led {
            debug!(report = n + 1, value = report.value, led = report.led, "LED changed");
            led = report.led;
        }

        stdout.write_all(&board.take_wire())?;
        stdout.flush()?;
        thread::sleep(Duration::from_millis(config.interval_ms));
    }

    // Let the interrupt finish what is still queued
    let pending = reporter.transmitter().pending() as u32;
    let deadline = Instant::now() + Duration::from_secs(1) + byte_time * (pending + 1);
    while reporter.transmitter().state() == LineState::Armed && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(1));
    }
    stdout.write_all(&board.take_wire())?;
    stdout.flush()?;
    debug!(interrupts = isr.fired(), conversions = board.adc_conversions(), "Done");
    drop(isr);

    if let Some(ref path) = save_path {
        savestate::save_to_file(&board.save_state(), Path::new(path))?;
        info!("Saved state to {}", path);
    }
    Ok(())
}
