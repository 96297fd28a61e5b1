//! Mound Controller: Main Entry Point
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  SerialDevice      LogSink        PumpDriver    SystemClock    │
//! │  (DeviceSession)   (RecordSink)   (Actuator)    (Clock)        │
//! │  JsonConfigFile    ShutdownSignal (OS signals)                 │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │          PumpController (pure logic)                   │    │
//! │  │  FSM · PollingCycleManagers · WatchedValue             │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Subcommands: `run` (the controller), `pump-test`, `aggregate`, `names`.

// ── Imports ───────────────────────────────────────────────────
use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use log::{info, warn};

use moundctl::adapters::config_file::JsonConfigFile;
use moundctl::adapters::gpio::{MemoryPin, SysfsPin};
use moundctl::adapters::log_sink::LogSink;
use moundctl::adapters::serial;
use moundctl::adapters::time::SystemClock;
use moundctl::aggregate::{AggregateOptions, Aggregation, Granularity};
use moundctl::app::controller::{ControllerSettings, PumpController};
use moundctl::app::ports::{ActuatorPort, Clock, ConfigPort, RecordSink};
use moundctl::config::ControllerConfig;
use moundctl::discovery::{self, DeviceSets};
use moundctl::drivers::pump::PumpDriver;
use moundctl::logging::{self, Verbosity};
use moundctl::sensors::names::{self, SensorKind};
use moundctl::shutdown::ShutdownSignal;

// ── CLI ───────────────────────────────────────────────────────

#[derive(Debug, Parser)]
#[command(name = "moundctl", version, about = "Compost mound pump controller")]
struct Cli {
    /// Debug-level diagnostics.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Errors only.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// JSON config file; missing fields take defaults.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the pump controller until SIGINT/SIGTERM.
    Run {
        /// Data log path (overrides the config file).
        #[arg(long)]
        log_path: Option<PathBuf>,

        /// Drive an in-memory pin instead of GPIO.
        #[arg(long)]
        dry_run: bool,
    },

    /// Toggle the pump on and off to check the wiring.
    PumpTest {
        /// Seconds in each state.
        #[arg(long, default_value_t = 15)]
        period_secs: u64,

        /// Stop after this many on/off cycles (default: until interrupted).
        #[arg(long)]
        cycles: Option<u32>,

        #[arg(long)]
        dry_run: bool,
    },

    /// Average a data log into per-minute or per-day CSV.
    Aggregate {
        /// Data log to read; `-` or omitted reads stdin.
        input: Option<PathBuf>,

        /// CSV destination; omitted writes stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Bucket size: `minute` or `day`.
        #[arg(long, default_value = "minute")]
        by: Granularity,

        /// First accepted year.
        #[arg(long)]
        from_year: Option<u16>,

        /// Last accepted year.
        #[arg(long)]
        to_year: Option<u16>,

        /// Replace sensor ids with names from this table (DS18B20, BME280, Si7021).
        #[arg(long)]
        names: Option<SensorKind>,
    },

    /// Show the sensor name table, or look up one id.
    Names {
        /// Sensor family; all families when omitted.
        kind: Option<SensorKind>,

        /// Look up a single sensor id.
        #[arg(long, requires = "kind")]
        id: Option<String>,
    },
}

// ── Entry point ───────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(Verbosity::from_flags(cli.verbose, cli.quiet));

    match cli.command {
        Command::Run { log_path, dry_run } => {
            let mut cfg = load_config(cli.config)?;
            if let Some(path) = log_path {
                cfg.log_path = path;
            }
            run(&cfg, dry_run)
        }
        Command::PumpTest {
            period_secs,
            cycles,
            dry_run,
        } => {
            let cfg = load_config(cli.config)?;
            pump_test(&cfg, Duration::from_secs(period_secs), cycles, dry_run)
        }
        Command::Aggregate {
            input,
            output,
            by,
            from_year,
            to_year,
            names,
        } => {
            let years = match (from_year, to_year) {
                (None, None) => None,
                (from, to) => Some(from.unwrap_or(0)..=to.unwrap_or(u16::MAX)),
            };
            let options = AggregateOptions {
                granularity: by,
                years,
                names,
            };
            aggregate(input, output, options)
        }
        Command::Names { kind, id } => {
            print_names(kind, id.as_deref());
            Ok(())
        }
    }
}

fn load_config(path: Option<PathBuf>) -> Result<ControllerConfig> {
    let source = JsonConfigFile::new(path);
    source.load().with_context(|| match source.path() {
        Some(p) => format!("loading config {}", p.display()),
        None => "validating default config".to_string(),
    })
}

// ── run ───────────────────────────────────────────────────────

fn run(cfg: &ControllerConfig, dry_run: bool) -> Result<()> {
    info!("moundctl {} starting", env!("CARGO_PKG_VERSION"));

    let shutdown = Arc::new(ShutdownSignal::new());
    shutdown
        .register_signals()
        .context("registering signal handlers")?;
    let clock = Arc::new(SystemClock::new(Arc::clone(&shutdown)));

    let devices = serial::open_all(cfg);
    if devices.is_empty() {
        bail!("no serial devices match {:?}", cfg.device_patterns);
    }
    // Opening the port resets the microcontrollers.
    if !clock.sleep(cfg.device_reset()) {
        return Ok(());
    }
    let sets = discovery::discover(devices, &cfg.watched_sensor_id)
        .context("assigning watched and monitored devices")?;

    let sink = Arc::new(
        LogSink::open(&cfg.log_path)
            .with_context(|| format!("opening data log {}", cfg.log_path.display()))?,
    );

    let outcome = if dry_run {
        let pin = MemoryPin::new(!cfg.pump_active_low);
        let pump = PumpDriver::new(pin, cfg.pump_active_low).context("dry-run pin")?;
        warn!("dry run: pump GPIO is not driven");
        control(cfg, pump, sets, sink.clone(), clock)
    } else {
        let pin = SysfsPin::export(cfg.pump_gpio)
            .with_context(|| format!("acquiring pump GPIO {}", cfg.pump_gpio))?;
        let pump = PumpDriver::new(pin, cfg.pump_active_low)
            .with_context(|| format!("switching pump GPIO {} off", cfg.pump_gpio))?;
        control(cfg, pump, sets, sink.clone(), clock)
    };

    let written = sink.close();
    info!("data log closed, {written} record(s) written this run");
    shutdown.stop_signal_listener();
    outcome
}

fn control<A: ActuatorPort>(
    cfg: &ControllerConfig,
    actuator: A,
    sets: DeviceSets,
    sink: Arc<LogSink>,
    clock: Arc<SystemClock>,
) -> Result<()> {
    let sink: Arc<dyn RecordSink> = sink;
    let mut controller =
        PumpController::new(ControllerSettings::from(cfg), actuator, sets, sink, clock);
    controller.run().context("pump controller")?;
    Ok(())
}

// ── pump-test ─────────────────────────────────────────────────

fn pump_test(
    cfg: &ControllerConfig,
    period: Duration,
    cycles: Option<u32>,
    dry_run: bool,
) -> Result<()> {
    let shutdown = Arc::new(ShutdownSignal::new());
    shutdown
        .register_signals()
        .context("registering signal handlers")?;
    let clock = SystemClock::new(Arc::clone(&shutdown));

    let completed = if dry_run {
        let pump = PumpDriver::new(MemoryPin::new(true), cfg.pump_active_low)
            .context("dry-run pin")?;
        toggle(pump, &clock, period, cycles)
    } else {
        let pin = SysfsPin::export(cfg.pump_gpio)
            .with_context(|| format!("acquiring pump GPIO {}", cfg.pump_gpio))?;
        let pump = PumpDriver::new(pin, cfg.pump_active_low)
            .with_context(|| format!("switching pump GPIO {} off", cfg.pump_gpio))?;
        toggle(pump, &clock, period, cycles)
    };

    info!("pump test finished after {completed} cycle(s), pump off");
    shutdown.stop_signal_listener();
    Ok(())
}

/// Alternate on/off every `period`.  The driver is dropped on return,
/// which leaves the pump off.
fn toggle<A: ActuatorPort>(
    mut pump: A,
    clock: &impl Clock,
    period: Duration,
    cycles: Option<u32>,
) -> u32 {
    let mut completed = 0;
    while cycles.is_none_or(|n| completed < n) {
        pump.pump_on();
        info!("pump on");
        if !clock.sleep(period) {
            break;
        }
        pump.pump_off();
        info!("pump off");
        if !clock.sleep(period) {
            break;
        }
        completed += 1;
    }
    pump.pump_off();
    completed
}

// ── aggregate ─────────────────────────────────────────────────

fn aggregate(
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    options: AggregateOptions,
) -> Result<()> {
    let mut agg = Aggregation::new(options);
    match input.filter(|p| p.as_os_str() != "-") {
        Some(path) => {
            let file =
                File::open(&path).with_context(|| format!("opening {}", path.display()))?;
            agg.read_from(BufReader::new(file))
                .with_context(|| format!("reading {}", path.display()))?;
        }
        None => agg.read_from(io::stdin().lock()).context("reading stdin")?,
    }
    info!(
        "{} reading(s) aggregated, {} line(s) skipped",
        agg.accepted(),
        agg.skipped()
    );

    match output {
        Some(path) => {
            let file =
                File::create(&path).with_context(|| format!("creating {}", path.display()))?;
            agg.write_csv(BufWriter::new(file))
                .with_context(|| format!("writing {}", path.display()))?;
        }
        None => agg.write_csv(io::stdout().lock()).context("writing stdout")?,
    }
    Ok(())
}

// ── names ─────────────────────────────────────────────────────

fn print_names(kind: Option<SensorKind>, id: Option<&str>) {
    if let (Some(kind), Some(id)) = (kind, id) {
        let name = names::name_for(kind, id);
        println!("{name} {}", names::color_for(&name));
        return;
    }
    let kinds = kind.map_or_else(|| SensorKind::ALL.to_vec(), |k| vec![k]);
    for kind in kinds {
        for (id, name) in names::entries(kind) {
            println!("{kind} {id} {name} {}", names::color_for(name));
        }
    }
}
