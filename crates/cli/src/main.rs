//! armor-flash CLI: apply configuration profiles to the Armor mouse.

use anyhow::{Context, Result};
use armor_flash_core::comm::ErrorClass;
use armor_flash_core::config::{self, AppConfig};
use armor_flash_core::device;
use armor_flash_core::flash::{self, ApplyReport};
use armor_flash_core::macros::{MacroDefinition, MacroSpec};
use armor_flash_core::profile::{self, ConfigurationProfile, ProfileSpec};
use armor_flash_core::safety::BRICKING_DISCLAIMER;
use armor_flash_core::session::DeviceSession;
use armor_flash_core::transport::RecordingTransport;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "armor-flash",
    version,
    about = "Configure and flash the Holtek-based Armor gaming mouse"
)]
struct Cli {
    /// USB vendor ID (hex), overrides the config file.
    #[arg(long, global = true, value_parser = parse_hex_u16)]
    vid: Option<u16>,
    /// USB product ID (hex), overrides the config file.
    #[arg(long, global = true, value_parser = parse_hex_u16)]
    pid: Option<u16>,
    /// JSON file with device and timing settings.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log every frame (same as RUST_LOG=debug).
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List connected mice matching the VID/PID.
    ListDevices,
    /// Unlock the device, flash a profile, commit and reapply runtime values.
    Apply {
        /// Profile JSON file.
        profile: PathBuf,
        /// Print the frames that would be sent without opening the device.
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate a profile file and print its contents.
    Show {
        /// Profile JSON file.
        profile: PathBuf,
    },
    /// Show the last profile applied successfully.
    Current,
    /// Compile a macro JSON file and print the 128-byte blob.
    CompileMacro {
        /// Macro JSON file.
        file: PathBuf,
    },
    /// Write the default profile to a file.
    InitProfile {
        /// Destination path.
        path: PathBuf,
    },
}

fn parse_hex_u16(s: &str) -> std::result::Result<u16, String> {
    let digits = s.trim_start_matches("0x").trim_start_matches("0X");
    u16::from_str_radix(digits, 16).map_err(|e| format!("'{s}' is not a hex u16: {e}"))
}

fn load_app_config(cli: &Cli) -> Result<AppConfig> {
    let mut cfg = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => AppConfig::default(),
    };
    if let Some(vid) = cli.vid {
        cfg.device.vid = vid;
    }
    if let Some(pid) = cli.pid {
        cfg.device.pid = pid;
    }
    debug!(
        vid = format_args!("0x{:04X}", cfg.device.vid),
        pid = format_args!("0x{:04X}", cfg.device.pid),
        post_commit_wait_ms = cfg.timing.post_commit_wait.as_millis() as u64,
        "Configuration loaded"
    );
    Ok(cfg)
}

fn print_profile(profile: &ConfigurationProfile) {
    println!("Profile: {}", profile.name());
    println!("  Polling rate: {}", profile.polling_rate());
    println!("  Debounce: {} ms", profile.debounce().value());
    for (i, (stage, color)) in profile
        .dpi_stages()
        .iter()
        .zip(profile.colors())
        .enumerate()
    {
        println!("  Stage {}: {:>4} DPI  #{color}", i + 1, stage.value());
    }
    let buttons = profile.buttons();
    for (i, (code, action)) in buttons.slots().iter().zip(buttons.actions()).enumerate() {
        if !code.is_unassigned() {
            println!("  Button {:>2}: {action} ({code})", i + 1);
        }
    }
    for m in profile.macros() {
        println!(
            "  Macro {}: {} actions, repeat {}",
            m.slot().number(),
            m.actions().len(),
            m.repeat()
        );
    }
}

fn print_report(report: &ApplyReport) {
    println!(
        "Sent {} frames and {} payloads in {:.1}s",
        report.frames_sent,
        report.payloads_sent,
        report.elapsed.as_secs_f64()
    );
    for clamp in &report.delay_clamps {
        println!(
            "  note: macro action {} delay {} ms clamped to {} ms",
            clamp.index, clamp.requested_ms, clamp.applied_ms
        );
    }
}

fn report_failure(err: &armor_flash_core::error::Error) {
    eprintln!("Device state: {}", err.device_state());
    eprintln!("Hint: {}", ErrorClass::classify(err).hint());
}

fn apply(cfg: &AppConfig, path: &Path, dry_run: bool) -> Result<()> {
    let profile = profile::load_profile(path)
        .with_context(|| format!("load profile {}", path.display()))?;

    if dry_run {
        let mut session = DeviceSession::new(RecordingTransport::new(), cfg.timing);
        let report = flash::apply_profile(&mut session, &profile)?;
        for event in session.into_transport().events() {
            println!("{}", event.describe());
        }
        print_report(&report);
        return Ok(());
    }

    eprintln!("{BRICKING_DISCLAIMER}");
    info!(profile = profile.name(), path = %path.display(), "Applying profile to device");
    let mut session = device::open_session(&cfg.device, cfg.timing).inspect_err(report_failure)?;
    let report = flash::apply_profile(&mut session, &profile).inspect_err(report_failure)?;
    print_report(&report);

    let dir = profile::config_dir()?;
    let saved = profile::save_last_applied(&dir, &profile)?;
    println!("Applied '{}' (recorded in {})", profile.name(), saved.display());
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let cfg = load_app_config(&cli)?;

    match &cli.command {
        Commands::ListDevices => {
            let devices = device::discover_devices(&cfg.device)?;
            if devices.is_empty() {
                println!(
                    "No device found with VID 0x{:04X} PID 0x{:04X}.",
                    cfg.device.vid, cfg.device.pid
                );
                println!("Ensure the mouse is connected and you have access to its hidraw node.");
            } else {
                for dev in &devices {
                    println!(
                        "{} (VID: 0x{:04X}, PID: 0x{:04X}, interface {}, path: {})",
                        dev.product.as_deref().unwrap_or("Armor mouse"),
                        dev.vid,
                        dev.pid,
                        dev.interface_number,
                        dev.path.to_string_lossy()
                    );
                    if let Some(serial) = dev.serial.as_deref().filter(|s| !s.is_empty()) {
                        println!("  serial: {serial}");
                    }
                }
            }
        }
        Commands::Apply { profile, dry_run } => apply(&cfg, profile, *dry_run)?,
        Commands::Show { profile: path } => {
            let profile = profile::load_profile(path)
                .with_context(|| format!("load profile {}", path.display()))?;
            print_profile(&profile);
        }
        Commands::Current => {
            let dir = profile::config_dir()?;
            match profile::read_current_profile(&dir)? {
                Some(profile) => print_profile(&profile),
                None => println!("No profile has been applied from this machine yet."),
            }
        }
        Commands::CompileMacro { file } => {
            let text = std::fs::read_to_string(file)
                .with_context(|| format!("read {}", file.display()))?;
            let spec: MacroSpec = serde_json::from_str(&text)
                .with_context(|| format!("parse {}", file.display()))?;
            let compiled = MacroDefinition::from_spec(&spec)?.compile()?;
            for (i, chunk) in compiled.blob.chunks().enumerate() {
                println!("chunk {i}: {}", armor_flash_core::packet::to_hex(chunk));
            }
            for clamp in &compiled.clamped {
                println!(
                    "note: action {} delay {} ms clamped to {} ms",
                    clamp.index, clamp.requested_ms, clamp.applied_ms
                );
            }
        }
        Commands::InitProfile { path } => {
            profile::save_spec(path, &ProfileSpec::default())?;
            println!("Default profile written to {}", path.display());
        }
    }

    Ok(())
}
