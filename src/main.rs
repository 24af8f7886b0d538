//! ZK Attendance Report - attendance summaries from ZKTeco terminal punches.

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use chrono::{NaiveDate, NaiveTime};
use clap::{Parser, Subcommand};
use zk_attendance_report as app;

use app::config::{AppConfig, ConfigLoadResult};
use app::export::{ExportFormat, export_report};
use app::models::{AttendanceReport, AttendanceSettings, parse_clock};
use app::service::{DateWindow, ReportService};
use app::source::{DeviceSource, FileSource};

/// Attendance reports from ZKTeco biometric terminals.
#[derive(Parser)]
#[command(name = "zk-attendance-report", version)]
struct Cli {
    /// Use config.toml from current directory (dev mode)
    #[arg(long, global = true)]
    dev: bool,

    /// Explicit config file path
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Build the attendance report and export it
    Report(ReportArgs),
    /// List users enrolled on the terminal
    Users,
    /// Check that the terminal is reachable and speaks the protocol
    Diagnose,
}

#[derive(clap::Args)]
struct ReportArgs {
    /// Read punches from an ATTLOG text dump instead of the terminal
    #[arg(long, value_name = "ATTLOG")]
    file: Option<PathBuf>,

    /// Users CSV (user_id,name) for names when reading from a file
    #[arg(long, value_name = "CSV", requires = "file")]
    users: Option<PathBuf>,

    /// Office start time (HH:MM)
    #[arg(long, value_parser = clock_arg)]
    office_start: Option<NaiveTime>,

    /// Office end time (HH:MM)
    #[arg(long, value_parser = clock_arg)]
    office_end: Option<NaiveTime>,

    /// Grace period in minutes
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..=1440))]
    grace: Option<u32>,

    /// First calendar date to include (YYYY-MM-DD)
    #[arg(long)]
    since: Option<NaiveDate>,

    /// Last calendar date to include (YYYY-MM-DD)
    #[arg(long)]
    until: Option<NaiveDate>,

    /// Output directory
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Export formats (repeatable); defaults to the config
    #[arg(long = "format", value_enum)]
    formats: Vec<ExportFormat>,

    /// Print the summary without writing files
    #[arg(long)]
    no_export: bool,

    /// Play the terminal's "thank you" prompt after exporting
    #[arg(long, conflicts_with = "file")]
    announce: bool,
}

fn clock_arg(s: &str) -> Result<NaiveTime, String> {
    parse_clock(s).ok_or_else(|| format!("'{s}' is not a time of day (expected HH:MM)"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Determine config path based on mode
    let config_path = match (&cli.config, cli.dev) {
        (Some(path), _) => path.clone(),
        (None, true) => PathBuf::from("config.toml"),
        (None, false) => AppConfig::default_path(),
    };

    if let Command::Init { force } = cli.command {
        return init_config(&config_path, force);
    }

    let needs_device = match &cli.command {
        Command::Report(args) => args.file.is_none(),
        _ => true,
    };

    let config = match AppConfig::try_load(&config_path) {
        ConfigLoadResult::Loaded(config) => config,
        ConfigLoadResult::Missing if !needs_device => AppConfig::default(),
        ConfigLoadResult::Missing => bail!(
            "Config not found at {}; run `zk-attendance-report init` first",
            config_path.display()
        ),
        ConfigLoadResult::Invalid(e) => bail!("Config {} is invalid: {e}", config_path.display()),
    };

    let _log_guard = app::logging::init(&config.logging);
    tracing::info!("ZK Attendance Report starting...");
    tracing::info!("Config path: {:?}", config_path);

    match cli.command {
        Command::Init { .. } => Ok(()),
        Command::Report(args) => run_report(&config, args).await,
        Command::Users => list_users(&config).await,
        Command::Diagnose => {
            let diagnosis = DeviceSource::new(config.device.clone()).diagnose().await;
            print!("{diagnosis}");
            if !diagnosis.protocol_ok {
                bail!("Device at {}:{} is not usable", config.device.ip, config.device.port);
            }
            Ok(())
        }
    }
}

fn init_config(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    AppConfig::default()
        .save(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Wrote default config to {}", path.display());
    Ok(())
}

async fn run_report(config: &AppConfig, args: ReportArgs) -> anyhow::Result<()> {
    let settings = AttendanceSettings {
        office_start: args.office_start.unwrap_or(config.attendance.office_start),
        office_end: args.office_end.unwrap_or(config.attendance.office_end),
        grace_period_minutes: args.grace.unwrap_or(config.attendance.grace_period_minutes),
    };
    let window = DateWindow::new(args.since, args.until);
    if let (Some(since), Some(until)) = (window.since, window.until) {
        if since > until {
            bail!("--since {since} is after --until {until}");
        }
    }

    let overrides = config.directory.parsed();
    let report = match &args.file {
        Some(file) => {
            let source = FileSource::new(file, args.users.clone());
            ReportService::new(source)
                .with_overrides(overrides)
                .generate(&settings, window)
                .await?
        }
        None => {
            let source = DeviceSource::new(config.device.clone());
            ReportService::new(source)
                .with_overrides(overrides)
                .generate(&settings, window)
                .await
                .with_context(|| format!("Could not read from device at {}:{}", config.device.ip, config.device.port))?
        }
    };

    print_summary(&report);

    if args.no_export {
        return Ok(());
    }

    let output_dir = args.output.unwrap_or_else(|| config.export.output_dir.clone());
    let formats = if args.formats.is_empty() {
        config.export.formats.clone()
    } else {
        args.formats
    };
    let written = export_report(&report, &output_dir, &formats)
        .with_context(|| format!("Failed to export to {}", output_dir.display()))?;
    for path in &written {
        println!("Saved {}", path.display());
    }

    if args.announce {
        // Best effort once the files are written
        if let Err(e) = DeviceSource::new(config.device.clone()).announce().await {
            tracing::warn!("Voice prompt failed: {e}");
        }
    }

    Ok(())
}

fn print_summary(report: &AttendanceReport) {
    if report.is_empty() {
        println!("No attendance records found.");
        return;
    }

    println!(
        "{:<28} {:<24} {:>7}  {:<5} {:<5} {:<8} {:<8}",
        "Date", "Name", "Punches", "Late", "Early", "First", "Last"
    );
    for row in &report.summary {
        println!(
            "{:<28} {:<24} {:>7}  {:<5} {:<5} {:<8} {:<8}",
            row.date,
            row.name,
            row.punch_count,
            if row.is_late_arrival { "yes" } else { "no" },
            if row.is_early_departure { "yes" } else { "no" },
            row.first_punch,
            row.last_punch
        );
    }

    let meta = &report.metadata;
    println!();
    println!(
        "{} records, {} employees, {} to {}",
        meta.total_records,
        meta.total_employees,
        meta.date_range.start.as_deref().unwrap_or("-"),
        meta.date_range.end.as_deref().unwrap_or("-")
    );
    if meta.skipped_records > 0 {
        println!("{} malformed punches skipped", meta.skipped_records);
    }
}

async fn list_users(config: &AppConfig) -> anyhow::Result<()> {
    let users = DeviceSource::new(config.device.clone())
        .users()
        .await
        .with_context(|| format!("Could not read users from {}:{}", config.device.ip, config.device.port))?;

    let overrides = config.directory.parsed();
    println!("{:>5}  {:<10} {:<24} {:>9}", "UID", "User ID", "Name", "Privilege");
    for user in &users {
        let name = overrides.get(&user.directory_id()).unwrap_or(&user.name);
        println!("{:>5}  {:<10} {:<24} {:>9}", user.uid, user.user_id, name, user.privilege);
    }
    println!("{} users", users.len());
    Ok(())
}
