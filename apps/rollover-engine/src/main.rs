//! Rollover Engine Binary
//!
//! Builds continuous futures series from daily snapshots.
//!
//! # Usage
//!
//! ```bash
//! rollover-engine --config config.yaml run
//! rollover-engine --config config.yaml reconcile --label GOLDM
//! rollover-engine --config config.yaml windowed --offset 1
//! rollover-engine --config config.yaml index
//! rollover-engine --config config.yaml show-expiries --rowwise
//! rollover-engine --config config.yaml show-multipliers
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Log filter (overrides `observability.logging.level`)
//! - Any `${VAR}` referenced from the config file

use std::path::Path;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info};

use rollover_engine::application::ports::{RecordSource, SeriesSink};
use rollover_engine::application::use_cases::{
    BuildExpiryIndexUseCase, GapFillPersistedUseCase, LoadArchiveUseCase, RunPassUseCase,
    WindowedPassUseCase,
};
use rollover_engine::config::{Config, PersistenceConfig, SourceConfig, StoreKind, load_config};
use rollover_engine::error::EngineError;
use rollover_engine::infrastructure::flat_file::{FlatFileRecordSource, FlatFileSeriesSink};
use rollover_engine::infrastructure::sqlite::{SqliteRecordSource, SqliteSeriesSink};
use rollover_engine::telemetry::init_telemetry;

#[derive(Parser)]
#[command(
    name = "rollover-engine",
    version,
    about = "Continuous futures contract construction and rollover adjustment",
    propagate_version = true
)]
struct Cli {
    /// Path to the YAML config
    #[arg(long, global = true, default_value = "config.yaml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full selection, reconciliation and adjustment pass
    Run,
    /// Gap-fill the persisted continuous series against the raw snapshots
    Reconcile {
        /// Only these labels (repeatable); all when omitted
        #[arg(long = "label")]
        labels: Vec<String>,
    },
    /// Rebuild fixed-offset series from expiry windows, then gap-fill them
    Windowed {
        /// Trading-day offset before expiry
        #[arg(long, default_value_t = 0)]
        offset: u32,
        /// Skip gap filling
        #[arg(long, default_value_t = false)]
        no_gap_fill: bool,
    },
    /// Rebuild and persist the expiry history
    Index,
    /// Print the persisted expiry history
    ShowExpiries {
        /// One `symbol,expiry,tdm` row per line
        #[arg(long, default_value_t = false)]
        rowwise: bool,
    },
    /// Print each label's rollover multipliers
    ShowMultipliers,
}

fn open_source(config: &SourceConfig) -> Result<Box<dyn RecordSource>, EngineError> {
    let source: Box<dyn RecordSource> = match config.kind {
        StoreKind::FlatFile => Box::new(FlatFileRecordSource::new(&config.path)),
        StoreKind::Sqlite => {
            let instrument = config.instrument_type.clone().unwrap_or_default();
            Box::new(SqliteRecordSource::open(Path::new(&config.path), instrument)?)
        }
    };
    Ok(source)
}

fn open_sink(config: &PersistenceConfig) -> Result<Box<dyn SeriesSink>, EngineError> {
    let sink: Box<dyn SeriesSink> = match config.kind {
        StoreKind::FlatFile => Box::new(FlatFileSeriesSink::new(&config.path)),
        StoreKind::Sqlite => Box::new(SqliteSeriesSink::open(Path::new(&config.path))?),
    };
    Ok(sink)
}

fn run(config: &Config) -> Result<bool, EngineError> {
    let source = open_source(&config.source)?;
    let mut sink = open_sink(&config.persistence)?;
    let options = config.pass_options();

    info!(
        source = source.name(),
        sink = sink.name(),
        policies = ?options.policies,
        "Starting pass"
    );
    let report = RunPassUseCase::new(&*source, &mut *sink).execute(&options)?;

    info!(
        days = report.load.days_loaded,
        errors = report.load.days_failed,
        selected = report.selection.selected,
        none_selected = report.selection.none_selected,
        rollovers = report.selection.rollovers,
        changes = report.changes,
        residual = report.residual_exceptions,
        multipliers = report.multipliers,
        flat = report.flat_multipliers,
        regressions = report.regressions,
        "Pass summary"
    );
    for label in &report.failed_labels {
        error!(label, "Series not written");
    }
    Ok(report.is_clean())
}

fn reconcile(config: &Config, labels: &[String]) -> Result<bool, EngineError> {
    let source = open_source(&config.source)?;
    let mut sink = open_sink(&config.persistence)?;

    let report = GapFillPersistedUseCase::new(&*source, &mut *sink).execute(labels)?;
    info!(
        days = report.load.days_loaded,
        errors = report.load.days_failed,
        groups = report.stats.groups,
        admitted = report.stats.admitted,
        skipped = report.stats.skipped,
        changes = report.changes,
        updated = report.labels_updated.len(),
        "Gap fill summary"
    );
    Ok(report.failed_labels.is_empty() && report.load.days_failed == 0)
}

fn windowed(config: &Config, offset: u32, fill_gaps: bool) -> Result<bool, EngineError> {
    let source = open_source(&config.source)?;
    let mut sink = open_sink(&config.persistence)?;

    let report = WindowedPassUseCase::new(&*source, &mut *sink).execute(
        offset,
        &config.rollover.symbols,
        fill_gaps,
    )?;
    info!(
        days = report.load.days_loaded,
        errors = report.load.days_failed,
        windowed = report.windowed_records,
        admitted = report.gap_fill.as_ref().map_or(0, |s| s.admitted),
        labels = report.labels_persisted,
        "Windowed rebuild summary"
    );
    Ok(report.failed_labels.is_empty() && report.load.days_failed == 0)
}

fn index(config: &Config) -> Result<bool, EngineError> {
    let source = open_source(&config.source)?;
    let mut sink = open_sink(&config.persistence)?;

    let loaded = LoadArchiveUseCase::new(&*source).execute()?;
    let artifacts = BuildExpiryIndexUseCase::new(&mut *sink).execute(&loaded.archive, false)?;
    info!(
        days = loaded.stats.days_loaded,
        errors = loaded.stats.days_failed,
        symbols = artifacts.history.len(),
        built_through = ?artifacts.history.built_through(),
        "Expiry history rebuilt"
    );
    Ok(loaded.stats.days_failed == 0)
}

fn show_expiries(config: &Config, rowwise: bool) -> anyhow::Result<()> {
    let sink = open_sink(&config.persistence)?;
    let Some(history) = sink.read_expiry_history()? else {
        println!("No expiry history stored; run `index` first.");
        return Ok(());
    };

    if rowwise {
        println!("symbol,expiry,tdm");
        for (symbol, expiry) in history.rows() {
            let tdm = history.tdm_at(expiry).map_or_else(String::new, |t| t.to_string());
            println!("{symbol},{expiry},{tdm}");
        }
    } else {
        for symbol in history.symbols() {
            let expiries = history
                .expiries(symbol)
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            println!("{symbol}: {expiries}");
        }
    }
    if let Some(built) = history.built_through() {
        println!("# built through {built}");
    }
    Ok(())
}

fn show_multipliers(config: &Config) -> anyhow::Result<()> {
    let sink = open_sink(&config.persistence)?;
    let Some(table) = sink.read_multiplier_table()? else {
        println!("No multipliers stored; run `run` first.");
        return Ok(());
    };

    for label in table.labels() {
        println!("{label}");
        for (date, ratio) in table.multipliers(label) {
            println!("  {date}  {ratio:.6}");
        }
    }
    Ok(())
}

fn dispatch(cli: &Cli, config: &Config) -> anyhow::Result<bool> {
    let clean = match &cli.command {
        Commands::Run => run(config)?,
        Commands::Reconcile { labels } => reconcile(config, labels)?,
        Commands::Windowed {
            offset,
            no_gap_fill,
        } => windowed(config, *offset, !no_gap_fill)?,
        Commands::Index => index(config)?,
        Commands::ShowExpiries { rowwise } => {
            show_expiries(config, *rowwise)?;
            true
        }
        Commands::ShowMultipliers => {
            show_multipliers(config)?;
            true
        }
    };
    Ok(clean)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(Some(cli.config.as_str()))
        .with_context(|| format!("loading {}", cli.config))
    {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e:#}");
            return ExitCode::FAILURE;
        }
    };
    let _telemetry = init_telemetry(&config.observability.logging);

    match dispatch(&cli, &config) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => {
            error!("Completed with errors; see log for details");
            ExitCode::from(2)
        }
        Err(e) => {
            error!(error = %e, "Command failed");
            ExitCode::FAILURE
        }
    }
}
