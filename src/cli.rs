//! The command line interface for the simulation.
use crate::input::load_model;
use crate::log;
use crate::output::{DataWriter, create_output_directory, get_output_dir, write_optima};
use crate::settings::Settings;
use crate::site_vector::CancelFlag;
use ::log::{info, warn};
use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use std::io;
use std::path::{Path, PathBuf};

pub mod demo;
use demo::DemoSubcommands;
pub mod settings;
use settings::SettingsSubcommands;

/// The command line interface for the simulation.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// The available commands.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Options for the run command
#[derive(Args, Default)]
pub struct RunOpts {
    /// Directory for output files
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
    /// Whether to overwrite the output directory if it already exists
    #[arg(long)]
    pub overwrite: bool,
}

/// The available commands.
#[derive(Subcommand)]
enum Commands {
    /// Run a simulation model.
    Run {
        /// Path to the model directory.
        model_dir: PathBuf,
        /// Other run options
        #[command(flatten)]
        opts: RunOpts,
    },
    /// Validate a model.
    Validate {
        /// The path to the model directory.
        model_dir: PathBuf,
    },
    /// Calculate the optimum of every association in a model.
    Optima {
        /// The path to the model directory.
        model_dir: PathBuf,
    },
    /// Manage bundled demo models.
    Demo {
        /// The available subcommands for managing demo models.
        #[command(subcommand)]
        subcommand: DemoSubcommands,
    },
    /// Manage program settings.
    Settings {
        /// The available subcommands for managing settings.
        #[command(subcommand)]
        subcommand: SettingsSubcommands,
    },
}

impl Commands {
    /// Execute the supplied CLI command
    fn execute(self) -> Result<()> {
        match self {
            Self::Run { model_dir, opts } => handle_run_command(&model_dir, &opts, None),
            Self::Validate { model_dir } => handle_validate_command(&model_dir, None),
            Self::Optima { model_dir } => handle_optima_command(&model_dir, None),
            Self::Demo { subcommand } => subcommand.execute(),
            Self::Settings { subcommand } => subcommand.execute(),
        }
    }
}

/// Parse CLI arguments and start BERN
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        // Output program help
        let help_str = Cli::command().render_long_help().to_string();
        println!("{help_str}");
        return Ok(());
    };

    command.execute()
}

/// Load program settings, if not provided
fn load_settings(settings: Option<Settings>) -> Result<Settings> {
    match settings {
        Some(settings) => Ok(settings),
        None => Settings::load().context("Failed to load settings."),
    }
}

/// Initialise the program logger, unless this has already happened
fn init_logger(settings: &Settings, log_file_path: Option<&Path>) -> Result<()> {
    if log::is_logger_initialised() {
        return Ok(());
    }

    log::init(&settings.log_level, log_file_path).context("Failed to initialise logging.")
}

/// Handle the `run` command.
pub fn handle_run_command(
    model_path: &Path,
    opts: &RunOpts,
    settings: Option<Settings>,
) -> Result<()> {
    let settings = load_settings(settings)?;

    let output_path = match &opts.output_dir {
        Some(dir) => dir.clone(),
        None => get_output_dir(model_path, &settings.results_root)?,
    };
    let output_path = output_path.as_path();

    // The overwrite setting can be enabled by command-line argument
    let overwrite = create_output_directory(output_path, opts.overwrite || settings.overwrite)
        .with_context(|| {
            format!(
                "Failed to create output directory: {}",
                output_path.display()
            )
        })?;

    init_logger(&settings, Some(output_path))?;

    // Load the model to run
    let mut site_vector = load_model(model_path).context("Failed to load model.")?;
    info!("Loaded model from {}", model_path.display());
    info!("Output folder: {}", output_path.display());

    // NB: We have to wait until the logger is initialised to display this warning
    if overwrite {
        warn!("Output folder was overwritten");
    }

    // Run the simulation
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(settings.num_threads)
        .build()
        .context("Failed to create thread pool.")?;
    pool.install(|| site_vector.run_configured(&CancelFlag::new()))
        .context("Simulation failed.")?;

    let mut writer = DataWriter::create(output_path)?;
    writer.write_results(&site_vector)?;
    writer.flush()?;
    info!("Simulation complete!");

    Ok(())
}

/// Handle the `validate` command.
pub fn handle_validate_command(model_path: &Path, settings: Option<Settings>) -> Result<()> {
    let settings = load_settings(settings)?;

    // We won't save log files when running the validate command
    init_logger(&settings, None)?;

    // Load/validate the model
    load_model(model_path).context("Failed to validate model.")?;
    info!("Model validation successful!");

    Ok(())
}

/// Handle the `optima` command.
///
/// The optima are written to stdout as CSV.
pub fn handle_optima_command(model_path: &Path, settings: Option<Settings>) -> Result<()> {
    let settings = load_settings(settings)?;
    init_logger(&settings, None)?;

    let site_vector = load_model(model_path).context("Failed to load model.")?;
    let catalog = site_vector.catalog();
    let optima = catalog.calculate_optima(site_vector.parameters().gamma);
    write_optima(io::stdout().lock(), catalog, &optima)?;

    Ok(())
}
