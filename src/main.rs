// file: src/main.rs
// description: commandline application entry point with command handling
// reference: application bootstrap and orchestration

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use neronet::utils::logging::{format_error, format_state, format_success, format_warning};
use neronet::{
    ConditionMonitor, Config, DefinitionParser, ExperimentState, ExperimentStore, OutputReader,
    PlotRenderer, PlotterRegistry, ProcessorRegistry, StatusReport, Validator,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "neronet")]
#[command(version)]
#[command(about = "Define, track and monitor computational experiments", long_about = None)]
struct Cli {
    #[arg(
        short,
        long,
        value_name = "FILE",
        env = "NERONET_CONFIG",
        default_value = "config/default.toml"
    )]
    config: PathBuf,

    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    color: bool,

    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add the experiments defined in a folder's config file
    Specify {
        folder: PathBuf,
    },

    /// Show all experiments, or the details of one
    Status {
        id: Option<String>,
    },

    /// Print the command line that runs an experiment
    Callstring {
        id: String,
    },

    /// Record a new state for an experiment
    State {
        id: String,
        state: String,
    },

    /// Check a log file against an experiment's conditions
    Monitor {
        id: String,

        #[arg(long, value_name = "FILE")]
        log: PathBuf,
    },

    /// Print the data read from an output file
    Output {
        id: String,
        file: String,

        #[arg(short, long)]
        pretty: bool,
    },

    /// Render one plot, or every plot of an experiment
    Plot {
        id: String,
        name: Option<String>,
    },

    /// Copy an experiment definition under a new id
    Duplicate {
        id: String,
        new_id: String,
    },

    /// Remove an experiment from the database
    Delete {
        id: String,

        #[arg(long)]
        confirm: bool,
    },

    /// Show or clear the warnings of an experiment
    Warnings {
        id: String,

        #[arg(long)]
        clear: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    neronet::utils::logging::init_logger(cli.color, cli.verbose);
    if !cli.color {
        colored::control::set_override(false);
    }

    let config = if cli.config.exists() {
        Config::load(Some(cli.config.as_path())).context("Failed to load configuration")?
    } else {
        warn!(
            "Config file {} not found, using default configuration",
            cli.config.display()
        );
        Config::default_config()
    };

    let mut store = ExperimentStore::open(config.storage.database_path())
        .await
        .context("Failed to open experiment database")?;

    match cli.command {
        Commands::Specify { folder } => cmd_specify(&config, &mut store, folder).await?,
        Commands::Status { id } => cmd_status(&config, &store, id.as_deref())?,
        Commands::Callstring { id } => {
            let experiment = store.get(&id)?;
            println!("{}", experiment.callstring()?);
        }
        Commands::State { id, state } => cmd_state(&mut store, &id, &state).await?,
        Commands::Monitor { id, log } => cmd_monitor(&config, &mut store, &id, log).await?,
        Commands::Output { id, file, pretty } => {
            cmd_output(&config, &store, &id, &file, pretty)?
        }
        Commands::Plot { id, name } => cmd_plot(&config, &store, &id, name.as_deref())?,
        Commands::Duplicate { id, new_id } => cmd_duplicate(&mut store, &id, &new_id).await?,
        Commands::Delete { id, confirm } => cmd_delete(&mut store, &id, confirm).await?,
        Commands::Warnings { id, clear } => cmd_warnings(&mut store, &id, clear).await?,
    }

    Ok(())
}

fn output_reader(config: &Config) -> OutputReader {
    OutputReader::new(
        Arc::new(ProcessorRegistry::default()),
        config.storage.data_dir.clone(),
    )
}

async fn cmd_specify(config: &Config, store: &mut ExperimentStore, folder: PathBuf) -> Result<()> {
    let folder = folder
        .canonicalize()
        .with_context(|| format!("Cannot resolve folder {}", folder.display()))?;
    let parser = DefinitionParser::new(&config.definitions);
    let experiments = parser
        .parse_folder(&folder)
        .context("Failed to read experiment definitions")?;

    let mut added = 0;
    for experiment in experiments {
        let id = experiment.id.clone();
        match store.insert(experiment) {
            Ok(()) => {
                added += 1;
                println!("{}", format_success(&format!("Defined {}", id)));
            }
            Err(e) => println!("{}", format_error(&e.to_string())),
        }
    }

    store.save().await.context("Failed to save experiment database")?;
    info!("Added {} experiments from {}", added, folder.display());
    Ok(())
}

fn cmd_status(config: &Config, store: &ExperimentStore, id: Option<&str>) -> Result<()> {
    let reader = output_reader(config);

    if let Some(id) = id {
        let experiment = store.get(id)?;
        print!("{}", StatusReport::new(&reader).render(experiment));
        return Ok(());
    }

    if store.is_empty() {
        println!("No experiments defined. Use `neronet specify <folder>` first.");
        return Ok(());
    }

    for (collection, experiments) in store.by_collection() {
        println!("{}", collection);
        for experiment in experiments {
            let line = format!("  {} {}", experiment.id, format_state(experiment.state()));
            if experiment.has_warnings() {
                println!("{} {}", line, format_warning("WARNING"));
            } else {
                println!("{}", line);
            }
        }
    }
    Ok(())
}

async fn cmd_state(store: &mut ExperimentStore, id: &str, state: &str) -> Result<()> {
    let state: ExperimentState = state.parse()?;
    let experiment = store.get_mut(id)?;
    experiment.update_state(state);
    println!("{}", format_success(&StatusReport::summary_line(experiment)));
    store.save().await.context("Failed to save experiment database")?;
    Ok(())
}

async fn cmd_monitor(
    config: &Config,
    store: &mut ExperimentStore,
    id: &str,
    log: PathBuf,
) -> Result<()> {
    Validator::validate_file_path(&log)?;
    let file = tokio::fs::File::open(&log)
        .await
        .with_context(|| format!("Failed to open log {}", log.display()))?;

    let monitor = ConditionMonitor::new(&config.monitor);
    let experiment = store.get_mut(id)?;
    let report = monitor.watch(experiment, BufReader::new(file)).await?;

    match &report.killed_by {
        Some(condition) => println!(
            "{}",
            format_error(&format!("{} terminated by condition '{}'", id, condition))
        ),
        None if report.warnings_raised > 0 => println!(
            "{}",
            format_warning(&format!("{} raised {} warnings", id, report.warnings_raised))
        ),
        None => println!(
            "{}",
            format_success(&format!("{}: {} lines, no conditions met", id, report.lines_read))
        ),
    }

    store.save().await.context("Failed to save experiment database")?;
    Ok(())
}

fn cmd_output(config: &Config, store: &ExperimentStore, id: &str, file: &str, pretty: bool) -> Result<()> {
    let experiment = store.get(id)?;
    let data = output_reader(config).read(experiment, file)?;
    let text = if pretty {
        serde_json::to_string_pretty(&data)?
    } else {
        serde_json::to_string(&data)?
    };
    println!("{}", text);
    Ok(())
}

fn cmd_plot(config: &Config, store: &ExperimentStore, id: &str, name: Option<&str>) -> Result<()> {
    let experiment = store.get(id)?;
    let renderer = PlotRenderer::new(output_reader(config), Arc::new(PlotterRegistry::default()));

    let written = match name {
        Some(name) => vec![renderer.plot(experiment, name, None)?.0],
        None => renderer.plot_outputs(experiment)?,
    };

    if written.is_empty() {
        println!("{}", format_warning(&format!("{} defines no plots", id)));
    }
    for path in written {
        println!("{}", format_success(&format!("Wrote {}", path.display())));
    }
    Ok(())
}

async fn cmd_duplicate(store: &mut ExperimentStore, id: &str, new_id: &str) -> Result<()> {
    Validator::validate_experiment_id(new_id)?;
    let copy = store.get(id)?.duplicate(new_id);
    store.insert(copy)?;
    store.save().await.context("Failed to save experiment database")?;
    println!("{}", format_success(&format!("Duplicated {} as {}", id, new_id)));
    Ok(())
}

async fn cmd_delete(store: &mut ExperimentStore, id: &str, confirm: bool) -> Result<()> {
    if !confirm {
        println!(
            "{}",
            format_warning(&format!("This deletes {}. Use --confirm to proceed", id))
        );
        return Ok(());
    }

    store.remove(id)?;
    store.save().await.context("Failed to save experiment database")?;
    println!("{}", format_success(&format!("Deleted {}", id)));
    Ok(())
}

async fn cmd_warnings(store: &mut ExperimentStore, id: &str, clear: bool) -> Result<()> {
    let experiment = store.get_mut(id)?;

    if clear {
        experiment.set_warnings(Vec::new());
        store.save().await.context("Failed to save experiment database")?;
        println!("{}", format_success(&format!("Cleared warnings of {}", id)));
        return Ok(());
    }

    if !experiment.has_warnings() {
        println!("{} has no warnings", id);
    }
    for warning in experiment.warnings() {
        println!("{}", format_warning(warning));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_config_flag_reads_environment() {
        let command = Cli::command();
        let config = command
            .get_arguments()
            .find(|arg| arg.get_id() == "config")
            .unwrap();
        assert_eq!(config.get_env(), Some(std::ffi::OsStr::new("NERONET_CONFIG")));
    }

    #[test]
    fn test_parse_monitor_command() {
        let cli = Cli::try_parse_from(["neronet", "--color", "false", "monitor", "exp1", "--log", "run.log"])
            .unwrap();
        assert!(!cli.color);
        assert!(matches!(
            cli.command,
            Commands::Monitor { ref id, ref log } if id == "exp1" && log == &PathBuf::from("run.log")
        ));
    }
}
