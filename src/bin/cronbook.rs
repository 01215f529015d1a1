use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use cronbook::clock::display_now;
use cronbook::{Store, StoreConfig};

#[derive(Parser)]
#[command(name = "cronbook")]
#[command(
    about = "Time series data processor. JSON format is \
             {\"dataset\":\"name\", \"keys\":[\"key_1\",\"key_n\"], \"values\":[[\"value_1\",\"value_n\"]]}"
)]
struct Cli {
    /// Add via inline JSON string
    #[arg(short = 'a', long, value_name = "JSON")]
    add: Option<String>,

    /// Add via JSON file
    #[arg(short = 'f', long, value_name = "FILE")]
    file: Option<PathBuf>,

    /// Delete dataset
    #[arg(short = 'd', long, value_name = "NAME")]
    delete: Option<String>,

    /// Query dataset
    #[arg(short = 'q', long, num_args = 3, value_names = ["NAME", "MIN", "MAX"])]
    query: Option<Vec<String>>,

    /// Print the forwarding payload (no display time) for a window
    #[arg(long, num_args = 3, value_names = ["NAME", "MIN", "MAX"])]
    forward: Option<Vec<String>>,

    /// Rename dataset
    #[arg(short = 'r', long, num_args = 2, value_names = ["NAME_FROM", "NAME_TO"])]
    rename: Option<Vec<String>>,

    /// Store configuration (JSON)
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Dataset directory, overrides the configuration
    #[arg(long)]
    root: Option<PathBuf>,

    /// Write output to file
    #[arg(short = 'l', long, value_name = "FILE")]
    logfile: Option<PathBuf>,

    /// Verbose output
    #[arg(short = 'v', long)]
    verbose: bool,
}

/// Destination of the one-line success and error reports.
struct Report {
    logfile: Option<std::fs::File>,
    verbose: bool,
}

impl Report {
    fn line(&self, location: &str, message: &str) -> String {
        format!("{}, {}: {}\n", display_now(), location, message)
    }

    fn success(&mut self, location: &str, message: &str) {
        if !self.verbose {
            return;
        }
        let line = self.line(location, message);
        let _ = match &mut self.logfile {
            Some(file) => file.write_all(line.as_bytes()),
            None => io::stdout().write_all(line.as_bytes()),
        };
    }

    fn error(&mut self, location: &str, message: &str) {
        let line = self.line(location, message);
        let _ = match &mut self.logfile {
            Some(file) => file.write_all(line.as_bytes()),
            None => io::stderr().write_all(line.as_bytes()),
        };
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let logfile = match &cli.logfile {
        Some(path) => match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Some(file),
            Err(_) => {
                let message = format!("file open or permission error on '{}'", path.display());
                eprintln!("{}, logfile: {}", display_now(), message);
                return ExitCode::FAILURE;
            }
        },
        None => None,
    };
    let mut report = Report {
        logfile,
        verbose: cli.verbose,
    };

    let (location, outcome) = run(&cli);
    match outcome {
        Ok(Some(message)) => {
            report.success(location, &message);
            ExitCode::SUCCESS
        }
        Ok(None) => ExitCode::SUCCESS,
        Err(err) => {
            report.error(location, &format!("{err:#}"));
            ExitCode::FAILURE
        }
    }
}

fn open_store(cli: &Cli) -> Result<Store> {
    let mut config = match &cli.config {
        Some(path) => StoreConfig::load(path)?,
        None => StoreConfig::default(),
    };
    if let Some(root) = &cli.root {
        config.root = root.clone();
    }
    Ok(Store::open(config)?)
}

/// Runs the selected operation, returning its name and success message.
fn run(cli: &Cli) -> (&'static str, Result<Option<String>>) {
    if let Some(doc) = &cli.add {
        return ("add", add(cli, doc));
    }
    if let Some(path) = &cli.file {
        let outcome = std::fs::read_to_string(path)
            .with_context(|| format!("file open or permission error on '{}'", path.display()))
            .and_then(|doc| add(cli, &doc));
        return ("add file", outcome);
    }
    if let Some(args) = &cli.query {
        return ("query", query(cli, args, true));
    }
    if let Some(args) = &cli.forward {
        return ("forward", query(cli, args, false));
    }
    if let Some(name) = &cli.delete {
        let outcome = open_store(cli)
            .and_then(|store| Ok(store.delete(name)?))
            .map(|()| Some(format!("dataset {name} deleted")));
        return ("delete", outcome);
    }
    if let Some(args) = &cli.rename {
        let outcome = open_store(cli)
            .and_then(|store| Ok(store.rename(&args[0], &args[1])?))
            .map(|()| Some(format!("dataset {} renamed to {}", args[0], args[1])));
        return ("rename", outcome);
    }
    ("main", Ok(None))
}

fn add(cli: &Cli, doc: &str) -> Result<Option<String>> {
    let store = open_store(cli)?;
    let report = store.add_json(doc)?;
    Ok(Some(format!(
        "{} sets added to dataset {}",
        report.rows, report.dataset
    )))
}

fn query(cli: &Cli, args: &[String], include_display: bool) -> Result<Option<String>> {
    let store = open_store(cli)?;
    let (name, min, max) = (&args[0], &args[1], &args[2]);
    let output = if include_display {
        store.query_text(name, min, max)?
    } else {
        store.query_for_forward_text(name, min, max)?
    };
    if output.count > 0 {
        println!("{}", output.body);
    }
    Ok(Some(format!(
        "{} sets returned via query {} from {} to {}",
        output.count, name, min, max
    )))
}
