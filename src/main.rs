use callgrid::export::display_value;
use callgrid::models::{self, FeedSimulator};
use callgrid::scheduler::{ManualScheduler, Scheduler};
use callgrid::{
    ActionKind, ActionSink, BrowserConfig, CallStatus, Constraint, ExportFormat, ExportRequest,
    ExportScope, KvStorage, MemoryStorage, Record, RecordBrowser, Schema, SinkReply, SqliteStorage,
    SystemClock,
};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use eyre::Result;
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "callgrid")]
#[command(about = "CallGrid - live record browser for telephony ops dashboards")]
struct Cli {
    /// Path to a YAML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the kv storage directory
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Which view's dataset to load
    #[arg(short = 'd', long, value_enum, default_value = "calls")]
    dataset: Dataset,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Dataset {
    Calls,
    Cdrs,
    Invoices,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Csv,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the filtered, sorted view as a table
    Show {
        /// Constraints: field=value, field~substring, field=min..max
        #[arg(short, long)]
        filter: Vec<String>,

        /// Sort field (repeat the flag to flip direction)
        #[arg(short, long)]
        sort: Vec<String>,
    },

    /// Write the view to stdout in an export format
    Export {
        #[arg(short = 'F', long, value_enum, default_value = "csv")]
        format: Format,

        /// Columns to include; required columns are always added
        #[arg(short = 'C', long)]
        columns: Vec<String>,

        #[arg(short, long)]
        filter: Vec<String>,
    },

    /// Run the simulated live feed for a number of cycles
    Simulate {
        #[arg(short, long, default_value_t = 10)]
        ticks: u32,

        /// Pause between cycles; 0 runs flat out
        #[arg(long, default_value_t = 0)]
        interval_ms: u64,
    },

    /// Manage saved filter presets
    Presets {
        #[command(subcommand)]
        command: PresetCommands,
    },

    /// Dispatch a bulk action against record ids
    Act {
        /// terminate, hold, resume, or transfer
        kind: String,
        ids: Vec<String>,
    },
}

#[derive(Subcommand)]
enum PresetCommands {
    List,
    Save {
        name: String,
        #[arg(short, long)]
        filter: Vec<String>,
    },
    Delete {
        id: String,
    },
}

/// CLI stand-in for the telephony control plane: log and acknowledge
struct LoggingSink;

impl ActionSink for LoggingSink {
    fn submit(&mut self, kind: ActionKind, record: &Record) -> SinkReply {
        info!(kind = kind.as_str(), id = %record.id, "forwarding action");
        SinkReply::Done
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => BrowserConfig::load(path),
        None => BrowserConfig::default(),
    };

    let (schema, records) = dataset(cli.dataset);
    let storage = open_storage(cli.data_dir.clone().or(config.data_dir.clone()));
    let mut browser = RecordBrowser::new(
        schema,
        storage,
        Box::new(LoggingSink),
        Box::new(SystemClock),
        &config,
    );
    browser.load_records(records);

    match cli.command {
        Commands::Show { filter, sort } => {
            apply_filter_args(&mut browser, &filter);
            for field in &sort {
                browser.sort_by(field);
            }
            print_table(&browser);
        }
        Commands::Export {
            format,
            columns,
            filter,
        } => {
            apply_filter_args(&mut browser, &filter);
            let request = ExportRequest {
                format: match format {
                    Format::Csv => ExportFormat::Csv,
                    Format::Json => ExportFormat::Json,
                },
                columns,
                scope: ExportScope::All,
            };
            print!("{}", browser.export(&request));
        }
        Commands::Simulate { ticks, interval_ms } => {
            let browser = Rc::new(RefCell::new(browser));
            let feed = Rc::new(RefCell::new(FeedSimulator::new()));

            let tick_browser = browser.clone();
            let tick_feed = feed.clone();
            let mut scheduler = ManualScheduler::new(move || {
                tick_browser.borrow_mut().tick(&mut *tick_feed.borrow_mut());
            });

            scheduler.start(config.tick_interval_secs * 1_000);
            for _ in 0..ticks {
                scheduler.fire_once();
                if interval_ms > 0 {
                    std::thread::sleep(std::time::Duration::from_millis(interval_ms));
                }
            }
            scheduler.stop();

            let browser = browser.borrow();
            println!(
                "{} cycles, generation {}, {} records",
                ticks,
                browser.generation(),
                browser.store().len()
            );
            print_table(&browser);
        }
        Commands::Presets { command } => match command {
            PresetCommands::List => {
                for preset in browser.presets() {
                    println!("{}  {}  {}", preset.id, preset.created_at, preset.name);
                }
            }
            PresetCommands::Save { name, filter } => {
                apply_filter_args(&mut browser, &filter);
                let preset = browser.save_preset(name);
                println!("saved {} as {}", preset.name, preset.id);
            }
            PresetCommands::Delete { id } => {
                if browser.delete_preset(&id) {
                    println!("deleted {id}");
                } else {
                    println!("no preset {id}");
                }
            }
        },
        Commands::Act { kind, ids } => {
            let Some(kind) = ActionKind::parse(&kind) else {
                warn!(kind = %kind, "unknown action kind");
                return Ok(());
            };
            for result in browser.dispatch(kind, &ids) {
                println!("{}  {:?}", result.id, result.outcome);
            }
        }
    }

    Ok(())
}

fn dataset(dataset: Dataset) -> (Schema, Vec<Record>) {
    match dataset {
        Dataset::Calls => (models::call_schema(), models::sample_calls()),
        Dataset::Cdrs => (models::cdr_schema(), models::sample_cdrs()),
        Dataset::Invoices => (models::invoice_schema(), models::sample_invoices()),
    }
}

fn open_storage(data_dir: Option<PathBuf>) -> Box<dyn KvStorage> {
    let dir = data_dir
        .or_else(|| dirs::data_local_dir().map(|d| d.join("callgrid")))
        .unwrap_or_else(|| PathBuf::from(".callgrid"));
    match SqliteStorage::open(dir.join("callgrid.db")) {
        Ok(storage) => Box::new(storage),
        Err(err) => {
            warn!(?err, "kv storage unavailable, state will not persist");
            Box::new(MemoryStorage::new())
        }
    }
}

/// field=value, field~substring, field=min..max
fn apply_filter_args(browser: &mut RecordBrowser, args: &[String]) {
    for arg in args {
        if let Some((field, needle)) = arg.split_once('~') {
            browser.set_constraint(field.to_string(), Constraint::substring(needle));
        } else if let Some((field, value)) = arg.split_once('=') {
            if let Some((min, max)) = value.split_once("..") {
                let bound = |s: &str| (!s.is_empty()).then(|| s.to_string());
                browser.set_constraint(field.to_string(), Constraint::range(bound(min), bound(max)));
            } else {
                browser.set_constraint(field.to_string(), Constraint::equals(value));
            }
        } else {
            warn!(arg = %arg, "ignoring malformed filter argument");
        }
    }
}

fn colorize_status(status: CallStatus) -> String {
    let name = status.as_str();
    match status {
        CallStatus::Ringing => name.yellow().to_string(),
        CallStatus::Active => name.green().to_string(),
        CallStatus::Hold => name.cyan().to_string(),
        CallStatus::Transferring => name.magenta().to_string(),
        CallStatus::Terminated => name.dimmed().to_string(),
    }
}

fn print_table(browser: &RecordBrowser) {
    let view = browser.view();
    let columns: Vec<String> = browser
        .schema()
        .fields()
        .iter()
        .map(|f| f.name.clone())
        .collect();

    let mut widths: Vec<usize> = columns.iter().map(|c| c.len()).collect();
    let rows: Vec<Vec<String>> = view
        .iter()
        .map(|record| {
            columns
                .iter()
                .enumerate()
                .map(|(i, column)| {
                    let cell = record
                        .field(column)
                        .map(|v| display_value(&v))
                        .unwrap_or_default();
                    widths[i] = widths[i].max(cell.len());
                    cell
                })
                .collect()
        })
        .collect();

    let header: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{:<width$}", c, width = widths[i]))
        .collect();
    println!("{}", header.join("  ").as_str().bold());

    for (record, cells) in view.iter().zip(rows) {
        let line: Vec<String> = cells
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let padded = format!("{:<width$}", cell, width = widths[i]);
                if columns[i] == "status" {
                    // pad first so the color codes don't skew the width
                    padded.replace(record.status.as_str(), &colorize_status(record.status))
                } else {
                    padded
                }
            })
            .collect();
        println!("{}", line.join("  "));
    }
    println!("{} of {} records", view.len(), browser.store().len());
}
