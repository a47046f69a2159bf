use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use herbal_rx_core::{
    DocumentRenderer, HerbalRx, HtmlRenderer, LayoutPreset, NewPrescription, PrintOutcome,
    Settings, SystemPrintDispatcher, TextRenderer, VocabularyCategory,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "herbal-rx")]
#[command(about = "Herbal prescription records and receipt printing")]
struct Cli {
    /// Prescription database
    #[arg(long, default_value = "prescriptions.db")]
    db: PathBuf,

    /// Settings document
    #[arg(long, default_value = herbal_rx_core::settings::DEFAULT_SETTINGS_FILE)]
    settings: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect or change settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    #[command(flatten)]
    Records(RecordCommand),
}

#[derive(Subcommand)]
enum RecordCommand {
    /// Save a new prescription
    Add {
        /// Patient name
        #[arg(long)]
        name: String,
        /// Prescription line (repeat for several lines)
        #[arg(short = 'p', long = "line", required = true)]
        lines: Vec<String>,
        #[arg(long)]
        gender: Option<String>,
        #[arg(long)]
        age: Option<String>,
        /// Patient phone
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        diagnosis: Option<String>,
        #[arg(long)]
        usage: Option<String>,
        /// Also render the receipt
        #[arg(long)]
        render: bool,
        #[arg(long, value_enum, default_value_t = Format::Html)]
        format: Format,
    },
    /// List history, newest first
    List {
        /// Filter by patient name
        #[arg(long, default_value = "")]
        name: String,
    },
    /// Show one record in full
    Show { id: i64 },
    /// Delete a record (irreversible)
    Delete {
        id: i64,
        /// Skip the confirmation check
        #[arg(long)]
        yes: bool,
    },
    /// Render a stored record again
    Reprint {
        id: i64,
        #[arg(long, value_enum, default_value_t = Format::Html)]
        format: Format,
    },
    /// Render a stored record and send it to a printer
    Print {
        id: i64,
        /// Printer name; the system default if omitted
        #[arg(long)]
        printer: Option<String>,
        #[arg(long, value_enum, default_value_t = Format::Html)]
        format: Format,
    },
    /// Show the estimated receipt size for a record
    Layout { id: i64 },
    /// Export the history
    Export {
        #[arg(value_enum)]
        format: ExportFormat,
        /// Output file; JSON goes to stdout if omitted
        output: Option<PathBuf>,
    },
    /// Show completion vocabulary
    Vocab {
        #[arg(long, value_enum, default_value_t = Category::All)]
        category: Category,
        /// Substring filter
        #[arg(long, default_value = "")]
        filter: String,
        #[arg(long, default_value_t = herbal_rx_core::completion::DEFAULT_FILTER_LIMIT)]
        limit: usize,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print the effective settings
    Show,
    /// Apply a compression preset (minimal, standard, loose)
    Preset { name: String },
    /// Set one key; the value is parsed as JSON, falling back to a string
    Set { key: String, value: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Html,
}

impl Format {
    fn renderer(self) -> &'static dyn DocumentRenderer {
        match self {
            Format::Text => &TextRenderer,
            Format::Html => &HtmlRenderer,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ExportFormat {
    Csv,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum Category {
    Medicines,
    Diagnoses,
    Phrases,
    Usages,
    All,
}

impl From<Category> for VocabularyCategory {
    fn from(category: Category) -> Self {
        match category {
            Category::Medicines => VocabularyCategory::Medicines,
            Category::Diagnoses => VocabularyCategory::Diagnoses,
            Category::Phrases => VocabularyCategory::Phrases,
            Category::Usages => VocabularyCategory::Usages,
            Category::All => VocabularyCategory::All,
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("herbal_rx=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let settings = Settings::load(&cli.settings);

    match cli.command {
        Commands::Settings { action } => run_settings(&action, settings, &cli.settings),
        Commands::Records(command) => {
            let mut app = HerbalRx::open(&cli.db, settings)
                .with_context(|| format!("Failed to open database {}", cli.db.display()))?;
            run_records(&mut app, command)
        }
    }
}

fn run_records(app: &mut HerbalRx, command: RecordCommand) -> anyhow::Result<()> {
    let out_dir = app.settings().output_dir.clone();

    match command {
        RecordCommand::Add {
            name,
            lines,
            gender,
            age,
            phone,
            diagnosis,
            usage,
            render,
            format,
        } => {
            let form = NewPrescription {
                patient_name: name,
                gender,
                age,
                phone,
                diagnosis,
                prescription: lines.join("\n"),
                usage,
            };
            if render {
                let (record, rendered) = app
                    .save_and_render(&form, format.renderer(), &out_dir)
                    .context("Failed to save prescription")?;
                println!("Saved prescription #{}", record.id);
                let document = rendered.with_context(|| {
                    format!(
                        "Saved prescription #{id}, but receipt rendering failed; \
                         run `herbal-rx reprint {id}` to retry",
                        id = record.id
                    )
                })?;
                println!("Receipt: {}", document.artifact_path.display());
            } else {
                let record = app
                    .save_prescription(&form)
                    .context("Failed to save prescription")?;
                println!("Saved prescription #{}", record.id);
            }
        }
        RecordCommand::List { name } => {
            let summaries = app.search(&name)?;
            if summaries.is_empty() {
                println!("No prescriptions found.");
            }
            for summary in summaries {
                println!(
                    "#{:<5} {}  {}  {}  {}",
                    summary.id,
                    summary.visit_date(),
                    summary.patient_name,
                    summary.diagnosis.as_deref().unwrap_or(""),
                    summary.preview().replace('\n', " ")
                );
            }
        }
        RecordCommand::Show { id } => {
            let record = app
                .get(id)?
                .with_context(|| format!("Prescription #{} not found", id))?;
            print!("{}", record.detail_text());
            if let Some(print_time) = &record.print_time {
                println!("最后打印：{}", print_time);
            }
        }
        RecordCommand::Delete { id, yes } => {
            if !yes {
                bail!("Deleting prescription #{} cannot be undone; pass --yes to confirm", id);
            }
            if app.delete_prescription(id)? {
                println!("Deleted prescription #{}", id);
            } else {
                bail!("Prescription #{} not found", id);
            }
        }
        RecordCommand::Reprint { id, format } => {
            let document = app
                .reprint(id, format.renderer(), &out_dir)
                .with_context(|| format!("Failed to reprint #{}", id))?;
            println!("{}", document.text_mirror);
            println!();
            println!("Receipt: {}", document.artifact_path.display());
        }
        RecordCommand::Print {
            id,
            printer,
            format,
        } => {
            let dispatcher = SystemPrintDispatcher::default();
            let report = app
                .print(id, format.renderer(), &dispatcher, &out_dir, printer.as_deref())
                .with_context(|| format!("Failed to print #{}", id))?;
            match report.outcome {
                PrintOutcome::Printed { mechanism } => {
                    println!("Sent to printer via {}", mechanism)
                }
                PrintOutcome::OpenedForManualPrint { opener } => println!(
                    "Printing unavailable; opened {} with {} for manual printing",
                    report.document.artifact_path.display(),
                    opener
                ),
            }
        }
        RecordCommand::Layout { id } => {
            let record = app
                .get(id)?
                .with_context(|| format!("Prescription #{} not found", id))?;
            let prepared = app.prepare_receipt(&record, chrono::Local::now().naive_local());
            println!("{}", serde_json::to_string_pretty(&prepared.estimate)?);
            println!("{}", serde_json::to_string_pretty(&prepared.geometry)?);
        }
        RecordCommand::Export { format, output } => match (format, output) {
            (ExportFormat::Csv, Some(path)) => {
                let count = app.export_csv(&path)?;
                println!("Exported {} prescriptions to {}", count, path.display());
            }
            (ExportFormat::Csv, None) => bail!("CSV export needs an output file"),
            (ExportFormat::Json, Some(path)) => {
                std::fs::write(&path, app.export_json()?)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                println!("Exported to {}", path.display());
            }
            (ExportFormat::Json, None) => println!("{}", app.export_json()?),
        },
        RecordCommand::Vocab {
            category,
            filter,
            limit,
        } => {
            let category = VocabularyCategory::from(category);
            if !app.settings().smart_completion_enabled {
                println!("Smart completion is disabled.");
                return Ok(());
            }
            println!(
                "{} (词库：{}个词条)",
                category.label(),
                app.vocabulary().total_terms()
            );
            for term in app.suggestions(category, &filter, limit) {
                println!("  {}", term);
            }
        }
    }

    Ok(())
}

fn run_settings(
    action: &SettingsAction,
    mut settings: Settings,
    path: &Path,
) -> anyhow::Result<()> {
    match action {
        SettingsAction::Show => {}
        SettingsAction::Preset { name } => {
            let preset: LayoutPreset = name.parse()?;
            settings.apply_preset(preset);
            settings.save(path)?;
        }
        SettingsAction::Set { key, value } => {
            let mut document = match serde_json::to_value(&settings)? {
                serde_json::Value::Object(map) => map,
                _ => bail!("Settings did not serialize to an object"),
            };
            let parsed = serde_json::from_str::<serde_json::Value>(value)
                .unwrap_or_else(|_| serde_json::Value::String(value.clone()));
            document.insert(key.clone(), parsed);

            let updated = Settings::from_map(&document);
            if updated == settings {
                bail!("Setting {} was not changed; check the key and value", key);
            }
            updated.save(path)?;
            settings = updated;
        }
    }

    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}
