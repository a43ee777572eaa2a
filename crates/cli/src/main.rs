use clap::{Parser, Subcommand};
use medforms_core::config::{resolve_data_dir, signature_max_bytes_from_env_value};
use medforms_core::{
    CoreConfig, DocumentSession, DocumentType, DocumentTypeSelector, FieldStore, FormsError,
    FormsResult, MergeOutcome, PersistenceService, TemplateEngine,
};
use medforms_store::FileStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "medforms")]
#[command(about = "MedForms medical record and Form №100 CLI")]
struct Cli {
    /// Data directory (defaults to MEDFORMS_DATA_DIR, then ./medforms_data)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List stored templates
    Templates,
    /// Save a template from a JSON object of field values
    SaveTemplate {
        /// Template name
        name: String,
        /// JSON file with the field values
        fields: PathBuf,
        /// medical_record or form_100
        #[arg(long, default_value = "medical_record")]
        document_type: DocumentType,
    },
    /// Delete a template by id
    DeleteTemplate {
        /// Template id
        id: String,
    },
    /// Apply a template to an empty session and print the resulting form
    ApplyTemplate {
        /// Template id
        id: String,
    },
    /// Fill a medical record from JSON, switch to Form №100 and print it
    Merge {
        /// JSON file with medical record field values
        record: PathBuf,
    },
    /// Search saved documents and templates
    Search {
        /// Search text
        query: String,
    },
}

fn open_store(data_dir: Option<PathBuf>) -> FormsResult<Arc<FileStore>> {
    let override_dir = data_dir.or_else(|| std::env::var_os("MEDFORMS_DATA_DIR").map(PathBuf::from));
    let sig_max =
        signature_max_bytes_from_env_value(std::env::var("MEDFORMS_SIGNATURE_MAX_BYTES").ok())?;
    let cfg = CoreConfig::new(resolve_data_dir(override_dir)?, sig_max)?;
    Ok(Arc::new(FileStore::open(&cfg)?))
}

fn read_fields(path: &Path) -> FormsResult<FieldStore> {
    let json = std::fs::read_to_string(path).map_err(|e| {
        FormsError::InvalidInput(format!("cannot read {}: {e}", path.display()))
    })?;
    FieldStore::from_json(&json)
}

/// Applies template `id` to a fresh session and returns the form it filled.
async fn apply_template(engine: &TemplateEngine<FileStore>, id: &str) -> FormsResult<FieldStore> {
    let template = engine.find_template(id).await?;
    let mut session = DocumentSession::new();
    let report = engine.apply_template(&mut session, &template)?;
    for field in &report.ignored {
        tracing::warn!(field, "template field not on {}", template.document_type);
    }
    Ok(session.form(template.document_type).snapshot())
}

/// Types `record` into the medical record field by field, then activates Form №100.
fn merge_record(record: &FieldStore) -> FormsResult<(FieldStore, MergeOutcome)> {
    let mut session = DocumentSession::new();
    for (field, value) in record.iter() {
        match session.edit_field(DocumentType::MedicalRecord, field, value) {
            Ok(_) => {}
            Err(FormsError::UnknownField { .. }) => {
                tracing::warn!(field, "not a medical record field, skipped");
            }
            Err(e) => return Err(e),
        }
    }

    let activation = DocumentTypeSelector::new().activate(&mut session, DocumentType::Form100);
    let outcome = activation.merge.unwrap_or(MergeOutcome::NotApplicable);
    Ok((session.form(DocumentType::Form100).snapshot(), outcome))
}

async fn run(command: Commands, store: Arc<FileStore>) -> FormsResult<()> {
    let engine = TemplateEngine::new(Arc::clone(&store));

    match command {
        Commands::Templates => {
            let templates = engine.list_templates().await?;
            if templates.is_empty() {
                println!("No templates found.");
            }
            for template in templates {
                let created = template
                    .created_at
                    .map(|c| c.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "-".into());
                println!(
                    "ID: {}, Name: {}, Type: {}, Created: {}",
                    template.id, template.name, template.document_type, created
                );
            }
        }
        Commands::SaveTemplate {
            name,
            fields,
            document_type,
        } => {
            let fields = read_fields(&fields)?;
            let id = engine.save_template(&name, document_type, fields).await?;
            println!("Saved template with ID: {id}");
        }
        Commands::DeleteTemplate { id } => {
            if engine.delete_template(&id).await? {
                println!("Deleted template {id}");
            } else {
                println!("Template {id} not found");
            }
        }
        Commands::ApplyTemplate { id } => {
            let form = apply_template(&engine, &id).await?;
            println!("{}", form.to_json_pretty()?);
        }
        Commands::Merge { record } => {
            let record = read_fields(&record)?;
            let (form, outcome) = merge_record(&record)?;
            if outcome == MergeOutcome::NotApplicable {
                eprintln!("Medical record has no patient name; Form №100 left as is.");
            }
            println!("{}", form.to_json_pretty()?);
        }
        Commands::Search { query } => {
            let res = store.search_patients(&query).await?;
            if res.results.is_empty() {
                println!("No matches.");
            }
            for hit in res.results {
                println!("{}", serde_json::to_string(&hit).map_err(FormsError::Serialization)?);
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("medforms: no command given, try --help");
        return Ok(());
    };

    let store = open_store(cli.data_dir)?;
    if let Err(e) = run(command, store).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
    Ok(())
}
