//! ldifgen CLI - validate CSV/JSON records and generate LDIF
//!
//! ```bash
//! ldifgen serve                                   # Start HTTP server (port 3000)
//! ldifgen parse users.csv --schema user           # Validate and print the summary
//! ldifgen generate users.csv --schema user \
//!     --base-dn ou=people,dc=acme,dc=org -o users.ldif
//! ldifgen schemas                                 # List registered schemas
//! ```

use clap::{Parser, Subcommand};
use ldifgen::{
    start_server, DataFormat, Encoding, GenerationOptions, JobInput, JobManager, JobStatus, OutputFormat,
    ParseOptions, SchemaRegistry, Settings,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ldifgen")]
#[command(about = "Validate CSV/JSON records against a schema and generate LDIF", long_about = None)]
struct Cli {
    /// Directory of extra *.json schemas (overrides LDIFGEN_SCHEMA_DIR)
    #[arg(long, global = true)]
    schema_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and validate a file, print the summary as JSON
    Parse {
        /// Input CSV or JSON file
        input: PathBuf,

        /// Schema name
        #[arg(short, long)]
        schema: String,

        /// Input format (inferred from the extension if omitted)
        #[arg(short, long)]
        format: Option<DataFormat>,

        /// Input encoding: utf-8, latin-1, windows-1252, auto
        #[arg(short, long)]
        encoding: Option<Encoding>,

        /// Maximum number of validation errors reported
        #[arg(long)]
        max_errors: Option<usize>,

        /// Include validated records in the output
        #[arg(long)]
        records: bool,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Full pipeline: parse, validate, generate LDIF
    Generate {
        /// Input CSV or JSON file
        input: PathBuf,

        /// Schema name
        #[arg(short, long)]
        schema: String,

        /// Input format (inferred from the extension if omitted)
        #[arg(short, long)]
        format: Option<DataFormat>,

        /// Input encoding: utf-8, latin-1, windows-1252, auto
        #[arg(short, long)]
        encoding: Option<Encoding>,

        /// Base DN appended to every entry
        #[arg(short, long)]
        base_dn: Option<String>,

        /// Extra object class (repeatable)
        #[arg(long = "object-class")]
        object_classes: Vec<String>,

        /// Output format: ldif or json
        #[arg(long, default_value = "ldif")]
        output_format: OutputFormat,

        /// Maximum number of validation errors reported
        #[arg(long)]
        max_errors: Option<usize>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List registered schemas
    Schemas,

    /// Start HTTP server
    Serve {
        /// Port to listen on (overrides LDIFGEN_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ldifgen=info")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let result = run(cli).await;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut settings = Settings::from_env()?;
    if cli.schema_dir.is_some() {
        settings.schema_dir = cli.schema_dir;
    }
    let manager = build_manager(&settings)?;

    match cli.command {
        Commands::Parse {
            input,
            schema,
            format,
            encoding,
            max_errors,
            records,
            output,
        } => {
            let options = ParseOptions {
                max_errors: max_errors.unwrap_or(settings.max_errors),
                encoding: encoding.unwrap_or(settings.encoding),
            };
            cmd_parse(&manager, &input, &schema, format, options, records, output.as_deref())
        }

        Commands::Generate {
            input,
            schema,
            format,
            encoding,
            base_dn,
            object_classes,
            output_format,
            max_errors,
            output,
        } => {
            let defaults = settings.generation_options();
            let options = GenerationOptions {
                base_dn: base_dn.unwrap_or(defaults.base_dn),
                object_classes,
                max_errors: max_errors.unwrap_or(defaults.max_errors),
                encoding: encoding.unwrap_or(defaults.encoding),
                output_format,
            };
            cmd_generate(&manager, &input, &schema, format, options, output.as_deref())
        }

        Commands::Schemas => cmd_schemas(&manager),

        Commands::Serve { port } => {
            if let Some(port) = port {
                settings.port = port;
            }
            start_server(settings, Arc::new(manager)).await
        }
    }
}

/// Registry with the built-ins plus any schema directory.
fn build_manager(settings: &Settings) -> Result<JobManager, Box<dyn std::error::Error>> {
    let registry = SchemaRegistry::with_builtins();

    if let Some(dir) = &settings.schema_dir {
        let report = registry.load_dir(dir)?;
        for (path, reason) in &report.failures {
            tracing::warn!("Skipped schema {}: {}", path.display(), reason);
        }
        tracing::info!("Loaded {} schema(s) from {}", report.loaded.len(), dir.display());
    }

    Ok(JobManager::new(registry))
}

fn cmd_parse(
    manager: &JobManager,
    input: &Path,
    schema: &str,
    format: Option<DataFormat>,
    options: ParseOptions,
    include_records: bool,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let format = resolve_format(input, format)?;
    let bytes = fs::read(input)?;
    eprintln!("Parsing {} as {} (schema '{}')", input.display(), format, schema);

    let result = manager.parse(&bytes, format, schema, &options)?;
    let summary = &result.summary;

    eprintln!("   Records: {}", summary.total_records);
    eprintln!("   Valid:   {}", summary.valid_records);
    eprintln!("   Invalid: {}", summary.invalid_records);
    for error in result.errors.iter().take(5) {
        eprintln!("   - {}", error);
    }
    for error in summary.errors.iter().take(5) {
        eprintln!("   - {}", error);
    }
    if summary.truncated {
        eprintln!("   (error list truncated at {})", options.max_errors);
    }

    let json = if include_records {
        serde_json::to_string_pretty(&result)?
    } else {
        serde_json::to_string_pretty(summary)?
    };
    write_output(&json, output)?;
    Ok(())
}

fn cmd_generate(
    manager: &JobManager,
    input: &Path,
    schema: &str,
    format: Option<DataFormat>,
    options: GenerationOptions,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let format = resolve_format(input, format)?;
    let bytes = fs::read(input)?;
    eprintln!("Generating from {} (schema '{}')", input.display(), schema);

    let job = manager.generate_now(JobInput::new(bytes, format), schema, options)?;

    if let Some(summary) = &job.summary {
        eprintln!(
            "   Valid: {}, invalid: {}, entries: {}",
            summary.valid_records, summary.invalid_records, job.output_records
        );
        for error in summary.errors.iter().take(5) {
            eprintln!("   - {}", error);
        }
    }
    for skipped in job.generation_errors.iter().take(5) {
        eprintln!("   - {}", skipped);
    }

    match (job.status, job.output) {
        (JobStatus::Completed, Some(text)) => {
            write_output(&text, output)?;
            Ok(())
        }
        _ => Err(job
            .error_message
            .unwrap_or_else(|| format!("job ended as {}", job.status))
            .into()),
    }
}

fn cmd_schemas(manager: &JobManager) -> Result<(), Box<dyn std::error::Error>> {
    for schema in manager.list_schemas() {
        println!("{} (v{})", schema.name, schema.version);
        if let Some(description) = &schema.description {
            println!("  {}", description);
        }
        for field in &schema.fields {
            let marker = if field.required { " *" } else { "" };
            println!("  - {}: {}{}", field.name, field.field_type, marker);
        }
    }
    Ok(())
}

fn resolve_format(input: &Path, format: Option<DataFormat>) -> Result<DataFormat, Box<dyn std::error::Error>> {
    format
        .or_else(|| DataFormat::from_path(input))
        .ok_or_else(|| format!("cannot infer format of {}, pass --format", input.display()).into())
}

fn write_output(content: &str, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match output {
        Some(path) => {
            fs::write(path, content)?;
            eprintln!("Saved to: {}", path.display());
        }
        None => print!("{}", content),
    }
    Ok(())
}
