//! Docload CLI - Turn CSV files into typed documents
//!
//! # Main Commands
//!
//! ```bash
//! docload build quiz.csv                       # Print the documents as JSON
//! docload load quiz.csv --store out/           # Write documents to a directory store
//! ```
//!
//! # Debug Commands (for development)
//!
//! ```bash
//! docload parse quiz.csv           # Just parse CSV rows to JSON
//! docload schema quiz.json         # Validate a schema and print its tree
//! docload types                    # Show type prefixes and column hints
//! ```

use clap::{Parser, Subcommand};
use docload::logging::{init_logging, LogConfig};
use docload::transform::pipeline::format_delimiter;
use docload::{
    load_collection, parse_csv_file_auto, prefixes_description, transform_csv, CollectionSpec,
    DirectoryStore, EngineOptions, Schema, DEFAULT_IDENTIFIER_COLUMN,
};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "docload")]
#[command(about = "Transform CSV files into typed hierarchical documents", long_about = None)]
struct Cli {
    /// Show progress (info level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Show per-document details (debug level)
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build documents from a CSV file and output JSON
    Build {
        /// Input CSV file
        input: PathBuf,

        /// Schema file (default: none, rows are grouped flat)
        #[arg(short, long)]
        schema: Option<PathBuf>,

        /// CSV delimiter (auto-detect if not specified)
        #[arg(long)]
        delimiter: Option<char>,

        /// Identifier column
        #[arg(long, default_value = DEFAULT_IDENTIFIER_COLUMN)]
        id_column: String,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Build documents and write them to a directory store
    Load {
        /// Input CSV file
        input: PathBuf,

        /// Store root directory
        #[arg(long)]
        store: PathBuf,

        /// Collection name (default: CSV file stem)
        #[arg(short, long)]
        collection: Option<String>,

        /// Schema file (default: CSV path with a .json extension, if present)
        #[arg(short, long)]
        schema: Option<PathBuf>,

        /// Replace existing documents instead of merging fields
        #[arg(long)]
        no_merge: bool,

        /// CSV delimiter (auto-detect if not specified)
        #[arg(long)]
        delimiter: Option<char>,

        /// Identifier column
        #[arg(long, default_value = DEFAULT_IDENTIFIER_COLUMN)]
        id_column: String,
    },

    /// Parse a CSV file and output its raw rows as JSON
    Parse {
        /// Input CSV file
        input: PathBuf,

        /// CSV delimiter (auto-detect if not specified)
        #[arg(long)]
        delimiter: Option<char>,

        /// Identifier column
        #[arg(long, default_value = DEFAULT_IDENTIFIER_COLUMN)]
        id_column: String,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate a schema file and print its tree
    Schema {
        /// Schema JSON file
        file: PathBuf,
    },

    /// Show type prefixes and column hints
    Types,
}

fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    if let Err(e) = init_logging(&LogConfig::from_flags(cli.verbose, cli.debug)) {
        eprintln!("Warning: logging disabled: {}", e);
    }

    let result = match cli.command {
        Commands::Build {
            input,
            schema,
            delimiter,
            id_column,
            output,
        } => cmd_build(
            &input,
            schema.as_deref(),
            engine_options(delimiter, id_column),
            output.as_deref(),
        ),

        Commands::Load {
            input,
            store,
            collection,
            schema,
            no_merge,
            delimiter,
            id_column,
        } => {
            let mut spec = CollectionSpec::new(&input).with_merge(!no_merge);
            if let Some(name) = collection {
                spec = spec.with_name(name);
            }
            if let Some(path) = schema {
                spec = spec.with_schema_path(path);
            }
            cmd_load(&spec, &store, engine_options(delimiter, id_column))
        }

        Commands::Parse {
            input,
            delimiter,
            id_column,
            output,
        } => cmd_parse(&input, engine_options(delimiter, id_column), output.as_deref()),

        Commands::Schema { file } => cmd_schema(&file),

        Commands::Types => cmd_types(),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn engine_options(delimiter: Option<char>, identifier_column: String) -> EngineOptions {
    EngineOptions {
        identifier_column,
        delimiter,
    }
}

fn cmd_build(
    input: &Path,
    schema_path: Option<&Path>,
    options: EngineOptions,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Processing: {}", input.display());

    let schema = match schema_path {
        Some(path) => {
            eprintln!("   Schema: {}", path.display());
            Some(Schema::from_file(path)?)
        }
        None => None,
    };

    let (csv_info, result) = transform_csv(input, schema.as_ref(), &options)?;
    eprintln!("   Encoding: {}", csv_info.encoding);
    eprintln!("   Delimiter: '{}'", format_delimiter(csv_info.delimiter));
    eprintln!("   Rows: {}", csv_info.row_count);
    print_issues(&result.issues);
    eprintln!("✅ {}", result.summary());

    let json = serde_json::to_string_pretty(&result.documents)?;
    write_output(&json, output)?;

    Ok(())
}

fn cmd_load(
    spec: &CollectionSpec,
    store_root: &Path,
    options: EngineOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Loading: {}", spec.file_path.display());
    eprintln!("   Collection: {}", spec.name());
    eprintln!("   Mode: {}", if spec.merge { "merge" } else { "overwrite" });

    let mut store = DirectoryStore::new(store_root);
    let summary = load_collection(spec, &options, &mut store)?;

    print_issues(&summary.issues);
    eprintln!(
        "✅ Wrote {} documents to {} ({} rows skipped)",
        summary.documents_written,
        store.root().join(&summary.collection).display(),
        summary.rows_skipped
    );

    Ok(())
}

fn cmd_parse(
    input: &Path,
    options: EngineOptions,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Parsing CSV: {}", input.display());

    let result = parse_csv_file_auto(input, &options)?;

    eprintln!("   Encoding: {}", result.encoding);
    eprintln!(
        "   Delimiter: '{}'{}",
        format_delimiter(result.delimiter),
        if options.delimiter.is_none() { " (auto-detected)" } else { "" }
    );
    let columns: Vec<String> = result
        .columns
        .iter()
        .map(|c| match c.hint {
            Some(hint) => format!("{} ({})", c.name, hint),
            None => c.name.clone(),
        })
        .collect();
    eprintln!("   Columns: {}", columns.join(", "));
    eprintln!("✅ Parsed {} rows", result.rows.len());

    let json = serde_json::to_string_pretty(&result.records())?;
    write_output(&json, output)?;

    Ok(())
}

fn cmd_schema(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let schema = Schema::from_file(path)?;

    println!("{}", schema.root().outline());
    println!("Columns: {}", schema.source_columns().join(", "));
    eprintln!("✅ Schema is valid");
    Ok(())
}

fn cmd_types() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", prefixes_description());
    Ok(())
}

fn print_issues(issues: &[docload::RowIssue]) {
    if issues.is_empty() {
        return;
    }
    eprintln!("⚠️  {} issue(s):", issues.len());
    for issue in issues.iter().take(5) {
        eprintln!("   • {}", issue);
    }
    if issues.len() > 5 {
        eprintln!("   ... +{} more", issues.len() - 5);
    }
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
