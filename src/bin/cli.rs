//! AtlasDB CLI
//!
//! Command-line interface for inspecting and editing a local AtlasDB store.
//! Records are JSON objects; indexes are declared per invocation with
//! `--index field:int` or `--index field:str`. The first invocation against
//! a collection fixes its index set; later ones must declare the same
//! fields. `add` rejects records whose indexed fields are missing or of
//! the wrong type.

use std::process::ExitCode;
use std::str::FromStr;

use atlasdb::{Codec, Collection, Config, Database, IndexValue, Schema};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::{fmt, EnvFilter};

/// AtlasDB CLI
#[derive(Parser, Debug)]
#[command(name = "atlasdb-cli")]
#[command(about = "CLI for the AtlasDB object store")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./atlasdb_data")]
    data_dir: String,

    /// Collection to operate on
    #[arg(short, long, default_value = "records")]
    collection: String,

    /// Secondary index declaration, `field:int` or `field:str` (repeatable)
    #[arg(short, long = "index")]
    indexes: Vec<IndexSpec>,

    /// MemTable size limit in MB before flush
    #[arg(short = 'm', long, default_value = "64")]
    memtable_mb: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Add a JSON record and print its id
    Add {
        /// The record, e.g. '{"name":"ada","age":36}'
        record: String,
    },

    /// Print the record with this id
    Get {
        id: u64,
    },

    /// Print every record in id order
    Scan,

    /// Print the records whose indexed field equals a value
    Find {
        /// Indexed field name
        field: String,

        /// Value to match (parsed per the field's declared kind)
        value: String,
    },

    /// Remove a record and print it
    Remove {
        id: u64,
    },

    /// Print the number of records
    Count,

    /// Flush buffered writes to an SSTable
    Flush,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IndexKind {
    Int,
    Str,
}

impl IndexKind {
    fn describe(self) -> &'static str {
        match self {
            IndexKind::Int => "an integer",
            IndexKind::Str => "a string",
        }
    }
}

#[derive(Debug, Clone)]
struct IndexSpec {
    field: String,
    kind: IndexKind,
}

impl FromStr for IndexSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (field, kind) = s
            .split_once(':')
            .ok_or_else(|| format!("expected field:int or field:str, got '{}'", s))?;
        let kind = match kind {
            "int" => IndexKind::Int,
            "str" => IndexKind::Str,
            other => return Err(format!("unknown index kind '{}'", other)),
        };
        Ok(Self {
            field: field.to_string(),
            kind,
        })
    }
}

impl IndexSpec {
    fn extract(&self, record: &Value) -> Result<IndexValue, String> {
        let field = record
            .get(&self.field)
            .ok_or_else(|| format!("record has no indexed field '{}'", self.field))?;
        let value = match self.kind {
            IndexKind::Int => field.as_i64().map(IndexValue::Int),
            IndexKind::Str => field.as_str().map(|s| IndexValue::Str(s.to_string())),
        };
        value.ok_or_else(|| {
            format!(
                "indexed field '{}' must be {}, got {}",
                self.field,
                self.kind.describe(),
                field
            )
        })
    }

    fn parse_value(&self, raw: &str) -> Result<IndexValue, String> {
        match self.kind {
            IndexKind::Int => raw
                .parse::<i64>()
                .map(IndexValue::Int)
                .map_err(|e| format!("'{}' is not an integer: {}", raw, e)),
            IndexKind::Str => Ok(IndexValue::Str(raw.to_string())),
        }
    }
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,atlasdb=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = Config::builder()
        .data_dir(&args.data_dir)
        .memtable_size_limit(args.memtable_mb * 1024 * 1024)
        .build();

    let db = match Database::open(config) {
        Ok(db) => db,
        Err(e) => {
            tracing::error!("Failed to open database: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let outcome = run(&db, &args);

    if let Err(e) = db.close() {
        tracing::error!("Failed to close database: {}", e);
        return ExitCode::FAILURE;
    }

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(db: &Database, args: &Args) -> Result<(), String> {
    let mut schema = Schema::new(args.collection.clone());
    for spec in &args.indexes {
        let spec = spec.clone();
        let field = spec.field.clone();
        // `add` validates first; this only sees records that passed or
        // that were stored before the check existed
        schema = schema.index(field, move |record: &Value| {
            spec.extract(record).unwrap_or(match spec.kind {
                IndexKind::Int => IndexValue::Int(0),
                IndexKind::Str => IndexValue::Str(String::new()),
            })
        });
    }

    let records: Collection<Value> = db
        .collection(schema, Codec::json())
        .map_err(|e| e.to_string())?;

    match &args.command {
        Commands::Add { record } => {
            let value: Value =
                serde_json::from_str(record).map_err(|e| format!("invalid JSON record: {}", e))?;
            for spec in &args.indexes {
                spec.extract(&value)?;
            }
            let id = records.add(&value).map_err(|e| e.to_string())?;
            println!("{}", id);
        }
        Commands::Get { id } => {
            let record = records.get(*id).map_err(|e| e.to_string())?;
            println!("{}", record);
        }
        Commands::Scan => {
            let cursor = records.iter_all().map_err(|e| e.to_string())?;
            print_cursor(cursor)?;
        }
        Commands::Find { field, value } => {
            let spec = args
                .indexes
                .iter()
                .find(|spec| &spec.field == field)
                .ok_or_else(|| format!("no index declared for '{}'", field))?;
            let value = spec.parse_value(value)?;
            let cursor = records
                .iter_equal(field, value)
                .map_err(|e| e.to_string())?;
            print_cursor(cursor)?;
        }
        Commands::Remove { id } => {
            let record = records.remove(*id).map_err(|e| e.to_string())?;
            println!("{}", record);
        }
        Commands::Count => {
            let count = records.len().map_err(|e| e.to_string())?;
            println!("{}", count);
        }
        Commands::Flush => {
            db.flush().map_err(|e| e.to_string())?;
            tracing::info!("Flushed {}", db.data_dir().display());
        }
    }

    Ok(())
}

/// Print `id<TAB>record` per entry; undecodable records are reported and skipped
fn print_cursor(cursor: atlasdb::Cursor<Value>) -> Result<(), String> {
    for (id, record) in cursor {
        match record {
            Ok(record) => println!("{}\t{}", id, record),
            Err(e) if e.is_storage_io() || id == 0 => return Err(e.to_string()),
            Err(e) => tracing::warn!("Skipping record {}: {}", id, e),
        }
    }
    Ok(())
}
