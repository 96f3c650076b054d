use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::Value as Json;
use sky_core::{encode_event, Event, Value};
use sky_exec::{Executor, ExecutorConfig, EVENTS_SPACE};
use sky_primitives::Timestamp;
use sky_schema::{DataType, SchemaRegistry};
use sky_storage::{MemoryStore, StorageWriter};
use thiserror::Error as ThisError;

///
/// sky
///
/// A command-line harness standing in for the HTTP/JSON server surface
/// spec.md §1 puts explicitly out of scope: loads a schema and an
/// event log, then runs one query or stats pass against them in a single
/// process, in the spirit of how `examples/original_source/skyd/main.go`
/// drives the same engine from a CLI entrypoint.
///

#[derive(Parser)]
#[command(name = "sky", about = "Sky behavioral analytics query engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Loads a schema and an event log, then runs a query against them.
    Run {
        #[arg(long)]
        schema: PathBuf,
        #[arg(long)]
        events: PathBuf,
        #[arg(long)]
        query: PathBuf,
        #[arg(long, default_value_t = 1)]
        shards: usize,
        #[arg(long)]
        session_idle_time: Option<i64>,
        #[arg(long)]
        deadline_ms: Option<u64>,
    },
    /// Reports the object count for a table, without running a query.
    Stats {
        #[arg(long)]
        schema: PathBuf,
        #[arg(long)]
        events: PathBuf,
        #[arg(long)]
        table: String,
        #[arg(long, default_value_t = 1)]
        shards: usize,
        /// Restrict the count to objects whose key starts with this prefix.
        #[arg(long)]
        prefix: Option<String>,
    },
}

#[derive(Debug, ThisError)]
enum CliError {
    #[error("reading {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },

    #[error("parsing schema: {0}")]
    Schema(String),

    #[error("parsing event log line {line}: {message}")]
    Event { line: usize, message: String },

    #[error(transparent)]
    Storage(#[from] sky_storage::StorageError),

    #[error(transparent)]
    Exec(#[from] sky_exec::ExecError),
}

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        log::error!("{err}");
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), CliError> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run { schema, events, query, shards, session_idle_time, deadline_ms } => {
            let (registry, table_name) = load_schema(&schema)?;
            let store = load_events(&events, &registry, &table_name)?;
            let snapshot = store.snapshot();
            let mut config = ExecutorConfig::new().with_shard_count(shards);
            if let Some(idle) = session_idle_time {
                config = config.with_default_session_idle_time(idle);
            }
            if let Some(ms) = deadline_ms {
                config = config.with_deadline(Duration::from_millis(ms));
            }
            let query_text = fs::read_to_string(&query).map_err(|source| CliError::Read { path: query, source })?;
            let executor = Executor::new(&registry, &snapshot, config);
            let (result, stats) = executor.execute(&query_text, None)?;
            print_json(&json_with_stats(result, stats.to_json()));
        }
        Command::Stats { schema, events, table, shards, prefix } => {
            let (registry, table_name) = load_schema(&schema)?;
            let store = load_events(&events, &registry, &table_name)?;
            let snapshot = store.snapshot();
            let config = ExecutorConfig::new().with_shard_count(shards);
            let executor = Executor::new(&registry, &snapshot, config);
            let result = executor.stats(&table, prefix.as_deref())?;
            print_json(&result);
        }
    }
    Ok(())
}

fn json_with_stats(mut result: Json, stats: Json) -> Json {
    if let Json::Object(map) = &mut result {
        map.insert("__stats__".to_string(), stats);
    }
    result
}

fn print_json(value: &Json) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string()));
}

/// Schema file shape: `{"table": "...", "properties": [{"name", "dataType", "transient"}]}`.
fn load_schema(path: &std::path::Path) -> Result<(SchemaRegistry, String), CliError> {
    let text = fs::read_to_string(path).map_err(|source| CliError::Read { path: path.to_path_buf(), source })?;
    let json: Json = serde_json::from_str(&text).map_err(|e| CliError::Schema(e.to_string()))?;
    let obj = json.as_object().ok_or_else(|| CliError::Schema("schema must be a json object".into()))?;
    let table_name = obj
        .get("table")
        .and_then(Json::as_str)
        .ok_or_else(|| CliError::Schema("schema is missing string field 'table'".into()))?
        .to_string();
    let properties = obj
        .get("properties")
        .and_then(Json::as_array)
        .ok_or_else(|| CliError::Schema("schema is missing array field 'properties'".into()))?;

    let mut registry = SchemaRegistry::new();
    let table = registry.table_or_create(&table_name);
    for property in properties {
        let name = property
            .get("name")
            .and_then(Json::as_str)
            .ok_or_else(|| CliError::Schema("property is missing string field 'name'".into()))?;
        let data_type_str = property
            .get("dataType")
            .and_then(Json::as_str)
            .ok_or_else(|| CliError::Schema("property is missing string field 'dataType'".into()))?;
        let data_type = match data_type_str {
            "string" => DataType::String,
            "factor" => DataType::Factor,
            "integer" => DataType::Integer,
            "float" => DataType::Float,
            "boolean" => DataType::Boolean,
            other => return Err(CliError::Schema(format!("unknown data type '{other}'"))),
        };
        let transient = property.get("transient").and_then(Json::as_bool).unwrap_or(false);
        table
            .declare_property(name, data_type, transient)
            .map_err(|e| CliError::Schema(e.to_string()))?;
    }
    log::info!("loaded schema for table '{table_name}' with {} properties", properties.len());
    Ok((registry, table_name))
}

/// Event log shape, one json object per line: `{"object": "...",
/// "timestamp": <seconds>, "values": {...}}`.
fn load_events(path: &std::path::Path, registry: &SchemaRegistry, table_name: &str) -> Result<MemoryStore, CliError> {
    let text = fs::read_to_string(path).map_err(|source| CliError::Read { path: path.to_path_buf(), source })?;
    let table = registry
        .table(table_name)
        .ok_or_else(|| CliError::Schema(format!("table '{table_name}' was not declared by the schema")))?;

    let mut store = MemoryStore::new();
    store.open(EVENTS_SPACE, true)?;

    let mut count = 0usize;
    for (line_no, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let json: Json = serde_json::from_str(line)
            .map_err(|e| CliError::Event { line: line_no + 1, message: e.to_string() })?;
        let obj = json
            .as_object()
            .ok_or_else(|| CliError::Event { line: line_no + 1, message: "line must be a json object".into() })?;
        let object_id = obj
            .get("object")
            .and_then(Json::as_str)
            .ok_or_else(|| CliError::Event { line: line_no + 1, message: "missing string field 'object'".into() })?;
        let seconds = obj
            .get("timestamp")
            .and_then(Json::as_i64)
            .ok_or_else(|| CliError::Event { line: line_no + 1, message: "missing integer field 'timestamp'".into() })?;
        let values_json = obj
            .get("values")
            .and_then(Json::as_object)
            .ok_or_else(|| CliError::Event { line: line_no + 1, message: "missing object field 'values'".into() })?;

        let mut values = HashMap::with_capacity(values_json.len());
        for (name, value) in values_json {
            let property = table
                .property(name)
                .ok_or_else(|| CliError::Event { line: line_no + 1, message: format!("property '{name}' not declared") })?;
            let decoded = match property.data_type {
                DataType::String | DataType::Factor => {
                    Value::String(value.as_str().unwrap_or_default().to_string())
                }
                DataType::Integer => Value::Integer(value.as_i64().unwrap_or_default()),
                DataType::Float => Value::Float(value.as_f64().unwrap_or_default()),
                DataType::Boolean => Value::Boolean(value.as_bool().unwrap_or_default()),
            };
            values.insert(property.id, decoded);
        }

        let timestamp = Timestamp::from_micros(seconds * 1_000_000);
        let event = Event { timestamp, values };
        let encoded = encode_event(&event);
        store.put_at(EVENTS_SPACE, object_id.as_bytes(), &timestamp.as_micros().to_be_bytes(), encoded)?;
        count += 1;
    }
    log::info!("loaded {count} events into table '{table_name}'");
    Ok(store)
}
