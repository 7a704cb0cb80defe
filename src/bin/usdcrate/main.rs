//! usdcrate CLI - inspect USD Crate (.usdc) files.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use serde_json::{json, Value as Json};

use usdcrate::crate_file::{CrateData, CrateValue, NodeParent, PathIndex};
use usdcrate::DecodeConfig;

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (built ",
    env!("USDCRATE_BUILD_DATE"),
    " ",
    env!("USDCRATE_BUILD_TIME"),
    ")"
);

#[derive(Parser)]
#[command(name = "usdcrate", version = VERSION, about = "USD Crate (.usdc) inspection tools")]
struct Cli {
    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Override the decode memory budget in bytes
    #[arg(long, global = true, value_name = "BYTES")]
    max_memory: Option<usize>,

    /// Load decode limits from a JSON file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version, sections and table sizes
    #[command(alias = "i")]
    Info { file: PathBuf },
    /// Show the prim hierarchy
    #[command(alias = "t")]
    Tree { file: PathBuf },
    /// Dump specs and their fields
    #[command(alias = "d")]
    Dump {
        file: PathBuf,
        /// Only specs whose path starts with this prefix
        #[arg(long)]
        path: Option<String>,
        /// Print JSON instead of text
        #[arg(short, long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli);

    if let Err(err) = run(cli) {
        match err.downcast_ref::<usdcrate::Error>() {
            Some(e) => eprintln!("error [{}]: {err:#}", e.kind()),
            None => eprintln!("error: {err:#}"),
        }
        std::process::exit(1);
    }
}

fn init_logging(cli: &Cli) {
    let default = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "usdcrate=debug",
        (false, _) => "usdcrate=trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_env("USDCRATE_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            DecodeConfig::from_json(&text)?
        }
        None => DecodeConfig::default(),
    };
    if let Some(bytes) = cli.max_memory {
        config = config.with_memory_budget(bytes);
    }

    match cli.command {
        Commands::Info { file } => cmd_info(&file, config),
        Commands::Tree { file } => cmd_tree(&file, config),
        Commands::Dump { file, path, json } => cmd_dump(&file, config, path.as_deref(), json),
    }
}

fn open(file: &Path, config: DecodeConfig) -> anyhow::Result<CrateData> {
    tracing::info!("opening {}", file.display());
    let data = CrateData::open_with(file, config)?;
    for w in data.warnings() {
        eprintln!("warning: {w}");
    }
    Ok(data)
}

fn cmd_info(file: &Path, config: DecodeConfig) -> anyhow::Result<()> {
    let data = open(file, config)?;

    println!("File:    {}", file.display());
    println!("Version: {}", data.version());
    println!();
    println!("Sections:");
    for s in &data.toc().sections {
        println!("  {:<12} start {:>10}  size {:>10}", s.name, s.start, s.size);
    }
    println!();
    println!("Tables:");
    println!("  Tokens:    {}", data.tokens().len());
    println!("  Strings:   {}", data.strings().len());
    println!("  Fields:    {}", data.fields().len());
    println!("  FieldSets: {}", data.live_fieldsets().len());
    println!("  Paths:     {}", data.paths().len());
    println!("  Specs:     {}", data.specs().len());
    println!();
    println!("Memory used: {} bytes", data.memory_used());
    Ok(())
}

fn cmd_tree(file: &Path, config: DecodeConfig) -> anyhow::Result<()> {
    let data = open(file, config)?;
    let Some(root) = data.root() else {
        println!("(no paths)");
        return Ok(());
    };

    // explicit stack; hierarchy depth comes from the file
    let mut stack: Vec<(PathIndex, usize)> = vec![(root, 0)];
    while let Some((index, depth)) = stack.pop() {
        let Some(node) = data.node(index) else { continue };
        let spec_type = data
            .specs()
            .iter()
            .find(|s| s.path_index == index)
            .map(|s| s.spec_type.name())
            .unwrap_or("-");

        if node.parent == NodeParent::Root {
            println!("/");
        } else {
            println!("{}{} [{}]", "  ".repeat(depth), node.element_name, spec_type);
        }
        for child in node.children.iter().rev() {
            stack.push((*child, depth + 1));
        }
    }
    Ok(())
}

fn cmd_dump(file: &Path, config: DecodeConfig, prefix: Option<&str>, json_mode: bool) -> anyhow::Result<()> {
    let data = open(file, config)?;

    let specs = data.specs().iter().filter_map(|spec| {
        let path = data.path(spec.path_index)?.to_string();
        match prefix {
            Some(p) if !path.starts_with(p) => None,
            _ => Some((path, spec)),
        }
    });

    if json_mode {
        let specs: Vec<Json> = specs
            .map(|(path, spec)| {
                let fields: serde_json::Map<String, Json> = data
                    .fields_for_spec(spec)
                    .unwrap_or_default()
                    .iter()
                    .map(|(name, value)| (name.clone(), value_to_json(value)))
                    .collect();
                json!({
                    "path": path,
                    "specType": spec.spec_type.name(),
                    "fields": fields,
                })
            })
            .collect();
        let out = json!({
            "file": file.display().to_string(),
            "version": data.version().to_string(),
            "specs": specs,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("File: {}", file.display());
    println!();
    for (path, spec) in specs {
        println!("{path} [{}]", spec.spec_type);
        for (name, value) in data.fields_for_spec(spec).unwrap_or_default() {
            println!("  {name}: {} = {value}", value.type_name());
        }
    }
    Ok(())
}

fn value_to_json(value: &CrateValue) -> Json {
    use CrateValue as V;

    fn floats<T: Copy + Into<f64>>(v: &[T]) -> Json {
        Json::Array(v.iter().map(|x| json!((*x).into())).collect())
    }

    match value {
        V::Bool(b) => json!(b),
        V::UChar(v) => json!(v),
        V::Int(v) => json!(v),
        V::UInt(v) => json!(v),
        V::Int64(v) => json!(v),
        V::UInt64(v) => json!(v),
        V::Half(v) => json!(v.to_f64()),
        V::Float(v) => json!(v),
        V::Double(v) | V::TimeCode(v) => json!(v),
        V::String(s) | V::Token(s) | V::AssetPath(s) => json!(s),
        V::BoolArray(v) => json!(v),
        V::UCharArray(v) => json!(v),
        V::IntArray(v) => json!(v),
        V::UIntArray(v) => json!(v),
        V::Int64Array(v) => json!(v),
        V::UInt64Array(v) => json!(v),
        V::HalfArray(v) => Json::Array(v.iter().map(|x| json!(x.to_f64())).collect()),
        V::FloatArray(v) => floats(v),
        V::DoubleArray(v) | V::TimeCodeArray(v) | V::DoubleVector(v) => floats(v),
        V::StringArray(v) | V::TokenArray(v) | V::AssetPathArray(v) | V::TokenVector(v) | V::StringVector(v) => {
            json!(v)
        }
        V::Vec3fArray(v) => Json::Array(v.iter().map(|p| json!(p.to_array())).collect()),
        V::Dictionary(d) => Json::Object(d.iter().map(|(k, v)| (k.to_string(), value_to_json(v))).collect()),
        V::TimeSamples(ts) => Json::Array(
            ts.iter()
                .map(|(t, v)| json!({ "time": t, "value": value_to_json(v) }))
                .collect(),
        ),
        V::VariantSelectionMap(m) => json!(m),
        V::PathVector(v) => json!(v.iter().map(|p| p.to_string()).collect::<Vec<_>>()),
        V::ValueBlock => Json::Null,
        V::Unregistered(inner) => value_to_json(inner),
        other => json!(other.to_string()),
    }
}
