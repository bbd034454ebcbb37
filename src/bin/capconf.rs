use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use capconf::config::load_config;
use capconf::contract::{AccessorDecl, ContractDecl};
use capconf::module::{activate, inspect, internal_name, BinaryModule, ModuleBuilder};
use capconf::observability::logging;
use capconf::resolver::ContractResolver;
use capconf::source::{LocatorResolver, PropertiesReader, SourceError, SourceReader};
use capconf::watch::WatchRegistry;

#[derive(Parser)]
#[command(name = "capconf")]
#[command(about = "Emit and inspect configuration capability modules", long_about = None)]
struct Cli {
    /// Log filter (overridden by RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a contract against a source file and emit its module
    Emit {
        /// Contract type name, e.g. app::FeatureFlags
        #[arg(long)]
        contract: String,

        /// Properties file to resolve against (defaults only when omitted)
        #[arg(long)]
        source: Option<PathBuf>,

        /// Accessor as name:kind:key:default, e.g. flag:bool:f:false
        #[arg(long = "accessor", required = true)]
        accessors: Vec<String>,

        /// Write module bytes here instead of hex to stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Verify a module file and print its dispatch table
    Decode {
        file: PathBuf,

        /// Require the module to implement this contract
        #[arg(long)]
        contract: Option<String>,

        #[arg(long)]
        json: bool,
    },
    /// Validate a service configuration file
    Check { config: PathBuf },
}

/// Reader used when no source file is given.
struct NoSource;

impl SourceReader for NoSource {
    fn read(&self, _path: &Path) -> Result<HashMap<String, String>, SourceError> {
        Ok(HashMap::new())
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init(cli.log_level.as_deref());

    match cli.command {
        Commands::Emit {
            contract,
            source,
            accessors,
            out,
        } => emit(&contract, source.as_deref(), &accessors, out.as_deref()),
        Commands::Decode { file, contract, json } => decode(&file, contract.as_deref(), json),
        Commands::Check { config } => {
            let config = load_config(&config)?;
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn parse_accessor(spec: &str) -> Result<AccessorDecl, String> {
    let mut parts = spec.splitn(4, ':');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(name), Some(kind), Some(key), Some(default)) if !name.is_empty() => {
            Ok(AccessorDecl::new(name, kind).key(key).default_value(default))
        }
        _ => Err(format!("accessor {spec:?} is not name:kind:key:default")),
    }
}

fn emit(
    contract: &str,
    source: Option<&Path>,
    accessors: &[String],
    out: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (locator, reader): (String, Arc<dyn SourceReader>) = match source {
        Some(path) => (path.display().to_string(), Arc::new(PropertiesReader)),
        None => ("defaults.properties".to_string(), Arc::new(NoSource)),
    };

    let decl = accessors
        .iter()
        .map(|spec| parse_accessor(spec))
        .try_fold(ContractDecl::capability(contract, locator), |decl, accessor| {
            accessor.map(|a| decl.accessor(a))
        })?;
    let descriptor = decl.validate()?;

    let resolver = ContractResolver::new(reader, LocatorResolver::default(), Arc::new(WatchRegistry::new()));
    let binding = resolver.resolve(&descriptor)?;
    for warning in &binding.warnings {
        eprintln!("warning: {warning}");
    }

    let interface = internal_name(&descriptor.type_name);
    let module = binding
        .accessors
        .iter()
        .fold(
            ModuleBuilder::new(format!("{interface}$CG1")).implements(interface),
            |builder, a| builder.method(a.name.clone(), a.value.clone()),
        )
        .build()?;
    // Refuse to hand out bytes that would not activate.
    activate(module.clone(), &descriptor)?;

    match out {
        Some(path) => {
            fs::write(path, module.as_bytes())?;
            eprintln!("wrote {} bytes to {}", module.as_bytes().len(), path.display());
        }
        None => print!("{}", hex_dump(module.as_bytes())),
    }
    Ok(())
}

fn decode(file: &Path, contract: Option<&str>, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let module = BinaryModule::from_bytes(fs::read(file)?);
    let loaded = inspect(&module)?;

    if let Some(expected) = contract {
        if loaded.contract() != expected {
            return Err(format!("module implements {:?}, not {expected}", loaded.contract()).into());
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&loaded)?);
        return Ok(());
    }

    println!("{} implements {}", loaded.type_name(), loaded.contract());
    for slot in loaded.slots() {
        println!("  {}() -> {} = {}", slot.name, slot.value.kind(), slot.value);
    }
    Ok(())
}

fn hex_dump(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for line in bytes.chunks(16) {
        let hex: Vec<String> = line.iter().map(|b| format!("{b:02x}")).collect();
        out.push_str(&hex.join(" "));
        out.push('\n');
    }
    out
}
