//! enumstore CLI
//!
//! Command-line tool for inspecting and populating string enumerators.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use enumstore::{
    inspect_header, Config, EnumContext, HeaderStatus, PersistentEnumerator, StorageBackend,
    StringDescriptor, NULL_ID,
};
use tracing_subscriber::{fmt, EnvFilter};

/// enumstore CLI
#[derive(Parser, Debug)]
#[command(name = "enumstore-cli")]
#[command(about = "Inspect and populate persistent string enumerators")]
#[command(version)]
struct Args {
    /// Primary enumerator file
    #[arg(short, long)]
    file: PathBuf,

    /// Storage backend for the primary file
    #[arg(short, long, value_enum, default_value = "mapped")]
    backend: Backend,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Backend {
    Mapped,
    RandomAccess,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Assign ids to keys, creating them when absent
    Enumerate {
        /// Keys to enumerate
        keys: Vec<String>,
    },

    /// Look up the id of a key without creating it
    Lookup {
        /// The key to look up
        key: String,
    },

    /// Print the key assigned to an id
    ValueOf {
        /// The id to resolve
        id: u32,
    },

    /// Print every id and key through the hash directory
    Dump,

    /// Print every key in the key stream, in append order
    ScanKeys,

    /// Report the header status without opening the store
    Status,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,enumstore=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        tracing::error!("{}", e);
        process::exit(1);
    }
}

fn run(args: Args) -> enumstore::Result<()> {
    if let Commands::Status = args.command {
        let status = inspect_header(&args.file)?;
        println!("{}: {}", args.file.display(), describe(status));
        return Ok(());
    }

    let backend = match args.backend {
        Backend::Mapped => StorageBackend::Mapped,
        Backend::RandomAccess => StorageBackend::RandomAccess,
    };
    let mut config = Config::from_env()?;
    config.storage_backend = backend;

    let context = Arc::new(EnumContext::from_config(&config));
    let store = PersistentEnumerator::open(&args.file, StringDescriptor::new(), &config, context)?;

    let result = execute(&store, args.command);
    let closed = store.close();
    result.and(closed)
}

fn execute(store: &PersistentEnumerator<StringDescriptor>, command: Commands) -> enumstore::Result<()> {
    match command {
        Commands::Enumerate { keys } => {
            for key in keys {
                let id = store.enumerate(&key)?;
                println!("{}\t{}", id, key);
            }
        }
        Commands::Lookup { key } => match store.try_enumerate(&key)? {
            NULL_ID => println!("{}: not found", key),
            id => println!("{}\t{}", id, key),
        },
        Commands::ValueOf { id } => {
            println!("{}\t{}", id, store.value_of(id)?);
        }
        Commands::Dump => {
            store.traverse_all_records(|id| {
                println!("{}\t{}", id, store.value_of(id)?);
                Ok(true)
            })?;
        }
        Commands::ScanKeys => {
            store.iterate_data(|key| {
                println!("{}", key);
                Ok(true)
            })?;
        }
        // Reported from the header alone, before opening
        Commands::Status => {}
    }
    Ok(())
}

fn describe(status: HeaderStatus) -> String {
    match status {
        HeaderStatus::Missing => "missing".to_string(),
        HeaderStatus::Empty => "empty (never initialized)".to_string(),
        HeaderStatus::Clean => "clean".to_string(),
        HeaderStatus::Dirty => "dirty (not closed cleanly; will refuse to open)".to_string(),
        HeaderStatus::Unknown(magic) => format!("unknown magic {:#010x}", magic),
    }
}
