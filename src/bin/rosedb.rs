//! rosedb command-line tool
//!
//! Opens a database directory, runs one command through the registry,
//! prints the reply and closes the database.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use rosedb::cmd::CommandRegistry;
use rosedb::config::CONFIG_FILE_NAME;
use rosedb::{Config, FileRwMethod, IndexMode, RoseDb};
use tracing_subscriber::{fmt, EnvFilter};

/// rosedb
#[derive(Parser, Debug)]
#[command(name = "rosedb")]
#[command(about = "Run a single command against a rosedb directory")]
#[command(version)]
struct Args {
    /// Database directory
    #[arg(short, long, default_value = "./rosedb_data")]
    dir: PathBuf,

    /// Segment file size in MB (new databases only)
    #[arg(short, long, default_value = "16")]
    block_mb: u64,

    /// Segment access method (new databases only)
    #[arg(long, value_enum, default_value = "file-io")]
    rw_method: RwMethodArg,

    /// Keep only keys in memory (new databases only)
    #[arg(long)]
    key_only: bool,

    /// Command name, e.g. set, get, ttl
    command: String,

    /// Command arguments
    args: Vec<String>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum RwMethodArg {
    FileIo,
    Mmap,
}

fn main() -> ExitCode {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,rosedb=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    tracing::debug!("rosedb v{}", rosedb::VERSION);

    let opened = if args.dir.join(CONFIG_FILE_NAME).exists() {
        RoseDb::reopen(&args.dir)
    } else {
        let config = Config::builder()
            .dir_path(&args.dir)
            .block_size(args.block_mb * 1024 * 1024)
            .rw_method(match args.rw_method {
                RwMethodArg::FileIo => FileRwMethod::FileIo,
                RwMethodArg::Mmap => FileRwMethod::MMap,
            })
            .idx_mode(if args.key_only {
                IndexMode::KeyOnlyMem
            } else {
                IndexMode::KeyValueMem
            })
            .build();
        RoseDb::open(config)
    };

    let db = match opened {
        Ok(db) => db,
        Err(e) => {
            tracing::error!("Failed to open database: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let registry = CommandRegistry::new();
    let cmd_args: Vec<Vec<u8>> = args.args.into_iter().map(String::into_bytes).collect();

    let status = match registry.execute(&db, &args.command, &cmd_args) {
        Ok(reply) => {
            println!("{}", reply);
            ExitCode::SUCCESS
        }
        Err(e) => {
            println!("(error) ERR {}", e);
            ExitCode::FAILURE
        }
    };

    if let Err(e) = db.close() {
        tracing::error!("Failed to close database: {}", e);
        return ExitCode::FAILURE;
    }
    status
}
