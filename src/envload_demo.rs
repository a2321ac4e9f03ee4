use std::io::Write;
use std::path::PathBuf;

use clap::Parser;
use tracing::{info, warn};

use envload::builder::Builder;
use envload::config::{env_path, ConfigLoader, Precedence, ProcessEnv};
use envload::logging::{self, LogLevel};

const DEFAULT_KEYS: [&str; 3] = ["KEY0", "KEY1", "KEY2"];

/// Load an env file and sign the token stored under each requested key.
#[derive(Parser, Debug)]
#[command(name = "envload-demo", version)]
struct Args {
    /// Directory holding the env file
    #[arg(long, default_value = ".")]
    dir: PathBuf,

    /// Env file name inside --dir
    #[arg(long, default_value = ".env")]
    file: PathBuf,

    /// Fall back to process environment variables for keys missing from the file
    #[arg(long)]
    env_fallback: bool,

    /// Let process environment variables override the file (implies --env-fallback)
    #[arg(long)]
    env_first: bool,

    /// DEBUG, INFO, WARN or ERROR. Defaults to LOG_LEVEL from the env file, then INFO
    #[arg(long)]
    log_level: Option<String>,

    /// Keys to look up
    keys: Vec<String>,
}

// Exits with status 1 when any requested key is absent so scripts can check
// that an env file is complete.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let path = env_path(&args.dir, &args.file);

    // The subscriber must be up before the real load so its warnings reach
    // stderr. Without --log-level, peek at the file for LOG_LEVEL first.
    let level = match &args.log_level {
        Some(level) => level.clone(),
        None => ConfigLoader::try_load_mapping(&path)
            .ok()
            .and_then(|mut map| map.remove("LOG_LEVEL"))
            .unwrap_or_else(|| "INFO".to_string()),
    };
    logging::init(LogLevel::from_str(&level));

    let loader = if args.env_first {
        ConfigLoader::with_env(&path, ProcessEnv, Precedence::EnvFirst)
    } else if args.env_fallback {
        ConfigLoader::with_env(&path, ProcessEnv, Precedence::FileFirst)
    } else {
        ConfigLoader::new(&path)
    };

    info!(
        "Loaded {} entries from {} ({:?})",
        loader.len(),
        loader.path().display(),
        loader.precedence()
    );

    let keys: Vec<String> = if args.keys.is_empty() {
        DEFAULT_KEYS.iter().map(|k| k.to_string()).collect()
    } else {
        args.keys
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut missing = 0;
    for key in &keys {
        match Builder::from_config(&loader, key) {
            Some(builder) => {
                writeln!(out, "{} token={} sig={}", key, builder.token(), builder.sign())?;
            }
            None => {
                warn!("Key {} not found", key);
                writeln!(out, "{} absent", key)?;
                missing += 1;
            }
        }
    }
    out.flush()?;

    if missing > 0 {
        std::process::exit(1);
    }
    Ok(())
}
