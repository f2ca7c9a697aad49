use std::path::PathBuf;
use std::process::ExitCode;

use q3logparser::{parse_log, LogSource};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_PATH: &str = "games.log";
const LOG_PATH_ENV: &str = "Q3_LOG_PATH";

fn main() -> ExitCode {
    init_logging();

    // 1. Resolve log path and output format
    let (log_path, pretty) = resolve_args();

    // 2. Parse (read failures are logged inside parse_log)
    let matches = match parse_log(&LogSource::from_path(&log_path)) {
        Ok(m) => m,
        Err(_) => return ExitCode::FAILURE,
    };
    info!(path = %log_path.display(), matches = matches.len(), "parsed log");

    // 3. Emit the match list as JSON on stdout
    let json = if pretty {
        serde_json::to_string_pretty(&matches)
    } else {
        serde_json::to_string(&matches)
    };
    match json {
        Ok(out) => {
            println!("{}", out);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("failed to serialize matches: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::builder()
        .with_default_directive(tracing::Level::INFO.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn resolve_args() -> (PathBuf, bool) {
    let mut pretty = false;
    let mut path_arg = None;
    for arg in std::env::args().skip(1) {
        if arg == "--pretty" {
            pretty = true;
        } else if path_arg.is_none() {
            path_arg = Some(PathBuf::from(arg));
        }
    }

    // CLI argument first, then environment, then the default file name
    let path = path_arg
        .or_else(|| std::env::var_os(LOG_PATH_ENV).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_PATH));

    (path, pretty)
}
