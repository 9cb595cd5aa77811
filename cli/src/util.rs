use std::io::Read;
use std::path::PathBuf;

use serde::Serialize;
use spotter_core::config::ResolutionConfig;
use spotter_core::error::{ErrorBody, codes};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Structured JSON logs on stderr so stdout stays a single JSON document.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "spotter_core=info,spotter_cli=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();
}

pub fn exit_error(message: &str, docs_hint: Option<&str>) -> ! {
    let mut body = ErrorBody::new(codes::CLI_ERROR, message);
    if let Some(hint) = docs_hint {
        body = body.with_hint(hint);
    }
    exit_with(&body)
}

pub fn exit_with(body: &ErrorBody) -> ! {
    let rendered =
        serde_json::to_string_pretty(body).unwrap_or_else(|_| body.message.clone());
    eprintln!("{rendered}");
    std::process::exit(1);
}

/// Print a JSON document to stdout. Returns the process exit code.
pub fn print_json<T: Serialize>(value: &T, raw: bool) -> i32 {
    let rendered = if raw {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    };
    match rendered {
        Ok(text) => {
            println!("{text}");
            0
        }
        Err(e) => exit_error(&format!("Failed to render output: {e}"), None),
    }
}

/// Read JSON from a file path or stdin (when path is "-").
pub fn read_json_from_file(path: &str) -> Result<serde_json::Value, String> {
    let raw = if path == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| format!("Failed to read stdin: {e}"))?;
        buf
    } else {
        std::fs::read_to_string(path).map_err(|e| format!("Failed to read file '{path}': {e}"))?
    };
    serde_json::from_str(&raw).map_err(|e| format!("Invalid JSON in '{path}': {e}"))
}

/// Engine config: defaults, then an optional JSON file, then environment.
pub fn load_config(path: Option<&str>) -> Result<ResolutionConfig, String> {
    let base = match path {
        Some(path) => {
            let value = read_json_from_file(path)?;
            let config: ResolutionConfig = serde_json::from_value(value)
                .map_err(|e| format!("Invalid resolution config in '{path}': {e}"))?;
            config
                .validate()
                .map_err(|e| format!("Invalid resolution config in '{path}': {e}"))?;
            config
        }
        None => ResolutionConfig::default(),
    };
    Ok(base.with_env_overrides(|key| std::env::var(key).ok()))
}

pub fn default_episodes_path() -> PathBuf {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("spotter");
    data_dir.join("episodes.jsonl")
}
