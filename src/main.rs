//! VeriTouch engine entrypoint: reads a train or predict request (JSON) from
//! a file or stdin, runs it against the local engine state, and writes the
//! response envelope as a single JSON line on stdout. Logs go to stderr.

use serde::Serialize;
use std::io::Read;
use std::path::PathBuf;
use tracing::info;
use veritouch_engine::{
    config::EngineConfig,
    engine::{PredictRequest, RiskEngine, TrainRequest},
    logging::StructuredLogger,
};

#[derive(Serialize)]
struct ErrorEnvelope {
    error: &'static str,
    message: String,
}

fn read_request(path: Option<&str>) -> Result<String, std::io::Error> {
    match path {
        Some(p) => std::fs::read_to_string(p),
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}

fn run() -> Result<(), veritouch_engine::EngineError> {
    let args: Vec<String> = std::env::args().collect();
    let mode = args.get(1).map(String::as_str).unwrap_or("");
    if mode != "train" && mode != "predict" {
        eprintln!("usage: veritouch-engine <train|predict> [request.json]");
        std::process::exit(2);
    }

    let raw = read_request(args.get(2).map(String::as_str))?;

    let config_path = std::env::var("VERITOUCH_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.json"));
    let config = EngineConfig::load(&config_path);
    StructuredLogger::init(config.log.json, &config.log.level);
    info!(data_dir = ?config.data_dir, mode, "veritouch engine starting");

    let engine = RiskEngine::new(config)?;
    let mut stdout = std::io::stdout();

    // Malformed requests are structural failures, rejected before any state
    // is touched.
    if mode == "train" {
        let request: TrainRequest = serde_json::from_str(&raw)
            .map_err(|e| veritouch_engine::EngineError::Structural(format!("invalid request: {e}")))?;
        let response = engine.train(&request)?;
        StructuredLogger::emit_json(&response, &mut stdout);
    } else {
        let request: PredictRequest = serde_json::from_str(&raw)
            .map_err(|e| veritouch_engine::EngineError::Structural(format!("invalid request: {e}")))?;
        let response = engine.predict(&request)?;
        StructuredLogger::emit_json(&response, &mut stdout);
    }

    Ok(())
}

fn main() {
    if let Err(e) = run() {
        let envelope = ErrorEnvelope {
            error: e.kind(),
            message: e.to_string(),
        };
        StructuredLogger::emit_json(&envelope, &mut std::io::stdout());
        std::process::exit(1);
    }
}
