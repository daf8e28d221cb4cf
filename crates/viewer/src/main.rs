mod config;
mod overlay;
mod service;
mod sync;
mod video;

use anyhow::Context;
use common::{Environment, setup_logging};
use config::ViewerConfig;
use service::ViewerService;
use signal_hook::{
    consts::{SIGINT, SIGTERM},
    flag,
};
use std::env;
use std::path::Path;
use std::process;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        let program = args.first().map(String::as_str).unwrap_or("viewer");
        eprintln!("Usage: {program} <video_path>");
        process::exit(1);
    }
    let video_path = args[1].clone();

    if !Path::new(&video_path).exists() {
        eprintln!("Error: video file '{video_path}' not found");
        process::exit(1);
    }

    setup_logging(Environment::from_env());

    let config = ViewerConfig::from_env()?;
    tracing::info!(video = %video_path, output = %config.output_path, "Viewer starting");

    let shutdown = Arc::new(AtomicBool::new(false));
    flag::register(SIGTERM, Arc::clone(&shutdown))?;
    flag::register(SIGINT, Arc::clone(&shutdown))?;
    tracing::info!("Signal handlers registered (SIGTERM, SIGINT)");

    let service = ViewerService::new(config, &video_path, shutdown)
        .context("Failed to initialize the viewer")?;
    service.run()
}
