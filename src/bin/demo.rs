//! Scripted end-to-end run against the in-memory mock device.
//!
//! Exercises the full dispatch path: facade configuration, property reads
//! and writes, shooting, live view, and symbolic control lookup.

use anyhow::Result;
use camkit::{Camera, CameraConfig, CommandDispatcher, MockSdk, ShootOptions};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "camkit-demo",
    about = "Drive the mock camera through the dispatch core"
)]
struct Args {
    /// Number of exposures to take
    #[arg(long, default_value_t = 2)]
    shots: u32,

    /// ISO speed to set before shooting
    #[arg(long, default_value_t = 800)]
    iso: i64,

    /// Default command timeout (humantime notation, e.g. "2s")
    #[arg(long, default_value = "2s")]
    timeout: String,

    /// Directory for captured images (defaults to the system temp dir)
    #[arg(long)]
    shot_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let sdk = Arc::new(match &args.shot_dir {
        Some(dir) => MockSdk::with_shot_dir(dir),
        None => MockSdk::new(),
    });
    let dispatcher = Arc::new(CommandDispatcher::new(sdk)?);
    let camera = Camera::open(&dispatcher)?;

    let config = CameraConfig::from_toml_str(&format!(
        "default-timeout = \"{}\"\naudit-label = \"demo\"\n\n[retry]\nattempts = 3\ndelay = \"25ms\"\n",
        args.timeout
    ))?;
    camera.apply_config(&config)?;

    let name = camera.property().product_name()?;
    info!(%name, session = %camera.session(), "connected");

    let iso_values = camera.property().available_iso_speed_async().wait()?;
    info!(?iso_values, "available ISO speeds");
    camera.property().set_iso_speed_async(args.iso).wait()?;

    let options = ShootOptions {
        frame_count: args.shots,
        ..ShootOptions::default()
    };
    info!(options = %serde_json::to_string(&options)?, "shooting");
    let files = camera.shoot().shoot_with(options)?;
    for file in &files {
        info!(file = %file.display(), "captured");
    }

    camera.live_view().begin_async().wait()?;
    let frame = camera.live_view().download_frame_buffer_async().wait()?;
    info!(bytes = frame.len(), "live view frame downloaded");
    camera.live_view().end_async().wait()?;

    camera.send_control_symbolic("extend-shutdown-timer")?.wait()?;

    camera.close()?;
    dispatcher.shutdown();
    Ok(())
}
