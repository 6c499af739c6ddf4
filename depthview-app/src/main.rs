//! depthview
//!
//! Streams depth and color from a depth camera, turns every depth pixel into a
//! colored 3D point, and draws the cloud from a slowly swinging camera.

mod delegate;

use clap::Parser;
use delegate::PointCloudDelegate;
use depthview_capture::{DepthCamera, SyntheticConfig, SyntheticProvider, SyntheticSensor};
use std::error::Error;
use tracing::info;

/// depthview - live colored point cloud viewer
#[derive(Parser, Debug)]
#[command(name = "depthview")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Simulate a missed depth poll every N frames (0 disables)
    #[arg(long, default_value_t = 0)]
    drop_depth_every: u32,

    /// Simulate a missed color poll every N frames (0 disables)
    #[arg(long, default_value_t = 0)]
    drop_color_every: u32,

    /// Window title
    #[arg(long, default_value = "depthview")]
    title: String,
}

impl Args {
    fn sensor_config(&self) -> SyntheticConfig {
        SyntheticConfig {
            drop_depth_every: self.drop_depth_every,
            drop_color_every: self.drop_color_every,
        }
    }
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let provider = SyntheticProvider::new(args.sensor_config());
    let camera = DepthCamera::connect(&provider)?;
    info!(
        "Sensor ready: {}x{} ({} points)",
        camera.resolution().width,
        camera.resolution().height,
        camera.point_count()
    );

    depthview_window::run_with_delegate::<PointCloudDelegate<SyntheticSensor>>(
        &args.title,
        camera,
    )
}

fn main() {
    depthview_window::init_tracing();

    let args = Args::parse();
    if let Err(e) = run(args) {
        eprintln!("Application error: {}", e);
        std::process::exit(1);
    }
}
