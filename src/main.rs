use std::time::{Duration, Instant};

use anyhow::Context;
use lane_sim::{scenario, SimulationConfig, World};

/// Number of frames between progress reports.
const REPORT_FRAMES: usize = 500;

/// Runs the highway scenario without rendering.
///
/// Usage: `lane-sim [config.toml] [frames]`
fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => SimulationConfig::load(&path)
            .with_context(|| format!("failed to load config from {}", path))?,
        None => SimulationConfig::default(),
    };
    let frames = match args.next() {
        Some(frames) => frames.parse().context("frame count must be a number")?,
        None => 5000,
    };

    let mut world = World::new(config)?;
    scenario::highway(&mut world)?;
    log::info!("Simulating {} frames", frames);

    let fixed_dt = world.config().fixed_time_step();
    let mut dt = fixed_dt.unwrap_or(0.0);
    let mut elapsed = Duration::ZERO;
    let mut anomalies = 0;
    for frame in 1..=frames {
        let start = Instant::now();
        world.update(dt);
        anomalies += world.take_anomalies().len();
        let frame_time = start.elapsed();
        elapsed += frame_time;
        dt = fixed_dt.unwrap_or(frame_time.as_secs_f64());

        if frame % REPORT_FRAMES == 0 {
            let avg = elapsed / REPORT_FRAMES as u32;
            println!(
                "Frame {}: avg. {:?} per frame, {} vehicles on the road, {} in the pool, {} anomalies",
                frame,
                avg,
                world.iter_vehicles().count(),
                world.pool().len(),
                anomalies,
            );
            elapsed = Duration::ZERO;
        }
    }
    Ok(())
}
