use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use mcl_core::control::Body;
use mcl_core::perception::sensors::SensorKind;
use mcl_core::{MclConfig, MclCore, MotionCommand, PerceptionStack};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// Headless Monte Carlo localization run with a simulated rover
#[derive(Parser, Debug)]
#[command(name = "mcl_sim", version, about)]
struct Args {
    /// TOML configuration; built-in defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of ticks to run
    #[arg(long, default_value_t = 300)]
    ticks: usize,

    /// Seconds per tick
    #[arg(long, default_value_t = 0.1)]
    dt: f64,

    /// Ray-cast particle scans instead of reading the lookup table
    #[arg(long)]
    ray_cast: bool,

    /// Pace ticks at wall-clock speed
    #[arg(long)]
    realtime: bool,

    /// Forward speed in cells per second
    #[arg(long, default_value_t = 10.0)]
    speed: f64,

    /// Turn rate in radians per second
    #[arg(long, default_value_t = 1.0)]
    turn_rate: f64,

    /// Turn away from anything closer than this many units ahead
    #[arg(long, default_value_t = 6.0)]
    clearance: f64,
}

/// Tick period for `dt` seconds
fn tick_period(dt: f64) -> Result<Duration> {
    if !(dt > 0.0 && dt.is_finite()) {
        bail!("--dt must be a positive number of seconds, got {dt}");
    }
    Ok(Duration::from_secs_f64(dt))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let period = tick_period(args.dt)?;
    let mut config = match &args.config {
        Some(path) => MclConfig::from_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => MclConfig::default(),
    };
    if args.ray_cast {
        config.filter.particle_sensor = SensorKind::RayCast;
    }
    let cells_per_unit = config.map.cells_per_unit as f64;

    let mut core = MclCore::new();
    core.register(PerceptionStack::new(config));
    core.init().context("failed to start perception stack")?;

    let stack = core
        .perception_stack_mut()
        .ok_or_else(|| anyhow!("perception stack not registered"))?;

    let mut interval = args.realtime.then(|| tokio::time::interval(period));
    let mut error_sum = 0.0;

    for tick in 0..args.ticks {
        if let Some(interval) = interval.as_mut() {
            interval.tick().await;
        }

        let localizer = stack
            .localizer()
            .ok_or_else(|| anyhow!("perception stack has no localizer"))?;
        let ahead = localizer
            .agent()
            .observe()
            .ranges()
            .first()
            .copied()
            .unwrap_or(f64::INFINITY);
        let command = if ahead < args.clearance {
            MotionCommand::new(0.0, args.turn_rate)
        } else {
            MotionCommand::new(args.speed, 0.0)
        };

        let report = stack.tick(command, args.dt)?;
        let truth = *stack
            .localizer()
            .ok_or_else(|| anyhow!("perception stack has no localizer"))?
            .agent()
            .pose();
        let error = report.estimate.distance_to(&truth) / cells_per_unit;
        error_sum += error;

        info!(
            tick,
            est_x = report.estimate.x,
            est_y = report.estimate.y,
            true_x = truth.x,
            true_y = truth.y,
            error,
            certainty = report.certainty,
            particles = report.particle_count,
            "tick"
        );
    }

    if args.ticks > 0 {
        info!(
            mean_error = error_sum / args.ticks as f64,
            "simulation finished"
        );
    }

    core.shutdown().context("failed to stop perception stack")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_period_rejects_unusable_dt() {
        assert_eq!(tick_period(0.25).unwrap(), Duration::from_millis(250));
        for dt in [0.0, -0.1, f64::NAN, f64::INFINITY] {
            assert!(tick_period(dt).is_err(), "dt {dt}");
        }
    }
}
