use approx::assert_relative_eq;
use mcl_core::control::Body;
use mcl_core::lifecycle::LifecycleNode;
use mcl_core::map::{CellCode, OccupancyGrid, ValidPositions};
use mcl_core::perception::sensors::{LookupTable, LookupTableBuilder, RayCastParams, SensorKind};
use mcl_core::{Localizer, MclConfig, MotionCommand, Particle, PerceptionStack, Pose};
use std::sync::Arc;

/// `free` x `free` room of free cells inside a one-cell wall
fn room(free: usize) -> Arc<OccupancyGrid> {
    let side = free + 2;
    let mut grid = OccupancyGrid::new(side, side, CellCode::Obstacle).unwrap();
    grid.fill_rect(1..free + 1, 1..free + 1, CellCode::Free);
    Arc::new(grid)
}

fn config() -> MclConfig {
    let mut config = MclConfig::default();
    config.map.cells_per_unit = 1;
    config.sensor.beam_count = 8;
    config.sensor.max_range = 12.0;
    config.sensor.min_range = 0.1;
    config.sensor.origin_offset = 0.0;
    config.sensor.samples_per_beam = 240;
    config.filter.seed = 21;
    config
}

fn table(grid: &Arc<OccupancyGrid>, config: &MclConfig) -> Arc<LookupTable> {
    let valid = ValidPositions::from_grid(grid);
    let params = RayCastParams::from_config(&config.sensor, config.map.cells_per_unit);
    Arc::new(
        LookupTableBuilder::new(Arc::clone(grid), params)
            .build(&valid)
            .unwrap(),
    )
}

#[test]
fn test_noise_free_single_particle_tracks_agent() {
    let grid = room(3);
    let mut config = config();
    config.motion.forward_noise_std = 0.0;
    config.motion.angular_noise_std = 0.0;
    config.filter.particle_count = 1;
    config.filter.min_particle_count = 1;
    config.filter.jitter_position_min = 0.0;
    config.filter.jitter_position_max = 0.0;
    config.filter.jitter_heading_std = 0.0;

    let lut = table(&grid, &config);
    let valid = Arc::new(ValidPositions::from_grid(&grid));
    let mut localizer = Localizer::new(&config, Arc::clone(&grid), valid, Some(lut)).unwrap();

    let start = Pose::new(2.0, 2.0, 0.0);
    localizer.place_agent(start).unwrap();
    localizer
        .filter_mut()
        .set_particles(vec![Particle::new(start, 1.0)]);

    let command = MotionCommand::new(0.5, 0.0);
    for expected_x in [2.5, 3.0] {
        let report = localizer.tick(command, 1.0).unwrap();
        assert_eq!(report.particle_count, 1);
        assert!(report.resampled);
        assert_relative_eq!(report.estimate.x, expected_x, epsilon = 1e-12);
        assert_relative_eq!(report.estimate.y, 2.0, epsilon = 1e-12);
        assert_relative_eq!(report.estimate.theta, 0.0, epsilon = 1e-12);
        assert_eq!(localizer.agent().pose(), &report.estimate);
    }

    let estimate = localizer.get_pose();
    assert_relative_eq!(estimate.x, 3.0, epsilon = 1e-12);
    assert_relative_eq!(estimate.y, 2.0, epsilon = 1e-12);
    assert_relative_eq!(estimate.theta, 0.0, epsilon = 1e-12);
    assert_eq!(localizer.agent().pose(), &estimate);
}

#[test]
fn test_population_stays_normalized_and_above_minimum() {
    let grid = room(10);
    let mut config = config();
    config.filter.particle_count = 300;
    config.filter.min_particle_count = 80;

    let lut = table(&grid, &config);
    let valid = Arc::new(ValidPositions::from_grid(&grid));
    let mut localizer = Localizer::new(&config, Arc::clone(&grid), valid, Some(lut)).unwrap();

    let commands = [
        MotionCommand::new(1.0, 0.0),
        MotionCommand::new(0.0, 0.8),
        MotionCommand::stop(),
        MotionCommand::new(1.5, -0.3),
    ];
    for i in 0..12 {
        let report = localizer.tick(commands[i % commands.len()], 0.2).unwrap();
        assert!(report.particle_count >= 80);
        assert!((0.0..=1.0).contains(&report.certainty));

        let weights: Vec<f64> = localizer.particles().iter().map(|p| p.weight).collect();
        assert!(weights.iter().all(|&w| w > 0.0));
        assert_relative_eq!(weights.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
        for p in localizer.particles() {
            assert!(grid.is_free_at(p.pose.x, p.pose.y));
        }
    }
}

#[test]
fn test_same_seed_gives_same_run() {
    let grid = room(8);
    let mut config = config();
    config.filter.particle_count = 120;
    config.filter.min_particle_count = 30;
    let lut = table(&grid, &config);
    let valid = Arc::new(ValidPositions::from_grid(&grid));

    let run = || {
        let mut localizer = Localizer::new(
            &config,
            Arc::clone(&grid),
            Arc::clone(&valid),
            Some(Arc::clone(&lut)),
        )
        .unwrap();
        (0..5)
            .map(|_| localizer.tick(MotionCommand::new(1.0, 0.4), 0.25).unwrap())
            .collect::<Vec<_>>()
    };

    assert_eq!(run(), run());
}

#[test]
fn test_perception_stack_reads_published_table() {
    let grid = room(6);
    let dir = tempfile::tempdir().unwrap();
    let mut config = config();
    config.filter.particle_count = 60;
    config.filter.min_particle_count = 20;
    config.lookup_table.path = dir.path().join("room.lut");
    assert_eq!(config.filter.particle_sensor, SensorKind::Lookup);

    table(&grid, &config).save(&config.lookup_table.path).unwrap();

    let mut stack = PerceptionStack::with_grid(config, grid);
    stack.on_configure().unwrap();
    stack.on_activate().unwrap();

    let report = stack.tick(MotionCommand::new(1.0, 0.0), 0.1).unwrap();
    assert_eq!(stack.get_pose(), Some(report.estimate));
    assert_eq!(
        stack.localizer().unwrap().filter().sensor().name(),
        "lookup"
    );
}

#[test]
fn test_hardware_scan_drives_the_filter() {
    let grid = room(6);
    let mut config = config();
    config.filter.particle_count = 50;
    config.filter.min_particle_count = 10;
    config.filter.particle_sensor = SensorKind::RayCast;

    let valid = Arc::new(ValidPositions::from_grid(&grid));
    let mut localizer = Localizer::new(&config, grid, valid, None).unwrap();

    let mut raw = mcl_core::perception::sensors::serial::RawScan::new(
        8,
        config.sensor.min_range,
        config.sensor.max_range,
    );
    for line in [
        "0,3.0", "45,4.2", "90,3.0", "oops", "135,4.2", "180,3.0", "225,4.2", "270,3.0", "315,4.2",
    ] {
        raw.push_line(line);
    }
    assert!(raw.is_complete());

    let scan = raw.to_scan(config.sensor.beam_count);
    let report = localizer
        .tick_with_scan(MotionCommand::new(0.5, 0.0), 0.1, &scan)
        .unwrap();
    assert!(report.resampled);
    assert!(report.particle_count >= 10);
}
