mod environment;
mod people_generator;
mod statistics;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::unbounded;
use log::{error, info};

use dispatch::car::{Car, CarSettings};
use dispatch::controller::{ChannelNotifier, Controller};
use shared_resources::config::{Config, DEFAULT_CONFIG_PATH};

use crate::environment::Environment;
use crate::people_generator::PeopleGenerator;
use crate::statistics::{StatsRegistry, StatisticsWriter, REPORT_PERIOD, STATISTICS_PATH};

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        error!("simulator failed to start: {}", err);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let config = Config::load(&config_path)?;
    info!("simulating with {:?}", config);

    let (signal_tx, signal_rx) = unbounded();
    let environment = Arc::new(Environment::new(
        config.building.min_floor,
        config.building.max_floor,
        signal_tx.clone(),
    ));
    let registry = Arc::new(StatsRegistry::new(1..=config.elevator.count));
    let notifier = Arc::new(ChannelNotifier::new(signal_tx.clone()));

    let settings = CarSettings {
        min_floor: config.building.min_floor,
        max_floor: config.building.max_floor,
        capacity_weight: config.elevator.capacity_weight,
        floor_travel_time: Duration::from_millis(config.elevator.floor_travel_time_ms),
        door_open_time: Duration::from_millis(config.elevator.door_open_time_ms),
        door_close_time: Duration::from_millis(config.elevator.door_close_time_ms),
    };
    let cars = (1..=config.elevator.count)
        .map(|id| {
            Car::new(
                id,
                config.building.min_floor,
                settings.clone(),
                notifier.clone(),
                environment.clone(),
                registry.clone(),
            )
            .map(Arc::new)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let controller = Arc::new(Controller::new(cars, signal_tx, signal_rx)?);
    let mut handles = controller.start();

    let generator = Arc::new(PeopleGenerator::new(
        environment,
        config.building.min_floor,
        config.building.max_floor,
        Duration::from_millis(config.simulation.person_spawn_interval_ms),
    ));
    handles.push(generator.start());

    let writer = Arc::new(StatisticsWriter::new(
        registry,
        Path::new(STATISTICS_PATH).to_path_buf(),
        REPORT_PERIOD,
    ));
    handles.push(writer.start());

    // the simulation runs until the process is killed
    for handle in handles {
        let _ = handle.join();
    }
    Ok(())
}
