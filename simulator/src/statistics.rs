use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{spawn, JoinHandle};
use std::time::{Duration, Instant};

use log::{error, info};
use parking_lot::Mutex;

use dispatch::capabilities::StatsSink;
use shared_resources::person::Person;

pub const STATISTICS_PATH: &str = "statistics.txt";

/// How often the report file gets a new snapshot.
pub const REPORT_PERIOD: Duration = Duration::from_secs(5);

/// Ride bookkeeping for a single car. Boarded riders are held with their
/// boarding time until the car reports dropping them off.
#[derive(Default)]
struct StatisticProcessor {
    in_flight: Vec<(Person, Instant)>,
    completed_rides: u64,
    total_ride_time: Duration,
    total_floors_travelled: u64,
    total_weight_delivered: u64,
    pickups_by_floor: HashMap<i32, u64>,
    dropoffs_by_floor: HashMap<i32, u64>,
}

impl StatisticProcessor {
    fn on_pick(&mut self, floor: i32, timestamp: Instant, people: &[Person]) {
        for person in people {
            *self.pickups_by_floor.entry(floor).or_default() += 1;
            self.in_flight.push((person.clone(), timestamp));
        }
    }

    fn on_drop(&mut self, floor: i32, timestamp: Instant, people: &[Person]) {
        for person in people {
            let position = self
                .in_flight
                .iter()
                .position(|(boarded, _)| boarded == person);
            if let Some(position) = position {
                let (rider, boarded_at) = self.in_flight.swap_remove(position);
                self.completed_rides += 1;
                self.total_ride_time += timestamp.saturating_duration_since(boarded_at);
                self.total_floors_travelled +=
                    (rider.target_floor - rider.start_floor).unsigned_abs() as u64;
                self.total_weight_delivered += rider.weight as u64;
                *self.dropoffs_by_floor.entry(floor).or_default() += 1;
            }
        }
    }

    fn average_ride_time(&self) -> Duration {
        if self.completed_rides == 0 {
            return Duration::ZERO;
        }
        self.total_ride_time / self.completed_rides as u32
    }
}

/// Fans [`StatsSink`] callbacks out to one processor per car and renders
/// the periodic report.
pub struct StatsRegistry {
    per_car: HashMap<u8, Mutex<StatisticProcessor>>,
    started_at: Instant,
}

impl StatsRegistry {
    pub fn new(car_ids: impl IntoIterator<Item = u8>) -> Self {
        StatsRegistry {
            per_car: car_ids
                .into_iter()
                .map(|id| (id, Mutex::new(StatisticProcessor::default())))
                .collect(),
            started_at: Instant::now(),
        }
    }

    pub fn report(&self) -> String {
        let mut report = String::new();
        let uptime = self.started_at.elapsed().as_secs();
        let _ = writeln!(report, "--- uptime {}s ---", uptime);
        let mut ids: Vec<u8> = self.per_car.keys().copied().collect();
        ids.sort_unstable();
        for id in ids {
            let processor = self.per_car[&id].lock();
            let _ = writeln!(
                report,
                "car {}: {} riders delivered, {} on board, average ride {:.1}s, \
                 {} floors travelled, {} weight delivered",
                id,
                processor.completed_rides,
                processor.in_flight.len(),
                processor.average_ride_time().as_secs_f64(),
                processor.total_floors_travelled,
                processor.total_weight_delivered
            );
            let _ = writeln!(
                report,
                "car {}: pickups per floor {:?}, dropoffs per floor {:?}",
                id,
                sorted_counts(&processor.pickups_by_floor),
                sorted_counts(&processor.dropoffs_by_floor)
            );
        }
        report
    }
}

fn sorted_counts(counts: &HashMap<i32, u64>) -> Vec<(i32, u64)> {
    let mut counts: Vec<(i32, u64)> = counts.iter().map(|(k, v)| (*k, *v)).collect();
    counts.sort_unstable();
    counts
}

impl StatsSink for StatsRegistry {
    fn on_pick_passengers(&self, car_id: u8, floor: i32, timestamp: Instant, people: &[Person]) {
        if let Some(processor) = self.per_car.get(&car_id) {
            processor.lock().on_pick(floor, timestamp, people);
        }
    }

    fn on_drop_passengers(&self, car_id: u8, floor: i32, timestamp: Instant, people: &[Person]) {
        if let Some(processor) = self.per_car.get(&car_id) {
            processor.lock().on_drop(floor, timestamp, people);
        }
    }
}

/// Appends a registry snapshot to a file on a fixed period.
pub struct StatisticsWriter {
    registry: Arc<StatsRegistry>,
    path: PathBuf,
    period: Duration,
    running: AtomicBool,
}

impl StatisticsWriter {
    pub fn new(registry: Arc<StatsRegistry>, path: PathBuf, period: Duration) -> Self {
        StatisticsWriter {
            registry,
            path,
            period,
            running: AtomicBool::new(false),
        }
    }

    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);
        let writer = Arc::clone(self);
        spawn(move || writer.run())
    }

    pub fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    fn run(&self) {
        info!("writing statistics to {}", self.path.display());
        while self.running.load(Ordering::SeqCst) {
            std::thread::sleep(self.period);
            if let Err(err) = self.append_snapshot() {
                error!("failed to write statistics: {}", err);
            }
        }
    }

    fn append_snapshot(&self) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(self.registry.report().as_bytes())
    }
}
