use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{spawn, JoinHandle};
use std::time::Duration;

use log::debug;
use rand::Rng;

use shared_resources::person::Person;

use crate::environment::Environment;

const MIN_WEIGHT: u32 = 20;
const MAX_WEIGHT: u32 = 150;

/// Feeds the building with riders at a fixed cadence. Each rider gets a
/// random weight and a random pair of distinct floors.
pub struct PeopleGenerator {
    environment: Arc<Environment>,
    min_floor: i32,
    max_floor: i32,
    interval: Duration,
    running: AtomicBool,
}

impl PeopleGenerator {
    pub fn new(
        environment: Arc<Environment>,
        min_floor: i32,
        max_floor: i32,
        interval: Duration,
    ) -> Self {
        PeopleGenerator {
            environment,
            min_floor,
            max_floor,
            interval,
            running: AtomicBool::new(false),
        }
    }

    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);
        let generator = Arc::clone(self);
        spawn(move || generator.run())
    }

    pub fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    fn run(&self) {
        while self.running.load(Ordering::SeqCst) {
            let person = self.random_person();
            debug!(
                "new rider on floor {} heading to floor {}",
                person.start_floor, person.target_floor
            );
            self.environment.add_person(person);
            std::thread::sleep(self.interval);
        }
    }

    fn random_person(&self) -> Person {
        let mut rng = rand::rng();
        let weight = rng.random_range(MIN_WEIGHT..MAX_WEIGHT);
        let start_floor = rng.random_range(self.min_floor..=self.max_floor);
        let mut target_floor = rng.random_range(self.min_floor..=self.max_floor);
        while target_floor == start_floor {
            target_floor = rng.random_range(self.min_floor..=self.max_floor);
        }
        Person::new(weight, start_floor, target_floor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crossbeam_channel::unbounded;

    use dispatch::controller::Signal;

    fn make_generator(interval: Duration) -> (Arc<PeopleGenerator>, crossbeam_channel::Receiver<Signal>) {
        let (signal_tx, signal_rx) = unbounded();
        let environment = Arc::new(Environment::new(1, 10, signal_tx));
        let generator = Arc::new(PeopleGenerator::new(environment, 1, 10, interval));
        (generator, signal_rx)
    }

    #[test]
    fn riders_stay_inside_the_building() {
        let (generator, _signal_rx) = make_generator(Duration::from_secs(1));
        for _ in 0..200 {
            let person = generator.random_person();
            assert!((1..=10).contains(&person.start_floor));
            assert!((1..=10).contains(&person.target_floor));
            assert_ne!(person.start_floor, person.target_floor);
            assert!((MIN_WEIGHT..MAX_WEIGHT).contains(&person.weight));
        }
    }

    #[test]
    fn running_generator_raises_demand() {
        let (generator, signal_rx) = make_generator(Duration::from_millis(1));
        let handle = generator.start();
        let signal = signal_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(matches!(signal, Signal::Resubmit(_)));
        generator.shutdown();
        handle.join().unwrap();
    }
}
