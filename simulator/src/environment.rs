use std::collections::{HashMap, VecDeque};
use std::thread::spawn;
use std::time::Duration;

use crossbeam_channel::Sender;
use log::{debug, warn};
use parking_lot::Mutex;

use dispatch::capabilities::PeopleSource;
use dispatch::controller::Signal;
use shared_resources::direction::Direction;
use shared_resources::person::Person;
use shared_resources::request::Request;

/// How long to wait before re-announcing a floor whose queue still holds
/// people after a car left without room for all of them.
const RETRY_DELAY: Duration = Duration::from_millis(150);

/// The building: one FIFO queue per (floor, direction) pair that riders
/// can actually request. Arrivals announce themselves on the signal
/// channel; departures happen when a stopped car calls [`PeopleSource::take`].
pub struct Environment {
    queues: HashMap<(i32, Direction), Mutex<VecDeque<Person>>>,
    signal_tx: Sender<Signal>,
}

impl Environment {
    pub fn new(min_floor: i32, max_floor: i32, signal_tx: Sender<Signal>) -> Self {
        let mut queues = HashMap::new();
        for floor in min_floor..=max_floor {
            if floor < max_floor {
                queues.insert((floor, Direction::Up), Mutex::new(VecDeque::new()));
            }
            if floor > min_floor {
                queues.insert((floor, Direction::Down), Mutex::new(VecDeque::new()));
            }
        }
        Environment { queues, signal_tx }
    }

    /// Puts a rider on their starting floor. The first arrival at an
    /// empty queue raises a dispatch request; later arrivals ride along
    /// on the one already raised.
    pub fn add_person(&self, person: Person) {
        let key = (person.start_floor, person.direction());
        let queue = match self.queues.get(&key) {
            Some(queue) => queue,
            None => {
                warn!(
                    "no queue for floor {} going {:?}, rider dropped",
                    person.start_floor,
                    person.direction()
                );
                return;
            }
        };
        let was_empty = {
            let mut queue = queue.lock();
            let was_empty = queue.is_empty();
            queue.push_back(person);
            was_empty
        };
        if was_empty {
            debug!("floor {} now has {:?} demand", key.0, key.1);
            let _ = self.signal_tx.send(Signal::Resubmit(Request {
                floor: key.0,
                direction: key.1,
            }));
        }
    }

    #[cfg(test)]
    fn waiting_count(&self, floor: i32, direction: Direction) -> usize {
        self.queues
            .get(&(floor, direction))
            .map(|queue| queue.lock().len())
            .unwrap_or(0)
    }
}

impl PeopleSource for Environment {
    /// Pops the longest waiting riders that fit the weight budget, in
    /// arrival order. Anyone left behind gets the floor re-announced
    /// after a short delay, so the demand is never forgotten.
    fn take(&self, weight_budget: u32, floor: i32, direction: Direction) -> Vec<Person> {
        let queue = match self.queues.get(&(floor, direction)) {
            Some(queue) => queue,
            None => return Vec::new(),
        };
        let mut boarding = Vec::new();
        let mut remaining = weight_budget;
        let left_behind = {
            let mut queue = queue.lock();
            while queue.front().is_some_and(|person| person.weight <= remaining) {
                if let Some(person) = queue.pop_front() {
                    remaining -= person.weight;
                    boarding.push(person);
                }
            }
            !queue.is_empty()
        };
        if left_behind {
            let signal_tx = self.signal_tx.clone();
            spawn(move || {
                std::thread::sleep(RETRY_DELAY);
                let _ = signal_tx.send(Signal::Resubmit(Request { floor, direction }));
            });
        }
        boarding
    }
}
