use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{sleep, spawn, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, info};
use parking_lot::{Condvar, Mutex, MutexGuard};

use shared_resources::direction::Direction;
use shared_resources::person::Person;
use shared_resources::request::Request;

use crate::capabilities::{Notifier, PeopleSource, StatsSink};
use crate::error::DispatchError;

/// Weight slack below which a car stops accepting new pickups.
const WEIGHT_MARGIN: u32 = 30;

/// Physical constants of one car, shared by the whole fleet.
#[derive(Debug, Clone)]
pub struct CarSettings {
    pub min_floor: i32,
    pub max_floor: i32,
    pub capacity_weight: u32,
    pub floor_travel_time: Duration,
    pub door_open_time: Duration,
    pub door_close_time: Duration,
}

/// Everything about a car that moves. Guarded by a single mutex; the
/// dispatcher reads and writes this only through [`Car::state`], never
/// while holding its own backlog lock.
#[derive(Debug)]
pub struct CarState {
    pub current_floor: i32,
    pub actual_direction: Direction,
    pub asked_direction: Direction,
    pub pending_floors: BTreeSet<i32>,
    pub passengers: Vec<Person>,
    pub overweight: bool,
}

impl CarState {
    fn onboard_weight(&self) -> u32 {
        self.passengers.iter().map(|p| p.weight).sum()
    }

    /// Next floor in service order: ascending for Up service, descending
    /// for Down service.
    fn pull_next_floor(&mut self) -> Option<i32> {
        match self.asked_direction {
            Direction::Down => self.pending_floors.pop_last(),
            _ => self.pending_floors.pop_first(),
        }
    }
}

pub struct Car {
    id: u8,
    settings: CarSettings,
    state: Mutex<CarState>,
    has_work: Condvar,
    running: AtomicBool,
    notifier: Arc<dyn Notifier>,
    people_source: Arc<dyn PeopleSource>,
    stats_sink: Arc<dyn StatsSink>,
}

impl Car {
    pub fn new(
        id: u8,
        starting_floor: i32,
        settings: CarSettings,
        notifier: Arc<dyn Notifier>,
        people_source: Arc<dyn PeopleSource>,
        stats_sink: Arc<dyn StatsSink>,
    ) -> Result<Car, DispatchError> {
        if starting_floor < settings.min_floor || starting_floor > settings.max_floor {
            return Err(DispatchError::FloorOutOfRange {
                floor: starting_floor,
                min: settings.min_floor,
                max: settings.max_floor,
            });
        }
        Ok(Car {
            id,
            settings,
            state: Mutex::new(CarState {
                current_floor: starting_floor,
                actual_direction: Direction::Idle,
                asked_direction: Direction::Idle,
                pending_floors: BTreeSet::new(),
                passengers: Vec::new(),
                overweight: false,
            }),
            has_work: Condvar::new(),
            running: AtomicBool::new(true),
            notifier,
            people_source,
            stats_sink,
        })
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    /// Locks this car's state. All cross-thread reads and writes of the
    /// mutable fields go through here.
    pub fn state(&self) -> MutexGuard<'_, CarState> {
        self.state.lock()
    }

    /// Commits a floor call to this car. If the car is idle this also
    /// performs the Idle -> moving transition and wakes the motion loop;
    /// otherwise the floor is just inserted and the loop discovers it on
    /// its next pass.
    pub fn add_floor(&self, floor: i32, direction: Direction) -> Result<(), DispatchError> {
        let mut state = self.state.lock();
        self.add_floor_locked(&mut state, floor, direction)
    }

    /// Same as [`Car::add_floor`] but against an already-held state guard,
    /// so the dispatcher can re-check suitability and commit atomically.
    pub fn add_floor_locked(
        &self,
        state: &mut CarState,
        floor: i32,
        direction: Direction,
    ) -> Result<(), DispatchError> {
        if floor < self.settings.min_floor || floor > self.settings.max_floor {
            return Err(DispatchError::FloorOutOfRange {
                floor,
                min: self.settings.min_floor,
                max: self.settings.max_floor,
            });
        }
        if state.actual_direction == Direction::Idle {
            state.actual_direction = Direction::of_travel(state.current_floor, floor);
            state.asked_direction = self.asked_direction_for(floor, direction);
            state.pending_floors.insert(floor);
            self.has_work.notify_one();
            debug!("waking up car {} for floor {}", self.id, floor);
        } else {
            state.pending_floors.insert(floor);
        }
        Ok(())
    }

    /// A call from an extreme floor can only mean "going the other way",
    /// so it overrides the requester's stated direction.
    fn asked_direction_for(&self, floor: i32, direction: Direction) -> Direction {
        if floor == self.settings.min_floor {
            Direction::Down
        } else if floor == self.settings.max_floor {
            Direction::Up
        } else {
            direction
        }
    }

    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let car = Arc::clone(self);
        spawn(move || car.run())
    }

    /// Clears the running flag and wakes the motion loop so its thread can
    /// exit. The car stops serving permanently; nothing restarts it.
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
        let _state = self.state.lock();
        self.has_work.notify_all();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// The motion loop. One long-lived thread per car.
    pub fn run(&self) {
        info!(
            "car {} started at floor {}",
            self.id,
            self.state.lock().current_floor
        );
        while self.is_running() {
            self.wait_for_client();
            while self.is_running() && !self.state.lock().pending_floors.is_empty() {
                self.advance();
                sleep(self.settings.door_open_time);
                self.drop_off_clients();
                self.pick_up_clients();
                sleep(self.settings.door_close_time);
                self.stop();
            }
        }
        info!("car {} stopped serving", self.id);
    }

    fn wait_for_client(&self) {
        let mut state = self.state.lock();
        while state.pending_floors.is_empty() && self.is_running() {
            self.has_work.wait(&mut state);
        }
    }

    /// Travels to the next pending floor, one step at a time. The target is
    /// re-resolved under the lock on every step so calls committed mid-trip
    /// are folded into the travel order immediately.
    fn advance(&self) {
        let mut target = match self.state.lock().pull_next_floor() {
            Some(floor) => floor,
            None => return,
        };
        loop {
            {
                let mut state = self.state.lock();
                state.actual_direction = Direction::of_travel(state.current_floor, target);
                target = self.resolve_collision(&mut state, target);
                if target == state.current_floor {
                    break;
                }
                let step = state.actual_direction.step();
                state.current_floor += step;
            }
            sleep(self.settings.floor_travel_time);
        }

        let arrived_at = {
            let mut state = self.state.lock();
            let floor = state.current_floor;
            if floor == self.settings.min_floor || floor == self.settings.max_floor {
                // the only remaining legal travel direction from here
                state.asked_direction = if floor == self.settings.min_floor {
                    Direction::Up
                } else {
                    Direction::Down
                };
                drop(state);
                self.notifier.notify_free();
            }
            floor
        };
        info!("car {} arrived at floor {}", self.id, arrived_at);
    }

    /// One collision-resolution step: pull the next candidate in service
    /// order and keep whichever of it and the current target comes first
    /// in the trip. A candidate the car has already passed on a
    /// client-directed trip cannot be served without reversing, so it is
    /// handed back to the dispatcher as a brand-new call instead.
    fn resolve_collision(&self, state: &mut CarState, target: i32) -> i32 {
        let candidate = match state.pull_next_floor() {
            Some(floor) => floor,
            None => return target,
        };
        let order = state.asked_direction;
        if order == state.actual_direction && Self::is_behind(order, candidate, state.current_floor)
        {
            info!(
                "car {}: floor {} was passed already, resubmitting it",
                self.id, candidate
            );
            self.notifier.resubmit(Request {
                floor: candidate,
                direction: order,
            });
            return target;
        }
        if Self::comes_first(order, candidate, target) {
            state.pending_floors.insert(target);
            candidate
        } else {
            if candidate != target {
                state.pending_floors.insert(candidate);
            }
            target
        }
    }

    fn is_behind(order: Direction, floor: i32, current_floor: i32) -> bool {
        match order {
            Direction::Down => floor > current_floor,
            _ => floor < current_floor,
        }
    }

    /// Strictly closer in travel order: smaller for Up service, larger for
    /// Down service.
    fn comes_first(order: Direction, candidate: i32, target: i32) -> bool {
        match order {
            Direction::Down => candidate > target,
            _ => candidate < target,
        }
    }

    fn drop_off_clients(&self) {
        let (floor, leaving, weight) = {
            let mut state = self.state.lock();
            let floor = state.current_floor;
            let leaving: Vec<Person> = state
                .passengers
                .iter()
                .filter(|p| p.target_floor == floor)
                .cloned()
                .collect();
            state.passengers.retain(|p| p.target_floor != floor);
            let weight = state.onboard_weight();
            if self.settings.capacity_weight - weight >= WEIGHT_MARGIN {
                state.overweight = false;
            }
            (floor, leaving, weight)
        };
        self.stats_sink
            .on_drop_passengers(self.id, floor, Instant::now(), &leaving);
        info!(
            "car {} dropped off {} passengers on floor {}, onboard weight {}",
            self.id,
            leaving.len(),
            floor,
            weight
        );
    }

    fn pick_up_clients(&self) {
        let (floor, direction, budget) = {
            let mut state = self.state.lock();
            // committing to the serviced direction for this stop
            state.actual_direction = state.asked_direction;
            let floor = state.current_floor;
            let budget = self.settings.capacity_weight - state.onboard_weight();
            (floor, state.asked_direction, budget)
        };

        // the source's queue locks must never nest inside the car lock
        let boarding = self.people_source.take(budget, floor, direction);

        let weight = {
            let mut state = self.state.lock();
            for person in &boarding {
                state.pending_floors.insert(person.target_floor);
            }
            state.passengers.extend(boarding.iter().cloned());
            let weight = state.onboard_weight();
            if self.settings.capacity_weight - weight < WEIGHT_MARGIN {
                state.overweight = true;
            }
            weight
        };
        self.stats_sink
            .on_pick_passengers(self.id, floor, Instant::now(), &boarding);
        info!(
            "car {} picked up {} passengers on floor {}, onboard weight {}",
            self.id,
            boarding.len(),
            floor,
            weight
        );
    }

    /// Goes idle when the stop left nothing to serve, otherwise a no-op.
    fn stop(&self) {
        let mut state = self.state.lock();
        if !state.pending_floors.is_empty() {
            return;
        }
        state.actual_direction = Direction::Idle;
        state.asked_direction = Direction::Idle;
        drop(state);
        self.notifier.notify_free();
        info!("car {} is idle now", self.id);
    }
}
