use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{spawn, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use log::{debug, error, info};
use parking_lot::Mutex;

use shared_resources::direction::Direction;
use shared_resources::request::Request;

use crate::capabilities::Notifier;
use crate::car::{Car, CarState};
use crate::error::DispatchError;
use crate::task_runner::TaskRunner;

/// Commit attempts before a contended request falls back to the backlog.
const MAX_COMMIT_ATTEMPTS: usize = 8;

const DISPATCH_WORKERS: usize = 4;

/// Outcome of a dispatch request. Queued requests stay in the backlog and
/// are replayed whenever a car signals free; they are never dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignment {
    Assigned(u8),
    Queued,
}

/// What the cars (and the environment's retry timers) send back to the
/// waiting-queue processor.
#[derive(Debug, Clone, Copy)]
pub enum Signal {
    Free,
    Resubmit(Request),
}

/// [`Notifier`] implementation over the controller's signal channel.
pub struct ChannelNotifier {
    signal_tx: Sender<Signal>,
}

impl ChannelNotifier {
    pub fn new(signal_tx: Sender<Signal>) -> Self {
        ChannelNotifier { signal_tx }
    }
}

impl Notifier for ChannelNotifier {
    fn notify_free(&self) {
        let _ = self.signal_tx.send(Signal::Free);
    }

    fn resubmit(&self, request: Request) {
        let _ = self.signal_tx.send(Signal::Resubmit(request));
    }
}

pub struct Controller {
    cars: Vec<Arc<Car>>,
    backlog: Mutex<VecDeque<Request>>,
    signal_tx: Sender<Signal>,
    signal_rx: Receiver<Signal>,
    runner: TaskRunner,
    running: AtomicBool,
}

impl Controller {
    pub fn new(
        cars: Vec<Arc<Car>>,
        signal_tx: Sender<Signal>,
        signal_rx: Receiver<Signal>,
    ) -> Result<Controller, DispatchError> {
        if cars.is_empty() {
            return Err(DispatchError::NoCars);
        }
        Ok(Controller {
            cars,
            backlog: Mutex::new(VecDeque::new()),
            signal_tx,
            signal_rx,
            runner: TaskRunner::new(DISPATCH_WORKERS),
            running: AtomicBool::new(false),
        })
    }

    pub fn cars(&self) -> &[Arc<Car>] {
        &self.cars
    }

    /// Launches every car's motion loop plus the waiting-queue processor.
    pub fn start(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        self.running.store(true, Ordering::SeqCst);
        info!("launching {} cars", self.cars.len());
        let mut handles: Vec<JoinHandle<()>> = self.cars.iter().map(|car| car.start()).collect();
        let controller = Arc::clone(self);
        handles.push(spawn(move || controller.process_waiting_queue()));
        info!("the cars are running");
        handles
    }

    /// Stops the cars and the waiting-queue processor. Threads spawned by
    /// [`Controller::start`] become joinable shortly after.
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
        for car in &self.cars {
            car.shutdown();
        }
        // wake the waiting-queue processor so it observes the flag
        let _ = self.signal_tx.send(Signal::Free);
    }

    /// Submits a dispatch attempt to the worker pool so the caller never
    /// blocks on selection or commit.
    pub fn add_client_parallel(self: &Arc<Self>, direction: Direction, floor: i32) {
        let controller = Arc::clone(self);
        self.runner.execute(move || {
            if let Err(err) = controller.add_client(direction, floor) {
                error!("dispatch request rejected: {}", err);
            }
        });
    }

    /// The single entry point for "a person wants to go somewhere".
    ///
    /// Optimistic-concurrency loop: select the best car, then re-check its
    /// suitability under that car's own lock before committing, because
    /// its motion loop may have changed the state in between. A request
    /// that finds no suitable car joins the backlog; it is replayed on the
    /// next free signal.
    pub fn add_client(&self, direction: Direction, floor: i32) -> Result<Assignment, DispatchError> {
        for _ in 0..MAX_COMMIT_ATTEMPTS {
            let car = match self.select_best_car(direction, floor) {
                Some(car) => car,
                None => break,
            };
            let mut state = car.state();
            if !is_suitable(&state, direction, floor) {
                debug!(
                    "car {} is no longer suitable for (floor {}, {:?})",
                    car.id(),
                    floor,
                    direction
                );
                continue;
            }
            car.add_floor_locked(&mut state, floor, direction)?;
            info!("car {} was called to floor {}", car.id(), floor);
            return Ok(Assignment::Assigned(car.id()));
        }
        self.backlog.lock().push_back(Request { floor, direction });
        info!(
            "request (floor {}, {:?}) is waiting for a free car",
            floor, direction
        );
        Ok(Assignment::Queued)
    }

    /// Nearest suitable car by floor distance; ties go to the car on the
    /// higher floor.
    fn select_best_car(&self, direction: Direction, floor: i32) -> Option<&Arc<Car>> {
        let mut best: Option<&Arc<Car>> = None;
        let mut best_delta = i32::MAX;
        let mut best_floor = i32::MIN;
        for car in &self.cars {
            let state = car.state();
            if !is_suitable(&state, direction, floor) {
                continue;
            }
            let delta = (floor - state.current_floor).abs();
            if delta < best_delta || (delta == best_delta && state.current_floor > best_floor) {
                best = Some(car);
                best_delta = delta;
                best_floor = state.current_floor;
            }
        }
        best
    }

    /// The backlog retry loop. Blocks on the signal channel; every free
    /// signal drains the whole backlog through the worker pool, so a
    /// rejected replay can re-enter the backlog without deadlocking the
    /// loop itself.
    fn process_waiting_queue(self: &Arc<Self>) {
        info!("waiting-queue processor started");
        while self.running.load(Ordering::SeqCst) {
            let signal = match self.signal_rx.recv() {
                Ok(signal) => signal,
                Err(_) => break,
            };
            if !self.running.load(Ordering::SeqCst) {
                break;
            }
            match signal {
                Signal::Resubmit(request) => {
                    debug!(
                        "replaying handed-back request (floor {}, {:?})",
                        request.floor, request.direction
                    );
                    self.add_client_parallel(request.direction, request.floor);
                }
                Signal::Free => {
                    let waiting: Vec<Request> = self.backlog.lock().drain(..).collect();
                    for request in waiting {
                        self.add_client_parallel(request.direction, request.floor);
                    }
                }
            }
        }
        info!("waiting-queue processor stopped");
    }

    #[cfg(test)]
    fn backlog_len(&self) -> usize {
        self.backlog.lock().len()
    }
}

/// The suitability predicate: may this car accept a request for `floor`
/// in `direction` right now?
///
/// An idle car is always eligible. A car that is still fetching its first
/// committed call (asked and actual direction differ) takes any request
/// whose direction matches the asked one. A car driven purely by committed
/// calls additionally requires the floor to lie ahead of it: at or below
/// when moving Down, at or above when moving Up. Overweight cars take
/// nothing until they shed weight.
pub fn is_suitable(state: &CarState, direction: Direction, floor: i32) -> bool {
    if state.overweight {
        return false;
    }
    if state.actual_direction == Direction::Idle {
        return true;
    }
    let directed_by_clients = state.asked_direction == state.actual_direction;
    if !directed_by_clients {
        return direction == state.asked_direction;
    }
    direction == state.actual_direction
        && match state.actual_direction {
            Direction::Down => floor <= state.current_floor,
            Direction::Up => floor >= state.current_floor,
            Direction::Idle => true,
        }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::BTreeSet;
    use std::time::{Duration, Instant};

    use crossbeam_channel::unbounded;

    use shared_resources::person::Person;

    use crate::capabilities::{PeopleSource, StatsSink};
    use crate::car::CarSettings;

    const MIN_FLOOR: i32 = 1;
    const MAX_FLOOR: i32 = 9;

    struct NoPeople;

    impl PeopleSource for NoPeople {
        fn take(&self, _weight_budget: u32, _floor: i32, _direction: Direction) -> Vec<Person> {
            Vec::new()
        }
    }

    struct NoStats;

    impl StatsSink for NoStats {
        fn on_pick_passengers(&self, _car_id: u8, _floor: i32, _ts: Instant, _people: &[Person]) {}
        fn on_drop_passengers(&self, _car_id: u8, _floor: i32, _ts: Instant, _people: &[Person]) {}
    }

    fn settings() -> CarSettings {
        CarSettings {
            min_floor: MIN_FLOOR,
            max_floor: MAX_FLOOR,
            capacity_weight: 600,
            floor_travel_time: Duration::from_millis(1),
            door_open_time: Duration::from_millis(1),
            door_close_time: Duration::from_millis(1),
        }
    }

    /// Controller over cars parked on the given floors, ids 1, 2, ...
    /// Nothing is started; the tests drive `add_client` directly.
    fn make_controller(floors: &[i32]) -> Arc<Controller> {
        let (signal_tx, signal_rx) = unbounded();
        let notifier = Arc::new(ChannelNotifier::new(signal_tx.clone()));
        let cars = floors
            .iter()
            .enumerate()
            .map(|(index, floor)| {
                Arc::new(
                    Car::new(
                        index as u8 + 1,
                        *floor,
                        settings(),
                        notifier.clone(),
                        Arc::new(NoPeople),
                        Arc::new(NoStats),
                    )
                    .unwrap(),
                )
            })
            .collect();
        Arc::new(Controller::new(cars, signal_tx, signal_rx).unwrap())
    }

    fn idle_state(floor: i32) -> CarState {
        CarState {
            current_floor: floor,
            actual_direction: Direction::Idle,
            asked_direction: Direction::Idle,
            pending_floors: BTreeSet::new(),
            passengers: Vec::new(),
            overweight: false,
        }
    }

    #[test]
    fn empty_fleet_is_rejected() {
        let (signal_tx, signal_rx) = unbounded();
        assert_eq!(
            Controller::new(Vec::new(), signal_tx, signal_rx).err(),
            Some(DispatchError::NoCars)
        );
    }

    #[test]
    fn cars_on_4_and_6_person_at_5_takes_car_on_6() {
        let controller = make_controller(&[4, 6]);
        let assignment = controller.add_client(Direction::Up, 5).unwrap();
        assert_eq!(assignment, Assignment::Assigned(2));
    }

    #[test]
    fn persons_on_1_and_9_split_between_cars_on_4_and_6() {
        let controller = make_controller(&[4, 6]);
        let first = controller.add_client(Direction::Up, 1).unwrap();
        let second = controller.add_client(Direction::Up, 9).unwrap();
        assert_eq!(first, Assignment::Assigned(1));
        assert_eq!(second, Assignment::Assigned(2));
    }

    #[test]
    fn car_moving_down_does_not_take_person_above_it() {
        let controller = make_controller(&[3, 8]);
        // send car 1 down towards its own floor, committing it to Down
        controller.add_client(Direction::Down, 3).unwrap();
        assert_eq!(
            controller.cars()[0].state().actual_direction,
            Direction::Down
        );

        let assignment = controller.add_client(Direction::Up, 4).unwrap();
        assert_eq!(assignment, Assignment::Assigned(2));
        assert_eq!(
            controller.cars()[1].state().actual_direction,
            Direction::Down
        );
    }

    #[test]
    fn conflicting_directions_from_one_floor_land_on_different_cars() {
        let controller = make_controller(&[1, 1]);
        let first = controller.add_client(Direction::Up, 4).unwrap();
        let second = controller.add_client(Direction::Down, 4).unwrap();
        assert_ne!(first, second);
        assert_eq!(first, Assignment::Assigned(1));
        assert_eq!(second, Assignment::Assigned(2));
    }

    #[test]
    fn nearest_car_wins_without_a_tie() {
        let controller = make_controller(&[2, 8]);
        let assignment = controller.add_client(Direction::Up, 4).unwrap();
        assert_eq!(assignment, Assignment::Assigned(1));
    }

    #[test]
    fn equal_distance_prefers_the_higher_floor() {
        let controller = make_controller(&[6, 4]);
        // order in the fleet must not matter, only the floor
        let assignment = controller.add_client(Direction::Up, 5).unwrap();
        assert_eq!(assignment, Assignment::Assigned(1));
    }

    #[test]
    fn unserviceable_request_is_queued_not_failed() {
        let controller = make_controller(&[5]);
        controller.add_client(Direction::Down, 1).unwrap();
        // car 1 is now committed to Down; an Up request has nobody
        let assignment = controller.add_client(Direction::Up, 7).unwrap();
        assert_eq!(assignment, Assignment::Queued);
        assert_eq!(controller.backlog_len(), 1);
    }

    #[test]
    fn out_of_range_floor_surfaces_as_an_error() {
        let controller = make_controller(&[5]);
        assert!(matches!(
            controller.add_client(Direction::Up, 42),
            Err(DispatchError::FloorOutOfRange { floor: 42, .. })
        ));
    }

    #[test]
    fn idle_car_is_always_suitable() {
        let state = idle_state(5);
        assert!(is_suitable(&state, Direction::Up, 9));
        assert!(is_suitable(&state, Direction::Down, 1));
    }

    #[test]
    fn overweight_car_is_never_suitable() {
        let mut state = idle_state(5);
        state.overweight = true;
        assert!(!is_suitable(&state, Direction::Up, 5));
    }

    #[test]
    fn directed_car_requires_floor_ahead_of_it() {
        let mut state = idle_state(5);
        state.actual_direction = Direction::Up;
        state.asked_direction = Direction::Up;
        assert!(is_suitable(&state, Direction::Up, 7));
        assert!(is_suitable(&state, Direction::Up, 5));
        assert!(!is_suitable(&state, Direction::Up, 3));
        assert!(!is_suitable(&state, Direction::Down, 7));

        state.actual_direction = Direction::Down;
        state.asked_direction = Direction::Down;
        assert!(is_suitable(&state, Direction::Down, 3));
        assert!(is_suitable(&state, Direction::Down, 5));
        assert!(!is_suitable(&state, Direction::Down, 7));
    }

    #[test]
    fn fetching_car_takes_any_request_matching_its_asked_direction() {
        // heading down to collect an Up call: position does not matter,
        // only direction agreement
        let mut state = idle_state(8);
        state.actual_direction = Direction::Down;
        state.asked_direction = Direction::Up;
        assert!(is_suitable(&state, Direction::Up, 2));
        assert!(is_suitable(&state, Direction::Up, 9));
        assert!(!is_suitable(&state, Direction::Down, 2));
    }
}
