use std::time::Instant;

use shared_resources::direction::Direction;
use shared_resources::person::Person;
use shared_resources::request::Request;

/// How a car reaches back into its dispatcher. Wired at construction;
/// a car cannot be built without one.
pub trait Notifier: Send + Sync {
    /// The car has no more committed work (or just reached a terminal
    /// floor and is about to serve the opposite direction).
    fn notify_free(&self);

    /// Hands a floor call back to the dispatcher for reassignment, used
    /// when a pending floor can no longer be reached without reversing.
    fn resubmit(&self, request: Request);
}

/// Supplies boarding passengers for a stop.
///
/// `take` must be atomic with respect to other extractions from the same
/// (floor, direction) queue, and must arrange a later retry for any demand
/// left behind once the weight budget is exhausted.
pub trait PeopleSource: Send + Sync {
    fn take(&self, weight_budget: u32, floor: i32, direction: Direction) -> Vec<Person>;
}

/// Fire-and-forget statistics notifications. Implementations must not
/// block the car's motion loop materially.
pub trait StatsSink: Send + Sync {
    fn on_pick_passengers(&self, car_id: u8, floor: i32, timestamp: Instant, people: &[Person]);
    fn on_drop_passengers(&self, car_id: u8, floor: i32, timestamp: Instant, people: &[Person]);
}
