use super::direction::Direction;

/// A rider. The direction is derived from the floor pair at construction
/// and never changes afterwards.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Person {
    pub weight: u32,
    pub start_floor: i32,
    pub target_floor: i32,
    direction: Direction,
}

impl Person {
    pub fn new(weight: u32, start_floor: i32, target_floor: i32) -> Self {
        Person {
            weight,
            start_floor,
            target_floor,
            direction: Direction::of_travel(start_floor, target_floor),
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_is_derived_from_floors() {
        assert_eq!(Person::new(80, 1, 5).direction(), Direction::Up);
        assert_eq!(Person::new(80, 5, 1).direction(), Direction::Down);
    }
}
