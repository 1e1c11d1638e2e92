#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Idle,
}

impl Direction {
    /// Direction of travel needed to get from `from` to `to`.
    /// Equal floors resolve to Down.
    pub fn of_travel(from: i32, to: i32) -> Self {
        if to > from {
            Direction::Up
        } else {
            Direction::Down
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Idle => Direction::Idle,
        }
    }

    pub fn step(self) -> i32 {
        match self {
            Direction::Up => 1,
            Direction::Down => -1,
            Direction::Idle => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn travel_direction_follows_floor_delta() {
        assert_eq!(Direction::of_travel(2, 7), Direction::Up);
        assert_eq!(Direction::of_travel(7, 2), Direction::Down);
        assert_eq!(Direction::of_travel(4, 4), Direction::Down);
    }

    #[test]
    fn opposite_keeps_idle() {
        assert_eq!(Direction::Up.opposite(), Direction::Down);
        assert_eq!(Direction::Down.opposite(), Direction::Up);
        assert_eq!(Direction::Idle.opposite(), Direction::Idle);
    }
}
