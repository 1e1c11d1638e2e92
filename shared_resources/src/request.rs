use super::direction::Direction;

/// A call for service: somebody on `floor` wants to travel in `direction`.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request {
    pub floor: i32,
    pub direction: Direction,
}
