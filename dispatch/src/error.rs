use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchError {
    #[error("list of elevator cars is empty")]
    NoCars,
    #[error("floor {floor} is outside the served range [{min}, {max}]")]
    FloorOutOfRange { floor: i32, min: i32, max: i32 },
}
