pub mod config;
pub mod direction;
pub mod person;
pub mod request;
