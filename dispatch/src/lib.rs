pub mod capabilities;
pub mod car;
pub mod controller;
pub mod error;
pub mod task_runner;
