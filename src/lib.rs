pub mod cli;
pub mod clock;
pub mod config;
pub mod controller;
pub mod logging;
pub mod models;
pub mod service;
pub mod store;
pub mod tui;
pub mod utils;

pub use config::Config;
pub use models::{Priority, Status, Task, TaskFilter, TaskId};
pub use utils::Profile;
