pub mod archive;
pub mod backup;
pub mod config;
pub mod constants;
pub mod cron;
pub mod database;
pub mod db;
pub mod error;
pub mod models;
pub mod panel;
pub mod scheduler;
pub mod supervisor;

pub use error::{ErrorKind, PanelError, Result};
pub use panel::PanelService;
