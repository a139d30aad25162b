mod archive;
mod backup;
mod schedule;
mod serve;
mod server;

// Server commands
pub use server::{run_backup_settings, run_server_add, run_server_list};

// Schedule commands
pub use schedule::{
    run_schedule_create, run_schedule_delete, run_schedule_list, run_schedule_now,
    run_schedule_toggle, run_schedule_update,
};

// Backup commands
pub use backup::{
    run_backup_create, run_backup_delete, run_backup_list, run_backup_restore, run_backup_verify,
};

// Archive commands
pub use archive::run_extract;

// Serve
pub use serve::run_serve;
