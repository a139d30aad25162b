pub mod backup_routes;
pub mod file_routes;
pub mod schedule_routes;
pub mod server_routes;
