pub mod backup_exchange;
pub mod core;
pub mod history;
pub mod reports;
pub mod sections;
pub mod session;
pub mod students;
