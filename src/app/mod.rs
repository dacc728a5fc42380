pub mod autosave;
pub mod controller;
pub mod scheduler;

pub use autosave::AutoSaver;
pub use controller::AuditController;
pub use scheduler::SaveScheduler;
