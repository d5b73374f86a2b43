pub mod service;
pub mod synchronizer;

pub use service::SyncService;
pub use synchronizer::AccountSynchronizer;
