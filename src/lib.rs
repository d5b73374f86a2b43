pub mod account;
pub mod core;
pub mod exchanges;

pub use crate::core::{config::AppConfig, errors::ExchangeError, types::*};
pub use account::{AccountSynchronizer, SyncService};
