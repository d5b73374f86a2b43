use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::account::synchronizer::AccountSynchronizer;
use crate::core::config::{AccountConfig, AppConfig, ExchangeId};
use crate::core::errors::ExchangeError;
use crate::exchanges;

/// Runs one [`AccountSynchronizer`] per tracked account.
///
/// Accounts are fully independent: no state is shared between them, and a
/// misconfigured account only disables itself.
pub struct SyncService {
    providers: Vec<Arc<AccountSynchronizer>>,
}

impl SyncService {
    /// Builds a synchronizer for every account in `config` that has
    /// credentials. Accounts without credentials, or whose gateway cannot
    /// be constructed, are skipped with a log line; they are not retried.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut providers = Vec::new();
        for account in &config.accounts {
            if !account.connection.has_credentials() {
                warn!(account = %account.name, exchange = %account.exchange, "missing API credentials, account skipped");
                continue;
            }
            match build_synchronizer(account) {
                Ok(provider) => providers.push(provider),
                Err(err) => {
                    error!(account = %account.name, exchange = %account.exchange, error = %err, "failed to build account gateway, account skipped");
                }
            }
        }
        Self { providers }
    }

    /// Wraps pre-built synchronizers, e.g. ones using custom gateways.
    pub fn new(providers: Vec<Arc<AccountSynchronizer>>) -> Self {
        Self { providers }
    }

    /// Starts every account's background synchronization. Returns once the
    /// tasks are scheduled; bootstrap completes in the background.
    pub fn start_all(&self, cancel: &CancellationToken) {
        for provider in &self.providers {
            provider.start(cancel);
        }
        info!(accounts = self.providers.len(), "account synchronization started");
    }

    /// Stops every account, awaiting each one's subscription teardown.
    pub async fn stop_all(&self) {
        for provider in &self.providers {
            provider.stop().await;
        }
    }

    pub fn providers(&self) -> &[Arc<AccountSynchronizer>] {
        &self.providers
    }

    /// Looks up one account's synchronizer by its configured name.
    pub fn provider(&self, name: &str) -> Option<&Arc<AccountSynchronizer>> {
        self.providers.iter().find(|p| p.name() == name)
    }
}

fn build_synchronizer(account: &AccountConfig) -> Result<Arc<AccountSynchronizer>, ExchangeError> {
    let (rest, stream) = match account.exchange {
        ExchangeId::Bybit => exchanges::bybit::connect(&account.connection)?,
        ExchangeId::Binance => exchanges::binance::connect(&account.connection)?,
    };
    Ok(AccountSynchronizer::new(account.name.clone(), rest, stream))
}
