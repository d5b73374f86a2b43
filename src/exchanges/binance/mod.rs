pub mod converters;
pub mod rest;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use crate::core::config::ExchangeConfig;
use crate::core::errors::ExchangeError;
use crate::core::kernel::{HmacExchangeType, HmacSigner, RestClientBuilder, RestClientConfig};
use crate::core::traits::{FuturesRest, FuturesStream};
use crate::exchanges::polled::PolledStream;

pub use rest::BinanceFuturesRest;

const MAINNET_URL: &str = "https://fapi.binance.com";
const TESTNET_URL: &str = "https://testnet.binancefuture.com";

/// Streaming is synthesized by polling REST; Binance offers no push stream
/// through this gateway.
const POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Builds the REST and (polling-synthesized) streaming gateways for one
/// Binance USD-M futures account.
pub fn connect(
    config: &ExchangeConfig,
) -> Result<(Arc<dyn FuturesRest>, Arc<dyn FuturesStream>), ExchangeError> {
    let base_url = config.base_url.clone().unwrap_or_else(|| {
        if config.testnet {
            TESTNET_URL.to_string()
        } else {
            MAINNET_URL.to_string()
        }
    });

    let signer = Arc::new(HmacSigner::new(
        config.api_key().to_string(),
        config.secret_key().to_string(),
        HmacExchangeType::Binance,
    ));
    let rest_client =
        RestClientBuilder::new(RestClientConfig::new(base_url, "binance".to_string()))
            .with_signer(signer)
            .build()?;
    let rest: Arc<dyn FuturesRest> = Arc::new(BinanceFuturesRest::new(rest_client));

    let stream = Arc::new(PolledStream::new(Arc::clone(&rest), POLL_INTERVAL));

    Ok((rest, stream))
}
