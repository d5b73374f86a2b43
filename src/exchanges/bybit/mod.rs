pub mod codec;
pub mod converters;
pub mod rest;
pub mod signer;
pub mod stream;
pub mod types;

use std::sync::Arc;

use crate::core::config::ExchangeConfig;
use crate::core::errors::ExchangeError;
use crate::core::kernel::{HmacExchangeType, HmacSigner, RestClientBuilder, RestClientConfig};
use crate::core::traits::{FuturesRest, FuturesStream};

pub use rest::BybitFuturesRest;
pub use stream::BybitStream;

const MAINNET_URL: &str = "https://api.bybit.com";
const TESTNET_URL: &str = "https://api-testnet.bybit.com";
const MAINNET_WS_URL: &str = "wss://stream.bybit.com/v5/private";
const TESTNET_WS_URL: &str = "wss://stream-testnet.bybit.com/v5/private";

/// Builds the REST and streaming gateways for one Bybit account.
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
        HmacExchangeType::Bybit,
    ));
    let rest_client = RestClientBuilder::new(RestClientConfig::new(base_url, "bybit".to_string()))
        .with_signer(signer)
        .build()?;
    let rest = Arc::new(BybitFuturesRest::new(rest_client));

    let ws_url = if config.testnet {
        TESTNET_WS_URL.to_string()
    } else {
        MAINNET_WS_URL.to_string()
    };
    let stream = Arc::new(BybitStream::new(
        ws_url,
        config.api_key().to_string(),
        config.secret_key().to_string(),
    ));

    Ok((rest, stream))
}
