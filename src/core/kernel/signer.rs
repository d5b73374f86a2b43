use crate::core::errors::ExchangeError;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::HashMap;

/// Result type for signing operations: (headers, `query_params`)
pub type SignatureResult = Result<(HashMap<String, String>, Vec<(String, String)>), ExchangeError>;

/// Signer trait for request authentication
///
/// Implementations produce whatever headers and query parameters the
/// exchange expects on an authenticated request.
pub trait Signer: Send + Sync {
    /// Sign a request and return headers and query parameters
    ///
    /// # Arguments
    /// * `method` - HTTP method (GET, POST, etc.)
    /// * `endpoint` - API endpoint path
    /// * `query_string` - Query string (without leading '?')
    /// * `timestamp` - Request timestamp in milliseconds
    fn sign_request(
        &self,
        method: &str,
        endpoint: &str,
        query_string: &str,
        timestamp: u64,
    ) -> SignatureResult;
}

/// HMAC-SHA256 signer covering the two authentication dialects this crate
/// talks to: Bybit's header-based scheme and Binance's query-string scheme.
pub struct HmacSigner {
    api_key: String,
    secret_key: String,
    exchange_type: HmacExchangeType,
}

/// Supported HMAC exchange types
#[derive(Debug, Clone)]
pub enum HmacExchangeType {
    Binance,
    Bybit,
}

const BYBIT_RECV_WINDOW: u64 = 5000;

impl HmacSigner {
    pub fn new(api_key: String, secret_key: String, exchange_type: HmacExchangeType) -> Self {
        Self {
            api_key,
            secret_key,
            exchange_type,
        }
    }

    fn hmac_hex(&self, payload: &str) -> Result<String, ExchangeError> {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.secret_key.as_bytes())
            .map_err(|e| ExchangeError::AuthError(format!("Invalid secret key: {}", e)))?;
        mac.update(payload.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

impl Signer for HmacSigner {
    fn sign_request(
        &self,
        _method: &str,
        _endpoint: &str,
        query_string: &str,
        timestamp: u64,
    ) -> SignatureResult {
        match self.exchange_type {
            HmacExchangeType::Binance => {
                // Binance signs the query string (timestamp included) and
                // appends the signature as one more query parameter.
                let query_with_timestamp = if query_string.is_empty() {
                    format!("timestamp={}", timestamp)
                } else {
                    format!("{}&timestamp={}", query_string, timestamp)
                };
                let signature = self.hmac_hex(&query_with_timestamp)?;

                let mut headers = HashMap::new();
                headers.insert("X-MBX-APIKEY".to_string(), self.api_key.clone());

                let mut signed_params: Vec<(String, String)> = query_with_timestamp
                    .split('&')
                    .filter_map(|param| {
                        param
                            .split_once('=')
                            .map(|(k, v)| (k.to_string(), v.to_string()))
                    })
                    .collect();
                signed_params.push(("signature".to_string(), signature));

                Ok((headers, signed_params))
            }
            HmacExchangeType::Bybit => {
                // Bybit signs "{timestamp}{api_key}{recv_window}{query}" and
                // carries everything in X-BAPI-* headers.
                let payload = format!(
                    "{}{}{}{}",
                    timestamp, self.api_key, BYBIT_RECV_WINDOW, query_string
                );
                let signature = self.hmac_hex(&payload)?;

                let mut headers = HashMap::new();
                headers.insert("X-BAPI-API-KEY".to_string(), self.api_key.clone());
                headers.insert("X-BAPI-TIMESTAMP".to_string(), timestamp.to_string());
                headers.insert(
                    "X-BAPI-RECV-WINDOW".to_string(),
                    BYBIT_RECV_WINDOW.to_string(),
                );
                headers.insert("X-BAPI-SIGN".to_string(), signature);

                let signed_params = query_string
                    .split('&')
                    .filter(|param| !param.is_empty())
                    .filter_map(|param| {
                        param
                            .split_once('=')
                            .map(|(k, v)| (k.to_string(), v.to_string()))
                    })
                    .collect();

                Ok((headers, signed_params))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bybit_signature_is_deterministic() {
        let signer = HmacSigner::new(
            "key".to_string(),
            "secret".to_string(),
            HmacExchangeType::Bybit,
        );
        let (headers_a, _) = signer
            .sign_request("GET", "/v5/position/list", "category=linear", 1_700_000_000_000)
            .unwrap();
        let (headers_b, _) = signer
            .sign_request("GET", "/v5/position/list", "category=linear", 1_700_000_000_000)
            .unwrap();
        assert_eq!(headers_a["X-BAPI-SIGN"], headers_b["X-BAPI-SIGN"]);
        assert_eq!(headers_a["X-BAPI-API-KEY"], "key");
    }

    #[test]
    fn binance_appends_signature_param() {
        let signer = HmacSigner::new(
            "key".to_string(),
            "secret".to_string(),
            HmacExchangeType::Binance,
        );
        let (headers, params) = signer
            .sign_request("GET", "/fapi/v2/balance", "", 1_700_000_000_000)
            .unwrap();
        assert_eq!(headers["X-MBX-APIKEY"], "key");
        assert_eq!(params.last().unwrap().0, "signature");
        assert!(params.iter().any(|(k, _)| k == "timestamp"));
    }
}
