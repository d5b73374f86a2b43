use crate::core::errors::ExchangeError;
use crate::core::kernel::WsCodec;
use crate::exchanges::bybit::types::{BybitPosition, BybitWalletAccount};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_tungstenite::tungstenite::Message;

/// Messages arriving on Bybit's private v5 stream.
#[derive(Debug)]
pub enum BybitPrivateEvent {
    Wallet(Vec<BybitWalletAccount>),
    Position(Vec<BybitPosition>),
    /// Acknowledgement of an `auth` or `subscribe` request.
    OpResponse { op: String, success: bool, message: String },
}

/// Bybit subscription request structure
#[derive(Debug, Serialize)]
struct BybitSubscription {
    op: String,
    args: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct BybitOpAck {
    #[serde(default)]
    op: String,
    #[serde(default)]
    success: bool,
    #[serde(rename = "ret_msg", default)]
    ret_msg: String,
}

/// Codec for the private v5 WebSocket: `wallet` and `position` topics plus
/// operation acknowledgements. Everything else is filtered out.
pub struct BybitPrivateCodec;

impl WsCodec for BybitPrivateCodec {
    type Message = BybitPrivateEvent;

    fn encode_subscription(
        &self,
        streams: &[impl AsRef<str> + Send + Sync],
    ) -> Result<Message, ExchangeError> {
        let subscription = BybitSubscription {
            op: "subscribe".to_string(),
            args: streams.iter().map(|s| s.as_ref().to_string()).collect(),
        };

        let json_str = serde_json::to_string(&subscription).map_err(|e| {
            ExchangeError::SerializationError(format!("Failed to encode subscription: {}", e))
        })?;

        Ok(Message::Text(json_str))
    }

    fn decode_message(&self, message: Message) -> Result<Option<Self::Message>, ExchangeError> {
        let Message::Text(text) = message else {
            return Ok(None);
        };

        let value: Value = serde_json::from_str(&text).map_err(|e| {
            ExchangeError::DeserializationError(format!("Invalid private stream frame: {}", e))
        })?;

        if let Some(topic) = value.get("topic").and_then(|t| t.as_str()) {
            let Some(data) = value.get("data") else {
                return Ok(None);
            };
            return match topic {
                "wallet" => {
                    let accounts = serde_json::from_value(data.clone()).map_err(|e| {
                        ExchangeError::DeserializationError(format!(
                            "Invalid wallet update: {}",
                            e
                        ))
                    })?;
                    Ok(Some(BybitPrivateEvent::Wallet(accounts)))
                }
                "position" => {
                    let positions = serde_json::from_value(data.clone()).map_err(|e| {
                        ExchangeError::DeserializationError(format!(
                            "Invalid position update: {}",
                            e
                        ))
                    })?;
                    Ok(Some(BybitPrivateEvent::Position(positions)))
                }
                _ => Ok(None),
            };
        }

        if value.get("op").is_some() {
            let ack: BybitOpAck = serde_json::from_value(value).map_err(|e| {
                ExchangeError::DeserializationError(format!("Invalid op response: {}", e))
            })?;
            return Ok(Some(BybitPrivateEvent::OpResponse {
                op: ack.op,
                success: ack.success,
                message: ack.ret_msg,
            }));
        }

        Ok(None)
    }
}
