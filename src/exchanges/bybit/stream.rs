use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::core::errors::ExchangeError;
use crate::core::kernel::{TungsteniteWs, WsSession};
use crate::core::retry::retry_forever;
use crate::core::traits::{FuturesStream, PositionHandler, UpdateSubscription, WalletHandler};
use crate::exchanges::bybit::codec::{BybitPrivateCodec, BybitPrivateEvent};
use crate::exchanges::bybit::converters;
use crate::exchanges::bybit::signer::ws_auth_request;
use crate::exchanges::SETTLE_ASSET;

/// [`FuturesStream`] gateway over Bybit's private v5 WebSocket.
///
/// Each subscription runs one socket on its own driver task. The driver
/// authenticates, subscribes to a single topic, and feeds decoded updates
/// to the handler. When the transport drops it emits one connection-lost
/// event and, with auto-reconnect enabled, re-establishes the stream with
/// unbounded backoff.
pub struct BybitStream {
    ws_url: String,
    api_key: String,
    secret_key: String,
}

impl BybitStream {
    pub fn new(ws_url: String, api_key: String, secret_key: String) -> Self {
        Self {
            ws_url,
            api_key,
            secret_key,
        }
    }

    fn spawn_driver<F>(&self, topic: &'static str, dispatch: F) -> UpdateSubscription
    where
        F: Fn(BybitPrivateEvent) + Send + 'static,
    {
        let auto_reconnect = Arc::new(AtomicBool::new(false));
        let (lost_tx, lost_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();

        let url = self.ws_url.clone();
        let api_key = self.api_key.clone();
        let secret_key = self.secret_key.clone();
        let reconnect_flag = Arc::clone(&auto_reconnect);
        let driver_shutdown = shutdown.clone();

        let task = tokio::spawn(async move {
            loop {
                let Some(mut ws) =
                    connect_and_subscribe(&url, &api_key, &secret_key, topic, &driver_shutdown)
                        .await
                else {
                    break; // shutting down
                };
                info!(topic, "bybit private stream connected");

                let mut closed = false;
                loop {
                    tokio::select! {
                        () = driver_shutdown.cancelled() => {
                            let _ = ws.close().await;
                            closed = true;
                            break;
                        }
                        message = ws.next_message() => match message {
                            Some(Ok(BybitPrivateEvent::OpResponse { op, success, message })) => {
                                if success {
                                    debug!(topic, %op, "bybit stream request acknowledged");
                                } else {
                                    error!(topic, %op, %message, "bybit stream request rejected");
                                }
                            }
                            Some(Ok(event)) => dispatch(event),
                            Some(Err(ExchangeError::DeserializationError(err))) => {
                                // One bad frame is not a dead connection.
                                warn!(topic, error = %err, "undecodable frame skipped");
                            }
                            Some(Err(err)) => {
                                warn!(topic, error = %err, "bybit stream error");
                                break;
                            }
                            None => break,
                        }
                    }
                }
                if closed {
                    break;
                }

                // Transport dropped out from under us.
                let _ = lost_tx.send(());
                if !reconnect_flag.load(Ordering::Relaxed) {
                    break;
                }
                warn!(topic, "bybit private stream dropped, reconnecting");
            }
        });

        UpdateSubscription::new(topic, auto_reconnect, lost_rx, shutdown, task)
    }
}

/// Connects, authenticates and subscribes, retrying without bound until it
/// succeeds or `shutdown` fires.
async fn connect_and_subscribe(
    url: &str,
    api_key: &str,
    secret_key: &str,
    topic: &str,
    shutdown: &CancellationToken,
) -> Option<TungsteniteWs<BybitPrivateCodec>> {
    let attempt = || async move {
        let mut ws = TungsteniteWs::new(url.to_string(), "bybit".to_string(), BybitPrivateCodec);
        ws.connect().await?;
        let auth = ws_auth_request(api_key, secret_key)?;
        ws.send_raw(Message::Text(auth)).await?;
        ws.subscribe(&[topic]).await?;
        Ok::<_, ExchangeError>(ws)
    };

    tokio::select! {
        () = shutdown.cancelled() => None,
        ws = retry_forever("bybit stream connect", attempt) => Some(ws),
    }
}

#[async_trait]
impl FuturesStream for BybitStream {
    async fn subscribe_wallet_updates(
        &self,
        handler: WalletHandler,
    ) -> Result<UpdateSubscription, ExchangeError> {
        Ok(self.spawn_driver("wallet", move |event| {
            let BybitPrivateEvent::Wallet(accounts) = event else {
                return;
            };
            for account in &accounts {
                if account.account_type != "UNIFIED" {
                    continue;
                }
                if let Some(coin) = account
                    .coin
                    .iter()
                    .find(|c| c.coin.eq_ignore_ascii_case(SETTLE_ASSET))
                {
                    handler(converters::balance_from_coin(coin));
                }
            }
        }))
    }

    async fn subscribe_position_updates(
        &self,
        handler: PositionHandler,
    ) -> Result<UpdateSubscription, ExchangeError> {
        Ok(self.spawn_driver("position", move |event| {
            let BybitPrivateEvent::Position(positions) = event else {
                return;
            };
            for wire in &positions {
                // The private stream mixes categories; only linear
                // contracts belong to this account view.
                if wire
                    .category
                    .as_deref()
                    .is_some_and(|category| category != "linear")
                {
                    continue;
                }
                match converters::position_from_wire(wire) {
                    Some(position) => handler(position),
                    None => {
                        warn!(symbol = %wire.symbol, "could not convert position update, record skipped");
                    }
                }
            }
        }))
    }
}
