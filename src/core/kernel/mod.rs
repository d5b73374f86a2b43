/// Unified transport layer shared by all exchange gateways
///
/// Contains only transport logic and generic interfaces; no exchange
/// semantics live here.
///
/// - `RestClient` / `ReqwestRest`: HTTP query interface with optional
///   request signing
/// - `Signer` / `HmacSigner`: pluggable authentication
/// - `WsCodec`: exchange-specific WebSocket message encoding/decoding
/// - `WsSession` / `TungsteniteWs`: WebSocket connection management
pub mod codec;
pub mod rest;
pub mod signer;
pub mod ws;

pub use codec::WsCodec;
pub use rest::{ReqwestRest, RestClient, RestClientBuilder, RestClientConfig};
pub use signer::{HmacExchangeType, HmacSigner, SignatureResult, Signer};
pub use ws::{TungsteniteWs, WsConfig, WsSession};
