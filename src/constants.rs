//! Protocol constants for push subscription reconciliation.
//!
//! Centralizes the endpoint paths, version thresholds and timeouts used by
//! the server and relay clients.
//!
//! # Categories
//!
//! - **Timeouts**: Network timeouts handed to the transport
//! - **Server**: Social-network server API paths
//! - **Relay**: Relay server API paths and defaults

use std::time::Duration;

// ============================================================================
// Timeouts
// ============================================================================

/// HTTP client request timeout for server and relay calls.
///
/// A timed-out call is reported as unreachable; retry is left to whoever
/// schedules the next reconciliation.
pub const HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// Social-network server
// ============================================================================

/// Push subscription resource (GET/POST/DELETE).
pub const PUSH_SUBSCRIPTION_PATH: &str = "/api/v1/push/subscription";

/// Instance information endpoint carrying the server version string.
pub const INSTANCE_INFO_PATH: &str = "/api/v1/instance";

/// First server version that has the push subscription API.
pub const PUSH_API_INTRODUCED: &str = "2.4.0-rc.1";

/// First server version whose 404 on the subscription resource
/// unambiguously means "not subscribed".
pub const PUSH_API_404_UNAMBIGUOUS: &str = "2.4.0-rc.2";

/// Fixed P-256 ECDH public key sent in the subscription body.
///
/// TODO: provision a per-installation key pair once the relay can decrypt
/// payloads per client instead of with this shared key.
pub const PUSH_KEY_P256DH: &str =
    "BBEUVi7Ehdzzpe_ZvlzzkQnhujNJuBKH1R0xYg7XdAKNFKQG9Gpm0TSGRGSuaU7LUFKX-uz8YW0hAshifDCkPuE";

/// Fixed auth secret sent alongside [`PUSH_KEY_P256DH`].
pub const PUSH_KEY_AUTH: &str = "iRdmDrOS6eK6xvG1H6KshQ";

// ============================================================================
// Relay server
// ============================================================================

/// Default relay (app server) base URL.
pub const DEFAULT_RELAY_URL: &str = "https://mastodon-msg.juggler.jp";

/// Relay endpoint registering a server public key for a client identifier.
pub const RELAY_SERVER_KEY_PATH: &str = "/webpushserverkey";

/// Relay endpoint granting write priority for an access token.
pub const RELAY_TOKEN_CHECK_PATH: &str = "/webpushtokencheck";

/// Relay path prefix that the server delivers push payloads to.
pub const RELAY_CALLBACK_PATH: &str = "/webpushcallback";
