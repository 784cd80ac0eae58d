//! Relay (app server) addressing and write-priority check.
//!
//! The relay receives pushes from the server on a callback URL that
//! encodes who the push is for, and arbitrates between installations that
//! share one access token.

use serde::Serialize;

use crate::constants;
use crate::error::ReconcileError;
use crate::intent::SubscriptionIntent;
use crate::transport::{HttpRequest, Transport};

/// Identity under which this installation addresses the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    /// Push-delivery device id.
    pub device_id: String,
    /// Digest of access token + install id.
    pub client_identifier: String,
}

/// Callback URL the server should push to.
///
/// `{relay}/webpushcallback/{deviceId}/{accountHandle}/{flags}/{clientIdentifier}`
/// with every segment percent-encoded. The flags are part of the path so a
/// change of intent is visible as a change of endpoint.
pub fn callback_endpoint(
    relay_url: &str,
    identity: &ClientIdentity,
    account_handle: &str,
    intent: SubscriptionIntent,
) -> String {
    format!(
        "{}{}/{}/{}/{}/{}",
        relay_url,
        constants::RELAY_CALLBACK_PATH,
        urlencoding::encode(&identity.device_id),
        urlencoding::encode(account_handle),
        intent.flags(),
        urlencoding::encode(&identity.client_identifier),
    )
}

#[derive(Debug, Serialize)]
struct TokenCheckRequest<'a> {
    token_digest: &'a str,
    install_id: &'a str,
}

/// Client for the relay's token arbitration endpoint.
#[derive(Debug)]
pub struct RelayClient<'a, T: Transport> {
    transport: &'a T,
    relay_url: &'a str,
}

impl<'a, T: Transport> RelayClient<'a, T> {
    /// Client for the relay at `relay_url`.
    pub fn new(transport: &'a T, relay_url: &'a str) -> Self {
        Self {
            transport,
            relay_url,
        }
    }

    /// Claim write priority for the token with digest `token_digest`.
    ///
    /// Anything but 200 means another installation owns the token's relay
    /// slot and is reported as [`ReconcileError::TokenSuperseded`].
    pub fn claim_write_priority(
        &self,
        token_digest: &str,
        install_id: &str,
    ) -> Result<(), ReconcileError> {
        let body = serde_json::to_value(TokenCheckRequest {
            token_digest,
            install_id,
        })
        .map_err(|e| ReconcileError::internal(e.to_string()))?;
        let request = HttpRequest::post(
            format!("{}{}", self.relay_url, constants::RELAY_TOKEN_CHECK_PATH),
            body,
        );

        let response = self.transport.execute(&request)?;
        if response.is_ok() {
            Ok(())
        } else {
            log::warn!("[Relay] token check refused: {}", response.status_line());
            Err(ReconcileError::TokenSuperseded)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> ClientIdentity {
        ClientIdentity {
            device_id: "dev:ice/1".to_string(),
            client_identifier: "abc-_XYZ".to_string(),
        }
    }

    #[test]
    fn test_callback_endpoint_encodes_segments() {
        let endpoint = callback_endpoint(
            "https://relay.example",
            &identity(),
            "alice@social.example",
            SubscriptionIntent::new(true, false, false, true),
        );
        assert_eq!(
            endpoint,
            "https://relay.example/webpushcallback/dev%3Aice%2F1/alice%40social.example/9/abc-_XYZ"
        );
    }

    #[test]
    fn test_callback_endpoint_differs_per_intent() {
        let a = callback_endpoint("r", &identity(), "alice", SubscriptionIntent::from_flags(1));
        let b = callback_endpoint("r", &identity(), "alice", SubscriptionIntent::from_flags(2));
        let a_again =
            callback_endpoint("r", &identity(), "alice", SubscriptionIntent::from_flags(1));
        assert_ne!(a, b);
        assert_eq!(a, a_again);
    }
}
