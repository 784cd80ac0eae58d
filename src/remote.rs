//! Push subscription resource on the social-network server.
//!
//! [`SubscriptionApi`] reads the current subscription (tolerating absence)
//! and issues the create/update and delete calls. It reports raw responses;
//! the engine decides what each status means.

use serde::Serialize;
use serde_json::Value;

use crate::constants;
use crate::error::ReconcileError;
use crate::intent::{Alerts, SubscriptionIntent};
use crate::oplog::OperationLog;
use crate::transport::{HttpRequest, HttpResponse, Method, Transport};

/// The server's record of this account's push subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSubscription {
    /// Endpoint the server delivers pushes to.
    pub endpoint: String,
    /// Server public key used to sign pushes, if the server reports one.
    pub server_key: Option<String>,
}

impl RemoteSubscription {
    /// Parse a subscription entity. Returns `None` without an endpoint.
    pub fn from_json(json: &Value) -> Option<Self> {
        let endpoint = json.get("endpoint")?.as_str()?.to_string();
        let server_key = json
            .get("server_key")
            .and_then(Value::as_str)
            .filter(|k| !k.is_empty())
            .map(String::from);
        Some(Self {
            endpoint,
            server_key,
        })
    }
}

/// What a read of the subscription resource established.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteState {
    /// Parsed record, when the server answered 200 with a usable body.
    pub record: Option<RemoteSubscription>,
    /// The server answered 404. Whether that means "no subscription" or
    /// "no push API" depends on the server capability.
    pub not_found: bool,
}

/// `subscription.keys` of the POST body.
#[derive(Debug, Clone, Serialize)]
struct PushKeys<'a> {
    p256dh: &'a str,
    auth: &'a str,
}

#[derive(Debug, Clone, Serialize)]
struct SubscriptionBody<'a> {
    endpoint: &'a str,
    keys: PushKeys<'a>,
}

#[derive(Debug, Clone, Serialize)]
struct SubscriptionData {
    alerts: Alerts,
}

/// POST body for `/api/v1/push/subscription`.
#[derive(Debug, Clone, Serialize)]
struct SubscribeRequest<'a> {
    subscription: SubscriptionBody<'a>,
    data: SubscriptionData,
}

/// Build the JSON body that creates or replaces the subscription.
pub fn subscribe_body(endpoint: &str, intent: SubscriptionIntent) -> Value {
    let body = SubscribeRequest {
        subscription: SubscriptionBody {
            endpoint,
            keys: PushKeys {
                p256dh: constants::PUSH_KEY_P256DH,
                auth: constants::PUSH_KEY_AUTH,
            },
        },
        data: SubscriptionData {
            alerts: intent.alerts(),
        },
    };
    serde_json::to_value(body).unwrap_or(Value::Null)
}

/// Client for the push subscription resource.
#[derive(Debug)]
pub struct SubscriptionApi<'a, T: Transport> {
    transport: &'a T,
    url: String,
    access_token: Option<String>,
}

impl<'a, T: Transport> SubscriptionApi<'a, T> {
    /// Client for the server at `server_url`, authenticating with
    /// `access_token` when one is available.
    pub fn new(transport: &'a T, server_url: &str, access_token: Option<String>) -> Self {
        Self {
            transport,
            url: format!("{}{}", server_url, constants::PUSH_SUBSCRIPTION_PATH),
            access_token,
        }
    }

    fn authorize(&self, request: HttpRequest) -> HttpRequest {
        match &self.access_token {
            Some(token) => request.with_bearer(token.clone()),
            None => request,
        }
    }

    /// Read the current subscription.
    ///
    /// 200 with a parseable body yields a record. 404 sets `not_found`.
    /// Any other status is logged and reported as "unknown" (no record,
    /// not `not_found`). Only a missing response is an error.
    pub fn read_current(&self, log: &mut OperationLog) -> Result<RemoteState, ReconcileError> {
        let request = self.authorize(HttpRequest::get(self.url.clone()));
        let response = self.transport.execute(&request)?;

        let mut state = RemoteState::default();
        match response.status {
            200 => {
                state.record = response.json.as_ref().and_then(RemoteSubscription::from_json);
                if state.record.is_none() {
                    log::warn!("[PushSync] subscription response has no usable body");
                    log.add("(subscription response has no usable body.)");
                }
            }
            404 => state.not_found = true,
            _ => {
                log.add(request.to_string());
                log.add(response.status_line());
            }
        }
        Ok(state)
    }

    /// Create or replace the subscription for `endpoint` with `intent`'s alerts.
    pub fn subscribe(
        &self,
        endpoint: &str,
        intent: SubscriptionIntent,
    ) -> Result<HttpResponse, ReconcileError> {
        let request = self.authorize(HttpRequest::post(
            self.url.clone(),
            subscribe_body(endpoint, intent),
        ));
        Ok(self.transport.execute(&request)?)
    }

    /// Delete the subscription.
    pub fn unsubscribe(&self) -> Result<HttpResponse, ReconcileError> {
        let request = self.authorize(HttpRequest::delete(self.url.clone()));
        Ok(self.transport.execute(&request)?)
    }

    /// Display form of the subscription resource, for log lines.
    pub fn describe(&self, method: Method) -> String {
        format!("{} {}", method, self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_subscription_entity() {
        let record = RemoteSubscription::from_json(&json!({
            "id": 3,
            "endpoint": "https://relay.example/webpushcallback/a/b/1/c",
            "alerts": {"follow": true},
            "server_key": "BKey"
        }))
        .unwrap();
        assert_eq!(record.endpoint, "https://relay.example/webpushcallback/a/b/1/c");
        assert_eq!(record.server_key.as_deref(), Some("BKey"));
    }

    #[test]
    fn test_parse_requires_endpoint() {
        assert!(RemoteSubscription::from_json(&json!({"server_key": "k"})).is_none());
        assert!(RemoteSubscription::from_json(&json!({"error": "Record not found"})).is_none());
    }

    #[test]
    fn test_missing_or_empty_server_key() {
        let record =
            RemoteSubscription::from_json(&json!({"endpoint": "e", "server_key": ""})).unwrap();
        assert_eq!(record.server_key, None);
    }

    #[test]
    fn test_subscribe_body_shape() {
        let intent = SubscriptionIntent::new(false, true, false, true);
        let body = subscribe_body("https://relay/cb", intent);
        assert_eq!(body["subscription"]["endpoint"], "https://relay/cb");
        assert_eq!(body["subscription"]["keys"]["p256dh"], constants::PUSH_KEY_P256DH);
        assert_eq!(body["subscription"]["keys"]["auth"], constants::PUSH_KEY_AUTH);
        assert_eq!(
            body["data"]["alerts"],
            json!({"follow": false, "favourite": true, "reblog": false, "mention": true})
        );
    }
}
