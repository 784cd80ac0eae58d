//! Reconciliation engine.
//!
//! Converges three views of one account's push subscription: the desired
//! [`SubscriptionIntent`], the server's subscription record, and the relay's
//! server-key registry. A run is a single sequential pass that stops at the
//! first applicable outcome:
//!
//! ```text
//! pseudo account?            -> Unsupported
//! read subscription          -> record | 404 | unknown
//! no record?                 -> probe capability (pre-2.4.0rc1 -> Unsupported)
//!   404 + empty intent + rc2+ -> done, nothing to delete
//! device id / token / install id present?
//! record endpoint == target? -> sync server key, done (no writes)
//! relay token check          -> TokenSuperseded on refusal
//! empty intent               -> DELETE
//! otherwise                  -> POST, sync server key from response
//! ```
//!
//! At most one subscription write and one relay key write happen per run.
//! No retry happens here; callers schedule the next run.

use crate::account::{AccountSession, DeviceProvisioning};
use crate::capability::CapabilityProber;
use crate::digest;
use crate::error::{Precondition, ReconcileError, RejectionKind};
use crate::intent::SubscriptionIntent;
use crate::oplog::OperationLog;
use crate::registry::{KeyStore, ServerKeyRegistry};
use crate::relay::{self, ClientIdentity, RelayClient};
use crate::remote::{RemoteSubscription, SubscriptionApi};
use crate::transport::{Method, Transport};

/// Successful end state of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// Whether the account is subscribed after the run.
    pub subscribed: bool,
    /// Remote refusal that was tolerated (403/404 on delete).
    pub warning: Option<ReconcileError>,
}

impl Outcome {
    fn subscribed() -> Self {
        Self {
            subscribed: true,
            warning: None,
        }
    }

    fn unsubscribed() -> Self {
        Self {
            subscribed: false,
            warning: None,
        }
    }

    fn unsubscribed_with(warning: ReconcileError) -> Self {
        Self {
            subscribed: false,
            warning: Some(warning),
        }
    }
}

/// Result of one reconciliation, with its full operation log.
#[derive(Debug, Clone)]
pub struct ReconciliationResult {
    /// Outcome or terminal error.
    pub outcome: Result<Outcome, ReconcileError>,
    /// Everything recorded during the run. On error the last entry is the
    /// error message.
    pub log: OperationLog,
    verbose: bool,
}

impl ReconciliationResult {
    /// Whether the run ended without error.
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Whether the account is subscribed after the run.
    pub fn subscribed(&self) -> bool {
        self.outcome.as_ref().is_ok_and(|o| o.subscribed)
    }

    /// Terminal error, if any.
    pub fn error(&self) -> Option<&ReconcileError> {
        self.outcome.as_ref().err()
    }

    /// Human-readable terminal error, if any.
    pub fn error_message(&self) -> Option<String> {
        self.error().map(ToString::to_string)
    }

    /// Log lines surfaced at the verbosity the run was configured with.
    pub fn rendered_log(&self) -> String {
        self.log.render(self.verbose)
    }
}

/// Runs reconciliations against one server/relay pair.
///
/// Holds no per-identity state, so reconcilers for different identities can
/// run concurrently. Running two reconciliations for the same identity at
/// once is the caller's responsibility to avoid.
#[derive(Debug)]
pub struct Reconciler<'a, T: Transport, S: KeyStore> {
    transport: &'a T,
    store: &'a S,
    server_url: &'a str,
    relay_url: &'a str,
    verbose: bool,
}

impl<'a, T: Transport, S: KeyStore> Reconciler<'a, T, S> {
    /// Reconciler for the server at `server_url` and the relay at `relay_url`.
    pub fn new(transport: &'a T, store: &'a S, server_url: &'a str, relay_url: &'a str) -> Self {
        Self {
            transport,
            store,
            server_url: server_url.trim_end_matches('/'),
            relay_url: relay_url.trim_end_matches('/'),
            verbose: false,
        }
    }

    /// Surface verbose log entries in [`ReconciliationResult::rendered_log`].
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Bring the remote subscription in line with `intent`.
    pub fn reconcile<A, D>(
        &self,
        account: &A,
        device: &D,
        intent: SubscriptionIntent,
    ) -> ReconciliationResult
    where
        A: AccountSession + ?Sized,
        D: DeviceProvisioning + ?Sized,
    {
        log::info!(
            "[PushSync] reconciling {} (flags={})",
            account.account_handle(),
            intent.flags()
        );

        let mut log = OperationLog::new();
        let outcome = self.run(account, device, intent, &mut log);

        match &outcome {
            Ok(o) => log::info!(
                "[PushSync] {} subscribed={}",
                account.account_handle(),
                o.subscribed
            ),
            Err(e) => {
                log::warn!("[PushSync] {} failed: {}", account.account_handle(), e);
                log.add(e.to_string());
            }
        }

        ReconciliationResult {
            outcome,
            log,
            verbose: self.verbose,
        }
    }

    fn run<A, D>(
        &self,
        account: &A,
        device: &D,
        intent: SubscriptionIntent,
        log: &mut OperationLog,
    ) -> Result<Outcome, ReconcileError>
    where
        A: AccountSession + ?Sized,
        D: DeviceProvisioning + ?Sized,
    {
        if account.is_pseudo() {
            return Err(ReconcileError::unsupported("pseudo account"));
        }

        let api = SubscriptionApi::new(self.transport, self.server_url, account.access_token());
        let current = api.read_current(log)?;

        if current.record.is_none() {
            let info = CapabilityProber::new(self.transport, self.server_url).probe(log)?;
            if current.not_found
                && intent.is_empty()
                && info.capability.not_found_means_unsubscribed()
            {
                log.verbose("push subscription does not exist.");
                return Ok(Outcome::unsubscribed());
            }
        }

        let device_id = device
            .device_id()
            .ok_or(ReconcileError::MissingPrecondition(Precondition::DeviceId))?;
        let access_token = account
            .access_token()
            .ok_or(ReconcileError::MissingPrecondition(Precondition::AccessToken))?;
        let install_id = device
            .install_id()
            .ok_or(ReconcileError::MissingPrecondition(Precondition::InstallId))?;

        let identity = ClientIdentity {
            device_id,
            client_identifier: digest::client_identifier(&access_token, &install_id),
        };
        let endpoint =
            relay::callback_endpoint(self.relay_url, &identity, account.account_handle(), intent);
        let registry = ServerKeyRegistry::new(self.transport, self.relay_url, self.store);

        if let Some(record) = current.record.as_ref().filter(|r| r.endpoint == endpoint) {
            log.verbose("push subscription already exists.");
            registry.sync_key(&identity.client_identifier, record.server_key.as_deref(), log);
            return Ok(Outcome::subscribed());
        }

        RelayClient::new(self.transport, self.relay_url)
            .claim_write_priority(&digest::token_digest(&access_token), &install_id)?;

        if intent.is_empty() {
            return Self::unsubscribe(&api, log);
        }

        let response = api.subscribe(&endpoint, intent)?;
        match response.status {
            200 => {
                log.verbose("push subscription updated.");
                let created = response.json.as_ref().and_then(RemoteSubscription::from_json);
                if let Some(record) = created {
                    registry.sync_key(
                        &identity.client_identifier,
                        record.server_key.as_deref(),
                        log,
                    );
                }
                Ok(Outcome::subscribed())
            }
            403 | 404 => {
                log.verbose(format!("{}.", RejectionKind::from_status(response.status)));
                Err(ReconcileError::rejected(response.status))
            }
            status => {
                log.add(api.describe(Method::Post));
                log.add(response.status_line());
                log.add(response.body_text);
                Err(ReconcileError::rejected(status))
            }
        }
    }

    fn unsubscribe(
        api: &SubscriptionApi<'_, T>,
        log: &mut OperationLog,
    ) -> Result<Outcome, ReconcileError> {
        let response = api.unsubscribe()?;
        match response.status {
            200 => {
                log.verbose("push subscription deleted.");
                Ok(Outcome::unsubscribed())
            }
            404 => {
                log.verbose(format!("{}.", RejectionKind::NotFound));
                Ok(Outcome::unsubscribed_with(ReconcileError::rejected(404)))
            }
            403 => {
                log.verbose(format!("{}.", RejectionKind::Scope));
                Ok(Outcome::unsubscribed_with(ReconcileError::rejected(403)))
            }
            status => {
                log.add(api.describe(Method::Delete));
                log.add(response.status_line());
                Err(ReconcileError::rejected(status))
            }
        }
    }
}
