//! pushsync - push subscription reconciliation.
//!
//! Keeps a client's desired push-notification categories in line with the
//! push subscription held by a federated social-network server and the
//! server-key registry held by the push relay.
//!
//! # Architecture
//!
//! - **Engine** - single-pass decision procedure, owns the operation log
//! - **Server** - subscription resource reader/writer and capability prober
//! - **Relay** - callback addressing, token arbitration, server-key registry
//! - **Transport** - HTTP seam; reqwest in production, scripted in tests
//!
//! # Modules
//!
//! - [`engine`] - Reconciliation engine and result types
//! - [`capability`] - Server version parsing and capability classification
//! - [`remote`] - Push subscription resource client
//! - [`relay`] - Relay callback endpoint and token check
//! - [`registry`] - Server-key cache and relay registration
//! - [`digest`] - One-way client identifiers
//! - [`config`] - Configuration loading/saving

pub mod account;
pub mod capability;
pub mod config;
pub mod constants;
pub mod digest;
pub mod engine;
pub mod error;
pub mod intent;
pub mod oplog;
pub mod registry;
pub mod relay;
pub mod remote;
pub mod transport;

// Re-export commonly used types
pub use account::{AccountSession, DeviceProvisioning, StaticAccount, StaticDevice};
pub use capability::ServerCapability;
pub use config::Config;
pub use engine::{Outcome, ReconciliationResult, Reconciler};
pub use error::{Precondition, ReconcileError, RejectionKind, TransportError};
pub use intent::SubscriptionIntent;
pub use registry::{FileKeyStore, KeyStore, MemoryKeyStore};
pub use transport::{HttpRequest, HttpResponse, Method, ReqwestTransport, Transport};
