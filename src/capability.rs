//! Server API capability detection.
//!
//! The push subscription API appeared in 2.4.0rc1, and only from 2.4.0rc2
//! does a 404 on the subscription resource reliably mean "not subscribed".
//! All 404 interpretation goes through [`ServerCapability`].
//!
//! Server version strings are loose (`2.4.0rc1`, `3.5.3+glitch`,
//! `2.7.2 (compatible; Pleroma 1.0.0)`), so they are normalized into a
//! [`semver::Version`] before comparison. Pre-release tags like `rc1` become
//! `rc.1` so that `rc2 < rc10` orders numerically.

use std::fmt;
use std::sync::LazyLock;

use semver::{BuildMetadata, Prerelease, Version};

use crate::constants;
use crate::error::ReconcileError;
use crate::oplog::OperationLog;
use crate::transport::{HttpRequest, Transport};

static PUSH_API_INTRODUCED: LazyLock<Version> = LazyLock::new(|| {
    Version::parse(constants::PUSH_API_INTRODUCED).expect("valid version constant")
});

static PUSH_API_404_UNAMBIGUOUS: LazyLock<Version> = LazyLock::new(|| {
    Version::parse(constants::PUSH_API_404_UNAMBIGUOUS).expect("valid version constant")
});

/// What the server's API version says about push subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ServerCapability {
    /// Before 2.4.0rc1: no push API.
    PreV2_4_0rc1,
    /// 2.4.0rc1: push API present, 404 is ambiguous.
    V2_4_0rc1,
    /// 2.4.0rc2 and later: 404 means "not subscribed".
    V2_4_0rc2Plus,
}

impl ServerCapability {
    /// Classify a parsed server version.
    pub fn classify(version: &Version) -> Self {
        if *version < *PUSH_API_INTRODUCED {
            Self::PreV2_4_0rc1
        } else if *version < *PUSH_API_404_UNAMBIGUOUS {
            Self::V2_4_0rc1
        } else {
            Self::V2_4_0rc2Plus
        }
    }

    /// Whether the server has the push subscription API at all.
    pub fn has_push_api(self) -> bool {
        self != Self::PreV2_4_0rc1
    }

    /// Whether a 404 on the subscription resource means "not subscribed".
    pub fn not_found_means_unsubscribed(self) -> bool {
        self == Self::V2_4_0rc2Plus
    }
}

impl fmt::Display for ServerCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PreV2_4_0rc1 => write!(f, "no push API (before 2.4.0rc1)"),
            Self::V2_4_0rc1 => write!(f, "push API, ambiguous 404 (2.4.0rc1)"),
            Self::V2_4_0rc2Plus => write!(f, "push API (2.4.0rc2 or later)"),
        }
    }
}

/// Parse a server-reported version string.
///
/// Takes the leading `major.minor[.patch]`, an immediately following
/// pre-release tag (`rc1`, `-rc.2`, `beta3`), and ignores build metadata or
/// any trailing text. Returns `None` when there is no numeric version.
pub fn parse_version(raw: &str) -> Option<Version> {
    let raw = raw.trim();
    let numeric_end = raw
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(raw.len());
    let (numeric, rest) = raw.split_at(numeric_end);

    let mut parts = numeric.trim_end_matches('.').split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    let patch = match parts.next() {
        Some(p) => p.parse().ok()?,
        None => 0,
    };

    let rest = match rest.strip_prefix(' ') {
        // "2.4.0 rc1": a spaced tag must look like one, not like prose.
        Some(spaced)
            if spaced.starts_with(|c: char| c.is_ascii_alphabetic())
                && spaced
                    .split(|c: char| !c.is_ascii_alphanumeric())
                    .next()
                    .is_some_and(|word| word.contains(|c: char| c.is_ascii_digit())) =>
        {
            spaced
        }
        Some(_) => "",
        None => rest.strip_prefix('-').unwrap_or(rest),
    };
    let tag: String = rest
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '.')
        .collect();

    Some(Version {
        major,
        minor,
        patch,
        pre: prerelease(&tag),
        build: BuildMetadata::EMPTY,
    })
}

/// Split a raw tag at letter/digit boundaries: `rc10` -> `rc.10`, `rc01` -> `rc.1`.
fn prerelease(tag: &str) -> Prerelease {
    let mut ids: Vec<String> = Vec::new();
    let mut last_digit: Option<bool> = None;
    for c in tag.chars() {
        if c == '.' {
            last_digit = None;
            continue;
        }
        let digit = c.is_ascii_digit();
        match ids.last_mut() {
            Some(id) if last_digit == Some(digit) => id.push(c),
            _ => ids.push(c.to_string()),
        }
        last_digit = Some(digit);
    }

    let ids: Vec<&str> = ids
        .iter()
        .map(|id| {
            if id.starts_with(|c: char| c.is_ascii_digit()) {
                let trimmed = id.trim_start_matches('0');
                if trimmed.is_empty() {
                    "0"
                } else {
                    trimmed
                }
            } else {
                id.as_str()
            }
        })
        .collect();
    Prerelease::new(&ids.join(".")).unwrap_or(Prerelease::EMPTY)
}

/// Server version and the capability derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    /// Version string as reported by the server.
    pub version: String,
    /// Capability classification.
    pub capability: ServerCapability,
}

/// Reads the server version and classifies it.
#[derive(Debug)]
pub struct CapabilityProber<'a, T: Transport> {
    transport: &'a T,
    server_url: &'a str,
}

impl<'a, T: Transport> CapabilityProber<'a, T> {
    /// Prober for the server at `server_url`.
    pub fn new(transport: &'a T, server_url: &'a str) -> Self {
        Self {
            transport,
            server_url,
        }
    }

    /// Fetch and classify the server version without judging it.
    pub fn fetch(&self, log: &mut OperationLog) -> Result<ServerInfo, ReconcileError> {
        let request = HttpRequest::get(format!(
            "{}{}",
            self.server_url,
            constants::INSTANCE_INFO_PATH
        ));
        let response = self.transport.execute(&request)?;

        if !response.is_ok() {
            log.add(request.to_string());
            log.add(response.status_line());
            return Err(ReconcileError::rejected(response.status));
        }

        let version = response
            .json
            .as_ref()
            .and_then(|json| json.get("version"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| ReconcileError::internal("instance information has no version"))?;

        let parsed = parse_version(version).ok_or_else(|| {
            ReconcileError::internal(format!("cannot parse server version '{version}'"))
        })?;
        let capability = ServerCapability::classify(&parsed);
        log::info!("[Capability] server version {} -> {}", version, capability);

        Ok(ServerInfo {
            version: version.to_string(),
            capability,
        })
    }

    /// Fetch the capability, failing with `Unsupported` when the server has
    /// no push API.
    pub fn probe(&self, log: &mut OperationLog) -> Result<ServerInfo, ReconcileError> {
        let info = self.fetch(log)?;
        if !info.capability.has_push_api() {
            return Err(ReconcileError::unsupported(format!(
                "server version {} has no push subscription API",
                info.version
            )));
        }
        Ok(info)
    }
}
