//! Identity, session and device collaborators.
//!
//! The engine does not own credentials or device provisioning; it asks
//! these traits for each value when it needs it and treats a missing value
//! as a distinct precondition failure.

/// Account/session information for the identity being reconciled.
pub trait AccountSession {
    /// Account handle (`user` or `user@host`) used in the relay callback path.
    fn account_handle(&self) -> &str;

    /// Access token for authenticated server calls, if one is available.
    fn access_token(&self) -> Option<String>;

    /// Whether this is a pseudo (read-only, unauthenticated) account.
    fn is_pseudo(&self) -> bool;
}

/// Device and installation identifiers.
pub trait DeviceProvisioning {
    /// Push-delivery device id (e.g. FCM registration token).
    fn device_id(&self) -> Option<String>;

    /// Installation id registered with the relay server.
    fn install_id(&self) -> Option<String>;
}

/// Plain-value account session.
#[derive(Debug, Clone, Default)]
pub struct StaticAccount {
    /// Account handle.
    pub handle: String,
    /// Access token, if any.
    pub access_token: Option<String>,
    /// Pseudo-account flag.
    pub pseudo: bool,
}

impl StaticAccount {
    /// Authenticated account with the given handle and token.
    pub fn new(handle: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            access_token: Some(access_token.into()),
            pseudo: false,
        }
    }
}

impl AccountSession for StaticAccount {
    fn account_handle(&self) -> &str {
        &self.handle
    }

    fn access_token(&self) -> Option<String> {
        self.access_token.clone().filter(|t| !t.is_empty())
    }

    fn is_pseudo(&self) -> bool {
        self.pseudo
    }
}

/// Plain-value device provisioning.
#[derive(Debug, Clone, Default)]
pub struct StaticDevice {
    /// Device id, if provisioned.
    pub device_id: Option<String>,
    /// Install id, if provisioned.
    pub install_id: Option<String>,
}

impl StaticDevice {
    /// Fully provisioned device.
    pub fn new(device_id: impl Into<String>, install_id: impl Into<String>) -> Self {
        Self {
            device_id: Some(device_id.into()),
            install_id: Some(install_id.into()),
        }
    }
}

impl DeviceProvisioning for StaticDevice {
    fn device_id(&self) -> Option<String> {
        self.device_id.clone().filter(|id| !id.is_empty())
    }

    fn install_id(&self) -> Option<String> {
        self.install_id.clone().filter(|id| !id.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_values_count_as_missing() {
        let account = StaticAccount {
            handle: "alice".to_string(),
            access_token: Some(String::new()),
            pseudo: false,
        };
        assert_eq!(account.access_token(), None);

        let device = StaticDevice {
            device_id: Some(String::new()),
            install_id: Some("install".to_string()),
        };
        assert_eq!(device.device_id(), None);
        assert_eq!(device.install_id().as_deref(), Some("install"));
    }
}
