//! Device inventory types consumed by the batch orchestrator.
//!
//! A [`DeviceDescriptor`] is immutable once constructed and is supplied by
//! an external inventory collaborator (CSV reader, IPAM export, plain IP
//! list). The engine only consumes the already-resolved descriptors.

use secrecy::SecretString;

/// One username/password pair to try against a device.
///
/// The password is secrecy-wrapped: it never appears in `Debug` output,
/// logs, or serialized outcomes, and is exposed only at the
/// write-to-channel boundary.
#[derive(Debug, Clone)]
pub struct Credential {
    /// Login username.
    pub username: String,

    /// Login password.
    pub password: SecretString,
}

impl Credential {
    /// Create a new credential.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }
}

/// A device to automate: identity plus an ordered credential list.
///
/// Credentials are tried in order by the batch orchestrator; the first
/// one the device accepts is used for the (single) session attempt.
#[derive(Debug, Clone)]
pub struct DeviceDescriptor {
    /// Hostname or IP address.
    pub host: String,

    /// SSH port (default: 22).
    pub port: u16,

    /// Candidate credentials, in fallback order.
    pub credentials: Vec<Credential>,

    /// Secret for privilege escalation, if the device needs one.
    pub enable_secret: Option<SecretString>,
}

impl DeviceDescriptor {
    /// Create a descriptor for the given host with no credentials yet.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 22,
            credentials: Vec::new(),
            enable_secret: None,
        }
    }

    /// Set the SSH port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Append a candidate credential.
    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credentials.push(credential);
        self
    }

    /// Set the privilege escalation secret.
    pub fn with_enable_secret(mut self, secret: impl Into<String>) -> Self {
        self.enable_secret = Some(SecretString::from(secret.into()));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_fills_fields() {
        let device = DeviceDescriptor::new("10.0.0.1")
            .with_port(2222)
            .with_credential(Credential::new("admin", "hunter2"))
            .with_credential(Credential::new("backup", "hunter3"))
            .with_enable_secret("s3cret");

        assert_eq!(device.host, "10.0.0.1");
        assert_eq!(device.port, 2222);
        assert_eq!(device.credentials.len(), 2);
        assert_eq!(device.credentials[0].username, "admin");
        assert!(device.enable_secret.is_some());
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let device = DeviceDescriptor::new("10.0.0.1")
            .with_credential(Credential::new("admin", "hunter2"))
            .with_enable_secret("s3cret");

        let rendered = format!("{device:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("admin"));
    }
}
