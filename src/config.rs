//! Configuration for fcpstore
//!
//! Centralized configuration with sensible defaults.

use std::fmt;
use std::time::Duration;

use crate::error::{FcpError, Result};

/// Default FCP host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default FCP port
pub const DEFAULT_PORT: u16 = 9481;

/// Main configuration for a connection to an FCP peer
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// Peer address and socket timeout
    pub endpoint: Endpoint,

    /// Prefix for the generated client name sent in ClientHello
    pub client_name_prefix: String,

    // -------------------------------------------------------------------------
    // Handshake Configuration
    // -------------------------------------------------------------------------
    /// Reject peers below `version` (disable for test nodes)
    pub check_version: bool,

    /// Minimum peer build numbers
    pub version: VersionRequirement,

    // -------------------------------------------------------------------------
    // Operation Configuration
    // -------------------------------------------------------------------------
    /// Maximum number of redirects a get will follow
    pub max_redirects: usize,

    /// Peer-side retry budget sent as MaxRetries
    pub max_retries: i32,

    /// Default PriorityClass for new operations
    pub priority: Priority,

    // -------------------------------------------------------------------------
    // Store Configuration
    // -------------------------------------------------------------------------
    /// Upper bound on cached bytes; `None` keeps everything for the session
    pub cache_limit_bytes: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::default(),
            client_name_prefix: "fcpstore".to_string(),
            check_version: true,
            version: VersionRequirement::default(),
            max_redirects: 10,
            max_retries: 5,
            priority: Priority::Interactive,
            cache_limit_bytes: None,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the whole endpoint
    pub fn endpoint(mut self, endpoint: Endpoint) -> Self {
        self.config.endpoint = endpoint;
        self
    }

    /// Set the peer host
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.endpoint.host = host.into();
        self
    }

    /// Set the peer port
    pub fn port(mut self, port: u16) -> Self {
        self.config.endpoint.port = port;
        self
    }

    /// Set the socket timeout (in milliseconds)
    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.config.endpoint.timeout = Duration::from_millis(ms);
        self
    }

    /// Set the client name prefix
    pub fn client_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.client_name_prefix = prefix.into();
        self
    }

    /// Enable or disable the peer version check
    pub fn check_version(mut self, check: bool) -> Self {
        self.config.check_version = check;
        self
    }

    /// Set the minimum peer version
    pub fn version(mut self, version: VersionRequirement) -> Self {
        self.config.version = version;
        self
    }

    /// Set the redirect hop limit for gets
    pub fn max_redirects(mut self, hops: usize) -> Self {
        self.config.max_redirects = hops;
        self
    }

    /// Set the peer-side retry budget
    pub fn max_retries(mut self, retries: i32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Set the default priority class
    pub fn priority(mut self, priority: Priority) -> Self {
        self.config.priority = priority;
        self
    }

    /// Bound the read-through cache (in bytes)
    pub fn cache_limit_bytes(mut self, limit: Option<usize>) -> Self {
        self.config.cache_limit_bytes = limit;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

// =============================================================================
// Endpoint
// =============================================================================

/// Username and password parsed out of an `fcp://` URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: Option<String>,
}

/// Identifies the peer; immutable once a session is established
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub timeout: Duration,
    pub credentials: Option<Credentials>,
}

impl Default for Endpoint {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            timeout: Duration::from_secs(300),
            credentials: None,
        }
    }
}

impl Endpoint {
    /// Parse `host`, `host:port` or `fcp://[user[:password]@]host[:port][/]`
    pub fn parse(input: &str) -> Result<Self> {
        let mut endpoint = Endpoint::default();

        let rest = match input.split_once("://") {
            Some(("fcp", rest)) => rest,
            Some((scheme, _)) => {
                return Err(FcpError::Config(format!(
                    "Unsupported endpoint scheme: {}",
                    scheme
                )))
            }
            None => input,
        };
        let rest = rest.trim_end_matches('/');

        let host_port = match rest.rsplit_once('@') {
            Some((userinfo, host_port)) => {
                let credentials = match userinfo.split_once(':') {
                    Some((user, password)) => Credentials {
                        user: user.to_string(),
                        password: Some(password.to_string()),
                    },
                    None => Credentials {
                        user: userinfo.to_string(),
                        password: None,
                    },
                };
                endpoint.credentials = Some(credentials);
                host_port
            }
            None => rest,
        };

        match host_port.rsplit_once(':') {
            Some((host, port)) => {
                endpoint.port = port.parse().map_err(|_| {
                    FcpError::Config(format!("Invalid port in endpoint: {}", port))
                })?;
                endpoint.host = host.to_string();
            }
            None => endpoint.host = host_port.to_string(),
        }

        if endpoint.host.is_empty() {
            return Err(FcpError::Config(format!("Missing host in endpoint: {}", input)));
        }

        Ok(endpoint)
    }

    /// `host:port` string suitable for socket address resolution
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

// =============================================================================
// Peer Version Requirement
// =============================================================================

/// Minimum capabilities a peer must advertise in NodeHello
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRequirement {
    /// Minimum `Build`
    pub min_build: u32,

    /// Minimum `ExtBuild`
    pub min_ext_build: u32,

    /// Minimum `Revision` when `Build` is exactly one below `min_build`
    pub min_revision: u32,

    /// `Revision` value accepted unconditionally
    pub custom_revision: String,
}

impl Default for VersionRequirement {
    fn default() -> Self {
        Self {
            min_build: 1107,
            min_ext_build: 24,
            min_revision: 16181,
            custom_revision: "@custom@".to_string(),
        }
    }
}

// =============================================================================
// Priority
// =============================================================================

/// FCP PriorityClass, most urgent first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[repr(u8)]
pub enum Priority {
    Maximum = 0,
    #[default]
    Interactive = 1,
    SemiInteractive = 2,
    Updatable = 3,
    Bulk = 4,
    Prefetch = 5,
    Minimum = 6,
}

impl Priority {
    /// Wire value of the PriorityClass field
    pub fn class(self) -> u8 {
        self as u8
    }

    /// Build from a wire value
    pub fn from_class(class: u8) -> Result<Self> {
        Ok(match class {
            0 => Priority::Maximum,
            1 => Priority::Interactive,
            2 => Priority::SemiInteractive,
            3 => Priority::Updatable,
            4 => Priority::Bulk,
            5 => Priority::Prefetch,
            6 => Priority::Minimum,
            _ => {
                return Err(FcpError::Config(format!(
                    "PriorityClass must be 0..=6, got {}",
                    class
                )))
            }
        })
    }
}
