//! Scheme registration
//!
//! Binds a URL scheme (e.g. `freenet`) to a peer configuration. Registration
//! returns a handle; nothing is stored in global state.

use crate::config::Config;
use crate::error::{FcpError, Result};

use super::RemoteStore;

/// A registered scheme and the peer it opens stores on
#[derive(Debug, Clone)]
pub struct SchemeHandle {
    scheme: String,
    config: Config,
}

/// Register `scheme`; call once during initialization and keep the handle
pub fn register_scheme(scheme: impl Into<String>, config: Config) -> SchemeHandle {
    let scheme = scheme.into();
    tracing::debug!("Registered scheme {}:// for {}", scheme, config.endpoint);
    SchemeHandle { scheme, config }
}

impl SchemeHandle {
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Whether `url` is of the form `{scheme}://...`
    pub fn matches(&self, url: &str) -> bool {
        self.base_of(url).is_some()
    }

    /// The part of `url` after `{scheme}://`
    pub fn base_of<'a>(&self, url: &'a str) -> Option<&'a str> {
        url.strip_prefix(self.scheme.as_str())?.strip_prefix("://")
    }

    /// Connect and open a store rooted at the URL's base, with a trailing `/`
    pub fn open(&self, url: &str) -> Result<RemoteStore> {
        let base = self.base_of(url).ok_or_else(|| {
            FcpError::Config(format!("{} is not a {}:// URL", url, self.scheme))
        })?;
        if base.is_empty() {
            return Err(FcpError::Config(format!("{} has no base address", url)));
        }

        let base = if base.ends_with('/') {
            base.to_string()
        } else {
            format!("{}/", base)
        };
        RemoteStore::connect(self.config.clone(), base)
    }
}
