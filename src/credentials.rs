// src/credentials.rs
//! Per-call upstream credentials.
//!
//! `Credentials` is a plain value handed to every orchestrator call. The
//! `CredentialStore` only holds the default used when a caller passes none;
//! calls snapshot it once at start, so later `set`/`clear` calls never change
//! the credentials of a request already in flight.

use std::sync::RwLock;

use serde::{Deserialize, Serialize};

#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    #[serde(default)]
    pub api_key: Option<String>,
    /// Raw `Cookie` header value for the direct-session tier.
    #[serde(default)]
    pub cookies: Option<String>,
    #[serde(default)]
    pub csrf_token: Option<String>,
}

// Secrets never reach logs.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key.as_ref().map(|k| k.len()))
            .field("cookies", &self.cookies.as_ref().map(|c| c.len()))
            .field("csrf_token", &self.csrf_token.is_some())
            .finish()
    }
}

fn non_blank(s: &Option<String>) -> Option<&str> {
    s.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl Credentials {
    pub fn api_key(&self) -> Option<&str> {
        non_blank(&self.api_key)
    }

    pub fn cookies(&self) -> Option<&str> {
        non_blank(&self.cookies)
    }

    pub fn csrf_token(&self) -> Option<&str> {
        non_blank(&self.csrf_token)
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key().is_some()
    }

    pub fn has_auth(&self) -> bool {
        self.cookies().is_some()
    }

    /// Field-wise: own non-blank values first, then `defaults`.
    pub fn or_defaults(self, defaults: &Credentials) -> Credentials {
        let pick = |own: Option<String>, fallback: &Option<String>| {
            own.filter(|v| !v.trim().is_empty()).or_else(|| fallback.clone())
        };
        Credentials {
            api_key: pick(self.api_key, &defaults.api_key),
            cookies: pick(self.cookies, &defaults.cookies),
            csrf_token: pick(self.csrf_token, &defaults.csrf_token),
        }
    }

    /// Seed from `SCRAPER_API_KEY`, `SCRAPER_COOKIES`, `SCRAPER_CSRF_TOKEN`.
    pub fn from_env() -> Self {
        let var = |k: &str| std::env::var(k).ok().filter(|v| !v.trim().is_empty());
        Self {
            api_key: var("SCRAPER_API_KEY"),
            cookies: var("SCRAPER_COOKIES"),
            csrf_token: var("SCRAPER_CSRF_TOKEN"),
        }
    }
}

#[derive(Default)]
pub struct CredentialStore {
    inner: RwLock<Credentials>,
}

impl CredentialStore {
    pub fn new(initial: Credentials) -> Self {
        Self {
            inner: RwLock::new(initial),
        }
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Credentials> {
        match self.inner.write() {
            Ok(g) => g,
            Err(poison) => poison.into_inner(),
        }
    }

    /// Copy of the current defaults.
    pub fn snapshot(&self) -> Credentials {
        match self.inner.read() {
            Ok(g) => g.clone(),
            Err(poison) => poison.into_inner().clone(),
        }
    }

    pub fn set_api_key(&self, key: impl Into<String>) {
        self.write().api_key = Some(key.into());
    }

    pub fn clear_api_key(&self) {
        self.write().api_key = None;
    }

    pub fn has_api_key(&self) -> bool {
        self.snapshot().has_api_key()
    }

    pub fn set_auth(&self, cookies: impl Into<String>, csrf_token: Option<String>) {
        let mut g = self.write();
        g.cookies = Some(cookies.into());
        g.csrf_token = csrf_token;
    }

    pub fn clear_auth(&self) {
        let mut g = self.write();
        g.cookies = None;
        g.csrf_token = None;
    }

    pub fn has_auth(&self) -> bool {
        self.snapshot().has_auth()
    }
}
