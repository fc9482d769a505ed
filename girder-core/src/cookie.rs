//! Signed cookies.
//!
//! Values are written as `value.signature`, where the signature is the
//! unpadded base64 HMAC-SHA256 of the value under the configured secret.

use crate::Error;
use base64::{Engine, engine::general_purpose::STANDARD_NO_PAD};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::HashMap;
use std::time::{Duration, SystemTime};

type HmacSha256 = Hmac<Sha256>;

/// Signs and verifies cookie values with a shared secret
#[derive(Clone)]
pub struct CookieSigner {
    secret: Vec<u8>,
}

impl CookieSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    fn mac(&self, value: &str) -> Result<HmacSha256, Error> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| Error::UnexpectedServerError(format!("invalid cookie secret: {}", e)))?;
        mac.update(value.as_bytes());
        Ok(mac)
    }

    /// Sign `value`, producing `value.signature`
    pub fn sign(&self, value: &str) -> Result<String, Error> {
        let signature = self.mac(value)?.finalize().into_bytes();
        Ok(format!("{}.{}", value, STANDARD_NO_PAD.encode(signature)))
    }

    /// Verify a signed value; unsigned or tampered input yields `None`
    pub fn unsign(&self, signed: &str) -> Option<String> {
        let (value, signature) = signed.rsplit_once('.')?;
        let signature = STANDARD_NO_PAD.decode(signature).ok()?;
        self.mac(value).ok()?.verify_slice(&signature).ok()?;
        Some(value.to_string())
    }
}

impl std::fmt::Debug for CookieSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookieSigner").finish_non_exhaustive()
    }
}

/// Parse a `Cookie` request header into name/value pairs
pub fn parse_cookie_header(header: &str) -> HashMap<String, String> {
    header
        .split(';')
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            let value = value.trim().trim_matches('"');
            let value = urlencoding::decode(value)
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| value.to_string());
            Some((name.to_string(), value))
        })
        .collect()
}

/// SameSite attribute values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

/// A `Set-Cookie` header line
#[derive(Debug, Clone)]
pub struct SetCookie {
    pub name: String,
    pub value: String,
    pub path: String,
    pub max_age: Option<Duration>,
    pub expires: Option<SystemTime>,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: Option<SameSite>,
}

impl SetCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            path: "/".to_string(),
            max_age: None,
            expires: None,
            http_only: true,
            secure: false,
            same_site: Some(SameSite::Lax),
        }
    }

    /// A cookie that tells the client to drop `name`
    pub fn removal(name: impl Into<String>) -> Self {
        Self {
            max_age: Some(Duration::ZERO),
            expires: Some(SystemTime::UNIX_EPOCH),
            ..Self::new(name, "")
        }
    }

    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn to_header_value(&self) -> String {
        let mut line = format!(
            "{}={}; Path={}",
            self.name,
            urlencoding::encode(&self.value),
            self.path
        );

        if let Some(max_age) = self.max_age {
            line.push_str(&format!("; Max-Age={}", max_age.as_secs()));
        }
        if let Some(expires) = self.expires {
            line.push_str(&format!("; Expires={}", httpdate::fmt_http_date(expires)));
        }
        if self.http_only {
            line.push_str("; HttpOnly");
        }
        if self.secure {
            line.push_str("; Secure");
        }
        match self.same_site {
            Some(SameSite::Strict) => line.push_str("; SameSite=Strict"),
            Some(SameSite::Lax) => line.push_str("; SameSite=Lax"),
            Some(SameSite::None) => line.push_str("; SameSite=None"),
            None => {}
        }
        line
    }
}
