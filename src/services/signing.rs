// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Request signing for the vehicle API (`X-API-SIGNATURE-VERSION: 2.0`).
//!
//! The signature is an HMAC-SHA256 over a canonical string built from the
//! `Accept` header, every `x-api*` header, the sorted query string, the
//! body digest, the timestamp, the method and the path.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hmac::{Hmac, Mac};
use md5::{Digest, Md5};
use reqwest::Url;
use sha2::Sha256;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

type HmacSha256 = Hmac<Sha256>;

/// Computes `X-SIGNATURE` values. Without a shared secret every signature
/// is empty and callers fall back to token-only authentication.
pub struct SignatureEngine {
    secret: Option<Vec<u8>>,
    warned: AtomicBool,
}

impl SignatureEngine {
    pub fn new(secret: Option<&str>) -> Self {
        Self {
            secret: secret
                .filter(|s| !s.is_empty())
                .map(|s| s.as_bytes().to_vec()),
            warned: AtomicBool::new(false),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.secret.is_some()
    }

    /// Sign a request. Returns an empty string when no secret is set or
    /// the URL cannot be parsed.
    pub fn sign(&self, method: &str, url: &str, headers: &[(&str, &str)], body: &str) -> String {
        let Some(secret) = &self.secret else {
            if !self.warned.swap(true, Ordering::Relaxed) {
                tracing::warn!("No app secret configured, requests are sent without signature");
            }
            return String::new();
        };

        let canonical = match canonical_string(method, url, headers, body) {
            Some(canonical) => canonical,
            None => {
                tracing::warn!(url, "Cannot sign request with unparsable URL");
                return String::new();
            }
        };

        let mut mac = match HmacSha256::new_from_slice(secret) {
            Ok(mac) => mac,
            Err(e) => {
                tracing::error!(error = %e, "Failed to initialise HMAC");
                return String::new();
            }
        };
        mac.update(canonical.as_bytes());
        BASE64.encode(mac.finalize().into_bytes())
    }
}

/// Build the string that gets signed. `None` if `url` is not absolute.
pub fn canonical_string(
    method: &str,
    url: &str,
    headers: &[(&str, &str)],
    body: &str,
) -> Option<String> {
    let parsed = Url::parse(url).ok()?;

    let mut out = String::new();

    if let Some((_, accept)) = headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("accept"))
    {
        out.push_str(accept.trim());
        out.push('\n');
    }

    let mut api_headers: Vec<(String, &str)> = headers
        .iter()
        .map(|(name, value)| (name.trim().to_ascii_lowercase(), *value))
        .filter(|(name, _)| name.starts_with("x-api"))
        .collect();
    api_headers.sort_by(|a, b| a.0.cmp(&b.0));
    for (name, value) in api_headers {
        out.push_str(&name);
        out.push(':');
        out.push_str(value.trim());
        out.push('\n');
    }
    out.push('\n');

    // First value wins for repeated keys; blank values are kept.
    let mut params: BTreeMap<String, String> = BTreeMap::new();
    for (key, value) in parsed.query_pairs() {
        params
            .entry(key.into_owned())
            .or_insert_with(|| value.into_owned());
    }
    let query = params
        .iter()
        .map(|(key, value)| format!("{}={}", key, encode_query_value(value)))
        .collect::<Vec<_>>()
        .join("&");
    out.push_str(&query);
    out.push('\n');

    if !body.is_empty() {
        out.push_str(&BASE64.encode(Md5::digest(body.as_bytes())));
    }
    let timestamp = headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("x-timestamp"))
        .map(|(_, value)| *value)
        .unwrap_or("");
    out.push_str(timestamp);
    out.push('\n');

    out.push_str(method);
    out.push('\n');
    out.push_str(parsed.path());

    Some(out)
}

fn encode_query_value(value: &str) -> String {
    value
        .replace(' ', "%20")
        .replace('*', "%2A")
        .replace(',', "%2C")
}
