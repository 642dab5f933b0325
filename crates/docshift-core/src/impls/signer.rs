//! Signed retrieval URLs.
//!
//! URL shape:
//! `{base_url}/{key}?expires={unix}[&response-content-disposition={..}]&signature={hex}`
//!
//! The signature is HMAC-SHA256, keyed by the secret, over the
//! newline-joined key, expiry and disposition. A file server holding the
//! same secret can check a request with [`UrlSigner::verify`] without any
//! shared state.

use std::time::Duration;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::ports::attachment_disposition;

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone)]
pub struct UrlSigner {
    base_url: String,
    secret: String,
}

impl std::fmt::Debug for UrlSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlSigner")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl UrlSigner {
    pub fn new(base_url: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            secret: secret.into(),
        }
    }

    pub fn sign(
        &self,
        key: &str,
        ttl: Duration,
        download_name: Option<&str>,
        now: DateTime<Utc>,
    ) -> String {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        let expires = now
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
            .timestamp();
        let disposition = download_name.map(attachment_disposition);

        let mut url = format!(
            "{}/{}?expires={expires}",
            self.base_url,
            urlencoding::encode(key)
        );
        if let Some(disposition) = &disposition {
            url.push_str("&response-content-disposition=");
            url.push_str(&urlencoding::encode(disposition));
        }
        url.push_str("&signature=");
        url.push_str(&self.signature(key, expires, disposition.as_deref()));
        url
    }

    /// Checks a signature produced by [`UrlSigner::sign`] and that it has
    /// not expired at `now`.
    pub fn verify(
        &self,
        key: &str,
        expires: i64,
        disposition: Option<&str>,
        signature: &str,
        now: DateTime<Utc>,
    ) -> bool {
        if now.timestamp() > expires {
            return false;
        }
        let Ok(expected) = hex::decode(signature) else {
            return false;
        };
        self.mac(key, expires, disposition)
            .verify_slice(&expected)
            .is_ok()
    }

    fn signature(&self, key: &str, expires: i64, disposition: Option<&str>) -> String {
        hex::encode(self.mac(key, expires, disposition).finalize().into_bytes())
    }

    fn mac(&self, key: &str, expires: i64, disposition: Option<&str>) -> HmacSha256 {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .unwrap_or_else(|_| unreachable!("hmac takes keys of any size"));
        mac.update(key.as_bytes());
        mac.update(b"\n");
        mac.update(expires.to_string().as_bytes());
        mac.update(b"\n");
        mac.update(disposition.unwrap_or_default().as_bytes());
        mac
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    fn query_param<'a>(url: &'a str, name: &str) -> Option<&'a str> {
        url.split_once('?')?
            .1
            .split('&')
            .find_map(|pair| pair.strip_prefix(name)?.strip_prefix('='))
    }

    #[test]
    fn signed_url_carries_expiry_and_disposition() {
        let signer = UrlSigner::new("https://files.example.com/", "s3cret");
        let url = signer.sign(
            "01hv_deck.pdf",
            Duration::from_secs(3600),
            Some("My Presentation.pdf"),
            now(),
        );

        assert!(url.starts_with("https://files.example.com/01hv_deck.pdf?expires="));
        let expires: i64 = query_param(&url, "expires").unwrap().parse().unwrap();
        assert_eq!(expires, now().timestamp() + 3600);
        let disposition = query_param(&url, "response-content-disposition").unwrap();
        assert_eq!(
            urlencoding::decode(disposition).unwrap(),
            "attachment; filename=\"My Presentation.pdf\""
        );
    }

    #[test]
    fn verify_accepts_own_signature_until_expiry() {
        let signer = UrlSigner::new("http://localhost/files", "s3cret");
        let url = signer.sign("k.pdf", Duration::from_secs(60), None, now());
        let expires: i64 = query_param(&url, "expires").unwrap().parse().unwrap();
        let signature = query_param(&url, "signature").unwrap();

        assert!(signer.verify("k.pdf", expires, None, signature, now()));
        assert!(!signer.verify("other.pdf", expires, None, signature, now()));
        assert!(!signer.verify(
            "k.pdf",
            expires,
            None,
            signature,
            now() + chrono::Duration::seconds(61)
        ));
    }

    #[test]
    fn different_secret_rejects() {
        let a = UrlSigner::new("http://h", "a");
        let b = UrlSigner::new("http://h", "b");
        let url = a.sign("k.pdf", Duration::from_secs(60), None, now());
        let expires: i64 = query_param(&url, "expires").unwrap().parse().unwrap();
        let signature = query_param(&url, "signature").unwrap();

        assert!(!b.verify("k.pdf", expires, None, signature, now()));
    }

    #[test]
    fn signature_is_hmac_sha256_of_joined_fields() {
        use sha2::Digest;

        let signer = UrlSigner::new("http://h", "secret");
        let url = signer.sign("k.pdf", Duration::from_secs(60), None, now());
        let expires: i64 = query_param(&url, "expires").unwrap().parse().unwrap();
        let signature = query_param(&url, "signature").unwrap();

        let mut mac = HmacSha256::new_from_slice(b"secret").unwrap();
        mac.update(format!("k.pdf\n{expires}\n").as_bytes());
        assert_eq!(signature, hex::encode(mac.finalize().into_bytes()));

        // a secret-prefixed plain digest must not validate
        let plain = hex::encode(Sha256::digest(format!("secret\nk.pdf\n{expires}\n")));
        assert_ne!(signature, plain);
        assert!(!signer.verify("k.pdf", expires, None, &plain, now()));
    }

    #[test]
    fn malformed_signature_rejects() {
        let signer = UrlSigner::new("http://h", "secret");
        let url = signer.sign("k.pdf", Duration::from_secs(60), None, now());
        let expires: i64 = query_param(&url, "expires").unwrap().parse().unwrap();

        assert!(!signer.verify("k.pdf", expires, None, "not-hex", now()));
        assert!(!signer.verify("k.pdf", expires, None, "", now()));
    }

    #[test]
    fn debug_hides_the_secret() {
        let signer = UrlSigner::new("http://h", "do-not-print");
        assert!(!format!("{signer:?}").contains("do-not-print"));
    }
}
