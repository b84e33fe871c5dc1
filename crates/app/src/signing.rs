use std::sync::Arc;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Issues and checks time-limited CV download links.
#[derive(Clone)]
pub struct LinkSigner {
    secret: Arc<[u8]>,
    app_url: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LinkError {
    #[error("link expired")]
    Expired,
    #[error("signature is not valid hex")]
    Malformed,
    #[error("signature mismatch")]
    Mismatch,
    #[error("failed to initialize signer")]
    Key,
}

impl LinkSigner {
    pub fn new(secret: &[u8], app_url: impl Into<String>) -> Self {
        Self {
            secret: Arc::from(secret.to_vec().into_boxed_slice()),
            app_url: app_url.into(),
        }
    }

    fn mac(&self, user_id: &str, expires: i64) -> Result<HmacSha256, LinkError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret).map_err(|_| LinkError::Key)?;
        mac.update(format!("{user_id}:{expires}").as_bytes());
        Ok(mac)
    }

    /// Hex HMAC-SHA256 over `"{user_id}:{expires}"`.
    pub fn signature(&self, user_id: &str, expires: i64) -> Result<String, LinkError> {
        let mac = self.mac(user_id, expires)?;
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Absolute URL of the signed CV download for `user_id`.
    pub fn cv_url(&self, user_id: &str, expires_at: DateTime<Utc>) -> Result<String, LinkError> {
        let expires = expires_at.timestamp();
        let signature = self.signature(user_id, expires)?;
        Ok(format!(
            "{}/cv/signed/{user_id}?expires={expires}&signature={signature}",
            self.app_url
        ))
    }

    pub fn verify(
        &self,
        user_id: &str,
        expires: i64,
        signature: &str,
        now: DateTime<Utc>,
    ) -> Result<(), LinkError> {
        if now.timestamp() > expires {
            return Err(LinkError::Expired);
        }
        let provided = hex::decode(signature).map_err(|_| LinkError::Malformed)?;
        let expected = self.mac(user_id, expires)?.finalize().into_bytes();
        let expected_bytes: &[u8] = expected.as_ref();

        if expected_bytes.ct_eq(provided.as_slice()).into() {
            Ok(())
        } else {
            Err(LinkError::Mismatch)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn signer() -> LinkSigner {
        LinkSigner::new(b"link-secret", "https://jobs.test")
    }

    #[test]
    fn signature_matches_known_hmac() {
        let mut mac = HmacSha256::new_from_slice(b"link-secret").unwrap();
        mac.update(b"user-1:1715328000");
        let expected = hex::encode(mac.finalize().into_bytes());
        assert_eq!(signer().signature("user-1", 1_715_328_000).unwrap(), expected);
    }

    #[test]
    fn cv_url_verifies_until_expiry() {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 8, 0, 0).unwrap();
        let expires_at = now + Duration::days(7);
        let url = signer().cv_url("user-1", expires_at).unwrap();
        let signature = url.rsplit("signature=").next().unwrap();

        assert!(url.starts_with("https://jobs.test/cv/signed/user-1?expires="));
        assert_eq!(
            signer().verify("user-1", expires_at.timestamp(), signature, now),
            Ok(())
        );
        assert_eq!(
            signer().verify(
                "user-1",
                expires_at.timestamp(),
                signature,
                expires_at + Duration::seconds(1)
            ),
            Err(LinkError::Expired)
        );
    }

    #[test]
    fn tampered_links_are_rejected() {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 8, 0, 0).unwrap();
        let expires = (now + Duration::hours(1)).timestamp();
        let signature = signer().signature("user-1", expires).unwrap();

        assert_eq!(
            signer().verify("user-2", expires, &signature, now),
            Err(LinkError::Mismatch)
        );
        assert_eq!(
            signer().verify("user-1", expires + 60, &signature, now),
            Err(LinkError::Mismatch)
        );
        assert_eq!(
            signer().verify("user-1", expires, "zz", now),
            Err(LinkError::Malformed)
        );
    }
}
