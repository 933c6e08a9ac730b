use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;

use crate::errors::AppResult;

type HmacSha1 = Hmac<Sha1>;

// Signs only path+query; appending `&signature=` to the URL is the caller's job.
#[derive(Debug)]
pub struct UrlSigner {
    key: Vec<u8>,
}

impl UrlSigner {
    pub fn new(secret: &str) -> AppResult<Self> {
        let key = URL_SAFE.decode(secret)?;
        Ok(Self { key })
    }

    pub fn signature(&self, path_and_query: &str) -> String {
        let mut mac =
            HmacSha1::new_from_slice(&self.key).expect("hmac accepts keys of any length");
        mac.update(path_and_query.as_bytes());
        URL_SAFE.encode(mac.finalize().into_bytes())
    }
}

pub fn sign(path_and_query: &str, secret: &str) -> AppResult<String> {
    Ok(UrlSigner::new(secret)?.signature(path_and_query))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AppError;

    const SECRET: &str = "dGVzdC1zaWduaW5nLXNlY3JldA==";

    #[test]
    fn signature_is_deterministic() {
        let first = sign("/maps/api/streetview/metadata?location=1,2", SECRET).unwrap();
        let second = sign("/maps/api/streetview/metadata?location=1,2", SECRET).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn signature_changes_with_either_input() {
        let base = sign("/metadata?location=1,2", SECRET).unwrap();
        let other_path = sign("/metadata?location=1,3", SECRET).unwrap();
        let other_secret = sign("/metadata?location=1,2", "b3RoZXItc2VjcmV0").unwrap();
        assert_ne!(base, other_path);
        assert_ne!(base, other_secret);
    }

    #[test]
    fn signature_is_url_safe_base64_of_sha1_digest() {
        let signature = sign("/metadata?location=1,2", SECRET).unwrap();
        // 20-byte digest encodes to 28 characters including padding.
        assert_eq!(signature.len(), 28);
        assert_eq!(URL_SAFE.decode(&signature).unwrap().len(), 20);
    }

    #[test]
    fn matches_rfc_2202_hmac_sha1_vector() {
        // Test case 1: key = 20 bytes of 0x0b, data = "Hi There".
        let secret = "CwsLCwsLCwsLCwsLCwsLCwsLCws=";
        let signature = sign("Hi There", secret).unwrap();
        assert_eq!(signature, "thcxhlUFcmTii8C2-zeMjvFGvgA=");
    }

    #[test]
    fn rejects_secret_that_is_not_base64() {
        let err = UrlSigner::new("not base64!").unwrap_err();
        assert!(matches!(err, AppError::InvalidSecret(_)));
    }

    #[test]
    fn signer_and_free_function_agree() {
        let signer = UrlSigner::new(SECRET).unwrap();
        assert_eq!(
            signer.signature("/metadata?location=9,9"),
            sign("/metadata?location=9,9", SECRET).unwrap()
        );
    }
}
