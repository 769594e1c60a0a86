//! OAuth 1.0a HMAC-SHA1 request signing.
//!
//! Base string: `METHOD&enc(url)&enc(k1=enc(v1)&k2=enc(v2)...)` with keys in
//! byte-wise order. Signing key: `enc(consumer_secret)&enc(token_secret)`.

use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use rand::Rng;
use secrecy::{ExposeSecret, Secret};
use sha1::Sha1;
use thiserror::Error;

use super::percent::percent_encode;

type HmacSha1 = Hmac<Sha1>;

/// OAuth parameters keyed by name. `BTreeMap<String, _>` iterates in
/// byte-wise key order, which is the ordering the base string requires.
pub type OAuthParams = BTreeMap<String, String>;

pub const SIGNATURE_METHOD: &str = "HMAC-SHA1";
pub const OAUTH_VERSION: &str = "1.0";

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("Invalid HMAC key: {0}")]
    InvalidKey(String),
}

/// Consumer credentials issued by the identity provider.
#[derive(Debug, Clone)]
pub struct OAuthCredentials {
    pub consumer_key: String,
    pub consumer_secret: Secret<String>,
}

impl OAuthCredentials {
    pub fn new(consumer_key: impl Into<String>, consumer_secret: impl Into<String>) -> Self {
        Self {
            consumer_key: consumer_key.into(),
            consumer_secret: Secret::new(consumer_secret.into()),
        }
    }
}

/// 16 random bytes, standard base64.
pub fn generate_nonce() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill(&mut bytes);
    STANDARD.encode(bytes)
}

/// Whole seconds since the Unix epoch.
pub fn current_timestamp() -> String {
    chrono::Utc::now().timestamp().to_string()
}

pub fn signature_base_string(method: &str, url: &str, params: &OAuthParams) -> String {
    let normalized = params
        .iter()
        .map(|(key, value)| format!("{}={}", percent_encode(key), percent_encode(value)))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        percent_encode(&method.to_ascii_uppercase()),
        percent_encode(url),
        percent_encode(&normalized)
    )
}

pub fn signing_key(consumer_secret: &str, token_secret: &str) -> String {
    format!(
        "{}&{}",
        percent_encode(consumer_secret),
        percent_encode(token_secret)
    )
}

/// Base64 HMAC-SHA1 digest of `base_string`; not yet percent-encoded.
pub fn hmac_sha1_signature(base_string: &str, key: &str) -> Result<String, SignatureError> {
    let mut mac = HmacSha1::new_from_slice(key.as_bytes())
        .map_err(|e| SignatureError::InvalidKey(e.to_string()))?;
    mac.update(base_string.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Signs outbound requests with one consumer's credentials.
#[derive(Debug, Clone)]
pub struct OAuthSigner {
    credentials: OAuthCredentials,
}

impl OAuthSigner {
    pub fn new(credentials: OAuthCredentials) -> Self {
        Self { credentials }
    }

    pub fn consumer_key(&self) -> &str {
        &self.credentials.consumer_key
    }

    /// Protocol parameters with a fresh nonce and timestamp, followed by the
    /// request-specific ones.
    pub fn protocol_params<I>(&self, extra: I) -> OAuthParams
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.protocol_params_at(generate_nonce(), current_timestamp(), extra)
    }

    /// Same as [`OAuthSigner::protocol_params`] with a pinned nonce and timestamp.
    pub fn protocol_params_at<I>(&self, nonce: String, timestamp: String, extra: I) -> OAuthParams
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut params = OAuthParams::new();
        params.insert(
            "oauth_consumer_key".to_string(),
            self.credentials.consumer_key.clone(),
        );
        params.insert("oauth_nonce".to_string(), nonce);
        params.insert(
            "oauth_signature_method".to_string(),
            SIGNATURE_METHOD.to_string(),
        );
        params.insert("oauth_timestamp".to_string(), timestamp);
        params.insert("oauth_version".to_string(), OAUTH_VERSION.to_string());
        params.extend(extra);
        params
    }

    /// Base64 signature over `params` for one request.
    pub fn sign(
        &self,
        method: &str,
        url: &str,
        token_secret: &str,
        params: &OAuthParams,
    ) -> Result<String, SignatureError> {
        let base_string = signature_base_string(method, url, params);
        let key = signing_key(self.credentials.consumer_secret.expose_secret(), token_secret);
        hmac_sha1_signature(&base_string, &key)
    }

    /// `Authorization` header value: `OAuth k="v",...,oauth_signature="..."`.
    pub fn authorization_header(
        &self,
        method: &str,
        url: &str,
        token_secret: &str,
        params: &OAuthParams,
    ) -> Result<String, SignatureError> {
        let signature = percent_encode(&self.sign(method, url, token_secret, params)?);

        let fields = params
            .iter()
            .map(|(key, value)| format!("{}=\"{}\"", percent_encode(key), percent_encode(value)))
            .collect::<Vec<_>>()
            .join(",");

        Ok(format!("OAuth {},oauth_signature=\"{}\"", fields, signature))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn photos_signer() -> OAuthSigner {
        OAuthSigner::new(OAuthCredentials::new("dpf43f3p2l4k3l03", "kd94hf93k423kf44"))
    }

    fn photos_params(signer: &OAuthSigner) -> OAuthParams {
        signer.protocol_params_at(
            "kllo9940pd9333jh".to_string(),
            "1191242096".to_string(),
            [
                ("oauth_token".to_string(), "nnch734d00sl2jdk".to_string()),
                ("file".to_string(), "vacation.jpg".to_string()),
                ("size".to_string(), "original".to_string()),
            ],
        )
    }

    #[test]
    fn base_string_matches_oauth_core_appendix() {
        let signer = photos_signer();
        let base = signature_base_string(
            "GET",
            "http://photos.example.net/photos",
            &photos_params(&signer),
        );
        assert_eq!(
            base,
            "GET&http%3A%2F%2Fphotos.example.net%2Fphotos&file%3Dvacation.jpg\
             %26oauth_consumer_key%3Ddpf43f3p2l4k3l03%26oauth_nonce%3Dkllo9940pd9333jh\
             %26oauth_signature_method%3DHMAC-SHA1%26oauth_timestamp%3D1191242096\
             %26oauth_token%3Dnnch734d00sl2jdk%26oauth_version%3D1.0%26size%3Doriginal"
        );
    }

    #[test]
    fn signature_matches_oauth_core_appendix() {
        let signer = photos_signer();
        let signature = signer
            .sign(
                "GET",
                "http://photos.example.net/photos",
                "pfkkdhi9sl3r4s00",
                &photos_params(&signer),
            )
            .unwrap();
        assert_eq!(signature, "tR3+Ty81lMeYAr/Fid0kMTYa/WM=");
    }

    #[test]
    fn signature_matches_status_update_vector() {
        let signer = OAuthSigner::new(OAuthCredentials::new(
            "xvz1evFS4wEEPTGEFPHBog",
            "kAcSOqF21Fu85e7zjz7ZN2U4ZRhfV3WpwPAoE3Z7kBw",
        ));
        let params = signer.protocol_params_at(
            "kYjzVBB8Y0ZFabxSWbWovY3uYSQ2pTgmZeNu2VS4cg".to_string(),
            "1318622958".to_string(),
            [
                (
                    "oauth_token".to_string(),
                    "370773112-GmHxMAgYyLbNEtIKZeRNFsMKPR9EyMZeS9weJAEb".to_string(),
                ),
                (
                    "status".to_string(),
                    "Hello Ladies + Gentlemen, a signed OAuth request!".to_string(),
                ),
                ("include_entities".to_string(), "true".to_string()),
            ],
        );

        let signature = signer
            .sign(
                "POST",
                "https://api.twitter.com/1.1/statuses/update.json",
                "LswwdoUaIvS8ltyTt5jkRh4J50vUPVVHtR2YPi5kE",
                &params,
            )
            .unwrap();
        assert_eq!(signature, "hCtSmYh+iHYCEqBWrE7C7hYmtUk=");
    }

    #[test]
    fn header_lists_sorted_params_then_encoded_signature() {
        let signer = photos_signer();
        let header = signer
            .authorization_header(
                "GET",
                "http://photos.example.net/photos",
                "pfkkdhi9sl3r4s00",
                &photos_params(&signer),
            )
            .unwrap();

        assert_eq!(
            header,
            "OAuth file=\"vacation.jpg\",oauth_consumer_key=\"dpf43f3p2l4k3l03\",\
             oauth_nonce=\"kllo9940pd9333jh\",oauth_signature_method=\"HMAC-SHA1\",\
             oauth_timestamp=\"1191242096\",oauth_token=\"nnch734d00sl2jdk\",\
             oauth_version=\"1.0\",size=\"original\",\
             oauth_signature=\"tR3%2BTy81lMeYAr%2FFid0kMTYa%2FWM%3D\""
        );
    }

    #[test]
    fn signing_is_deterministic_for_pinned_inputs() {
        let signer = photos_signer();
        let params = photos_params(&signer);
        let url = "http://photos.example.net/photos";
        let first = signer.authorization_header("GET", url, "s", &params).unwrap();
        let second = signer.authorization_header("GET", url, "s", &params).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn any_single_change_alters_the_signature() {
        let signer = photos_signer();
        let url = "http://photos.example.net/photos";
        let params = photos_params(&signer);
        let baseline = signer.sign("GET", url, "pfkkdhi9sl3r4s00", &params).unwrap();

        for key in params.keys() {
            let mut changed = params.clone();
            changed.insert(key.clone(), format!("{}x", params[key]));
            let signature = signer.sign("GET", url, "pfkkdhi9sl3r4s00", &changed).unwrap();
            assert_ne!(signature, baseline, "changing {key} must change the signature");
        }

        assert_ne!(
            signer.sign("POST", url, "pfkkdhi9sl3r4s00", &params).unwrap(),
            baseline
        );
        assert_ne!(
            signer.sign("GET", url, "other-secret", &params).unwrap(),
            baseline
        );
    }

    #[test]
    fn signing_key_keeps_separator_with_empty_token_secret() {
        assert_eq!(signing_key("kd94hf93k423kf44", ""), "kd94hf93k423kf44&");
        assert_eq!(signing_key("a&b", "c d"), "a%26b&c%20d");
    }

    #[test]
    fn protocol_params_carry_fixed_fields_and_fresh_nonces() {
        let signer = photos_signer();
        let first = signer.protocol_params([(
            "oauth_callback".to_string(),
            "https://app.example/token?next=%2F".to_string(),
        )]);
        let second = signer.protocol_params(std::iter::empty());

        assert_eq!(first["oauth_consumer_key"], "dpf43f3p2l4k3l03");
        assert_eq!(first["oauth_signature_method"], "HMAC-SHA1");
        assert_eq!(first["oauth_version"], "1.0");
        assert!(first["oauth_timestamp"].parse::<i64>().is_ok());
        assert_eq!(
            first["oauth_callback"],
            "https://app.example/token?next=%2F"
        );
        assert_ne!(first["oauth_nonce"], second["oauth_nonce"]);
    }

    #[test]
    fn nonce_is_sixteen_random_bytes() {
        let mut seen = std::collections::HashSet::new();
        for _ in 0..1000 {
            let nonce = generate_nonce();
            assert_eq!(STANDARD.decode(&nonce).unwrap().len(), 16);
            assert!(seen.insert(nonce));
        }
    }
}
