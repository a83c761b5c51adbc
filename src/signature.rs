use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use rand::Rng;
use sha1::Sha1;
use url::Url;

type HmacSha1 = Hmac<Sha1>;

const SIGNATURE_METHOD: &str = "HMAC-SHA1";
const OAUTH_VERSION: &str = "1.0";

/// Application key pair issued by the platform (`TWITTER_API_KEY` / `TWITTER_API_SECRET_KEY`).
#[derive(Clone)]
pub struct ConsumerKey {
    key: String,
    secret: String,
}

impl ConsumerKey {
    #[must_use]
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secret: secret.into(),
        }
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Debug for ConsumerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsumerKey")
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Builds the `Authorization: OAuth ...` header for one request.
///
/// The consumer key always signs. A token pair is added once the handshake
/// has issued one (temporary pair for the access-token exchange, access pair
/// for everything after).
pub struct RequestSigner<'a> {
    consumer: &'a ConsumerKey,
    token: Option<(&'a str, &'a str)>,
    protocol_params: Vec<(&'static str, String)>,
}

impl<'a> RequestSigner<'a> {
    #[must_use]
    pub fn new(consumer: &'a ConsumerKey) -> Self {
        Self {
            consumer,
            token: None,
            protocol_params: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_token(mut self, token: &'a str, token_secret: &'a str) -> Self {
        self.token = Some((token, token_secret));
        self
    }

    /// Adds an `oauth_*` protocol parameter such as `oauth_callback` or `oauth_verifier`.
    #[must_use]
    pub fn with_protocol_param(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.protocol_params.push((name, value.into()));
        self
    }

    /// Signs `method url` with a fresh nonce and the current time.
    ///
    /// `body_params` are form-encoded body parameters; JSON bodies are not
    /// part of the signature and must not be passed here.
    #[must_use]
    pub fn authorization_header(&self, method: &str, url: &Url, body_params: &[(&str, &str)]) -> String {
        let timestamp = time::OffsetDateTime::now_utc().unix_timestamp();
        self.authorization_header_at(method, url, body_params, &generate_nonce(), timestamp)
    }

    pub(crate) fn authorization_header_at(
        &self,
        method: &str,
        url: &Url,
        body_params: &[(&str, &str)],
        nonce: &str,
        timestamp: i64,
    ) -> String {
        let mut oauth = self.oauth_params(nonce, timestamp);
        let signature = self.signature_at(method, url, body_params, &oauth);
        oauth.push(("oauth_signature".into(), signature));
        oauth.sort();

        let fields: Vec<String> = oauth
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", percent_encode(k), percent_encode(v)))
            .collect();
        format!("OAuth {}", fields.join(", "))
    }

    fn oauth_params(&self, nonce: &str, timestamp: i64) -> Vec<(String, String)> {
        let mut params = vec![
            ("oauth_consumer_key".to_string(), self.consumer.key.clone()),
            ("oauth_nonce".to_string(), nonce.to_string()),
            ("oauth_signature_method".to_string(), SIGNATURE_METHOD.to_string()),
            ("oauth_timestamp".to_string(), timestamp.to_string()),
            ("oauth_version".to_string(), OAUTH_VERSION.to_string()),
        ];
        if let Some((token, _)) = self.token {
            params.push(("oauth_token".into(), token.to_string()));
        }
        params.extend(
            self.protocol_params
                .iter()
                .map(|(k, v)| ((*k).to_string(), v.clone())),
        );
        params
    }

    fn signature_at(
        &self,
        method: &str,
        url: &Url,
        body_params: &[(&str, &str)],
        oauth: &[(String, String)],
    ) -> String {
        let mut params: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        params.extend(body_params.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())));
        params.extend(oauth.iter().cloned());

        let base = signature_base_string(method, url, &params);
        let token_secret = self.token.map_or("", |(_, secret)| secret);
        sign(&base, &self.consumer.secret, token_secret)
    }
}

/// RFC 3986 percent-encoding: everything except `ALPHA / DIGIT / "-" / "." / "_" / "~"`.
#[must_use]
pub fn percent_encode(input: &str) -> String {
    urlencoding::encode(input).into_owned()
}

/// `METHOD&enc(base_url)&enc(sorted_params)`.
#[must_use]
pub fn signature_base_string(method: &str, url: &Url, params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (percent_encode(k), percent_encode(v)))
        .collect();
    encoded.sort();

    let joined = encoded
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        percent_encode(&base_url(url)),
        percent_encode(&joined)
    )
}

/// Scheme, host, non-default port and path; no query or fragment.
fn base_url(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}://{}:{}{}", url.scheme(), host, port, url.path()),
        None => format!("{}://{}{}", url.scheme(), host, url.path()),
    }
}

/// `BASE64(HMAC-SHA1(enc(consumer_secret) & enc(token_secret), base))`.
#[must_use]
pub fn sign(base: &str, consumer_secret: &str, token_secret: &str) -> String {
    let key = format!("{}&{}", percent_encode(consumer_secret), percent_encode(token_secret));
    let mut mac = HmacSha1::new_from_slice(key.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(base.as_bytes());
    STANDARD.encode(mac.finalize().into_bytes())
}

/// Generates a random `oauth_nonce` (32 bytes → 43 URL-safe characters).
#[must_use]
pub fn generate_nonce() -> String {
    let random_bytes: [u8; 32] = rand::rng().random();
    URL_SAFE_NO_PAD.encode(random_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Reference request from the platform's "creating a signature" guide.
    const CONSUMER_KEY: &str = "xvz1evFS4wEEPTGEFPHBog";
    const CONSUMER_SECRET: &str = "kAcSOqF21Fu85e7zjz7ZN2U4ZRhfV3WpwPAoE3Z7kBw";
    const TOKEN: &str = "370773112-GmHxMAgYyLbNEtIKZeRNFsMKPR9EyMZeS9weJAEb";
    const TOKEN_SECRET: &str = "LswwdoUaIvS8ltyTt5jkRh4J50vUPVVHtR2YPi5kE";
    const NONCE: &str = "kYjzVBB8Y0ZFabxSWbWovY3uYSQ2pTgmZeNu2VS4cg";
    const TIMESTAMP: i64 = 1_318_622_958;
    const STATUS: &str = "Hello Ladies + Gentlemen, a signed OAuth request!";

    fn reference_url() -> Url {
        "https://api.twitter.com/1.1/statuses/update.json?include_entities=true"
            .parse()
            .unwrap()
    }

    #[test]
    fn test_percent_encode_reserved_characters() {
        assert_eq!(percent_encode("Ladies + Gentlemen"), "Ladies%20%2B%20Gentlemen");
        assert_eq!(percent_encode("a-b.c_d~e"), "a-b.c_d~e");
        assert_eq!(percent_encode("!*'()"), "%21%2A%27%28%29");
    }

    #[test]
    fn test_reference_base_string() {
        let consumer = ConsumerKey::new(CONSUMER_KEY, CONSUMER_SECRET);
        let signer = RequestSigner::new(&consumer).with_token(TOKEN, TOKEN_SECRET);
        let url = reference_url();

        let mut params: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        params.push(("status".into(), STATUS.into()));
        params.extend(signer.oauth_params(NONCE, TIMESTAMP));

        let base = signature_base_string("post", &url, &params);
        assert_eq!(
            base,
            "POST&https%3A%2F%2Fapi.twitter.com%2F1.1%2Fstatuses%2Fupdate.json&\
             include_entities%3Dtrue%26oauth_consumer_key%3Dxvz1evFS4wEEPTGEFPHBog%26\
             oauth_nonce%3DkYjzVBB8Y0ZFabxSWbWovY3uYSQ2pTgmZeNu2VS4cg%26\
             oauth_signature_method%3DHMAC-SHA1%26oauth_timestamp%3D1318622958%26\
             oauth_token%3D370773112-GmHxMAgYyLbNEtIKZeRNFsMKPR9EyMZeS9weJAEb%26\
             oauth_version%3D1.0%26status%3DHello%2520Ladies%2520%252B%2520Gentlemen\
             %252C%2520a%2520signed%2520OAuth%2520request%2521"
        );
    }

    #[test]
    fn test_reference_signature() {
        let consumer = ConsumerKey::new(CONSUMER_KEY, CONSUMER_SECRET);
        let signer = RequestSigner::new(&consumer).with_token(TOKEN, TOKEN_SECRET);
        let oauth = signer.oauth_params(NONCE, TIMESTAMP);

        let signature = signer.signature_at("POST", &reference_url(), &[("status", STATUS)], &oauth);
        assert_eq!(signature, "hCtSmYh+iHYCEqBWrE7C7hYmtUk=");
    }

    #[test]
    fn test_header_lists_sorted_oauth_fields() {
        let consumer = ConsumerKey::new(CONSUMER_KEY, CONSUMER_SECRET);
        let header = RequestSigner::new(&consumer)
            .with_protocol_param("oauth_callback", "http://localhost:3000/api/auth/twitter/callback")
            .authorization_header_at("POST", &reference_url(), &[], NONCE, TIMESTAMP);

        assert!(header.starts_with("OAuth oauth_callback=\"http%3A%2F%2Flocalhost%3A3000"));
        assert!(header.contains("oauth_consumer_key=\"xvz1evFS4wEEPTGEFPHBog\""));
        assert!(header.contains("oauth_signature=\""));
        assert!(!header.contains("oauth_token="), "no token before the handshake issues one");
        assert!(!header.contains("include_entities"), "query parameters stay out of the header");
    }

    #[test]
    fn test_base_url_keeps_non_default_port() {
        let url: Url = "http://127.0.0.1:8080/oauth/request_token?x=1".parse().unwrap();
        assert_eq!(base_url(&url), "http://127.0.0.1:8080/oauth/request_token");
        let url: Url = "https://API.twitter.com:443/2/tweets".parse().unwrap();
        assert_eq!(base_url(&url), "https://api.twitter.com/2/tweets");
    }

    #[test]
    fn test_nonce_is_url_safe_and_unique() {
        let n1 = generate_nonce();
        let n2 = generate_nonce();
        assert_eq!(n1.len(), 43);
        assert!(n1.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_ne!(n1, n2);
    }

    #[test]
    fn test_consumer_debug_hides_secret() {
        let consumer = ConsumerKey::new("key", "very-secret");
        assert!(!format!("{consumer:?}").contains("very-secret"));
    }
}
