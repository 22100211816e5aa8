use std::sync::{Arc, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use rand::rngs::OsRng;
use rsa::pkcs8::EncodePrivateKey;
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use serde_json::{json, Value};

pub const TEST_AUDIENCE: &str = "casting-agency";
pub const TEST_SUBJECT: &str = "auth0|test-user";

/// RSA material shared by every `TestJwt` drawing from the same slot.
struct RsaMaterial {
    encoding_key: EncodingKey,
    n: String,
    e: String,
}

impl RsaMaterial {
    fn generate() -> Self {
        let private_key =
            RsaPrivateKey::new(&mut OsRng, 2048).expect("failed to generate RSA-2048 key");
        let pkcs8_pem = private_key
            .to_pkcs8_pem(rsa::pkcs8::LineEnding::LF)
            .expect("failed to export RSA key as PKCS8 PEM");
        let encoding_key = EncodingKey::from_rsa_pem(pkcs8_pem.as_bytes())
            .expect("failed to create EncodingKey from RSA PEM");
        Self {
            encoding_key,
            n: URL_SAFE_NO_PAD.encode(private_key.n().to_bytes_be()),
            e: URL_SAFE_NO_PAD.encode(private_key.e().to_bytes_be()),
        }
    }
}

// Key generation is expensive; each test binary generates at most two keys.
fn material(slot: usize) -> Arc<RsaMaterial> {
    static SLOTS: [OnceLock<Arc<RsaMaterial>>; 2] = [OnceLock::new(), OnceLock::new()];
    SLOTS[slot]
        .get_or_init(|| Arc::new(RsaMaterial::generate()))
        .clone()
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock before epoch")
        .as_secs() as i64
}

/// RS256 token signer standing in for the identity provider.
///
/// ```ignore
/// let jwt = TestJwt::new("key-1", &server.issuer());
/// let token = jwt.token().permissions(&["get:movies"]).sign();
/// ```
#[derive(Clone)]
pub struct TestJwt {
    kid: String,
    issuer: String,
    audience: String,
    material: Arc<RsaMaterial>,
}

impl TestJwt {
    /// Signer using the primary test key.
    pub fn new(kid: &str, issuer: &str) -> Self {
        Self::from_slot(0, kid, issuer)
    }

    /// Signer using a second, unrelated key (for rotation and bad-signature cases).
    pub fn other_key(kid: &str, issuer: &str) -> Self {
        Self::from_slot(1, kid, issuer)
    }

    fn from_slot(slot: usize, kid: &str, issuer: &str) -> Self {
        Self {
            kid: kid.to_string(),
            issuer: issuer.to_string(),
            audience: TEST_AUDIENCE.to_string(),
            material: material(slot),
        }
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn audience(&self) -> &str {
        &self.audience
    }

    /// The public key as a JWK entry.
    pub fn jwk(&self) -> Value {
        json!({
            "kty": "RSA",
            "alg": "RS256",
            "use": "sig",
            "kid": self.kid,
            "n": self.material.n,
            "e": self.material.e,
        })
    }

    /// A JWKS document publishing only this key.
    pub fn jwks(&self) -> Value {
        jwks_of(&[self])
    }

    /// Start a token with valid defaults: issuer, audience, subject, one hour
    /// of validity, and an empty permissions list.
    pub fn token(&self) -> TokenBuilder<'_> {
        let now = now_secs();
        TokenBuilder {
            jwt: self,
            kid: Some(self.kid.clone()),
            claims: json!({
                "iss": self.issuer,
                "sub": TEST_SUBJECT,
                "aud": self.audience,
                "iat": now,
                "exp": now + 3600,
                "permissions": [],
            }),
        }
    }

    /// A valid token granting `permissions`.
    pub fn token_with(&self, permissions: &[&str]) -> String {
        self.token().permissions(permissions).sign()
    }
}

/// A JWKS document publishing every given key.
pub fn jwks_of(signers: &[&TestJwt]) -> Value {
    json!({ "keys": signers.iter().map(|s| s.jwk()).collect::<Vec<_>>() })
}

/// Builder for a single test token.
pub struct TokenBuilder<'a> {
    jwt: &'a TestJwt,
    kid: Option<String>,
    claims: Value,
}

impl TokenBuilder<'_> {
    pub fn subject(self, sub: &str) -> Self {
        self.claim("sub", sub)
    }

    pub fn permissions(self, permissions: &[&str]) -> Self {
        self.claim("permissions", permissions)
    }

    /// Drop the permissions claim entirely.
    pub fn without_permissions(self) -> Self {
        self.without("permissions")
    }

    /// Expiry relative to now; negative values produce an expired token.
    pub fn expires_in(self, secs: i64) -> Self {
        self.claim("exp", now_secs() + secs)
    }

    pub fn issuer(self, issuer: &str) -> Self {
        self.claim("iss", issuer)
    }

    pub fn audience(self, audience: impl Into<Value>) -> Self {
        self.claim("aud", audience)
    }

    pub fn kid(mut self, kid: &str) -> Self {
        self.kid = Some(kid.to_string());
        self
    }

    pub fn without_kid(mut self) -> Self {
        self.kid = None;
        self
    }

    pub fn claim(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.claims[key] = value.into();
        self
    }

    pub fn without(mut self, key: &str) -> Self {
        if let Some(map) = self.claims.as_object_mut() {
            map.remove(key);
        }
        self
    }

    /// Sign with the signer's RSA key (RS256).
    pub fn sign(self) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.kid;
        encode(&header, &self.claims, &self.jwt.material.encoding_key).expect("failed to sign token")
    }

    /// Sign with an HMAC secret (HS256), keeping the kid.
    pub fn sign_hs256(self, secret: &[u8]) -> String {
        let mut header = Header::new(Algorithm::HS256);
        header.kid = self.kid;
        encode(&header, &self.claims, &EncodingKey::from_secret(secret))
            .expect("failed to sign token")
    }

    /// Unsigned token declaring `alg` verbatim, with a filler signature
    /// segment.
    pub fn unsigned(self, alg: &str) -> String {
        let mut header = json!({ "alg": alg, "typ": "JWT" });
        if let Some(kid) = self.kid {
            header["kid"] = Value::from(kid);
        }
        let header = URL_SAFE_NO_PAD.encode(header.to_string());
        let claims = URL_SAFE_NO_PAD.encode(self.claims.to_string());
        format!("{header}.{claims}.c2ln")
    }
}
