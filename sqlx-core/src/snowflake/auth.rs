//! Credentials presented at login.

use std::fmt::{self, Debug, Formatter};
use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::{DecodePrivateKey, EncodePublicKey};
use rsa::RsaPrivateKey;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::Error;

/// Lifetime of a key pair login token; it is only used for the login request.
const JWT_LIFETIME_SECS: i64 = 60;

/// The authentication fields of a login request.
#[derive(Clone, PartialEq, Eq)]
pub struct LoginPayload {
    pub authenticator: &'static str,
    pub password: Option<String>,
    pub token: Option<String>,
}

/// A way of proving the identity of the connecting user.
///
/// [`login_payload`](Self::login_payload) is called for every login, so
/// implementations producing short lived tokens mint a fresh one each time.
pub trait Credential: Send + Sync + Debug + 'static {
    fn login_payload(&self, account: &str, user: &str) -> Result<LoginPayload, Error>;
}

/// User name and password (`SNOWFLAKE` authenticator).
#[derive(Clone)]
pub struct PasswordCredential {
    password: String,
}

impl PasswordCredential {
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
        }
    }
}

impl Credential for PasswordCredential {
    fn login_payload(&self, _account: &str, _user: &str) -> Result<LoginPayload, Error> {
        Ok(LoginPayload {
            authenticator: "SNOWFLAKE",
            password: Some(self.password.clone()),
            token: None,
        })
    }
}

impl Debug for PasswordCredential {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordCredential")
            .field("password", &"<redacted>")
            .finish()
    }
}

/// An OAuth access token obtained elsewhere (`OAUTH` authenticator).
#[derive(Clone)]
pub struct OAuthCredential {
    token: String,
}

impl OAuthCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl Credential for OAuthCredential {
    fn login_payload(&self, _account: &str, _user: &str) -> Result<LoginPayload, Error> {
        Ok(LoginPayload {
            authenticator: "OAUTH",
            password: None,
            token: Some(self.token.clone()),
        })
    }
}

impl Debug for OAuthCredential {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthCredential")
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Key pair authentication (`SNOWFLAKE_JWT` authenticator).
///
/// Each login presents a JWT signed with the RSA private key. The server
/// finds the matching public key through the fingerprint in the issuer.
#[derive(Clone)]
pub struct KeyPairCredential {
    key: EncodingKey,
    fingerprint: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub(crate) struct JwtClaims {
    pub(crate) iss: String,
    pub(crate) sub: String,
    pub(crate) iat: i64,
    pub(crate) exp: i64,
}

impl KeyPairCredential {
    /// Loads an unencrypted RSA private key in PKCS#8 or PKCS#1 PEM form.
    pub fn from_pem(pem: &str) -> Result<Self, Error> {
        let private = RsaPrivateKey::from_pkcs8_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
            .map_err(|err| {
                Error::Configuration(format!("invalid RSA private key: {}", err).into())
            })?;

        let public = private
            .to_public_key()
            .to_public_key_der()
            .map_err(|err| Error::Configuration(err.to_string().into()))?;

        let fingerprint = format!(
            "SHA256:{}",
            BASE64.encode(Sha256::digest(public.as_bytes()))
        );

        let key = EncodingKey::from_rsa_pem(pem.as_bytes())
            .map_err(|err| {
                Error::Configuration(format!("invalid RSA private key: {}", err).into())
            })?;

        Ok(Self { key, fingerprint })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let pem = std::fs::read_to_string(path).map_err(|err| {
            let message = format!("cannot read private key {}: {}", path.display(), err);
            Error::Configuration(message.into())
        })?;

        Self::from_pem(&pem)
    }

    /// `SHA256:` followed by the base64 digest of the DER encoded public key.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

/// The account as it appears in JWT claims: upper case, without region or cloud.
fn jwt_account(account: &str) -> String {
    account
        .split('.')
        .next()
        .unwrap_or(account)
        .to_uppercase()
}

pub(crate) fn jwt_claims(account: &str, user: &str, fingerprint: &str, now: i64) -> JwtClaims {
    let qualified_user = format!("{}.{}", jwt_account(account), user.to_uppercase());

    JwtClaims {
        iss: format!("{}.{}", qualified_user, fingerprint),
        sub: qualified_user,
        iat: now,
        exp: now + JWT_LIFETIME_SECS,
    }
}

impl Credential for KeyPairCredential {
    fn login_payload(&self, account: &str, user: &str) -> Result<LoginPayload, Error> {
        let claims = jwt_claims(
            account,
            user,
            &self.fingerprint,
            chrono::Utc::now().timestamp(),
        );

        let token = jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.key)
            .map_err(|err| Error::Configuration(err.into()))?;

        Ok(LoginPayload {
            authenticator: "SNOWFLAKE_JWT",
            password: None,
            token: Some(token),
        })
    }
}

impl Debug for KeyPairCredential {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPairCredential")
            .field("fingerprint", &self.fingerprint)
            .finish()
    }
}

impl Debug for LoginPayload {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginPayload")
            .field("authenticator", &self.authenticator)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
