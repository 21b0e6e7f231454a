//! Bearer-token verification against the external token issuer.
//!
//! The issuer owns identity: tokens carry a verified email claim plus the
//! optional profile hints (nickname, picture) the login upsert consumes. In
//! production the verifier loads the issuer's JWKS through OIDC discovery;
//! with `PICTORIA_AUTH_SECRET` set it verifies HS256 tokens locally, which is
//! how the tests mint their own.

use crate::config::AuthConfig;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token rejected: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),

    #[error("no issuer key matches the token key id")]
    UnknownKeyId,

    #[error("token is missing the email claim")]
    MissingEmail,

    #[error("failed to load issuer metadata: {0}")]
    Discovery(#[from] reqwest::Error),

    #[error("neither an issuer URL nor a shared secret is configured")]
    Unconfigured,
}

/// Claims the rest of the application trusts once verification succeeds.
#[derive(Debug, Clone)]
pub struct VerifiedClaims {
    pub email: String,
    pub email_verified: bool,
    pub nickname: Option<String>,
    pub picture: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawClaims {
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
    nickname: Option<String>,
    picture: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DiscoveryDocument {
    jwks_uri: String,
}

struct VerifierKey {
    kid: Option<String>,
    key: DecodingKey,
}

pub struct TokenVerifier {
    keys: Vec<VerifierKey>,
    validation: Validation,
}

impl TokenVerifier {
    /// HS256 verifier for a locally shared secret.
    pub fn with_shared_secret(secret: &[u8], audience: &str) -> Self {
        Self {
            keys: vec![VerifierKey {
                kid: None,
                key: DecodingKey::from_secret(secret),
            }],
            validation: build_validation(Algorithm::HS256, audience),
        }
    }

    /// RS256 verifier backed by the issuer's JWKS, located through the
    /// standard OIDC discovery document.
    pub async fn from_issuer(
        client: &reqwest::Client,
        issuer_base_url: &str,
        audience: &str,
    ) -> Result<Self, AuthError> {
        let discovery_url = format!("{issuer_base_url}/.well-known/openid-configuration");
        let discovery: DiscoveryDocument = client
            .get(&discovery_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let jwks: JwkSet = client
            .get(&discovery.jwks_uri)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let mut keys = Vec::new();
        for jwk in &jwks.keys {
            match DecodingKey::from_jwk(jwk) {
                Ok(key) => keys.push(VerifierKey {
                    kid: jwk.common.key_id.clone(),
                    key,
                }),
                Err(err) => {
                    tracing::warn!(error = %err, "skipping unusable issuer key");
                }
            }
        }
        tracing::info!(jwks_uri = %discovery.jwks_uri, keys = keys.len(), "issuer keys loaded");
        Ok(Self {
            keys,
            validation: build_validation(Algorithm::RS256, audience),
        })
    }

    pub async fn from_config(
        config: &AuthConfig,
        client: &reqwest::Client,
    ) -> Result<Self, AuthError> {
        match (&config.shared_secret, &config.issuer_base_url) {
            (Some(secret), _) => Ok(Self::with_shared_secret(
                secret.as_bytes(),
                &config.audience,
            )),
            (None, Some(issuer)) => Self::from_issuer(client, issuer, &config.audience).await,
            (None, None) => Err(AuthError::Unconfigured),
        }
    }

    pub fn verify(&self, token: &str) -> Result<VerifiedClaims, AuthError> {
        let header = decode_header(token)?;
        let key = self.select_key(header.kid.as_deref())?;
        let data = decode::<RawClaims>(token, key, &self.validation)?;
        let email = data.claims.email.ok_or(AuthError::MissingEmail)?;
        Ok(VerifiedClaims {
            email: email.to_lowercase(),
            email_verified: data.claims.email_verified,
            nickname: data.claims.nickname,
            picture: data.claims.picture,
        })
    }

    fn select_key(&self, kid: Option<&str>) -> Result<&DecodingKey, AuthError> {
        match kid {
            Some(kid) => self
                .keys
                .iter()
                .find(|k| k.kid.as_deref() == Some(kid))
                .map(|k| &k.key)
                .ok_or(AuthError::UnknownKeyId),
            None => self
                .keys
                .first()
                .map(|k| &k.key)
                .ok_or(AuthError::UnknownKeyId),
        }
    }
}

fn build_validation(alg: Algorithm, audience: &str) -> Validation {
    let mut validation = Validation::new(alg);
    if audience.is_empty() {
        validation.validate_aud = false;
    } else {
        validation.set_audience(&[audience]);
    }
    validation
}
