use std::time::Duration;

use anyhow::Context;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use super::claims::{Claims, TokenKind};
use crate::{config::JwtConfig, users::repo_types::User};

const ALGORITHM: Algorithm = Algorithm::HS512;

/// The only way verification fails. Forged, malformed and expired tokens
/// are indistinguishable to the caller.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid or expired token")]
pub struct InvalidToken;

/// Signing and verification keys plus token policy, built once at startup.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl JwtKeys {
    pub fn from_config(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            access_ttl: Duration::from_secs(cfg.access_ttl_seconds),
            refresh_ttl: Duration::from_secs(cfg.refresh_ttl_seconds),
        }
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    fn claims_for(&self, user_id: Uuid, kind: TokenKind) -> anyhow::Result<Claims> {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let exp = i64::try_from(ttl.as_secs())
            .ok()
            .and_then(|secs| now.checked_add(secs))
            .with_context(|| format!("{kind:?} ttl of {}s overflows exp", ttl.as_secs()))?;
        Ok(Claims {
            sub: user_id,
            iat: now,
            exp,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            jti: Uuid::new_v4(),
            token_type: kind,
            email: None,
            role: None,
        })
    }

    fn sign(&self, claims: &Claims) -> anyhow::Result<String> {
        let token = encode(&Header::new(ALGORITHM), claims, &self.encoding)?;
        debug!(user_id = %claims.sub, kind = ?claims.token_type, "jwt signed");
        Ok(token)
    }

    /// Access token carrying the user's email and role as hints.
    pub fn issue_access(&self, user: &User) -> anyhow::Result<String> {
        let mut claims = self.claims_for(user.id, TokenKind::Access)?;
        claims.email = Some(user.email.clone());
        claims.role = Some(user.role);
        self.sign(&claims)
    }

    /// Refresh token; no profile data.
    pub fn issue_refresh(&self, user_id: Uuid) -> anyhow::Result<String> {
        self.sign(&self.claims_for(user_id, TokenKind::Refresh)?)
    }

    /// Checks signature, algorithm, issuer, audience and `exp > now`.
    pub fn verify(&self, token: &str) -> Result<Claims, InvalidToken> {
        let mut validation = Validation::new(ALGORITHM);
        validation.leeway = 0;
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));

        let claims = decode::<Claims>(token, &self.decoding, &validation)
            .map_err(|e| {
                debug!(error = %e, "jwt rejected");
                InvalidToken
            })?
            .claims;

        // jsonwebtoken accepts exp == now; we don't.
        if claims.exp <= OffsetDateTime::now_utc().unix_timestamp() {
            debug!(user_id = %claims.sub, "jwt rejected at expiry boundary");
            return Err(InvalidToken);
        }
        debug!(user_id = %claims.sub, kind = ?claims.token_type, "jwt verified");
        Ok(claims)
    }
}
