/// Token issuer
///
/// Issues and verifies the two tokens of a session: a short-lived access
/// token and a long-lived refresh token. Tokens are HS256 JWTs.
///
/// # Security
///
/// - **Independent secrets**: access and refresh tokens are signed with
///   different keys, so a leaked access secret cannot mint refresh tokens
///   and vice versa
/// - **Token kind claim**: a token presented as the wrong kind is invalid even
///   if the secrets were ever configured identically
/// - **Fail closed**: a token missing any claim does not deserialize and is
///   reported as [`Verification::Invalid`]
/// - **Injected clock**: expiry is judged against [`Clock`], not the system
///   time, so tests can expire tokens deterministically
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use chrono::Duration;
/// use taskweave_shared::auth::jwt::{TokenConfig, TokenIssuer, TokenType, Verification};
/// use taskweave_shared::auth::session::Identity;
/// use taskweave_shared::clock::SystemClock;
/// use taskweave_shared::models::AccountRole;
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = TokenConfig {
///     access_secret: "an-access-secret-of-at-least-32-bytes".into(),
///     refresh_secret: "a-refresh-secret-of-at-least-32-bytes".into(),
///     access_ttl: Duration::minutes(15),
///     refresh_ttl: Duration::days(7),
/// };
/// let issuer = TokenIssuer::new(&config, Arc::new(SystemClock));
///
/// let identity = Identity {
///     account_id: Uuid::new_v4(),
///     email: "ada@example.com".into(),
///     role: AccountRole::User,
/// };
/// let token = issuer.issue_access(&identity)?;
/// assert!(matches!(issuer.verify(&token, TokenType::Access), Verification::Valid(_)));
/// # Ok(())
/// # }
/// ```

use std::fmt;
use std::sync::Arc;

use chrono::Duration;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::session::Identity;
use crate::clock::Clock;
use crate::models::AccountRole;

/// Error type for token issuance
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// Failed to encode or sign the token
    #[error("Failed to create token: {0}")]
    CreateError(#[from] jsonwebtoken::errors::Error),
}

/// Token kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    /// Short-lived token presented on every call
    Access,

    /// Long-lived token used only to obtain a new access token
    Refresh,
}

impl TokenType {
    /// Gets token type as string
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

/// JWT claims
///
/// Every field is required; a token lacking any of them is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - Account ID
    pub sub: Uuid,

    /// Account email at issuance
    pub email: String,

    /// Account role at issuance
    pub role: AccountRole,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Access or refresh
    pub token_type: TokenType,
}

impl Claims {
    /// The identity the token was issued for
    pub fn identity(&self) -> Identity {
        Identity {
            account_id: self.sub,
            email: self.email.clone(),
            role: self.role,
        }
    }
}

/// Outcome of verifying a token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// Signature, kind and expiry all check out
    Valid(Claims),

    /// Correctly signed but past its expiry
    Expired,

    /// Bad signature, wrong kind, malformed or missing claims
    Invalid,
}

/// Signing secrets and lifetimes
#[derive(Clone)]
pub struct TokenConfig {
    /// Secret for access tokens
    pub access_secret: String,

    /// Secret for refresh tokens; must differ from `access_secret`
    pub refresh_secret: String,

    /// Access token lifetime
    pub access_ttl: Duration,

    /// Refresh token lifetime
    pub refresh_ttl: Duration,
}

impl fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenConfig")
            .field("access_secret", &"[REDACTED]")
            .field("refresh_secret", &"[REDACTED]")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish()
    }
}

struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SigningKeys {
    fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

/// Issues and verifies access and refresh tokens
pub struct TokenIssuer {
    access: SigningKeys,
    refresh: SigningKeys,
    access_ttl: Duration,
    refresh_ttl: Duration,
    validation: Validation,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    /// Creates an issuer from explicit configuration
    pub fn new(config: &TokenConfig, clock: Arc<dyn Clock>) -> Self {
        // Expiry is checked against the injected clock in `verify`.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            access: SigningKeys::from_secret(&config.access_secret),
            refresh: SigningKeys::from_secret(&config.refresh_secret),
            access_ttl: config.access_ttl,
            refresh_ttl: config.refresh_ttl,
            validation,
            clock,
        }
    }

    fn keys(&self, kind: TokenType) -> &SigningKeys {
        match kind {
            TokenType::Access => &self.access,
            TokenType::Refresh => &self.refresh,
        }
    }

    fn issue(&self, identity: &Identity, kind: TokenType) -> Result<String, TokenError> {
        let ttl = match kind {
            TokenType::Access => self.access_ttl,
            TokenType::Refresh => self.refresh_ttl,
        };
        let now = self.clock.now();

        let claims = Claims {
            sub: identity.account_id,
            email: identity.email.clone(),
            role: identity.role,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            token_type: kind,
        };

        Ok(encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.keys(kind).encoding,
        )?)
    }

    /// Issues a short-lived access token
    pub fn issue_access(&self, identity: &Identity) -> Result<String, TokenError> {
        self.issue(identity, TokenType::Access)
    }

    /// Issues a long-lived refresh token
    pub fn issue_refresh(&self, identity: &Identity) -> Result<String, TokenError> {
        self.issue(identity, TokenType::Refresh)
    }

    /// Verifies a token of the given kind
    ///
    /// The signature is checked with the kind's own secret before expiry is
    /// looked at, so a forged token is `Invalid` rather than `Expired`. A
    /// token is expired once the clock reaches its `exp`.
    pub fn verify(&self, token: &str, kind: TokenType) -> Verification {
        let claims = match decode::<Claims>(token, &self.keys(kind).decoding, &self.validation) {
            Ok(data) => data.claims,
            Err(e) => {
                tracing::debug!(kind = kind.as_str(), error = %e, "Token rejected");
                return Verification::Invalid;
            }
        };

        if claims.token_type != kind {
            tracing::debug!(kind = kind.as_str(), "Token kind mismatch");
            return Verification::Invalid;
        }

        if self.clock.now().timestamp() >= claims.exp {
            return Verification::Expired;
        }

        Verification::Valid(claims)
    }
}
