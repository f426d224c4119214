/// Session guard
///
/// Authenticates every inbound call from the two tokens held by a
/// [`SessionCarrier`], transparently replacing an unusable access token when
/// the refresh token still verifies.
///
/// # States
///
/// ```text
/// Unauthenticated ─▶ AccessValid                                      (no churn)
/// Unauthenticated ─▶ AttemptRefresh ─▶ RefreshValid ─▶ AccessReissued ─▶ AccessValid
///                    AttemptRefresh ─▶ RefreshInvalid ─▶ Unauthenticated (both cleared)
/// ```
///
/// The account behind a token is looked up on every verification, so a
/// deactivated account stops authenticating at its next call even while its
/// tokens are unexpired.
///
/// # Cancellation
///
/// All awaits (account lookups) complete before the carrier is touched, and
/// the carrier update is a single synchronous step. Dropping the future at
/// any await leaves the carrier exactly as it was.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::jwt::{TokenError, TokenIssuer, TokenType, Verification};
use crate::models::{Account, AccountRole};
use crate::store::{AccountStore, StoreError};

/// Error type for session checks
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No usable credentials
    #[error("Authentication required")]
    Unauthenticated,

    /// Replacement token could not be issued
    #[error(transparent)]
    Token(#[from] TokenError),

    /// Credential store failure
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Where a call's two credential tokens live
///
/// Implementations must apply [`set_tokens`](Self::set_tokens) and
/// [`clear`](Self::clear) to both values together.
pub trait SessionCarrier {
    /// Current access token, if any
    fn access_token(&self) -> Option<&str>;

    /// Current refresh token, if any
    fn refresh_token(&self) -> Option<&str>;

    /// Replaces the access token, leaving the refresh token as is
    fn set_access_token(&mut self, token: String);

    /// Stores a fresh token pair
    fn set_tokens(&mut self, access: String, refresh: String);

    /// Removes both tokens
    fn clear(&mut self);
}

/// The authenticated actor of a call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub account_id: Uuid,
    pub email: String,
    pub role: AccountRole,
}

impl Identity {
    /// Whether the actor may administer accounts
    pub fn is_admin(&self) -> bool {
        self.role == AccountRole::Admin
    }
}

impl From<&Account> for Identity {
    fn from(account: &Account) -> Self {
        Self {
            account_id: account.id,
            email: account.email.clone(),
            role: account.role,
        }
    }
}

/// Result of a successful authentication
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Who is calling
    pub identity: Identity,

    /// Whether a new access token was written to the carrier
    pub refreshed: bool,
}

/// Authenticates calls and manages the token pair
#[derive(Clone)]
pub struct SessionGuard {
    issuer: Arc<TokenIssuer>,
    accounts: Arc<dyn AccountStore>,
}

impl std::fmt::Debug for SessionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionGuard")
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}

impl SessionGuard {
    pub fn new(issuer: Arc<TokenIssuer>, accounts: Arc<dyn AccountStore>) -> Self {
        Self { issuer, accounts }
    }

    /// Starts a session for an account that has just proven its credentials
    ///
    /// Writes a new access and refresh token to the carrier.
    ///
    /// # Errors
    ///
    /// `Unauthenticated` if the account is inactive; the carrier is untouched.
    pub fn establish(
        &self,
        account: &Account,
        carrier: &mut impl SessionCarrier,
    ) -> Result<Identity, SessionError> {
        if !account.is_active {
            tracing::warn!(account_id = %account.id, "Login refused for inactive account");
            return Err(SessionError::Unauthenticated);
        }

        let identity = Identity::from(account);
        let access = self.issuer.issue_access(&identity)?;
        let refresh = self.issuer.issue_refresh(&identity)?;
        carrier.set_tokens(access, refresh);

        tracing::info!(account_id = %identity.account_id, "Session established");
        Ok(identity)
    }

    /// Ends the session by clearing both tokens
    pub fn end(&self, carrier: &mut impl SessionCarrier) {
        carrier.clear();
    }

    /// Authenticates a call
    ///
    /// # Errors
    ///
    /// - `Unauthenticated` when neither token yields an active account; both
    ///   tokens have been cleared from the carrier
    /// - `Store` / `Token` on collaborator failure; the carrier is untouched
    pub async fn authenticate(
        &self,
        carrier: &mut impl SessionCarrier,
    ) -> Result<Session, SessionError> {
        let access = carrier.access_token().map(str::to_owned);
        let refresh = carrier.refresh_token().map(str::to_owned);

        if let Some(token) = access.as_deref() {
            match self.issuer.verify(token, TokenType::Access) {
                Verification::Valid(claims) => {
                    if let Some(identity) = self.active_identity(claims.sub).await? {
                        tracing::debug!(account_id = %identity.account_id, "Access token valid");
                        return Ok(Session {
                            identity,
                            refreshed: false,
                        });
                    }
                    tracing::debug!(account_id = %claims.sub, "Access token names an unusable account");
                }
                Verification::Expired => tracing::debug!("Access token expired"),
                Verification::Invalid => tracing::debug!("Access token invalid"),
            }
        }

        let refreshed = match refresh.as_deref() {
            Some(token) => match self.issuer.verify(token, TokenType::Refresh) {
                Verification::Valid(claims) => self.active_identity(claims.sub).await?,
                Verification::Expired => {
                    tracing::debug!("Refresh token expired");
                    None
                }
                Verification::Invalid => {
                    tracing::debug!("Refresh token invalid");
                    None
                }
            },
            None => None,
        };

        match refreshed {
            Some(identity) => {
                let token = self.issuer.issue_access(&identity)?;
                carrier.set_access_token(token);

                tracing::info!(account_id = %identity.account_id, "Access token reissued");
                Ok(Session {
                    identity,
                    refreshed: true,
                })
            }
            None => {
                carrier.clear();
                Err(SessionError::Unauthenticated)
            }
        }
    }

    /// Current identity of an account, if it exists and is active
    async fn active_identity(&self, account_id: Uuid) -> Result<Option<Identity>, StoreError> {
        let account = self.accounts.find_account(account_id).await?;

        Ok(account
            .filter(|a| a.is_active)
            .map(|a| Identity::from(&a)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::TokenConfig;
    use crate::clock::{Clock, ManualClock};
    use crate::models::NewAccount;
    use crate::store::MemoryStore;
    use chrono::{Duration, Utc};

    #[derive(Debug, Default)]
    struct TestCarrier {
        access: Option<String>,
        refresh: Option<String>,
        access_writes: usize,
        clears: usize,
    }

    impl SessionCarrier for TestCarrier {
        fn access_token(&self) -> Option<&str> {
            self.access.as_deref()
        }

        fn refresh_token(&self) -> Option<&str> {
            self.refresh.as_deref()
        }

        fn set_access_token(&mut self, token: String) {
            self.access = Some(token);
            self.access_writes += 1;
        }

        fn set_tokens(&mut self, access: String, refresh: String) {
            self.access = Some(access);
            self.refresh = Some(refresh);
        }

        fn clear(&mut self) {
            self.access = None;
            self.refresh = None;
            self.clears += 1;
        }
    }

    struct Fixture {
        guard: SessionGuard,
        store: Arc<MemoryStore>,
        clock: ManualClock,
        account: Account,
    }

    async fn fixture() -> Fixture {
        let clock = ManualClock::new(Utc::now());
        let store = Arc::new(MemoryStore::new());
        let issuer = Arc::new(TokenIssuer::new(
            &TokenConfig {
                access_secret: "session-access-secret-at-least-32-bytes".to_string(),
                refresh_secret: "session-refresh-secret-at-least-32-bytes".to_string(),
                access_ttl: Duration::minutes(15),
                refresh_ttl: Duration::days(7),
            },
            Arc::new(clock.clone()),
        ));
        let account = store
            .create_account(NewAccount::user("ada@example.com", "hash".to_string()), clock.now())
            .await
            .unwrap();

        Fixture {
            guard: SessionGuard::new(issuer, store.clone()),
            store,
            clock,
            account,
        }
    }

    fn logged_in(f: &Fixture) -> TestCarrier {
        let mut carrier = TestCarrier::default();
        f.guard.establish(&f.account, &mut carrier).unwrap();
        carrier
    }

    #[tokio::test]
    async fn test_valid_access_token_causes_no_churn() {
        let f = fixture().await;
        let mut carrier = logged_in(&f);
        let before_access = carrier.access.clone();

        let session = f.guard.authenticate(&mut carrier).await.unwrap();

        assert_eq!(session.identity.account_id, f.account.id);
        assert!(!session.refreshed);
        assert_eq!(carrier.access, before_access);
        assert_eq!(carrier.access_writes, 0);
    }

    #[tokio::test]
    async fn test_expired_access_with_valid_refresh_reissues_once() {
        let f = fixture().await;
        let mut carrier = logged_in(&f);
        let old_access = carrier.access.clone();
        let old_refresh = carrier.refresh.clone();

        f.clock.advance(Duration::minutes(20));
        let session = f.guard.authenticate(&mut carrier).await.unwrap();

        assert!(session.refreshed);
        assert_eq!(carrier.access_writes, 1);
        assert_ne!(carrier.access, old_access);
        assert_eq!(carrier.refresh, old_refresh);

        // The reissued token is now good on its own.
        let again = f.guard.authenticate(&mut carrier).await.unwrap();
        assert!(!again.refreshed);
        assert_eq!(carrier.access_writes, 1);
    }

    #[tokio::test]
    async fn test_missing_access_with_valid_refresh_reissues() {
        let f = fixture().await;
        let mut carrier = logged_in(&f);
        carrier.access = None;

        let session = f.guard.authenticate(&mut carrier).await.unwrap();

        assert!(session.refreshed);
        assert!(carrier.access.is_some());
    }

    #[tokio::test]
    async fn test_tampered_access_with_valid_refresh_reissues() {
        let f = fixture().await;
        let mut carrier = logged_in(&f);
        carrier.access = Some("tampered.token.value".to_string());

        let session = f.guard.authenticate(&mut carrier).await.unwrap();

        assert!(session.refreshed);
        assert_eq!(carrier.access_writes, 1);
    }

    #[tokio::test]
    async fn test_both_expired_clears_both() {
        let f = fixture().await;
        let mut carrier = logged_in(&f);

        f.clock.advance(Duration::days(8));
        let result = f.guard.authenticate(&mut carrier).await;

        assert!(matches!(result, Err(SessionError::Unauthenticated)));
        assert!(carrier.access.is_none());
        assert!(carrier.refresh.is_none());
        assert_eq!(carrier.clears, 1);
        assert_eq!(carrier.access_writes, 0);
    }

    #[tokio::test]
    async fn test_no_tokens_is_unauthenticated() {
        let f = fixture().await;
        let mut carrier = TestCarrier::default();

        let result = f.guard.authenticate(&mut carrier).await;
        assert!(matches!(result, Err(SessionError::Unauthenticated)));
    }

    #[tokio::test]
    async fn test_deactivated_account_is_rejected_despite_live_tokens() {
        let f = fixture().await;
        let mut carrier = logged_in(&f);

        f.store
            .set_account_active(f.account.id, false, f.clock.now())
            .await
            .unwrap();
        let result = f.guard.authenticate(&mut carrier).await;

        assert!(matches!(result, Err(SessionError::Unauthenticated)));
        assert!(carrier.access.is_none());
        assert!(carrier.refresh.is_none());
    }

    #[tokio::test]
    async fn test_unknown_account_is_rejected() {
        let f = fixture().await;
        let stranger = Account {
            id: Uuid::new_v4(),
            ..f.account.clone()
        };
        let mut carrier = TestCarrier::default();
        f.guard.establish(&stranger, &mut carrier).unwrap();

        let result = f.guard.authenticate(&mut carrier).await;
        assert!(matches!(result, Err(SessionError::Unauthenticated)));
    }

    #[tokio::test]
    async fn test_refresh_uses_current_account_role() {
        let f = fixture().await;
        let mut carrier = logged_in(&f);
        f.clock.advance(Duration::minutes(20));

        let session = f.guard.authenticate(&mut carrier).await.unwrap();
        assert_eq!(session.identity.role, AccountRole::User);
        assert_eq!(session.identity.email, "ada@example.com");
    }

    #[tokio::test]
    async fn test_establish_refuses_inactive_account() {
        let f = fixture().await;
        let inactive = Account {
            is_active: false,
            ..f.account.clone()
        };
        let mut carrier = TestCarrier::default();

        let result = f.guard.establish(&inactive, &mut carrier);

        assert!(matches!(result, Err(SessionError::Unauthenticated)));
        assert!(carrier.access.is_none());
    }

    #[tokio::test]
    async fn test_end_clears_both() {
        let f = fixture().await;
        let mut carrier = logged_in(&f);

        f.guard.end(&mut carrier);

        assert!(carrier.access.is_none());
        assert!(carrier.refresh.is_none());
    }
}
