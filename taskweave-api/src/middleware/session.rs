/// Cookie session carrier and session middleware
///
/// Both tokens travel in cookies that are:
///
/// - `HttpOnly`, so page scripts cannot read them
/// - `SameSite=Strict` with `Path=/` and no `Domain`, so they stay on this origin
/// - `Secure` when `COOKIE_SECURE` is set
///
/// [`require_session`] runs the session guard before protected handlers and
/// inserts the caller's [`Identity`] into request extensions:
///
/// ```no_run
/// use axum::Extension;
/// use taskweave_shared::auth::session::Identity;
///
/// async fn handler(Extension(identity): Extension<Identity>) -> String {
///     format!("Hello, {}", identity.email)
/// }
/// ```

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use taskweave_shared::auth::session::SessionCarrier;
use time::Duration;

use crate::{app::AppState, config::SessionConfig, error::ApiError};

/// Cookie name for the access token
pub const ACCESS_COOKIE: &str = "taskweave_access";

/// Cookie name for the refresh token
pub const REFRESH_COOKIE: &str = "taskweave_refresh";

/// Attributes shared by both session cookies
#[derive(Debug, Clone, Copy)]
pub struct CookiePolicy {
    pub secure: bool,
    pub access_max_age: Duration,
    pub refresh_max_age: Duration,
}

impl CookiePolicy {
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            secure: config.cookie_secure,
            access_max_age: Duration::seconds(config.access_ttl.num_seconds()),
            refresh_max_age: Duration::seconds(config.refresh_ttl.num_seconds()),
        }
    }

    fn build(&self, name: &'static str, value: String, max_age: Duration) -> Cookie<'static> {
        Cookie::build((name, value))
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Strict)
            .path("/")
            .max_age(max_age)
            .build()
    }
}

/// [`SessionCarrier`] over the request's cookie jar
///
/// Changes accumulate in the jar and reach the client as `Set-Cookie`
/// headers when the jar is returned as part of the response.
#[derive(Debug)]
pub struct CookieCarrier {
    jar: CookieJar,
    policy: CookiePolicy,
}

impl CookieCarrier {
    pub fn new(jar: CookieJar, policy: CookiePolicy) -> Self {
        Self { jar, policy }
    }

    /// The jar with every change made through the carrier
    pub fn into_jar(self) -> CookieJar {
        self.jar
    }

    fn value(&self, name: &str) -> Option<&str> {
        self.jar
            .get(name)
            .map(|cookie| cookie.value())
            .filter(|value| !value.is_empty())
    }

    fn put(&mut self, cookie: Cookie<'static>) {
        let jar = std::mem::replace(&mut self.jar, CookieJar::new());
        self.jar = jar.add(cookie);
    }
}

impl SessionCarrier for CookieCarrier {
    fn access_token(&self) -> Option<&str> {
        self.value(ACCESS_COOKIE)
    }

    fn refresh_token(&self) -> Option<&str> {
        self.value(REFRESH_COOKIE)
    }

    fn set_access_token(&mut self, token: String) {
        let cookie = self.policy.build(ACCESS_COOKIE, token, self.policy.access_max_age);
        self.put(cookie);
    }

    fn set_tokens(&mut self, access: String, refresh: String) {
        let access = self.policy.build(ACCESS_COOKIE, access, self.policy.access_max_age);
        let refresh = self.policy.build(REFRESH_COOKIE, refresh, self.policy.refresh_max_age);
        self.put(access);
        self.put(refresh);
    }

    fn clear(&mut self) {
        let access = self.policy.build(ACCESS_COOKIE, String::new(), Duration::ZERO);
        let refresh = self.policy.build(REFRESH_COOKIE, String::new(), Duration::ZERO);
        self.put(access);
        self.put(refresh);
    }
}

/// Session middleware layer
///
/// Authenticates the call, refreshing the access token if needed. Cookie
/// changes (a reissued access token, or both tokens cleared) are attached to
/// the response either way.
pub async fn require_session(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let mut carrier = CookieCarrier::new(jar, state.cookie_policy);

    match state.guard.authenticate(&mut carrier).await {
        Ok(session) => {
            tracing::debug!(
                account_id = %session.identity.account_id,
                refreshed = session.refreshed,
                "Session attached"
            );
            request.extensions_mut().insert(session.identity);
            let response = next.run(request).await;
            (carrier.into_jar(), response).into_response()
        }
        Err(err) => (carrier.into_jar(), ApiError::from(err)).into_response(),
    }
}
