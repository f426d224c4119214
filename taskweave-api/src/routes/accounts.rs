/// Account administration
///
/// # Endpoints
///
/// - `POST /v1/accounts/:id/activation` - Activate or deactivate an account
///
/// Only admins may call it. A deactivated account fails authentication at
/// its next call, even with unexpired tokens, because the session guard
/// re-reads the account on every verification.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::ApiJson,
    routes::auth::AccountResponse,
};
use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Deserialize;
use taskweave_shared::auth::session::Identity;
use uuid::Uuid;

/// Activation request
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActivationRequest {
    pub active: bool,
}

/// Sets an account's active flag
///
/// # Errors
///
/// - `403 Forbidden`: Caller is not an admin
/// - `404 Not Found`: No such account
pub async fn set_activation(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(account_id): Path<Uuid>,
    ApiJson(req): ApiJson<ActivationRequest>,
) -> ApiResult<Json<AccountResponse>> {
    if !identity.is_admin() {
        tracing::warn!(
            account_id = %identity.account_id,
            target_id = %account_id,
            "Non-admin attempted account activation change"
        );
        return Err(ApiError::Forbidden(
            "Only admins may change account activation".to_string(),
        ));
    }

    let account = state
        .accounts
        .set_account_active(account_id, req.active, state.clock.now())
        .await?
        .ok_or_else(|| ApiError::NotFound("Account not found".to_string()))?;

    tracing::info!(
        admin_id = %identity.account_id,
        account_id = %account.id,
        active = account.is_active,
        "Account activation changed"
    );

    Ok(Json(account.into()))
}
