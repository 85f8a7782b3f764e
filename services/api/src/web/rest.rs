//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::adapters::accounts::{new_account, AccountError};
use crate::web::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::{OpenApi, ToSchema};

const MIN_PASSWORD_LEN: usize = 8;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        create_account_handler,
    ),
    components(
        schemas(CreateAccountRequest, AccountResponse)
    ),
    tags(
        (name = "Book Reels API", description = "Accounts for the passage feed. The feed itself runs over /ws.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Request and Response Structs
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct CreateAccountRequest {
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

/// The account as it will appear in the account picker.
#[derive(Serialize, ToSchema)]
pub struct AccountResponse {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// POST /accounts - Create an account that can be chosen in the account picker.
#[utoipa::path(
    post,
    path = "/accounts",
    request_body = CreateAccountRequest,
    responses(
        (status = 201, description = "Account created", body = AccountResponse),
        (status = 400, description = "Missing email or password too short"),
        (status = 409, description = "Email already registered"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn create_account_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateAccountRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if req.email.trim().is_empty() || !req.email.contains('@') {
        return Err((StatusCode::BAD_REQUEST, "A valid email is required".to_string()));
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("Password must be at least {} characters", MIN_PASSWORD_LEN),
        ));
    }

    let display_name = req.display_name.filter(|name| !name.trim().is_empty());
    let record = new_account(&req.email, display_name, req.avatar_url, &req.password).map_err(|e| {
        error!("Failed to hash password: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Failed to create account".to_string())
    })?;

    let identity = state.accounts.create_account(record).await.map_err(|e| match e {
        AccountError::EmailTaken => (StatusCode::CONFLICT, e.to_string()),
        _ => {
            error!("Failed to create account: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to create account".to_string())
        }
    })?;
    info!("Account {} created", identity.uid);

    let response = AccountResponse {
        uid: identity.uid,
        email: identity.email.unwrap_or_default(),
        display_name: identity.display_name,
    };
    Ok((StatusCode::CREATED, Json(response)))
}
