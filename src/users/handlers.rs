use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::Method,
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        claims::Claims,
        jwt::JwtKeys,
        middleware::{require_token, TOKEN_HEADER},
        password::{hash_password_blocking, verify_dummy_blocking, verify_password_blocking},
    },
    error::{ApiError, ApiResult},
    state::AppState,
};

use super::{
    dto::{
        check_password, normalize_email, normalize_user_name, parse_id, CreateUserRequest,
        DeletedResponse, LoginRequest, LoginResponse, UpdateUserRequest,
    },
    model::{NewUser, User, UserChanges},
    store::{StoreError, UserStore},
};

pub fn user_routes(state: &AppState) -> Router<AppState> {
    let by_id = get(get_user)
        .put(update_user)
        .delete(delete_user)
        .fallback(reject_method)
        .layer(middleware::from_fn_with_state(state.jwt.clone(), require_token));

    Router::new()
        .route("/login", post(login).fallback(reject_method))
        .route("/user", get(list_users).post(create_user).fallback(reject_method))
        .route("/user/:id", by_id)
}

async fn reject_method(method: Method) -> ApiError {
    ApiError::MethodNotAllowed(method)
}

#[instrument(skip(store, keys, payload))]
pub async fn login(
    State(store): State<Arc<dyn UserStore>>,
    State(keys): State<JwtKeys>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<LoginResponse>> {
    let Json(payload) = payload?;

    let user = match store.get_user_by_username(payload.user_name.trim()).await {
        Ok(u) => u,
        Err(StoreError::NotFound(_)) => {
            warn!(user_name = %payload.user_name, "login unknown user");
            verify_dummy_blocking(payload.password).await;
            return Err(ApiError::InvalidCredentials);
        }
        Err(e) => return Err(e.into()),
    };

    let ok = verify_password_blocking(payload.password, user.password_hash.clone()).await?;
    if !ok {
        warn!(user_id = user.id, "login invalid password");
        return Err(ApiError::InvalidCredentials);
    }

    let token = keys.issue(user.id)?;
    info!(user_id = user.id, "user logged in");
    Ok(Json(LoginResponse {
        user_name: user.user_name,
        token,
    }))
}

#[instrument(skip(store))]
pub async fn list_users(State(store): State<Arc<dyn UserStore>>) -> ApiResult<Json<Vec<User>>> {
    Ok(Json(store.get_users().await?))
}

/// Registers a user. The body is the created record; a token for immediate
/// use is returned in the `x-jwt-token` response header.
#[instrument(skip(store, keys, payload))]
pub async fn create_user(
    State(store): State<Arc<dyn UserStore>>,
    State(keys): State<JwtKeys>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(payload) = payload?;
    let user_name = normalize_user_name(&payload.user_name)?;
    let email = normalize_email(&payload.email)?;
    check_password(&payload.password)?;

    let password_hash = hash_password_blocking(payload.password).await?;
    let user = store
        .create_user(NewUser {
            user_name,
            email,
            password_hash,
        })
        .await?;

    let token = keys.issue(user.id)?;
    info!(user_id = user.id, user_name = %user.user_name, "user registered");
    Ok(([(TOKEN_HEADER, token)], Json(user)))
}

#[instrument(skip(store, claims))]
pub async fn get_user(
    State(store): State<Arc<dyn UserStore>>,
    Extension(claims): Extension<Claims>,
    Path(raw_id): Path<String>,
) -> ApiResult<Json<User>> {
    let id = parse_id(&raw_id)?;
    let user = store.get_user_by_id(id).await?;
    info!(actor = claims.user_id, user_id = id, "user fetched");
    Ok(Json(user))
}

#[instrument(skip(store, claims, payload))]
pub async fn update_user(
    State(store): State<Arc<dyn UserStore>>,
    Extension(claims): Extension<Claims>,
    Path(raw_id): Path<String>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> ApiResult<Json<User>> {
    let id = parse_id(&raw_id)?;
    let Json(payload) = payload?;

    let mut changes = UserChanges {
        user_name: payload.user_name.as_deref().map(normalize_user_name).transpose()?,
        email: payload.email.as_deref().map(normalize_email).transpose()?,
        password_hash: None,
    };
    if let Some(password) = payload.password {
        if claims.user_id != id {
            warn!(actor = claims.user_id, user_id = id, "password change for another user");
            return Err(ApiError::Forbidden(
                "password can only be changed by its owner".into(),
            ));
        }
        check_password(&password)?;
        changes.password_hash = Some(hash_password_blocking(password).await?);
    }
    if changes.is_empty() {
        return Err(ApiError::Validation("no fields to update".into()));
    }

    let user = store.update_user(id, changes).await?;
    info!(actor = claims.user_id, user_id = id, "user updated");
    Ok(Json(user))
}

#[instrument(skip(store, claims))]
pub async fn delete_user(
    State(store): State<Arc<dyn UserStore>>,
    Extension(claims): Extension<Claims>,
    Path(raw_id): Path<String>,
) -> ApiResult<Json<DeletedResponse>> {
    let id = parse_id(&raw_id)?;
    store.delete_user(id).await?;
    info!(actor = claims.user_id, user_id = id, "user deleted");
    Ok(Json(DeletedResponse { deleted: id }))
}
