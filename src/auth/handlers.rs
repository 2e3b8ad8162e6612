use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, ProfileResponse, PublicUser, SignupRequest},
        extractors::AuthUser,
        jwt::JwtKeys,
        password::verify_password,
        repo_types::Role,
        services::{normalize_email, register_user},
    },
    error::AppError,
    extract::AppJson,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/profile", get(profile))
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    AppJson(payload): AppJson<SignupRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let user = register_user(
        state.users.as_ref(),
        &payload.name,
        &payload.email,
        &payload.password,
        Role::User,
    )
    .await
    .map_err(|e| {
        warn!(error = %e, "signup rejected");
        e
    })?;

    let token = JwtKeys::from_ref(&state).sign(&user)?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: PublicUser::from(user),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let email = normalize_email(&payload.email);
    if email.is_empty() || payload.password.is_empty() {
        return Err(AppError::bad_request("Email and password are required"));
    }

    let Some(user) = state.users.find_by_email(&email).await? else {
        warn!(email = %email, "login unknown email");
        return Err(AppError::Unauthorized("Invalid credentials".into()));
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(email = %email, user_id = %user.id, "login invalid password");
        return Err(AppError::Unauthorized("Invalid credentials".into()));
    }

    if let Some(role) = payload.role.as_deref() {
        if role != user.role.as_str() {
            warn!(user_id = %user.id, requested = role, "login role mismatch");
            return Err(AppError::Forbidden(format!("Not authorized as {role}")));
        }
    }

    let token = JwtKeys::from_ref(&state).sign(&user)?;

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(Json(AuthResponse {
        token,
        user: PublicUser::from(user),
    }))
}

#[instrument(skip(state))]
pub async fn profile(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ProfileResponse>, AppError> {
    let user = state
        .users
        .find_by_id(auth.id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    Ok(Json(ProfileResponse {
        user: PublicUser::from(user),
    }))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::testing::{bearer, send, signup_user, TestApp};

    #[tokio::test]
    async fn signup_returns_token_accepted_by_profile() {
        let app = TestApp::new();
        let (token, body) = signup_user(&app, "Asha", "asha@shop.test", "hunter22").await;
        assert_eq!(body["user"]["email"], "asha@shop.test");
        assert_eq!(body["user"]["role"], "user");
        assert!(body["user"].get("passwordHash").is_none());

        let (status, profile) = send(&app, "GET", "/api/auth/profile", Some(&bearer(&token)), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(profile["user"]["name"], "Asha");
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let app = TestApp::new();
        signup_user(&app, "Asha", "asha@shop.test", "hunter22").await;

        let (status, body) = send(
            &app,
            "POST",
            "/api/auth/signup",
            None,
            Some(json!({"name": "Other", "email": "ASHA@shop.test", "password": "another1"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "Email already registered");
    }

    #[tokio::test]
    async fn signup_requires_all_fields() {
        let app = TestApp::new();
        let (status, _) = send(
            &app,
            "POST",
            "/api/auth/signup",
            None,
            Some(json!({"email": "x@shop.test", "password": "hunter22"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn wrongly_typed_signup_field_is_a_json_bad_request() {
        let app = TestApp::new();
        let (status, body) = send(
            &app,
            "POST",
            "/api/auth/signup",
            None,
            Some(json!({"name": "Asha", "email": "asha@shop.test", "password": 123456})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn login_with_correct_and_wrong_password() {
        let app = TestApp::new();
        signup_user(&app, "Ravi", "ravi@shop.test", "correct-pw").await;

        let (status, body) = send(
            &app,
            "POST",
            "/api/auth/login",
            None,
            Some(json!({"email": "ravi@shop.test", "password": "correct-pw"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let token = body["token"].as_str().unwrap().to_string();
        let (status, _) = send(&app, "GET", "/api/auth/profile", Some(&bearer(&token)), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(
            &app,
            "POST",
            "/api/auth/login",
            None,
            Some(json!({"email": "ravi@shop.test", "password": "wrong-pw"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid credentials");
    }

    #[tokio::test]
    async fn login_with_mismatched_role_is_forbidden() {
        let app = TestApp::new();
        signup_user(&app, "Ravi", "ravi@shop.test", "correct-pw").await;

        let (status, body) = send(
            &app,
            "POST",
            "/api/auth/login",
            None,
            Some(json!({"email": "ravi@shop.test", "password": "correct-pw", "role": "admin"})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Not authorized as admin");
    }

    #[tokio::test]
    async fn profile_requires_valid_token() {
        let app = TestApp::new();
        let (status, _) = send(&app, "GET", "/api/auth/profile", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) =
            send(&app, "GET", "/api/auth/profile", Some("Bearer nope"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid or expired token");
    }
}
