use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::cookie::{Cookie, Key, PrivateCookieJar, SameSite};
use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        session::{PasswordReset, Session},
        user::User,
    },
    state::AppState,
};

pub const SESSION_COOKIE: &str = "trip_session";
pub const MIN_PASSWORD_LEN: usize = 6;

const USER_COLUMNS: &str =
    "id, uuid, email, display_name, password_hash, created_at, last_login_at";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub id: i64,
    pub uuid: String,
    pub email: String,
    pub display_name: String,
}

impl AuthenticatedUser {
    /// Display name if one was given, otherwise the email.
    pub fn greeting_name(&self) -> &str {
        if self.display_name.is_empty() {
            &self.email
        } else {
            &self.display_name
        }
    }
}

impl From<User> for AuthenticatedUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            uuid: user.uuid,
            email: user.email,
            display_name: user.display_name,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CurrentUser(pub Option<AuthenticatedUser>);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthenticatedUser>() {
            return Ok(Self(Some(user.clone())));
        }

        let jar =
            PrivateCookieJar::<Key>::from_headers(&parts.headers, state.cookie_key.clone());
        let Some(cookie) = jar.get(SESSION_COOKIE) else {
            return Ok(Self(None));
        };

        let user = resolve_session(state, cookie.value()).await?;
        if let Some(user) = &user {
            parts.extensions.insert(user.clone());
        }
        Ok(Self(user))
    }
}

impl CurrentUser {
    pub fn require_user(&self) -> Result<&AuthenticatedUser, AppError> {
        self.0.as_ref().ok_or(AppError::SignInRequired)
    }
}

pub fn normalize_email(raw: &str) -> Result<String, AppError> {
    let email = raw.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(AppError::bad_request("Please enter a valid email address.")),
    }
}

fn validate_password(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest(format!(
            "The password needs at least {MIN_PASSWORD_LEN} characters."
        )));
    }
    Ok(())
}

/// Argon2 is memory-hard; both helpers run it on the blocking pool.
pub async fn hash_password(password: &str) -> Result<String, AppError> {
    let password = password.to_owned();
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|err| AppError::Other(anyhow::anyhow!("password hashing failed: {err}")))
    })
    .await
    .map_err(|err| AppError::Other(anyhow::anyhow!("password hashing task failed: {err}")))?
}

pub async fn verify_password(password: &str, stored_hash: &str) -> Result<bool, AppError> {
    let password = password.to_owned();
    let stored_hash = stored_hash.to_owned();
    tokio::task::spawn_blocking(move || {
        let parsed = PasswordHash::new(&stored_hash).map_err(|err| {
            AppError::Other(anyhow::anyhow!("stored password hash invalid: {err}"))
        })?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    })
    .await
    .map_err(|err| AppError::Other(anyhow::anyhow!("password check task failed: {err}")))?
}

fn hash_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

async fn find_user_by_email(state: &AppState, email: &str) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE email = ?"
    ))
    .bind(email)
    .fetch_optional(&state.db)
    .await?;
    Ok(user)
}

async fn find_user_by_id(state: &AppState, id: i64) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
        .bind(id)
        .fetch_optional(&state.db)
        .await?;
    Ok(user)
}

pub async fn register_user(
    state: &AppState,
    email: &str,
    password: &str,
    display_name: &str,
) -> Result<AuthenticatedUser, AppError> {
    let email = normalize_email(email)?;
    validate_password(password)?;

    if find_user_by_email(state, &email).await?.is_some() {
        return Err(duplicate_email());
    }

    let uuid = Uuid::new_v4().to_string();
    let password_hash = hash_password(password).await?;
    let display_name = display_name.trim().to_string();
    let result = sqlx::query(
        "INSERT INTO users (uuid, email, display_name, password_hash, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&uuid)
    .bind(&email)
    .bind(&display_name)
    .bind(&password_hash)
    .bind(Utc::now())
    .execute(&state.db)
    .await
    .map_err(|err| match err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => duplicate_email(),
        other => AppError::Database(other),
    })?;

    info!(%uuid, "account registered");
    Ok(AuthenticatedUser {
        id: result.last_insert_rowid(),
        uuid,
        email,
        display_name,
    })
}

fn duplicate_email() -> AppError {
    AppError::bad_request("An account with this email already exists.")
}

pub async fn authenticate_user(
    state: &AppState,
    email: &str,
    password: &str,
) -> Result<AuthenticatedUser, AppError> {
    let email = normalize_email(email)?;
    let user = find_user_by_email(state, &email)
        .await?
        .ok_or(AppError::Unauthorized)?;

    if !verify_password(password, &user.password_hash).await? {
        debug!(uuid = %user.uuid, "password mismatch");
        return Err(AppError::Unauthorized);
    }

    sqlx::query("UPDATE users SET last_login_at = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(user.id)
        .execute(&state.db)
        .await?;

    Ok(user.into())
}

pub async fn create_session(state: &AppState, user_id: i64) -> Result<String, AppError> {
    let id = Uuid::new_v4().simple().to_string();
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO sessions (id, user_id, created_at, last_seen_at, expires_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(user_id)
    .bind(now)
    .bind(now)
    .bind(now + state.config.session_ttl)
    .execute(&state.db)
    .await?;
    Ok(id)
}

/// Looks up a live session; expired ones are removed on the way.
pub async fn resolve_session(
    state: &AppState,
    session_id: &str,
) -> Result<Option<AuthenticatedUser>, AppError> {
    let session = sqlx::query_as::<_, Session>(
        "SELECT id, user_id, created_at, last_seen_at, expires_at FROM sessions WHERE id = ?",
    )
    .bind(session_id)
    .fetch_optional(&state.db)
    .await?;

    let Some(session) = session else {
        return Ok(None);
    };

    let now = Utc::now();
    if session.is_expired(now) {
        debug!(user_id = session.user_id, "session expired");
        destroy_session(state, &session.id).await?;
        return Ok(None);
    }

    sqlx::query("UPDATE sessions SET last_seen_at = ? WHERE id = ?")
        .bind(now)
        .bind(&session.id)
        .execute(&state.db)
        .await?;

    Ok(find_user_by_id(state, session.user_id)
        .await?
        .map(AuthenticatedUser::from))
}

pub async fn destroy_session(state: &AppState, session_id: &str) -> Result<(), AppError> {
    sqlx::query("DELETE FROM sessions WHERE id = ?")
        .bind(session_id)
        .execute(&state.db)
        .await?;
    Ok(())
}

pub fn apply_session_cookie(jar: PrivateCookieJar, session_id: &str) -> PrivateCookieJar {
    jar.add(
        Cookie::build((SESSION_COOKIE, session_id.to_string()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax),
    )
}

pub fn clear_session_cookie(jar: PrivateCookieJar) -> PrivateCookieJar {
    jar.remove(Cookie::build(SESSION_COOKIE).path("/"))
}

/// Removes the account with its sessions, reset tokens and stored documents.
pub async fn delete_account(state: &AppState, user: &AuthenticatedUser) -> Result<(), AppError> {
    let mut tx = state.db.begin().await?;
    sqlx::query("DELETE FROM sessions WHERE user_id = ?")
        .bind(user.id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM password_resets WHERE user_id = ?")
        .bind(user.id)
        .execute(&mut *tx)
        .await?;
    let deleted = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(user.id)
        .execute(&mut *tx)
        .await?;
    if deleted.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }
    tx.commit().await?;

    state.storage.remove_user_data(&user.uuid).await?;
    info!(uuid = %user.uuid, "account deleted");
    Ok(())
}

/// Sends a reset link when the account exists; unknown emails succeed silently.
pub async fn request_password_reset(state: &AppState, email: &str) -> Result<(), AppError> {
    let email = normalize_email(email)?;
    let Some(user) = find_user_by_email(state, &email).await? else {
        debug!("password reset for unknown email ignored");
        return Ok(());
    };

    let token = Uuid::new_v4().simple().to_string();
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO password_resets (token_hash, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)",
    )
    .bind(hash_token(&token))
    .bind(user.id)
    .bind(now)
    .bind(now + state.config.reset_token_ttl)
    .execute(&state.db)
    .await?;

    let link = state
        .config
        .public_link(&format!("/password-reset/{token}"))?;
    state.mailer.send_password_reset(&user.email, &link).await?;
    Ok(())
}

async fn find_reset(state: &AppState, token: &str) -> Result<Option<PasswordReset>, AppError> {
    let reset = sqlx::query_as::<_, PasswordReset>(
        "SELECT token_hash, user_id, created_at, expires_at, used_at FROM password_resets WHERE token_hash = ?",
    )
    .bind(hash_token(token))
    .fetch_optional(&state.db)
    .await?;
    Ok(reset.filter(|reset| reset.is_usable(Utc::now())))
}

pub async fn reset_token_is_valid(state: &AppState, token: &str) -> Result<bool, AppError> {
    Ok(find_reset(state, token).await?.is_some())
}

fn spent_reset_link() -> AppError {
    AppError::bad_request("This reset link is invalid or has expired.")
}

/// Sets a new password from a reset link and signs the account out everywhere.
/// The token is claimed inside the transaction, so a link works at most once.
pub async fn reset_password(
    state: &AppState,
    token: &str,
    new_password: &str,
) -> Result<(), AppError> {
    validate_password(new_password)?;
    let reset = find_reset(state, token).await?.ok_or_else(spent_reset_link)?;
    let password_hash = hash_password(new_password).await?;

    let mut tx = state.db.begin().await?;
    let now = Utc::now();
    let claimed = sqlx::query(
        "UPDATE password_resets SET used_at = ? WHERE token_hash = ? AND used_at IS NULL AND expires_at > ?",
    )
    .bind(now)
    .bind(&reset.token_hash)
    .bind(now)
    .execute(&mut *tx)
    .await?;
    if claimed.rows_affected() != 1 {
        debug!(user_id = reset.user_id, "reset link already claimed");
        return Err(spent_reset_link());
    }

    sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
        .bind(&password_hash)
        .bind(reset.user_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM sessions WHERE user_id = ?")
        .bind(reset.user_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    info!(user_id = reset.user_id, "password reset completed");
    Ok(())
}
