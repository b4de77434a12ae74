use askama::Template;
use askama_axum::IntoResponse as AskamaTemplateResponse;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use axum_extra::extract::cookie::PrivateCookieJar;
use serde::Deserialize;
use tracing::info;

use crate::{
    auth::{self, CurrentUser},
    error::AppError,
    routes::{normalize_optional, NoticeQuery},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(landing))
        .route("/login", get(login_form).post(login_submit))
        .route("/register", get(register_form).post(register_submit))
        .route("/logout", post(logout))
        .route(
            "/password-reset",
            get(reset_request_form).post(reset_request_submit),
        )
        .route(
            "/password-reset/:token",
            get(reset_password_form).post(reset_password_submit),
        )
}

#[derive(Template)]
#[template(path = "landing.html")]
struct LandingTemplate {
    logged_in: bool,
    notice: String,
}

async fn landing(current: CurrentUser, Query(notice): Query<NoticeQuery>) -> impl IntoResponse {
    AskamaTemplateResponse::into_response(LandingTemplate {
        logged_in: current.0.is_some(),
        notice: notice.message(),
    })
}

#[derive(Template)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    show_error: bool,
    error_message: String,
    email: String,
    notice: String,
}

async fn login_form(Query(notice): Query<NoticeQuery>) -> impl IntoResponse {
    AskamaTemplateResponse::into_response(LoginTemplate {
        show_error: false,
        error_message: String::new(),
        email: String::new(),
        notice: notice.message(),
    })
}

#[derive(Deserialize)]
struct LoginForm {
    email: String,
    password: String,
}

async fn login_submit(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    match auth::authenticate_user(&state, &form.email, &form.password).await {
        Ok(user) => {
            let session_id = auth::create_session(&state, user.id).await?;
            info!(uuid = %user.uuid, "signed in");
            Ok((
                auth::apply_session_cookie(jar, &session_id),
                Redirect::to("/me"),
            )
                .into_response())
        }
        Err(AppError::Unauthorized) => Ok(render_login_error(
            form.email,
            "Login failed. Please check your email and password.".into(),
        )),
        Err(AppError::BadRequest(msg)) => Ok(render_login_error(form.email, msg)),
        Err(err) => Err(err),
    }
}

fn render_login_error(email: String, message: String) -> Response {
    (
        StatusCode::BAD_REQUEST,
        AskamaTemplateResponse::into_response(LoginTemplate {
            show_error: true,
            error_message: message,
            email,
            notice: String::new(),
        }),
    )
        .into_response()
}

#[derive(Template)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    show_error: bool,
    error_message: String,
    email: String,
    display_name: String,
}

async fn register_form() -> impl IntoResponse {
    AskamaTemplateResponse::into_response(RegisterTemplate {
        show_error: false,
        error_message: String::new(),
        email: String::new(),
        display_name: String::new(),
    })
}

#[derive(Deserialize)]
struct RegisterForm {
    email: String,
    display_name: Option<String>,
    password: String,
    password_confirm: String,
}

async fn register_submit(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Form(form): Form<RegisterForm>,
) -> Result<Response, AppError> {
    let display_name = normalize_optional(form.display_name).unwrap_or_default();
    if form.password != form.password_confirm {
        return Ok(render_register_error(
            form.email,
            display_name,
            "The passwords do not match.".into(),
        ));
    }

    match auth::register_user(&state, &form.email, &form.password, &display_name).await {
        Ok(user) => {
            let session_id = auth::create_session(&state, user.id).await?;
            Ok((
                auth::apply_session_cookie(jar, &session_id),
                Redirect::to("/me"),
            )
                .into_response())
        }
        Err(AppError::BadRequest(msg)) => {
            Ok(render_register_error(form.email, display_name, msg))
        }
        Err(err) => Err(err),
    }
}

fn render_register_error(email: String, display_name: String, message: String) -> Response {
    (
        StatusCode::BAD_REQUEST,
        AskamaTemplateResponse::into_response(RegisterTemplate {
            show_error: true,
            error_message: message,
            email,
            display_name,
        }),
    )
        .into_response()
}

async fn logout(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
) -> Result<(PrivateCookieJar, Redirect), AppError> {
    if let Some(cookie) = jar.get(auth::SESSION_COOKIE) {
        auth::destroy_session(&state, cookie.value()).await?;
    }
    Ok((
        auth::clear_session_cookie(jar),
        Redirect::to("/login?notice=signed-out"),
    ))
}

#[derive(Template)]
#[template(path = "auth/reset_request.html")]
struct ResetRequestTemplate {
    show_error: bool,
    error_message: String,
    email: String,
    sent: bool,
}

async fn reset_request_form() -> impl IntoResponse {
    AskamaTemplateResponse::into_response(ResetRequestTemplate {
        show_error: false,
        error_message: String::new(),
        email: String::new(),
        sent: false,
    })
}

#[derive(Deserialize)]
struct ResetRequestForm {
    email: String,
}

async fn reset_request_submit(
    State(state): State<AppState>,
    Form(form): Form<ResetRequestForm>,
) -> Result<Response, AppError> {
    match auth::request_password_reset(&state, &form.email).await {
        Ok(()) => Ok(AskamaTemplateResponse::into_response(ResetRequestTemplate {
            show_error: false,
            error_message: String::new(),
            email: form.email,
            sent: true,
        })),
        Err(AppError::BadRequest(msg)) => Ok((
            StatusCode::BAD_REQUEST,
            AskamaTemplateResponse::into_response(ResetRequestTemplate {
                show_error: true,
                error_message: msg,
                email: form.email,
                sent: false,
            }),
        )
            .into_response()),
        Err(err) => Err(err),
    }
}

#[derive(Template)]
#[template(path = "auth/reset_password.html")]
struct ResetPasswordTemplate {
    token: String,
    token_valid: bool,
    show_error: bool,
    error_message: String,
}

async fn reset_password_form(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Response, AppError> {
    let token_valid = auth::reset_token_is_valid(&state, &token).await?;
    let status = if token_valid {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    };
    Ok((
        status,
        AskamaTemplateResponse::into_response(ResetPasswordTemplate {
            token,
            token_valid,
            show_error: false,
            error_message: String::new(),
        }),
    )
        .into_response())
}

#[derive(Deserialize)]
struct ResetPasswordForm {
    password: String,
    password_confirm: String,
}

async fn reset_password_submit(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Form(form): Form<ResetPasswordForm>,
) -> Result<Response, AppError> {
    let outcome = if form.password != form.password_confirm {
        Err(AppError::bad_request("The passwords do not match."))
    } else {
        auth::reset_password(&state, &token, &form.password).await
    };

    match outcome {
        Ok(()) => Ok(Redirect::to("/login?notice=password-changed").into_response()),
        Err(AppError::BadRequest(msg)) => Ok((
            StatusCode::BAD_REQUEST,
            AskamaTemplateResponse::into_response(ResetPasswordTemplate {
                token,
                token_valid: true,
                show_error: true,
                error_message: msg,
            }),
        )
            .into_response()),
        Err(err) => Err(err),
    }
}
