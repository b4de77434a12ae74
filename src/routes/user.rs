use askama::Template;
use askama_axum::IntoResponse as AskamaTemplateResponse;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use axum_extra::extract::cookie::PrivateCookieJar;
use chrono::{Datelike, Local, NaiveDate};
use serde::Deserialize;

use crate::{
    auth::{self, AuthenticatedUser, CurrentUser},
    collection::{next_trip, parse_month_key, summarize_year, CalendarMonth},
    error::AppError,
    models::trip::Trip,
    routes::NoticeQuery,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(dashboard))
        .route("/settings", get(settings_page))
        .route("/settings/password-reset", post(settings_password_reset))
        .route("/settings/delete", post(settings_delete_account))
}

struct CalendarCell {
    label: String,
    class: &'static str,
}

#[derive(Template)]
#[template(path = "user/dashboard.html")]
struct DashboardTemplate {
    greeting: String,
    trip_count: usize,
    has_next_trip: bool,
    next_trip_title: String,
    next_trip_date: String,
    month_label: String,
    prev_month: String,
    next_month: String,
    cells: Vec<CalendarCell>,
    year: String,
    year_count: usize,
    most_visited: String,
    year_summary: String,
}

#[derive(Debug, Default, Deserialize)]
struct DashboardQuery {
    month: Option<String>,
}

async fn dashboard(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(query): Query<DashboardQuery>,
) -> Result<impl IntoResponse, AppError> {
    let user = current.require_user()?;
    let trips = state.storage.load_user_trips(&user.uuid).await?;

    let today = Local::now().date_naive();
    let shown = query
        .month
        .as_deref()
        .and_then(parse_month_key)
        .unwrap_or(today);
    let calendar = build_calendar(shown, today, &trips)?;

    let year = today.year().to_string();
    let stats = summarize_year(&trips, &year);
    let year_summary = state
        .storage
        .load_summary(&user.uuid, &year)
        .await?
        .unwrap_or_default();
    let next = next_trip(&trips);

    let mut cells: Vec<CalendarCell> = (0..calendar.leading_blanks)
        .map(|_| CalendarCell {
            label: String::new(),
            class: "blank",
        })
        .collect();
    cells.extend(calendar.days.iter().map(|day| CalendarCell {
        label: day.day.to_string(),
        class: match (day.has_trip, day.is_today) {
            (true, _) => "trip",
            (false, true) => "today",
            (false, false) => "day",
        },
    }));

    Ok(AskamaTemplateResponse::into_response(DashboardTemplate {
        greeting: user.greeting_name().to_string(),
        trip_count: trips.len(),
        has_next_trip: next.is_some(),
        next_trip_title: next.map(|t| t.title.clone()).unwrap_or_default(),
        next_trip_date: next.map(|t| t.date.clone()).unwrap_or_default(),
        month_label: calendar.label,
        prev_month: calendar.prev_key,
        next_month: calendar.next_key,
        cells,
        year: stats.year,
        year_count: stats.count,
        most_visited: stats.most_visited,
        year_summary,
    }))
}

fn build_calendar(
    shown: NaiveDate,
    today: NaiveDate,
    trips: &[Trip],
) -> Result<CalendarMonth, AppError> {
    CalendarMonth::build(shown.year(), shown.month(), today, trips)
        .ok_or_else(|| AppError::bad_request("That month cannot be shown."))
}

#[derive(Template)]
#[template(path = "user/settings.html")]
struct SettingsTemplate {
    email: String,
    display_name: String,
    notice: String,
    show_error: bool,
    error_message: String,
    version: &'static str,
}

fn settings_template(user: &AuthenticatedUser, notice: String) -> SettingsTemplate {
    SettingsTemplate {
        email: user.email.clone(),
        display_name: user.display_name.clone(),
        notice,
        show_error: false,
        error_message: String::new(),
        version: env!("CARGO_PKG_VERSION"),
    }
}

async fn settings_page(
    current: CurrentUser,
    Query(notice): Query<NoticeQuery>,
) -> Result<impl IntoResponse, AppError> {
    let user = current.require_user()?;
    Ok(AskamaTemplateResponse::into_response(settings_template(
        user,
        notice.message(),
    )))
}

async fn settings_password_reset(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Redirect, AppError> {
    let user = current.require_user()?;
    auth::request_password_reset(&state, &user.email).await?;
    Ok(Redirect::to("/me/settings?notice=reset-sent"))
}

#[derive(Deserialize)]
struct DeleteAccountForm {
    confirm: Option<String>,
}

async fn settings_delete_account(
    State(state): State<AppState>,
    current: CurrentUser,
    jar: PrivateCookieJar,
    Form(form): Form<DeleteAccountForm>,
) -> Result<Response, AppError> {
    let user = current.require_user()?;
    if form.confirm.is_none() {
        let mut page = settings_template(user, String::new());
        page.show_error = true;
        page.error_message = "Tick the box to confirm that the account should be deleted.".into();
        return Ok((
            StatusCode::BAD_REQUEST,
            AskamaTemplateResponse::into_response(page),
        )
            .into_response());
    }

    auth::delete_account(&state, user).await?;
    Ok((
        auth::clear_session_cookie(jar),
        Redirect::to("/?notice=account-deleted"),
    )
        .into_response())
}
