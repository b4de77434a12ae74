use askama::Template;
use askama_axum::IntoResponse as AskamaTemplateResponse;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Redirect, Response,
    },
    routing::{get, post},
    Form, Router,
};
use futures::stream::{self, Stream};
use serde::Deserialize;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::{
    auth::CurrentUser,
    collection::{select_trips, summarize_year, SortDirection},
    error::AppError,
    models::summary::{validate_year, SummaryMap, YearSummary},
    routes::{normalize_optional, NoticeQuery},
    services::snapshots::Snapshot,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/summaries", get(summaries_list))
        .route("/summaries/live", get(summaries_live))
        .route("/summaries/open", get(summary_open))
        .route(
            "/summaries/:year/edit",
            get(summary_edit_form).post(summary_edit_submit),
        )
        .route("/summaries/:year/delete", post(summary_delete))
        .route("/years/:year", get(year_overview))
}

#[derive(Template)]
#[template(path = "user/summaries.html")]
struct SummariesTemplate {
    summaries: Vec<YearSummary>,
    notice: String,
}

async fn summaries_list(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(notice): Query<NoticeQuery>,
) -> Result<impl IntoResponse, AppError> {
    let user = current.require_user()?;
    let map = state.storage.load_summaries(&user.uuid).await?;
    Ok(AskamaTemplateResponse::into_response(SummariesTemplate {
        summaries: YearSummary::list_from(map),
        notice: notice.message(),
    }))
}

/// Pushes the full summary list, newest year first, on connect and after each change.
async fn summaries_live(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, AppError> {
    let user = current.require_user()?;
    let (tx, rx) = watch::channel(SummaryMap::new());
    let subscription = state
        .storage
        .subscribe_summaries(&user.uuid, move |snapshot| {
            if let Snapshot::Summaries(map) = snapshot {
                tx.send_replace(map.clone());
            }
        })
        .await?;
    debug!(path = %subscription.path(), "live summaries opened");

    let events = stream::unfold((subscription, rx), |(subscription, mut rx)| async move {
        rx.changed().await.ok()?;
        let summaries = YearSummary::list_from(rx.borrow_and_update().clone());
        let event = Event::default().event("summaries").json_data(&summaries);
        Some((event, (subscription, rx)))
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

#[derive(Deserialize)]
struct OpenYearQuery {
    year: String,
}

async fn summary_open(
    current: CurrentUser,
    Query(query): Query<OpenYearQuery>,
) -> Result<Redirect, AppError> {
    current.require_user()?;
    let year = validate_year(query.year.trim())?;
    Ok(Redirect::to(&format!("/me/summaries/{year}/edit")))
}

#[derive(Template)]
#[template(path = "user/summary_form.html")]
struct SummaryFormTemplate {
    year: String,
    text: String,
    show_error: bool,
    error_message: String,
}

async fn summary_edit_form(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(year): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let user = current.require_user()?;
    validate_year(&year)?;
    let text = state
        .storage
        .load_summary(&user.uuid, &year)
        .await?
        .unwrap_or_default();
    Ok(AskamaTemplateResponse::into_response(SummaryFormTemplate {
        year,
        text,
        show_error: false,
        error_message: String::new(),
    }))
}

#[derive(Deserialize)]
struct SummaryForm {
    text: Option<String>,
}

async fn summary_edit_submit(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(year): Path<String>,
    Form(form): Form<SummaryForm>,
) -> Result<Response, AppError> {
    let user = current.require_user()?;
    validate_year(&year)?;

    let Some(text) = normalize_optional(form.text) else {
        return Ok((
            StatusCode::BAD_REQUEST,
            AskamaTemplateResponse::into_response(SummaryFormTemplate {
                year,
                text: String::new(),
                show_error: true,
                error_message: "Failed to update summary: it cannot be empty.".into(),
            }),
        )
            .into_response());
    };

    state.storage.set_summary(&user.uuid, &year, &text).await?;
    info!(%year, "summary saved");
    Ok(Redirect::to("/me/summaries?notice=summary-saved").into_response())
}

async fn summary_delete(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(year): Path<String>,
) -> Result<Redirect, AppError> {
    let user = current.require_user()?;
    validate_year(&year)?;
    state.storage.delete_summary(&user.uuid, &year).await?;
    info!(%year, "summary deleted");
    Ok(Redirect::to("/me/summaries?notice=summary-deleted"))
}

struct YearTripRow {
    title: String,
    date: String,
    location: String,
}

#[derive(Template)]
#[template(path = "user/year.html")]
struct YearTemplate {
    year: String,
    count: usize,
    most_visited: String,
    has_summary: bool,
    summary: String,
    trips: Vec<YearTripRow>,
}

async fn year_overview(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(year): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let user = current.require_user()?;
    validate_year(&year)?;

    let all = state.storage.load_user_trips(&user.uuid).await?;
    let stats = summarize_year(&all, &year);
    let summary = state.storage.load_summary(&user.uuid, &year).await?;
    let trips = select_trips(&all, "", SortDirection::Ascending)
        .into_iter()
        .filter(|trip| trip.year() == year)
        .map(|trip| YearTripRow {
            location: trip.location_display().to_string(),
            title: trip.title,
            date: trip.date,
        })
        .collect();

    Ok(AskamaTemplateResponse::into_response(YearTemplate {
        year: stats.year,
        count: stats.count,
        most_visited: stats.most_visited,
        has_summary: summary.is_some(),
        summary: summary.unwrap_or_default(),
        trips,
    }))
}
