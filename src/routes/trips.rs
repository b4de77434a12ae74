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
use serde_with::{serde_as, NoneAsEmptyString};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::{
    auth::CurrentUser,
    collection::{select_trips, SortDirection},
    error::AppError,
    models::trip::{Trip, TripDraft},
    routes::notice_message,
    services::snapshots::Snapshot,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/trips", get(trips_list))
        .route("/trips/live", get(trips_live))
        .route("/trips/new", get(trip_new_form).post(trip_new_submit))
        .route(
            "/trips/:id/edit",
            get(trip_edit_form).post(trip_edit_submit),
        )
        .route("/trips/:id/delete", post(trip_delete))
}

#[serde_as]
#[derive(Debug, Default, Deserialize)]
struct TripListQuery {
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    q: Option<String>,
    #[serde(default)]
    sort: SortDirection,
    notice: Option<String>,
}

impl TripListQuery {
    fn search(&self) -> &str {
        self.q.as_deref().unwrap_or("")
    }
}

struct TripRow {
    id: String,
    title: String,
    description: String,
    date: String,
    location: String,
}

impl From<Trip> for TripRow {
    fn from(trip: Trip) -> Self {
        let location = trip.location_display().to_string();
        Self {
            id: trip.id,
            title: trip.title,
            description: trip.description,
            date: trip.date,
            location,
        }
    }
}

#[derive(Template)]
#[template(path = "user/trips_list.html")]
struct TripsListTemplate {
    trips: Vec<TripRow>,
    query: String,
    sort: &'static str,
    sort_label: &'static str,
    descending: bool,
    notice: String,
}

async fn trips_list(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(query): Query<TripListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let user = current.require_user()?;
    let all = state.storage.load_user_trips(&user.uuid).await?;
    let selected = select_trips(&all, query.search(), query.sort);

    Ok(AskamaTemplateResponse::into_response(TripsListTemplate {
        trips: selected.into_iter().map(TripRow::from).collect(),
        query: query.search().to_string(),
        sort: query.sort.as_str(),
        sort_label: query.sort.label(),
        descending: query.sort == SortDirection::Descending,
        notice: notice_message(query.notice.as_deref())
            .unwrap_or_default()
            .to_string(),
    }))
}

/// Streams the selected list once on connect and again after every change.
/// Only the newest snapshot is kept for a slow client. The listener is released
/// when the client goes away and the stream is dropped.
async fn trips_live(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(query): Query<TripListQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, AppError> {
    let user = current.require_user()?;
    let (tx, rx) = watch::channel(Vec::<Trip>::new());
    let subscription = state
        .storage
        .subscribe_trips(&user.uuid, move |snapshot| {
            if let Snapshot::Trips(trips) = snapshot {
                tx.send_replace(trips.clone());
            }
        })
        .await?;
    debug!(path = %subscription.path(), "live trip list opened");

    let search = query.search().to_string();
    let direction = query.sort;
    let events = stream::unfold((subscription, rx), move |(subscription, mut rx)| {
        let search = search.clone();
        async move {
            rx.changed().await.ok()?;
            let trips = rx.borrow_and_update().clone();
            let selected = select_trips(&trips, &search, direction);
            let event = Event::default().event("trips").json_data(&selected);
            Some((event, (subscription, rx)))
        }
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

#[derive(Template)]
#[template(path = "user/trip_form.html")]
struct TripFormTemplate {
    heading: &'static str,
    action: String,
    submit_label: &'static str,
    title: String,
    description: String,
    date: String,
    location: String,
    show_error: bool,
    error_message: String,
}

impl TripFormTemplate {
    fn new_trip(draft: TripDraft) -> Self {
        Self::with_draft("Add New Trip", "/me/trips/new".into(), "Add Trip", draft)
    }

    fn edit_trip(trip_id: &str, draft: TripDraft) -> Self {
        Self::with_draft(
            "Edit Trip",
            format!("/me/trips/{trip_id}/edit"),
            "Save Changes",
            draft,
        )
    }

    fn with_draft(
        heading: &'static str,
        action: String,
        submit_label: &'static str,
        draft: TripDraft,
    ) -> Self {
        Self {
            heading,
            action,
            submit_label,
            title: draft.title,
            description: draft.description,
            date: draft.date,
            location: draft.location,
            show_error: false,
            error_message: String::new(),
        }
    }

    fn with_error(mut self, message: String) -> Response {
        self.show_error = true;
        self.error_message = message;
        (
            StatusCode::BAD_REQUEST,
            AskamaTemplateResponse::into_response(self),
        )
            .into_response()
    }
}

async fn trip_new_form(current: CurrentUser) -> Result<impl IntoResponse, AppError> {
    current.require_user()?;
    Ok(AskamaTemplateResponse::into_response(
        TripFormTemplate::new_trip(TripDraft::default()),
    ))
}

async fn trip_new_submit(
    State(state): State<AppState>,
    current: CurrentUser,
    Form(form): Form<TripDraft>,
) -> Result<Response, AppError> {
    let user = current.require_user()?;
    let draft = match form.clone().validate() {
        Ok(draft) => draft,
        Err(AppError::BadRequest(msg)) => {
            return Ok(TripFormTemplate::new_trip(form).with_error(msg));
        }
        Err(err) => return Err(err),
    };

    match state.storage.insert_trip(Trip::new(&user.uuid, draft)).await {
        Ok(saved) => {
            info!(trip_id = %saved.id, "trip added");
            Ok(Redirect::to("/me/trips?notice=trip-added").into_response())
        }
        Err(AppError::BadRequest(msg)) => Ok(TripFormTemplate::new_trip(form)
            .with_error(format!("Failed to add trip: {msg}"))),
        Err(err) => Err(err),
    }
}

async fn trip_edit_form(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(trip_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let user = current.require_user()?;
    let trip = state.storage.find_trip(&user.uuid, &trip_id).await?;
    Ok(AskamaTemplateResponse::into_response(
        TripFormTemplate::edit_trip(&trip.id, TripDraft::from_trip(&trip)),
    ))
}

async fn trip_edit_submit(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(trip_id): Path<String>,
    Form(form): Form<TripDraft>,
) -> Result<Response, AppError> {
    let user = current.require_user()?;
    let mut trip = state.storage.find_trip(&user.uuid, &trip_id).await?;
    let draft = match form.clone().validate() {
        Ok(draft) => draft,
        Err(AppError::BadRequest(msg)) => {
            return Ok(TripFormTemplate::edit_trip(&trip_id, form).with_error(msg));
        }
        Err(err) => return Err(err),
    };

    trip.apply(draft);
    let saved = state.storage.update_trip(trip).await?;
    info!(trip_id = %saved.id, "trip updated");
    Ok(Redirect::to("/me/trips?notice=trip-updated").into_response())
}

async fn trip_delete(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(trip_id): Path<String>,
) -> Result<Redirect, AppError> {
    let user = current.require_user()?;
    let removed = state.storage.delete_trip(&user.uuid, &trip_id).await?;
    info!(trip_id = %removed.id, "trip deleted");
    Ok(Redirect::to("/me/trips?notice=trip-deleted"))
}
