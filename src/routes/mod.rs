pub mod public;
pub mod summaries;
pub mod trips;
pub mod user;

use axum::Router;
use serde::Deserialize;
use tower::ServiceBuilder;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(public::router())
        .nest(
            "/me",
            user::router()
                .merge(trips::router())
                .merge(summaries::router()),
        )
        .nest_service("/static", ServeDir::new("static"))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

/// One-shot message carried in the `notice` query parameter after a redirect.
#[derive(Debug, Default, Deserialize)]
pub struct NoticeQuery {
    pub notice: Option<String>,
}

impl NoticeQuery {
    pub fn message(&self) -> String {
        notice_message(self.notice.as_deref())
            .unwrap_or_default()
            .to_string()
    }
}

pub fn notice_message(code: Option<&str>) -> Option<&'static str> {
    let text = match code? {
        "trip-added" => "Trip added successfully!",
        "trip-updated" => "Trip updated successfully!",
        "trip-deleted" => "Trip deleted.",
        "summary-saved" => "Summary updated successfully",
        "summary-deleted" => "Summary deleted.",
        "reset-sent" => "If an account exists for that address, a reset link is on its way.",
        "password-changed" => "Password changed. Please sign in again.",
        "account-deleted" => "Your account has been deleted.",
        "signed-out" => "You have been signed out.",
        "sign-in-required" => "Please sign in to continue.",
        _ => return None,
    };
    Some(text)
}

pub(crate) fn normalize_optional(input: Option<String>) -> Option<String> {
    input.and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_notice_codes_render_nothing() {
        assert_eq!(notice_message(None), None);
        assert_eq!(notice_message(Some("<script>")), None);
        assert_eq!(
            notice_message(Some("trip-added")),
            Some("Trip added successfully!")
        );
    }

    #[test]
    fn optional_inputs_are_trimmed() {
        assert_eq!(normalize_optional(Some("  ".into())), None);
        assert_eq!(normalize_optional(Some(" Goa ".into())), Some("Goa".into()));
        assert_eq!(normalize_optional(None), None);
    }
}
