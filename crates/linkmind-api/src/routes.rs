//! API route handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Value, json};

use linkmind_core::{Bookmark, BookmarkRepo, LinkMindError, ReminderInterval, policy};

use super::server::AppState;

type ApiResult = Result<Json<Value>, (StatusCode, Json<Value>)>;

/// Map a core error to an HTTP response. A store failure is a 503 so the
/// CRUD caller knows its mutation is NOT reminder-scheduled yet.
fn error_response(e: LinkMindError) -> (StatusCode, Json<Value>) {
    let status = match &e {
        LinkMindError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
        LinkMindError::NotFound(_) => StatusCode::NOT_FOUND,
        LinkMindError::StaleClaim => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({"ok": false, "error": e.to_string()})))
}

fn not_found(what: &str) -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"ok": false, "error": format!("{what} not found")})),
    )
}

/// Health check endpoint.
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "linkmind",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// System information endpoint.
pub async fn system_info(State(state): State<Arc<AppState>>) -> Json<Value> {
    let scheduler = &state.config.scheduler;
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.start_time.elapsed().as_secs(),
        "scheduler": {
            "dispatch_interval_secs": scheduler.dispatch_interval_secs,
            "sweep_interval_secs": scheduler.sweep_interval_secs,
            "digest_interval_secs": scheduler.digest_interval_secs,
            "max_attempts": scheduler.max_attempts,
            "claim_timeout_secs": scheduler.claim_timeout_secs,
        },
    }))
}

/// A bookmark snapshot pushed by the CRUD layer on create.
#[derive(Debug, Deserialize)]
pub struct BookmarkCreatedEvent {
    pub id: String,
    pub user_id: String,
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub reminder_interval: Option<String>,
    /// Omitted = computed here from the interval.
    #[serde(default)]
    pub next_reminder_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_read: bool,
}

pub async fn bookmark_created(
    State(state): State<Arc<AppState>>,
    Json(event): Json<BookmarkCreatedEvent>,
) -> ApiResult {
    let now = state.clock.now();
    let interval = ReminderInterval::parse(event.reminder_interval.as_deref().unwrap_or_default());
    let next_reminder_at = event
        .next_reminder_at
        .unwrap_or_else(|| policy::next_due(now, interval));

    let bookmark = Bookmark {
        id: event.id,
        user_id: event.user_id,
        url: event.url,
        title: event.title,
        reminder_interval: interval,
        next_reminder_at,
        is_read: event.is_read,
        created_at: now,
    };

    state
        .bookmarks
        .upsert_bookmark(&bookmark, now)
        .map_err(error_response)?;
    state
        .gateway
        .on_bookmark_created(&bookmark)
        .map_err(error_response)?;

    Ok(Json(json!({
        "ok": true,
        "bookmark_id": bookmark.id,
        "next_reminder_at": bookmark.next_reminder_at,
        "scheduled": !bookmark.is_read,
    })))
}

#[derive(Debug, Deserialize)]
pub struct BookmarkRef {
    pub bookmark_id: String,
}

pub async fn bookmark_read(
    State(state): State<Arc<AppState>>,
    Json(event): Json<BookmarkRef>,
) -> ApiResult {
    let now = state.clock.now();
    let known = state
        .bookmarks
        .set_read(&event.bookmark_id, now)
        .map_err(error_response)?;
    // Cancel regardless — idempotent, and the mirror may lag the store.
    state
        .gateway
        .on_bookmark_marked_read(&event.bookmark_id)
        .map_err(error_response)?;

    if !known {
        return Err(not_found("bookmark"));
    }
    Ok(Json(json!({"ok": true, "bookmark_id": event.bookmark_id})))
}

#[derive(Debug, Deserialize)]
pub struct IntervalEvent {
    pub bookmark_id: String,
    /// Omitted = keep the bookmark's current interval.
    #[serde(default)]
    pub reminder_interval: Option<String>,
}

pub async fn bookmark_unread(
    State(state): State<Arc<AppState>>,
    Json(event): Json<IntervalEvent>,
) -> ApiResult {
    let now = state.clock.now();
    let Some(bookmark) = state
        .bookmarks
        .get(&event.bookmark_id)
        .await
        .map_err(error_response)?
    else {
        return Err(not_found("bookmark"));
    };

    let interval = event
        .reminder_interval
        .as_deref()
        .map(ReminderInterval::parse)
        .unwrap_or(bookmark.reminder_interval);

    let due = state
        .gateway
        .on_bookmark_marked_unread(&bookmark.id, &bookmark.user_id, interval)
        .map_err(error_response)?;
    state
        .bookmarks
        .set_interval(&bookmark.id, interval, due, now)
        .map_err(error_response)?;
    state
        .bookmarks
        .set_unread(&bookmark.id, due, now)
        .map_err(error_response)?;

    Ok(Json(json!({
        "ok": true,
        "bookmark_id": bookmark.id,
        "reminder_interval": interval.as_str(),
        "next_reminder_at": due,
    })))
}

pub async fn interval_changed(
    State(state): State<Arc<AppState>>,
    Json(event): Json<IntervalEvent>,
) -> ApiResult {
    let now = state.clock.now();
    let Some(bookmark) = state
        .bookmarks
        .get(&event.bookmark_id)
        .await
        .map_err(error_response)?
    else {
        return Err(not_found("bookmark"));
    };

    let interval = event
        .reminder_interval
        .as_deref()
        .map(ReminderInterval::parse)
        .unwrap_or(bookmark.reminder_interval);

    let due = state
        .gateway
        .on_interval_changed(&bookmark.id, &bookmark.user_id, interval)
        .map_err(error_response)?;
    state
        .bookmarks
        .set_interval(&bookmark.id, interval, due, now)
        .map_err(error_response)?;

    Ok(Json(json!({
        "ok": true,
        "bookmark_id": bookmark.id,
        "reminder_interval": interval.as_str(),
        "next_reminder_at": due,
    })))
}

pub async fn bookmark_deleted(
    State(state): State<Arc<AppState>>,
    Json(event): Json<BookmarkRef>,
) -> ApiResult {
    state
        .gateway
        .on_bookmark_deleted(&event.bookmark_id)
        .map_err(error_response)?;
    let existed = state
        .bookmarks
        .remove(&event.bookmark_id)
        .map_err(error_response)?;

    Ok(Json(json!({
        "ok": true,
        "bookmark_id": event.bookmark_id,
        "existed": existed,
    })))
}

/// Manual dispatch pass — for testing and operations.
pub async fn dispatch_now(State(state): State<Arc<AppState>>) -> ApiResult {
    let stats = state.worker.run_once().await.map_err(error_response)?;
    Ok(Json(json!({"ok": true, "stats": stats})))
}

/// Reminder status for one bookmark — backs the UI's
/// "pending / delivered / failed" indicator.
pub async fn reminder_status(
    State(state): State<Arc<AppState>>,
    Path(bookmark_id): Path<String>,
) -> ApiResult {
    let Some(task) = state.store.status(&bookmark_id).map_err(error_response)? else {
        return Err(not_found("reminder"));
    };

    Ok(Json(json!({
        "ok": true,
        "bookmark_id": task.bookmark_id,
        "state": task.state.as_str(),
        "due_at": task.due_at,
        "attempt": task.attempt,
        "last_error": task.last_error,
        "updated_at": task.updated_at,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use linkmind_core::{Clock, ManualClock, config::LinkMindConfig};
    use linkmind_scheduler::{DispatchWorker, LogSender, SchedulingGateway};
    use linkmind_store::{SqliteBookmarkRepo, TaskStore};

    fn state() -> (Arc<AppState>, Arc<ManualClock>) {
        let config = LinkMindConfig::default();
        let store = Arc::new(TaskStore::open_in_memory().unwrap());
        let bookmarks = Arc::new(SqliteBookmarkRepo::open_in_memory().unwrap());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let gateway = Arc::new(SchedulingGateway::new(store.clone(), clock.clone()));
        let worker = Arc::new(DispatchWorker::new(
            store.clone(),
            bookmarks.clone(),
            Arc::new(LogSender),
            clock.clone(),
            &config.scheduler,
        ));
        let state = Arc::new(AppState {
            config,
            store,
            bookmarks,
            gateway,
            worker,
            clock: clock.clone(),
            start_time: std::time::Instant::now(),
        });
        (state, clock)
    }

    fn created_event(id: &str, interval: &str) -> BookmarkCreatedEvent {
        BookmarkCreatedEvent {
            id: id.into(),
            user_id: "u1".into(),
            url: format!("https://example.com/{id}"),
            title: Some("An Article".into()),
            reminder_interval: Some(interval.into()),
            next_reminder_at: None,
            is_read: false,
        }
    }

    #[tokio::test]
    async fn created_event_schedules_and_reports_status() {
        let (state, clock) = state();
        let body = bookmark_created(State(state.clone()), Json(created_event("b1", "1d")))
            .await
            .unwrap();
        assert_eq!(body.0["ok"], true);
        assert_eq!(body.0["scheduled"], true);

        let status = reminder_status(State(state.clone()), Path("b1".into()))
            .await
            .unwrap();
        assert_eq!(status.0["state"], "scheduled");
        let due: DateTime<Utc> = serde_json::from_value(status.0["due_at"].clone()).unwrap();
        assert_eq!(due, clock.now() + Duration::days(1));
    }

    #[tokio::test]
    async fn read_event_cancels_and_unread_reschedules() {
        let (state, clock) = state();
        bookmark_created(State(state.clone()), Json(created_event("b1", "1d")))
            .await
            .unwrap();

        bookmark_read(
            State(state.clone()),
            Json(BookmarkRef {
                bookmark_id: "b1".into(),
            }),
        )
        .await
        .unwrap();
        let status = reminder_status(State(state.clone()), Path("b1".into()))
            .await
            .unwrap();
        assert_eq!(status.0["state"], "cancelled");

        let body = bookmark_unread(
            State(state.clone()),
            Json(IntervalEvent {
                bookmark_id: "b1".into(),
                reminder_interval: Some("1w".into()),
            }),
        )
        .await
        .unwrap();
        let due: DateTime<Utc> =
            serde_json::from_value(body.0["next_reminder_at"].clone()).unwrap();
        assert_eq!(due, clock.now() + Duration::weeks(1));

        let status = reminder_status(State(state.clone()), Path("b1".into()))
            .await
            .unwrap();
        assert_eq!(status.0["state"], "scheduled");
    }

    #[tokio::test]
    async fn unknown_bookmark_is_404() {
        let (state, _clock) = state();
        let err = reminder_status(State(state.clone()), Path("missing".into()))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::NOT_FOUND);

        let err = bookmark_unread(
            State(state.clone()),
            Json(IntervalEvent {
                bookmark_id: "missing".into(),
                reminder_interval: None,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn dispatch_now_runs_a_worker_pass() {
        let (state, clock) = state();
        bookmark_created(State(state.clone()), Json(created_event("b1", "3s")))
            .await
            .unwrap();

        clock.advance(Duration::seconds(3));
        let body = dispatch_now(State(state.clone())).await.unwrap();
        assert_eq!(body.0["stats"]["claimed"], 1);
        assert_eq!(body.0["stats"]["delivered"], 1);

        let status = reminder_status(State(state.clone()), Path("b1".into()))
            .await
            .unwrap();
        assert_eq!(status.0["state"], "delivered");
    }

    #[tokio::test]
    async fn delete_event_is_idempotent() {
        let (state, _clock) = state();
        bookmark_created(State(state.clone()), Json(created_event("b1", "1d")))
            .await
            .unwrap();

        let body = bookmark_deleted(
            State(state.clone()),
            Json(BookmarkRef {
                bookmark_id: "b1".into(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(body.0["existed"], true);

        let body = bookmark_deleted(
            State(state.clone()),
            Json(BookmarkRef {
                bookmark_id: "b1".into(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(body.0["existed"], false);
    }
}
