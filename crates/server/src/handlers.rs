//! Request handlers for `/api/v1/command`.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use ck_core::runner::RunnerError;
use ck_protocol::{Command, LogRecord, NewCommand, PageQuery, StopResponse};
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::sse;
use crate::state::AppState;

/// `POST /command/new`: record and start a command.
pub async fn new_command(
    State(state): State<AppState>,
    payload: Result<Json<NewCommand>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Command>)> {
    let Json(body) = payload.map_err(|e| ApiError::validation(e.body_text()))?;
    if body.command.trim().is_empty() {
        return Err(ApiError::validation("command must not be empty"));
    }

    let command = state.runner.submit(&body.command).await?;
    Ok((StatusCode::CREATED, Json(command)))
}

pub async fn list_commands(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Vec<Command>>> {
    let (before, limit) = page(&query, state.max_page_size)?;
    Ok(Json(state.store.list_commands(&before, limit).await?))
}

pub async fn get_command(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Command>> {
    Ok(Json(state.store.get_command(&id).await?))
}

/// `POST /command/{id}/stop`.
///
/// A known command that has already finished answers `stopped: false`.
pub async fn stop_command(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<StopResponse>> {
    let stopped = match state.runner.stop(&id).await {
        Ok(stopped) => stopped,
        Err(RunnerError::SessionNotFound(_)) => {
            state.store.get_command(&id).await?;
            false
        }
        Err(e) => return Err(e.into()),
    };
    info!(command_id = %id, stopped, "stop handled");
    Ok(Json(StopResponse { stopped }))
}

pub async fn get_logs(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Vec<LogRecord>>> {
    let (before, limit) = page(&query, state.max_page_size)?;
    Ok(Json(state.store.get_logs(&id, &before, limit).await?))
}

/// `GET /command/stream`: status changes of every command.
pub async fn status_stream(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let (rx, unsubscribe) = state.runner.subscribe_status()?;
    Ok(sse::forward(rx, unsubscribe, "status".to_string()))
}

/// `GET /command/{id}/log/stream`: live log of one running command.
pub async fn log_stream(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let (rx, unsubscribe) = state.runner.subscribe_logs(&id)?;
    Ok(sse::forward(rx, unsubscribe, format!("log:{id}")))
}

/// Validate cursor parameters. `limit` is required and must lie in
/// `0..=max`.
fn page(query: &PageQuery, max: usize) -> ApiResult<(String, usize)> {
    let raw = query
        .limit
        .as_deref()
        .ok_or_else(|| ApiError::validation("missing limit"))?;
    let limit: i64 = raw
        .trim()
        .parse()
        .map_err(|_| ApiError::validation(format!("invalid limit {raw:?}")))?;
    let limit = usize::try_from(limit).map_err(|_| ApiError::validation("negative limit"))?;
    if limit > max {
        return Err(ApiError::validation(format!(
            "limit {limit} exceeds maximum of {max}"
        )));
    }
    Ok((query.before.clone().unwrap_or_default(), limit))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(before: Option<&str>, limit: Option<&str>) -> PageQuery {
        PageQuery {
            before: before.map(str::to_string),
            limit: limit.map(str::to_string),
        }
    }

    #[test]
    fn test_page_accepts_valid_input() {
        assert_eq!(page(&query(None, Some("20")), 50).unwrap(), (String::new(), 20));
        assert_eq!(
            page(&query(Some("abc"), Some("0")), 50).unwrap(),
            ("abc".to_string(), 0)
        );
        assert_eq!(page(&query(None, Some("50")), 50).unwrap().1, 50);
    }

    #[test]
    fn test_page_rejects_bad_limits() {
        for limit in [None, Some("ten"), Some("-1"), Some("51"), Some("")] {
            let err = page(&query(None, limit), 50).unwrap_err();
            assert_eq!(err.status(), StatusCode::BAD_REQUEST, "{limit:?}");
        }
    }
}
