use axum::{
    extract::{Path, State},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    Extension,
};
use chrono::{DateTime, Utc};
use futures::stream::{self, Stream};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use crate::{
    metrics::SSE_CONNECTIONS_ACTIVE,
    middlewares::auth::JwtClaims,
    models::timer::{CountdownEvent, CountdownExpired, CountdownTick},
    services::{session_service::SessionService, AppState},
};

use super::{parse_object_id, principal_from, ApiError};

/// GET /api/v1/quiz/sessions/{id}/stream
///
/// One-second countdown ticks derived from the stored deadline, closing
/// with a single countdown-expired event. The stream is presentation
/// only; the authoritative timeout is enforced server-side by the
/// expiry sweeper.
pub async fn session_stream(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = principal_from(&claims)?;
    let session_oid = parse_object_id(&session_id, "session id")?;

    let session_service = SessionService::new(state.mongo.clone(), state.redis.clone());
    let session = session_service
        .get_session(&session_oid)
        .await
        .map_err(|_| ApiError::not_found("Session not found"))?;

    if session.student_id != principal.id {
        return Err(ApiError::not_found("Session not found"));
    }

    let deadline = session
        .deadline()
        .ok_or_else(|| ApiError::conflict("Session has not been started"))?;

    let tick_interval = tick_interval_ms();
    tracing::info!(
        "Countdown stream opened: session={} deadline={} tick_interval={}ms",
        session_id,
        deadline,
        tick_interval
    );
    SSE_CONNECTIONS_ACTIVE.inc();

    let stream = countdown_stream(session_id, deadline, tick_interval);

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn tick_interval_ms() -> u64 {
    std::env::var("SSE_TICK_INTERVAL_MS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(1000)
}

/// Tick once per interval until the deadline, then emit the final
/// expired event and end the stream.
fn countdown_stream(
    session_id: String,
    deadline: DateTime<Utc>,
    tick_interval_ms: u64,
) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold(
        (session_id, false),
        move |(sid, final_sent)| async move {
            if final_sent {
                SSE_CONNECTIONS_ACTIVE.dec();
                return None;
            }

            let now = Utc::now();
            let remaining = (deadline - now).num_seconds();

            if remaining <= 0 {
                let expired_event = CountdownEvent::CountdownExpired(CountdownExpired {
                    session_id: sid.clone(),
                    deadline,
                    timestamp: now,
                });

                let event = Event::default()
                    .event(expired_event.event_name())
                    .data(expired_event.to_sse_data());

                tracing::info!("Countdown expired: session={}", sid);
                return Some((Ok(event), (sid, true)));
            }

            let tick_event = CountdownEvent::CountdownTick(CountdownTick {
                session_id: sid.clone(),
                remaining_seconds: remaining,
                deadline,
                timestamp: now,
            });

            let event = Event::default()
                .event(tick_event.event_name())
                .data(tick_event.to_sse_data());

            sleep(Duration::from_millis(tick_interval_ms)).await;

            Some((Ok(event), (sid, false)))
        },
    )
}
