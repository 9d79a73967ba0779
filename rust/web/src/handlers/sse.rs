use crate::errors::IntoErrorResponse;
use crate::events::{EventBus, EventSubscription, GameEvent};
use crate::session::{SessionId, SessionManager};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};
use warp::http;
use warp::reply::{self, Response};
use warp::sse;
use warp::Reply;

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// `GET /api/sessions/{id}/events`: server-sent stream of [`GameEvent`]s.
pub async fn stream_events(
    session_id: SessionId,
    sessions: Arc<SessionManager>,
    event_bus: Arc<EventBus>,
) -> Response {
    if let Err(err) = sessions.get_session(&session_id) {
        return err.into_http_response();
    }

    tracing::debug!(session_id = %session_id, "opening event stream");
    let subscription = event_bus.subscribe(session_id);
    let keep_alive = sse::keep_alive()
        .interval(KEEP_ALIVE_INTERVAL)
        .text(":keep-alive\n");

    let reply = sse::reply(keep_alive.stream(subscription_stream(subscription)));
    reply::with_header(reply, http::header::CACHE_CONTROL, "no-cache").into_response()
}

/// The subscription lives as long as the stream, so the bus forgets the
/// subscriber once the client disconnects.
fn subscription_stream(
    mut subscription: EventSubscription,
) -> impl Stream<Item = Result<sse::Event, Infallible>> {
    let (_, idle) = tokio::sync::mpsc::channel(1);
    let receiver = std::mem::replace(subscription.receiver(), idle);
    let subscription = Arc::new(subscription);

    ReceiverStream::new(receiver).map(move |event| {
        let _held = Arc::clone(&subscription);
        Ok(render_event(event))
    })
}

fn render_event(event: GameEvent) -> sse::Event {
    match serde_json::to_string(&event) {
        Ok(json) => sse::Event::default().event(event.kind()).data(json),
        Err(err) => {
            let fallback = serde_json::json!({
                "type": "error",
                "message": format!("failed to serialize game event: {err}")
            })
            .to_string();
            sse::Event::default().event("error").data(fallback)
        }
    }
}
