//! Server-sent change event stream, one subscription per tenant.
//!
//! Clients fold the stream into a `LiveView` instead of patching arrays ad
//! hoc. Lagging subscribers lose old events (broadcast semantics) and should
//! re-fetch.

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::{wrappers::errors::BroadcastStreamRecvError, wrappers::BroadcastStream, StreamExt};

use crate::{middleware::TenantContext, AppState};

pub async fn subscribe(
    State(state): State<AppState>,
    tenant: TenantContext,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let tenant_id = tenant.tenant_id;
    let receiver = state.events.subscribe();

    tracing::info!(tenant_id = %tenant_id, "Event stream opened");

    let stream = BroadcastStream::new(receiver).filter_map(move |result| match result {
        Ok(event) if event.tenant_id == tenant_id => {
            let name = format!("{}.{}", event.entity.as_str(), event.change.as_str());
            match Event::default().event(name).json_data(&event) {
                Ok(sse_event) => Some(Ok(sse_event)),
                Err(e) => {
                    tracing::warn!("Failed to encode change event: {}", e);
                    None
                }
            }
        }
        Ok(_) => None,
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!(tenant_id = %tenant_id, skipped, "Event subscriber lagged");
            None
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
