//! Standardized span constructors for push-service observability.

pub mod spans {
    use tracing::{Span, info_span};

    /// Create a span for an event stream.
    pub fn stream(client: &str, store: &str, user: &str) -> Span {
        info_span!("stream", client = %client, store = %store, user = %user)
    }

    /// Create a span for a publish request.
    pub fn publish(store: &str, event: &str, origin: Option<&str>) -> Span {
        if let Some(origin) = origin {
            info_span!("publish", store = %store, event = %event, origin = %origin)
        } else {
            info_span!("publish", store = %store, event = %event)
        }
    }
}
