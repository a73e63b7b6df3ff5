use crate::{EventLog, Result, SecretProvider};
use atomgit::{
    webhook::{self, GATEWAY_USER_AGENT},
    Event, EventType,
};
use hyper::{body, header::CONTENT_TYPE, Body, Request, Response, StatusCode};
use log::{info, warn};

/// Body of the reply to an accepted access delivery
pub const ACCESS_ACCEPTED: &str = "The request was accepted by access's robot, inform to webhook.";

/// Outcome of looking at an inbound webhook request
#[derive(Debug)]
pub enum Classification {
    /// A delivery which should be handed to the dispatcher
    Event(Event),
    /// The request has been dealt with, send this response back as is
    Respond(Response<Body>),
}

fn respond<S: Into<String>>(status: StatusCode, message: S) -> Result<Classification> {
    let response = Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Body::from(message.into()))?;
    Ok(Classification::Respond(response))
}

fn bad_request<E: std::fmt::Display>(cause: E) -> Result<Classification> {
    respond(
        StatusCode::BAD_REQUEST,
        format!("400 Bad Request: {}", cause),
    )
}

/// Validates a webhook request and turns it into an [`Event`].
///
/// Access deliveries are answered here: they need a delivery id and a valid
/// signature, and are never dispatched. Every other delivery must come
/// through the robot gateway.
pub async fn classify(
    request: Request<Body>,
    secret: &dyn SecretProvider,
) -> Result<Classification> {
    let (parts, body) = request.into_parts();
    let headers = parts.headers;

    let (event_type, event_name) = match webhook::event_type(&headers) {
        Ok(event) => event,
        Err(e) => return bad_request(e),
    };

    let payload = match body::to_bytes(body).await {
        Ok(payload) => payload,
        Err(e) => {
            warn!("reading {} webhook body: {}", event_name, e);
            return respond(
                StatusCode::INTERNAL_SERVER_ERROR,
                "500 Internal Server Error: Failed to read request body",
            );
        }
    };

    let mut event = Event::new(event_type, event_name, payload);

    if event_type == EventType::Access {
        let delivery_id = match webhook::delivery_id(&headers) {
            Ok(id) => id,
            Err(e) => return bad_request(e),
        };

        if let Err(e) = webhook::verify_signature(&headers, event.payload(), secret.secret()) {
            warn!("rejecting access delivery {}: {}", delivery_id, e);
            return respond(StatusCode::FORBIDDEN, format!("403 Forbidden: {}", e));
        }

        event.event_uuid = Some(delivery_id);
        info!("{} access delivery accepted", EventLog::new(&event));
        return respond(StatusCode::OK, ACCESS_ACCEPTED);
    }

    if let Err(e) = webhook::check_user_agent(&headers, GATEWAY_USER_AGENT) {
        return bad_request(e);
    }

    if let Err(e) = event.normalize() {
        return bad_request(e);
    }

    Ok(Classification::Event(event))
}
