use super::EventType;
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use thiserror::Error;

/// The header key used to pass the event type
pub const EVENT_TYPE_HEADER: &str = "X-AtomGit-Event";

/// The header key used to pass the unique ID for the webhook delivery
pub const DELIVERY_ID_HEADER: &str = "X-AtomGit-Delivery";

/// The header key used to pass the HMAC hexdigest of the body
pub const SIGNATURE_HEADER: &str = "X-Hub-Signature-256";

/// `User-Agent` of deliveries sent directly by the platform
pub const PLATFORM_USER_AGENT: &str = "AtomGit-Hookshot";

/// `User-Agent` of deliveries relayed by the robot gateway
pub const GATEWAY_USER_AGENT: &str = "Robot-Gateway-Access";

const SIGNATURE_PREFIX: &str = "sha256=";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WebhookError {
    #[error("missing {0} header")]
    MissingHeader(&'static str),
    #[error("malformed {0} header")]
    MalformedHeader(&'static str),
    #[error("unknown User-Agent header")]
    UnknownUserAgent,
    #[error("invalid {0}")]
    InvalidSignature(&'static str),
}

fn header<'a>(headers: &'a HeaderMap, key: &'static str) -> Result<&'a str, WebhookError> {
    let value = headers
        .get(key)
        .ok_or(WebhookError::MissingHeader(key))?;
    let value = HeaderValue::to_str(value).map_err(|_| WebhookError::MalformedHeader(key))?;

    if value.is_empty() {
        Err(WebhookError::MissingHeader(key))
    } else {
        Ok(value)
    }
}

/// Determines the event type and raw event name of a delivery.
///
/// Deliveries sent by the platform itself are access events whatever the
/// event header says. Names that aren't understood map to
/// [`EventType::Unknown`].
pub fn event_type(headers: &HeaderMap) -> Result<(EventType, String), WebhookError> {
    let name = header(headers, EVENT_TYPE_HEADER)?;

    let event_type = if user_agent(headers) == Some(PLATFORM_USER_AGENT) {
        EventType::Access
    } else {
        name.parse().unwrap_or(EventType::Unknown)
    };

    Ok((event_type, name.to_owned()))
}

fn user_agent(headers: &HeaderMap) -> Option<&str> {
    headers.get(USER_AGENT).and_then(|h| h.to_str().ok())
}

pub fn check_user_agent(headers: &HeaderMap, expected: &str) -> Result<(), WebhookError> {
    if user_agent(headers) == Some(expected) {
        Ok(())
    } else {
        Err(WebhookError::UnknownUserAgent)
    }
}

pub fn delivery_id(headers: &HeaderMap) -> Result<String, WebhookError> {
    header(headers, DELIVERY_ID_HEADER).map(ToOwned::to_owned)
}

/// Checks the `X-Hub-Signature-256` header against the HMAC-SHA256 of `body`
/// keyed with `key`.
pub fn verify_signature(headers: &HeaderMap, body: &[u8], key: &[u8]) -> Result<(), WebhookError> {
    let signature = header(headers, SIGNATURE_HEADER)?;
    let signature = signature
        .strip_prefix(SIGNATURE_PREFIX)
        .ok_or(WebhookError::MalformedHeader(SIGNATURE_HEADER))?;
    let signature =
        hex::decode(signature).map_err(|_| WebhookError::MalformedHeader(SIGNATURE_HEADER))?;

    let hash = payload_signature(body, key);
    debug!("hash: {}", hex::encode(hash));

    if constant_time_eq(&hash, &signature) {
        Ok(())
    } else {
        Err(WebhookError::InvalidSignature(SIGNATURE_HEADER))
    }
}

/// HMAC-SHA256 of a webhook body
pub fn payload_signature(body: &[u8], key: &[u8]) -> [u8; 32] {
    hmac_sha256::HMAC::mac(body, key)
}

/// Value of the signature header the platform would send for `body`
pub fn signature_header_value(body: &[u8], key: &[u8]) -> String {
    format!("{}{}", SIGNATURE_PREFIX, hex::encode(payload_signature(body, key)))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0, |acc, (x, y)| acc | (x ^ y)) == 0
}
