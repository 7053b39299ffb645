//! 17TRACK API client
//!
//! Registers tracking numbers and fetches their latest status, normalizing
//! the provider's several historical response envelopes into one
//! [`TrackingSnapshot`].

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::TrackingConfig;

/// Provider tag stored on sales rows
pub const PROVIDER_17TRACK: &str = "17track";

/// Header carrying the API key
const API_KEY_HEADER: &str = "17token";

/// Canonical status triple plus the untouched provider payload
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrackingSnapshot {
    pub status: Option<String>,
    pub substatus: Option<String>,
    pub last_event: Option<String>,
    pub raw: Value,
}

#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("Tracking provider not configured")]
    NotConfigured,
    #[error("17TRACK HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("17TRACK error code {code}: {message}")]
    Api { code: i64, message: String },
    #[error("17TRACK reported errors: {0}")]
    Embedded(String),
    #[error("17TRACK rejected tracking number: {0}")]
    Rejected(String),
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Invalid JSON response: {0}")]
    Decode(String),
}

/// Seam between the sync engine and the shipment tracking provider
#[async_trait]
pub trait TrackingProvider: Send + Sync {
    fn is_configured(&self) -> bool;

    fn provider_tag(&self) -> &'static str;

    async fn register(&self, tracking_number: &str) -> Result<(), TrackingError>;

    async fn get_status(&self, tracking_number: &str) -> Result<TrackingSnapshot, TrackingError>;
}

#[derive(Clone)]
pub struct Track17Client {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl Track17Client {
    pub fn new(config: &TrackingConfig, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
        }
    }

    async fn post(&self, endpoint: &str, tracking_number: &str) -> Result<Value, TrackingError> {
        let api_key = self.api_key.as_ref().ok_or(TrackingError::NotConfigured)?;

        let url = format!("{}/{}", self.base_url, endpoint);

        let response = self
            .client
            .post(&url)
            .header("accept", "application/json")
            .header(API_KEY_HEADER, api_key)
            .json(&json!([{ "number": tracking_number }]))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TrackingError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await?;
        let payload: Value =
            serde_json::from_str(&text).map_err(|e| TrackingError::Decode(e.to_string()))?;

        check_business_errors(&payload)?;

        Ok(payload)
    }
}

#[async_trait]
impl TrackingProvider for Track17Client {
    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn provider_tag(&self) -> &'static str {
        PROVIDER_17TRACK
    }

    async fn register(&self, tracking_number: &str) -> Result<(), TrackingError> {
        let payload = self.post("register", tracking_number).await?;

        if let Some(reason) = rejection_reason(&payload) {
            // Already-registered numbers come back rejected; status polling still works
            warn!(tracking_number = %tracking_number, reason = %reason, "17TRACK registration rejected");
            return Err(TrackingError::Rejected(reason));
        }

        debug!(tracking_number = %tracking_number, "Registered tracking number with 17TRACK");
        Ok(())
    }

    async fn get_status(&self, tracking_number: &str) -> Result<TrackingSnapshot, TrackingError> {
        let payload = self.post("gettrackinfo", tracking_number).await?;

        if let Some(reason) = rejection_reason(&payload) {
            return Err(TrackingError::Rejected(reason));
        }

        let snapshot = extract_snapshot(payload);
        debug!(
            tracking_number = %tracking_number,
            status = ?snapshot.status,
            substatus = ?snapshot.substatus,
            "Fetched 17TRACK status"
        );
        Ok(snapshot)
    }
}

/// Surface business errors hidden inside an HTTP 200
///
/// A non-zero `code` and a non-empty `errors` array (top level or under
/// `data`) are distinct failures.
fn check_business_errors(payload: &Value) -> Result<(), TrackingError> {
    if let Some(code) = payload.get("code").and_then(value_as_i64) {
        if code != 0 {
            let message = payload
                .get("message")
                .and_then(value_as_text)
                .or_else(|| first_error_message(payload))
                .unwrap_or_else(|| "unknown error".to_string());
            return Err(TrackingError::Api { code, message });
        }
    }

    for errors in [payload.get("errors"), payload.pointer("/data/errors")]
        .into_iter()
        .flatten()
    {
        if let Some(list) = errors.as_array() {
            if !list.is_empty() {
                let messages = list
                    .iter()
                    .map(|e| {
                        e.get("message")
                            .and_then(value_as_text)
                            .unwrap_or_else(|| e.to_string())
                    })
                    .collect::<Vec<_>>()
                    .join("; ");
                return Err(TrackingError::Embedded(messages));
            }
        }
    }

    Ok(())
}

fn first_error_message(payload: &Value) -> Option<String> {
    payload
        .pointer("/data/errors/0/message")
        .or_else(|| payload.pointer("/errors/0/message"))
        .and_then(value_as_text)
}

/// Rejection message when nothing was accepted and something was rejected
fn rejection_reason(payload: &Value) -> Option<String> {
    let accepted = payload
        .pointer("/data/accepted")
        .and_then(Value::as_array)
        .map(|a| a.len())
        .unwrap_or(0);
    let rejected = payload.pointer("/data/rejected").and_then(Value::as_array)?;

    if accepted > 0 || rejected.is_empty() {
        return None;
    }

    Some(
        rejected[0]
            .pointer("/error/message")
            .and_then(value_as_text)
            .unwrap_or_else(|| "rejected".to_string()),
    )
}

// ---------------------------------------------------------------------------
// Envelope extraction
// ---------------------------------------------------------------------------

/// Locates the node holding track fields inside one envelope shape
type EnvelopeLocator = fn(&Value) -> Option<&Value>;

/// Envelope shapes, tried in order
const ENVELOPES: &[(&str, EnvelopeLocator)] = &[
    ("accepted_track_info", locate_accepted_track_info),
    ("data_array", locate_data_array),
    ("data_object", locate_data_object),
    ("flat_object", locate_root),
];

const STATUS_FIELDS: &[&str] = &[
    "/latest_status/status",
    "/latestStatus/status",
    "/status",
    "/track_status",
    "/package_status",
    "/e",
];

const SUBSTATUS_FIELDS: &[&str] = &[
    "/latest_status/sub_status",
    "/latestStatus/subStatus",
    "/sub_status",
    "/substatus",
    "/subStatus",
];

const LAST_EVENT_FIELDS: &[&str] = &[
    "/latest_event/description",
    "/latestEvent/description",
    "/latest_event/description_translation/description",
    "/last_event",
    "/lastEvent",
    "/z0/z",
    "/tracking/providers/0/events/0/description",
];

fn locate_accepted_track_info(root: &Value) -> Option<&Value> {
    root.pointer("/data/accepted/0/track_info")
}

fn locate_data_array(root: &Value) -> Option<&Value> {
    let first = root.get("data")?.as_array()?.first()?;
    Some(first.get("track_info").or_else(|| first.get("track")).unwrap_or(first))
}

fn locate_data_object(root: &Value) -> Option<&Value> {
    root.get("data").filter(|data| data.is_object())
}

fn locate_root(root: &Value) -> Option<&Value> {
    Some(root).filter(|root| root.is_object())
}

fn first_text(node: &Value, fields: &[&str]) -> Option<String> {
    fields
        .iter()
        .find_map(|pointer| node.pointer(pointer).and_then(value_as_text))
}

/// Canonical triple from a located node, if any field matched
fn extract_fields(node: &Value) -> Option<(Option<String>, Option<String>, Option<String>)> {
    let status = first_text(node, STATUS_FIELDS);
    let substatus = first_text(node, SUBSTATUS_FIELDS);
    let last_event = first_text(node, LAST_EVENT_FIELDS);

    if status.is_none() && substatus.is_none() && last_event.is_none() {
        None
    } else {
        Some((status, substatus, last_event))
    }
}

/// Normalize a provider payload; unknown shapes yield all-`None` fields
pub fn extract_snapshot(raw: Value) -> TrackingSnapshot {
    let matched = ENVELOPES.iter().find_map(|(name, locate)| {
        locate(&raw)
            .and_then(extract_fields)
            .map(|fields| (*name, fields))
    });

    match matched {
        Some((envelope, (status, substatus, last_event))) => {
            debug!(envelope = envelope, "Matched 17TRACK envelope");
            TrackingSnapshot {
                status,
                substatus,
                last_event,
                raw,
            }
        }
        None => TrackingSnapshot {
            raw,
            ..Default::default()
        },
    }
}

fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

const DELIVERED_KEYWORDS: &[&str] = &[
    "delivered",
    "signed",
    "pod",
    "received",
    "delivered_to_recipient",
];

/// Destination-country vocabulary (Uzbekistan) plus generic arrival phrases
const ARRIVED_IN_COUNTRY_KEYWORDS: &[&str] = &[
    "uzbekistan",
    "o'zbekiston",
    "ozbekiston",
    "tashkent",
    "toshkent",
    "узбекистан",
    "ташкент",
    "arrived at destination",
    "arrival at destination",
    "destination country",
    "availableforpickup",
    "outfordelivery",
];

fn haystack(parts: &[Option<&str>]) -> String {
    parts
        .iter()
        .flatten()
        .map(|part| part.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Heuristic: shipment reached the recipient
pub fn looks_delivered(status: Option<&str>, substatus: Option<&str>) -> bool {
    let text = haystack(&[status, substatus]);
    DELIVERED_KEYWORDS.iter().any(|keyword| text.contains(keyword))
}

/// Heuristic: shipment reached the destination country
pub fn looks_arrived_in_country(
    status: Option<&str>,
    substatus: Option<&str>,
    last_event: Option<&str>,
) -> bool {
    let text = haystack(&[status, substatus, last_event]);
    ARRIVED_IN_COUNTRY_KEYWORDS
        .iter()
        .any(|keyword| text.contains(keyword))
}

impl TrackingSnapshot {
    /// Arrived in country or delivered
    pub fn is_arrived(&self) -> bool {
        looks_arrived_in_country(
            self.status.as_deref(),
            self.substatus.as_deref(),
            self.last_event.as_deref(),
        ) || looks_delivered(self.status.as_deref(), self.substatus.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_accepted_track_info_envelope() {
        let raw = json!({
            "code": 0,
            "data": {
                "accepted": [{
                    "number": "LX123",
                    "track_info": {
                        "latest_status": { "status": "InTransit", "sub_status": "InTransit_Other" },
                        "latest_event": { "description": "Departed from sorting center" }
                    }
                }],
                "rejected": []
            }
        });
        let snapshot = extract_snapshot(raw.clone());
        assert_eq!(snapshot.status.as_deref(), Some("InTransit"));
        assert_eq!(snapshot.substatus.as_deref(), Some("InTransit_Other"));
        assert_eq!(snapshot.last_event.as_deref(), Some("Departed from sorting center"));
        assert_eq!(snapshot.raw, raw);
    }

    #[test]
    fn test_extract_data_array_envelope() {
        let raw = json!({
            "code": 0,
            "data": [{ "no": "LX123", "track": { "e": 40, "z0": { "z": "Delivered to recipient" } } }]
        });
        let snapshot = extract_snapshot(raw);
        assert_eq!(snapshot.status.as_deref(), Some("40"));
        assert_eq!(snapshot.substatus, None);
        assert_eq!(snapshot.last_event.as_deref(), Some("Delivered to recipient"));
    }

    #[test]
    fn test_extract_flat_object_envelope() {
        let raw = json!({
            "status": "Delivered",
            "substatus": "Delivered_Other",
            "lastEvent": "Signed by recipient"
        });
        let snapshot = extract_snapshot(raw);
        assert_eq!(snapshot.status.as_deref(), Some("Delivered"));
        assert_eq!(snapshot.substatus.as_deref(), Some("Delivered_Other"));
        assert_eq!(snapshot.last_event.as_deref(), Some("Signed by recipient"));
    }

    #[test]
    fn test_unknown_shape_keeps_raw_with_null_fields() {
        let raw = json!({ "code": 0, "data": { "accepted": [{ "number": "LX123" }] } });
        let snapshot = extract_snapshot(raw.clone());
        assert_eq!(snapshot.status, None);
        assert_eq!(snapshot.substatus, None);
        assert_eq!(snapshot.last_event, None);
        assert_eq!(snapshot.raw, raw);
    }

    #[test]
    fn test_empty_strings_are_not_matches() {
        let raw = json!({ "status": "", "track_status": "InfoReceived" });
        let snapshot = extract_snapshot(raw);
        assert_eq!(snapshot.status.as_deref(), Some("InfoReceived"));
    }

    #[test]
    fn test_business_error_code_surfaced() {
        let payload = json!({ "code": -18010012, "message": "Invalid token", "data": {} });
        let err = check_business_errors(&payload).unwrap_err();
        assert!(matches!(err, TrackingError::Api { code: -18010012, .. }));
    }

    #[test]
    fn test_embedded_errors_surfaced() {
        let payload = json!({ "code": 0, "data": { "errors": [{ "code": -1, "message": "Quota exceeded" }] } });
        let err = check_business_errors(&payload).unwrap_err();
        assert!(matches!(err, TrackingError::Embedded(ref m) if m.contains("Quota exceeded")));
    }

    #[test]
    fn test_success_payload_passes_checks() {
        let payload = json!({ "code": 0, "data": { "accepted": [], "rejected": [], "errors": [] } });
        assert!(check_business_errors(&payload).is_ok());
    }

    #[test]
    fn test_rejection_only_when_nothing_accepted() {
        let rejected = json!({
            "code": 0,
            "data": { "accepted": [], "rejected": [{ "number": "X", "error": { "code": -18019902, "message": "Not registered" } }] }
        });
        assert_eq!(rejection_reason(&rejected).as_deref(), Some("Not registered"));

        let mixed = json!({
            "code": 0,
            "data": { "accepted": [{ "number": "Y" }], "rejected": [{ "number": "X" }] }
        });
        assert_eq!(rejection_reason(&mixed), None);
    }

    #[test]
    fn test_looks_delivered_vocabulary() {
        assert!(looks_delivered(Some("Delivered"), None));
        assert!(looks_delivered(None, Some("Delivered_Signed")));
        assert!(looks_delivered(Some("POD"), None));
        assert!(!looks_delivered(Some("InTransit"), Some("InTransit_Other")));
        assert!(!looks_delivered(None, None));
    }

    #[test]
    fn test_received_keyword_also_matches_info_received() {
        // Substring match on "received" covers 17TRACK's initial InfoReceived status
        assert!(looks_delivered(Some("InfoReceived"), None));
        let fresh = TrackingSnapshot {
            status: Some("InfoReceived".to_string()),
            ..Default::default()
        };
        assert!(fresh.is_arrived());
    }

    #[test]
    fn test_looks_arrived_in_country_vocabulary() {
        assert!(looks_arrived_in_country(None, None, Some("Arrived at TASHKENT hub")));
        assert!(looks_arrived_in_country(None, None, Some("Прибыло в Ташкент")));
        assert!(looks_arrived_in_country(Some("AvailableForPickup"), None, None));
        assert!(!looks_arrived_in_country(Some("InTransit"), None, Some("Departed Guangzhou")));
    }

    #[test]
    fn test_snapshot_is_arrived_combines_heuristics() {
        let delivered = TrackingSnapshot {
            status: Some("Delivered".to_string()),
            ..Default::default()
        };
        assert!(delivered.is_arrived());

        let moving = TrackingSnapshot {
            status: Some("InTransit".to_string()),
            last_event: Some("Departed from Urumqi".to_string()),
            ..Default::default()
        };
        assert!(!moving.is_arrived());
    }
}
