//! API types for the CrUX client.
//!
//! Metric payloads (histograms, percentiles, timeseries) are carried as
//! opaque [`serde_json::Value`]s: the client passes them through verbatim
//! and never interprets their contents.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Parameters for one logical record lookup.
///
/// Exactly one of `url` or `origin` identifies the page or site; the
/// remaining fields narrow the dimensions. Fields left as `None` are
/// omitted from the request body.
#[derive(Debug, Clone, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QueryOptions {
    /// Full page URL to look up.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Origin to look up.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    /// Device form factor dimension.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form_factor: Option<FormFactor>,
    /// Effective connection type dimension.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_connection_type: Option<Connection>,
}

/// Device form factor dimension.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FormFactor {
    /// Aggregate across all form factors.
    AllFormFactors,
    /// Mobile phones.
    Phone,
    /// Desktop browsers.
    Desktop,
    /// Tablets.
    Tablet,
}

/// Effective connection type dimension.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Connection {
    /// 4G or faster.
    #[serde(rename = "4G")]
    FourG,
    /// 3G.
    #[serde(rename = "3G")]
    ThreeG,
    /// 2G.
    #[serde(rename = "2G")]
    TwoG,
    /// Slow 2G.
    #[serde(rename = "slow-2G")]
    Slow2G,
    /// Offline.
    #[serde(rename = "offline")]
    Offline,
}

/// Successful response from `records:queryRecord`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    /// The matched record.
    pub record: Record,
    /// Present when the API normalized the requested URL.
    pub url_normalization_details: Option<UrlNormalizationDetails>,
}

/// One CrUX record.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// The key the record was aggregated under.
    pub key: RecordKey,
    /// Per-metric histograms and percentiles, passed through verbatim.
    #[serde(default)]
    pub metrics: Value,
    /// Collection period of the record, passed through verbatim.
    #[serde(default)]
    pub collection_period: Option<Value>,
}

/// The dimensions a record was aggregated under.
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RecordKey {
    /// Page URL, for URL-level records.
    pub url: Option<String>,
    /// Origin, for origin-level records.
    pub origin: Option<String>,
    /// Form factor, when the query was narrowed to one.
    pub form_factor: Option<FormFactor>,
    /// Connection type, when the query was narrowed to one.
    pub effective_connection_type: Option<Connection>,
}

/// Details about server-side URL normalization.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UrlNormalizationDetails {
    /// The URL as submitted.
    pub original_url: String,
    /// The URL the API actually looked up.
    pub normalized_url: String,
}

/// Successful response from `records:queryHistoryRecord`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    /// The matched history record.
    pub record: HistoryRecord,
    /// Present when the API normalized the requested URL.
    pub url_normalization_details: Option<UrlNormalizationDetails>,
}

/// One CrUX history record: the same key as [`Record`], with per-metric
/// timeseries instead of point-in-time histograms.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    /// The key the record was aggregated under.
    pub key: RecordKey,
    /// Per-metric histogram and percentile timeseries, passed through verbatim.
    #[serde(default)]
    pub metrics: Value,
    /// One collection period per timeseries point, passed through verbatim.
    #[serde(default)]
    pub collection_periods: Value,
}

/// Error object the API embeds in a response body.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ApiError {
    /// Numeric error code (HTTP-status-like: 404, 429, ...).
    pub code: u16,
    /// Human-readable message.
    pub message: String,
    /// Symbolic status, e.g. `NOT_FOUND`.
    #[serde(default)]
    pub status: String,
}

/// The `{ "error": ... }` envelope wrapping [`ApiError`].
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiErrorBody {
    pub error: ApiError,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_options_serialization() {
        let options = QueryOptions {
            origin: Some("https://example.com".into()),
            form_factor: Some(FormFactor::Desktop),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&options).unwrap(),
            json!({"origin": "https://example.com", "formFactor": "DESKTOP"})
        );

        // None fields are omitted entirely
        let empty = QueryOptions::default();
        assert_eq!(serde_json::to_value(&empty).unwrap(), json!({}));
    }

    #[test]
    fn test_connection_wire_names() {
        assert_eq!(serde_json::to_value(Connection::FourG).unwrap(), json!("4G"));
        assert_eq!(serde_json::to_value(Connection::Slow2G).unwrap(), json!("slow-2G"));
        assert_eq!(
            serde_json::from_value::<Connection>(json!("offline")).unwrap(),
            Connection::Offline
        );
    }

    #[test]
    fn test_query_response_deserialization() {
        let value = json!({
            "record": {
                "key": {"origin": "https://example.com", "formFactor": "PHONE"},
                "metrics": {
                    "largest_contentful_paint": {
                        "histogram": [{"start": 0, "end": 2500, "density": 0.79}],
                        "percentiles": {"p75": 2215}
                    }
                }
            },
            "urlNormalizationDetails": null
        });
        let response: QueryResponse = serde_json::from_value(value).unwrap();
        assert_eq!(response.record.key.origin.as_deref(), Some("https://example.com"));
        assert_eq!(response.record.key.form_factor, Some(FormFactor::Phone));
        // metrics stay opaque
        assert_eq!(
            response.record.metrics["largest_contentful_paint"]["percentiles"]["p75"],
            json!(2215)
        );
    }

    #[test]
    fn test_api_error_deserialization() {
        let body: ApiErrorBody = serde_json::from_value(json!({
            "error": {"code": 404, "message": "chrome ux report data not found", "status": "NOT_FOUND"}
        }))
        .unwrap();
        assert_eq!(body.error.code, 404);
        assert_eq!(body.error.status, "NOT_FOUND");
    }
}
