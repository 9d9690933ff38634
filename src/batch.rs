//! Batched record queries over the CrUX batch endpoint.
//!
//! A batch bundles many `records:queryRecord` lookups into one HTTP call
//! using a `multipart/mixed` body, one `application/http` section per
//! query. The API answers rate limiting per item, not per request: a
//! single response can carry records for some items and 429 errors for
//! others. The reconciler here therefore tracks a result slot per item
//! and re-sends only the still-unresolved subset on each retry round,
//! correlating sections by `Content-ID` so positions never shift.

use crate::client::Client;
use crate::error::{Error, Result};
use crate::types::{ApiErrorBody, QueryOptions, QueryResponse};
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use tracing::{debug, warn};

/// Boundary token for request bodies. Responses use an API-chosen token.
const BATCH_BOUNDARY: &str = "BATCH_BOUNDARY";

/// One query paired with its result slot. The item's position in the
/// batch vector is its identity: `Content-ID` on the wire is always
/// `position + 1`, even when earlier items are already resolved.
#[derive(Debug)]
struct BatchItem {
    options: QueryOptions,
    state: ItemState,
}

#[derive(Debug)]
enum ItemState {
    /// Not yet answered, or answered with a 429. Re-sent next round.
    Unresolved,
    /// Terminal: the API returned a record.
    Success(Box<QueryResponse>),
    /// Terminal: the API returned a 404 for this item.
    NotFound,
}

impl ItemState {
    fn is_unresolved(&self) -> bool {
        matches!(self, ItemState::Unresolved)
    }
}

/// Drive the full encode/send/parse/update loop for one batch call.
///
/// Returns one entry per input query, in input order: the record on
/// success, `None` where the API had no data. Any unexpected API error
/// aborts the whole batch, discarding items already resolved.
pub(crate) async fn run_batch(
    client: &Client,
    queries: Vec<QueryOptions>,
) -> Result<Vec<Option<QueryResponse>>> {
    if queries.is_empty() {
        return Ok(Vec::new());
    }

    let mut items: Vec<BatchItem> = queries
        .into_iter()
        .map(|options| BatchItem {
            options,
            state: ItemState::Unresolved,
        })
        .collect();

    let url = format!("{}/batch/", client.base_url);
    let mut round: u32 = 1;

    loop {
        let body = encode_batch_body(&items, &client.api_key)?;
        debug!(
            round,
            pending = items.iter().filter(|i| i.state.is_unresolved()).count(),
            "sending batch round"
        );

        let response = client
            .http_client
            .post(&url)
            .header(
                CONTENT_TYPE,
                format!("multipart/mixed; boundary={}", BATCH_BOUNDARY),
            )
            .body(body)
            .send()
            .await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        if status != 200 {
            return Err(Error::Transport { status, body: text });
        }

        for (index, payload) in parse_batch_response(&text) {
            let Some(item) = items.get_mut(index) else {
                // Content-ID outside the batch; nothing to correlate it with.
                continue;
            };
            if item.state.is_unresolved() {
                item.state = classify_payload(payload)?;
            }
        }

        let pending = items.iter().filter(|i| i.state.is_unresolved()).count();
        if pending == 0 {
            return Ok(items
                .into_iter()
                .map(|item| match item.state {
                    ItemState::Success(response) => Some(*response),
                    ItemState::NotFound => None,
                    // pending == 0 was checked above
                    ItemState::Unresolved => unreachable!(),
                })
                .collect());
        }

        if round > client.max_retries {
            return Err(Error::RetriesExhausted { attempts: round });
        }
        let delay = client.backoff.delay(round);
        warn!(
            round,
            pending,
            max_retries = client.max_retries,
            ?delay,
            "batch items rate limited, retrying"
        );
        tokio::time::sleep(delay).await;
        round += 1;
    }
}

/// Decide what a parsed response payload means for its item.
///
/// 429 keeps the item unresolved so the next round re-sends it; 404 and
/// success are terminal; any other error code fails the whole batch.
fn classify_payload(payload: Value) -> Result<ItemState> {
    if payload.get("error").is_some() {
        let body: ApiErrorBody = serde_json::from_value(payload)?;
        return match body.error.code {
            404 => Ok(ItemState::NotFound),
            429 => Ok(ItemState::Unresolved),
            code => Err(Error::Api {
                code,
                message: body.error.message,
                status: body.error.status,
            }),
        };
    }
    if payload.get("record").is_some() {
        let response: QueryResponse = serde_json::from_value(payload)?;
        return Ok(ItemState::Success(Box::new(response)));
    }
    Err(Error::MalformedResponse(payload.to_string()))
}

/// Encode the still-unresolved items into a `multipart/mixed` body.
///
/// Sections appear in item order and the `Content-ID` is always the
/// original position plus one; resolved items leave gaps rather than
/// renumbering later sections. Deterministic for a given item state.
fn encode_batch_body(items: &[BatchItem], api_key: &str) -> Result<String> {
    let mut body = String::new();
    for (index, item) in items.iter().enumerate() {
        if !item.state.is_unresolved() {
            continue;
        }
        let options = serde_json::to_string(&item.options)?;
        body.push_str(&format!(
            "--{boundary}\n\
             Content-Type: application/http\n\
             Content-ID: {id}\n\
             \n\
             POST /v1/records:queryRecord?key={api_key}\n\
             Content-Type: application/json\n\
             Accept: application/json\n\
             \n\
             {options}\n\
             \n",
            boundary = BATCH_BOUNDARY,
            id = index + 1,
        ));
    }
    body.push_str(&format!("--{}--", BATCH_BOUNDARY));
    Ok(body)
}

/// Parse a `multipart/mixed` batch response into `(item index, JSON
/// payload)` pairs.
///
/// The response boundary is chosen by the API, so it is detected from
/// the first `--`-prefixed line instead of being assumed. Each section
/// is correlated via its `Content-ID: response-<n>` header and its JSON
/// body is taken between the first `{` and the last `}`, which accepts
/// both pretty-printed and minified bodies. Sections without a
/// recognizable Content-ID or a well-formed body are skipped.
fn parse_batch_response(raw: &str) -> Vec<(usize, Value)> {
    let Some(delimiter) = raw.lines().map(str::trim_end).find(|l| l.starts_with("--")) else {
        return Vec::new();
    };
    let delimiter = delimiter.strip_suffix("--").unwrap_or(delimiter);

    let mut parts = Vec::new();
    for section in raw.split(delimiter) {
        let Some(index) = content_id_index(section) else {
            continue;
        };
        let Some(start) = section.find('{') else {
            continue;
        };
        let Some(end) = section.rfind('}') else {
            continue;
        };
        if end < start {
            continue;
        }
        if let Ok(payload) = serde_json::from_str::<Value>(&section[start..=end]) {
            parts.push((index, payload));
        }
    }
    parts
}

/// Extract the zero-based item index from a section's
/// `Content-ID: response-<n>` header.
fn content_id_index(section: &str) -> Option<usize> {
    let line = section
        .lines()
        .find(|line| line.trim_start().starts_with("Content-ID"))?;
    let (_, rest) = line.split_once("response-")?;
    let digits: &str = rest
        .split(|c: char| !c.is_ascii_digit())
        .next()
        .filter(|s| !s.is_empty())?;
    let id: usize = digits.parse().ok()?;
    id.checked_sub(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FormFactor;
    use serde_json::json;

    fn unresolved(origin: &str) -> BatchItem {
        BatchItem {
            options: QueryOptions {
                origin: Some(origin.into()),
                ..Default::default()
            },
            state: ItemState::Unresolved,
        }
    }

    #[test]
    fn test_encode_emits_one_section_per_unresolved_item() {
        let items = vec![unresolved("https://example.com"), unresolved("https://github.com")];
        let body = encode_batch_body(&items, "secret").unwrap();

        assert!(body.starts_with("--BATCH_BOUNDARY\n"));
        assert!(body.ends_with("--BATCH_BOUNDARY--"));
        assert!(body.contains("Content-ID: 1"));
        assert!(body.contains("Content-ID: 2"));
        assert!(body.contains("POST /v1/records:queryRecord?key=secret"));
        assert!(body.contains(r#"{"origin":"https://example.com"}"#));
        assert!(body.contains(r#"{"origin":"https://github.com"}"#));
    }

    #[test]
    fn test_encode_skips_resolved_without_renumbering() {
        let mut items = vec![unresolved("https://example.com"), unresolved("https://github.com")];
        items[0].state = ItemState::NotFound;

        let body = encode_batch_body(&items, "secret").unwrap();
        assert!(!body.contains("Content-ID: 1"));
        assert!(body.contains("Content-ID: 2"));
        assert!(!body.contains("example.com"));
    }

    #[test]
    fn test_encode_is_deterministic() {
        let items = vec![unresolved("https://example.com"), unresolved("https://github.com")];
        let first = encode_batch_body(&items, "secret").unwrap();
        let second = encode_batch_body(&items, "secret").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_encode_serializes_all_query_dimensions() {
        let items = vec![BatchItem {
            options: QueryOptions {
                url: Some("https://github.com/explore".into()),
                form_factor: Some(FormFactor::Desktop),
                ..Default::default()
            },
            state: ItemState::Unresolved,
        }];
        let body = encode_batch_body(&items, "secret").unwrap();
        assert!(body.contains(r#"{"url":"https://github.com/explore","formFactor":"DESKTOP"}"#));
    }

    #[test]
    fn test_parse_pretty_printed_sections() {
        // Shape taken from a live batch endpoint response.
        let raw = "--batch_acyIJf8nRW5t11AyZUOwieHC_eWk1alw\n\
            Content-Type: application/http\n\
            Content-ID: response-1\n\
            \n\
            HTTP/1.1 200 OK\n\
            Content-Type: application/json; charset=UTF-8\n\
            \n\
            {\n\
              \"record\": {\n\
                \"key\": {\n\
                  \"origin\": \"https://example.com\"\n\
                }\n\
              }\n\
            }\n\
            \n\
            --batch_acyIJf8nRW5t11AyZUOwieHC_eWk1alw\n\
            Content-Type: application/http\n\
            Content-ID: response-2\n\
            \n\
            HTTP/1.1 404 Not Found\n\
            Content-Type: application/json; charset=UTF-8\n\
            \n\
            {\n\
              \"error\": {\n\
                \"code\": 404,\n\
                \"message\": \"chrome ux report data not found\",\n\
                \"status\": \"NOT_FOUND\"\n\
              }\n\
            }\n\
            \n\
            --batch_acyIJf8nRW5t11AyZUOwieHC_eWk1alw--";

        let parts = parse_batch_response(raw);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].0, 0);
        assert_eq!(parts[0].1["record"]["key"]["origin"], json!("https://example.com"));
        assert_eq!(parts[1].0, 1);
        assert_eq!(parts[1].1["error"]["code"], json!(404));
    }

    #[test]
    fn test_parse_minified_body() {
        let raw = "--batch_x\n\
            Content-ID: response-3\n\
            \n\
            HTTP/1.1 429 Too Many Requests\n\
            \n\
            {\"error\":{\"code\":429,\"message\":\"quota exceeded\",\"status\":\"RESOURCE_EXHAUSTED\"}}\n\
            --batch_x--";

        let parts = parse_batch_response(raw);
        assert_eq!(parts, vec![(2, json!({"error": {"code": 429, "message": "quota exceeded", "status": "RESOURCE_EXHAUSTED"}}))]);
    }

    #[test]
    fn test_parse_crlf_line_endings() {
        let raw = "--batch_x\r\n\
            Content-ID: response-1\r\n\
            \r\n\
            HTTP/1.1 200 OK\r\n\
            \r\n\
            {\"record\":{\"key\":{}}}\r\n\
            --batch_x--\r\n";

        let parts = parse_batch_response(raw);
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].0, 0);
    }

    #[test]
    fn test_parse_skips_unusable_sections() {
        // No Content-ID, no JSON body, and a broken body: none emit entries.
        let raw = "--batch_x\n\
            Content-Type: application/http\n\
            \n\
            {\"record\":{}}\n\
            --batch_x\n\
            Content-ID: response-2\n\
            \n\
            HTTP/1.1 200 OK\n\
            \n\
            not json at all\n\
            --batch_x--";

        assert!(parse_batch_response(raw).is_empty());
        assert!(parse_batch_response("").is_empty());
        assert!(parse_batch_response("plain text, no boundary").is_empty());
    }

    #[test]
    fn test_classify_payload() {
        let success = classify_payload(json!({"record": {"key": {"origin": "https://example.com"}}})).unwrap();
        assert!(matches!(success, ItemState::Success(_)));

        let not_found = classify_payload(json!({"error": {"code": 404, "message": "", "status": "NOT_FOUND"}})).unwrap();
        assert!(matches!(not_found, ItemState::NotFound));

        let throttled = classify_payload(json!({"error": {"code": 429, "message": "", "status": "RESOURCE_EXHAUSTED"}})).unwrap();
        assert!(throttled.is_unresolved());

        let fatal = classify_payload(json!({"error": {"code": 500, "message": "boom", "status": "INTERNAL"}}));
        assert!(matches!(fatal, Err(Error::Api { code: 500, .. })));

        let empty = classify_payload(json!({}));
        assert!(matches!(empty, Err(Error::MalformedResponse(_))));
    }
}
