//! URL normalization matching CrUX record keys.

use crate::error::Result;
use url::Url;

/// Normalize a URL to the form the CrUX API uses as a record key:
/// origin plus path, dropping query parameters and fragments. A bare
/// origin gains its root `/`.
///
/// # Example
///
/// ```rust
/// let normalized = crux_api::normalize_url("https://github.com/marketplace?type=actions")?;
/// assert_eq!(normalized, "https://github.com/marketplace");
/// # Ok::<(), crux_api::Error>(())
/// ```
pub fn normalize_url(url: &str) -> Result<String> {
    let parsed = Url::parse(url)?;
    Ok(format!(
        "{}{}",
        parsed.origin().ascii_serialization(),
        parsed.path()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_url() {
        let cases = [
            // adds /
            ("https://www.gov.uk", "https://www.gov.uk/"),
            // no change, URL with /
            ("https://www.hey.com/features/", "https://www.hey.com/features/"),
            // no change, URL without /
            ("https://stripe.com/docs/api", "https://stripe.com/docs/api"),
            // removes search params
            ("https://github.com/marketplace?type=actions", "https://github.com/marketplace"),
            // removes fragment
            ("https://example.com/page#section", "https://example.com/page"),
        ];
        for (input, expected) in cases {
            assert_eq!(normalize_url(input).unwrap(), expected);
        }
    }

    #[test]
    fn test_normalize_url_rejects_invalid() {
        assert!(normalize_url("not a url").is_err());
    }
}
