use crate::client::{HEADER_RATE_LIMIT, HEADER_RATE_REMAINING, HEADER_RATE_RESET};
use reqwest::header::HeaderMap;
use std::str::FromStr;

/// Rate limit state reported by the platform in response headers
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Rate {
    pub limit: usize,
    pub remaining: usize,
    /// UTC epoch seconds
    pub reset: u64,
}

impl Rate {
    pub(super) fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            limit: header_number(headers, HEADER_RATE_LIMIT).unwrap_or_default(),
            remaining: header_number(headers, HEADER_RATE_REMAINING).unwrap_or_default(),
            reset: header_number(headers, HEADER_RATE_RESET).unwrap_or_default(),
        }
    }

    /// True when the platform reported a limit and no requests are left
    /// in the current window.
    pub fn is_exhausted(&self) -> bool {
        self.limit > 0 && self.remaining == 0
    }
}

fn header_number<T: FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}

#[cfg(test)]
mod test {
    use super::{Rate, HEADER_RATE_LIMIT, HEADER_RATE_REMAINING, HEADER_RATE_RESET};
    use reqwest::header::HeaderMap;

    #[test]
    fn reads_all_three_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(HEADER_RATE_LIMIT, "5000".parse().unwrap());
        headers.insert(HEADER_RATE_REMAINING, "0".parse().unwrap());
        headers.insert(HEADER_RATE_RESET, "1700000000".parse().unwrap());

        let rate = Rate::from_headers(&headers);
        assert_eq!(
            rate,
            Rate {
                limit: 5000,
                remaining: 0,
                reset: 1700000000,
            }
        );
        assert!(rate.is_exhausted());
    }

    #[test]
    fn absent_or_garbled_headers_default_to_zero() {
        let mut headers = HeaderMap::new();
        headers.insert(HEADER_RATE_REMAINING, "lots".parse().unwrap());

        let rate = Rate::from_headers(&headers);
        assert_eq!(rate, Rate::default());
        assert!(!rate.is_exhausted());
    }
}
