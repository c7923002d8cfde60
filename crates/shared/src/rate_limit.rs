//! Demo call rate limiter
//!
//! Guards the unauthenticated demo-call endpoint: one outbound call per phone
//! number per hour, tracked in a process-local map. The map is bounded — expired
//! entries are evicted opportunistically and a hard cap prevents memory
//! exhaustion from a flood of distinct numbers.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use time::{Duration, OffsetDateTime};
use tokio::sync::Mutex;

/// Sliding window measured from the last attempt for a given number.
const RATE_LIMIT_WINDOW: Duration = Duration::hours(1);

/// Maximum tracked numbers before forced eviction.
const MAX_ENTRIES: usize = 10_000;

#[allow(clippy::unwrap_used)] // static pattern, covered by tests
static PHONE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+\d{10,15}$").unwrap());

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RateLimitError {
    #[error("invalid phone number")]
    InvalidPhoneNumber,

    #[error("rate limited, retry in {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: i64 },
}

/// Normalize a candidate phone number and validate international format:
/// leading `+` followed by 10-15 digits, ignoring spaces, dashes and parens.
pub fn normalize_phone(phone: &str) -> Result<String, RateLimitError> {
    let cleaned: String = phone
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();

    if PHONE_PATTERN.is_match(&cleaned) {
        Ok(cleaned)
    } else {
        Err(RateLimitError::InvalidPhoneNumber)
    }
}

/// Per-phone-number rate gate for the demo call endpoint.
#[derive(Clone)]
pub struct DemoCallLimiter {
    attempts: Arc<Mutex<HashMap<String, OffsetDateTime>>>,
}

impl Default for DemoCallLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl DemoCallLimiter {
    pub fn new() -> Self {
        Self {
            attempts: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Validate the number and claim a call slot for it.
    ///
    /// On success the attempt is recorded immediately, so two near-simultaneous
    /// requests for the same number cannot both pass (the map lock serializes
    /// them). Returns the normalized number for the caller to dial.
    pub async fn check(&self, phone: &str) -> Result<String, RateLimitError> {
        self.check_at(phone, OffsetDateTime::now_utc()).await
    }

    /// Clock-injectable variant of [`check`](Self::check).
    pub async fn check_at(
        &self,
        phone: &str,
        now: OffsetDateTime,
    ) -> Result<String, RateLimitError> {
        let normalized = normalize_phone(phone)?;

        let mut attempts = self.attempts.lock().await;

        if let Some(last) = attempts.get(&normalized) {
            let elapsed = now - *last;
            if elapsed < RATE_LIMIT_WINDOW {
                let retry_after_seconds = (RATE_LIMIT_WINDOW - elapsed).whole_seconds().max(1);
                return Err(RateLimitError::RateLimited {
                    retry_after_seconds,
                });
            }
        }

        if attempts.len() >= MAX_ENTRIES {
            evict(&mut attempts, now);
        }

        attempts.insert(normalized.clone(), now);
        Ok(normalized)
    }
}

/// Drop expired entries; if everything is still live, drop the oldest entry so
/// the map never exceeds the cap.
fn evict(attempts: &mut HashMap<String, OffsetDateTime>, now: OffsetDateTime) {
    attempts.retain(|_, last| now - *last < RATE_LIMIT_WINDOW);

    if attempts.len() >= MAX_ENTRIES {
        if let Some(oldest) = attempts
            .iter()
            .min_by_key(|(_, last)| **last)
            .map(|(phone, _)| phone.clone())
        {
            attempts.remove(&oldest);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_international_format() {
        assert_eq!(normalize_phone("+14155551234").unwrap(), "+14155551234");
        assert_eq!(
            normalize_phone("+1 (415) 555-1234").unwrap(),
            "+14155551234"
        );
    }

    #[test]
    fn rejects_missing_plus_and_short_numbers() {
        assert_eq!(
            normalize_phone("4155551234"),
            Err(RateLimitError::InvalidPhoneNumber)
        );
        assert_eq!(
            normalize_phone("+123"),
            Err(RateLimitError::InvalidPhoneNumber)
        );
        assert_eq!(
            normalize_phone("+12345678901234567"),
            Err(RateLimitError::InvalidPhoneNumber)
        );
        assert_eq!(normalize_phone(""), Err(RateLimitError::InvalidPhoneNumber));
    }

    #[tokio::test]
    async fn second_attempt_within_window_rejected() {
        let limiter = DemoCallLimiter::new();
        let now = OffsetDateTime::now_utc();

        limiter.check_at("+14155551234", now).await.unwrap();

        let err = limiter
            .check_at("+14155551234", now + Duration::minutes(30))
            .await
            .unwrap_err();
        assert!(matches!(err, RateLimitError::RateLimited { .. }));
    }

    #[tokio::test]
    async fn attempt_after_window_accepted() {
        let limiter = DemoCallLimiter::new();
        let now = OffsetDateTime::now_utc();

        limiter.check_at("+14155551234", now).await.unwrap();

        limiter
            .check_at("+14155551234", now + Duration::minutes(61))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn distinct_numbers_isolated() {
        let limiter = DemoCallLimiter::new();
        let now = OffsetDateTime::now_utc();

        limiter.check_at("+14155551234", now).await.unwrap();
        limiter.check_at("+14155555678", now).await.unwrap();
    }

    #[tokio::test]
    async fn formatting_variants_share_one_slot() {
        let limiter = DemoCallLimiter::new();
        let now = OffsetDateTime::now_utc();

        limiter.check_at("+1 415-555-1234", now).await.unwrap();

        let err = limiter.check_at("+14155551234", now).await.unwrap_err();
        assert!(matches!(err, RateLimitError::RateLimited { .. }));
    }

    #[test]
    fn eviction_drops_expired_entries() {
        let now = OffsetDateTime::now_utc();
        let mut attempts = HashMap::new();
        attempts.insert("+14155550001".to_string(), now - Duration::hours(2));
        attempts.insert("+14155550002".to_string(), now - Duration::minutes(5));

        evict(&mut attempts, now);

        assert!(!attempts.contains_key("+14155550001"));
        assert!(attempts.contains_key("+14155550002"));
    }
}
