//! Call record building
//!
//! Turns a provider call-completion webhook into a stored `calls` row plus a
//! usage increment. The insert and the increment run in one transaction, keyed
//! by the provider call id for redelivery dedup, so a retried webhook can
//! never double-bill an account.

use serde::Deserialize;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use switchboard_billing::UsageMeter;

use crate::error::{VoiceError, VoiceResult};
use crate::transcript::{
    detect_urgency, extract_caller_name, summarize, Turn, SUMMARY_MAX_CHARS,
};

/// Call-completion payload posted by the voice provider.
#[derive(Debug, Clone, Deserialize)]
pub struct CallCompletedEvent {
    pub agent_id: String,
    /// Stable provider call reference. Optional: some call paths (tests,
    /// older agent versions) omit it, which disables dedup for that event.
    #[serde(default)]
    pub call_id: Option<String>,
    #[serde(default)]
    pub transcript: Vec<Turn>,
    #[serde(default)]
    pub caller_phone: Option<String>,
    #[serde(default)]
    pub duration_seconds: i32,
    /// Provider-generated summary, preferred over the local heuristic.
    #[serde(default)]
    pub summary: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    Recorded { call_id: Uuid },
    /// Redelivery of a call we already stored; nothing was written.
    Duplicate,
}

#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct CallRecord {
    pub id: Uuid,
    pub account_id: Uuid,
    pub provider_call_id: Option<String>,
    pub caller_name: Option<String>,
    pub caller_phone: Option<String>,
    pub duration_seconds: i32,
    pub summary: String,
    pub transcript: serde_json::Value,
    pub status: String,
    pub urgency: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub appointment_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Clone)]
pub struct CallRecorder {
    pool: PgPool,
}

impl CallRecorder {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Store a completed call and meter it against the account's quota.
    pub async fn record_call(&self, event: CallCompletedEvent) -> VoiceResult<CallOutcome> {
        let account_id: Option<(Uuid,)> = sqlx::query_as(
            "SELECT account_id FROM voice_agents WHERE provider_agent_id = $1",
        )
        .bind(&event.agent_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some((account_id,)) = account_id else {
            return Err(VoiceError::UnknownAgent(event.agent_id));
        };

        let caller_name = extract_caller_name(&event.transcript);
        let summary = match event.summary.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => text.chars().take(SUMMARY_MAX_CHARS).collect(),
            _ => summarize(&event.transcript),
        };
        let urgency = detect_urgency(&event.transcript);
        let transcript = serde_json::to_value(&event.transcript)
            .unwrap_or_else(|_| serde_json::Value::Array(Vec::new()));

        let mut tx = self.pool.begin().await?;

        let inserted: Option<(Uuid,)> = sqlx::query_as(
            r#"
            INSERT INTO calls (
                account_id, provider_call_id, caller_name, caller_phone,
                duration_seconds, summary, transcript, urgency
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (provider_call_id) WHERE provider_call_id IS NOT NULL
                DO NOTHING
            RETURNING id
            "#,
        )
        .bind(account_id)
        .bind(&event.call_id)
        .bind(&caller_name)
        .bind(&event.caller_phone)
        .bind(event.duration_seconds.max(0))
        .bind(&summary)
        .bind(&transcript)
        .bind(urgency.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let Some((call_id,)) = inserted else {
            tx.rollback().await?;
            tracing::info!(
                %account_id,
                provider_call_id = ?event.call_id,
                "Skipping duplicate call-completed delivery"
            );
            return Ok(CallOutcome::Duplicate);
        };

        UsageMeter::increment_calls_used(&mut *tx, account_id).await?;
        tx.commit().await?;

        tracing::info!(
            %account_id,
            %call_id,
            urgency = urgency.as_str(),
            caller_name = ?caller_name,
            "Recorded completed call"
        );

        Ok(CallOutcome::Recorded { call_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::{Role, SUMMARY_FALLBACK};

    fn event_json() -> &'static str {
        r#"{
            "agent_id": "agent_42",
            "call_id": "call_abc",
            "caller_phone": "+15551234567",
            "duration_seconds": 95,
            "transcript": [
                {"role": "agent", "content": "How can I help?"},
                {"role": "user", "content": "My name is Dana, my basement is flooding!"}
            ]
        }"#
    }

    #[test]
    fn parses_provider_payload() {
        let event: CallCompletedEvent = serde_json::from_str(event_json()).unwrap();
        assert_eq!(event.agent_id, "agent_42");
        assert_eq!(event.call_id.as_deref(), Some("call_abc"));
        assert_eq!(event.duration_seconds, 95);
        assert_eq!(event.transcript.len(), 2);
        assert_eq!(event.transcript[1].role, Role::Caller);
    }

    #[test]
    fn missing_optional_fields_default() {
        let event: CallCompletedEvent =
            serde_json::from_str(r#"{"agent_id": "agent_42"}"#).unwrap();
        assert!(event.call_id.is_none());
        assert!(event.transcript.is_empty());
        assert_eq!(event.duration_seconds, 0);
        assert!(event.summary.is_none());
    }

    #[test]
    fn derives_fields_the_way_the_pipeline_does() {
        let event: CallCompletedEvent = serde_json::from_str(event_json()).unwrap();
        assert_eq!(
            extract_caller_name(&event.transcript),
            Some("Dana".to_string())
        );
        assert_eq!(detect_urgency(&event.transcript), crate::transcript::Urgency::High);
        assert_eq!(
            summarize(&event.transcript),
            "My name is Dana, my basement is flooding!"
        );
    }

    #[test]
    fn empty_transcript_summary_falls_back() {
        let event: CallCompletedEvent =
            serde_json::from_str(r#"{"agent_id": "agent_42"}"#).unwrap();
        assert_eq!(summarize(&event.transcript), SUMMARY_FALLBACK);
    }
}
