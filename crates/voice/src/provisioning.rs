//! Receptionist agent provisioning
//!
//! Each account owns at most one receptionist agent. The local `voice_agents`
//! row is the source of truth for its settings; the provider-side agent is
//! kept in sync on every settings change. `provider_agent_id` is assigned the
//! first time an agent is provisioned and never reassigned after that.

use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::client::{AgentDefinition, VoiceProviderClient};
use crate::error::VoiceResult;

pub const DEFAULT_GREETING: &str = "Hi, thanks for calling! How can I help you today?";
pub const DEFAULT_VOICE_ID: &str = "default";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct VoiceAgentRecord {
    pub id: Uuid,
    pub account_id: Uuid,
    pub provider_agent_id: Option<String>,
    pub greeting: String,
    pub business_context: String,
    pub voice_id: String,
    pub phone_number: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Partial settings update; unset fields keep their current values.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct AgentSettings {
    pub greeting: Option<String>,
    pub business_context: Option<String>,
    pub voice_id: Option<String>,
}

#[derive(Clone)]
pub struct AgentProvisioner {
    pool: PgPool,
    client: VoiceProviderClient,
}

impl AgentProvisioner {
    pub fn new(pool: PgPool, client: VoiceProviderClient) -> Self {
        Self { pool, client }
    }

    pub async fn get_agent(&self, account_id: Uuid) -> VoiceResult<Option<VoiceAgentRecord>> {
        let record = sqlx::query_as::<_, VoiceAgentRecord>(
            "SELECT * FROM voice_agents WHERE account_id = $1",
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// Create or update the account's receptionist agent. Merges the partial
    /// settings over the stored row (or defaults for a first-time setup),
    /// syncs the persona to the provider, then upserts the local row.
    pub async fn setup_agent(
        &self,
        account_id: Uuid,
        business_name: &str,
        settings: AgentSettings,
    ) -> VoiceResult<VoiceAgentRecord> {
        let existing = self.get_agent(account_id).await?;

        let greeting = settings
            .greeting
            .or_else(|| existing.as_ref().map(|a| a.greeting.clone()))
            .unwrap_or_else(|| DEFAULT_GREETING.to_string());
        let business_context = settings
            .business_context
            .or_else(|| existing.as_ref().map(|a| a.business_context.clone()))
            .unwrap_or_default();
        let voice_id = settings
            .voice_id
            .or_else(|| existing.as_ref().map(|a| a.voice_id.clone()))
            .unwrap_or_else(|| DEFAULT_VOICE_ID.to_string());

        let definition = AgentDefinition::receptionist(business_name, &business_context, &greeting);

        let provider_agent_id = match existing.as_ref().and_then(|a| a.provider_agent_id.clone()) {
            Some(agent_id) => {
                self.client.update_agent(&agent_id, &definition).await?;
                agent_id
            }
            None => {
                let agent = self.client.create_agent(&definition).await?;
                tracing::info!(
                    %account_id,
                    provider_agent_id = %agent.agent_id,
                    "Provisioned receptionist agent"
                );
                agent.agent_id
            }
        };

        let record = sqlx::query_as::<_, VoiceAgentRecord>(
            r#"
            INSERT INTO voice_agents (account_id, provider_agent_id, greeting, business_context, voice_id)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (account_id) DO UPDATE SET
                provider_agent_id = COALESCE(voice_agents.provider_agent_id, EXCLUDED.provider_agent_id),
                greeting = EXCLUDED.greeting,
                business_context = EXCLUDED.business_context,
                voice_id = EXCLUDED.voice_id,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(account_id)
        .bind(&provider_agent_id)
        .bind(&greeting)
        .bind(&business_context)
        .bind(&voice_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }
}
