//! Voice provider configuration and REST client
//!
//! Covers the conversational-agent management API (create/update agents) and
//! the telephony bridge used to place demo calls.

use serde::{Deserialize, Serialize};

use crate::error::{VoiceError, VoiceResult};

const DEFAULT_API_BASE: &str = "https://api.voice.example.com/v1";

/// Voice configuration loaded from the environment. Telephony settings are
/// optional; demo calling returns an explicit "not configured" error without
/// them instead of failing at startup.
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    pub api_key: String,
    pub api_base: String,
    /// Pre-provisioned agent used for marketing demo calls.
    pub demo_agent_id: Option<String>,
    pub outbound_phone_number: Option<String>,
}

impl VoiceConfig {
    pub fn from_env() -> VoiceResult<Self> {
        Ok(Self {
            api_key: std::env::var("VOICE_API_KEY")
                .map_err(|_| VoiceError::Config("VOICE_API_KEY must be set".to_string()))?,
            api_base: std::env::var("VOICE_API_BASE")
                .unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
            demo_agent_id: std::env::var("VOICE_DEMO_AGENT_ID").ok(),
            outbound_phone_number: std::env::var("VOICE_OUTBOUND_NUMBER").ok(),
        })
    }
}

/// Behavior settings for a receptionist agent, as sent to the provider.
#[derive(Debug, Clone, Serialize)]
pub struct AgentDefinition {
    pub name: String,
    pub prompt: String,
    pub first_message: String,
}

impl AgentDefinition {
    /// Renders the receptionist persona from the business profile.
    pub fn receptionist(business_name: &str, business_context: &str, greeting: &str) -> Self {
        let mut prompt = format!(
            "You are a friendly and professional phone receptionist for {business_name}. \
             Greet callers warmly, find out why they are calling, collect their name \
             and a callback number, and summarize the reason for the call. \
             If the caller describes an emergency, tell them help will be \
             dispatched as soon as possible. Keep responses short and natural."
        );
        if !business_context.trim().is_empty() {
            prompt.push_str(&format!(" About the business: {business_context}"));
        }

        Self {
            name: format!("{business_name} Receptionist"),
            prompt,
            first_message: greeting.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentRef {
    pub agent_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutboundCallRef {
    pub call_id: String,
}

/// REST client for the voice provider.
#[derive(Clone)]
pub struct VoiceProviderClient {
    http: reqwest::Client,
    config: VoiceConfig,
}

impl VoiceProviderClient {
    pub fn new(config: VoiceConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &VoiceConfig {
        &self.config
    }

    /// Provision a new conversational agent.
    pub async fn create_agent(&self, definition: &AgentDefinition) -> VoiceResult<AgentRef> {
        self.send(reqwest::Method::POST, "/agents", definition).await
    }

    /// Update an existing agent's persona in place.
    pub async fn update_agent(
        &self,
        agent_id: &str,
        definition: &AgentDefinition,
    ) -> VoiceResult<AgentRef> {
        let path = format!("/agents/{agent_id}");
        self.send(reqwest::Method::PATCH, &path, definition).await
    }

    /// Place an outbound call from the demo agent to a caller-supplied number.
    pub async fn initiate_outbound_call(&self, to_number: &str) -> VoiceResult<OutboundCallRef> {
        let agent_id = self
            .config
            .demo_agent_id
            .as_deref()
            .ok_or(VoiceError::OutboundNotConfigured)?;
        let from_number = self
            .config
            .outbound_phone_number
            .as_deref()
            .ok_or(VoiceError::OutboundNotConfigured)?;

        let body = serde_json::json!({
            "agent_id": agent_id,
            "from_number": from_number,
            "to_number": to_number,
        });

        self.send(reqwest::Method::POST, "/calls/outbound", &body)
            .await
    }

    async fn send<B: Serialize, T: serde::de::DeserializeOwned>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: &B,
    ) -> VoiceResult<T> {
        let url = format!("{}{}", self.config.api_base, path);

        let response = self
            .http
            .request(method, &url)
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            tracing::error!(%status, path, body = %text, "Voice provider request failed");
            return Err(VoiceError::ProviderApi(format!("{path} returned {status}")));
        }

        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(api_base: String) -> VoiceConfig {
        VoiceConfig {
            api_key: "vk_test_123".to_string(),
            api_base,
            demo_agent_id: Some("agent_demo".to_string()),
            outbound_phone_number: Some("+15550001111".to_string()),
        }
    }

    #[test]
    fn receptionist_prompt_includes_business_profile() {
        let def = AgentDefinition::receptionist(
            "Apex Plumbing",
            "Drain cleaning and water heaters, Mon-Fri 8am-6pm.",
            "Thanks for calling Apex Plumbing!",
        );
        assert!(def.prompt.contains("Apex Plumbing"));
        assert!(def.prompt.contains("Drain cleaning"));
        assert_eq!(def.first_message, "Thanks for calling Apex Plumbing!");
    }

    #[test]
    fn receptionist_prompt_omits_empty_context() {
        let def = AgentDefinition::receptionist("Apex Plumbing", "  ", "Hello!");
        assert!(!def.prompt.contains("About the business"));
    }

    #[tokio::test]
    async fn create_agent_posts_json() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/agents")
            .match_header("authorization", "Bearer vk_test_123")
            .with_status(200)
            .with_body(r#"{"agent_id":"agent_42"}"#)
            .create_async()
            .await;

        let client = VoiceProviderClient::new(test_config(server.url()));
        let def = AgentDefinition::receptionist("Apex Plumbing", "Residential plumbing.", "Hello!");
        let agent = client.create_agent(&def).await.unwrap();

        mock.assert_async().await;
        assert_eq!(agent.agent_id, "agent_42");
    }

    #[tokio::test]
    async fn outbound_call_requires_telephony_config() {
        let config = VoiceConfig {
            demo_agent_id: None,
            ..test_config("http://unused".to_string())
        };
        let client = VoiceProviderClient::new(config);

        let err = client.initiate_outbound_call("+15551234567").await.unwrap_err();
        assert!(matches!(err, VoiceError::OutboundNotConfigured));
    }

    #[tokio::test]
    async fn provider_error_status_is_surfaced() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/calls/outbound")
            .with_status(500)
            .with_body(r#"{"error":"internal"}"#)
            .create_async()
            .await;

        let client = VoiceProviderClient::new(test_config(server.url()));
        let err = client.initiate_outbound_call("+15551234567").await.unwrap_err();
        assert!(matches!(err, VoiceError::ProviderApi(_)));
    }
}
