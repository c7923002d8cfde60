//! Voice pipeline: receptionist agent provisioning, transcript analysis, and
//! call record building.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod client;
pub mod error;
pub mod provisioning;
pub mod recorder;
pub mod transcript;

pub use client::{AgentDefinition, VoiceConfig, VoiceProviderClient};
pub use error::{VoiceError, VoiceResult};
pub use provisioning::{AgentProvisioner, AgentSettings, VoiceAgentRecord};
pub use recorder::{CallCompletedEvent, CallOutcome, CallRecord, CallRecorder};
pub use transcript::{detect_urgency, extract_caller_name, summarize, Role, Turn, Urgency};

use sqlx::PgPool;

/// Aggregates the voice services behind one handle for the HTTP layer.
#[derive(Clone)]
pub struct VoiceService {
    pub client: VoiceProviderClient,
    pub provisioner: AgentProvisioner,
    pub recorder: CallRecorder,
}

impl VoiceService {
    pub fn new(pool: PgPool, config: VoiceConfig) -> Self {
        let client = VoiceProviderClient::new(config);
        Self {
            provisioner: AgentProvisioner::new(pool.clone(), client.clone()),
            recorder: CallRecorder::new(pool),
            client,
        }
    }

    pub fn from_env(pool: PgPool) -> VoiceResult<Self> {
        Ok(Self::new(pool, VoiceConfig::from_env()?))
    }
}
