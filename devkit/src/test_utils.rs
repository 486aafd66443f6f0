/*!
Test harness for the watcher

Starts a stub Minecraft server and a stub Discord API side by side, and
offers waiting helpers for assertions on what got posted.
*/

use crate::discord_stub::{PostedMessage, StubDiscordApi};
use crate::status_stub::{StubMode, StubStatusServer};
use anyhow::Result;
use std::time::Duration;

pub struct TestHarness {
    pub status: StubStatusServer,
    pub discord: StubDiscordApi,
}

impl TestHarness {
    pub async fn start(mode: StubMode) -> Result<Self> {
        init_tracing();
        Ok(Self {
            status: StubStatusServer::start(mode).await?,
            discord: StubDiscordApi::start().await?,
        })
    }

    /// Environment a watcher needs to talk to both stubs.
    pub fn env(&self, channel_id: &str) -> Vec<(String, String)> {
        vec![
            ("DISCORD_TOKEN".into(), "stub-token".into()),
            ("DISCORD_API_BASE".into(), self.discord.api_base()),
            ("MC_HOST".into(), self.status.address()),
            ("STATUS_CHANNEL_ID".into(), channel_id.into()),
        ]
    }

    /// Polls until at least `count` messages were posted or `timeout_ms`
    /// elapsed; returns what was posted either way.
    pub async fn wait_for_messages(&self, count: usize, timeout_ms: u64) -> Vec<PostedMessage> {
        let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
        loop {
            let messages = self.discord.messages();
            if messages.len() >= count || tokio::time::Instant::now() >= deadline {
                if messages.len() < count {
                    tracing::warn!(expected = count, got = messages.len(), "timeout waiting for messages");
                }
                return messages;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    /// Fails unless exactly `expected` messages have been posted.
    pub fn assert_message_count(&self, expected: usize) -> Result<()> {
        let actual = self.discord.messages().len();
        anyhow::ensure!(
            actual == expected,
            "expected {expected} posted messages, got {actual}: {:?}",
            self.discord.messages()
        );
        Ok(())
    }
}

/// Test logging; safe to call more than once.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init()
        .ok();
}
