/**
 * DISCORD - thin REST client and interaction verification
 *
 * ROLE:
 * - post a message to a channel (notification delivery)
 * - resolve the application id and register the guild `players` command
 * - verify Ed25519 signatures on incoming HTTP interactions
 *
 * Only the endpoints the watcher needs; no gateway connection.
 */

use crate::config::DiscordConf;
use crate::error::DiscordError;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

pub const PLAYERS_COMMAND: &str = "players";

/// Slash command definition as sent to the registration endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct CommandDefinition {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "type")]
    pub kind: u8,
}

pub fn players_command() -> CommandDefinition {
    CommandDefinition {
        name: PLAYERS_COMMAND,
        description: "Show Minecraft server player count and usernames",
        kind: 1,
    }
}

#[derive(Debug, Deserialize)]
struct ApplicationInfo {
    id: String,
}

#[derive(Clone)]
pub struct DiscordClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
}

impl DiscordClient {
    pub fn new(conf: &DiscordConf) -> Result<Self, DiscordError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent(concat!("mcwatch/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            api_base: conf.api_base.clone(),
            token: conf.token.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.header(reqwest::header::AUTHORIZATION, format!("Bot {}", self.token))
    }

    pub async fn send_message(&self, channel_id: &str, content: &str) -> Result<(), DiscordError> {
        let request = self
            .http
            .post(self.url(&format!("/channels/{channel_id}/messages")))
            .json(&serde_json::json!({ "content": content }));
        let response = self.authorized(request).send().await?;
        check_status(response).await?;
        debug!(channel_id, "message posted");
        Ok(())
    }

    pub async fn application_id(&self) -> Result<String, DiscordError> {
        let request = self.http.get(self.url("/oauth2/applications/@me"));
        let response = check_status(self.authorized(request).send().await?).await?;
        let info: ApplicationInfo = response.json().await?;
        Ok(info.id)
    }

    /// Replaces the guild's command set with `commands`.
    pub async fn register_guild_commands(
        &self,
        application_id: &str,
        guild_id: &str,
        commands: &[CommandDefinition],
    ) -> Result<(), DiscordError> {
        let request = self
            .http
            .put(self.url(&format!("/applications/{application_id}/guilds/{guild_id}/commands")))
            .json(commands);
        check_status(self.authorized(request).send().await?).await?;
        info!(guild_id, count = commands.len(), "slash commands registered");
        Ok(())
    }
}

/// Registers `players` in the configured guild. Returns `false` when no
/// guild is configured.
pub async fn register_players_command(client: &DiscordClient, conf: &DiscordConf) -> Result<bool, DiscordError> {
    let Some(guild_id) = conf.guild_id.as_deref() else {
        return Ok(false);
    };
    let application_id = match &conf.application_id {
        Some(id) => id.clone(),
        None => client.application_id().await?,
    };
    client
        .register_guild_commands(&application_id, guild_id, &[players_command()])
        .await?;
    Ok(true)
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, DiscordError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(DiscordError::Status { status: status.as_u16(), body })
}

/// Parses the application's hex public key.
pub fn parse_public_key(hex_key: &str) -> Result<VerifyingKey, DiscordError> {
    let bytes = hex::decode(hex_key.trim()).map_err(|_| DiscordError::InvalidPublicKey)?;
    let bytes: [u8; 32] = bytes.try_into().map_err(|_| DiscordError::InvalidPublicKey)?;
    VerifyingKey::from_bytes(&bytes).map_err(|_| DiscordError::InvalidPublicKey)
}

/// Checks the interaction signature over `timestamp ‖ body`.
pub fn verify_interaction(key: &VerifyingKey, signature_hex: &str, timestamp: &str, body: &[u8]) -> bool {
    let Ok(raw) = hex::decode(signature_hex) else { return false };
    let Ok(raw) = <[u8; 64]>::try_from(raw.as_slice()) else { return false };
    let signature = Signature::from_bytes(&raw);

    let mut message = Vec::with_capacity(timestamp.len() + body.len());
    message.extend_from_slice(timestamp.as_bytes());
    message.extend_from_slice(body);
    key.verify(&message, &signature).is_ok()
}
