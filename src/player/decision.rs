//! Decision making for a player, backed by an OpenAI-compatible chat API.
//!
//! Every decision goes through the same path: build a short prompt from the
//! persona and the game situation, ask the model for a JSON object, parse it
//! into the typed response. The trait seam lets the server run against a
//! canned implementation in tests.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, warn};

use crate::config::PlayerConfig;
use crate::player::types::{
    GameState, InvestigateAction, KillAction, NightAction, PlayerContext, RoleContext,
    SpeechResponse, VoteResponse, WitchAction,
};

/// The brain of a player. One implementation per backing model/provider.
#[async_trait]
pub trait DecisionService: Send + Sync {
    /// Produce a day-phase speech.
    async fn speak(&self, state: &GameState, context: &PlayerContext) -> Result<SpeechResponse>;

    /// Pick a vote target.
    async fn vote(&self, state: &GameState, context: &PlayerContext) -> Result<VoteResponse>;

    /// Use the role's night ability. Villagers have none and always fail.
    async fn night_action(&self, state: &GameState, context: &RoleContext) -> Result<NightAction>;

    /// Final statement after elimination.
    async fn last_words(&self, state: &GameState) -> Result<String>;
}

/// `DecisionService` that calls the configured chat-completions endpoint.
pub struct LlmDecisionService {
    config: PlayerConfig,
    client: reqwest::Client,
    api_key: Option<String>,
}

impl LlmDecisionService {
    /// Build from a player configuration, reading the provider's API key
    /// from the environment. A missing key is not an error until a decision
    /// actually needs the model.
    pub fn new(config: PlayerConfig) -> Self {
        let api_key = std::env::var(config.ai.provider.api_key_var()).ok();
        if api_key.is_none() {
            warn!(
                var = config.ai.provider.api_key_var(),
                "api key not set; decisions will fail"
            );
        }
        Self {
            config,
            client: reqwest::Client::new(),
            api_key,
        }
    }

    fn persona(&self) -> String {
        let game = &self.config.game;
        let mut persona = format!(
            "You are playing a werewolf game. Strategy: {}. Speaking style: {}.",
            game.strategy, game.speaking_style
        );
        if !game.personality.is_empty() {
            persona.push_str(&format!(" Personality: {}.", game.personality));
        }
        persona
    }

    fn situation(state: &GameState, context: &PlayerContext) -> String {
        let alive: Vec<String> = context
            .alive_players
            .iter()
            .map(|p| p.id.to_string())
            .collect();
        let mut lines = format!(
            "You are player {} with role {}. Round {}, phase {:?}. Alive players: [{}].",
            state.player_id,
            state.role,
            context.round,
            context.current_phase,
            alive.join(", ")
        );
        if !state.teammates.is_empty() {
            let mates: Vec<String> = state.teammates.iter().map(|t| t.to_string()).collect();
            lines.push_str(&format!(" Your teammates: [{}].", mates.join(", ")));
        }
        if let Some(speeches) = context.all_speeches.get(&context.round.to_string()) {
            for speech in speeches {
                lines.push_str(&format!(
                    "\nPlayer {} said: {}",
                    speech.player_id, speech.content
                ));
            }
        }
        lines
    }

    /// Ask the model for a JSON object and parse it as `T`.
    async fn generate<T: DeserializeOwned>(&self, prompt: String) -> Result<T> {
        let Some(api_key) = &self.api_key else {
            bail!(
                "{} is not set; cannot reach the model",
                self.config.ai.provider.api_key_var()
            );
        };

        let url = format!("{}/chat/completions", self.config.ai.provider.base_url());
        debug!(model = %self.config.ai.model, "requesting decision");

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&json!({
                "model": self.config.ai.model,
                "max_tokens": self.config.ai.max_tokens,
                "temperature": self.config.ai.temperature,
                "messages": [
                    { "role": "system", "content": self.persona() },
                    { "role": "user", "content": prompt },
                ],
            }))
            .send()
            .await
            .context("Failed to reach chat-completions endpoint")?
            .error_for_status()
            .context("Chat-completions request was rejected")?;

        let body: serde_json::Value = response
            .json()
            .await
            .context("Failed to read chat-completions response")?;
        let content = extract_content(&body)?;
        parse_reply(&content)
    }
}

/// Pull the assistant message text out of a chat-completions response.
fn extract_content(body: &serde_json::Value) -> Result<String> {
    body["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .context("Chat-completions response had no message content")
}

/// Parse a model reply as JSON, tolerating a ```json fence around it.
fn parse_reply<T: DeserializeOwned>(content: &str) -> Result<T> {
    let trimmed = content.trim();
    let inner = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.strip_suffix("```"))
        .unwrap_or(trimmed);
    serde_json::from_str(inner.trim())
        .with_context(|| format!("Model reply was not the expected JSON: {content}"))
}

#[async_trait]
impl DecisionService for LlmDecisionService {
    async fn speak(&self, state: &GameState, context: &PlayerContext) -> Result<SpeechResponse> {
        let prompt = format!(
            "{}\n\nGive your speech for this round. Reply with JSON: {{\"speech\": \"...\"}}",
            Self::situation(state, context)
        );
        self.generate(prompt).await
    }

    async fn vote(&self, state: &GameState, context: &PlayerContext) -> Result<VoteResponse> {
        let prompt = format!(
            "{}\n\nVote to eliminate one alive player. Reply with JSON: \
             {{\"target\": <player id>, \"reason\": \"...\"}}",
            Self::situation(state, context)
        );
        self.generate(prompt).await
    }

    async fn night_action(&self, state: &GameState, context: &RoleContext) -> Result<NightAction> {
        match context {
            RoleContext::Villager { .. } => {
                bail!("Villagers have no night action")
            }
            RoleContext::Werewolf { context } => {
                let prompt = format!(
                    "{}\n\nChoose a player to kill tonight. Reply with JSON: \
                     {{\"target\": <player id>}}",
                    Self::situation(state, context)
                );
                let action: KillAction = self.generate(prompt).await?;
                Ok(NightAction::Kill(action))
            }
            RoleContext::Seer {
                context,
                investigated,
            } => {
                let known: Vec<String> = investigated
                    .values()
                    .map(|i| {
                        format!(
                            "player {} is {}",
                            i.target,
                            if i.is_good { "good" } else { "a werewolf" }
                        )
                    })
                    .collect();
                let prompt = format!(
                    "{}\nInvestigations so far: [{}].\n\nChoose a player to investigate. \
                     Reply with JSON: {{\"target\": <player id>}}",
                    Self::situation(state, context),
                    known.join("; ")
                );
                let action: InvestigateAction = self.generate(prompt).await?;
                Ok(NightAction::Investigate(action))
            }
            RoleContext::Witch {
                context,
                killed_tonight,
                potion_used,
            } => {
                let kill_line = match killed_tonight {
                    Some(victim) => format!("Player {victim} was attacked tonight."),
                    None => "Nobody was attacked tonight.".to_string(),
                };
                let prompt = format!(
                    "{}\n{}\nHeal potion used: {}. Poison potion used: {}.\n\n\
                     Decide whether to heal and/or poison. Reply with JSON: \
                     {{\"useHeal\": bool, \"healTarget\": <id or null>, \
                     \"usePoison\": bool, \"poisonTarget\": <id or null>}}",
                    Self::situation(state, context),
                    kill_line,
                    potion_used.heal,
                    potion_used.poison
                );
                let action: WitchAction = self.generate(prompt).await?;
                Ok(NightAction::Witch(action))
            }
        }
    }

    async fn last_words(&self, state: &GameState) -> Result<String> {
        let prompt = format!(
            "You are player {} ({}) and you have just been eliminated. Give a short \
             final statement. Reply with JSON: {{\"speech\": \"...\"}}",
            state.player_id, state.role
        );
        let reply: SpeechResponse = self.generate(prompt).await?;
        Ok(reply.speech)
    }
}
