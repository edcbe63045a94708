//! Game-facing types shared by the player server and decision service.
//!
//! Night-ability contexts form a closed, role-tagged set: each variant
//! carries exactly the fields that role's decision needs, and dispatch is a
//! match over the tag rather than probing loose fields.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub type PlayerId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Villager,
    Werewolf,
    Seer,
    Witch,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Villager => write!(f, "villager"),
            Role::Werewolf => write!(f, "werewolf"),
            Role::Seer => write!(f, "seer"),
            Role::Witch => write!(f, "witch"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GamePhase {
    Day,
    Voting,
    Night,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerInfo {
    pub id: PlayerId,
    pub is_alive: bool,
}

/// One speech in the public record, keyed by round in `all_speeches`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Speech {
    pub player_id: PlayerId,
    pub content: String,
}

/// Game situation shared by every role's decisions.
///
/// `all_speeches` is keyed by the round number as a string. JSON object
/// keys are strings anyway, and the role-tagged contexts flatten this
/// struct through serde's content buffer, which only round-trips string
/// keys (same reason `Seer::investigated` is string-keyed).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerContext {
    pub round: u32,
    pub current_phase: GamePhase,
    pub alive_players: Vec<PlayerInfo>,
    #[serde(default)]
    pub all_speeches: BTreeMap<String, Vec<Speech>>,
}

/// Role assignment received at game start; held for the rest of the game.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub game_id: String,
    pub player_id: PlayerId,
    pub role: Role,
    #[serde(default)]
    pub teammates: Vec<PlayerId>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PotionUsed {
    pub heal: bool,
    pub poison: bool,
}

/// A past seer investigation result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Investigation {
    pub target: PlayerId,
    pub is_good: bool,
}

/// Night-ability context, tagged by role.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum RoleContext {
    Villager {
        #[serde(flatten)]
        context: PlayerContext,
    },
    Werewolf {
        #[serde(flatten)]
        context: PlayerContext,
    },
    Seer {
        #[serde(flatten)]
        context: PlayerContext,
        #[serde(default)]
        investigated: BTreeMap<String, Investigation>,
    },
    Witch {
        #[serde(flatten)]
        context: PlayerContext,
        killed_tonight: Option<PlayerId>,
        #[serde(default)]
        potion_used: PotionUsed,
    },
}

impl RoleContext {
    pub fn role(&self) -> Role {
        match self {
            RoleContext::Villager { .. } => Role::Villager,
            RoleContext::Werewolf { .. } => Role::Werewolf,
            RoleContext::Seer { .. } => Role::Seer,
            RoleContext::Witch { .. } => Role::Witch,
        }
    }

    pub fn context(&self) -> &PlayerContext {
        match self {
            RoleContext::Villager { context }
            | RoleContext::Werewolf { context }
            | RoleContext::Seer { context, .. }
            | RoleContext::Witch { context, .. } => context,
        }
    }
}

// ── Decision responses ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechResponse {
    pub speech: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteResponse {
    pub target: PlayerId,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct KillAction {
    pub target: PlayerId,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct InvestigateAction {
    pub target: PlayerId,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WitchAction {
    pub use_heal: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heal_target: Option<PlayerId>,
    pub use_poison: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poison_target: Option<PlayerId>,
}

/// The result of a night ability, shape depending on the role.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(untagged)]
pub enum NightAction {
    Witch(WitchAction),
    Kill(KillAction),
    Investigate(InvestigateAction),
}

// ── Player status (probe target payload) ──────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusConfig {
    pub personality: String,
}

/// Payload of the player's own status endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStatus {
    pub game_id: Option<String>,
    pub player_id: Option<PlayerId>,
    pub role: Option<Role>,
    pub teammates: Vec<PlayerId>,
    pub is_alive: bool,
    pub config: StatusConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> PlayerContext {
        PlayerContext {
            round: 2,
            current_phase: GamePhase::Night,
            alive_players: vec![
                PlayerInfo {
                    id: 1,
                    is_alive: true,
                },
                PlayerInfo {
                    id: 3,
                    is_alive: true,
                },
            ],
            all_speeches: BTreeMap::new(),
        }
    }

    #[test]
    fn role_context_is_tagged_by_role() {
        let witch = RoleContext::Witch {
            context: context(),
            killed_tonight: Some(3),
            potion_used: PotionUsed {
                heal: true,
                poison: false,
            },
        };

        let value = serde_json::to_value(&witch).unwrap();
        assert_eq!(value["role"], "witch");
        assert_eq!(value["killedTonight"], 3);
        assert_eq!(value["potionUsed"]["heal"], true);
        // Flattened shared context sits at the top level.
        assert_eq!(value["currentPhase"], "night");
        assert_eq!(value["round"], 2);
    }

    #[test]
    fn role_context_round_trips_with_speech_history() {
        let mut ctx = context();
        ctx.all_speeches.insert(
            "1".to_string(),
            vec![Speech {
                player_id: 3,
                content: "I was home all night".to_string(),
            }],
        );
        let wolf = RoleContext::Werewolf { context: ctx };

        let value = serde_json::to_value(&wolf).unwrap();
        assert_eq!(value["allSpeeches"]["1"][0]["playerId"], 3);

        let parsed: RoleContext = serde_json::from_value(value).unwrap();
        assert_eq!(parsed.role(), Role::Werewolf);
        let speeches = &parsed.context().all_speeches["1"];
        assert_eq!(speeches[0].content, "I was home all night");
    }

    #[test]
    fn role_context_deserializes_by_tag() {
        let json = serde_json::json!({
            "role": "seer",
            "round": 1,
            "currentPhase": "night",
            "alivePlayers": [{"id": 2, "isAlive": true}],
            "investigated": {"1": {"target": 4, "isGood": false}}
        });

        let parsed: RoleContext = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.role(), Role::Seer);
        match parsed {
            RoleContext::Seer { investigated, .. } => {
                assert!(!investigated["1"].is_good);
            }
            _ => panic!("Expected seer variant"),
        }
    }

    #[test]
    fn villager_context_has_no_extra_fields() {
        let json = serde_json::json!({
            "role": "villager",
            "round": 1,
            "currentPhase": "day",
            "alivePlayers": []
        });
        let parsed: RoleContext = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.role(), Role::Villager);
        assert_eq!(parsed.context().round, 1);
    }

    #[test]
    fn witch_action_omits_unused_targets() {
        let action = NightAction::Witch(WitchAction {
            use_heal: false,
            heal_target: None,
            use_poison: true,
            poison_target: Some(5),
        });
        let value = serde_json::to_value(action).unwrap();
        assert!(value.get("healTarget").is_none());
        assert_eq!(value["poisonTarget"], 5);
    }

    #[test]
    fn game_state_defaults_teammates() {
        let state: GameState = serde_json::from_value(serde_json::json!({
            "gameId": "g1",
            "playerId": 4,
            "role": "werewolf"
        }))
        .unwrap();
        assert!(state.teammates.is_empty());
        assert_eq!(state.role, Role::Werewolf);
    }
}
