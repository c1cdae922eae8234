//! Agent domain model.
//!
//! An agent is a persona-driven chat participant with a stated objective.
//! Records are created and edited by the control plane; the fleet only starts
//! and stops runtime handles for them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque agent identity (the storage row id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub i64);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for AgentId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// A registered agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    /// The person who built and owns this agent.
    pub owner_name: String,
    /// Display name used in the shared channel.
    pub name: String,
    /// Credential used by the agent's transport connection. Never serialized.
    #[serde(skip_serializing, default)]
    pub credential: String,
    pub personality: String,
    pub objective: String,
    pub behavior_rules: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Fields required to register a new agent.
#[derive(Debug, Clone, Default)]
pub struct NewAgent {
    pub owner_name: String,
    pub name: String,
    pub credential: String,
    pub personality: String,
    pub objective: String,
    pub behavior_rules: String,
}

impl NewAgent {
    pub fn new(owner_name: impl Into<String>, name: impl Into<String>, credential: impl Into<String>) -> Self {
        Self {
            owner_name: owner_name.into(),
            name: name.into(),
            credential: credential.into(),
            ..Default::default()
        }
    }

    pub fn with_personality(mut self, personality: impl Into<String>) -> Self {
        self.personality = personality.into();
        self
    }

    pub fn with_objective(mut self, objective: impl Into<String>) -> Self {
        self.objective = objective.into();
        self
    }

    pub fn with_behavior_rules(mut self, rules: impl Into<String>) -> Self {
        self.behavior_rules = rules.into();
        self
    }

    /// Reject records the channel could not display.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("agent name cannot be empty".to_string());
        }
        if self.owner_name.trim().is_empty() {
            return Err("owner name cannot be empty".to_string());
        }
        Ok(())
    }
}

/// Partial update applied by the control plane. `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct AgentUpdate {
    pub owner_name: Option<String>,
    pub name: Option<String>,
    pub credential: Option<String>,
    pub personality: Option<String>,
    pub objective: Option<String>,
    pub behavior_rules: Option<String>,
    pub is_active: Option<bool>,
}

impl AgentUpdate {
    pub fn is_empty(&self) -> bool {
        self.owner_name.is_none()
            && self.name.is_none()
            && self.credential.is_none()
            && self.personality.is_none()
            && self.objective.is_none()
            && self.behavior_rules.is_none()
            && self.is_active.is_none()
    }

    pub fn apply_to(&self, agent: &mut Agent) {
        if let Some(v) = &self.owner_name {
            agent.owner_name.clone_from(v);
        }
        if let Some(v) = &self.name {
            agent.name.clone_from(v);
        }
        if let Some(v) = &self.credential {
            agent.credential.clone_from(v);
        }
        if let Some(v) = &self.personality {
            agent.personality.clone_from(v);
        }
        if let Some(v) = &self.objective {
            agent.objective.clone_from(v);
        }
        if let Some(v) = &self.behavior_rules {
            agent.behavior_rules.clone_from(v);
        }
        if let Some(v) = self.is_active {
            agent.is_active = v;
        }
    }
}

/// Activity counters used by grading and the `agent show` view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentStats {
    pub messages: i64,
    pub conversations: i64,
    pub human_interactions: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Agent {
        Agent {
            id: AgentId(1),
            owner_name: "Dana".to_string(),
            name: "LatteBot".to_string(),
            credential: "secret".to_string(),
            personality: String::new(),
            objective: String::new(),
            behavior_rules: String::new(),
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_update_applies_only_set_fields() {
        let mut agent = sample();
        let update = AgentUpdate {
            objective: Some("Sell oat milk".to_string()),
            is_active: Some(false),
            ..Default::default()
        };
        update.apply_to(&mut agent);
        assert_eq!(agent.objective, "Sell oat milk");
        assert!(!agent.is_active);
        assert_eq!(agent.name, "LatteBot");
    }

    #[test]
    fn test_empty_update() {
        assert!(AgentUpdate::default().is_empty());
        assert!(!AgentUpdate { name: Some("x".into()), ..Default::default() }.is_empty());
    }

    #[test]
    fn test_credential_not_serialized() {
        let json = serde_json::to_string(&sample()).unwrap();
        assert!(!json.contains("secret"));
    }

    #[test]
    fn test_new_agent_validation() {
        assert!(NewAgent::new("Dana", "LatteBot", "t").validate().is_ok());
        assert!(NewAgent::new("Dana", "  ", "t").validate().is_err());
        assert!(NewAgent::new("", "LatteBot", "t").validate().is_err());
    }
}
