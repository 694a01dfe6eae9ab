//! Static mess configuration: roster, identity map and shift policy.
//!
//! # Responsibility
//! - Load configuration from JSON once at startup.
//! - Reject configurations that reference unknown members.
//!
//! # Invariants
//! - Every identity maps to a rostered member.
//! - The roster is validated by `Roster` deserialization.

use crate::model::member::{MemberId, Roster};
use crate::service::context::StaticIdentityResolver;
use crate::service::shift::ShiftPolicy;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessConfig {
    pub members: Roster,
    /// Actor identity (e.g. login email) -> member id.
    #[serde(default)]
    pub identities: BTreeMap<String, MemberId>,
    #[serde(default)]
    pub shift_policy: ShiftPolicy,
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    /// Malformed JSON, or a roster that failed validation.
    Parse(serde_json::Error),
    UnknownIdentityMember { actor: String, member_id: MemberId },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read config: {err}"),
            Self::Parse(err) => write!(f, "invalid config: {err}"),
            Self::UnknownIdentityMember { actor, member_id } => write!(
                f,
                "identity `{actor}` maps to member {member_id}, which is not on the roster"
            ),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
            Self::UnknownIdentityMember { .. } => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

impl MessConfig {
    /// Parses and validates a JSON config document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates the config file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&text)?;
        info!(
            "event=config_load module=config status=ok members={} identities={} shift_policy={:?}",
            config.members.len(),
            config.identities.len(),
            config.shift_policy
        );
        Ok(config)
    }

    /// Resolver over the configured identity map.
    pub fn identity_resolver(&self) -> StaticIdentityResolver {
        StaticIdentityResolver::new(self.identities.clone())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (actor, member_id) in &self.identities {
            if !self.members.contains(*member_id) {
                return Err(ConfigError::UnknownIdentityMember {
                    actor: actor.clone(),
                    member_id: *member_id,
                });
            }
        }
        Ok(())
    }
}
