//! Principal and role types supplied by the identity collaborator.
//!
//! Every operation arrives with a `{principal_id, role}` pair. This core
//! performs authorization checks against it but never issues or validates
//! credentials itself.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// Which side of the coaching relationship a principal is on.
///
/// Doubles as the sender role on appointment messages: a message is always
/// authored by one of the two parties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Participant,
    Coach,
}

impl Role {
    /// The other party in the conversation.
    pub fn counterpart(&self) -> Role {
        match self {
            Role::Participant => Role::Coach,
            Role::Coach => Role::Participant,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Participant => write!(f, "participant"),
            Role::Coach => write!(f, "coach"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "participant" => Ok(Role::Participant),
            "coach" => Ok(Role::Coach),
            other => Err(format!("invalid role: '{other}'")),
        }
    }
}

/// An authenticated caller, as resolved by the identity collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: Uuid,
    pub role: Role,
}

impl Principal {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }
}
