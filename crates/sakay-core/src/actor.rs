//! # Actors
//!
//! Who performed an operation. The identity provider authenticates the
//! principal; the engine only checks the role and identifier it is handed.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::identity::{FulfillerId, RequesterId};

/// The role a principal acts in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Rider or orderer.
    Requester,
    /// Driver, courier or merchant.
    Fulfiller,
    /// Back-office operator.
    Operator,
}

impl Role {
    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Requester => "requester",
            Self::Fulfiller => "fulfiller",
            Self::Operator => "operator",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "requester" => Ok(Self::Requester),
            "fulfiller" => Ok(Self::Fulfiller),
            "operator" => Ok(Self::Operator),
            _ => Err(ValidationError::UnknownVariant {
                kind: "role",
                value: s.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The party responsible for a transition or operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "role", content = "id", rename_all = "snake_case")]
pub enum Actor {
    /// The requester who owns the request.
    Requester(RequesterId),
    /// A driver or merchant.
    Fulfiller(FulfillerId),
    /// A back-office operator, identified by their login.
    Operator(String),
    /// The engine itself (dispatch loop, expiry).
    System,
}

impl Actor {
    /// Build an actor from an authenticated principal.
    pub fn from_principal(role: Role, id: &str) -> Result<Self, ValidationError> {
        match role {
            Role::Requester => Ok(Self::Requester(RequesterId::new(id)?)),
            Role::Fulfiller => Ok(Self::Fulfiller(FulfillerId::new(id)?)),
            Role::Operator => {
                let id = id.trim();
                if id.is_empty() {
                    return Err(ValidationError::Missing("operator id"));
                }
                Ok(Self::Operator(id.to_string()))
            }
        }
    }

    /// The role this actor holds, or `None` for the engine itself.
    pub fn role(&self) -> Option<Role> {
        match self {
            Self::Requester(_) => Some(Role::Requester),
            Self::Fulfiller(_) => Some(Role::Fulfiller),
            Self::Operator(_) => Some(Role::Operator),
            Self::System => None,
        }
    }

    /// Whether this actor is an operator.
    pub fn is_operator(&self) -> bool {
        matches!(self, Self::Operator(_))
    }

    /// Whether this actor is the given requester.
    pub fn is_requester(&self, requester: &RequesterId) -> bool {
        matches!(self, Self::Requester(id) if id == requester)
    }

    /// Whether this actor is the given fulfiller.
    pub fn is_fulfiller(&self, fulfiller: &FulfillerId) -> bool {
        matches!(self, Self::Fulfiller(id) if id == fulfiller)
    }
}

impl std::fmt::Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Requester(id) => write!(f, "requester:{id}"),
            Self::Fulfiller(id) => write!(f, "fulfiller:{id}"),
            Self::Operator(id) => write!(f, "operator:{id}"),
            Self::System => f.write_str("system"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actor_from_principal() {
        let actor = Actor::from_principal(Role::Fulfiller, "driver-9").unwrap();
        assert_eq!(actor.role(), Some(Role::Fulfiller));
        assert!(actor.is_fulfiller(&FulfillerId::new("driver-9").unwrap()));
        assert!(Actor::from_principal(Role::Operator, " ").is_err());
    }

    #[test]
    fn test_actor_display() {
        let rider = Actor::Requester(RequesterId::new("rider-1").unwrap());
        assert_eq!(rider.to_string(), "requester:rider-1");
        assert_eq!(Actor::System.to_string(), "system");
    }

    #[test]
    fn test_actor_serde_is_tagged() {
        let rider = Actor::Requester(RequesterId::new("rider-1").unwrap());
        let json = serde_json::to_value(&rider).unwrap();
        assert_eq!(json["role"], "requester");
        assert_eq!(json["id"], "rider-1");
        let system = serde_json::to_value(Actor::System).unwrap();
        assert_eq!(system["role"], "system");
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("Operator".parse::<Role>().unwrap(), Role::Operator);
        assert!("admin".parse::<Role>().is_err());
    }
}
