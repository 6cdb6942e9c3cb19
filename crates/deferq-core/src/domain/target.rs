//! What a task invokes: a captured instance or a type reference.

use serde::{Deserialize, Serialize};

use crate::typed::Target;

/// How a method is reached on a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Receiver {
    /// Called on a decoded instance (`&self`).
    Instance,
    /// Called on the type itself, no instance involved.
    Type,
}

/// The target half of a task, exactly one of a captured payload or a type
/// reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TargetRef {
    Instance {
        type_name: String,
        state: serde_json::Value,
    },
    Type {
        type_name: String,
    },
}

impl TargetRef {
    /// Capture `target` by value.
    pub fn instance<T: Target>(target: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::Instance {
            type_name: T::TYPE.to_string(),
            state: serde_json::to_value(target)?,
        })
    }

    pub fn of_type<T: Target>() -> Self {
        Self::named(T::TYPE)
    }

    /// Reference a type by name. Whether it resolves is checked at `create()`.
    pub fn named(type_name: impl Into<String>) -> Self {
        Self::Type {
            type_name: type_name.into(),
        }
    }

    pub fn type_name(&self) -> &str {
        match self {
            Self::Instance { type_name, .. } | Self::Type { type_name } => type_name,
        }
    }

    pub fn receiver(&self) -> Receiver {
        match self {
            Self::Instance { .. } => Receiver::Instance,
            Self::Type { .. } => Receiver::Type,
        }
    }

    pub fn state(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Instance { state, .. } => Some(state),
            Self::Type { .. } => None,
        }
    }
}
