//! Administrative control events.

use serde::{Deserialize, Serialize};

use crate::proxy::handler::SharedHandler;
use crate::routing::RoutingError;

/// What a control event asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlAction {
    Add,
    Remove,
}

impl ControlAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlAction::Add => "add",
            ControlAction::Remove => "remove",
        }
    }
}

/// Add or remove one backend instance of a subdomain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlEvent {
    pub action: ControlAction,
    pub subdomain: String,
    pub address: String,
    pub port: u16,
}

impl ControlEvent {
    pub fn add(subdomain: impl Into<String>, address: impl Into<String>, port: u16) -> Self {
        Self {
            action: ControlAction::Add,
            subdomain: subdomain.into(),
            address: address.into(),
            port,
        }
    }

    pub fn remove(subdomain: impl Into<String>, address: impl Into<String>, port: u16) -> Self {
        Self {
            action: ControlAction::Remove,
            subdomain: subdomain.into(),
            address: address.into(),
            port,
        }
    }
}

/// Effect of applying a control event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlOutcome {
    /// A new backend handle was installed.
    Added,
    /// An existing handle for the same (port, address) was replaced.
    Replaced,
    /// The handle was deleted.
    Removed,
    /// Nothing was registered under (subdomain, port, address).
    NotFound,
}

impl ControlOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlOutcome::Added => "added",
            ControlOutcome::Replaced => "replaced",
            ControlOutcome::Removed => "removed",
            ControlOutcome::NotFound => "not_found",
        }
    }
}

/// Builds the forwarding handler for a newly added backend.
pub trait HandlerFactory {
    fn build(&self, subdomain: &str, address: &str, port: u16) -> Result<SharedHandler, RoutingError>;
}
