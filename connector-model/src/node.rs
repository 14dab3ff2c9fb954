// Target object tree nodes
//
// A node owns an attribute map that only changes through change_attributes:
// the whole delta is applied under one lock, then a single notification goes
// out to every subscriber.

use crate::parameters::ParameterSet;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Mutex, PoisonError, RwLock};
use tokio::sync::mpsc;
use tracing::{debug, trace};

pub const DISPLAY_ATTRIBUTE_NAME: &str = "_display";
pub const PARAMETERS_ATTRIBUTE_NAME: &str = "_parameters";

/// Path of a node from the model root
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TargetPath(Vec<String>);

impl TargetPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn child(&self, name: impl Into<String>) -> Self {
        let mut keys = self.0.clone();
        keys.push(name.into());
        Self(keys)
    }

    /// Last path element, empty for the root
    pub fn name(&self) -> &str {
        self.0.last().map(String::as_str).unwrap_or("")
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for TargetPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

/// Value stored under an attribute name
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Str(String),
    Bool(bool),
    Parameters(ParameterSet),
    Object(TargetPath),
}

impl AttributeValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&TargetPath> {
        match self {
            AttributeValue::Object(p) => Some(p),
            _ => None,
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        AttributeValue::Str(s.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        AttributeValue::Str(s)
    }
}

impl From<ParameterSet> for AttributeValue {
    fn from(p: ParameterSet) -> Self {
        AttributeValue::Parameters(p)
    }
}

/// One applied attribute delta, as delivered to observers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributeChange {
    pub path: TargetPath,
    pub removed: Vec<String>,
    pub added: Vec<TargetPath>,
    pub updated: BTreeMap<String, AttributeValue>,
    pub reason: String,
}

#[derive(Debug, Default)]
struct NodeState {
    attributes: BTreeMap<String, AttributeValue>,
    children: Vec<TargetPath>,
}

/// A node in the live target object tree
#[derive(Debug)]
pub struct TargetNode {
    path: TargetPath,
    display: String,
    state: RwLock<NodeState>,
    // Also serializes writers so notifications go out in apply order
    observers: Mutex<Vec<mpsc::UnboundedSender<AttributeChange>>>,
}

impl TargetNode {
    pub fn new(path: TargetPath, display: impl Into<String>) -> Self {
        Self {
            path,
            display: display.into(),
            state: RwLock::new(NodeState::default()),
            observers: Mutex::new(Vec::new()),
        }
    }

    pub fn path(&self) -> &TargetPath {
        &self.path
    }

    pub fn display(&self) -> &str {
        &self.display
    }

    /// Register an observer; it sees every change applied after this call
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<AttributeChange> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// Apply removals, added children and updates as one step, then notify
    ///
    /// Removals are applied first, so a name that is both removed and updated
    /// ends up with the updated value.
    pub fn change_attributes(
        &self,
        removed: Vec<String>,
        added: Vec<TargetPath>,
        updated: BTreeMap<String, AttributeValue>,
        reason: &str,
    ) {
        let mut observers = self
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);

            for name in &removed {
                state.attributes.remove(name);
                state.children.retain(|c| c.name() != name);
            }
            for child in &added {
                state
                    .attributes
                    .insert(child.name().to_string(), AttributeValue::Object(child.clone()));
                if !state.children.contains(child) {
                    state.children.push(child.clone());
                }
            }
            for (name, value) in &updated {
                state.attributes.insert(name.clone(), value.clone());
            }
        }

        debug!(
            "{}: {} removed, {} added, {} updated ({})",
            self.path,
            removed.len(),
            added.len(),
            updated.len(),
            reason
        );

        let change = AttributeChange {
            path: self.path.clone(),
            removed,
            added,
            updated,
            reason: reason.to_string(),
        };

        observers.retain(|tx| tx.send(change.clone()).is_ok());
        trace!("{}: notified {} observer(s)", self.path, observers.len());
    }

    /// Convenience for a pure update
    pub fn update_attributes(&self, updated: BTreeMap<String, AttributeValue>, reason: &str) {
        self.change_attributes(Vec::new(), Vec::new(), updated, reason);
    }

    pub fn attribute(&self, name: &str) -> Option<AttributeValue> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.attributes.get(name).cloned()
    }

    /// Consistent copy of the whole attribute map
    pub fn attributes(&self) -> BTreeMap<String, AttributeValue> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.attributes.clone()
    }

    pub fn children(&self) -> Vec<TargetPath> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.children.clone()
    }
}
