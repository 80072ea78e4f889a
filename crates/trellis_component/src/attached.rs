//! Saved state of objects attached to a node
//!
//! Listeners are rebuilt on restore by a factory registered under the
//! listener's type key. A listener that reports custom state has it handed
//! back to the factory; one that does not is rebuilt from the key alone.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use trellis_core::{Error, Result, Value};

use crate::event::ComponentListener;

/// One saved attached object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SavedAttached {
    /// Object that saved custom state
    Stateful { type_key: String, state: Value },
    /// Object rebuilt from its type alone
    Default { type_key: String },
}

impl SavedAttached {
    /// Capture a listener
    pub fn capture(listener: &dyn ComponentListener) -> Self {
        let type_key = listener.type_key().to_string();
        match listener.save_state() {
            Some(state) => Self::Stateful { type_key, state },
            None => Self::Default { type_key },
        }
    }

    /// Type key of the saved object
    pub fn type_key(&self) -> &str {
        match self {
            Self::Stateful { type_key, .. } | Self::Default { type_key } => type_key,
        }
    }
}

/// Saved form of an attached slot
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum AttachedState {
    /// Nothing attached
    #[default]
    Absent,
    /// A single object
    Single(SavedAttached),
    /// A sequence of objects, in order
    List(Vec<SavedAttached>),
}

impl AttachedState {
    /// Capture a single object; transient objects capture as absent
    pub fn single(listener: &dyn ComponentListener) -> Self {
        if listener.is_transient() {
            Self::Absent
        } else {
            Self::Single(SavedAttached::capture(listener))
        }
    }

    /// Capture a listener list, leaving out transient listeners
    pub fn list(listeners: &[Arc<dyn ComponentListener>]) -> Self {
        let saved: Vec<_> = listeners
            .iter()
            .filter(|l| !l.is_transient())
            .map(|l| SavedAttached::capture(l.as_ref()))
            .collect();
        if saved.is_empty() {
            Self::Absent
        } else {
            Self::List(saved)
        }
    }

    /// Number of saved objects
    pub fn len(&self) -> usize {
        match self {
            Self::Absent => 0,
            Self::Single(_) => 1,
            Self::List(entries) => entries.len(),
        }
    }

    /// Check if nothing was saved
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Rebuilds a listener from its saved state
pub type ListenerFactory =
    Arc<dyn Fn(Option<&Value>) -> Result<Arc<dyn ComponentListener>> + Send + Sync>;

/// Map from listener type key to its factory
#[derive(Default)]
pub struct AttachedRegistry {
    factories: RwLock<HashMap<String, ListenerFactory>>,
}

impl AttachedRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry shared by every tree that does not bring its own
    pub fn global() -> Arc<Self> {
        static GLOBAL: OnceLock<Arc<AttachedRegistry>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(AttachedRegistry::new())))
    }

    /// Register a factory for `type_key`.
    ///
    /// The first registration for a key wins; returns whether this one was
    /// stored.
    pub fn register<F>(&self, type_key: impl Into<String>, factory: F) -> bool
    where
        F: Fn(Option<&Value>) -> Result<Arc<dyn ComponentListener>> + Send + Sync + 'static,
    {
        let type_key = type_key.into();
        if self.factories.read().contains_key(&type_key) {
            return false;
        }
        let mut factories = self.factories.write();
        if factories.contains_key(&type_key) {
            return false;
        }
        log::trace!("Registered listener factory {}", type_key);
        factories.insert(type_key, Arc::new(factory));
        true
    }

    /// Whether a factory is registered for `type_key`
    pub fn contains(&self, type_key: &str) -> bool {
        self.factories.read().contains_key(type_key)
    }

    /// Number of registered factories
    pub fn len(&self) -> usize {
        self.factories.read().len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.factories.read().is_empty()
    }

    /// Rebuild one saved object
    pub fn restore(&self, saved: &SavedAttached) -> Result<Arc<dyn ComponentListener>> {
        let factory = self
            .factories
            .read()
            .get(saved.type_key())
            .cloned()
            .ok_or_else(|| {
                Error::StateMismatch(format!(
                    "no listener factory registered for {}",
                    saved.type_key()
                ))
            })?;

        match saved {
            SavedAttached::Stateful { state, .. } => factory(Some(state)),
            SavedAttached::Default { .. } => factory(None),
        }
    }

    /// Rebuild every object of a saved slot, in saved order
    pub fn restore_all(&self, state: &AttachedState) -> Result<Vec<Arc<dyn ComponentListener>>> {
        match state {
            AttachedState::Absent => Ok(Vec::new()),
            AttachedState::Single(saved) => Ok(vec![self.restore(saved)?]),
            AttachedState::List(entries) => entries.iter().map(|s| self.restore(s)).collect(),
        }
    }
}

impl fmt::Debug for AttachedRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.factories.read().keys().cloned().collect();
        keys.sort();
        f.debug_struct("AttachedRegistry")
            .field("factories", &keys)
            .finish()
    }
}
