use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BindingKey {
    pub target: String,
    pub event: String,
}

impl BindingKey {
    pub fn new(target: impl Into<String>, event: impl Into<String>) -> Self {
        Self { target: target.into(), event: event.into() }
    }
}

/// Owns listener handles by (target, event). A handle detaches when it is
/// dropped, so rebinding a key never leaves two listeners behind.
#[derive(Debug)]
pub struct ListenerRegistry<H> {
    bindings: HashMap<BindingKey, H>,
}

impl<H> Default for ListenerRegistry<H> {
    fn default() -> Self {
        Self { bindings: HashMap::new() }
    }
}

impl<H> ListenerRegistry<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when an older handle for the same key was detached.
    pub fn bind(&mut self, key: BindingKey, handle: H) -> bool {
        let replaced = self.bindings.remove(&key);
        let rebound = replaced.is_some();
        drop(replaced);
        if rebound {
            debug!(target_name = %key.target, event = %key.event, "listener rebound");
        }
        self.bindings.insert(key, handle);
        rebound
    }

    pub fn unbind(&mut self, key: &BindingKey) -> bool {
        self.bindings.remove(key).is_some()
    }

    pub fn is_bound(&self, key: &BindingKey) -> bool {
        self.bindings.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn clear(&mut self) {
        self.bindings.clear();
    }
}
