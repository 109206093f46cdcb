use std::collections::HashMap;

/// Key the lobby populates when this client challenged someone: we host a
/// room under the pre-minted code the challenge carried.
pub const HOST_CODE_KEY: &str = "vs_host_code";

/// Key the lobby populates when this client accepted a challenge: we join
/// the challenger's room as guest.
pub const JOIN_CODE_KEY: &str = "vs_join_code";

/// Process-lifetime scratch storage shared between the lobby feature and
/// the race core. The lobby writes a code under one of the well-known
/// keys; the race core consumes it on entry. Nothing here survives the
/// process.
#[derive(Debug, Default)]
pub struct SessionStore {
    values: HashMap<String, String>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.values.remove(key)
    }
}

/// How the race core should enter the room the lobby seeded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Handoff {
    Host(String),
    Join(String),
}

/// Consumes whichever handoff key the lobby populated. Which of the two
/// keys is set is the only signal distinguishing challenger from acceptor;
/// both are cleared either way so the handoff fires at most once.
pub fn take_handoff(store: &mut SessionStore) -> Option<Handoff> {
    if let Some(code) = store.remove(HOST_CODE_KEY) {
        store.remove(JOIN_CODE_KEY);
        return Some(Handoff::Host(code));
    }
    store.remove(JOIN_CODE_KEY).map(Handoff::Join)
}
