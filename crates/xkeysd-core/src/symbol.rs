// Xkeysd Symbol Table
// Bidirectional registry between event names and (namespace, code) pairs

use std::collections::HashMap;

use crate::catalog;

/// Longest namespace token accepted in front of the first underscore.
/// Mirrors the fixed-size scratch buffer of the original resolver.
const MAX_PREFIX_LEN: usize = 16;

/// A numeric event identity: namespace id plus code within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId {
    pub kind: u16,
    pub code: u16,
}

impl EventId {
    pub const fn new(kind: u16, code: u16) -> Self {
        Self { kind, code }
    }
}

/// Errors from symbol resolution
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SymbolError {
    #[error("unknown event name: '{0}'")]
    Unknown(String),

    #[error("malformed event name: '{0}'")]
    InvalidFormat(String),
}

/// Read-only registry mapping canonical event names to numeric identities
/// and back.
///
/// Built once at startup from the static catalogues and shared by reference
/// afterwards; there is no mutation path.
#[derive(Debug)]
pub struct SymbolTable {
    /// Flat name → number map. Holds both namespace names ("EV_KEY" → 0x01)
    /// and event names ("KEY_POWER" → 116), which is what lets `resolve`
    /// answer both of its sub-lookups from one table.
    forward: HashMap<&'static str, u16>,
    reverse: HashMap<EventId, &'static str>,
}

impl SymbolTable {
    /// Build the table from every non-empty catalogue entry.
    pub fn new() -> Self {
        let mut forward = HashMap::new();
        let mut reverse = HashMap::new();

        for (id, name) in catalog::NAMESPACES {
            forward.insert(*name, *id);
        }
        // Button names derive the token "BTN"; route it into the key
        // namespace so they resolve like any KEY_ name.
        forward.insert("EV_BTN", catalog::EV_KEY);

        for (kind, names) in catalog::CATALOGUES {
            for (code, name) in *names {
                forward.insert(*name, *code);
                reverse.insert(EventId::new(*kind, *code), *name);
            }
        }

        Self { forward, reverse }
    }

    /// Resolve a canonical event name (e.g. `"KEY_POWER"`) to its identity.
    ///
    /// The namespace is derived from the token in front of the first `_`
    /// ("KEY" becomes the namespace-table key "EV_KEY"); the code comes from
    /// looking up the whole name. Both lookups must succeed.
    pub fn resolve(&self, name: &str) -> Result<EventId, SymbolError> {
        let sep = name
            .find('_')
            .ok_or_else(|| SymbolError::InvalidFormat(name.to_string()))?;
        let prefix = &name[..sep];
        if prefix.is_empty() || prefix.len() > MAX_PREFIX_LEN {
            return Err(SymbolError::InvalidFormat(name.to_string()));
        }

        let ns_key = format!("EV_{}", prefix);
        let kind = *self
            .forward
            .get(ns_key.as_str())
            .ok_or_else(|| SymbolError::Unknown(name.to_string()))?;
        let code = *self
            .forward
            .get(name)
            .ok_or_else(|| SymbolError::Unknown(name.to_string()))?;

        Ok(EventId::new(kind, code))
    }

    /// Canonical name for an identity, if one is registered.
    pub fn name_of(&self, kind: u16, code: u16) -> Option<&'static str> {
        self.reverse.get(&EventId::new(kind, code)).copied()
    }

    /// Number of reverse-registered symbols.
    pub fn len(&self) -> usize {
        self.reverse.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reverse.is_empty()
    }

    /// Iterate every reverse-registered (identity, name) pair.
    pub fn iter(&self) -> impl Iterator<Item = (EventId, &'static str)> + '_ {
        self.reverse.iter().map(|(id, name)| (*id, *name))
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}
