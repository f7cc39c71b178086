use super::Handshake;
use crate::error::{Error, TrustResult};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

/// Storage for handshakes with per-key atomic updates.
pub trait HandshakeStore: Send + Sync {
    /// Registers `handshake` unless an ACTIVE entry exists for the same ordered pair.
    fn insert_if_no_active_pair(&self, handshake: Handshake) -> TrustResult<()>;

    fn get(&self, id: &str) -> Option<Handshake>;

    /// Runs `f` on the entry while holding that entry's lock. Fails with
    /// `NotFound` for unknown ids and `InvalidState` for terminal entries, in
    /// which case `f` is never called.
    fn update_if_active<R, F>(&self, id: &str, f: F) -> TrustResult<R>
    where
        F: FnOnce(&mut Handshake) -> R;

    fn remove(&self, id: &str) -> Option<Handshake>;

    fn remove_where<P>(&self, predicate: P) -> Vec<Handshake>
    where
        P: Fn(&Handshake) -> bool;

    fn for_each<F>(&self, f: F)
    where
        F: FnMut(&Handshake);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

type Entry = Arc<Mutex<Handshake>>;

#[derive(Default)]
pub struct HandshakeRegistry {
    entries: RwLock<HashMap<String, Entry>>,
}

impl HandshakeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, id: &str) -> Option<Entry> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }
}

fn lock(entry: &Entry) -> MutexGuard<'_, Handshake> {
    entry.lock().unwrap_or_else(PoisonError::into_inner)
}

impl HandshakeStore for HandshakeRegistry {
    fn insert_if_no_active_pair(&self, handshake: Handshake) -> TrustResult<()> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);

        let existing = entries.values().find_map(|entry| {
            let current = lock(entry);
            if current.is_active()
                && current.is_pair(&handshake.initiator_did, &handshake.responder_did)
            {
                Some(current.id.clone())
            } else {
                None
            }
        });

        if let Some(existing_id) = existing {
            return Err(Error::AlreadyInProgress(format!(
                "{} -> {} (handshake {})",
                handshake.initiator_did, handshake.responder_did, existing_id
            )));
        }

        entries.insert(handshake.id.clone(), Arc::new(Mutex::new(handshake)));
        Ok(())
    }

    fn get(&self, id: &str) -> Option<Handshake> {
        let entry = self.entry(id)?;
        let handshake = lock(&entry).clone();
        Some(handshake)
    }

    fn update_if_active<R, F>(&self, id: &str, f: F) -> TrustResult<R>
    where
        F: FnOnce(&mut Handshake) -> R,
    {
        let entry = self
            .entry(id)
            .ok_or_else(|| Error::NotFound(format!("handshake {}", id)))?;
        let mut handshake = lock(&entry);

        if !handshake.is_active() {
            return Err(Error::InvalidState(format!(
                "handshake {} is {}",
                id, handshake.status
            )));
        }

        Ok(f(&mut *handshake))
    }

    fn remove(&self, id: &str) -> Option<Handshake> {
        let removed = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)?;
        let handshake = lock(&removed).clone();
        Some(handshake)
    }

    fn remove_where<P>(&self, predicate: P) -> Vec<Handshake>
    where
        P: Fn(&Handshake) -> bool,
    {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let mut removed = Vec::new();

        entries.retain(|_, entry| {
            let handshake = lock(entry);
            if predicate(&*handshake) {
                removed.push(handshake.clone());
                false
            } else {
                true
            }
        });

        removed
    }

    fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&Handshake),
    {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        for entry in entries.values() {
            f(&*lock(entry));
        }
    }

    fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
