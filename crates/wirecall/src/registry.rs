//! Hash-keyed handler table.
//!
//! Slaves dispatch incoming commands through a fixed-capacity table of
//! `(procedure hash, handler)` pairs. A responder exposes a handful of
//! procedures, so lookup is a linear scan, and capacity is fixed at
//! construction the way the rest of the peer's memory is.

use bytes::Bytes;

use crate::error::RegistryError;

/// A registered procedure body: consumes the request bytes, produces the
/// response bytes.
pub type Handler = Box<dyn FnMut(&[u8]) -> Bytes + Send>;

/// Fixed-capacity table mapping procedure hashes to handlers.
pub struct Registry {
    entries: Vec<(u32, Handler)>,
    capacity: usize,
}

impl Registry {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            capacity,
        }
    }

    /// Insert a handler, replacing any existing handler for `key`.
    ///
    /// Fails only when `key` is new and the table is full.
    pub fn insert(&mut self, key: u32, handler: Handler) -> Result<(), RegistryError> {
        if let Some(entry) = self.entries.iter_mut().find(|(hash, _)| *hash == key) {
            entry.1 = handler;
            return Ok(());
        }

        if self.entries.len() >= self.capacity {
            return Err(RegistryError::Full {
                capacity: self.capacity,
            });
        }

        self.entries.push((key, handler));
        Ok(())
    }

    /// Look up the handler registered for `key`.
    pub fn lookup(&mut self, key: u32) -> Option<&mut Handler> {
        self.entries
            .iter_mut()
            .find(|(hash, _)| *hash == key)
            .map(|(_, handler)| handler)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("len", &self.entries.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}
