use bls::{Keypair, PublicKeyBytes};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

/// The secret keys available for signing, indexed by public key.
///
/// Clones share the same underlying map, so keys may be added or removed while a server is
/// running.
#[derive(Clone, Default)]
pub struct KeyStore {
    keys: Arc<RwLock<HashMap<PublicKeyBytes, Arc<Keypair>>>>,
}

impl KeyStore {
    pub fn new(keypairs: impl IntoIterator<Item = Keypair>) -> Self {
        let store = Self::default();
        for keypair in keypairs {
            store.add(keypair);
        }
        store
    }

    /// Adds `keypair`, returning `false` if its public key was already present.
    pub fn add(&self, keypair: Keypair) -> bool {
        let pubkey = keypair.pk.compress();
        let mut keys = self.keys.write();
        if keys.contains_key(&pubkey) {
            return false;
        }
        keys.insert(pubkey, Arc::new(keypair));
        true
    }

    pub fn remove(&self, pubkey: &PublicKeyBytes) -> bool {
        self.keys.write().remove(pubkey).is_some()
    }

    /// Public keys in ascending byte order.
    pub fn public_keys(&self) -> Vec<PublicKeyBytes> {
        let mut pubkeys: Vec<_> = self.keys.read().keys().copied().collect();
        pubkeys.sort_by(|a, b| a.as_serialized().cmp(b.as_serialized()));
        pubkeys
    }

    /// Looks up the keypair for a `0x`-prefixed hex identifier. Matching is case-insensitive.
    pub fn get(&self, identifier: &str) -> Option<Arc<Keypair>> {
        let pubkey = PublicKeyBytes::from_str(&identifier.to_lowercase()).ok()?;
        self.keys.read().get(&pubkey).cloned()
    }
}
