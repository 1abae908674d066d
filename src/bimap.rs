// Bidirectional map: values reachable through either of two unique keys

use std::collections::HashMap;
use std::hash::Hash;

/// Map from two independent keys to the same value.
///
/// Both keys are derived from the value by `keys`, so they can never drift
/// from the value they point at. Each key is unique on its side: storing a
/// value evicts every entry that held either of its keys.
pub struct BiMap<K1, K2, V> {
    first: HashMap<K1, V>,
    second: HashMap<K2, V>,
    keys: fn(&V) -> (K1, K2),
}

impl<K1, K2, V> BiMap<K1, K2, V>
where
    K1: Eq + Hash + Clone,
    K2: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(keys: fn(&V) -> (K1, K2)) -> Self {
        Self {
            first: HashMap::new(),
            second: HashMap::new(),
            keys,
        }
    }

    pub fn put(&mut self, value: V) {
        let (first, second) = (self.keys)(&value);

        self.delete_first(&first);
        self.delete_second(&second);

        self.first.insert(first, value.clone());
        self.second.insert(second, value);
    }

    pub fn get_first(&self, key: &K1) -> Option<&V> {
        self.first.get(key)
    }

    pub fn get_second(&self, key: &K2) -> Option<&V> {
        self.second.get(key)
    }

    pub fn delete_first(&mut self, key: &K1) -> Option<V> {
        let value = self.first.remove(key)?;
        let (_, second) = (self.keys)(&value);
        self.second.remove(&second);
        Some(value)
    }

    pub fn delete_second(&mut self, key: &K2) -> Option<V> {
        let value = self.second.remove(key)?;
        let (first, _) = (self.keys)(&value);
        self.first.remove(&first);
        Some(value)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.first.values()
    }

    pub fn len(&self) -> usize {
        self.first.len()
    }

    pub fn is_empty(&self) -> bool {
        self.first.is_empty()
    }

    pub fn clear(&mut self) {
        self.first.clear();
        self.second.clear();
    }
}

/// A `BiMap` whose two keys share a type, so lookups can try both sides.
pub struct SymmetricBiMap<K, V>(BiMap<K, K, V>);

impl<K, V> SymmetricBiMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(keys: fn(&V) -> (K, K)) -> Self {
        Self(BiMap::new(keys))
    }

    pub fn put(&mut self, value: V) {
        self.0.put(value);
    }

    /// Look the key up on the first side, then on the second.
    pub fn get_any(&self, key: &K) -> Option<&V> {
        self.0.get_first(key).or_else(|| self.0.get_second(key))
    }

    /// Present only when the key is used on both sides at once.
    pub fn get_strict(&self, key: &K) -> Option<&V> {
        match (self.0.get_first(key), self.0.get_second(key)) {
            (Some(v), Some(_)) => Some(v),
            _ => None,
        }
    }

    pub fn get_first(&self, key: &K) -> Option<&V> {
        self.0.get_first(key)
    }

    pub fn get_second(&self, key: &K) -> Option<&V> {
        self.0.get_second(key)
    }

    /// Remove whatever entry holds `key`, on either side, with its pair.
    pub fn delete(&mut self, key: &K) -> Option<V> {
        let first = self.0.delete_first(key);
        let second = self.0.delete_second(key);
        first.or(second)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.0.values()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Pair {
        local: String,
        remote: String,
    }

    fn pair(local: &str, remote: &str) -> Pair {
        Pair {
            local: local.into(),
            remote: remote.into(),
        }
    }

    fn map() -> SymmetricBiMap<String, Pair> {
        SymmetricBiMap::new(|p: &Pair| (p.local.clone(), p.remote.clone()))
    }

    #[test]
    fn test_get_by_either_key() {
        let mut m = map();
        m.put(pair("Vault", "vault-34315"));

        assert_eq!(m.get_any(&"Vault".into()), Some(&pair("Vault", "vault-34315")));
        assert_eq!(m.get_any(&"vault-34315".into()), Some(&pair("Vault", "vault-34315")));
        assert_eq!(m.get_any(&"missing".into()), None);
    }

    #[test]
    fn test_put_replaces_stale_pair() {
        let mut m = map();
        m.put(pair("Vault", "old-id"));
        m.put(pair("Vault", "new-id"));

        assert_eq!(m.len(), 1);
        assert_eq!(m.get_any(&"Vault".into()).unwrap().remote, "new-id");
        assert!(m.get_any(&"old-id".into()).is_none());
    }

    #[test]
    fn test_put_evicts_other_owner_of_remote_key() {
        let mut m = map();
        m.put(pair("Vault", "shared"));
        m.put(pair("VaultUnlocked", "shared"));

        assert_eq!(m.len(), 1);
        assert!(m.get_first(&"Vault".into()).is_none());
        assert_eq!(m.get_any(&"shared".into()).unwrap().local, "VaultUnlocked");
    }

    #[test]
    fn test_delete_removes_both_sides() {
        let mut m = map();
        m.put(pair("LuckPerms", "Vebnzrzj"));

        assert!(m.delete(&"Vebnzrzj".into()).is_some());
        assert!(m.get_any(&"LuckPerms".into()).is_none());
        assert!(m.is_empty());
    }

    #[test]
    fn test_get_strict_needs_both_sides() {
        let mut m = map();
        m.put(pair("same", "same"));
        m.put(pair("left", "right"));

        assert!(m.get_strict(&"same".into()).is_some());
        assert!(m.get_strict(&"left".into()).is_none());
    }
}
