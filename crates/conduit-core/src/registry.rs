use crate::id::ResourceTypeId;
use std::collections::HashMap;

/// Name-indexed table of definitions. Ids are dense and assigned in
/// registration order; re-registering a name replaces its definition and
/// keeps its id.
///
/// Passed by reference to whoever needs it; there is no global instance.
#[derive(Debug, Clone)]
pub struct Registry<T> {
    entries: Vec<(String, T)>,
    name_to_id: HashMap<String, ResourceTypeId>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Registry<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            name_to_id: HashMap::new(),
        }
    }

    /// Registers a new name. Fails if the name is taken.
    pub fn register(&mut self, name: &str, def: T) -> Result<ResourceTypeId, RegistryError> {
        if self.name_to_id.contains_key(name) {
            return Err(RegistryError::Duplicate(name.to_string()));
        }
        Ok(self.upsert(name, def))
    }

    /// Registers or replaces. Returns the (possibly existing) id.
    pub fn upsert(&mut self, name: &str, def: T) -> ResourceTypeId {
        if let Some(&id) = self.name_to_id.get(name) {
            self.entries[id.0 as usize].1 = def;
            return id;
        }
        let id = ResourceTypeId(self.entries.len() as u32);
        self.entries.push((name.to_string(), def));
        self.name_to_id.insert(name.to_string(), id);
        id
    }

    /// Mutate an existing definition by name.
    pub fn mutate<F>(&mut self, name: &str, f: F) -> Result<(), RegistryError>
    where
        F: FnOnce(&mut T),
    {
        let id = self
            .name_to_id
            .get(name)
            .ok_or(RegistryError::NotFound(name.to_string()))?;
        f(&mut self.entries[id.0 as usize].1);
        Ok(())
    }

    pub fn id(&self, name: &str) -> Option<ResourceTypeId> {
        self.name_to_id.get(name).copied()
    }

    pub fn get(&self, id: ResourceTypeId) -> Option<&T> {
        self.entries.get(id.0 as usize).map(|(_, def)| def)
    }

    pub fn lookup(&self, name: &str) -> Option<&T> {
        self.id(name).and_then(|id| self.get(id))
    }

    pub fn name(&self, id: ResourceTypeId) -> Option<&str> {
        self.entries.get(id.0 as usize).map(|(name, _)| name.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.name_to_id.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in id order.
    pub fn iter(&self) -> impl Iterator<Item = (ResourceTypeId, &str, &T)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, (name, def))| (ResourceTypeId(i as u32), name.as_str(), def))
    }
}

impl Registry<()> {
    /// Registers a bare name, returning the existing id if already known.
    pub fn intern(&mut self, name: &str) -> ResourceTypeId {
        self.id(name).unwrap_or_else(|| self.upsert(name, ()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("already registered: {0}")]
    Duplicate(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Registry<u32> {
        let mut reg = Registry::new();
        reg.register("iron_ore", 64).unwrap();
        reg.register("ender_pearl", 16).unwrap();
        reg
    }

    #[test]
    fn register_and_lookup() {
        let reg = setup();
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.id("iron_ore"), Some(ResourceTypeId(0)));
        assert_eq!(reg.lookup("ender_pearl"), Some(&16));
        assert_eq!(reg.name(ResourceTypeId(1)), Some("ender_pearl"));
        assert!(reg.id("nonexistent").is_none());
    }

    #[test]
    fn duplicate_register_fails() {
        let mut reg = setup();
        assert_eq!(
            reg.register("iron_ore", 1),
            Err(RegistryError::Duplicate("iron_ore".into()))
        );
    }

    #[test]
    fn upsert_keeps_id() {
        let mut reg = setup();
        let id = reg.upsert("iron_ore", 32);
        assert_eq!(id, ResourceTypeId(0));
        assert_eq!(reg.get(id), Some(&32));
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn mutate_existing() {
        let mut reg = setup();
        reg.mutate("ender_pearl", |stack| *stack += 1).unwrap();
        assert_eq!(reg.lookup("ender_pearl"), Some(&17));
    }

    #[test]
    fn mutate_nonexistent_fails() {
        let mut reg = setup();
        assert!(reg.mutate("nonexistent", |_| {}).is_err());
    }

    #[test]
    fn intern_is_idempotent() {
        let mut names = Registry::<()>::new();
        let water = names.intern("water");
        assert_eq!(names.intern("water"), water);
        assert_ne!(names.intern("lava"), water);
        let order: Vec<_> = names.iter().map(|(_, n, _)| n).collect();
        assert_eq!(order, vec!["water", "lava"]);
    }
}
