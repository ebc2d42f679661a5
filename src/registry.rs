use std::sync::Arc;

/// Insertion-ordered name → capability map.
///
/// Registering an existing name replaces the previous binding in place, so
/// the original position in `list()` is kept (last write wins).
pub struct Registry<T: ?Sized> {
    entries: Vec<(String, Arc<T>)>,
}

impl<T: ?Sized> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> Registry<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Bind `name` to `item`. Returns the replaced binding, if any.
    pub fn register(&mut self, name: impl Into<String>, item: Arc<T>) -> Option<Arc<T>> {
        let name = name.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => Some(std::mem::replace(slot, item)),
            None => {
                self.entries.push((name, item));
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<T>> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, item)| Arc::clone(item))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(existing, _)| existing == name)
    }

    pub fn list(&self) -> Vec<String> {
        self.entries.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Named: Send + Sync {
        fn label(&self) -> &str;
    }

    struct Fixed(&'static str);

    impl Named for Fixed {
        fn label(&self) -> &str {
            self.0
        }
    }

    #[test]
    fn test_register_and_list_in_order() {
        let mut registry: Registry<dyn Named> = Registry::new();
        registry.register("b", Arc::new(Fixed("first b")));
        registry.register("a", Arc::new(Fixed("a")));
        assert_eq!(registry.list(), vec!["b", "a"]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_last_write_wins_keeps_position() {
        let mut registry: Registry<dyn Named> = Registry::new();
        registry.register("b", Arc::new(Fixed("first b")));
        registry.register("a", Arc::new(Fixed("a")));
        let replaced = registry.register("b", Arc::new(Fixed("second b")));

        assert_eq!(replaced.unwrap().label(), "first b");
        assert_eq!(registry.get("b").unwrap().label(), "second b");
        assert_eq!(registry.list(), vec!["b", "a"]);
    }

    #[test]
    fn test_unknown_name() {
        let registry: Registry<dyn Named> = Registry::new();
        assert!(registry.get("missing").is_none());
        assert!(!registry.contains("missing"));
        assert!(registry.is_empty());
    }
}
