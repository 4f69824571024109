use crate::error::{ParseError, Result};
use crate::model::Definition;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Character definitions of one movie, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct Library {
    definitions: BTreeMap<u16, Arc<Definition>>,
}

impl Library {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails with `MalformedRecord` if the id is already taken; the first
    /// definition wins.
    pub fn insert(&mut self, definition: Definition) -> Result<()> {
        let id = definition.id();
        if self.definitions.contains_key(&id) {
            return Err(ParseError::malformed(format!(
                "duplicate definition of character {id}"
            )));
        }
        self.definitions.insert(id, Arc::new(definition));
        Ok(())
    }

    pub fn get(&self, id: u16) -> Option<&Arc<Definition>> {
        self.definitions.get(&id)
    }

    pub fn contains(&self, id: u16) -> bool {
        self.definitions.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

}

/// Collects definitions, keeping the first one seen for each id.
impl FromIterator<Definition> for Library {
    fn from_iter<I: IntoIterator<Item = Definition>>(iter: I) -> Self {
        let mut definitions = BTreeMap::new();
        for definition in iter {
            definitions
                .entry(definition.id())
                .or_insert_with(|| Arc::new(definition));
        }
        Self { definitions }
    }
}
