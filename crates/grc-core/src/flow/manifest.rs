//! Primary-entity manifest: the raw inputs a flow consumes.

use serde::Serialize;

/// One raw input and its amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestEntry {
    pub name: String,
    pub qualifier: Option<String>,
}

/// Primary entities in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
}

impl Manifest {
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ManifestEntry> {
        self.entries.iter()
    }

    /// Qualifier of the named entry; `None` if absent, `Some(None)` if the
    /// entry has no amount.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Option<&str>> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.qualifier.as_deref())
    }
}

impl FromIterator<(String, Option<String>)> for Manifest {
    fn from_iter<I: IntoIterator<Item = (String, Option<String>)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(name, qualifier)| ManifestEntry { name, qualifier })
                .collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Manifest {
    type Item = &'a ManifestEntry;
    type IntoIter = std::slice::Iter<'a, ManifestEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
