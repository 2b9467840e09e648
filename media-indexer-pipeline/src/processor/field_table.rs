//! Ordered lookups for fields that appear under more than one name.

use serde_json::Value;

/// A field that may live at any of several JSON paths. The first present,
/// non-null path wins.
#[derive(Debug, Clone, Copy)]
pub struct FieldTable {
    pub name: &'static str,
    candidates: &'static [&'static [&'static str]],
}

impl FieldTable {
    pub const fn new(name: &'static str, candidates: &'static [&'static [&'static str]]) -> Self {
        Self { name, candidates }
    }

    /// Resolve the field against `value`.
    pub fn resolve<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        self.candidates.iter().find_map(|path| lookup(value, path))
    }
}

fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter()
        .try_fold(value, |current, key| current.get(key))
        .filter(|found| !found.is_null())
}

/// Content reference of an artifact.
pub const CONTENT_REFERENCE: FieldTable = FieldTable::new(
    "raw_ref.@link",
    &[&["raw_ref", "@link"], &["rawRef", "@link"]],
);

/// Translation timestamp of an artifact.
pub const TRANSLATED_AT: FieldTable =
    FieldTable::new("translated_at", &[&["translated_at"], &["translatedAt"]]);
