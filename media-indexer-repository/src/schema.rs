//! Field-mapping schema of the media index.

/// How a field is indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Full-text field, run through the analyzer.
    Text,
    /// Exact-value field, not analyzed.
    Keyword,
    /// Timestamp field.
    Date,
    /// Kept in the stored source only; not searchable.
    Stored,
}

impl FieldKind {
    /// Whether values of this field are tokenized by an analyzer.
    pub fn is_analyzed(self) -> bool {
        matches!(self, FieldKind::Text)
    }
}

/// Mapping of one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMapping {
    pub name: String,
    pub kind: FieldKind,
}

impl FieldMapping {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Settings and field mappings of an index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSchema {
    pub number_of_shards: u32,
    pub number_of_replicas: u32,
    pub fields: Vec<FieldMapping>,
}

impl IndexSchema {
    /// The fixed schema of the media index.
    pub fn media(number_of_shards: u32, number_of_replicas: u32) -> Self {
        let fields = [
            ("title", FieldKind::Text),
            ("artist", FieldKind::Text),
            ("collection_name", FieldKind::Text),
            ("caption", FieldKind::Text),
            ("editorial_source", FieldKind::Text),
            ("keywords", FieldKind::Keyword),
            ("created_date", FieldKind::Date),
            ("image_thumb", FieldKind::Stored),
            ("dedupe_hsh", FieldKind::Keyword),
            ("latest_ref", FieldKind::Keyword),
            ("source_id", FieldKind::Keyword),
        ]
        .into_iter()
        .map(|(name, kind)| FieldMapping::new(name, kind))
        .collect();

        Self {
            number_of_shards,
            number_of_replicas,
            fields,
        }
    }

    /// Look up the mapping of a field.
    pub fn field(&self, name: &str) -> Option<&FieldMapping> {
        self.fields.iter().find(|f| f.name == name)
    }
}
