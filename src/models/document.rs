use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::ServiceError;

/// Schema-less document: field name to loosely-typed JSON value
pub type Document = Map<String, Value>;

/// Field holding the store-assigned identifier of every document
pub const ID_FIELD: &str = "_id";

/// Store-native document identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct DocumentId(Uuid);

impl DocumentId {
    /// Generate a fresh unique identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse an identifier supplied by a client, e.g. a path parameter
    pub fn parse(raw: &str) -> Result<Self, ServiceError> {
        raw.parse().map_err(|_| ServiceError::InvalidIdentifier {
            id: raw.to_string(),
        })
    }

    /// Read the identifier stored in a document, if any
    pub fn of(document: &Document) -> Option<Self> {
        document
            .get(ID_FIELD)
            .and_then(Value::as_str)
            .and_then(|raw| raw.parse().ok())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.as_simple())
    }
}

impl FromStr for DocumentId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

impl From<DocumentId> for String {
    fn from(id: DocumentId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for DocumentId {
    type Error = uuid::Error;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        raw.parse()
    }
}

impl From<DocumentId> for Value {
    fn from(id: DocumentId) -> Self {
        Value::String(id.to_string())
    }
}

/// Equality filter: an optional identifier term plus field terms, all of which must match
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    id: Option<DocumentId>,
    fields: Vec<(String, Value)>,
    unsatisfiable: bool,
}

impl Filter {
    /// Filter matching every document
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_id(id: DocumentId) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    /// Add an equality term. An `_id` term becomes the identifier lookup; one
    /// that no document can carry makes the whole filter match nothing.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let name = name.into();
        let value = value.into();
        if name == ID_FIELD {
            let parsed = value.as_str().and_then(|raw| raw.parse::<DocumentId>().ok());
            match (parsed, self.id) {
                (Some(id), None) => self.id = Some(id),
                (Some(id), Some(current)) if id == current => {}
                // Malformed, non-string or conflicting identifier
                _ => self.unsatisfiable = true,
            }
            return self;
        }
        self.fields.push((name, value));
        self
    }

    pub fn id(&self) -> Option<DocumentId> {
        self.id
    }

    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    /// True when no document can ever match
    pub fn is_unsatisfiable(&self) -> bool {
        self.unsatisfiable
    }

    /// Whether the filter is a pure identifier lookup
    pub fn is_id_only(&self) -> bool {
        !self.unsatisfiable && self.id.is_some() && self.fields.is_empty()
    }

    /// A `null` term matches documents where the field is null or absent.
    pub fn matches(&self, document: &Document) -> bool {
        if self.unsatisfiable {
            return false;
        }
        if let Some(id) = self.id {
            if DocumentId::of(document) != Some(id) {
                return false;
            }
        }

        self.fields.iter().all(|(name, expected)| match document.get(name) {
            Some(actual) => actual == expected,
            None => expected.is_null(),
        })
    }
}
