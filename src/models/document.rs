//! Versioned JSON documents and where each one lives.

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::{Game, Idea};

/// Current document schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// What a document holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentKind {
    Games,
    Ideas,
    GamesOrder,
    IdeasOrder,
}

/// The envelope every collection and ordering is written in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document<T> {
    pub schema_version: u32,
    pub kind: DocumentKind,
    pub items: Vec<T>,
}

/// Accepted on-disk shapes: the envelope, or the bare array written before it existed.
#[derive(Deserialize)]
#[serde(untagged)]
enum Stored<T> {
    Envelope(Document<T>),
    Legacy(Vec<T>),
}

impl<T: Serialize> Document<T> {
    pub fn new(kind: DocumentKind, items: Vec<T>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            kind,
            items,
        }
    }
}

impl<T: DeserializeOwned> Document<T> {
    /// Decode `value`, failing closed on any schema mismatch.
    pub fn decode(value: serde_json::Value, kind: DocumentKind) -> Option<Vec<T>> {
        match serde_json::from_value::<Stored<T>>(value) {
            Ok(Stored::Envelope(doc)) if doc.schema_version != SCHEMA_VERSION => {
                tracing::warn!(
                    "Ignoring {:?} document with schema version {}",
                    kind,
                    doc.schema_version
                );
                None
            }
            Ok(Stored::Envelope(doc)) if doc.kind != kind => {
                tracing::warn!("Expected a {:?} document, found {:?}", kind, doc.kind);
                None
            }
            Ok(Stored::Envelope(doc)) => Some(doc.items),
            Ok(Stored::Legacy(items)) => Some(items),
            Err(e) => {
                tracing::warn!("Ignoring malformed {:?} document: {}", kind, e);
                None
            }
        }
    }
}

/// A logical document managed by the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Entity {
    Games,
    Ideas,
    GamesOrder,
    /// Idea ordering owned by one game
    IdeasOrder(String),
}

pub const IDEAS_ORDER_KEY_PREFIX: &str = "design-ideas-order-";

impl Entity {
    pub fn kind(&self) -> DocumentKind {
        match self {
            Entity::Games => DocumentKind::Games,
            Entity::Ideas => DocumentKind::Ideas,
            Entity::GamesOrder => DocumentKind::GamesOrder,
            Entity::IdeasOrder(_) => DocumentKind::IdeasOrder,
        }
    }

    /// Path of the document inside the managed data directory.
    pub fn remote_path(&self, data_dir: &str) -> String {
        let file = match self {
            Entity::Games => "games.json".to_string(),
            Entity::Ideas => "ideas.json".to_string(),
            Entity::GamesOrder => "games-order.json".to_string(),
            Entity::IdeasOrder(game_id) => format!("ideas-order-{}.json", game_id),
        };
        format!("{}/{}", data_dir, file)
    }

    /// Local cache key of the document.
    pub fn cache_key(&self) -> String {
        match self {
            Entity::Games => "design-games".to_string(),
            Entity::Ideas => "design-ideas".to_string(),
            Entity::GamesOrder => "design-games-order".to_string(),
            Entity::IdeasOrder(game_id) => format!("{}{}", IDEAS_ORDER_KEY_PREFIX, game_id),
        }
    }

    /// Commit message used when the document is saved alone.
    pub fn commit_message(&self) -> String {
        match self {
            Entity::Games => "Update games data".to_string(),
            Entity::Ideas => "Update ideas data".to_string(),
            Entity::GamesOrder => "Update games order".to_string(),
            Entity::IdeasOrder(game_id) => format!("Update ideas order for game {}", game_id),
        }
    }
}

/// Ties a record type to its document kind.
pub trait Collected: Serialize + DeserializeOwned + Clone {
    const ENTITY: Entity;
}

impl Collected for Game {
    const ENTITY: Entity = Entity::Games;
}

impl Collected for Idea {
    const ENTITY: Entity = Entity::Ideas;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_decodes() {
        let value = json!({"schemaVersion": 1, "kind": "games-order", "items": ["a", "b"]});
        let items: Option<Vec<String>> = Document::decode(value, DocumentKind::GamesOrder);
        assert_eq!(items, Some(vec!["a".to_string(), "b".to_string()]));
    }

    #[test]
    fn test_legacy_array_decodes() {
        let items: Option<Vec<String>> =
            Document::decode(json!(["c", "a"]), DocumentKind::IdeasOrder);
        assert_eq!(items, Some(vec!["c".to_string(), "a".to_string()]));
    }

    #[test]
    fn test_schema_mismatch_fails_closed() {
        let future = json!({"schemaVersion": 2, "kind": "games-order", "items": ["a"]});
        assert!(Document::<String>::decode(future, DocumentKind::GamesOrder).is_none());

        let wrong_kind = json!({"schemaVersion": 1, "kind": "ideas-order", "items": ["a"]});
        assert!(Document::<String>::decode(wrong_kind, DocumentKind::GamesOrder).is_none());

        let junk = json!({"hello": "world"});
        assert!(Document::<String>::decode(junk, DocumentKind::GamesOrder).is_none());
    }

    #[test]
    fn test_entity_locations() {
        let order = Entity::IdeasOrder("game-1".to_string());
        assert_eq!(order.remote_path("data"), "data/ideas-order-game-1.json");
        assert_eq!(order.cache_key(), "design-ideas-order-game-1");
        assert_eq!(Entity::Ideas.remote_path("data"), "data/ideas.json");
        assert_eq!(Entity::Games.cache_key(), "design-games");
    }
}
