//! Game and idea records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Generate a client-side record id: `<prefix>-<millis>-<9 random chars>`.
///
/// Uniqueness is never checked against the remote store.
pub fn generate_id(prefix: &str) -> String {
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}-{}", prefix, Utc::now().timestamp_millis(), &random[..9])
}

/// Split comma-separated tag input, trimming and dropping empties.
pub fn parse_tags(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// A game project grouping ideas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Game {
    pub fn new(name: &str, description: &str) -> Self {
        let now = Utc::now();
        Self {
            id: generate_id("game"),
            name: name.trim().to_string(),
            description: description.trim().to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Workflow state of an idea.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IdeaStatus {
    #[default]
    Draft,
    InProgress,
    Done,
}

impl IdeaStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdeaStatus::Draft => "draft",
            IdeaStatus::InProgress => "in-progress",
            IdeaStatus::Done => "done",
        }
    }
}

impl std::str::FromStr for IdeaStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" | "草稿" => Ok(IdeaStatus::Draft),
            "in-progress" | "进行中" => Ok(IdeaStatus::InProgress),
            "done" | "已完成" | "完成" => Ok(IdeaStatus::Done),
            other => Err(format!("unknown status '{}'", other)),
        }
    }
}

/// Priority of an idea.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdeaPriority {
    Low,
    #[default]
    Medium,
    High,
}

impl IdeaPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdeaPriority::Low => "low",
            IdeaPriority::Medium => "medium",
            IdeaPriority::High => "high",
        }
    }
}

impl std::str::FromStr for IdeaPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" | "低" => Ok(IdeaPriority::Low),
            "medium" | "中" => Ok(IdeaPriority::Medium),
            "high" | "高" => Ok(IdeaPriority::High),
            other => Err(format!("unknown priority '{}'", other)),
        }
    }
}

/// Decode a stored label through `FromStr`, falling back to the default.
///
/// Older records carry the site's display labels, blanks or nulls here; none of
/// them may make the whole document unreadable.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: std::str::FromStr + Default,
{
    let label = Option::<String>::deserialize(deserializer)?;
    let label = label.as_deref().map(str::trim).unwrap_or_default();
    if label.is_empty() {
        return Ok(T::default());
    }
    Ok(label.parse().unwrap_or_else(|_| {
        tracing::warn!("Unknown label '{}', using the default", label);
        T::default()
    }))
}

/// A design idea, grouped under a game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Idea {
    pub id: String,
    /// Owning game id; empty means ungrouped
    #[serde(default)]
    pub game_id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub status: IdeaStatus,
    #[serde(default, deserialize_with = "lenient")]
    pub priority: IdeaPriority,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Editable fields of an idea.
#[derive(Debug, Clone, Default)]
pub struct IdeaDraft {
    pub game_id: String,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub status: IdeaStatus,
    pub priority: IdeaPriority,
}

impl From<&Idea> for IdeaDraft {
    fn from(idea: &Idea) -> Self {
        Self {
            game_id: idea.game_id.clone(),
            title: idea.title.clone(),
            content: idea.content.clone(),
            tags: idea.tags.clone(),
            status: idea.status,
            priority: idea.priority,
        }
    }
}

impl Idea {
    pub fn new(draft: IdeaDraft) -> Self {
        let now = Utc::now();
        Self {
            id: generate_id("idea"),
            game_id: draft.game_id,
            title: draft.title.trim().to_string(),
            content: draft.content.trim().to_string(),
            tags: draft.tags,
            status: draft.status,
            priority: draft.priority,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace the editable fields, keeping id and creation time.
    pub fn apply(&mut self, draft: IdeaDraft) {
        self.game_id = draft.game_id;
        self.title = draft.title.trim().to_string();
        self.content = draft.content.trim().to_string();
        self.tags = draft.tags;
        self.status = draft.status;
        self.priority = draft.priority;
        self.updated_at = Utc::now();
    }

    /// Case-insensitive match of `needle` (already lowercased) against title, content and tags.
    pub fn matches_search(&self, needle: &str) -> bool {
        if needle.is_empty() {
            return true;
        }
        let mut haystack = vec![self.title.as_str(), self.content.as_str()];
        haystack.extend(self.tags.iter().map(String::as_str));
        haystack.join(" ").to_lowercase().contains(needle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_have_prefix_and_differ() {
        let a = generate_id("idea");
        let b = generate_id("idea");
        assert!(a.starts_with("idea-"));
        assert_eq!(a.rsplit('-').next().unwrap().len(), 9);
        assert_ne!(a, b);
    }

    #[test]
    fn test_parse_tags() {
        assert_eq!(
            parse_tags(" combat, ,level design,  "),
            vec!["combat".to_string(), "level design".to_string()]
        );
        assert!(parse_tags("").is_empty());
    }

    #[test]
    fn test_idea_defaults_on_decode() {
        let idea: Idea = serde_json::from_str(
            r#"{"id":"idea-1","title":"Grapple","createdAt":"2025-01-01T00:00:00Z","updatedAt":"2025-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(idea.status, IdeaStatus::Draft);
        assert_eq!(idea.priority, IdeaPriority::Medium);
        assert!(idea.game_id.is_empty());
        assert!(idea.tags.is_empty());
    }

    #[test]
    fn test_idea_accepts_site_labels() {
        let ideas: Vec<Idea> = serde_json::from_str(
            r#"[
                {"id":"i1","title":"A","status":"草稿","priority":"中","createdAt":"2025-01-01T00:00:00.000Z","updatedAt":"2025-01-01T00:00:00.000Z"},
                {"id":"i2","title":"B","status":"进行中","priority":"高","createdAt":"2025-01-01T00:00:00.000Z","updatedAt":"2025-01-01T00:00:00.000Z"},
                {"id":"i3","title":"C","status":"已完成","priority":"低","createdAt":"2025-01-01T00:00:00.000Z","updatedAt":"2025-01-01T00:00:00.000Z"},
                {"id":"i4","title":"D","status":null,"priority":"","createdAt":"2025-01-01T00:00:00.000Z","updatedAt":"2025-01-01T00:00:00.000Z"},
                {"id":"i5","title":"E","status":"someday","priority":"urgent","createdAt":"2025-01-01T00:00:00.000Z","updatedAt":"2025-01-01T00:00:00.000Z"}
            ]"#,
        )
        .unwrap();

        let pairs: Vec<_> = ideas.iter().map(|i| (i.status, i.priority)).collect();
        assert_eq!(
            pairs,
            vec![
                (IdeaStatus::Draft, IdeaPriority::Medium),
                (IdeaStatus::InProgress, IdeaPriority::High),
                (IdeaStatus::Done, IdeaPriority::Low),
                (IdeaStatus::Draft, IdeaPriority::Medium),
                (IdeaStatus::Draft, IdeaPriority::Medium),
            ]
        );

        // Re-saved records use the canonical names
        let saved = serde_json::to_value(&ideas[1]).unwrap();
        assert_eq!(saved["status"], "in-progress");
        assert_eq!(saved["priority"], "high");
    }

    #[test]
    fn test_search_covers_tags() {
        let idea = Idea::new(IdeaDraft {
            game_id: "game-1".to_string(),
            title: "Wall run".to_string(),
            content: "Chain into a jump".to_string(),
            tags: vec!["Movement".to_string()],
            ..IdeaDraft::default()
        });
        assert!(idea.matches_search("movement"));
        assert!(idea.matches_search("into a"));
        assert!(!idea.matches_search("inventory"));
    }
}
