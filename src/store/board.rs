//! In-memory view of every game, idea and ordering, edited through load-modify-save.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use serde_json::json;

use super::{DataStore, SaveReport};
use crate::errors::{StoreError, StoreResult};
use crate::models::{
    apply_ordering, repair_ordering, Document, DocumentKind, Entity, Game, Idea, IdeaDraft,
};

/// Label for ideas whose game is missing.
pub const UNGROUPED: &str = "Ungrouped";

/// Narrowing applied when listing a game's ideas.
#[derive(Debug, Clone, Default)]
pub struct IdeaFilter {
    /// Exact tag the idea must carry
    pub tag: Option<String>,
    /// Case-insensitive text searched in title, content and tags
    pub search: Option<String>,
}

/// All managed records of one owner.
#[derive(Debug, Clone, Default)]
pub struct IdeaBoard {
    games: Vec<Game>,
    ideas: Vec<Idea>,
    games_order: Vec<String>,
    ideas_orders: BTreeMap<String, Vec<String>>,
    /// Stored documents that exist but could not be decoded
    unreadable: Vec<String>,
}

impl IdeaBoard {
    /// Load every document through `store`.
    pub async fn load(store: &DataStore) -> Self {
        let mut unreadable = Vec::new();
        let mut note = |path: Option<String>| unreadable.extend(path);

        let games = store.inspect_document::<Game>(&Entity::Games).await;
        note(games.unreadable);
        let ideas = store.inspect_document::<Idea>(&Entity::Ideas).await;
        note(ideas.unreadable);
        let games_order = store.inspect_document::<String>(&Entity::GamesOrder).await;
        note(games_order.unreadable);

        let mut ideas_orders = BTreeMap::new();
        for game in &games.items {
            let order = store
                .inspect_document::<String>(&Entity::IdeasOrder(game.id.clone()))
                .await;
            note(order.unreadable);
            if !order.items.is_empty() {
                ideas_orders.insert(game.id.clone(), order.items);
            }
        }

        if !unreadable.is_empty() {
            tracing::warn!("Unreadable documents, saving is disabled: {:?}", unreadable);
        }
        tracing::debug!(
            "Loaded {} games and {} ideas",
            games.items.len(),
            ideas.items.len()
        );
        Self {
            games: games.items,
            ideas: ideas.items,
            games_order: games_order.items,
            ideas_orders,
            unreadable,
        }
    }

    /// Documents found in storage that could not be decoded.
    pub fn unreadable(&self) -> &[String] {
        &self.unreadable
    }

    /// Fail when saving would overwrite a stored document this board could not read.
    pub fn ensure_intact(&self) -> StoreResult<()> {
        if self.unreadable.is_empty() {
            return Ok(());
        }
        Err(StoreError::MalformedResponse(format!(
            "Refusing to overwrite unreadable data: {}",
            self.unreadable.join(", ")
        )))
    }

    pub fn games(&self) -> &[Game] {
        &self.games
    }

    pub fn ideas(&self) -> &[Idea] {
        &self.ideas
    }

    pub fn game(&self, id: &str) -> Option<&Game> {
        self.games.iter().find(|g| g.id == id)
    }

    pub fn idea(&self, id: &str) -> Option<&Idea> {
        self.ideas.iter().find(|i| i.id == id)
    }

    pub fn game_name(&self, id: &str) -> &str {
        self.game(id).map(|g| g.name.as_str()).unwrap_or(UNGROUPED)
    }

    pub fn ideas_count(&self, game_id: &str) -> usize {
        self.ideas.iter().filter(|i| i.game_id == game_id).count()
    }

    /// Distinct tags used by the game's ideas, sorted.
    pub fn tags_for_game(&self, game_id: &str) -> Vec<String> {
        self.ideas
            .iter()
            .filter(|i| i.game_id == game_id)
            .flat_map(|i| i.tags.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    // ==================== GAMES ====================

    fn check_game_name(&self, name: &str, except: Option<&str>) -> StoreResult<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::Validation("Game name is required".to_string()));
        }
        if self
            .games
            .iter()
            .any(|g| g.name == name && Some(g.id.as_str()) != except)
        {
            return Err(StoreError::Validation(format!(
                "A game named \"{}\" already exists",
                name
            )));
        }
        Ok(name.to_string())
    }

    pub fn add_game(&mut self, name: &str, description: &str) -> StoreResult<&Game> {
        let name = self.check_game_name(name, None)?;
        self.games.push(Game::new(&name, description));
        Ok(&self.games[self.games.len() - 1])
    }

    pub fn update_game(
        &mut self,
        id: &str,
        name: Option<&str>,
        description: Option<&str>,
    ) -> StoreResult<&Game> {
        let name = name
            .map(|n| self.check_game_name(n, Some(id)))
            .transpose()?;
        let game = self
            .games
            .iter_mut()
            .find(|g| g.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("Game {} not found", id)))?;

        if let Some(name) = name {
            game.name = name;
        }
        if let Some(description) = description {
            game.description = description.trim().to_string();
        }
        game.updated_at = Utc::now();
        Ok(game)
    }

    /// Remove a game together with its ideas and idea ordering.
    ///
    /// Returns how many ideas went with it.
    pub fn delete_game(&mut self, id: &str) -> StoreResult<usize> {
        if self.game(id).is_none() {
            return Err(StoreError::NotFound(format!("Game {} not found", id)));
        }

        let before = self.ideas.len();
        self.ideas.retain(|i| i.game_id != id);
        let removed = before - self.ideas.len();

        self.games.retain(|g| g.id != id);
        self.games_order.retain(|g| g != id);
        self.ideas_orders.remove(id);

        tracing::info!("Deleted game {} and {} of its ideas", id, removed);
        Ok(removed)
    }

    // ==================== IDEAS ====================

    fn check_idea(&self, draft: &IdeaDraft) -> StoreResult<()> {
        if draft.title.trim().is_empty() {
            return Err(StoreError::Validation("Idea title is required".to_string()));
        }
        if self.game(&draft.game_id).is_none() {
            return Err(StoreError::Validation(format!(
                "Game {} does not exist",
                draft.game_id
            )));
        }
        Ok(())
    }

    pub fn add_idea(&mut self, draft: IdeaDraft) -> StoreResult<&Idea> {
        self.check_idea(&draft)?;
        self.ideas.push(Idea::new(draft));
        Ok(&self.ideas[self.ideas.len() - 1])
    }

    pub fn update_idea(&mut self, id: &str, draft: IdeaDraft) -> StoreResult<&Idea> {
        self.check_idea(&draft)?;
        let idea = self
            .ideas
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("Idea {} not found", id)))?;
        idea.apply(draft);
        Ok(idea)
    }

    pub fn delete_idea(&mut self, id: &str) -> StoreResult<Idea> {
        let index = self
            .ideas
            .iter()
            .position(|i| i.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("Idea {} not found", id)))?;
        let idea = self.ideas.remove(index);
        if let Some(order) = self.ideas_orders.get_mut(&idea.game_id) {
            order.retain(|i| i != id);
        }
        Ok(idea)
    }

    // ==================== ORDERING ====================

    pub fn ordered_games(&self) -> Vec<&Game> {
        apply_ordering(&self.games, &self.games_order, |g| g.id.as_str())
    }

    pub fn ordered_ideas(&self, game_id: &str) -> Vec<&Idea> {
        let own: Vec<&Idea> = self.ideas.iter().filter(|i| i.game_id == game_id).collect();
        let order = self.ideas_order(game_id).unwrap_or(&[]);
        apply_ordering(&own, order, |i| i.id.as_str())
            .into_iter()
            .copied()
            .collect()
    }

    /// The game's ideas in display order, narrowed by `filter`.
    pub fn filter_ideas(&self, game_id: &str, filter: &IdeaFilter) -> Vec<&Idea> {
        let needle = filter
            .search
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .unwrap_or_default();
        let tag = filter.tag.as_deref().filter(|t| !t.is_empty());

        self.ordered_ideas(game_id)
            .into_iter()
            .filter(|i| tag.map_or(true, |t| i.tags.iter().any(|x| x == t)))
            .filter(|i| i.matches_search(&needle))
            .collect()
    }

    pub fn games_order(&self) -> &[String] {
        &self.games_order
    }

    pub fn ideas_order(&self, game_id: &str) -> Option<&[String]> {
        self.ideas_orders.get(game_id).map(Vec::as_slice)
    }

    /// Set the game display order; unknown ids are dropped, missing games appended.
    pub fn reorder_games(&mut self, ids: &[String]) {
        self.games_order = repair_ordering(&self.games, ids, |g| g.id.as_str());
    }

    /// Set the display order of one game's ideas.
    pub fn reorder_ideas(&mut self, game_id: &str, ids: &[String]) -> StoreResult<()> {
        if self.game(game_id).is_none() {
            return Err(StoreError::NotFound(format!("Game {} not found", game_id)));
        }
        let own: Vec<&Idea> = self.ideas.iter().filter(|i| i.game_id == game_id).collect();
        let order = repair_ordering(&own, ids, |i| i.id.as_str());
        self.ideas_orders.insert(game_id.to_string(), order);
        Ok(())
    }

    // ==================== PERSISTENCE ====================

    /// Every document describing the board, ideas before games.
    pub fn documents(&self) -> Vec<(Entity, serde_json::Value)> {
        let mut documents = vec![
            (
                Entity::Ideas,
                json!(Document::new(DocumentKind::Ideas, self.ideas.iter().collect::<Vec<_>>())),
            ),
            (
                Entity::Games,
                json!(Document::new(DocumentKind::Games, self.games.iter().collect::<Vec<_>>())),
            ),
            (
                Entity::GamesOrder,
                json!(Document::new(DocumentKind::GamesOrder, self.games_order.clone())),
            ),
        ];

        for (game_id, order) in &self.ideas_orders {
            if self.game(game_id).is_some() {
                documents.push((
                    Entity::IdeasOrder(game_id.clone()),
                    json!(Document::new(DocumentKind::IdeasOrder, order.clone())),
                ));
            }
        }
        documents
    }

    /// Save the whole board; one commit when syncing, otherwise local only.
    ///
    /// Nothing is written while any loaded document was unreadable.
    pub async fn persist(&self, store: &DataStore, message: &str) -> StoreResult<SaveReport> {
        self.ensure_intact()?;
        Ok(store.save_snapshot(&self.documents(), message).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::parse_tags;

    fn board_with_two_games() -> (IdeaBoard, String, String) {
        let mut board = IdeaBoard::default();
        let g1 = board.add_game("Skyline", "Parkour").unwrap().id.clone();
        let g2 = board.add_game("Depths", "").unwrap().id.clone();
        (board, g1, g2)
    }

    fn draft(game_id: &str, title: &str, tags: &str) -> IdeaDraft {
        IdeaDraft {
            game_id: game_id.to_string(),
            title: title.to_string(),
            tags: parse_tags(tags),
            ..IdeaDraft::default()
        }
    }

    #[test]
    fn test_duplicate_game_name_rejected() {
        let (mut board, _, g2) = board_with_two_games();
        assert!(matches!(
            board.add_game(" Skyline ", ""),
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(
            board.update_game(&g2, Some("Skyline"), None),
            Err(StoreError::Validation(_))
        ));
        assert!(board.update_game(&g2, Some("Depths"), Some("Caves")).is_ok());
        assert!(matches!(board.add_game("  ", ""), Err(StoreError::Validation(_))));
    }

    #[test]
    fn test_cascade_delete_only_touches_group() {
        let (mut board, g1, g2) = board_with_two_games();
        board.add_idea(draft(&g1, "Wall run", "movement")).unwrap();
        board.add_idea(draft(&g1, "Zipline", "")).unwrap();
        let kept = board.add_idea(draft(&g2, "Sonar", "")).unwrap().id.clone();
        board.reorder_games(&[g2.clone(), g1.clone()]);

        let removed = board.delete_game(&g1).unwrap();

        assert_eq!(removed, 2);
        assert!(board.game(&g1).is_none());
        assert_eq!(board.ideas().len(), 1);
        assert_eq!(board.ideas()[0].id, kept);
        assert_eq!(board.games_order(), &[g2.clone()]);
    }

    #[test]
    fn test_idea_needs_existing_game() {
        let (mut board, _, _) = board_with_two_games();
        assert!(matches!(
            board.add_idea(draft("game-missing", "Orphan", "")),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn test_ordered_ideas_repairs_order() {
        let (mut board, g1, g2) = board_with_two_games();
        let a = board.add_idea(draft(&g1, "A", "")).unwrap().id.clone();
        let b = board.add_idea(draft(&g1, "B", "")).unwrap().id.clone();
        let c = board.add_idea(draft(&g1, "C", "")).unwrap().id.clone();
        board.add_idea(draft(&g2, "Other", "")).unwrap();

        board.reorder_ideas(&g1, &[c.clone(), a.clone()]).unwrap();
        let titles: Vec<_> = board.ordered_ideas(&g1).iter().map(|i| i.title.clone()).collect();
        assert_eq!(titles, vec!["C", "A", "B"]);
        assert_eq!(board.ideas_order(&g1).unwrap(), &[c.clone(), a.clone(), b.clone()]);

        board.delete_idea(&a).unwrap();
        let titles: Vec<_> = board.ordered_ideas(&g1).iter().map(|i| i.title.clone()).collect();
        assert_eq!(titles, vec!["C", "B"]);
    }

    #[test]
    fn test_filter_by_tag_and_search() {
        let (mut board, g1, _) = board_with_two_games();
        board.add_idea(draft(&g1, "Wall run", "movement, core")).unwrap();
        board.add_idea(draft(&g1, "Grapple hook", "movement")).unwrap();
        board.add_idea(draft(&g1, "Crafting", "economy")).unwrap();

        let by_tag = board.filter_ideas(
            &g1,
            &IdeaFilter {
                tag: Some("movement".to_string()),
                search: None,
            },
        );
        assert_eq!(by_tag.len(), 2);

        let both = board.filter_ideas(
            &g1,
            &IdeaFilter {
                tag: Some("movement".to_string()),
                search: Some("GRAPPLE".to_string()),
            },
        );
        assert_eq!(both.len(), 1);
        assert_eq!(both[0].title, "Grapple hook");

        assert_eq!(board.tags_for_game(&g1), vec!["core", "economy", "movement"]);
    }

    #[test]
    fn test_documents_put_ideas_first_and_skip_dead_orderings() {
        let (mut board, g1, _) = board_with_two_games();
        let a = board.add_idea(draft(&g1, "A", "")).unwrap().id.clone();
        board.reorder_ideas(&g1, &[a]).unwrap();

        let docs = board.documents();
        assert_eq!(docs[0].0, Entity::Ideas);
        assert_eq!(docs[1].0, Entity::Games);
        assert!(docs.iter().any(|(e, _)| *e == Entity::IdeasOrder(g1.clone())));

        board.delete_game(&g1).unwrap();
        let docs = board.documents();
        assert!(!docs.iter().any(|(e, _)| matches!(e, Entity::IdeasOrder(_))));
    }
}
