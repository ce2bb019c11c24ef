//! Ideas Sync command line
//!
//! Manage game design ideas stored in a GitHub repository, with a local cache fallback.

use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ideas_sync::auth::Credential;
use ideas_sync::config::{Config, RepoSettings, RepoSettingsPatch};
use ideas_sync::errors::{StoreError, StoreResult};
use ideas_sync::models::{parse_tags, Idea, IdeaDraft, IdeaPriority, IdeaStatus};
use ideas_sync::store::{DataStore, IdeaBoard, IdeaFilter, SaveOutcome, SaveReport};

#[derive(Parser)]
#[command(name = "ideas-sync")]
#[command(about = "Game design ideas kept in a GitHub repository")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage games
    #[command(subcommand)]
    Games(GamesCommand),
    /// Manage ideas
    #[command(subcommand)]
    Ideas(IdeasCommand),
    /// Show or change the repository settings
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Store or forget the GitHub token
    #[command(subcommand)]
    Token(TokenCommand),
    /// Push every document in one commit
    Sync,
}

#[derive(Subcommand)]
enum GamesCommand {
    List,
    Add {
        name: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    Edit {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Delete a game and all of its ideas
    Remove { id: String },
    Reorder { ids: Vec<String> },
}

#[derive(Args)]
struct IdeaFields {
    #[arg(long, default_value = "")]
    content: String,
    /// Comma-separated tags
    #[arg(long, default_value = "")]
    tags: String,
    #[arg(long, default_value = "draft")]
    status: IdeaStatus,
    #[arg(long, default_value = "medium")]
    priority: IdeaPriority,
}

/// Idea fields for `ideas edit`; omitted flags keep the current value.
#[derive(Args)]
struct IdeaChanges {
    #[arg(long)]
    game: Option<String>,
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    content: Option<String>,
    /// Comma-separated tags, replacing the current ones
    #[arg(long)]
    tags: Option<String>,
    #[arg(long)]
    status: Option<IdeaStatus>,
    #[arg(long)]
    priority: Option<IdeaPriority>,
}

#[derive(Subcommand)]
enum IdeasCommand {
    List {
        game: String,
        #[arg(long)]
        tag: Option<String>,
        #[arg(long)]
        search: Option<String>,
    },
    Add {
        game: String,
        title: String,
        #[command(flatten)]
        fields: IdeaFields,
    },
    Edit {
        id: String,
        #[command(flatten)]
        changes: IdeaChanges,
    },
    Remove { id: String },
    Reorder { game: String, ids: Vec<String> },
}

#[derive(Subcommand)]
enum ConfigCommand {
    Show,
    Set {
        #[arg(long)]
        owner: Option<String>,
        #[arg(long)]
        repo: Option<String>,
        #[arg(long)]
        branch: Option<String>,
    },
}

#[derive(Subcommand)]
enum TokenCommand {
    Set { token: String },
    Clear,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::from_env();

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::debug!("Cache path: {:?}", config.cache_path);
    tracing::debug!("API base: {}", config.api_base);

    match run(cli.command, &config).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, config: &Config) -> StoreResult<ExitCode> {
    let store = ideas_sync::open_store(config).await?;

    match command {
        Command::Games(cmd) => games(cmd, &store).await,
        Command::Ideas(cmd) => ideas(cmd, &store).await,
        Command::Config(cmd) => settings(cmd, &store).await,
        Command::Token(cmd) => token(cmd, &store).await,
        Command::Sync => {
            let board = IdeaBoard::load(&store).await;
            Ok(report(board.persist(&store, "Sync design ideas").await?))
        }
    }
}

async fn games(cmd: GamesCommand, store: &DataStore) -> StoreResult<ExitCode> {
    let mut board = IdeaBoard::load(store).await;
    if !matches!(cmd, GamesCommand::List) {
        board.ensure_intact()?;
    }

    match cmd {
        GamesCommand::List => {
            for game in board.ordered_games() {
                println!(
                    "{}\t{}\t{} idea(s)\t{}",
                    game.id,
                    game.name,
                    board.ideas_count(&game.id),
                    game.created_at.format("%Y-%m-%d")
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        GamesCommand::Add { name, description } => {
            let id = board.add_game(&name, &description)?.id.clone();
            println!("{}", id);
            Ok(report(store.save_games(board.games()).await))
        }
        GamesCommand::Edit {
            id,
            name,
            description,
        } => {
            board.update_game(&id, name.as_deref(), description.as_deref())?;
            Ok(report(store.save_games(board.games()).await))
        }
        GamesCommand::Remove { id } => {
            let name = board.game_name(&id).to_string();
            let removed = board.delete_game(&id)?;
            println!("Removed {} and {} idea(s)", name, removed);
            let message = format!("Delete game {} and its ideas", name);
            Ok(report(board.persist(store, &message).await?))
        }
        GamesCommand::Reorder { ids } => {
            board.reorder_games(&ids);
            Ok(report(store.save_games_order(board.games_order()).await))
        }
    }
}

fn draft(game_id: String, title: String, fields: IdeaFields) -> IdeaDraft {
    IdeaDraft {
        game_id,
        title,
        content: fields.content,
        tags: parse_tags(&fields.tags),
        status: fields.status,
        priority: fields.priority,
    }
}

impl IdeaChanges {
    /// Draft holding `current` with the given flags applied.
    fn apply_to(self, current: &Idea) -> IdeaDraft {
        let base = IdeaDraft::from(current);
        IdeaDraft {
            game_id: self.game.unwrap_or(base.game_id),
            title: self.title.unwrap_or(base.title),
            content: self.content.unwrap_or(base.content),
            tags: self.tags.map(|t| parse_tags(&t)).unwrap_or(base.tags),
            status: self.status.unwrap_or(base.status),
            priority: self.priority.unwrap_or(base.priority),
        }
    }
}

async fn ideas(cmd: IdeasCommand, store: &DataStore) -> StoreResult<ExitCode> {
    let mut board = IdeaBoard::load(store).await;
    if !matches!(cmd, IdeasCommand::List { .. }) {
        board.ensure_intact()?;
    }

    match cmd {
        IdeasCommand::List { game, tag, search } => {
            println!("# {}", board.game_name(&game));
            for idea in board.filter_ideas(&game, &IdeaFilter { tag, search }) {
                println!(
                    "{}\t{}\t[{}]\t{}\t{}",
                    idea.id,
                    idea.title,
                    idea.tags.join(", "),
                    idea.status.as_str(),
                    idea.priority.as_str()
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        IdeasCommand::Add {
            game,
            title,
            fields,
        } => {
            let id = board.add_idea(draft(game, title, fields))?.id.clone();
            println!("{}", id);
            Ok(report(store.save_ideas(board.ideas()).await))
        }
        IdeasCommand::Edit { id, changes } => {
            let current = board
                .idea(&id)
                .ok_or_else(|| StoreError::NotFound(format!("Idea {} not found", id)))?;
            let draft = changes.apply_to(current);
            board.update_idea(&id, draft)?;
            Ok(report(store.save_ideas(board.ideas()).await))
        }
        IdeasCommand::Remove { id } => {
            board.delete_idea(&id)?;
            Ok(report(store.save_ideas(board.ideas()).await))
        }
        IdeasCommand::Reorder { game, ids } => {
            board.reorder_ideas(&game, &ids)?;
            let order = board.ideas_order(&game).unwrap_or(&[]);
            Ok(report(store.save_ideas_order(&game, order).await))
        }
    }
}

async fn settings(cmd: ConfigCommand, store: &DataStore) -> StoreResult<ExitCode> {
    let shown = match cmd {
        ConfigCommand::Show => RepoSettings::load(store.cache()).await,
        ConfigCommand::Set {
            owner,
            repo,
            branch,
        } => {
            let patch = RepoSettingsPatch {
                owner,
                repo,
                branch,
            };
            RepoSettings::update(store.cache(), patch).await?
        }
    };
    println!("{}/{}@{}", shown.owner, shown.repo, shown.branch);
    Ok(ExitCode::SUCCESS)
}

async fn token(cmd: TokenCommand, store: &DataStore) -> StoreResult<ExitCode> {
    match cmd {
        TokenCommand::Set { token } => {
            Credential::store(store.cache(), &token).await?;
            println!("Token saved");
        }
        TokenCommand::Clear => {
            Credential::clear(store.cache()).await?;
            println!("Token cleared");
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Print the outcome of a save and pick the exit code.
fn report(save: SaveReport) -> ExitCode {
    match (&save.outcome, save.is_lost()) {
        (_, true) => {
            eprintln!("error: {}", save.summary());
            ExitCode::FAILURE
        }
        (SaveOutcome::SyncFailed(_), false) => {
            eprintln!("warning: {}", save.summary());
            ExitCode::FAILURE
        }
        (SaveOutcome::NotSynced, false) => {
            eprintln!("warning: {}", save.summary());
            ExitCode::SUCCESS
        }
        (SaveOutcome::Synced { .. }, false) => {
            println!("{}", save.summary());
            ExitCode::SUCCESS
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored_idea() -> Idea {
        Idea::new(IdeaDraft {
            game_id: "game-1".to_string(),
            title: "Wall run".to_string(),
            content: "Chain into a jump".to_string(),
            tags: vec!["movement".to_string()],
            status: IdeaStatus::InProgress,
            priority: IdeaPriority::High,
        })
    }

    fn edit_changes(args: &[&str]) -> IdeaChanges {
        let argv = ["ideas-sync", "ideas", "edit", "idea-1"].iter().chain(args);
        match Cli::try_parse_from(argv).expect("valid command line").command {
            Command::Ideas(IdeasCommand::Edit { changes, .. }) => changes,
            _ => panic!("expected ideas edit"),
        }
    }

    #[test]
    fn test_edit_keeps_fields_not_given() {
        let current = stored_idea();
        let draft = edit_changes(&["--title", "Wall sprint"]).apply_to(&current);

        assert_eq!(draft.title, "Wall sprint");
        assert_eq!(draft.game_id, "game-1");
        assert_eq!(draft.content, "Chain into a jump");
        assert_eq!(draft.tags, vec!["movement"]);
        assert_eq!(draft.status, IdeaStatus::InProgress);
        assert_eq!(draft.priority, IdeaPriority::High);
    }

    #[test]
    fn test_edit_applies_given_fields() {
        let current = stored_idea();
        let draft = edit_changes(&["--tags", "combat, ai", "--status", "done", "--priority", "low"])
            .apply_to(&current);

        assert_eq!(draft.title, "Wall run");
        assert_eq!(draft.tags, vec!["combat", "ai"]);
        assert_eq!(draft.status, IdeaStatus::Done);
        assert_eq!(draft.priority, IdeaPriority::Low);
        assert_eq!(draft.content, "Chain into a jump");
    }
}
