//! Secret Hitler Player - terminal composition root.
//!
//! Reads commands from stdin and prints session snapshots as they change:
//!
//! ```text
//! new <name>              create a game hosted by <name>
//! join <game_id> <name>   join an existing game
//! begin                   start the game (host, waiting room)
//! choose <choice>         answer the current prompt
//! state                   print the current snapshot
//! reset                   forget synchronized state
//! quit                    disconnect and exit
//! ```

use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use secret_hitler_player::application::dto::FormSubmission;
use secret_hitler_player::application::session::SessionSnapshot;
use secret_hitler_player::config::ClientConfig;
use secret_hitler_player::infrastructure::platform::{
    DesktopStorageProvider, DesktopTimeProvider,
};
use secret_hitler_player::infrastructure::websocket::SessionHandle;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv_from_repo_root();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "secret_hitler_player=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting Secret Hitler Player");

    let config = ClientConfig::from_env().context("invalid configuration")?;
    let storage = match &config.storage_path {
        Some(path) => DesktopStorageProvider::at(path),
        None => DesktopStorageProvider::new(),
    };
    tracing::info!(path = %storage.path().display(), "Identity storage");

    let handle = SessionHandle::start(&config, Arc::new(storage), Arc::new(DesktopTimeProvider))
        .context("failed to start session")?;

    let mut snapshots = handle.subscribe();
    let printer = tokio::spawn(async move {
        while snapshots.changed().await.is_ok() {
            let snapshot = snapshots.borrow_and_update().clone();
            println!("{}", render(&snapshot));
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let words: Vec<&str> = line.split_whitespace().collect();
        let result = match words.as_slice() {
            [] => continue,
            ["new", host @ ..] => {
                handle
                    .on_submit_form(FormSubmission::new_game(host.join(" ")))
                    .await
            }
            ["join", game_id, name @ ..] => {
                handle
                    .on_submit_form(FormSubmission::join_game(*game_id, name.join(" ")))
                    .await
            }
            ["begin"] => handle.on_submit_form(FormSubmission::BeginGame).await,
            ["choose", choice @ ..] => handle.on_user_choice(choice.join(" ")).await,
            ["state"] => {
                println!("{}", render(&handle.snapshot()));
                Ok(())
            }
            ["reset"] => handle.reset().await,
            ["quit"] | ["exit"] => break,
            _ => {
                eprintln!("unknown command: {line}");
                continue;
            }
        };

        if let Err(e) = result {
            eprintln!("rejected: {e}");
        }
    }

    handle.stop().await;
    printer.abort();
    Ok(())
}

fn render(snapshot: &SessionSnapshot) -> String {
    let state = &snapshot.state;
    let mut out = format!(
        "[{:?}] phase={:?} host={}",
        snapshot.connection,
        state.phase(),
        state.is_host()
    );

    if let Some((game_id, player_id)) = state.identity().pair() {
        out.push_str(&format!(" game={game_id} player={player_id}"));
    }
    if let Some(role) = state.secret_role() {
        out.push_str(&format!(" role={role}"));
    }

    let roster = state.roster();
    if !roster.live_players.is_empty() {
        out.push_str(&format!(
            "\n  players: {} | president: {} | chancellor: {}",
            roster.live_players.join(", "),
            roster.president.as_deref().unwrap_or("-"),
            roster.chancellor.as_deref().unwrap_or("-"),
        ));
    }

    let board = state.board();
    out.push_str(&format!(
        "\n  liberal {}/5 | fascist {}/6 | election tracker {}",
        board.liberal_progress, board.fascist_progress, board.election_tracker
    ));

    if let Some(prompt) = state.prompt() {
        let status = if snapshot.awaiting_answer() {
            "awaiting answer"
        } else {
            "answered"
        };
        out.push_str(&format!(
            "\n  prompt #{} ({}): {} [{}]",
            prompt.epoch,
            status,
            prompt.text,
            prompt.choices.join(" / ")
        ));
    }
    if let Some(entry) = state.event_log().latest() {
        let tag = if entry.is_error { "error" } else { "ok" };
        out.push_str(&format!("\n  {tag}: {}", entry.message));
    }
    if let Some(winner) = state.winner() {
        out.push_str(&format!("\n  winner: {winner}"));
    }
    out
}

fn load_dotenv_from_repo_root() {
    let repo_root = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..");

    // Prefer local overrides.
    for filename in [".env.local", ".env"] {
        let path = repo_root.join(filename);
        if path.exists() {
            let _ = dotenvy::from_path(path);
        }
    }
}
