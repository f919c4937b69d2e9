use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use dialog::{validate, ClubStore, Dialogs};
use shared::domain::{ChatType, NewSong, UserId};
use storage::Storage;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod console;
mod settings;

use console::{Console, ConsoleTransport};

#[derive(Parser, Debug)]
#[command(about = "Music club dialogs over a terminal")]
struct Cli {
    /// Overrides the database url from settings.
    #[arg(long)]
    database_url: Option<String>,
    #[arg(long, default_value = "club.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Chat with the dialogs as the given user.
    Run {
        #[arg(long)]
        user: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, value_enum, default_value_t = Chat::Private)]
        chat_type: Chat,
    },
    Songs,
    /// Upcoming events with their tracklists.
    Events,
    AddSong {
        title: String,
        link: String,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Chat {
    Private,
    Group,
    Supergroup,
    Channel,
}

impl From<Chat> for ChatType {
    fn from(value: Chat) -> Self {
        match value {
            Chat::Private => ChatType::Private,
            Chat::Group => ChatType::Group,
            Chat::Supergroup => ChatType::Supergroup,
            Chat::Channel => ChatType::Channel,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = settings::load_settings(&cli.config)?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&settings.log_level))
        .init();

    let raw_url = cli.database_url.as_deref().unwrap_or(&settings.database_url);
    let database_url = settings::normalize_database_url(raw_url);
    let storage = Arc::new(Storage::new(&database_url).await?);
    match storage::sqlite_path(&database_url) {
        Some(path) => info!(%database_url, path = %path.display(), "storage ready"),
        None => info!(%database_url, "storage ready (in memory)"),
    }

    match cli.command {
        Command::Run {
            user,
            name,
            chat_type,
        } => {
            let dialogs = Dialogs::new(
                settings.dialog_config(),
                storage,
                Arc::new(ConsoleTransport),
            );
            Console::new(dialogs, UserId(user), name, chat_type.into())
                .run()
                .await?;
        }
        Command::Songs => {
            for song in storage.list_songs().await? {
                println!("{}\t{}\t{}", song.id, song.title, song.link);
            }
        }
        Command::Events => {
            let today = Utc::now().date_naive();
            for event in storage.list_events_from(today).await? {
                println!("{}\t{}\t{}", event.id, event.date, event.name);
                if let Some(details) = storage.load_event(event.id).await? {
                    for track in details.tracklist {
                        println!("\t{}. {}", track.position + 1, track.title);
                    }
                }
            }
        }
        Command::AddSong { title, link } => {
            if let Err(rejection) = validate::check_title(&title) {
                anyhow::bail!("title rejected: {}", rejection.reason());
            }
            let Some(link) = validate::parse_url(&link) else {
                anyhow::bail!("not a link: {link}");
            };
            let song_id = storage.create_song(&NewSong { title, link }).await?;
            println!("created song_id={song_id}");
        }
    }

    Ok(())
}
