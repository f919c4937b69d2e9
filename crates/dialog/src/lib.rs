use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use shared::{
    domain::{
        EventDetails, EventId, EventSummary, NewEvent, NewSong, Participation,
        ParticipationDetails, Person, SessionId, Song, SongId, UserId,
    },
    protocol::Render,
};

pub mod announce;
pub mod catalog;
pub mod config;
pub mod event_wizard;
pub mod pager;
pub mod participations;
mod router;
pub mod session;
pub mod song_wizard;
pub mod tracklist;
pub mod validate;
pub mod wizard;

pub use config::DialogConfig;
pub use router::Dialogs;

/// Persistence the dialogs read from and commit to.
#[async_trait]
pub trait ClubStore: Send + Sync {
    /// All songs ordered by id.
    async fn list_songs(&self) -> Result<Vec<Song>>;
    async fn load_song(&self, song_id: SongId) -> Result<Option<Song>>;
    async fn create_song(&self, song: &NewSong) -> Result<SongId>;
    /// Stores the event and every tracklist entry in one commit; on error
    /// nothing is stored.
    async fn create_event(&self, event: &NewEvent) -> Result<EventId>;
    /// Returns false when no such event existed.
    async fn delete_event(&self, event_id: EventId) -> Result<bool>;
    async fn load_event(&self, event_id: EventId) -> Result<Option<EventDetails>>;
    /// Events on or after `from`, soonest first.
    async fn list_events_from(&self, from: NaiveDate) -> Result<Vec<EventSummary>>;
    async fn upsert_person(&self, person: &Person) -> Result<()>;
    async fn list_people(&self) -> Result<Vec<Person>>;
    /// Returns false when the person already holds that role.
    async fn join_song(&self, participation: &Participation) -> Result<bool>;
    /// Returns false when there was no such role to leave.
    async fn leave_song(&self, participation: &Participation) -> Result<bool>;
    /// Roles held by `user_id`, ordered by song then role.
    async fn list_participations(&self, user_id: UserId) -> Result<Vec<ParticipationDetails>>;
    async fn list_song_participants(&self, song_id: SongId) -> Result<Vec<ParticipationDetails>>;
}

/// Outbound message delivery to a single user.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_text(&self, recipient: UserId, text: &str) -> Result<()>;
}

/// What the transport should do after an action was handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Show `render` in the session's chat.
    Render { session_id: SessionId, render: Render },
    /// No session is active; show the main menu.
    Menu(Render),
    /// The session ended; tell the user and return to the menu.
    Finished { notice: String },
    /// The session ended without a notice.
    Closed,
    /// Nothing changed and nothing needs to be shown.
    Ignored,
}

impl Outcome {
    pub fn render(&self) -> Option<&Render> {
        match self {
            Self::Render { render, .. } | Self::Menu(render) => Some(render),
            _ => None,
        }
    }

    pub fn session_id(&self) -> Option<SessionId> {
        match self {
            Self::Render { session_id, .. } => Some(*session_id),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;
