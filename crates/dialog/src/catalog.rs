//! Read-only browsing of songs and upcoming events, plus event deletion for
//! admins.

use std::{fmt, sync::Arc};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use shared::{
    domain::{EventDetails, EventId, ParticipationDetails, SessionId, Song, SongId, UserId},
    error::DialogError,
    protocol::{Action, Button, Render},
};
use tracing::{debug, info};

use crate::{
    config::DialogConfig,
    pager::{self, PageWindow},
    session::{Session, SessionStore},
    ClubStore, Outcome,
};

pub const SONGS_PAGE_KEY: &str = "songs";
pub const EVENTS_PAGE_KEY: &str = "events";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "view", content = "id", rename_all = "snake_case")]
pub enum BrowseStep {
    Songs,
    Song(SongId),
    Events,
    Event(EventId),
}

impl fmt::Display for BrowseStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Songs => f.write_str("songs"),
            Self::Song(id) => write!(f, "song {id}"),
            Self::Events => f.write_str("events"),
            Self::Event(id) => write!(f, "event {id}"),
        }
    }
}

impl BrowseStep {
    fn list(self) -> Self {
        match self {
            Self::Songs | Self::Song(_) => Self::Songs,
            Self::Events | Self::Event(_) => Self::Events,
        }
    }

    fn page_key(self) -> &'static str {
        match self.list() {
            Self::Events => EVENTS_PAGE_KEY,
            _ => SONGS_PAGE_KEY,
        }
    }
}

/// Song browsing and event browsing are separate dialog kinds, each with its
/// own store, so an owner can keep one session of each.
pub struct Catalog<P> {
    config: Arc<DialogConfig>,
    store: Arc<P>,
    songs: SessionStore<BrowseStep>,
    events: SessionStore<BrowseStep>,
}

impl<P: ClubStore> Catalog<P> {
    pub fn new(config: Arc<DialogConfig>, store: Arc<P>) -> Self {
        Self {
            config,
            store,
            songs: SessionStore::new(),
            events: SessionStore::new(),
        }
    }

    pub async fn owns(&self, session_id: SessionId) -> bool {
        self.songs.contains(session_id).await || self.events.contains(session_id).await
    }

    pub async fn session(&self, session_id: SessionId) -> Result<Session<BrowseStep>, DialogError> {
        self.sessions_of(session_id).await?.get(session_id).await
    }

    async fn sessions_of(
        &self,
        session_id: SessionId,
    ) -> Result<&SessionStore<BrowseStep>, DialogError> {
        if self.songs.contains(session_id).await {
            Ok(&self.songs)
        } else if self.events.contains(session_id).await {
            Ok(&self.events)
        } else {
            Err(DialogError::session_not_found(session_id))
        }
    }

    pub async fn browse_songs(&self, actor: UserId) -> Result<Outcome, DialogError> {
        let session_id = self.songs.create(actor, BrowseStep::Songs).await;
        self.rendered(session_id, actor).await
    }

    pub async fn browse_events(&self, actor: UserId) -> Result<Outcome, DialogError> {
        let session_id = self.events.create(actor, BrowseStep::Events).await;
        self.rendered(session_id, actor).await
    }

    pub async fn handle(
        &self,
        session_id: SessionId,
        actor: UserId,
        action: &Action,
    ) -> Result<Outcome, DialogError> {
        let sessions = self.sessions_of(session_id).await?;
        let session = sessions.get(session_id).await?;
        if session.owner != actor {
            debug!(session = %session_id, %actor, "ignoring input from non-owner");
            return Ok(Outcome::Ignored);
        }
        let step = session.step;

        let next = match (step, action) {
            (_, Action::Cancel) | (BrowseStep::Songs | BrowseStep::Events, Action::Back) => {
                sessions.destroy(session_id).await;
                return Ok(Outcome::Closed);
            }
            (BrowseStep::Song(_) | BrowseStep::Event(_), Action::Back) => step.list(),
            (BrowseStep::Songs | BrowseStep::Events, Action::NextPage | Action::PrevPage) => {
                let key = step.page_key();
                let forward = matches!(action, Action::NextPage);
                sessions
                    .mutate(session_id, |session| {
                        let state = session.scratch.page_state(key);
                        let state = if forward { state.next() } else { state.prev() };
                        session.scratch.set_page_state(key, state);
                    })
                    .await?;
                step
            }
            (BrowseStep::Songs | BrowseStep::Events, Action::PageCounter) => step,
            (BrowseStep::Songs, Action::OpenSong { song_id }) => BrowseStep::Song(*song_id),
            (BrowseStep::Events, Action::OpenEvent { event_id }) => BrowseStep::Event(*event_id),
            (BrowseStep::Event(current), Action::DeleteEvent { event_id })
                if current == *event_id =>
            {
                return self.delete(session_id, actor, *event_id).await;
            }
            _ => {
                debug!(session = %session_id, %step, "action does not apply to this view");
                return Ok(Outcome::Ignored);
            }
        };

        sessions
            .mutate(session_id, |session| session.step = next)
            .await?;
        self.rendered(session_id, actor).await
    }

    async fn delete(
        &self,
        session_id: SessionId,
        actor: UserId,
        event_id: EventId,
    ) -> Result<Outcome, DialogError> {
        if !self.config.is_admin(actor) {
            debug!(session = %session_id, %actor, "non-admin tried to delete an event");
            return Ok(Outcome::Ignored);
        }
        let deleted = self.store.delete_event(event_id).await?;
        self.events
            .mutate(session_id, |session| session.step = BrowseStep::Events)
            .await?;
        if !deleted {
            return Err(DialogError::NotFound(format!("event {event_id}")));
        }
        info!(event = %event_id, %actor, "event deleted");
        self.rendered(session_id, actor).await
    }

    async fn rendered(&self, session_id: SessionId, actor: UserId) -> Result<Outcome, DialogError> {
        let sessions = self.sessions_of(session_id).await?;
        let session = sessions.get(session_id).await?;
        let render = match session.step {
            BrowseStep::Songs => {
                let songs = self.store.list_songs().await?;
                let rows = songs
                    .iter()
                    .map(|song| Button::new(song.title.clone(), Action::OpenSong { song_id: song.id }))
                    .collect::<Vec<_>>();
                self.list_render(sessions, session_id, BrowseStep::Songs, "Songs", rows)
                    .await?
            }
            BrowseStep::Events => {
                let today = Utc::now().date_naive();
                let events = self.store.list_events_from(today).await?;
                let rows = events
                    .iter()
                    .map(|event| {
                        Button::new(
                            format!("{} {}", event.date.format("%d.%m"), event.name),
                            Action::OpenEvent { event_id: event.id },
                        )
                    })
                    .collect::<Vec<_>>();
                self.list_render(sessions, session_id, BrowseStep::Events, "Upcoming events", rows)
                    .await?
            }
            BrowseStep::Song(song_id) => match self.store.load_song(song_id).await? {
                Some(song) => {
                    let participants = self.store.list_song_participants(song_id).await?;
                    song_render(&song, &participants)
                }
                None => return missing(sessions, session_id, format!("song {song_id}")).await,
            },
            BrowseStep::Event(event_id) => match self.store.load_event(event_id).await? {
                Some(event) => event_render(&event, self.config.is_admin(actor)),
                None => return missing(sessions, session_id, format!("event {event_id}")).await,
            },
        };
        Ok(Outcome::Render {
            session_id,
            render: render.button("Back", Action::Back),
        })
    }

    async fn list_render(
        &self,
        sessions: &SessionStore<BrowseStep>,
        session_id: SessionId,
        step: BrowseStep,
        title: &str,
        buttons: Vec<Button>,
    ) -> Result<Render, DialogError> {
        let key = step.page_key();
        let page_size = self.config.page_size;
        let render = sessions
            .mutate(session_id, |session| {
                let stored = session.scratch.page_state(key);
                let window = pager::paginate(&buttons, stored.page() as i64, page_size);
                session.scratch.set_page_state(key, window.state);
                paged_list(Render::new(title), window)
            })
            .await?;
        if buttons.is_empty() {
            return Ok(render.line("Nothing here yet"));
        }
        Ok(render)
    }
}

/// One button per row for the window, then the page row when there is more
/// than one page.
pub(crate) fn paged_list(mut render: Render, window: PageWindow<'_, Button>) -> Render {
    for button in window.items {
        render = render.row(vec![button.clone()]);
    }
    if window.state.total_pages() > 1 {
        render = render.row(vec![
            Button::new("<", Action::PrevPage),
            Button::new(window.state.label(), Action::PageCounter),
            Button::new(">", Action::NextPage),
        ]);
    }
    render
}

async fn missing(
    sessions: &SessionStore<BrowseStep>,
    session_id: SessionId,
    what: String,
) -> Result<Outcome, DialogError> {
    sessions
        .mutate(session_id, |session| session.step = session.step.list())
        .await?;
    Err(DialogError::NotFound(what))
}

fn song_render(song: &Song, participants: &[ParticipationDetails]) -> Render {
    let mut render = Render::new(song.title.clone()).line(song.link.clone());
    if !participants.is_empty() {
        render = render.line("Playing:");
        for participant in participants {
            render = render.line(format!("{} as {}", participant.person_name, participant.role));
        }
    }
    render.button("Join this song", Action::JoinSong { song_id: song.id })
}

fn event_render(event: &EventDetails, admin: bool) -> Render {
    let mut render = Render::new(event.name.clone()).line(format!("Date: {}", event.date));
    if !event.tracklist.is_empty() {
        render = render.line("Tracklist:");
        let mut tracks = event.tracklist.clone();
        tracks.sort_by_key(|track| track.position);
        for track in tracks {
            render = render.line(format!("{}. {}", track.position + 1, track.title));
        }
    }
    if admin {
        render = render.button(
            "Delete event",
            Action::DeleteEvent { event_id: event.id },
        );
    }
    render
}

#[cfg(test)]
#[path = "tests/catalog_tests.rs"]
mod tests;
