use std::sync::Arc;

use chrono::{Days, NaiveDate, Utc};
use shared::{
    domain::{NewEvent, SessionId, Song, SongId, UserId},
    error::DialogError,
    protocol::{Action, Button, Render},
};
use tracing::{debug, info, warn};

use crate::{
    config::DialogConfig,
    pager::{self, PageWindow},
    session::{Scratch, Session, SessionStore},
    tracklist,
    wizard::{self, Effect, Next, WizardStep, DATE_KEY, SONGS_PAGE_KEY, TITLE_KEY, TRACKLIST_ENABLED_KEY},
    ClubStore, Outcome,
};

const CALENDAR_DAYS: u64 = 14;
const CALENDAR_ROW: usize = 7;

/// The event being assembled, read back from session scratch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    pub title: Option<String>,
    pub tracklist_enabled: Option<bool>,
    pub tracklist: Vec<SongId>,
    pub date: Option<NaiveDate>,
}

impl Draft {
    pub fn from_scratch(scratch: &Scratch) -> Self {
        Self {
            title: scratch.get_str(TITLE_KEY).map(str::to_string),
            tracklist_enabled: scratch.get_bool(TRACKLIST_ENABLED_KEY),
            tracklist: tracklist::picks(scratch),
            date: scratch
                .get_str(DATE_KEY)
                .and_then(|raw| raw.parse::<NaiveDate>().ok()),
        }
    }

    pub fn into_event(self) -> Result<NewEvent, DialogError> {
        let title = self
            .title
            .ok_or_else(|| DialogError::NotFound("draft title".into()))?;
        let date = self
            .date
            .ok_or_else(|| DialogError::NotFound("draft date".into()))?;
        let tracklist = if self.tracklist_enabled == Some(true) {
            tracklist::entries(&self.tracklist)
        } else {
            Vec::new()
        };
        Ok(NewEvent::new(title, date, tracklist))
    }
}

/// Admin wizard that assembles an event and commits it in one go.
pub struct EventWizard<P> {
    config: Arc<DialogConfig>,
    store: Arc<P>,
    sessions: SessionStore<WizardStep>,
}

impl<P: ClubStore> EventWizard<P> {
    pub fn new(config: Arc<DialogConfig>, store: Arc<P>) -> Self {
        Self {
            config,
            store,
            sessions: SessionStore::new(),
        }
    }

    pub fn sessions(&self) -> &SessionStore<WizardStep> {
        &self.sessions
    }

    pub async fn owns(&self, session_id: SessionId) -> bool {
        self.sessions.contains(session_id).await
    }

    pub async fn start(&self, actor: UserId) -> Result<Outcome, DialogError> {
        if !self.config.is_admin(actor) {
            return Err(DialogError::UnauthorizedActor { actor });
        }
        let session_id = self.sessions.create(actor, WizardStep::Title).await;
        info!(session = %session_id, %actor, "event wizard started");
        self.rendered(session_id).await
    }

    pub async fn handle(
        &self,
        session_id: SessionId,
        actor: UserId,
        action: &Action,
    ) -> Result<Outcome, DialogError> {
        let session = self.sessions.get(session_id).await?;
        let transition = match wizard::on_input(session.step, action, session.owner, actor) {
            Ok(transition) => transition,
            Err(DialogError::UnauthorizedActor { .. }) => {
                debug!(session = %session_id, %actor, "ignoring input from non-owner");
                return Ok(Outcome::Ignored);
            }
            Err(err @ DialogError::ValidationRejected { .. }) => {
                debug!(session = %session_id, error = %err, "input rejected, re-prompting");
                return self.rendered(session_id).await;
            }
            Err(err) => return Err(err),
        };

        match transition.next {
            Next::Cancel => {
                self.sessions.destroy(session_id).await;
                info!(session = %session_id, "event wizard cancelled");
                Ok(Outcome::Finished {
                    notice: "Event creation cancelled".into(),
                })
            }
            Next::Commit => self.commit(session_id).await,
            Next::Goto(_) | Next::Stay => {
                if let Effect::PickSong(song_id) = &transition.effect {
                    if self.store.load_song(*song_id).await?.is_none() {
                        debug!(session = %session_id, song = %song_id, "picked song does not exist");
                        return self.rendered(session_id).await;
                    }
                }
                self.sessions
                    .mutate(session_id, |session| wizard::apply(session, &transition))
                    .await?;
                self.rendered(session_id).await
            }
        }
    }

    /// Hands the draft to the store. A failed commit keeps the session at
    /// the confirm step so the same confirmation can be retried.
    async fn commit(&self, session_id: SessionId) -> Result<Outcome, DialogError> {
        let session = self.sessions.get(session_id).await?;
        let event = Draft::from_scratch(&session.scratch).into_event()?;
        let event_id = match self.store.create_event(&event).await {
            Ok(event_id) => event_id,
            Err(err) => {
                warn!(session = %session_id, error = %format!("{err:#}"), "event commit failed");
                return Err(DialogError::Persistence(err));
            }
        };
        self.sessions.destroy(session_id).await;
        info!(
            session = %session_id,
            event = %event_id,
            tracks = event.tracklist().len(),
            "event created"
        );
        Ok(Outcome::Finished {
            notice: format!("Event \"{}\" created", event.name()),
        })
    }

    async fn rendered(&self, session_id: SessionId) -> Result<Outcome, DialogError> {
        let render = self.render(session_id).await?;
        Ok(Outcome::Render { session_id, render })
    }

    async fn render(&self, session_id: SessionId) -> Result<Render, DialogError> {
        let session = self.sessions.get(session_id).await?;
        let render = match session.step {
            WizardStep::Title => Render::new("What is the event called?"),
            WizardStep::TracklistToggle => Render::new("Will the event have a tracklist?").row(vec![
                Button::new("Yes", Action::EnableTracklist),
                Button::new("No", Action::DisableTracklist),
            ]),
            WizardStep::PickSongs => {
                let songs = self.store.list_songs().await?;
                let page_size = self.config.page_size;
                self.sessions
                    .mutate(session_id, |session| {
                        let stored = session.scratch.page_state(SONGS_PAGE_KEY);
                        let window = pager::paginate(&songs, stored.page() as i64, page_size);
                        session.scratch.set_page_state(SONGS_PAGE_KEY, window.state);
                        picking_render(&tracklist::picks(&session.scratch), &songs, window)
                    })
                    .await?
            }
            WizardStep::Date => calendar_render(Utc::now().date_naive()),
            WizardStep::Confirm => self.confirm_render(&session).await?,
        };
        Ok(render.button("Cancel", Action::Cancel))
    }

    async fn confirm_render(&self, session: &Session<WizardStep>) -> Result<Render, DialogError> {
        let draft = Draft::from_scratch(&session.scratch);
        let songs = if draft.tracklist.is_empty() {
            Vec::new()
        } else {
            self.store.list_songs().await?
        };
        let date = draft
            .date
            .map(|date| date.to_string())
            .unwrap_or_default();
        let mut render = Render::new("Let's go over the event once more")
            .line(format!("Name: {}", draft.title.as_deref().unwrap_or_default()));
        if draft.tracklist_enabled == Some(true) {
            render = render.line(tracklist::describe(&draft.tracklist, &songs));
        }
        Ok(render
            .line(format!("Date: {date}"))
            .button("Confirm", Action::Confirm))
    }
}

fn picking_render(picks: &[SongId], songs: &[Song], window: PageWindow<'_, Song>) -> Render {
    let mut render = Render::new(format!("Pick the song for slot {}", picks.len() + 1))
        .line(tracklist::describe(picks, songs));
    for song in window.items {
        render = render.button(song.title.clone(), Action::PickSong { song_id: song.id });
    }
    render
        .row(vec![
            Button::new("<", Action::PrevPage),
            Button::new(window.state.label(), Action::PageCounter),
            Button::new(">", Action::NextPage),
        ])
        .button("Done", Action::FinalizeTracklist)
}

fn calendar_render(today: NaiveDate) -> Render {
    let days: Vec<Button> = (0..CALENDAR_DAYS)
        .filter_map(|offset| today.checked_add_days(Days::new(offset)))
        .map(|date| Button::new(date.format("%d %b").to_string(), Action::PickDate { date }))
        .collect();
    let mut render = Render::new("When does the event take place?");
    for week in days.chunks(CALENDAR_ROW) {
        render = render.row(week.to_vec());
    }
    render
}

#[cfg(test)]
#[path = "tests/event_wizard_tests.rs"]
mod tests;
