//! Member flow for proposing a song: title, link, then a verify screen.

use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};
use shared::{
    domain::{NewSong, SessionId, UserId},
    error::DialogError,
    protocol::{Action, Button, Render},
};
use tracing::{debug, info, warn};

use crate::{
    session::{Scratch, SessionStore},
    validate,
    wizard::Next,
    ClubStore, Outcome,
};

const TITLE_KEY: &str = "title";
const LINK_KEY: &str = "link";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SongStep {
    Title,
    Link,
    Verify,
}

impl fmt::Display for SongStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Title => "title",
            Self::Link => "link",
            Self::Verify => "verify",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SongEffect {
    None,
    SetTitle(String),
    SetLink(String),
}

pub fn transition(
    step: SongStep,
    action: &Action,
) -> Result<(SongEffect, Next<SongStep>), DialogError> {
    let title = |text: &str| {
        validate::check_title(text)
            .map(|()| SongEffect::SetTitle(text.to_string()))
            .map_err(|rejection| DialogError::rejected(step, rejection.reason()))
    };

    Ok(match (step, action) {
        (_, Action::Cancel) => (SongEffect::None, Next::Cancel),
        (SongStep::Title | SongStep::Verify, Action::Text { text }) => {
            (title(text)?, Next::Goto(SongStep::Link))
        }
        (SongStep::Link, Action::Text { text }) => {
            let link = validate::parse_url(text)
                .ok_or_else(|| DialogError::rejected(step, "no link found in message"))?;
            (SongEffect::SetLink(link), Next::Goto(SongStep::Verify))
        }
        (SongStep::Verify, Action::Confirm) => (SongEffect::None, Next::Commit),
        (SongStep::Verify, Action::Deny) => (SongEffect::None, Next::Goto(SongStep::Title)),
        _ => return Err(DialogError::rejected(step, "action does not apply to this step")),
    })
}

pub struct SongWizard<P> {
    store: Arc<P>,
    sessions: SessionStore<SongStep>,
}

impl<P: ClubStore> SongWizard<P> {
    pub fn new(store: Arc<P>) -> Self {
        Self {
            store,
            sessions: SessionStore::new(),
        }
    }

    pub fn sessions(&self) -> &SessionStore<SongStep> {
        &self.sessions
    }

    pub async fn owns(&self, session_id: SessionId) -> bool {
        self.sessions.contains(session_id).await
    }

    pub async fn start(&self, actor: UserId) -> Result<Outcome, DialogError> {
        let session_id = self.sessions.create(actor, SongStep::Title).await;
        debug!(session = %session_id, %actor, "song wizard started");
        self.rendered(session_id).await
    }

    pub async fn handle(
        &self,
        session_id: SessionId,
        actor: UserId,
        action: &Action,
    ) -> Result<Outcome, DialogError> {
        let session = self.sessions.get(session_id).await?;
        if session.owner != actor {
            debug!(session = %session_id, %actor, "ignoring input from non-owner");
            return Ok(Outcome::Ignored);
        }
        let (effect, next) = match transition(session.step, action) {
            Ok(accepted) => accepted,
            Err(err @ DialogError::ValidationRejected { .. }) => {
                debug!(session = %session_id, error = %err, "input rejected, re-prompting");
                return self.rendered(session_id).await;
            }
            Err(err) => return Err(err),
        };

        match next {
            Next::Cancel => {
                self.sessions.destroy(session_id).await;
                Ok(Outcome::Finished {
                    notice: "Song was not added".into(),
                })
            }
            Next::Commit => self.commit(session_id, &session.scratch).await,
            Next::Goto(_) | Next::Stay => {
                self.sessions
                    .mutate(session_id, |session| {
                        match effect {
                            SongEffect::None => {}
                            SongEffect::SetTitle(title) => session.scratch.set(TITLE_KEY, title),
                            SongEffect::SetLink(link) => session.scratch.set(LINK_KEY, link),
                        }
                        if let Next::Goto(step) = next {
                            session.step = step;
                        }
                    })
                    .await?;
                self.rendered(session_id).await
            }
        }
    }

    async fn commit(&self, session_id: SessionId, scratch: &Scratch) -> Result<Outcome, DialogError> {
        let song = NewSong {
            title: draft_field(scratch, TITLE_KEY)?,
            link: draft_field(scratch, LINK_KEY)?,
        };
        let song_id = self.store.create_song(&song).await.map_err(|err| {
            warn!(session = %session_id, error = %format!("{err:#}"), "song commit failed");
            DialogError::Persistence(err)
        })?;
        self.sessions.destroy(session_id).await;
        info!(session = %session_id, song = %song_id, "song added");
        Ok(Outcome::Finished {
            notice: format!("Song \"{}\" added", song.title),
        })
    }

    async fn rendered(&self, session_id: SessionId) -> Result<Outcome, DialogError> {
        let session = self.sessions.get(session_id).await?;
        let render = match session.step {
            SongStep::Title => Render::new("What is the song called?"),
            SongStep::Link => Render::new("Send me a link to the song"),
            SongStep::Verify => Render::new("Add this song? Check the details once more:")
                .line(format!(
                    "Title: {}",
                    session.scratch.get_str(TITLE_KEY).unwrap_or_default()
                ))
                .line(format!(
                    "Link: {}",
                    session.scratch.get_str(LINK_KEY).unwrap_or_default()
                ))
                .row(vec![
                    Button::new("Add it", Action::Confirm),
                    Button::new("Start over", Action::Deny),
                ]),
        };
        Ok(Outcome::Render {
            session_id,
            render: render.button("Cancel", Action::Cancel),
        })
    }
}

fn draft_field(scratch: &Scratch, key: &str) -> Result<String, DialogError> {
    scratch
        .get_str(key)
        .map(str::to_string)
        .ok_or_else(|| DialogError::NotFound(format!("song {key}")))
}

#[cfg(test)]
#[path = "tests/song_wizard_tests.rs"]
mod tests;
