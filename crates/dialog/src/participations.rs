//! Members joining songs in a role, and the list of roles they play.

use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};
use shared::{
    domain::{Participation, SessionId, SongId, UserId},
    error::DialogError,
    protocol::{Action, Button, Render},
};
use tracing::{debug, info};

use crate::{
    catalog::paged_list,
    config::DialogConfig,
    pager,
    session::{Session, SessionStore},
    validate, ClubStore, Outcome,
};

pub const PARTICIPATIONS_PAGE_KEY: &str = "participations";
const ROLE_KEY: &str = "role";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "view", content = "song_id", rename_all = "snake_case")]
pub enum ParticipationStep {
    List,
    Role(SongId),
    Join(SongId),
}

impl fmt::Display for ParticipationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::List => f.write_str("list"),
            Self::Role(id) => write!(f, "role in song {id}"),
            Self::Join(id) => write!(f, "joining song {id}"),
        }
    }
}

pub struct Participations<P> {
    config: Arc<DialogConfig>,
    store: Arc<P>,
    sessions: SessionStore<ParticipationStep>,
}

impl<P: ClubStore> Participations<P> {
    pub fn new(config: Arc<DialogConfig>, store: Arc<P>) -> Self {
        Self {
            config,
            store,
            sessions: SessionStore::new(),
        }
    }

    pub fn sessions(&self) -> &SessionStore<ParticipationStep> {
        &self.sessions
    }

    pub async fn owns(&self, session_id: SessionId) -> bool {
        self.sessions.contains(session_id).await
    }

    pub async fn my_roles(&self, actor: UserId) -> Result<Outcome, DialogError> {
        let session_id = self.sessions.create(actor, ParticipationStep::List).await;
        self.rendered(session_id).await
    }

    /// Asks which role the actor wants in `song_id`.
    pub async fn join(&self, actor: UserId, song_id: SongId) -> Result<Outcome, DialogError> {
        if self.store.load_song(song_id).await?.is_none() {
            return Err(DialogError::NotFound(format!("song {song_id}")));
        }
        let session_id = self
            .sessions
            .create(actor, ParticipationStep::Join(song_id))
            .await;
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
        let step = session.step;

        let next = match (step, action) {
            (_, Action::Cancel)
            | (ParticipationStep::List | ParticipationStep::Join(_), Action::Back) => {
                self.sessions.destroy(session_id).await;
                return Ok(Outcome::Closed);
            }
            (ParticipationStep::Role(_), Action::Back) => ParticipationStep::List,
            (ParticipationStep::List, Action::NextPage | Action::PrevPage) => {
                let forward = matches!(action, Action::NextPage);
                self.sessions
                    .mutate(session_id, |session| {
                        let state = session.scratch.page_state(PARTICIPATIONS_PAGE_KEY);
                        let state = if forward { state.next() } else { state.prev() };
                        session
                            .scratch
                            .set_page_state(PARTICIPATIONS_PAGE_KEY, state);
                    })
                    .await?;
                step
            }
            (ParticipationStep::List, Action::PageCounter) => step,
            (ParticipationStep::List, Action::OpenParticipation { song_id, role }) => {
                let role = role.clone();
                self.sessions
                    .mutate(session_id, |session| session.scratch.set(ROLE_KEY, role))
                    .await?;
                ParticipationStep::Role(*song_id)
            }
            (ParticipationStep::Role(current), Action::LeaveRole { song_id, role })
                if current == *song_id =>
            {
                return self.leave(session_id, actor, *song_id, role).await;
            }
            (ParticipationStep::Join(song_id), Action::Text { text }) => {
                return self.commit_join(session, song_id, text).await;
            }
            _ => {
                debug!(session = %session_id, %step, "action does not apply to this view");
                return Ok(Outcome::Ignored);
            }
        };

        self.sessions
            .mutate(session_id, |session| session.step = next)
            .await?;
        self.rendered(session_id).await
    }

    async fn leave(
        &self,
        session_id: SessionId,
        actor: UserId,
        song_id: SongId,
        role: &str,
    ) -> Result<Outcome, DialogError> {
        let participation = Participation {
            song_id,
            user_id: actor,
            role: role.to_string(),
        };
        let left = self.store.leave_song(&participation).await?;
        self.sessions
            .mutate(session_id, |session| {
                session.step = ParticipationStep::List;
                session.scratch.remove(ROLE_KEY);
            })
            .await?;
        if !left {
            return Err(DialogError::NotFound(format!("{role} in song {song_id}")));
        }
        info!(song = %song_id, %actor, role, "left song");
        self.rendered(session_id).await
    }

    async fn commit_join(
        &self,
        session: Session<ParticipationStep>,
        song_id: SongId,
        text: &str,
    ) -> Result<Outcome, DialogError> {
        let role = text.trim();
        if let Err(rejection) = validate::check_title(role) {
            debug!(session = %session.id, reason = rejection.reason(), "role rejected, re-prompting");
            return self.rendered(session.id).await;
        }
        let Some(song) = self.store.load_song(song_id).await? else {
            self.sessions.destroy(session.id).await;
            return Err(DialogError::NotFound(format!("song {song_id}")));
        };
        let participation = Participation {
            song_id,
            user_id: session.owner,
            role: role.to_string(),
        };
        let joined = self.store.join_song(&participation).await?;
        self.sessions.destroy(session.id).await;
        if !joined {
            return Ok(Outcome::Finished {
                notice: format!("You already play {role} in \"{}\"", song.title),
            });
        }
        info!(song = %song_id, actor = %session.owner, role, "joined song");
        Ok(Outcome::Finished {
            notice: format!("You joined \"{}\" as {role}", song.title),
        })
    }

    async fn rendered(&self, session_id: SessionId) -> Result<Outcome, DialogError> {
        let session = self.sessions.get(session_id).await?;
        let render = match session.step {
            ParticipationStep::List => self.list_render(&session).await?,
            ParticipationStep::Role(song_id) => {
                let role = session.scratch.get_str(ROLE_KEY).unwrap_or_default();
                let held = self
                    .store
                    .list_participations(session.owner)
                    .await?
                    .into_iter()
                    .find(|held| held.song_id == song_id && held.role == role);
                let Some(held) = held else {
                    self.sessions
                        .mutate(session_id, |session| session.step = ParticipationStep::List)
                        .await?;
                    return Err(DialogError::NotFound(format!("{role} in song {song_id}")));
                };
                Render::new(format!(
                    "{}\nin {}\nas {}",
                    held.person_name, held.song_title, held.role
                ))
                .button(
                    "Leave this role",
                    Action::LeaveRole {
                        song_id,
                        role: held.role.clone(),
                    },
                )
                .button("Back", Action::Back)
            }
            ParticipationStep::Join(song_id) => {
                let Some(song) = self.store.load_song(song_id).await? else {
                    self.sessions.destroy(session_id).await;
                    return Err(DialogError::NotFound(format!("song {song_id}")));
                };
                Render::new(format!("Which role will you play in \"{}\"?", song.title))
                    .button("Cancel", Action::Cancel)
            }
        };
        Ok(Outcome::Render { session_id, render })
    }

    async fn list_render(&self, session: &Session<ParticipationStep>) -> Result<Render, DialogError> {
        let held = self.store.list_participations(session.owner).await?;
        let buttons = held
            .iter()
            .map(|held| {
                Button::new(
                    format!("{}: {}", held.song_title, held.role),
                    Action::OpenParticipation {
                        song_id: held.song_id,
                        role: held.role.clone(),
                    },
                )
            })
            .collect::<Vec<_>>();
        let page_size = self.config.page_size;
        let render = self
            .sessions
            .mutate(session.id, |session| {
                let stored = session.scratch.page_state(PARTICIPATIONS_PAGE_KEY);
                let window = pager::paginate(&buttons, stored.page() as i64, page_size);
                session
                    .scratch
                    .set_page_state(PARTICIPATIONS_PAGE_KEY, window.state);
                paged_list(Render::new("My participations"), window)
            })
            .await?;
        let render = if buttons.is_empty() {
            render.line("You do not play in any song yet")
        } else {
            render
        };
        Ok(render.button("Back", Action::Back))
    }
}

#[cfg(test)]
#[path = "tests/participations_tests.rs"]
mod tests;
