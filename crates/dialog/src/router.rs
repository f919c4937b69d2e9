use std::sync::Arc;

use shared::{
    domain::{ChatType, Person, SessionId, UserId},
    error::DialogError,
    protocol::{Action, DialogKind, InboundAction, Render},
};
use tracing::{debug, warn};

use crate::{
    announce::Announcer, catalog::Catalog, config::DialogConfig, event_wizard::EventWizard,
    participations::Participations, song_wizard::SongWizard, ClubStore, Outcome, Transport,
};

/// Entry point for every inbound action. Owns one session store per dialog
/// kind and routes by session id.
pub struct Dialogs<P, T> {
    config: Arc<DialogConfig>,
    store: Arc<P>,
    events: EventWizard<P>,
    songs: SongWizard<P>,
    catalog: Catalog<P>,
    participations: Participations<P>,
    announcer: Announcer<P, T>,
}

impl<P: ClubStore, T: Transport> Dialogs<P, T> {
    pub fn new(config: DialogConfig, store: Arc<P>, transport: Arc<T>) -> Self {
        let config = Arc::new(config);
        Self {
            events: EventWizard::new(config.clone(), store.clone()),
            songs: SongWizard::new(store.clone()),
            catalog: Catalog::new(config.clone(), store.clone()),
            participations: Participations::new(config.clone(), store.clone()),
            announcer: Announcer::new(config.clone(), store.clone(), transport),
            config,
            store,
        }
    }

    pub fn config(&self) -> &DialogConfig {
        &self.config
    }

    pub fn event_wizard(&self) -> &EventWizard<P> {
        &self.events
    }

    pub fn participations(&self) -> &Participations<P> {
        &self.participations
    }

    pub fn main_menu(&self, actor: UserId) -> Render {
        let mut menu = Render::new("Main menu")
            .button("Songs", Action::Start { kind: DialogKind::BrowseSongs })
            .button("Upcoming events", Action::Start { kind: DialogKind::BrowseEvents })
            .button("Suggest a song", Action::Start { kind: DialogKind::AddSong })
            .button("My participations", Action::Start { kind: DialogKind::Participations });
        if self.config.is_admin(actor) {
            menu = menu
                .button("Create event", Action::Start { kind: DialogKind::CreateEvent })
                .button("Announcement", Action::Start { kind: DialogKind::Announce });
        }
        menu
    }

    pub async fn handle(&self, inbound: InboundAction) -> Result<Outcome, DialogError> {
        if self.config.private_chats_only && inbound.chat_type != ChatType::Private {
            debug!(actor = %inbound.actor, chat = ?inbound.chat_type, "dropping non-private chat action");
            return Ok(Outcome::Ignored);
        }
        self.remember(&inbound).await;

        let actor = inbound.actor;
        let outcome = match (inbound.session_id, &inbound.action) {
            (_, Action::Start { kind }) => match self.start(*kind, actor).await {
                Err(err) if err.is_silent() => {
                    debug!(%actor, ?kind, error = %err, "start refused");
                    Outcome::Menu(self.main_menu(actor))
                }
                other => other?,
            },
            (_, Action::JoinSong { song_id }) => self.participations.join(actor, *song_id).await?,
            (Some(session_id), action) => self.route(session_id, actor, action).await?,
            (None, _) => Outcome::Menu(self.main_menu(actor)),
        };

        Ok(match outcome {
            Outcome::Closed => Outcome::Menu(self.main_menu(actor)),
            other => other,
        })
    }

    async fn start(&self, kind: DialogKind, actor: UserId) -> Result<Outcome, DialogError> {
        match kind {
            DialogKind::CreateEvent => self.events.start(actor).await,
            DialogKind::AddSong => self.songs.start(actor).await,
            DialogKind::BrowseSongs => self.catalog.browse_songs(actor).await,
            DialogKind::BrowseEvents => self.catalog.browse_events(actor).await,
            DialogKind::Announce => self.announcer.start(actor).await,
            DialogKind::Participations => self.participations.my_roles(actor).await,
        }
    }

    async fn route(
        &self,
        session_id: SessionId,
        actor: UserId,
        action: &Action,
    ) -> Result<Outcome, DialogError> {
        if self.events.owns(session_id).await {
            self.events.handle(session_id, actor, action).await
        } else if self.songs.owns(session_id).await {
            self.songs.handle(session_id, actor, action).await
        } else if self.catalog.owns(session_id).await {
            self.catalog.handle(session_id, actor, action).await
        } else if self.participations.owns(session_id).await {
            self.participations.handle(session_id, actor, action).await
        } else if self.announcer.owns(session_id).await {
            self.announcer.handle(session_id, actor, action).await
        } else {
            Err(DialogError::session_not_found(session_id))
        }
    }

    async fn remember(&self, inbound: &InboundAction) {
        let person = Person {
            user_id: inbound.actor,
            name: inbound
                .actor_name
                .clone()
                .unwrap_or_else(|| format!("user {}", inbound.actor)),
        };
        if let Err(err) = self.store.upsert_person(&person).await {
            warn!(actor = %inbound.actor, error = %format!("{err:#}"), "could not record person");
        }
    }
}

#[cfg(test)]
#[path = "tests/router_tests.rs"]
mod tests;
