//! Admin broadcast of a text message to every known person.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use shared::{
    domain::{Person, SessionId, UserId},
    error::DialogError,
    protocol::{Action, Render},
};
use tracing::{debug, info, warn};

use crate::{config::DialogConfig, session::SessionStore, ClubStore, Outcome, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnounceStep {
    Compose,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum Delivery {
    Delivered,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub recipient: UserId,
    pub delivery: Delivery,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastReport {
    pub receipts: Vec<Receipt>,
}

impl BroadcastReport {
    pub fn total(&self) -> usize {
        self.receipts.len()
    }

    pub fn delivered(&self) -> usize {
        self.receipts
            .iter()
            .filter(|receipt| receipt.delivery == Delivery::Delivered)
            .count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &Receipt> {
        self.receipts
            .iter()
            .filter(|receipt| receipt.delivery != Delivery::Delivered)
    }

    /// Delivered share of the audience in percent; 0 when nobody is known.
    pub fn delivered_percent(&self) -> f64 {
        if self.receipts.is_empty() {
            return 0.0;
        }
        self.delivered() as f64 * 100.0 / self.total() as f64
    }

    pub fn summary(&self) -> String {
        format!(
            "Sent the message to {} users. That is {:.1}% of the {} people I know",
            self.delivered(),
            self.delivered_percent(),
            self.total()
        )
    }
}

/// Delivers `text` to each person in turn. One failed recipient never stops
/// the rest.
pub async fn broadcast<T: Transport + ?Sized>(
    transport: &T,
    people: &[Person],
    text: &str,
) -> BroadcastReport {
    let mut receipts = Vec::with_capacity(people.len());
    for person in people {
        let delivery = match transport.send_text(person.user_id, text).await {
            Ok(()) => Delivery::Delivered,
            Err(err) => {
                warn!(recipient = %person.user_id, error = %format!("{err:#}"), "announcement not delivered");
                Delivery::Failed(format!("{err:#}"))
            }
        };
        receipts.push(Receipt {
            recipient: person.user_id,
            delivery,
        });
    }
    BroadcastReport { receipts }
}

pub struct Announcer<P, T> {
    config: Arc<DialogConfig>,
    store: Arc<P>,
    transport: Arc<T>,
    sessions: SessionStore<AnnounceStep>,
}

impl<P: ClubStore, T: Transport> Announcer<P, T> {
    pub fn new(config: Arc<DialogConfig>, store: Arc<P>, transport: Arc<T>) -> Self {
        Self {
            config,
            store,
            transport,
            sessions: SessionStore::new(),
        }
    }

    pub async fn owns(&self, session_id: SessionId) -> bool {
        self.sessions.contains(session_id).await
    }

    pub async fn start(&self, actor: UserId) -> Result<Outcome, DialogError> {
        if !self.config.is_admin(actor) {
            return Err(DialogError::UnauthorizedActor { actor });
        }
        let session_id = self.sessions.create(actor, AnnounceStep::Compose).await;
        Ok(Outcome::Render {
            session_id,
            render: Render::new("Send me the message and I will forward it to everyone I know")
                .button("Cancel", Action::Cancel),
        })
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
        match action {
            Action::Cancel | Action::Back => {
                self.sessions.destroy(session_id).await;
                Ok(Outcome::Closed)
            }
            Action::Text { text } => {
                let people = self.store.list_people().await?;
                let report = broadcast(self.transport.as_ref(), &people, text).await;
                self.sessions.destroy(session_id).await;
                info!(
                    %actor,
                    delivered = report.delivered(),
                    total = report.total(),
                    "announcement sent"
                );
                Ok(Outcome::Finished {
                    notice: report.summary(),
                })
            }
            _ => Ok(Outcome::Ignored),
        }
    }
}
