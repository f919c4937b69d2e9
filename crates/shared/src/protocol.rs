use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{ChatType, EventId, SessionId, SongId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogKind {
    CreateEvent,
    AddSong,
    BrowseSongs,
    BrowseEvents,
    Announce,
    Participations,
}

/// Everything a user can do: send text or press a button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Action {
    Text { text: String },
    Start { kind: DialogKind },
    EnableTracklist,
    DisableTracklist,
    PickSong { song_id: SongId },
    FinalizeTracklist,
    PickDate { date: NaiveDate },
    NextPage,
    PrevPage,
    PageCounter,
    OpenSong { song_id: SongId },
    OpenEvent { event_id: EventId },
    DeleteEvent { event_id: EventId },
    JoinSong { song_id: SongId },
    OpenParticipation { song_id: SongId, role: String },
    LeaveRole { song_id: SongId, role: String },
    Back,
    Confirm,
    Deny,
    Cancel,
}

impl Action {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundAction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    pub actor: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_name: Option<String>,
    pub chat_type: ChatType,
    pub action: Action,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub label: String,
    pub action: Action,
}

impl Button {
    pub fn new(label: impl Into<String>, action: Action) -> Self {
        Self {
            label: label.into(),
            action,
        }
    }
}

/// A message to show in the session's chat, with an inline keyboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Render {
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keyboard: Vec<Vec<Button>>,
}

impl Render {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: Vec::new(),
        }
    }

    pub fn line(mut self, line: impl AsRef<str>) -> Self {
        if !self.text.is_empty() {
            self.text.push('\n');
        }
        self.text.push_str(line.as_ref());
        self
    }

    pub fn row(mut self, row: Vec<Button>) -> Self {
        if !row.is_empty() {
            self.keyboard.push(row);
        }
        self
    }

    pub fn button(self, label: impl Into<String>, action: Action) -> Self {
        self.row(vec![Button::new(label, action)])
    }

    pub fn buttons(&self) -> impl Iterator<Item = &Button> {
        self.keyboard.iter().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actions_use_tagged_snake_case_json() {
        let action = Action::PickSong {
            song_id: SongId(4),
        };
        let json = serde_json::to_value(&action).expect("serialize");
        assert_eq!(json["type"], "pick_song");
        assert_eq!(json["payload"]["song_id"], 4);

        let date: Action = serde_json::from_str(
            r#"{"type":"pick_date","payload":{"date":"2024-05-01"}}"#,
        )
        .expect("deserialize");
        assert_eq!(
            date,
            Action::PickDate {
                date: NaiveDate::from_ymd_opt(2024, 5, 1).expect("date")
            }
        );
    }

    #[test]
    fn render_builder_skips_empty_rows() {
        let render = Render::new("Songs")
            .line("page 1")
            .row(Vec::new())
            .button("Back", Action::Back);
        assert_eq!(render.text, "Songs\npage 1");
        assert_eq!(render.keyboard.len(), 1);
        assert_eq!(render.buttons().count(), 1);
    }
}
