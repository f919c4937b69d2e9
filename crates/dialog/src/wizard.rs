//! Step guard for the event wizard.
//!
//! `Title -> TracklistToggle -> {PickSongs -> Date | Date} -> Confirm`, with
//! cancel available everywhere. [`transition`] is the whole table as a pure
//! function; [`apply`] writes an accepted transition into a session.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use shared::{
    domain::{SongId, UserId},
    error::DialogError,
    protocol::Action,
};

use crate::{session::Session, tracklist, validate};

pub const TITLE_KEY: &str = "title";
pub const TRACKLIST_ENABLED_KEY: &str = "tracklist_enabled";
pub const DATE_KEY: &str = "date";
pub const SONGS_PAGE_KEY: &str = "songs";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    Title,
    TracklistToggle,
    PickSongs,
    Date,
    Confirm,
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Title => "title",
            Self::TracklistToggle => "tracklist_toggle",
            Self::PickSongs => "pick_songs",
            Self::Date => "date",
            Self::Confirm => "confirm",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    None,
    SetTitle(String),
    SetTracklistEnabled(bool),
    PickSong(SongId),
    NextPage,
    PrevPage,
    SetDate(NaiveDate),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next<S> {
    Goto(S),
    /// Re-render the current step.
    Stay,
    /// Hand the draft to persistence and end the session.
    Commit,
    /// End the session without persisting.
    Cancel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub effect: Effect,
    pub next: Next<WizardStep>,
}

impl Transition {
    fn goto(effect: Effect, step: WizardStep) -> Self {
        Self {
            effect,
            next: Next::Goto(step),
        }
    }

    fn stay(effect: Effect) -> Self {
        Self {
            effect,
            next: Next::Stay,
        }
    }

    fn end(next: Next<WizardStep>) -> Self {
        Self {
            effect: Effect::None,
            next,
        }
    }
}

/// Owner check first, then the transition table. Input from anyone but the
/// session owner is rejected before it can touch any state.
pub fn on_input(
    step: WizardStep,
    action: &Action,
    owner: UserId,
    actor: UserId,
) -> Result<Transition, DialogError> {
    if actor != owner {
        return Err(DialogError::UnauthorizedActor { actor });
    }
    transition(step, action)
}

pub fn transition(step: WizardStep, action: &Action) -> Result<Transition, DialogError> {
    use WizardStep::*;

    let transition = match (step, action) {
        (_, Action::Cancel) => Transition::end(Next::Cancel),
        (Title, Action::Text { text }) => {
            validate::check_title(text)
                .map_err(|rejection| DialogError::rejected(step, rejection.reason()))?;
            Transition::goto(Effect::SetTitle(text.clone()), TracklistToggle)
        }
        (TracklistToggle, Action::EnableTracklist) => {
            Transition::goto(Effect::SetTracklistEnabled(true), PickSongs)
        }
        (TracklistToggle, Action::DisableTracklist) => {
            Transition::goto(Effect::SetTracklistEnabled(false), Date)
        }
        (PickSongs, Action::PickSong { song_id }) => Transition::stay(Effect::PickSong(*song_id)),
        (PickSongs, Action::NextPage) => Transition::stay(Effect::NextPage),
        (PickSongs, Action::PrevPage) => Transition::stay(Effect::PrevPage),
        (PickSongs, Action::PageCounter) => Transition::stay(Effect::None),
        (PickSongs, Action::FinalizeTracklist) => Transition::goto(Effect::None, Date),
        (Date, Action::PickDate { date }) => Transition::goto(Effect::SetDate(*date), Confirm),
        (Confirm, Action::Confirm) => Transition::end(Next::Commit),
        _ => return Err(DialogError::rejected(step, "action does not apply to this step")),
    };
    Ok(transition)
}

/// Applies the effect and step change of an accepted transition. Commit and
/// cancel leave the session untouched; the orchestrator ends it.
pub fn apply(session: &mut Session<WizardStep>, transition: &Transition) {
    let scratch = &mut session.scratch;
    match &transition.effect {
        Effect::None => {}
        Effect::SetTitle(title) => scratch.set(TITLE_KEY, title.as_str()),
        Effect::SetTracklistEnabled(enabled) => scratch.set(TRACKLIST_ENABLED_KEY, *enabled),
        Effect::PickSong(song_id) => tracklist::pick(scratch, *song_id),
        Effect::NextPage => {
            let state = scratch.page_state(SONGS_PAGE_KEY).next();
            scratch.set_page_state(SONGS_PAGE_KEY, state);
        }
        Effect::PrevPage => {
            let state = scratch.page_state(SONGS_PAGE_KEY).prev();
            scratch.set_page_state(SONGS_PAGE_KEY, state);
        }
        Effect::SetDate(date) => scratch.set(DATE_KEY, date.to_string()),
    }
    if let Next::Goto(step) = transition.next {
        session.step = step;
    }
}

#[cfg(test)]
mod tests {
    use shared::domain::SessionId;

    use super::*;
    use crate::session::Scratch;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 21).expect("date")
    }

    fn session(step: WizardStep) -> Session<WizardStep> {
        Session {
            id: SessionId::new(),
            owner: UserId(1),
            step,
            scratch: Scratch::default(),
        }
    }

    #[test]
    fn valid_title_moves_to_tracklist_toggle() {
        let t = transition(WizardStep::Title, &Action::text("Concert Night - 2024")).expect("ok");
        assert_eq!(t.next, Next::Goto(WizardStep::TracklistToggle));
        assert_eq!(t.effect, Effect::SetTitle("Concert Night - 2024".into()));
    }

    #[test]
    fn unsafe_title_is_rejected() {
        let err = transition(WizardStep::Title, &Action::text("<script>")).expect_err("reject");
        assert!(matches!(err, DialogError::ValidationRejected { .. }));
    }

    #[test]
    fn toggle_branches_to_picking_or_date() {
        let on = transition(WizardStep::TracklistToggle, &Action::EnableTracklist).expect("on");
        let off = transition(WizardStep::TracklistToggle, &Action::DisableTracklist).expect("off");
        assert_eq!(on.next, Next::Goto(WizardStep::PickSongs));
        assert_eq!(off.next, Next::Goto(WizardStep::Date));
    }

    #[test]
    fn picking_stays_until_finalized() {
        let pick = transition(WizardStep::PickSongs, &Action::PickSong { song_id: SongId(9) })
            .expect("pick");
        assert_eq!(pick.next, Next::Stay);
        let done = transition(WizardStep::PickSongs, &Action::FinalizeTracklist).expect("done");
        assert_eq!(done.next, Next::Goto(WizardStep::Date));
    }

    #[test]
    fn date_then_confirm_commits() {
        let picked = transition(WizardStep::Date, &Action::PickDate { date: date() }).expect("date");
        assert_eq!(picked.next, Next::Goto(WizardStep::Confirm));
        let confirm = transition(WizardStep::Confirm, &Action::Confirm).expect("confirm");
        assert_eq!(confirm.next, Next::Commit);
    }

    #[test]
    fn cancel_is_available_from_every_step() {
        for step in [
            WizardStep::Title,
            WizardStep::TracklistToggle,
            WizardStep::PickSongs,
            WizardStep::Date,
            WizardStep::Confirm,
        ] {
            assert_eq!(
                transition(step, &Action::Cancel).expect("cancel").next,
                Next::Cancel
            );
        }
    }

    #[test]
    fn out_of_step_actions_are_rejected() {
        assert!(transition(WizardStep::Title, &Action::Confirm).is_err());
        assert!(transition(WizardStep::Date, &Action::text("2024-06-21")).is_err());
        assert!(transition(WizardStep::TracklistToggle, &Action::FinalizeTracklist).is_err());
    }

    #[test]
    fn foreign_actor_is_rejected_before_the_table() {
        let err = on_input(WizardStep::Title, &Action::Cancel, UserId(1), UserId(2))
            .expect_err("reject");
        assert!(matches!(err, DialogError::UnauthorizedActor { actor } if actor == UserId(2)));
    }

    #[test]
    fn apply_writes_draft_fields_in_order() {
        let mut s = session(WizardStep::Title);
        for action in [
            Action::text("Summer show"),
            Action::EnableTracklist,
            Action::PickSong { song_id: SongId(2) },
            Action::FinalizeTracklist,
            Action::PickDate { date: date() },
        ] {
            let t = transition(s.step, &action).expect("accepted");
            apply(&mut s, &t);
        }
        assert_eq!(s.step, WizardStep::Confirm);
        assert_eq!(s.scratch.get_str(TITLE_KEY), Some("Summer show"));
        assert_eq!(s.scratch.get_bool(TRACKLIST_ENABLED_KEY), Some(true));
        assert_eq!(s.scratch.get_str(DATE_KEY), Some("2024-06-21"));
        assert_eq!(tracklist::picks(&s.scratch), vec![SongId(2)]);
    }

    #[test]
    fn paging_uses_stored_total() {
        let mut s = session(WizardStep::PickSongs);
        s.scratch
            .set_page_state(SONGS_PAGE_KEY, crate::pager::PageState::new(0, 3));
        let prev = transition(s.step, &Action::PrevPage).expect("prev");
        apply(&mut s, &prev);
        assert_eq!(s.scratch.page_state(SONGS_PAGE_KEY).page(), 2);
        let next = transition(s.step, &Action::NextPage).expect("next");
        apply(&mut s, &next);
        apply(&mut s, &next);
        assert_eq!(s.scratch.page_state(SONGS_PAGE_KEY).page(), 1);
    }
}
