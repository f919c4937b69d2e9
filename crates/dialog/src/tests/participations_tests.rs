use super::*;
use crate::test_support::{config, FakeStore, ADMIN, MEMBER};

fn labels(outcome: &Outcome) -> Vec<String> {
    outcome
        .render()
        .map(|render| render.buttons().map(|b| b.label.clone()).collect())
        .unwrap_or_default()
}

async fn joined(
    dialog: &Participations<FakeStore>,
    actor: UserId,
    song_id: SongId,
    role: &str,
) -> Outcome {
    let id = dialog
        .join(actor, song_id)
        .await
        .expect("join")
        .session_id()
        .expect("session");
    dialog
        .handle(id, actor, &Action::text(role))
        .await
        .expect("role")
}

#[tokio::test]
async fn joining_asks_for_a_role_and_stores_it() {
    let store = FakeStore::with_songs(&["Ballad"]);
    let dialog = Participations::new(config(), store.clone());

    let prompt = dialog.join(MEMBER, SongId(1)).await.expect("join");
    assert_eq!(
        prompt.render().expect("prompt").text,
        "Which role will you play in \"Ballad\"?"
    );
    let id = prompt.session_id().expect("session");

    let done = dialog
        .handle(id, MEMBER, &Action::text("  bass guitar "))
        .await
        .expect("role");
    assert_eq!(
        done,
        Outcome::Finished {
            notice: "You joined \"Ballad\" as bass guitar".into()
        }
    );
    assert!(!dialog.owns(id).await);
    assert_eq!(
        *store.participations.lock().await,
        vec![Participation {
            song_id: SongId(1),
            user_id: MEMBER,
            role: "bass guitar".into()
        }]
    );
}

#[tokio::test]
async fn joining_the_same_role_twice_is_reported() {
    let store = FakeStore::with_songs(&["Ballad"]);
    let dialog = Participations::new(config(), store.clone());
    joined(&dialog, MEMBER, SongId(1), "drums").await;

    let again = joined(&dialog, MEMBER, SongId(1), "drums").await;
    assert_eq!(
        again,
        Outcome::Finished {
            notice: "You already play drums in \"Ballad\"".into()
        }
    );
    assert_eq!(store.participations.lock().await.len(), 1);
}

#[tokio::test]
async fn unsafe_role_re_prompts() {
    let store = FakeStore::with_songs(&["Ballad"]);
    let dialog = Participations::new(config(), store.clone());
    let id = dialog
        .join(MEMBER, SongId(1))
        .await
        .expect("join")
        .session_id()
        .expect("session");

    let outcome = dialog
        .handle(id, MEMBER, &Action::text("<i>vocals</i>"))
        .await
        .expect("handled");
    assert_eq!(outcome.session_id(), Some(id));
    assert_eq!(
        dialog.sessions().get(id).await.expect("session").step,
        ParticipationStep::Join(SongId(1))
    );
    assert!(store.participations.lock().await.is_empty());
}

#[tokio::test]
async fn joining_an_unknown_song_is_not_found() {
    let dialog = Participations::new(config(), FakeStore::with_songs(&[]));
    let err = dialog.join(MEMBER, SongId(9)).await.expect_err("missing");
    assert!(matches!(err, DialogError::NotFound(_)));
    assert!(dialog.sessions().is_empty().await);
}

#[tokio::test]
async fn list_opens_a_role_and_leaves_it() {
    let store = FakeStore::with_songs(&["Anthem", "Ballad"]);
    let dialog = Participations::new(config(), store.clone());
    joined(&dialog, MEMBER, SongId(2), "piano").await;
    joined(&dialog, MEMBER, SongId(1), "vocals").await;
    joined(&dialog, ADMIN, SongId(1), "drums").await;

    let list = dialog.my_roles(MEMBER).await.expect("list");
    assert_eq!(
        labels(&list),
        vec!["Anthem: vocals", "Ballad: piano", "Back"]
    );
    let id = list.session_id().expect("session");

    let role = dialog
        .handle(
            id,
            MEMBER,
            &Action::OpenParticipation {
                song_id: SongId(2),
                role: "piano".into(),
            },
        )
        .await
        .expect("open");
    assert_eq!(
        role.render().expect("role").text,
        "user 200\nin Ballad\nas piano"
    );
    assert_eq!(labels(&role), vec!["Leave this role", "Back"]);

    let after = dialog
        .handle(
            id,
            MEMBER,
            &Action::LeaveRole {
                song_id: SongId(2),
                role: "piano".into(),
            },
        )
        .await
        .expect("leave");
    assert_eq!(labels(&after), vec!["Anthem: vocals", "Back"]);
    assert_eq!(store.participations.lock().await.len(), 2);
}

#[tokio::test]
async fn role_that_vanished_falls_back_to_the_list() {
    let store = FakeStore::with_songs(&["Ballad"]);
    let dialog = Participations::new(config(), store.clone());
    joined(&dialog, MEMBER, SongId(1), "bass").await;
    let id = dialog
        .my_roles(MEMBER)
        .await
        .expect("list")
        .session_id()
        .expect("session");
    dialog
        .handle(
            id,
            MEMBER,
            &Action::OpenParticipation {
                song_id: SongId(1),
                role: "bass".into(),
            },
        )
        .await
        .expect("open");

    store.participations.lock().await.clear();
    let err = dialog
        .handle(
            id,
            MEMBER,
            &Action::LeaveRole {
                song_id: SongId(1),
                role: "bass".into(),
            },
        )
        .await
        .expect_err("already gone");
    assert!(matches!(err, DialogError::NotFound(_)));
    assert_eq!(
        dialog.sessions().get(id).await.expect("session").step,
        ParticipationStep::List
    );
}

#[tokio::test]
async fn empty_list_says_so_and_pages_when_long() {
    let store = FakeStore::with_songs(&["A", "B", "C", "D", "E"]);
    let dialog = Participations::new(config(), store.clone());

    let empty = dialog.my_roles(MEMBER).await.expect("list");
    assert!(empty
        .render()
        .expect("render")
        .text
        .ends_with("You do not play in any song yet"));

    for song in 1..=5 {
        joined(&dialog, MEMBER, SongId(song), "vocals").await;
    }
    let id = dialog
        .my_roles(MEMBER)
        .await
        .expect("list")
        .session_id()
        .expect("session");
    let second = dialog
        .handle(id, MEMBER, &Action::NextPage)
        .await
        .expect("next");
    assert_eq!(labels(&second), vec!["E: vocals", "<", "2/2", ">", "Back"]);
}

#[tokio::test]
async fn non_owner_input_is_ignored() {
    let store = FakeStore::with_songs(&["Ballad"]);
    let dialog = Participations::new(config(), store.clone());
    let id = dialog
        .join(MEMBER, SongId(1))
        .await
        .expect("join")
        .session_id()
        .expect("session");

    for action in [Action::text("drums"), Action::Cancel] {
        let outcome = dialog.handle(id, ADMIN, &action).await.expect("handled");
        assert_eq!(outcome, Outcome::Ignored);
    }
    assert!(dialog.owns(id).await);
    assert!(store.participations.lock().await.is_empty());
}
