use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use shared::domain::{
    EventDetails, EventId, EventSummary, NewEvent, NewSong, Participation, ParticipationDetails,
    Person, Song, SongId, TrackSummary, UserId,
};
use tokio::sync::Mutex;

use crate::{ClubStore, DialogConfig, Transport};

pub(crate) const ADMIN: UserId = UserId(100);
pub(crate) const MEMBER: UserId = UserId(200);

pub(crate) fn config() -> Arc<DialogConfig> {
    Arc::new(DialogConfig::default().with_admins([ADMIN]))
}

pub(crate) fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

#[derive(Default)]
pub(crate) struct FakeStore {
    pub songs: Mutex<Vec<Song>>,
    pub events: Mutex<Vec<(EventId, NewEvent)>>,
    pub people: Mutex<Vec<Person>>,
    pub participations: Mutex<Vec<Participation>>,
    pub create_event_calls: AtomicUsize,
    pub fail_commits: AtomicBool,
}

impl FakeStore {
    pub(crate) fn with_songs(titles: &[&str]) -> Arc<Self> {
        let songs = titles
            .iter()
            .zip(1i64..)
            .map(|(title, id)| Song {
                id: SongId(id),
                title: title.to_string(),
                link: format!("https://songs.example/{id}"),
            })
            .collect();
        Arc::new(Self {
            songs: Mutex::new(songs),
            ..Self::default()
        })
    }

    pub(crate) async fn add_event(&self, name: &str, date: NaiveDate) -> EventId {
        let mut events = self.events.lock().await;
        let id = EventId(events.len() as i64 + 1);
        events.push((id, NewEvent::new(name, date, Vec::new())));
        id
    }

    async fn details(&self, keep: impl Fn(&Participation) -> bool) -> Vec<ParticipationDetails> {
        let songs = self.songs.lock().await.clone();
        let people = self.people.lock().await.clone();
        let mut details: Vec<_> = self
            .participations
            .lock()
            .await
            .iter()
            .filter(|p| keep(p))
            .filter_map(|p| {
                let song = songs.iter().find(|song| song.id == p.song_id)?;
                Some(ParticipationDetails {
                    song_id: p.song_id,
                    song_title: song.title.clone(),
                    user_id: p.user_id,
                    person_name: people
                        .iter()
                        .find(|person| person.user_id == p.user_id)
                        .map(|person| person.name.clone())
                        .unwrap_or_else(|| format!("user {}", p.user_id)),
                    role: p.role.clone(),
                })
            })
            .collect();
        details.sort_by(|a, b| (a.song_id, &a.role).cmp(&(b.song_id, &b.role)));
        details
    }

    pub(crate) async fn committed(&self) -> Vec<NewEvent> {
        self.events
            .lock()
            .await
            .iter()
            .map(|(_, event)| event.clone())
            .collect()
    }
}

#[async_trait]
impl ClubStore for FakeStore {
    async fn list_songs(&self) -> Result<Vec<Song>> {
        Ok(self.songs.lock().await.clone())
    }

    async fn load_song(&self, song_id: SongId) -> Result<Option<Song>> {
        Ok(self
            .songs
            .lock()
            .await
            .iter()
            .find(|song| song.id == song_id)
            .cloned())
    }

    async fn create_song(&self, song: &NewSong) -> Result<SongId> {
        let mut songs = self.songs.lock().await;
        let id = SongId(songs.len() as i64 + 1);
        songs.push(Song {
            id,
            title: song.title.clone(),
            link: song.link.clone(),
        });
        Ok(id)
    }

    async fn create_event(&self, event: &NewEvent) -> Result<EventId> {
        self.create_event_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(anyhow!("database is locked"));
        }
        let mut events = self.events.lock().await;
        let id = EventId(events.len() as i64 + 1);
        events.push((id, event.clone()));
        Ok(id)
    }

    async fn delete_event(&self, event_id: EventId) -> Result<bool> {
        let mut events = self.events.lock().await;
        let before = events.len();
        events.retain(|(id, _)| *id != event_id);
        Ok(events.len() != before)
    }

    async fn load_event(&self, event_id: EventId) -> Result<Option<EventDetails>> {
        let songs = self.songs.lock().await.clone();
        let events = self.events.lock().await;
        Ok(events.iter().find(|(id, _)| *id == event_id).map(|(id, event)| {
            EventDetails {
                id: *id,
                name: event.name().to_string(),
                date: event.date(),
                tracklist: event
                    .tracklist()
                    .iter()
                    .map(|entry| TrackSummary {
                        position: entry.position,
                        song_id: entry.song_id,
                        title: songs
                            .iter()
                            .find(|song| song.id == entry.song_id)
                            .map(|song| song.title.clone())
                            .unwrap_or_default(),
                    })
                    .collect(),
            }
        }))
    }

    async fn list_events_from(&self, from: NaiveDate) -> Result<Vec<EventSummary>> {
        let mut events: Vec<EventSummary> = self
            .events
            .lock()
            .await
            .iter()
            .filter(|(_, event)| event.date() >= from)
            .map(|(id, event)| EventSummary {
                id: *id,
                name: event.name().to_string(),
                date: event.date(),
            })
            .collect();
        events.sort_by_key(|event| (event.date, event.id));
        Ok(events)
    }

    async fn upsert_person(&self, person: &Person) -> Result<()> {
        let mut people = self.people.lock().await;
        match people.iter_mut().find(|p| p.user_id == person.user_id) {
            Some(existing) => existing.name = person.name.clone(),
            None => people.push(person.clone()),
        }
        Ok(())
    }

    async fn list_people(&self) -> Result<Vec<Person>> {
        Ok(self.people.lock().await.clone())
    }

    async fn join_song(&self, participation: &Participation) -> Result<bool> {
        if self.load_song(participation.song_id).await?.is_none() {
            return Err(anyhow!("FOREIGN KEY constraint failed"));
        }
        let mut participations = self.participations.lock().await;
        if participations.contains(participation) {
            return Ok(false);
        }
        participations.push(participation.clone());
        Ok(true)
    }

    async fn leave_song(&self, participation: &Participation) -> Result<bool> {
        let mut participations = self.participations.lock().await;
        let before = participations.len();
        participations.retain(|p| p != participation);
        Ok(participations.len() != before)
    }

    async fn list_participations(&self, user_id: UserId) -> Result<Vec<ParticipationDetails>> {
        Ok(self.details(|p| p.user_id == user_id).await)
    }

    async fn list_song_participants(&self, song_id: SongId) -> Result<Vec<ParticipationDetails>> {
        Ok(self.details(|p| p.song_id == song_id).await)
    }
}

#[derive(Default)]
pub(crate) struct FakeTransport {
    pub unreachable: HashSet<UserId>,
    pub sent: Mutex<Vec<(UserId, String)>>,
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send_text(&self, recipient: UserId, text: &str) -> Result<()> {
        if self.unreachable.contains(&recipient) {
            return Err(anyhow!("bot was blocked by the user"));
        }
        self.sent.lock().await.push((recipient, text.to_string()));
        Ok(())
    }
}
