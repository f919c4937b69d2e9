use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use dialog::ClubStore;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite, Transaction,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;

use shared::domain::{
    EventDetails, EventId, EventSummary, NewEvent, NewSong, Participation, ParticipationDetails,
    Person, Song, SongId, TrackSummary, UserId,
};

const PARTICIPATION_COLUMNS: &str = r#"
    SELECT p.song_id, s.title, p.user_id, pe.name, p.role
    FROM song_participations p
    JOIN songs s ON s.id = p.song_id
    JOIN people pe ON pe.user_id = p.user_id
"#;

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await
            .with_context(|| format!("failed to open database '{database_url}'"))?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    async fn load_tracklist(&self, event_id: EventId) -> Result<Vec<TrackSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT t.position, t.song_id, s.title
            FROM tracklist_entries t
            JOIN songs s ON s.id = t.song_id
            WHERE t.event_id = ?
            ORDER BY t.position
            "#,
        )
        .bind(event_id.0)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("failed to load tracklist for event {event_id}"))?;

        rows.into_iter()
            .map(|row| -> Result<TrackSummary> {
                Ok(TrackSummary {
                    position: u32::try_from(row.get::<i64, _>(0))
                        .context("tracklist position out of range")?,
                    song_id: SongId(row.get::<i64, _>(1)),
                    title: row.get::<String, _>(2),
                })
            })
            .collect()
    }
}

fn participation_from_row(row: &SqliteRow) -> ParticipationDetails {
    ParticipationDetails {
        song_id: SongId(row.get::<i64, _>(0)),
        song_title: row.get::<String, _>(1),
        user_id: UserId(row.get::<i64, _>(2)),
        person_name: row.get::<String, _>(3),
        role: row.get::<String, _>(4),
    }
}

fn song_from_row(row: &SqliteRow) -> Song {
    Song {
        id: SongId(row.get::<i64, _>(0)),
        title: row.get::<String, _>(1),
        link: row.get::<String, _>(2),
    }
}

#[async_trait]
impl ClubStore for Storage {
    async fn list_songs(&self) -> Result<Vec<Song>> {
        let rows = sqlx::query("SELECT id, title, link FROM songs ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .context("failed to list songs")?;
        Ok(rows.iter().map(song_from_row).collect())
    }

    async fn load_song(&self, song_id: SongId) -> Result<Option<Song>> {
        let row = sqlx::query("SELECT id, title, link FROM songs WHERE id = ?")
            .bind(song_id.0)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(song_from_row))
    }

    async fn create_song(&self, song: &NewSong) -> Result<SongId> {
        let rec = sqlx::query("INSERT INTO songs (title, link) VALUES (?, ?) RETURNING id")
            .bind(&song.title)
            .bind(&song.link)
            .fetch_one(&self.pool)
            .await
            .context("failed to insert song")?;
        Ok(SongId(rec.get::<i64, _>(0)))
    }

    async fn create_event(&self, event: &NewEvent) -> Result<EventId> {
        let mut tx = self.pool.begin().await?;
        let event_id = match insert_event(&mut tx, event).await {
            Ok(event_id) => event_id,
            Err(err) => {
                tx.rollback().await.context("failed to roll back event insert")?;
                return Err(err);
            }
        };
        tx.commit().await?;
        debug!(event = %event_id, tracks = event.tracklist().len(), "event stored");
        Ok(event_id)
    }

    async fn delete_event(&self, event_id: EventId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM events WHERE id = ?")
            .bind(event_id.0)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to delete event {event_id}"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn load_event(&self, event_id: EventId) -> Result<Option<EventDetails>> {
        let Some(row) = sqlx::query("SELECT id, name, date FROM events WHERE id = ?")
            .bind(event_id.0)
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };

        Ok(Some(EventDetails {
            id: EventId(row.get::<i64, _>(0)),
            name: row.get::<String, _>(1),
            date: row.try_get::<NaiveDate, _>(2)?,
            tracklist: self.load_tracklist(event_id).await?,
        }))
    }

    async fn list_events_from(&self, from: NaiveDate) -> Result<Vec<EventSummary>> {
        let rows =
            sqlx::query("SELECT id, name, date FROM events WHERE date >= ? ORDER BY date, id")
                .bind(from)
                .fetch_all(&self.pool)
                .await
                .context("failed to list events")?;
        rows.iter()
            .map(|row| -> Result<EventSummary> {
                Ok(EventSummary {
                    id: EventId(row.get::<i64, _>(0)),
                    name: row.get::<String, _>(1),
                    date: row.try_get::<NaiveDate, _>(2)?,
                })
            })
            .collect()
    }

    async fn upsert_person(&self, person: &Person) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO people (user_id, name) VALUES (?, ?)
            ON CONFLICT (user_id) DO UPDATE SET
                name = excluded.name,
                last_seen = CURRENT_TIMESTAMP
            "#,
        )
        .bind(person.user_id.0)
        .bind(&person.name)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to record person {}", person.user_id))?;
        Ok(())
    }

    async fn list_people(&self) -> Result<Vec<Person>> {
        let rows = sqlx::query("SELECT user_id, name FROM people ORDER BY user_id")
            .fetch_all(&self.pool)
            .await
            .context("failed to list people")?;
        Ok(rows
            .iter()
            .map(|row| Person {
                user_id: UserId(row.get::<i64, _>(0)),
                name: row.get::<String, _>(1),
            })
            .collect())
    }

    async fn join_song(&self, participation: &Participation) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO song_participations (song_id, user_id, role) VALUES (?, ?, ?)
            ON CONFLICT (song_id, user_id, role) DO NOTHING
            "#,
        )
        .bind(participation.song_id.0)
        .bind(participation.user_id.0)
        .bind(&participation.role)
        .execute(&self.pool)
        .await
        .with_context(|| {
            format!(
                "failed to add {} to song {}",
                participation.user_id, participation.song_id
            )
        })?;
        Ok(result.rows_affected() > 0)
    }

    async fn leave_song(&self, participation: &Participation) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM song_participations WHERE song_id = ? AND user_id = ? AND role = ?",
        )
        .bind(participation.song_id.0)
        .bind(participation.user_id.0)
        .bind(&participation.role)
        .execute(&self.pool)
        .await
        .with_context(|| {
            format!(
                "failed to remove {} from song {}",
                participation.user_id, participation.song_id
            )
        })?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_participations(&self, user_id: UserId) -> Result<Vec<ParticipationDetails>> {
        let rows = sqlx::query(&format!(
            "{PARTICIPATION_COLUMNS} WHERE p.user_id = ? ORDER BY p.song_id, p.role"
        ))
        .bind(user_id.0)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("failed to list participations of {user_id}"))?;
        Ok(rows.iter().map(participation_from_row).collect())
    }

    async fn list_song_participants(&self, song_id: SongId) -> Result<Vec<ParticipationDetails>> {
        let rows = sqlx::query(&format!(
            "{PARTICIPATION_COLUMNS} WHERE p.song_id = ? ORDER BY p.role, p.user_id"
        ))
        .bind(song_id.0)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("failed to list participants of song {song_id}"))?;
        Ok(rows.iter().map(participation_from_row).collect())
    }
}

/// Inserts the event row and its tracklist inside the caller's transaction.
async fn insert_event(tx: &mut Transaction<'_, Sqlite>, event: &NewEvent) -> Result<EventId> {
    let rec = sqlx::query("INSERT INTO events (name, date) VALUES (?, ?) RETURNING id")
        .bind(event.name())
        .bind(event.date())
        .fetch_one(&mut **tx)
        .await
        .context("failed to insert event")?;
    let event_id = EventId(rec.get::<i64, _>(0));

    for entry in event.tracklist() {
        sqlx::query("INSERT INTO tracklist_entries (event_id, song_id, position) VALUES (?, ?, ?)")
            .bind(event_id.0)
            .bind(entry.song_id.0)
            .bind(i64::from(entry.position))
            .execute(&mut **tx)
            .await
            .with_context(|| {
                format!(
                    "failed to insert tracklist entry {} (song {})",
                    entry.position, entry.song_id
                )
            })?;
    }
    Ok(event_id)
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

/// File path behind a `sqlite:` url, or `None` for in-memory and non-sqlite
/// urls.
pub fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.contains(":memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
