//! Profile persistence: idempotent reconciliation keyed by subject id.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use prism_core::profile::{ProfileCandidate, SocialProfile};

#[derive(Clone)]
pub struct ProfileStore {
    db: PgPool,
}

#[derive(Debug, sqlx::FromRow)]
struct ProfileRow {
    subject_id: String,
    external_id: Option<String>,
    handle: Option<String>,
    display_name: Option<String>,
    avatar_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProfileRow> for SocialProfile {
    fn from(row: ProfileRow) -> Self {
        SocialProfile {
            subject_id: row.subject_id,
            external_id: row.external_id,
            handle: row.handle,
            display_name: row.display_name,
            avatar_url: row.avatar_url,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl ProfileStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Reconcile a freshly observed candidate into the store.
    ///
    /// Runs in one transaction; the existing row is locked with
    /// `FOR UPDATE` so concurrent reconciliations of the same subject cannot
    /// interleave the compare-and-write. `updated_at` advances only when
    /// `handle`, `display_name`, or `avatar_url` actually changed;
    /// `external_id` is written at insert and never rewritten.
    pub async fn upsert(
        &self,
        subject_id: &str,
        candidate: &ProfileCandidate,
    ) -> Result<SocialProfile, sqlx::Error> {
        let mut tx = self.db.begin().await?;

        let existing = sqlx::query_as::<_, ProfileRow>(
            "SELECT subject_id, external_id, handle, display_name, avatar_url, \
                    created_at, updated_at \
             FROM social_profiles WHERE subject_id = $1 FOR UPDATE",
        )
        .bind(subject_id)
        .fetch_optional(&mut *tx)
        .await?;

        let profile = match existing {
            None => {
                let now = Utc::now();
                sqlx::query(
                    "INSERT INTO social_profiles \
                         (subject_id, external_id, handle, display_name, avatar_url, \
                          created_at, updated_at) \
                     VALUES ($1, $2, $3, $4, $5, $6, $6)",
                )
                .bind(subject_id)
                .bind(&candidate.external_id)
                .bind(&candidate.handle)
                .bind(&candidate.display_name)
                .bind(&candidate.avatar_url)
                .bind(now)
                .execute(&mut *tx)
                .await?;

                tracing::info!(
                    event = "profile_created",
                    subject_id = %subject_id,
                    handle = ?candidate.handle,
                    "social profile created"
                );

                SocialProfile {
                    subject_id: subject_id.to_string(),
                    external_id: candidate.external_id.clone(),
                    handle: candidate.handle.clone(),
                    display_name: candidate.display_name.clone(),
                    avatar_url: candidate.avatar_url.clone(),
                    created_at: now,
                    updated_at: now,
                }
            }
            Some(row) if candidate_differs(&row, candidate) => {
                let now = Utc::now();
                sqlx::query(
                    "UPDATE social_profiles \
                     SET handle = $2, display_name = $3, avatar_url = $4, updated_at = $5 \
                     WHERE subject_id = $1",
                )
                .bind(subject_id)
                .bind(&candidate.handle)
                .bind(&candidate.display_name)
                .bind(&candidate.avatar_url)
                .bind(now)
                .execute(&mut *tx)
                .await?;

                tracing::info!(
                    event = "profile_updated",
                    subject_id = %subject_id,
                    handle = ?candidate.handle,
                    "social profile fields changed"
                );

                SocialProfile {
                    subject_id: row.subject_id,
                    external_id: row.external_id,
                    handle: candidate.handle.clone(),
                    display_name: candidate.display_name.clone(),
                    avatar_url: candidate.avatar_url.clone(),
                    created_at: row.created_at,
                    updated_at: now,
                }
            }
            // No change: no write, updated_at stays put.
            Some(row) => row.into(),
        };

        tx.commit().await?;
        Ok(profile)
    }

    /// Pure read. `Ok(None)` means not found; `Err` is a store failure, never
    /// conflated with "not found".
    pub async fn get_by_subject(
        &self,
        subject_id: &str,
    ) -> Result<Option<SocialProfile>, sqlx::Error> {
        let row = sqlx::query_as::<_, ProfileRow>(
            "SELECT subject_id, external_id, handle, display_name, avatar_url, \
                    created_at, updated_at \
             FROM social_profiles WHERE subject_id = $1",
        )
        .bind(subject_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(SocialProfile::from))
    }
}

/// Field-by-field comparison driving the write decision. Only the three
/// provider-refreshable fields count; `external_id` is deliberately excluded.
fn candidate_differs(row: &ProfileRow, candidate: &ProfileCandidate) -> bool {
    row.handle != candidate.handle
        || row.display_name != candidate.display_name
        || row.avatar_url != candidate.avatar_url
}
