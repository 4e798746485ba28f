//! [`SqliteStore`]: the SQLite implementation of [`SubmissionStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use launchpad_core::{
  aggregate::DistributionAggregator,
  distribution::{Distribution, DistributionView, NewDistribution},
  history::{ActionHistoryEntry, NewHistoryEntry},
  platform::Platform,
  store::{CommitOutcome, CommittedTransition, DistributionQuery, SubmissionStore},
  submission::Submission,
};

use crate::{
  Error, Result,
  encode::{
    DISTRIBUTION_COLUMNS, HISTORY_COLUMNS, RawDistribution, RawHistoryEntry, RawSubmission,
    SUBMISSION_COLUMNS, SubmissionRow, call_err, encode_dt, encode_platforms, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Launchpad submission store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn query_submissions(
    &self,
    sql: String,
    params: Vec<String>,
  ) -> Result<Vec<Submission>> {
    let raws: Vec<RawSubmission> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params.iter()), RawSubmission::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSubmission::into_submission).collect()
  }
}

// ─── Transaction helpers ─────────────────────────────────────────────────────
//
// These run inside `Connection::call` closures, so they speak
// `tokio_rusqlite::Result` and take the open transaction by reference.

fn insert_submission(conn: &rusqlite::Connection, row: &SubmissionRow) -> rusqlite::Result<()> {
  conn.execute(
    &format!(
      "INSERT INTO submissions ({SUBMISSION_COLUMNS}) VALUES (
         ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
         ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23
       )"
    ),
    rusqlite::params![
      row.submission_id,
      row.distribution_id,
      row.release_id,
      row.platform,
      row.store_type,
      row.status,
      row.version,
      row.version_code,
      row.in_app_priority,
      row.testflight_number,
      row.phased_release,
      row.reset_rating,
      row.rollout_percentage,
      row.release_notes,
      row.artifact_path,
      row.is_current,
      row.submitted_at,
      row.submitted_by,
      row.status_updated_at,
      row.rejection_reason,
      row.revision,
      row.created_at,
      row.updated_at,
    ],
  )?;
  Ok(())
}

/// Conditional write of a current row. Returns the number of rows touched:
/// zero means the revision moved on or the row is no longer current.
fn update_submission(
  conn: &rusqlite::Connection,
  row: &SubmissionRow,
  expected_revision: i64,
) -> rusqlite::Result<usize> {
  conn.execute(
    "UPDATE submissions SET
       status             = ?3,
       version            = ?4,
       version_code       = ?5,
       in_app_priority    = ?6,
       testflight_number  = ?7,
       phased_release     = ?8,
       reset_rating       = ?9,
       rollout_percentage = ?10,
       release_notes      = ?11,
       artifact_path      = ?12,
       submitted_at       = ?13,
       submitted_by       = ?14,
       status_updated_at  = ?15,
       rejection_reason   = ?16,
       updated_at         = ?17,
       revision           = revision + 1
     WHERE submission_id = ?1 AND revision = ?2 AND is_current = 1",
    rusqlite::params![
      row.submission_id,
      expected_revision,
      row.status,
      row.version,
      row.version_code,
      row.in_app_priority,
      row.testflight_number,
      row.phased_release,
      row.reset_rating,
      row.rollout_percentage,
      row.release_notes,
      row.artifact_path,
      row.submitted_at,
      row.submitted_by,
      row.status_updated_at,
      row.rejection_reason,
      row.updated_at,
    ],
  )
}

/// Append one history entry. The timestamp and sequence are assigned here.
fn append_history(
  conn: &rusqlite::Connection,
  entry: NewHistoryEntry,
  now: DateTime<Utc>,
) -> rusqlite::Result<ActionHistoryEntry> {
  let entry_id = Uuid::new_v4();
  conn.execute(
    "INSERT INTO action_history (entry_id, submission_id, action, actor, reason, recorded_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    rusqlite::params![
      encode_uuid(entry_id),
      encode_uuid(entry.submission_id),
      entry.action.to_string(),
      entry.actor,
      entry.reason,
      encode_dt(now),
    ],
  )?;
  Ok(ActionHistoryEntry {
    entry_id,
    submission_id: entry.submission_id,
    sequence: conn.last_insert_rowid(),
    action: entry.action,
    actor: entry.actor,
    reason: entry.reason,
    recorded_at: now,
  })
}

/// Recompute and persist a distribution's cached status from its current
/// submissions, inside the caller's transaction.
fn refresh_distribution(
  conn: &rusqlite::Connection,
  distribution_id: Uuid,
  now: DateTime<Utc>,
) -> tokio_rusqlite::Result<Distribution> {
  let id_str = encode_uuid(distribution_id);

  let raw = conn
    .query_row(
      &format!("SELECT {DISTRIBUTION_COLUMNS} FROM distributions WHERE distribution_id = ?1"),
      rusqlite::params![id_str],
      RawDistribution::from_row,
    )
    .optional()?
    .ok_or_else(|| call_err(Error::DistributionNotFound(distribution_id)))?;
  let mut distribution = raw.into_distribution().map_err(call_err)?;

  let mut stmt = conn.prepare(&format!(
    "SELECT {SUBMISSION_COLUMNS} FROM submissions
     WHERE distribution_id = ?1 AND is_current = 1"
  ))?;
  let current = stmt
    .query_map(rusqlite::params![id_str], RawSubmission::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?
    .into_iter()
    .map(RawSubmission::into_submission)
    .collect::<Result<Vec<_>>>()
    .map_err(call_err)?;

  if DistributionAggregator::recompute(&mut distribution, &current, now) {
    conn.execute(
      "UPDATE distributions SET status = ?2, updated_at = ?3 WHERE distribution_id = ?1",
      rusqlite::params![
        id_str,
        distribution.status.to_string(),
        encode_dt(distribution.updated_at),
      ],
    )?;
  }
  Ok(distribution)
}

// ─── SubmissionStore impl ────────────────────────────────────────────────────

impl SubmissionStore for SqliteStore {
  type Error = Error;

  // ── Distributions ─────────────────────────────────────────────────────────

  async fn create_distribution(&self, input: NewDistribution) -> Result<DistributionView> {
    input.validate()?;
    let now = launchpad_core::now();
    let (mut distribution, submissions) = input.build(now);
    DistributionAggregator::recompute(&mut distribution, &submissions, now);

    let dist_params = (
      encode_uuid(distribution.distribution_id),
      encode_uuid(distribution.release_id),
      distribution.tenant_id.clone(),
      encode_platforms(&distribution.platforms)?,
      distribution.status.to_string(),
      encode_dt(distribution.created_at),
      encode_dt(distribution.updated_at),
    );
    let rows = submissions
      .iter()
      .map(SubmissionRow::encode)
      .collect::<Result<Vec<_>>>()?;

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          &format!("INSERT INTO distributions ({DISTRIBUTION_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
          rusqlite::params![
            dist_params.0,
            dist_params.1,
            dist_params.2,
            dist_params.3,
            dist_params.4,
            dist_params.5,
            dist_params.6,
          ],
        )?;
        for row in &rows {
          insert_submission(&tx, row)?;
        }
        tx.commit()?;
        Ok(())
      })
      .await?;

    tracing::debug!(
      distribution_id = %distribution.distribution_id,
      submissions = submissions.len(),
      "distribution inserted"
    );
    Ok(DistributionView { distribution, submissions })
  }

  async fn get_distribution(&self, id: Uuid) -> Result<Option<Distribution>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawDistribution> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {DISTRIBUTION_COLUMNS} FROM distributions WHERE distribution_id = ?1"),
              rusqlite::params![id_str],
              RawDistribution::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawDistribution::into_distribution).transpose()
  }

  async fn list_distributions(&self, query: &DistributionQuery) -> Result<Vec<Distribution>> {
    let status = query.status.map(|s| s.to_string());
    let tenant = query.tenant_id.clone();
    let release = query.release_id.map(encode_uuid);
    // SQLite reads a negative LIMIT as unbounded; saturate instead of wrapping.
    let limit_val = i64::try_from(query.limit.unwrap_or(100)).unwrap_or(i64::MAX);
    let offset_val = i64::try_from(query.offset.unwrap_or(0)).unwrap_or(i64::MAX);

    let raws: Vec<RawDistribution> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {DISTRIBUTION_COLUMNS} FROM distributions
           WHERE (?1 IS NULL OR status = ?1)
             AND (?2 IS NULL OR tenant_id = ?2)
             AND (?3 IS NULL OR release_id = ?3)
           ORDER BY created_at DESC, distribution_id
           LIMIT ?4 OFFSET ?5"
        ))?;
        let rows = stmt
          .query_map(
            rusqlite::params![status, tenant, release, limit_val, offset_val],
            RawDistribution::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawDistribution::into_distribution).collect()
  }

  // ── Submissions ───────────────────────────────────────────────────────────

  async fn get_submission(&self, id: Uuid) -> Result<Option<Submission>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawSubmission> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {SUBMISSION_COLUMNS} FROM submissions WHERE submission_id = ?1"),
              rusqlite::params![id_str],
              RawSubmission::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawSubmission::into_submission).transpose()
  }

  async fn current_submissions(&self, distribution_id: Uuid) -> Result<Vec<Submission>> {
    self
      .query_submissions(
        format!(
          "SELECT {SUBMISSION_COLUMNS} FROM submissions
           WHERE distribution_id = ?1 AND is_current = 1
           ORDER BY platform"
        ),
        vec![encode_uuid(distribution_id)],
      )
      .await
  }

  async fn list_submissions(
    &self,
    distribution_id: Uuid,
    platform: Option<Platform>,
  ) -> Result<Vec<Submission>> {
    let mut params = vec![encode_uuid(distribution_id)];
    let platform_clause = match platform {
      Some(p) => {
        params.push(p.to_string());
        "AND platform = ?2"
      }
      None => "",
    };
    self
      .query_submissions(
        format!(
          "SELECT {SUBMISSION_COLUMNS} FROM submissions
           WHERE distribution_id = ?1 {platform_clause}
           ORDER BY created_at, rowid"
        ),
        params,
      )
      .await
  }

  // ── History ───────────────────────────────────────────────────────────────

  async fn get_history(&self, submission_id: Uuid) -> Result<Vec<ActionHistoryEntry>> {
    let id_str = encode_uuid(submission_id);

    let raws: Vec<RawHistoryEntry> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {HISTORY_COLUMNS} FROM action_history
           WHERE submission_id = ?1
           ORDER BY recorded_at, sequence"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], RawHistoryEntry::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawHistoryEntry::into_entry).collect()
  }

  // ── Transactional writes ──────────────────────────────────────────────────

  async fn commit_transition(
    &self,
    expected_revision: u64,
    mut submission: Submission,
    entry: NewHistoryEntry,
  ) -> Result<CommitOutcome> {
    let row = SubmissionRow::encode(&submission)?;
    let expected = i64::try_from(expected_revision)
      .map_err(|e| Error::decode("revision", e))?;
    let distribution_id = submission.distribution_id;
    let submission_id = submission.submission_id;

    let written: Option<(ActionHistoryEntry, Distribution)> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if update_submission(&tx, &row, expected)? == 0 {
          return Ok(None);
        }
        let now = launchpad_core::now();
        let entry = append_history(&tx, entry, now)?;
        let distribution = refresh_distribution(&tx, distribution_id, now)?;
        tx.commit()?;
        Ok(Some((entry, distribution)))
      })
      .await?;

    let Some((entry, distribution)) = written else {
      tracing::debug!(%submission_id, expected_revision, "stale revision; nothing written");
      return Ok(CommitOutcome::Conflict);
    };
    submission.revision = expected_revision + 1;
    Ok(CommitOutcome::Committed(CommittedTransition { submission, distribution, entry }))
  }

  async fn commit_resubmission(
    &self,
    predecessor_id: Uuid,
    expected_revision: u64,
    submission: Submission,
    entry: NewHistoryEntry,
  ) -> Result<CommitOutcome> {
    let row = SubmissionRow::encode(&submission)?;
    let expected = i64::try_from(expected_revision)
      .map_err(|e| Error::decode("revision", e))?;
    let predecessor_str = encode_uuid(predecessor_id);
    let distribution_id = submission.distribution_id;

    let written: Option<(ActionHistoryEntry, Distribution)> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let now = launchpad_core::now();
        // Only a terminal, still-current predecessor may be retired.
        let retired = tx.execute(
          "UPDATE submissions
           SET is_current = 0, revision = revision + 1, updated_at = ?3
           WHERE submission_id = ?1 AND revision = ?2 AND is_current = 1
             AND status IN ('REJECTED', 'CANCELLED')",
          rusqlite::params![predecessor_str, expected, encode_dt(now)],
        )?;
        if retired == 0 {
          return Ok(None);
        }
        insert_submission(&tx, &row)?;
        let entry = append_history(&tx, entry, now)?;
        let distribution = refresh_distribution(&tx, distribution_id, now)?;
        tx.commit()?;
        Ok(Some((entry, distribution)))
      })
      .await?;

    let Some((entry, distribution)) = written else {
      tracing::debug!(%predecessor_id, expected_revision, "predecessor changed; nothing written");
      return Ok(CommitOutcome::Conflict);
    };
    Ok(CommitOutcome::Committed(CommittedTransition { submission, distribution, entry }))
  }
}
