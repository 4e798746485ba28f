//! SQL schema for the Launchpad SQLite store.
//!
//! Executed once at connection startup. `PRAGMA user_version` records the
//! schema revision for future migrations.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS distributions (
    distribution_id TEXT PRIMARY KEY,
    release_id      TEXT NOT NULL,
    tenant_id       TEXT NOT NULL,
    platforms       TEXT NOT NULL,   -- JSON array of platform names
    status          TEXT NOT NULL,   -- cached aggregate; recomputed on every write
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS submissions (
    submission_id      TEXT PRIMARY KEY,
    distribution_id    TEXT NOT NULL REFERENCES distributions(distribution_id),
    release_id         TEXT NOT NULL,
    platform           TEXT NOT NULL,   -- 'ANDROID' | 'IOS'
    store_type         TEXT NOT NULL,
    status             TEXT NOT NULL,
    version            TEXT NOT NULL,
    version_code       INTEGER,         -- Android only
    in_app_priority    INTEGER,         -- Android only
    testflight_number  TEXT,            -- iOS only
    phased_release     INTEGER,         -- iOS only; NULL until submitted
    reset_rating       INTEGER,         -- iOS only
    rollout_percentage REAL NOT NULL
        CHECK (rollout_percentage >= 0 AND rollout_percentage <= 100),
    release_notes      TEXT,
    artifact_path      TEXT,
    is_current         INTEGER NOT NULL CHECK (is_current IN (0, 1)),
    submitted_at       TEXT,
    submitted_by       TEXT,
    status_updated_at  TEXT NOT NULL,
    rejection_reason   TEXT,
    revision           INTEGER NOT NULL,
    created_at         TEXT NOT NULL,
    updated_at         TEXT NOT NULL
);

-- At most one current submission per (distribution, platform).
CREATE UNIQUE INDEX IF NOT EXISTS submissions_current_idx
    ON submissions(distribution_id, platform) WHERE is_current = 1;
CREATE INDEX IF NOT EXISTS submissions_distribution_idx
    ON submissions(distribution_id);

-- Strictly append-only; the triggers below reject UPDATE and DELETE.
CREATE TABLE IF NOT EXISTS action_history (
    sequence      INTEGER PRIMARY KEY AUTOINCREMENT,
    entry_id      TEXT NOT NULL UNIQUE,
    submission_id TEXT NOT NULL REFERENCES submissions(submission_id),
    action        TEXT NOT NULL,
    actor         TEXT NOT NULL CHECK (length(trim(actor)) > 0),
    reason        TEXT,
    recorded_at   TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS action_history_submission_idx
    ON action_history(submission_id, recorded_at, sequence);

CREATE TRIGGER IF NOT EXISTS action_history_no_update
BEFORE UPDATE ON action_history
BEGIN
    SELECT RAISE(ABORT, 'action_history is append-only');
END;

CREATE TRIGGER IF NOT EXISTS action_history_no_delete
BEFORE DELETE ON action_history
BEGIN
    SELECT RAISE(ABORT, 'action_history is append-only');
END;

PRAGMA user_version = 1;
";
