//! SQL schema for the vitals SQLite store.
//!
//! Executed once at connection startup. Every collection is keyed by user;
//! the full document lives in `doc` as JSON, alongside the columns needed for
//! keys, ordering and filtering.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Raw events are strictly append-only.
-- No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS raw_events (
    user_id      TEXT NOT NULL,
    id           TEXT NOT NULL,   -- idempotency key
    source_id    TEXT NOT NULL,
    kind         TEXT NOT NULL,
    fingerprint  TEXT NOT NULL,
    received_at  TEXT NOT NULL,   -- RFC 3339 UTC
    doc          TEXT NOT NULL,
    PRIMARY KEY (user_id, id)
);

-- Derived one-to-one from raw_events; append-only.
CREATE TABLE IF NOT EXISTS canonical_events (
    user_id     TEXT NOT NULL,
    id          TEXT NOT NULL,    -- = raw_events.id
    kind        TEXT NOT NULL,
    day         TEXT NOT NULL,    -- YYYY-MM-DD in the event's own zone
    start_at    TEXT NOT NULL,    -- fixed-width ISO 8601 UTC
    created_at  TEXT NOT NULL,
    doc         TEXT NOT NULL,
    PRIMARY KEY (user_id, id)
);

-- Rejected or dropped writes; append-only, read-only to clients.
CREATE TABLE IF NOT EXISTS failures (
    user_id       TEXT NOT NULL,
    id            TEXT NOT NULL,
    kind          TEXT NOT NULL,
    raw_event_id  TEXT,
    created_at    TEXT NOT NULL,
    doc           TEXT NOT NULL,
    PRIMARY KEY (user_id, id)
);

CREATE TABLE IF NOT EXISTS webhook_receipts (
    provider     TEXT NOT NULL,
    id           TEXT NOT NULL,
    received_at  TEXT NOT NULL,
    doc          TEXT NOT NULL,
    PRIMARY KEY (provider, id)
);

-- Derived documents below are overwritten on recomputation.
CREATE TABLE IF NOT EXISTS daily_facts (
    user_id      TEXT NOT NULL,
    date         TEXT NOT NULL,
    computed_at  TEXT NOT NULL,
    doc          TEXT NOT NULL,
    PRIMARY KEY (user_id, date)
);

CREATE TABLE IF NOT EXISTS insights (
    user_id  TEXT NOT NULL,
    date     TEXT NOT NULL,
    kind     TEXT NOT NULL,
    doc      TEXT NOT NULL,
    PRIMARY KEY (user_id, date, kind)
);

CREATE TABLE IF NOT EXISTS intelligence_context (
    user_id      TEXT NOT NULL,
    date         TEXT NOT NULL,
    computed_at  TEXT NOT NULL,
    doc          TEXT NOT NULL,
    PRIMARY KEY (user_id, date)
);

CREATE TABLE IF NOT EXISTS integration_tokens (
    user_id       TEXT NOT NULL,
    provider      TEXT NOT NULL,
    access_token  TEXT NOT NULL,
    PRIMARY KEY (user_id, provider)
);

CREATE INDEX IF NOT EXISTS canonical_day_idx  ON canonical_events(user_id, day);
CREATE INDEX IF NOT EXISTS failures_recent_idx ON failures(user_id, created_at);
CREATE INDEX IF NOT EXISTS failures_raw_idx    ON failures(user_id, raw_event_id);

PRAGMA user_version = 1;
";
