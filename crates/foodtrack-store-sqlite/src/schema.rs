//! SQL schema for the Foodtrack SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS orders (
    order_id          TEXT PRIMARY KEY,
    customer          TEXT NOT NULL,   -- JSON CustomerProfile
    restaurant        TEXT NOT NULL,   -- JSON RestaurantProfile
    rider             TEXT,            -- JSON RiderProfile or NULL
    delivery_location TEXT,            -- JSON Coordinates or NULL
    created_at        TEXT NOT NULL
);

-- One row per order; never deleted.
CREATE TABLE IF NOT EXISTS order_tracking (
    order_id       TEXT PRIMARY KEY,
    current_status TEXT NOT NULL,
    created_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL
);

-- Strictly append-only. `seq` gives the history its order.
CREATE TABLE IF NOT EXISTS status_history (
    seq             INTEGER PRIMARY KEY AUTOINCREMENT,
    order_id        TEXT NOT NULL REFERENCES order_tracking(order_id),
    previous_status TEXT NOT NULL,
    new_status      TEXT NOT NULL,
    timestamp       TEXT NOT NULL,
    updated_by      TEXT NOT NULL,
    notes           TEXT
);

-- Short-lived; deleted on terminal status, by timer, or by the sweep.
CREATE TABLE IF NOT EXISTS active_order_contacts (
    order_id       TEXT PRIMARY KEY,
    customer       TEXT NOT NULL,   -- JSON SealedCustomerContact
    rider          TEXT,            -- JSON RiderContact or NULL
    restaurant     TEXT NOT NULL,   -- JSON RestaurantContact
    created_at     TEXT NOT NULL,
    expires_at     TEXT NOT NULL,
    encryption_key TEXT NOT NULL
);

-- Audit trail; outlives the contacts row it describes.
CREATE TABLE IF NOT EXISTS contact_access_logs (
    seq         INTEGER PRIMARY KEY AUTOINCREMENT,
    order_id    TEXT NOT NULL,
    user_id     TEXT NOT NULL,
    role        TEXT NOT NULL,
    accessed_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS order_timeline (
    seq        INTEGER PRIMARY KEY AUTOINCREMENT,
    event_id   TEXT NOT NULL UNIQUE,
    order_id   TEXT NOT NULL,
    event_type TEXT NOT NULL,   -- 'status_change' | 'message' | 'issue' | 'update'
    event_data TEXT NOT NULL,   -- JSON
    timestamp  TEXT NOT NULL,
    actor      TEXT NOT NULL,   -- JSON Actor
    is_public  INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS rider_locations (
    rider_id    TEXT PRIMARY KEY,
    latitude    REAL NOT NULL,
    longitude   REAL NOT NULL,
    recorded_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS status_history_order_idx  ON status_history(order_id, seq);
CREATE INDEX IF NOT EXISTS contacts_expires_idx      ON active_order_contacts(expires_at);
CREATE INDEX IF NOT EXISTS access_logs_order_idx     ON contact_access_logs(order_id, seq);
CREATE INDEX IF NOT EXISTS timeline_order_idx        ON order_timeline(order_id, seq);

PRAGMA user_version = 1;
";
