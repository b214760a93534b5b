pub const BASE_MIGRATION: &str = r#"
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    taken_at TEXT NOT NULL,
    committed_at TEXT NOT NULL,
    entry_count INTEGER NOT NULL,
    event_count INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS baseline_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    run_id INTEGER NOT NULL,
    taken_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS baseline_entries (
    source TEXT NOT NULL,
    position INTEGER NOT NULL,
    model TEXT NOT NULL,
    rank INTEGER NOT NULL,
    score REAL,
    details_json TEXT NOT NULL,
    PRIMARY KEY (source, model)
);

CREATE TABLE IF NOT EXISTS model_first_seen (
    source TEXT NOT NULL,
    model TEXT NOT NULL,
    first_seen_at TEXT NOT NULL,
    PRIMARY KEY (source, model)
);

CREATE TABLE IF NOT EXISTS change_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL,
    recorded_at TEXT NOT NULL,
    kind TEXT NOT NULL,
    source TEXT NOT NULL,
    model TEXT NOT NULL,
    magnitude REAL NOT NULL,
    event_json TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_change_events_model
    ON change_events(source, model, recorded_at DESC);
CREATE INDEX IF NOT EXISTS idx_change_events_recorded
    ON change_events(recorded_at);
"#;
