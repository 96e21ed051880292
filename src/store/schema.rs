/// SQLite DDL applied on every startup. Statements are idempotent.
///
/// `challenge.issued_on` holds unix milliseconds (UTC).
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS challenge (
    id INTEGER PRIMARY KEY,
    group_id INTEGER NOT NULL,
    user_id INTEGER NOT NULL,
    username TEXT,
    issued_on INTEGER NOT NULL,
    UNIQUE (group_id, user_id)
);

CREATE INDEX IF NOT EXISTS idx_challenge_issued_on ON challenge (issued_on);

CREATE TABLE IF NOT EXISTS channels (
    id INTEGER PRIMARY KEY,
    group_id INTEGER NOT NULL UNIQUE,
    channel_url TEXT NOT NULL,
    passphrase TEXT NOT NULL
);
";

/// Split [`SCHEMA`] into individual statements.
pub fn statements() -> impl Iterator<Item = &'static str> {
    SCHEMA
        .split(';')
        .map(str::trim)
        .filter(|statement| !statement.is_empty())
}
