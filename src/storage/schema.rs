//! Database schema definitions
//!
//! This module contains the SQL schema for the normalized catalog store:
//! one fact table, four lookup tables with their junction tables, and the
//! dependent reviews table.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per successfully fetched application
CREATE TABLE IF NOT EXISTS applications (
    appid INTEGER PRIMARY KEY,
    name_from_applist TEXT NOT NULL,
    steam_appid INTEGER,
    name TEXT,
    type TEXT,
    is_free INTEGER,
    release_date TEXT,
    required_age TEXT,
    metacritic_score INTEGER,
    recommendations_total INTEGER,
    header_image TEXT,
    background TEXT,
    detailed_description TEXT,
    short_description TEXT,
    about_the_game TEXT,
    supported_languages TEXT,
    price_overview TEXT,
    pc_requirements TEXT,
    mac_requirements TEXT,
    linux_requirements TEXT,
    content_descriptors TEXT,
    package_groups TEXT,
    achievements TEXT,
    screenshots TEXT,
    movies TEXT,
    ratings TEXT,
    base_app_id INTEGER,
    success INTEGER NOT NULL DEFAULT 1,
    fetched_at TEXT,
    supports_windows INTEGER NOT NULL DEFAULT 0,
    supports_mac INTEGER NOT NULL DEFAULT 0,
    supports_linux INTEGER NOT NULL DEFAULT 0,
    initial_price INTEGER,
    final_price INTEGER,
    discount_percent INTEGER,
    currency TEXT,
    achievement_count INTEGER
);

CREATE INDEX IF NOT EXISTS idx_applications_type ON applications(type);
CREATE INDEX IF NOT EXISTS idx_applications_release_date ON applications(release_date);

-- Lookup tables
CREATE TABLE IF NOT EXISTS developers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS publishers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS genres (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS categories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);

-- Junction tables
CREATE TABLE IF NOT EXISTS application_developers (
    appid INTEGER NOT NULL REFERENCES applications(appid),
    developer_id INTEGER NOT NULL REFERENCES developers(id),
    PRIMARY KEY (appid, developer_id)
);

CREATE TABLE IF NOT EXISTS application_publishers (
    appid INTEGER NOT NULL REFERENCES applications(appid),
    publisher_id INTEGER NOT NULL REFERENCES publishers(id),
    PRIMARY KEY (appid, publisher_id)
);

CREATE TABLE IF NOT EXISTS application_genres (
    appid INTEGER NOT NULL REFERENCES applications(appid),
    genre_id INTEGER NOT NULL REFERENCES genres(id),
    PRIMARY KEY (appid, genre_id)
);

CREATE TABLE IF NOT EXISTS application_categories (
    appid INTEGER NOT NULL REFERENCES applications(appid),
    category_id INTEGER NOT NULL REFERENCES categories(id),
    PRIMARY KEY (appid, category_id)
);

-- User reviews, dependent on applications
CREATE TABLE IF NOT EXISTS reviews (
    recommendationid TEXT PRIMARY KEY,
    appid INTEGER NOT NULL REFERENCES applications(appid),
    author_steamid TEXT,
    author_num_games_owned INTEGER,
    author_num_reviews INTEGER,
    author_playtime_forever INTEGER,
    author_playtime_last_two_weeks INTEGER,
    author_playtime_at_review INTEGER,
    author_last_played INTEGER,
    language TEXT,
    review_text TEXT,
    timestamp_created INTEGER,
    timestamp_updated INTEGER,
    voted_up INTEGER,
    votes_up INTEGER,
    votes_funny INTEGER,
    weighted_vote_score REAL,
    comment_count INTEGER,
    steam_purchase INTEGER,
    received_for_free INTEGER,
    written_during_early_access INTEGER
);

CREATE INDEX IF NOT EXISTS idx_reviews_appid ON reviews(appid);
"#;

/// Tables reported by the `stats` command, in display order
pub const REPORTED_TABLES: &[&str] = &[
    "applications",
    "developers",
    "publishers",
    "genres",
    "categories",
    "application_developers",
    "application_publishers",
    "application_genres",
    "application_categories",
    "reviews",
];

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
