//! Database schema definitions

/// SQL to create all tables
/// NOTE: All prices/quantities stored as TEXT to preserve rust_decimal::Decimal precision
pub const CREATE_TABLES: &str = r#"
-- Users (single demo user in practice, but modeled explicitly)
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    email TEXT NOT NULL UNIQUE,
    created_at INTEGER DEFAULT (strftime('%s', 'now'))
);

-- Portfolios own purchase lots
CREATE TABLE IF NOT EXISTS portfolios (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id),
    name TEXT NOT NULL,
    created_at INTEGER DEFAULT (strftime('%s', 'now'))
);

-- Individual purchase lots (immutable once written, except delete)
CREATE TABLE IF NOT EXISTS lots (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    portfolio_id INTEGER NOT NULL REFERENCES portfolios(id) ON DELETE CASCADE,
    symbol TEXT NOT NULL,
    qty TEXT NOT NULL,
    cost_basis TEXT NOT NULL,
    fee TEXT NOT NULL DEFAULT '0',
    trade_date TEXT NOT NULL,
    created_at INTEGER DEFAULT (strftime('%s', 'now'))
);

-- Watchlists own ordered items
CREATE TABLE IF NOT EXISTS watchlists (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id),
    name TEXT NOT NULL,
    created_at INTEGER DEFAULT (strftime('%s', 'now'))
);

-- Watchlist items carry a display position, one row per symbol per list
CREATE TABLE IF NOT EXISTS watchlist_items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    watchlist_id INTEGER NOT NULL REFERENCES watchlists(id) ON DELETE CASCADE,
    symbol TEXT NOT NULL,
    asset_type TEXT NOT NULL,
    position INTEGER NOT NULL,
    UNIQUE(watchlist_id, symbol)
);

-- Price alerts, last_seen_price carries crossing state between evaluation ticks
CREATE TABLE IF NOT EXISTS alerts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id),
    symbol TEXT NOT NULL,
    rule_type TEXT NOT NULL DEFAULT 'price_cross',
    value TEXT NOT NULL,
    last_seen_price TEXT,
    is_active INTEGER NOT NULL DEFAULT 1,
    channel TEXT NOT NULL DEFAULT 'inapp',
    created_at INTEGER DEFAULT (strftime('%s', 'now'))
);

-- Append-only trigger log, one row per detected crossing
CREATE TABLE IF NOT EXISTS alert_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    alert_id INTEGER NOT NULL REFERENCES alerts(id) ON DELETE CASCADE,
    price TEXT NOT NULL,
    triggered_at INTEGER DEFAULT (strftime('%s', 'now'))
);

-- ========== INDEXES ==========

CREATE INDEX IF NOT EXISTS idx_lots_portfolio ON lots(portfolio_id);
CREATE INDEX IF NOT EXISTS idx_items_watchlist ON watchlist_items(watchlist_id, position);
CREATE INDEX IF NOT EXISTS idx_alerts_user_active ON alerts(user_id, is_active);
CREATE INDEX IF NOT EXISTS idx_events_alert ON alert_events(alert_id, triggered_at DESC)
"#;

/// ALTER TABLE migrations for columns added after the initial schema.
/// Each runs unconditionally; "duplicate column name" errors are tolerated.
pub const MIGRATIONS: &[&str] = &[
    "ALTER TABLE alerts ADD COLUMN channel TEXT NOT NULL DEFAULT 'inapp'",
    "ALTER TABLE lots ADD COLUMN fee TEXT NOT NULL DEFAULT '0'",
];
