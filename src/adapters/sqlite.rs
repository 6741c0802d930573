// SQLite 持久層：使用者、願望、捐款紀錄、靜態檔案與鏈上同步狀態。

use crate::domain::model::{
    BlockchainEvent, History, HistoryKind, StaticFile, User, Wish, WishStatus,
};
use crate::domain::ports::{
    BlockchainRepository, HistoryRepository, StaticFileRepository, UserRepository,
    WishRepository,
};
use crate::utils::error::{DonlyError, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

const LAST_BLOCK_KEY: &str = "last_processed_block";

const USER_COLUMNS: &str = "uuid, telegram_id, polygon_wallet, name, topics, banner, avatar, \
     background_color, background_image, button_background_color, button_text_color, \
     created_at, updated_at";

const WISH_COLUMNS: &str = "uuid, streamer_uuid, wish_url, name, description, image, \
     pol_target, pol_amount, is_priority, status, created_at, updated_at";

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS users (
        uuid                    TEXT PRIMARY KEY,
        telegram_id             TEXT NOT NULL UNIQUE,
        polygon_wallet          TEXT NOT NULL UNIQUE,
        name                    TEXT NOT NULL,
        topics                  TEXT NOT NULL,
        banner                  TEXT NOT NULL DEFAULT '',
        avatar                  TEXT NOT NULL DEFAULT '',
        background_color        TEXT,
        background_image        TEXT,
        button_background_color TEXT NOT NULL,
        button_text_color       TEXT NOT NULL,
        created_at              TEXT NOT NULL,
        updated_at              TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS wishes (
        uuid          TEXT PRIMARY KEY,
        streamer_uuid TEXT NOT NULL,
        wish_url      TEXT,
        name          TEXT NOT NULL,
        description   TEXT,
        image         TEXT NOT NULL,
        pol_target    REAL NOT NULL,
        pol_amount    REAL NOT NULL DEFAULT 0,
        is_priority   INTEGER NOT NULL DEFAULT 0,
        status        TEXT NOT NULL,
        created_at    TEXT NOT NULL,
        updated_at    TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_wishes_streamer_status ON wishes(streamer_uuid, status);

    CREATE TABLE IF NOT EXISTS history (
        id            TEXT PRIMARY KEY,
        streamer_uuid TEXT NOT NULL,
        type          TEXT NOT NULL,
        username      TEXT,
        datetime      TEXT NOT NULL,
        amount        REAL NOT NULL,
        wish_uuid     TEXT,
        message       TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_history_streamer_datetime ON history(streamer_uuid, datetime);

    CREATE TABLE IF NOT EXISTS static_files (
        id            TEXT PRIMARY KEY,
        type          TEXT NOT NULL,
        uploader_uuid TEXT NOT NULL,
        created_at    TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS blockchain_events (
        id           TEXT PRIMARY KEY,
        block_number INTEGER NOT NULL,
        tx_hash      TEXT NOT NULL,
        event_type   TEXT NOT NULL,
        user_uuid    TEXT NOT NULL,
        wish_uuid    TEXT NOT NULL,
        processed_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS sync_state (
        key   TEXT PRIMARY KEY,
        value INTEGER NOT NULL
    );
";

/// 單一連線加上 Mutex，所有 repository port 共用
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &str) -> Result<Self> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        info!("🗄️  Opening SQLite database at {}", path);
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        conn.execute_batch(SCHEMA)?;
        debug!("Database schema ready");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| DonlyError::internal("database connection mutex poisoned"))
    }

    #[cfg(test)]
    pub(crate) async fn get_events(&self, limit: u32) -> Result<Vec<BlockchainEvent>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, block_number, tx_hash, event_type, user_uuid, wish_uuid, processed_at
             FROM blockchain_events ORDER BY block_number DESC, id LIMIT ?1",
        )?;
        let events = stmt
            .query_map(params![limit], |row| {
                Ok(BlockchainEvent {
                    id: row.get(0)?,
                    block_number: block_from_sql(row.get(1)?).map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(1, Type::Integer, Box::new(e))
                    })?,
                    tx_hash: row.get(2)?,
                    event_type: row.get(3)?,
                    user_uuid: row.get(4)?,
                    wish_uuid: row.get(5)?,
                    processed_at: parse_ts(row, 6)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(events)
    }
}

/// SQLite 只有 i64，超出範圍的區塊號碼回傳錯誤而不是截斷
fn block_to_sql(block: u64) -> Result<i64> {
    i64::try_from(block)
        .map_err(|_| DonlyError::storage(format!("block number {} exceeds SQLite range", block)))
}

fn block_from_sql(value: i64) -> std::result::Result<u64, std::num::TryFromIntError> {
    u64::try_from(value)
}

fn format_ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn parse_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn parse_enum<T: FromStr<Err = DonlyError>>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_error(idx, e))
}

fn unique_violation(err: rusqlite::Error, entity: &'static str) -> DonlyError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation => {
            DonlyError::AlreadyExists { entity }
        }
        _ => err.into(),
    }
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    let topics_raw: String = row.get(4)?;
    let topics = serde_json::from_str(&topics_raw).map_err(|e| conversion_error(4, e))?;
    Ok(User {
        uuid: row.get(0)?,
        telegram_id: row.get(1)?,
        polygon_wallet: row.get(2)?,
        name: row.get(3)?,
        topics,
        banner: row.get(5)?,
        avatar: row.get(6)?,
        background_color: row.get(7)?,
        background_image: row.get(8)?,
        button_background_color: row.get(9)?,
        button_text_color: row.get(10)?,
        created_at: parse_ts(row, 11)?,
        updated_at: parse_ts(row, 12)?,
    })
}

fn wish_from_row(row: &Row<'_>) -> rusqlite::Result<Wish> {
    Ok(Wish {
        uuid: row.get(0)?,
        streamer_uuid: row.get(1)?,
        wish_url: row.get(2)?,
        name: row.get(3)?,
        description: row.get(4)?,
        image: row.get(5)?,
        pol_target: row.get(6)?,
        pol_amount: row.get(7)?,
        is_priority: row.get(8)?,
        status: parse_enum(row, 9)?,
        created_at: parse_ts(row, 10)?,
        updated_at: parse_ts(row, 11)?,
    })
}

#[async_trait]
impl UserRepository for SqliteStore {
    async fn create_user(&self, user: &User) -> Result<()> {
        let topics = serde_json::to_string(&user.topics)?;
        let conn = self.conn()?;
        conn.execute(
            &format!(
                "INSERT INTO users ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                USER_COLUMNS
            ),
            params![
                user.uuid,
                user.telegram_id,
                user.polygon_wallet,
                user.name,
                topics,
                user.banner,
                user.avatar,
                user.background_color,
                user.background_image,
                user.button_background_color,
                user.button_text_color,
                format_ts(&user.created_at),
                format_ts(&user.updated_at),
            ],
        )
        .map_err(|e| unique_violation(e, "user"))?;
        Ok(())
    }

    async fn get_user_by_uuid(&self, uuid: &str) -> Result<Option<User>> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE uuid = ?1", USER_COLUMNS),
                params![uuid],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    async fn get_user_by_telegram_id(&self, telegram_id: &str) -> Result<Option<User>> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE telegram_id = ?1", USER_COLUMNS),
                params![telegram_id],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    async fn update_user(&self, user: &User) -> Result<()> {
        let topics = serde_json::to_string(&user.topics)?;
        let conn = self.conn()?;
        let changed = conn
            .execute(
                "UPDATE users SET name = ?2, topics = ?3, banner = ?4, avatar = ?5,
                     background_color = ?6, background_image = ?7,
                     button_background_color = ?8, button_text_color = ?9, updated_at = ?10
                 WHERE uuid = ?1",
                params![
                    user.uuid,
                    user.name,
                    topics,
                    user.banner,
                    user.avatar,
                    user.background_color,
                    user.background_image,
                    user.button_background_color,
                    user.button_text_color,
                    format_ts(&user.updated_at),
                ],
            )
            .map_err(|e| unique_violation(e, "user"))?;
        if changed == 0 {
            return Err(DonlyError::NotFound { entity: "user" });
        }
        Ok(())
    }
}

#[async_trait]
impl WishRepository for SqliteStore {
    async fn create_wish(&self, wish: &Wish) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            &format!(
                "INSERT INTO wishes ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                WISH_COLUMNS
            ),
            params![
                wish.uuid,
                wish.streamer_uuid,
                wish.wish_url,
                wish.name,
                wish.description,
                wish.image,
                wish.pol_target,
                wish.pol_amount,
                wish.is_priority,
                wish.status.as_str(),
                format_ts(&wish.created_at),
                format_ts(&wish.updated_at),
            ],
        )
        .map_err(|e| unique_violation(e, "wish"))?;
        Ok(())
    }

    async fn get_wish(&self, uuid: &str) -> Result<Option<Wish>> {
        let conn = self.conn()?;
        let wish = conn
            .query_row(
                &format!("SELECT {} FROM wishes WHERE uuid = ?1", WISH_COLUMNS),
                params![uuid],
                wish_from_row,
            )
            .optional()?;
        Ok(wish)
    }

    async fn get_wishes_by_status(
        &self,
        streamer_uuid: &str,
        status: WishStatus,
    ) -> Result<Vec<Wish>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM wishes WHERE streamer_uuid = ?1 AND status = ?2
             ORDER BY is_priority DESC, created_at DESC",
            WISH_COLUMNS
        ))?;
        let wishes = stmt
            .query_map(params![streamer_uuid, status.as_str()], wish_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(wishes)
    }

    async fn update_wish(&self, wish: &Wish) -> Result<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE wishes SET wish_url = ?2, name = ?3, description = ?4, image = ?5,
                 pol_target = ?6, pol_amount = ?7, is_priority = ?8, status = ?9, updated_at = ?10
             WHERE uuid = ?1",
            params![
                wish.uuid,
                wish.wish_url,
                wish.name,
                wish.description,
                wish.image,
                wish.pol_target,
                wish.pol_amount,
                wish.is_priority,
                wish.status.as_str(),
                format_ts(&wish.updated_at),
            ],
        )?;
        if changed == 0 {
            return Err(DonlyError::NotFound { entity: "wish" });
        }
        Ok(())
    }

    async fn transition_status(
        &self,
        uuid: &str,
        from: WishStatus,
        to: WishStatus,
    ) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE wishes SET status = ?3, updated_at = ?4 WHERE uuid = ?1 AND status = ?2",
            params![uuid, from.as_str(), to.as_str(), format_ts(&Utc::now())],
        )?;
        Ok(changed == 1)
    }

    async fn add_pol_amount(&self, uuid: &str, amount: f64) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE wishes SET pol_amount = pol_amount + ?2, updated_at = ?3
             WHERE uuid = ?1 AND status = 'active'",
            params![uuid, amount, format_ts(&Utc::now())],
        )?;
        Ok(changed == 1)
    }
}

#[async_trait]
impl HistoryRepository for SqliteStore {
    async fn add_history(&self, history: &History) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO history (id, streamer_uuid, type, username, datetime, amount, wish_uuid, message)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                history.id,
                history.streamer_uuid,
                history.kind.as_str(),
                history.username,
                format_ts(&history.datetime),
                history.amount,
                history.wish_uuid,
                history.message,
            ],
        )
        .map_err(|e| unique_violation(e, "history"))?;
        Ok(())
    }

    async fn get_history(
        &self,
        streamer_uuid: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<History>> {
        let offset = i64::from(page.saturating_sub(1)) * i64::from(page_size);
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, streamer_uuid, type, username, datetime, amount, wish_uuid, message
             FROM history WHERE streamer_uuid = ?1
             ORDER BY datetime DESC LIMIT ?2 OFFSET ?3",
        )?;
        let rows = stmt
            .query_map(params![streamer_uuid, page_size, offset], |row| {
                Ok(History {
                    id: row.get(0)?,
                    streamer_uuid: row.get(1)?,
                    kind: parse_enum::<HistoryKind>(row, 2)?,
                    username: row.get(3)?,
                    datetime: parse_ts(row, 4)?,
                    amount: row.get(5)?,
                    wish_uuid: row.get(6)?,
                    message: row.get(7)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

#[async_trait]
impl StaticFileRepository for SqliteStore {
    async fn save_file(&self, file: &StaticFile) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO static_files (id, type, uploader_uuid, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                file.id,
                file.kind.as_str(),
                file.uploader_uuid,
                format_ts(&file.created_at)
            ],
        )
        .map_err(|e| unique_violation(e, "static file"))?;
        Ok(())
    }

    async fn get_file(&self, id: &str) -> Result<Option<StaticFile>> {
        let conn = self.conn()?;
        let file = conn
            .query_row(
                "SELECT id, type, uploader_uuid, created_at FROM static_files WHERE id = ?1",
                params![id],
                |row| {
                    Ok(StaticFile {
                        id: row.get(0)?,
                        kind: parse_enum(row, 1)?,
                        uploader_uuid: row.get(2)?,
                        created_at: parse_ts(row, 3)?,
                    })
                },
            )
            .optional()?;
        Ok(file)
    }
}

#[async_trait]
impl BlockchainRepository for SqliteStore {
    async fn get_last_processed_block(&self) -> Result<Option<u64>> {
        let conn = self.conn()?;
        let value: Option<i64> = conn
            .query_row(
                "SELECT value FROM sync_state WHERE key = ?1",
                params![LAST_BLOCK_KEY],
                |row| row.get(0),
            )
            .optional()?;
        value
            .map(|v| {
                block_from_sql(v).map_err(|_| {
                    DonlyError::storage(format!("stored block number {} is negative", v))
                })
            })
            .transpose()
    }

    async fn save_last_processed_block(&self, block: u64) -> Result<()> {
        let block = block_to_sql(block)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sync_state (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![LAST_BLOCK_KEY, block],
        )?;
        Ok(())
    }

    async fn save_event(&self, event: &BlockchainEvent) -> Result<bool> {
        let block = block_to_sql(event.block_number)?;
        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO blockchain_events
                 (id, block_number, tx_hash, event_type, user_uuid, wish_uuid, processed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                event.id,
                block,
                event.tx_hash,
                event.event_type,
                event.user_uuid,
                event.wish_uuid,
                format_ts(&event.processed_at),
            ],
        )?;
        Ok(inserted == 1)
    }

    async fn has_event(&self, id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let found = conn
            .query_row(
                "SELECT 1 FROM blockchain_events WHERE id = ?1",
                params![id],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }
}
