// Store module: a small CRUD gateway over the `users` table. Queries
// are assembled from program-constant identifiers only; every value an
// operator ever types is bound as a parameter, never spliced into SQL.
//
// The gateway runs on sqlx's Any driver so the same pool type serves
// MySQL in production and sqlite::memory: in tests. The console itself
// is synchronous, so the store owns a current-thread tokio runtime and
// drives each statement to completion before returning.

use anyhow::{Context, Result};
use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::{AnyPool, Row};
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::debug;

/// The one table this console manages.
const USERS_TABLE: &str = "users";

/// Columns the console reads back. `upwd` is write-only and never
/// appears in a SELECT list.
const USER_COLUMNS: [&str; 4] = ["uname", "max_limit", "is_admin", "is_disabled"];

/// One row of the `users` table as the console sees it. Never cached
/// beyond a single handler invocation; mutating handlers re-fetch
/// before they write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub uname: String,
    pub max_limit: i64,
    pub is_admin: bool,
    pub is_disabled: bool,
}

impl User {
    /// Decode a row, tolerating integer-encoded booleans (SQLite stores
    /// booleans as integers, MySQL as tinyint).
    fn from_row(row: &AnyRow) -> Result<User> {
        Ok(User {
            uname: row.try_get("uname")?,
            max_limit: get_i64(row, "max_limit")?,
            is_admin: get_bool(row, "is_admin")?,
            is_disabled: get_bool(row, "is_disabled")?,
        })
    }
}

fn get_bool(row: &AnyRow, column: &str) -> Result<bool> {
    let value = row
        .try_get::<bool, _>(column)
        .or_else(|_| row.try_get::<i32, _>(column).map(|v| v != 0))
        .or_else(|_| row.try_get::<i64, _>(column).map(|v| v != 0))?;
    Ok(value)
}

fn get_i64(row: &AnyRow, column: &str) -> Result<i64> {
    let value = row
        .try_get::<i64, _>(column)
        .or_else(|_| row.try_get::<i32, _>(column).map(i64::from))?;
    Ok(value)
}

/// A value bound into a statement. `Flag` is bound as an integer so
/// MySQL tinyint(1) and SQLite integer columns both accept it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    Text(String),
    Int(i64),
    Flag(bool),
}

type AnyQuery<'q> = sqlx::query::Query<'q, sqlx::Any, sqlx::any::AnyArguments<'q>>;

fn bind_value<'q>(query: AnyQuery<'q>, value: &'q SqlValue) -> AnyQuery<'q> {
    match value {
        SqlValue::Text(text) => query.bind(text.as_str()),
        SqlValue::Int(number) => query.bind(*number),
        SqlValue::Flag(flag) => query.bind(*flag as i32),
    }
}

/// Gateway over the users database.
///
/// The pool holds a single connection, matching the console's "one
/// logical unit of work at a time" model: each statement acquires the
/// connection and returns it unconditionally when the statement
/// completes, whether it succeeded or failed. Dropping the store tears
/// the connection down.
pub struct Store {
    rt: Runtime,
    pool: AnyPool,
}

impl Store {
    /// Connect to the database named by `database_url` (any URL the
    /// sqlx Any driver understands).
    pub fn connect(database_url: &str) -> Result<Store> {
        sqlx::any::install_default_drivers();
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("failed to start the database runtime")?;
        let pool = rt
            .block_on(
                AnyPoolOptions::new()
                    .min_connections(1)
                    .max_connections(1)
                    .acquire_timeout(Duration::from_secs(10))
                    .connect(database_url),
            )
            .context("failed to connect to the users database")?;
        Ok(Store { rt, pool })
    }

    /// `SELECT columns FROM table [WHERE column = ?] [LIMIT n]`.
    ///
    /// `limit == 0` returns every matching row, `1` at most one, any
    /// larger value at most that many.
    pub fn select(
        &self,
        table: &str,
        columns: &[&str],
        filter: Option<(&str, SqlValue)>,
        limit: u32,
    ) -> Result<Vec<AnyRow>> {
        let mut sql = format!("SELECT {} FROM {}", columns.join(", "), table);
        if let Some((column, _)) = &filter {
            sql.push_str(&format!(" WHERE {column} = ?"));
        }
        if limit > 0 {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        debug!(sql = %sql, "select");
        let rows: std::result::Result<_, sqlx::Error> = self.rt.block_on(async {
            let mut query: AnyQuery = sqlx::query(&sql);
            if let Some((_, value)) = &filter {
                query = bind_value(query, value);
            }
            query.fetch_all(&self.pool).await
        });
        rows.with_context(|| format!("failed to read from {table}"))
    }

    /// `INSERT INTO table (…) VALUES (…)`, committed on success.
    pub fn insert(&self, table: &str, fields: &[(&str, SqlValue)]) -> Result<()> {
        let columns: Vec<&str> = fields.iter().map(|(column, _)| *column).collect();
        let placeholders = vec!["?"; fields.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            columns.join(", "),
            placeholders
        );
        debug!(sql = %sql, "insert");
        self.execute(&sql, fields.iter().map(|(_, value)| value))
            .with_context(|| format!("failed to insert into {table}"))
    }

    /// `UPDATE table SET … WHERE column = ?`, committed on success.
    pub fn update(
        &self,
        table: &str,
        set: &[(&str, SqlValue)],
        filter: (&str, SqlValue),
    ) -> Result<()> {
        let assignments: Vec<String> = set
            .iter()
            .map(|(column, _)| format!("{column} = ?"))
            .collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?",
            table,
            assignments.join(", "),
            filter.0
        );
        debug!(sql = %sql, "update");
        let values = set.iter().map(|(_, value)| value).chain([&filter.1]);
        self.execute(&sql, values)
            .with_context(|| format!("failed to update {table}"))
    }

    /// `DELETE FROM table WHERE column = ?`, committed on success.
    pub fn delete(&self, table: &str, filter: (&str, SqlValue)) -> Result<()> {
        let sql = format!("DELETE FROM {} WHERE {} = ?", table, filter.0);
        debug!(sql = %sql, "delete");
        self.execute(&sql, [&filter.1])
            .with_context(|| format!("failed to delete from {table}"))
    }

    /// Run one mutating statement inside its own transaction. A fault
    /// rolls the transaction back when it drops; success commits.
    fn execute<'a>(
        &'a self,
        sql: &'a str,
        values: impl IntoIterator<Item = &'a SqlValue>,
    ) -> std::result::Result<(), sqlx::Error> {
        self.rt.block_on(async {
            let mut tx = self.pool.begin().await?;
            let mut query: AnyQuery = sqlx::query(sql);
            for value in values {
                query = bind_value(query, value);
            }
            query.execute(&mut *tx).await?;
            tx.commit().await
        })
    }

    // Typed helpers over the primitives, all on the users table.

    /// All users, or just those whose account matches `filter`.
    pub fn list_users(&self, filter: Option<&str>) -> Result<Vec<User>> {
        let filter = filter.map(|uname| ("uname", SqlValue::Text(uname.to_string())));
        let rows = self.select(USERS_TABLE, &USER_COLUMNS, filter, 0)?;
        rows.iter().map(User::from_row).collect()
    }

    /// The user with this account, if any.
    pub fn find_user(&self, uname: &str) -> Result<Option<User>> {
        let filter = Some(("uname", SqlValue::Text(uname.to_string())));
        let rows = self.select(USERS_TABLE, &USER_COLUMNS, filter, 1)?;
        rows.first().map(User::from_row).transpose()
    }

    pub fn set_admin(&self, uname: &str, is_admin: bool) -> Result<()> {
        self.update(
            USERS_TABLE,
            &[("is_admin", SqlValue::Flag(is_admin))],
            ("uname", SqlValue::Text(uname.to_string())),
        )
    }

    pub fn set_disabled(&self, uname: &str, is_disabled: bool) -> Result<()> {
        self.update(
            USERS_TABLE,
            &[("is_disabled", SqlValue::Flag(is_disabled))],
            ("uname", SqlValue::Text(uname.to_string())),
        )
    }

    pub fn set_limit(&self, uname: &str, max_limit: i64) -> Result<()> {
        self.update(
            USERS_TABLE,
            &[("max_limit", SqlValue::Int(max_limit))],
            ("uname", SqlValue::Text(uname.to_string())),
        )
    }

    pub fn rename(&self, uname: &str, new_uname: &str) -> Result<()> {
        self.update(
            USERS_TABLE,
            &[("uname", SqlValue::Text(new_uname.to_string()))],
            ("uname", SqlValue::Text(uname.to_string())),
        )
    }

    pub fn delete_user(&self, uname: &str) -> Result<()> {
        self.delete(USERS_TABLE, ("uname", SqlValue::Text(uname.to_string())))
    }
}

#[cfg(test)]
impl Store {
    /// In-memory store with the users schema in place, for tests here
    /// and in the UI handler tests.
    pub(crate) fn in_memory() -> Store {
        let store = Store::connect("sqlite::memory:").expect("in-memory store");
        let schema = r#"
            CREATE TABLE users (
                uname TEXT NOT NULL UNIQUE,
                upwd TEXT NOT NULL DEFAULT '',
                max_limit INTEGER NOT NULL DEFAULT 0,
                is_admin INTEGER NOT NULL DEFAULT 0,
                is_disabled INTEGER NOT NULL DEFAULT 0
            )
        "#;
        store
            .rt
            .block_on(sqlx::query(schema).execute(&store.pool))
            .expect("create schema");
        store
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mem_store() -> Store {
        Store::in_memory()
    }

    fn seed(store: &Store, uname: &str, max_limit: i64, is_admin: bool, is_disabled: bool) {
        store
            .insert(
                USERS_TABLE,
                &[
                    ("uname", SqlValue::Text(uname.to_string())),
                    ("upwd", SqlValue::Text("secret".to_string())),
                    ("max_limit", SqlValue::Int(max_limit)),
                    ("is_admin", SqlValue::Flag(is_admin)),
                    ("is_disabled", SqlValue::Flag(is_disabled)),
                ],
            )
            .expect("seed user");
    }

    #[test]
    fn empty_filter_returns_every_row() {
        let store = mem_store();
        seed(&store, "alice", 5, false, false);
        seed(&store, "bob", 3, true, false);
        seed(&store, "carol", 0, false, true);

        let users = store.list_users(None).unwrap();
        assert_eq!(users.len(), 3);

        let filtered = store.list_users(Some("bob")).unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].uname, "bob");
        assert!(filtered[0].is_admin);
    }

    #[test]
    fn find_user_misses_cleanly() {
        let store = mem_store();
        seed(&store, "alice", 5, false, false);
        assert!(store.find_user("nobody").unwrap().is_none());
        assert!(store.find_user("alice").unwrap().is_some());
    }

    #[test]
    fn select_limit_semantics() {
        let store = mem_store();
        for name in ["a", "b", "c", "d"] {
            seed(&store, name, 1, false, false);
        }
        let all = store.select(USERS_TABLE, &USER_COLUMNS, None, 0).unwrap();
        assert_eq!(all.len(), 4);
        let one = store.select(USERS_TABLE, &USER_COLUMNS, None, 1).unwrap();
        assert_eq!(one.len(), 1);
        let two = store.select(USERS_TABLE, &USER_COLUMNS, None, 2).unwrap();
        assert_eq!(two.len(), 2);
    }

    #[test]
    fn ban_toggles_back_to_the_original_state() {
        let store = mem_store();
        seed(&store, "alice", 5, false, false);

        let before = store.find_user("alice").unwrap().unwrap();
        store.set_disabled("alice", !before.is_disabled).unwrap();
        let banned = store.find_user("alice").unwrap().unwrap();
        assert!(banned.is_disabled);

        store.set_disabled("alice", !banned.is_disabled).unwrap();
        let after = store.find_user("alice").unwrap().unwrap();
        assert_eq!(after, before);
    }

    #[test]
    fn promote_flips_only_the_admin_flag() {
        let store = mem_store();
        seed(&store, "alice", 5, false, false);

        store.set_admin("alice", true).unwrap();
        let user = store.find_user("alice").unwrap().unwrap();
        assert!(user.is_admin);
        assert_eq!(user.max_limit, 5);
        assert!(!user.is_disabled);
    }

    #[test]
    fn change_limit_leaves_other_fields_alone() {
        let store = mem_store();
        seed(&store, "alice", 5, false, false);

        store.set_limit("alice", 10).unwrap();
        let user = store.find_user("alice").unwrap().unwrap();
        assert_eq!(
            user,
            User {
                uname: "alice".to_string(),
                max_limit: 10,
                is_admin: false,
                is_disabled: false,
            }
        );
    }

    #[test]
    fn rename_moves_the_row() {
        let store = mem_store();
        seed(&store, "alice", 5, false, false);

        store.rename("alice", "alicia").unwrap();
        assert!(store.find_user("alice").unwrap().is_none());
        let user = store.find_user("alicia").unwrap().unwrap();
        assert_eq!(user.max_limit, 5);
    }

    #[test]
    fn delete_removes_exactly_one_account() {
        let store = mem_store();
        seed(&store, "alice", 5, false, false);
        seed(&store, "bob", 3, false, false);

        store.delete_user("alice").unwrap();
        assert!(store.find_user("alice").unwrap().is_none());
        assert_eq!(store.list_users(None).unwrap().len(), 1);
    }

    #[test]
    fn faults_surface_as_errors_not_panics() {
        let store = mem_store();
        // Unique constraint violation rolls back and reports.
        seed(&store, "alice", 5, false, false);
        let duplicate = store.insert(
            USERS_TABLE,
            &[("uname", SqlValue::Text("alice".to_string()))],
        );
        assert!(duplicate.is_err());
        // The store keeps working afterwards.
        assert_eq!(store.list_users(None).unwrap().len(), 1);
    }
}
