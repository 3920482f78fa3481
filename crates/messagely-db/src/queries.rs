use crate::models::{MessageDetailRow, MessageRow, NewUser, ThreadRow, UserRow, UserSummaryRow};
use crate::{Database, now_timestamp};
use anyhow::Result;
use rusqlite::{Connection, Row};

impl Database {
    // -- Users --

    /// Insert a user. `join_at` and `last_login_at` both start at now.
    pub fn create_user(&self, user: &NewUser<'_>) -> Result<()> {
        let now = now_timestamp();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (username, password, first_name, last_name, phone, join_at, last_login_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                rusqlite::params![
                    user.username,
                    user.password_hash,
                    user.first_name,
                    user.last_name,
                    user.phone,
                    now,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_user(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, username))
    }

    pub fn list_users(&self) -> Result<Vec<UserSummaryRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT username, first_name, last_name, phone FROM users ORDER BY username",
            )?;
            let rows = stmt
                .query_map([], |row| summary_at(row, 0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Returns false if no such user exists.
    pub fn update_login_timestamp(&self, username: &str) -> Result<bool> {
        let now = now_timestamp();
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET last_login_at = ?2 WHERE username = ?1",
                (username, &now),
            )?;
            Ok(changed == 1)
        })
    }

    // -- Messages --

    /// Insert a message stamped with the current time and return the stored row.
    pub fn insert_message(
        &self,
        id: &str,
        from_username: &str,
        to_username: &str,
        body: &str,
    ) -> Result<MessageRow> {
        let sent_at = now_timestamp();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, from_username, to_username, body, sent_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, from_username, to_username, body, sent_at],
            )?;
            Ok(MessageRow {
                id: id.to_string(),
                from_username: from_username.to_string(),
                to_username: to_username.to_string(),
                body: body.to_string(),
                sent_at,
                read_at: None,
            })
        })
    }

    pub fn get_message(&self, id: &str) -> Result<Option<MessageDetailRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.id, m.body, m.sent_at, m.read_at,
                        f.username, f.first_name, f.last_name, f.phone,
                        t.username, t.first_name, t.last_name, t.phone
                 FROM messages m
                 JOIN users f ON m.from_username = f.username
                 JOIN users t ON m.to_username = t.username
                 WHERE m.id = ?1",
            )?;

            stmt.query_row([id], |row| {
                Ok(MessageDetailRow {
                    id: row.get(0)?,
                    body: row.get(1)?,
                    sent_at: row.get(2)?,
                    read_at: row.get(3)?,
                    from_user: summary_at(row, 4)?,
                    to_user: summary_at(row, 8)?,
                })
            })
            .optional()
        })
    }

    /// Messages addressed to `username`, oldest first, each joined with its sender.
    pub fn messages_to(&self, username: &str) -> Result<Vec<ThreadRow>> {
        self.with_conn(|conn| {
            query_thread(
                conn,
                "SELECT m.id, m.body, m.sent_at, m.read_at,
                        u.username, u.first_name, u.last_name, u.phone
                 FROM messages m
                 JOIN users u ON m.from_username = u.username
                 WHERE m.to_username = ?1
                 ORDER BY m.sent_at",
                username,
            )
        })
    }

    /// Messages sent by `username`, oldest first, each joined with its recipient.
    pub fn messages_from(&self, username: &str) -> Result<Vec<ThreadRow>> {
        self.with_conn(|conn| {
            query_thread(
                conn,
                "SELECT m.id, m.body, m.sent_at, m.read_at,
                        u.username, u.first_name, u.last_name, u.phone
                 FROM messages m
                 JOIN users u ON m.to_username = u.username
                 WHERE m.from_username = ?1
                 ORDER BY m.sent_at",
                username,
            )
        })
    }

    /// Stamp `read_at` if it is still unset and return the stored value.
    ///
    /// The update is conditional, so concurrent or repeated calls all observe
    /// the first write. Returns `None` if the message does not exist.
    pub fn mark_read(&self, id: &str) -> Result<Option<String>> {
        let now = now_timestamp();
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE messages SET read_at = ?2 WHERE id = ?1 AND read_at IS NULL",
                (id, &now),
            )?;

            let read_at: Option<Option<String>> = conn
                .query_row("SELECT read_at FROM messages WHERE id = ?1", [id], |row| row.get(0))
                .optional()?;

            Ok(read_at.flatten())
        })
    }
}

fn query_user(conn: &Connection, username: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(
        "SELECT username, password, first_name, last_name, phone, join_at, last_login_at
         FROM users WHERE username = ?1",
    )?;

    let row = stmt
        .query_row([username], |row| {
            Ok(UserRow {
                username: row.get(0)?,
                password: row.get(1)?,
                first_name: row.get(2)?,
                last_name: row.get(3)?,
                phone: row.get(4)?,
                join_at: row.get(5)?,
                last_login_at: row.get(6)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_thread(conn: &Connection, sql: &str, username: &str) -> Result<Vec<ThreadRow>> {
    let mut stmt = conn.prepare(sql)?;

    let rows = stmt
        .query_map([username], |row| {
            Ok(ThreadRow {
                id: row.get(0)?,
                body: row.get(1)?,
                sent_at: row.get(2)?,
                read_at: row.get(3)?,
                counterpart: summary_at(row, 4)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Read a `(username, first_name, last_name, phone)` run starting at column `start`.
fn summary_at(row: &Row<'_>, start: usize) -> rusqlite::Result<UserSummaryRow> {
    Ok(UserSummaryRow {
        username: row.get(start)?,
        first_name: row.get(start + 1)?,
        last_name: row.get(start + 2)?,
        phone: row.get(start + 3)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db_with_users(names: &[&str]) -> Database {
        let db = Database::open_in_memory().unwrap();
        for name in names {
            db.create_user(&NewUser {
                username: name,
                password_hash: "hash",
                first_name: "First",
                last_name: name,
                phone: "555-0100",
            })
            .unwrap();
        }
        db
    }

    fn new_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    #[test]
    fn create_and_get_user() {
        let db = db_with_users(&["alice"]);
        let user = db.get_user("alice").unwrap().unwrap();
        assert_eq!(user.username, "alice");
        assert_eq!(user.password, "hash");
        assert_eq!(user.join_at, user.last_login_at);
        assert!(db.get_user("nobody").unwrap().is_none());
    }

    #[test]
    fn duplicate_username_is_rejected() {
        let db = db_with_users(&["alice"]);
        let again = db.create_user(&NewUser {
            username: "alice",
            password_hash: "other",
            first_name: "A",
            last_name: "B",
            phone: "1",
        });
        assert!(again.is_err());
    }

    #[test]
    fn list_users_is_sorted_by_username() {
        let db = db_with_users(&["carol", "alice", "bob"]);
        let names: Vec<String> = db.list_users().unwrap().into_iter().map(|u| u.username).collect();
        assert_eq!(names, ["alice", "bob", "carol"]);
    }

    #[test]
    fn login_timestamp_moves_forward() {
        let db = db_with_users(&["alice"]);
        let before = db.get_user("alice").unwrap().unwrap().last_login_at;
        assert!(db.update_login_timestamp("alice").unwrap());
        let after = db.get_user("alice").unwrap().unwrap().last_login_at;
        assert!(after >= before);
        assert!(!db.update_login_timestamp("nobody").unwrap());
    }

    #[test]
    fn message_to_unknown_user_violates_foreign_key() {
        let db = db_with_users(&["alice"]);
        assert!(db.insert_message(&new_id(), "alice", "ghost", "hi").is_err());
        assert!(db.messages_from("alice").unwrap().is_empty());
    }

    #[test]
    fn threads_join_the_counterpart() {
        let db = db_with_users(&["alice", "bob"]);
        let first = db.insert_message(&new_id(), "alice", "bob", "one").unwrap();
        db.insert_message(&new_id(), "alice", "bob", "two").unwrap();
        db.insert_message(&new_id(), "bob", "alice", "reply").unwrap();

        let inbox = db.messages_to("bob").unwrap();
        assert_eq!(inbox.len(), 2);
        assert_eq!(inbox[0].id, first.id);
        assert!(inbox.iter().all(|m| m.counterpart.username == "alice"));

        let outbox = db.messages_from("bob").unwrap();
        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0].body, "reply");
        assert_eq!(outbox[0].counterpart.username, "alice");
    }

    #[test]
    fn get_message_expands_both_users() {
        let db = db_with_users(&["alice", "bob"]);
        let sent = db.insert_message(&new_id(), "alice", "bob", "hi").unwrap();

        let detail = db.get_message(&sent.id).unwrap().unwrap();
        assert_eq!(detail.body, "hi");
        assert_eq!(detail.sent_at, sent.sent_at);
        assert!(detail.read_at.is_none());
        assert_eq!(detail.from_user.username, "alice");
        assert_eq!(detail.to_user.username, "bob");

        assert!(db.get_message(&new_id()).unwrap().is_none());
    }

    #[test]
    fn mark_read_keeps_the_first_timestamp() {
        let db = db_with_users(&["alice", "bob"]);
        let sent = db.insert_message(&new_id(), "alice", "bob", "hi").unwrap();

        let first = db.mark_read(&sent.id).unwrap().unwrap();
        assert!(first >= sent.sent_at);

        let second = db.mark_read(&sent.id).unwrap().unwrap();
        assert_eq!(first, second);

        let detail = db.get_message(&sent.id).unwrap().unwrap();
        assert_eq!(detail.read_at.as_deref(), Some(first.as_str()));
    }

    #[test]
    fn mark_read_on_missing_message_is_none() {
        let db = db_with_users(&["alice"]);
        assert!(db.mark_read(&new_id()).unwrap().is_none());
    }
}
