//! Row-to-model conversions shared by the user and message handlers.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use messagely_db::models::{MessageDetailRow, MessageRow, ThreadRow, UserRow, UserSummaryRow};
use messagely_types::models::{
    InboxMessage, MessageDetail, OutboxMessage, SentMessage, User, UserSummary,
};

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // SQLite's datetime('now') format, no timezone. Treat as UTC.
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .with_context(|| format!("corrupt timestamp '{}'", raw))
}

fn parse_optional(raw: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    raw.map(parse_timestamp).transpose()
}

fn parse_id(raw: &str) -> Result<Uuid> {
    raw.parse::<Uuid>().with_context(|| format!("corrupt message id '{}'", raw))
}

pub fn summary(row: UserSummaryRow) -> UserSummary {
    UserSummary {
        username: row.username,
        first_name: row.first_name,
        last_name: row.last_name,
        phone: row.phone,
    }
}

pub fn user(row: UserRow) -> Result<User> {
    Ok(User {
        join_at: parse_timestamp(&row.join_at)?,
        last_login_at: parse_timestamp(&row.last_login_at)?,
        username: row.username,
        first_name: row.first_name,
        last_name: row.last_name,
        phone: row.phone,
    })
}

pub fn inbox_message(row: ThreadRow) -> Result<InboxMessage> {
    Ok(InboxMessage {
        id: parse_id(&row.id)?,
        sent_at: parse_timestamp(&row.sent_at)?,
        read_at: parse_optional(row.read_at.as_deref())?,
        body: row.body,
        from_user: summary(row.counterpart),
    })
}

pub fn outbox_message(row: ThreadRow) -> Result<OutboxMessage> {
    Ok(OutboxMessage {
        id: parse_id(&row.id)?,
        sent_at: parse_timestamp(&row.sent_at)?,
        read_at: parse_optional(row.read_at.as_deref())?,
        body: row.body,
        to_user: summary(row.counterpart),
    })
}

pub fn message_detail(row: MessageDetailRow) -> Result<MessageDetail> {
    Ok(MessageDetail {
        id: parse_id(&row.id)?,
        sent_at: parse_timestamp(&row.sent_at)?,
        read_at: parse_optional(row.read_at.as_deref())?,
        body: row.body,
        from_user: summary(row.from_user),
        to_user: summary(row.to_user),
    })
}

pub fn sent_message(row: MessageRow) -> Result<SentMessage> {
    Ok(SentMessage {
        id: parse_id(&row.id)?,
        sent_at: parse_timestamp(&row.sent_at)?,
        from_username: row.from_username,
        to_username: row.to_username,
        body: row.body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rfc3339_and_sqlite_formats() {
        let a = parse_timestamp("2024-03-01T12:30:00.000000Z").unwrap();
        let b = parse_timestamp("2024-03-01 12:30:00").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_garbage_timestamps() {
        assert!(parse_timestamp("yesterday").is_err());
    }
}
