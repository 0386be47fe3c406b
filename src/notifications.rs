use chrono::Utc;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::ServiceError;
use crate::schema::notifications;
use crate::utils::logs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Like,
    Comment,
    Alert,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = notifications)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: i64,
    pub recipient_id: String,
    pub actor_id: Option<String>,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub post_id: Option<i64>,
    pub comment_id: Option<i64>,
    pub alert_id: Option<i64>,
    pub image_url: Option<String>,
    pub is_read: bool,
    pub created_at: i64,
}

/// A notification that has been decided on but not yet written. Produced
/// inside counter transactions and delivered only after they commit.
#[derive(Debug, Clone)]
pub struct NotificationDraft {
    pub recipient_id: String,
    pub actor_id: Option<String>,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub post_id: Option<i64>,
    pub comment_id: Option<i64>,
    pub alert_id: Option<i64>,
    pub image_url: Option<String>,
}

pub fn create(
    conn: &mut SqliteConnection,
    draft: &NotificationDraft,
) -> Result<Notification, ServiceError> {
    let now = Utc::now().timestamp();
    diesel::insert_into(notifications::table)
        .values((
            notifications::recipient_id.eq(&draft.recipient_id),
            notifications::actor_id.eq(draft.actor_id.as_deref()),
            notifications::kind.eq(draft.kind.to_string()),
            notifications::title.eq(&draft.title),
            notifications::message.eq(&draft.message),
            notifications::post_id.eq(draft.post_id),
            notifications::comment_id.eq(draft.comment_id),
            notifications::alert_id.eq(draft.alert_id),
            notifications::image_url.eq(draft.image_url.as_deref()),
            notifications::is_read.eq(false),
            notifications::created_at.eq(now),
        ))
        .returning(Notification::as_returning())
        .get_result(conn)
        .map_err(ServiceError::from)
}

/// Delivery failure must not roll back the action that triggered it.
pub fn deliver_best_effort(conn: &mut SqliteConnection, draft: &NotificationDraft) {
    if let Err(err) = create(conn, draft) {
        logs::log_notify_failed(&draft.recipient_id, &err.to_string());
    }
}

pub fn list(
    conn: &mut SqliteConnection,
    recipient: &str,
    unread_only: bool,
) -> Result<Vec<Notification>, ServiceError> {
    let mut query = notifications::table
        .filter(notifications::recipient_id.eq(recipient))
        .into_boxed();
    if unread_only {
        query = query.filter(notifications::is_read.eq(false));
    }
    query
        .order(notifications::created_at.desc())
        .then_order_by(notifications::id.desc())
        .load(conn)
        .map_err(ServiceError::from)
}

#[derive(Debug, Serialize)]
pub struct NotificationCount {
    pub total: i64,
    pub unread: i64,
}

pub fn counts(
    conn: &mut SqliteConnection,
    recipient: &str,
) -> Result<NotificationCount, ServiceError> {
    let total: i64 = notifications::table
        .filter(notifications::recipient_id.eq(recipient))
        .count()
        .get_result(conn)?;
    let unread: i64 = notifications::table
        .filter(notifications::recipient_id.eq(recipient))
        .filter(notifications::is_read.eq(false))
        .count()
        .get_result(conn)?;
    Ok(NotificationCount { total, unread })
}

pub fn mark_read(
    conn: &mut SqliteConnection,
    recipient: &str,
    notification_id: i64,
) -> Result<Notification, ServiceError> {
    let updated = diesel::update(
        notifications::table
            .find(notification_id)
            .filter(notifications::recipient_id.eq(recipient)),
    )
    .set(notifications::is_read.eq(true))
    .execute(conn)?;

    if updated == 0 {
        return Err(ServiceError::NotFound("notification"));
    }
    notifications::table
        .find(notification_id)
        .first(conn)
        .map_err(ServiceError::from)
}

pub fn mark_all_read(
    conn: &mut SqliteConnection,
    recipient: &str,
) -> Result<usize, ServiceError> {
    diesel::update(
        notifications::table
            .filter(notifications::recipient_id.eq(recipient))
            .filter(notifications::is_read.eq(false)),
    )
    .set(notifications::is_read.eq(true))
    .execute(conn)
    .map_err(ServiceError::from)
}

pub fn delete(
    conn: &mut SqliteConnection,
    recipient: &str,
    notification_id: i64,
) -> Result<(), ServiceError> {
    let deleted = diesel::delete(
        notifications::table
            .find(notification_id)
            .filter(notifications::recipient_id.eq(recipient)),
    )
    .execute(conn)?;

    if deleted == 0 {
        return Err(ServiceError::NotFound("notification"));
    }
    Ok(())
}
