use chrono::Utc;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use strum::{Display, EnumString};
use tokio::task::JoinSet;

use crate::auth::Identity;
use crate::db::{self, DbPool};
use crate::error::ServiceError;
use crate::fields::{self, Field};
use crate::notifications::{self, NotificationDraft, NotificationKind};
use crate::schema::outbreak_alerts;
use crate::settings::settings;
use crate::utils::logs;

pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// Great-circle distance on a spherical earth. Good to ~0.5% at field
/// scale; not meant for antipodal points or sub-meter work.
pub fn distance_meters(a: GeoPoint, b: GeoPoint) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + (d_lon / 2.0).sin().powi(2) * lat1.cos() * lat2.cos();
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_METERS * c
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

pub const STATUS_ACTIVE: &str = "active";

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = outbreak_alerts)]
#[serde(rename_all = "camelCase")]
pub struct OutbreakAlert {
    pub id: i64,
    pub creator_id: String,
    pub creator_name: String,
    pub field_id: Option<i64>,
    pub title: String,
    pub description: String,
    pub severity: String,
    pub radius_meters: f64,
    pub center_lat: f64,
    pub center_lon: f64,
    pub status: String,
    pub created_at: i64,
}

impl OutbreakAlert {
    pub fn center(&self) -> GeoPoint {
        GeoPoint {
            latitude: self.center_lat,
            longitude: self.center_lon,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == STATUS_ACTIVE
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAlertInput {
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub radius_meters: f64,
    pub center: GeoPoint,
    pub field_id: Option<i64>,
}

/// Alerts are immutable once created; creation is what triggers the
/// one-time notification sweep.
pub fn create_alert(
    conn: &mut SqliteConnection,
    creator: &Identity,
    input: NewAlertInput,
) -> Result<OutbreakAlert, ServiceError> {
    let title = input.title.trim().to_string();
    if title.is_empty() {
        return Err(ServiceError::Invalid("alert title must not be empty".into()));
    }
    let geofence = &settings().geofence;
    if !input.radius_meters.is_finite()
        || input.radius_meters < geofence.min_radius_meters
        || input.radius_meters > geofence.max_radius_meters
    {
        return Err(ServiceError::Invalid(format!(
            "radius must be between {} and {} meters",
            geofence.min_radius_meters, geofence.max_radius_meters
        )));
    }
    if !(-90.0..=90.0).contains(&input.center.latitude)
        || !(-180.0..=180.0).contains(&input.center.longitude)
    {
        return Err(ServiceError::Invalid("center out of range".into()));
    }

    let now = Utc::now().timestamp();
    diesel::insert_into(outbreak_alerts::table)
        .values((
            outbreak_alerts::creator_id.eq(&creator.user_id),
            outbreak_alerts::creator_name.eq(&creator.name),
            outbreak_alerts::field_id.eq(input.field_id),
            outbreak_alerts::title.eq(&title),
            outbreak_alerts::description.eq(&input.description),
            outbreak_alerts::severity.eq(input.severity.to_string()),
            outbreak_alerts::radius_meters.eq(input.radius_meters),
            outbreak_alerts::center_lat.eq(input.center.latitude),
            outbreak_alerts::center_lon.eq(input.center.longitude),
            outbreak_alerts::status.eq(STATUS_ACTIVE),
            outbreak_alerts::created_at.eq(now),
        ))
        .returning(OutbreakAlert::as_returning())
        .get_result(conn)
        .map_err(ServiceError::from)
}

pub fn list_alerts(conn: &mut SqliteConnection) -> Result<Vec<OutbreakAlert>, ServiceError> {
    outbreak_alerts::table
        .order(outbreak_alerts::created_at.desc())
        .then_order_by(outbreak_alerts::id.desc())
        .load(conn)
        .map_err(ServiceError::from)
}

pub fn get_alert(
    conn: &mut SqliteConnection,
    alert_id: i64,
) -> Result<OutbreakAlert, ServiceError> {
    outbreak_alerts::table
        .find(alert_id)
        .first(conn)
        .optional()?
        .ok_or(ServiceError::NotFound("alert"))
}

/// Shared by the fan-out and by live UI highlighting, which must not
/// re-send notifications.
pub fn is_within_alert(location: GeoPoint, alert: &OutbreakAlert) -> bool {
    distance_meters(location, alert.center()) <= alert.radius_meters
}

/// Selects the owners to notify: fields without a location are skipped,
/// the creator never hears about their own alert, and an owner with
/// several fields in range is counted once.
pub fn fanout_recipients<'a>(alert: &OutbreakAlert, all: &'a [Field]) -> Vec<&'a Field> {
    let mut seen: HashSet<&str> = HashSet::new();
    all.iter()
        .filter(|field| {
            let Some(location) = field.location() else {
                return false;
            };
            if field.owner_id == alert.creator_id {
                return false;
            }
            if !is_within_alert(location, alert) {
                return false;
            }
            seen.insert(field.owner_id.as_str())
        })
        .collect()
}

pub fn alert_draft(alert: &OutbreakAlert, recipient: &str) -> NotificationDraft {
    NotificationDraft {
        recipient_id: recipient.to_string(),
        actor_id: Some(alert.creator_id.clone()),
        kind: NotificationKind::Alert,
        title: format!("Outbreak alert: {}", alert.title),
        message: format!(
            "{} reported an outbreak within {:.1} km. Your field is inside the risk zone.",
            alert.creator_name,
            alert.radius_meters / 1000.0
        ),
        post_id: None,
        comment_id: None,
        alert_id: Some(alert.id),
        image_url: None,
    }
}

/// One-shot fan-out at alert creation time. Loads every registered field
/// (no spatial index), then issues the notification writes concurrently.
/// The writes are not transactional with each other or with the alert
/// row; a failed write is logged and dropped, and fields registered after
/// this sweep are never evaluated against the alert.
pub async fn notify_communities(pool: DbPool, alert: OutbreakAlert) {
    let loaded = db::with_conn(pool.clone(), fields::all_fields).await;
    let all = match loaded {
        Ok(all) => all,
        Err(err) => {
            logs::log_fanout_error(&err.to_string());
            return;
        }
    };

    let recipients: Vec<String> = fanout_recipients(&alert, &all)
        .into_iter()
        .map(|field| field.owner_id.clone())
        .collect();

    let mut tasks = JoinSet::new();
    for recipient in recipients {
        let pool = pool.clone();
        let draft = alert_draft(&alert, &recipient);
        tasks.spawn(async move {
            db::with_conn(pool, move |conn| {
                notifications::create(conn, &draft).map(|_| ())
            })
            .await
        });
    }

    let (mut sent, mut failed) = (0usize, 0usize);
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(())) => sent += 1,
            Ok(Err(err)) => {
                failed += 1;
                logs::log_fanout_write_failed(&err.to_string());
            }
            Err(err) => {
                failed += 1;
                logs::log_fanout_write_failed(&err.to_string());
            }
        }
    }
    logs::log_fanout_done(&alert.title, sent, failed);
}

/// Which active alert zones contain this field right now. Read-only view
/// for the owner; never re-notifies.
pub fn alerts_containing(
    conn: &mut SqliteConnection,
    field_id: i64,
    viewer: &Identity,
) -> Result<Vec<OutbreakAlert>, ServiceError> {
    let field = fields::get_field(conn, field_id)?;
    if field.owner_id != viewer.user_id {
        return Err(ServiceError::Forbidden);
    }
    let Some(location) = field.location() else {
        return Ok(Vec::new());
    };
    Ok(list_alerts(conn)?
        .into_iter()
        .filter(|alert| alert.is_active() && is_within_alert(location, alert))
        .collect())
}
