use chrono::Utc;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::auth::Identity;
use crate::error::ServiceError;
use crate::outbreak::GeoPoint;
use crate::schema::fields;
use crate::settings::{settings, Settings};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum FieldStatus {
    Active,
    Harvested,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = fields)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub id: i64,
    pub owner_id: String,
    pub name: String,
    pub area_hectares: f64,
    pub crop_type: String,
    pub sowing_date: i64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub status: String,
    pub health_score: Option<i32>,
    pub scan_issues: Option<String>,
    pub scanned_at: Option<i64>,
    pub created_at: i64,
}

impl Field {
    pub fn location(&self) -> Option<GeoPoint> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(GeoPoint {
                latitude,
                longitude,
            }),
            _ => None,
        }
    }

    pub fn issues(&self) -> Vec<String> {
        self.scan_issues
            .as_deref()
            .map(|raw| serde_json::from_str(raw).unwrap_or_default())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFieldInput {
    pub name: String,
    pub area_hectares: f64,
    pub crop_type: String,
    pub sowing_date: i64,
    pub location: Option<GeoPoint>,
}

fn validate_location(location: &GeoPoint) -> Result<(), ServiceError> {
    if !(-90.0..=90.0).contains(&location.latitude)
        || !(-180.0..=180.0).contains(&location.longitude)
    {
        return Err(ServiceError::Invalid("coordinates out of range".into()));
    }
    Ok(())
}

/// The location is fixed at registration; no operation updates it.
pub fn register_field(
    conn: &mut SqliteConnection,
    owner: &Identity,
    input: NewFieldInput,
) -> Result<Field, ServiceError> {
    let name = input.name.trim().to_string();
    if name.is_empty() {
        return Err(ServiceError::Invalid("field name must not be empty".into()));
    }
    if !input.area_hectares.is_finite() || input.area_hectares <= 0.0 {
        return Err(ServiceError::Invalid("area must be positive".into()));
    }
    if let Some(location) = &input.location {
        validate_location(location)?;
    }

    let now = Utc::now().timestamp();
    diesel::insert_into(fields::table)
        .values((
            fields::owner_id.eq(&owner.user_id),
            fields::name.eq(&name),
            fields::area_hectares.eq(input.area_hectares),
            fields::crop_type.eq(&input.crop_type),
            fields::sowing_date.eq(input.sowing_date),
            fields::latitude.eq(input.location.map(|l| l.latitude)),
            fields::longitude.eq(input.location.map(|l| l.longitude)),
            fields::status.eq(FieldStatus::Active.to_string()),
            fields::created_at.eq(now),
        ))
        .returning(Field::as_returning())
        .get_result(conn)
        .map_err(ServiceError::from)
}

pub fn get_field(conn: &mut SqliteConnection, field_id: i64) -> Result<Field, ServiceError> {
    fields::table
        .find(field_id)
        .first(conn)
        .optional()?
        .ok_or(ServiceError::NotFound("field"))
}

pub fn my_fields(conn: &mut SqliteConnection, owner: &str) -> Result<Vec<Field>, ServiceError> {
    fields::table
        .filter(fields::owner_id.eq(owner))
        .order(fields::created_at.desc())
        .then_order_by(fields::id.desc())
        .load(conn)
        .map_err(ServiceError::from)
}

/// Full scan; the geofence fan-out checks every registered field. Fine at
/// small fleet scale, a spatial index is the upgrade path beyond that.
pub fn all_fields(conn: &mut SqliteConnection) -> Result<Vec<Field>, ServiceError> {
    fields::table.load(conn).map_err(ServiceError::from)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub health_score: i32,
    pub issues: Vec<String>,
    pub scanned_at: i64,
}

fn simulate_scan<R: Rng>(rng: &mut R, s: &Settings) -> (i32, Vec<String>) {
    let health = rng.random_range(s.scan.min_health..=100);
    let issue_count = if health >= s.scan.healthy_threshold {
        0
    } else if health >= s.scan.warning_threshold {
        1
    } else {
        2
    };
    let issues = s
        .scan
        .issue_pool
        .choose_multiple(rng, issue_count)
        .cloned()
        .collect();
    (health, issues)
}

/// Runs a simulated drone pass over the field and stores the result.
pub fn record_scan(
    conn: &mut SqliteConnection,
    field_id: i64,
    owner: &Identity,
) -> Result<(Field, ScanResult), ServiceError> {
    let field = get_field(conn, field_id)?;
    if field.owner_id != owner.user_id {
        return Err(ServiceError::Forbidden);
    }

    let (health, issues) = simulate_scan(&mut rand::rng(), settings());
    let now = Utc::now().timestamp();
    let issues_json = serde_json::to_string(&issues)
        .map_err(|e| ServiceError::Internal(format!("encode scan issues: {e}")))?;

    let updated: Field = diesel::update(fields::table.find(field_id))
        .set((
            fields::health_score.eq(health),
            fields::scan_issues.eq(&issues_json),
            fields::scanned_at.eq(now),
        ))
        .returning(Field::as_returning())
        .get_result(conn)?;

    Ok((
        updated,
        ScanResult {
            health_score: health,
            issues,
            scanned_at: now,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::memory_pool;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn identity(id: &str) -> Identity {
        Identity {
            user_id: id.to_string(),
            name: "Farmer".to_string(),
            photo_url: None,
        }
    }

    fn field_input(name: &str, location: Option<GeoPoint>) -> NewFieldInput {
        NewFieldInput {
            name: name.to_string(),
            area_hectares: 2.5,
            crop_type: "maize".to_string(),
            sowing_date: 1_700_000_000,
            location,
        }
    }

    #[test]
    fn test_register_and_list_by_owner() {
        let pool = memory_pool();
        let mut conn = pool.get().unwrap();
        let ana = identity("ana");
        let binh = identity("binh");

        register_field(
            &mut conn,
            &ana,
            field_input(
                "North plot",
                Some(GeoPoint {
                    latitude: 21.0285,
                    longitude: 105.8048,
                }),
            ),
        )
        .unwrap();
        register_field(&mut conn, &binh, field_input("River plot", None)).unwrap();

        let mine = my_fields(&mut conn, "ana").unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].name, "North plot");
        assert!(mine[0].location().is_some());
        assert_eq!(mine[0].status, FieldStatus::Active.to_string());

        assert_eq!(all_fields(&mut conn).unwrap().len(), 2);
    }

    #[test]
    fn test_register_rejects_bad_input() {
        let pool = memory_pool();
        let mut conn = pool.get().unwrap();
        let ana = identity("ana");

        let mut input = field_input("  ", None);
        assert!(matches!(
            register_field(&mut conn, &ana, input.clone()).unwrap_err(),
            ServiceError::Invalid(_)
        ));

        input = field_input("Plot", None);
        input.area_hectares = 0.0;
        assert!(matches!(
            register_field(&mut conn, &ana, input).unwrap_err(),
            ServiceError::Invalid(_)
        ));

        let bad_location = field_input(
            "Plot",
            Some(GeoPoint {
                latitude: 123.0,
                longitude: 0.0,
            }),
        );
        assert!(matches!(
            register_field(&mut conn, &ana, bad_location).unwrap_err(),
            ServiceError::Invalid(_)
        ));
    }

    #[test]
    fn test_scan_is_owner_only() {
        let pool = memory_pool();
        let mut conn = pool.get().unwrap();
        let ana = identity("ana");
        let binh = identity("binh");

        let field = register_field(&mut conn, &ana, field_input("Plot", None)).unwrap();

        let err = record_scan(&mut conn, field.id, &binh).unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden));

        let (updated, scan) = record_scan(&mut conn, field.id, &ana).unwrap();
        assert_eq!(updated.health_score, Some(scan.health_score));
        assert_eq!(updated.issues(), scan.issues);
        assert!(updated.scanned_at.is_some());
    }

    #[test]
    fn test_simulated_scan_bounds() {
        let s = Settings::default();
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let (health, issues) = simulate_scan(&mut rng, &s);
            assert!((s.scan.min_health..=100).contains(&health));
            let expected = if health >= s.scan.healthy_threshold {
                0
            } else if health >= s.scan.warning_threshold {
                1
            } else {
                2
            };
            assert_eq!(issues.len(), expected);
            for issue in &issues {
                assert!(s.scan.issue_pool.contains(issue));
            }
        }
    }
}
