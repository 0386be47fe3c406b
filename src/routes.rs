use axum::extract::{Multipart, Path, Query, State};
use axum::http::HeaderMap;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::auth;
use crate::clients::{DiseaseClient, ImageHostClient, WeatherClient};
use crate::clients::disease::{BatchResponse, PredictionResult};
use crate::clients::imagehost::HostedImage;
use crate::clients::weather::WeatherReport;
use crate::community::{self, PostDetail, PostView, Subject, VoteReceipt};
use crate::db::{self, DbPool};
use crate::diseases;
use crate::error::ServiceError;
use crate::fertilizer;
use crate::fields::{self, Field};
use crate::notifications::{self, Notification, NotificationCount};
use crate::outbreak::{self, OutbreakAlert};
use crate::schema::users;
use crate::settings::settings;

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub jwt_secret: String,
    pub weather: WeatherClient,
    pub disease: DiseaseClient,
    pub images: ImageHostClient,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(|| async { "ok" }))
        // Auth
        .route("/api/auth/me", get(me))
        // Community
        .route("/api/posts", get(list_posts).post(create_post))
        .route("/api/posts/{id}", get(get_post))
        .route("/api/posts/{id}/votes", post(cast_post_vote))
        .route("/api/posts/{id}/comments", post(create_comment))
        .route("/api/posts/{id}/best-answer", post(mark_best_answer))
        .route("/api/comments/{id}/votes", post(cast_comment_vote))
        // Fields
        .route("/api/fields", get(list_fields).post(register_field))
        .route("/api/fields/{id}/scan", post(scan_field))
        .route("/api/fields/{id}/alerts", get(field_alerts))
        // Outbreak alerts
        .route("/api/alerts", get(list_alerts).post(create_alert))
        // Notifications
        .route("/api/notifications", get(list_notifications))
        .route("/api/notifications/count", get(notification_count))
        .route("/api/notifications/read-all", post(mark_all_notifications_read))
        .route(
            "/api/notifications/{id}",
            delete(delete_notification),
        )
        .route("/api/notifications/{id}/read", post(mark_notification_read))
        // Oracles
        .route("/api/weather", get(current_weather))
        .route("/api/diseases", get(list_diseases))
        .route("/api/diseases/status", get(disease_api_status))
        .route("/api/diseases/{label}", get(get_disease))
        .route("/api/diseases/predict", post(predict_disease))
        .route("/api/diseases/predict-batch", post(predict_diseases_batch))
        .route("/api/uploads", post(upload_image))
        // Fertilizer
        .route("/api/fertilizer/recommend", post(recommend_fertilizer))
        .with_state(state)
}

/// Reads never require sign-in; a valid token just personalizes them.
fn viewer_of(headers: &HeaderMap, secret: &str) -> Option<String> {
    auth::verify(headers, secret).ok().map(|i| i.user_id)
}

// ── Auth ──

#[derive(Debug, Queryable, Serialize)]
#[serde(rename_all = "camelCase")]
struct UserProfile {
    id: String,
    name: String,
    photo_url: Option<String>,
    created_at: i64,
}

async fn me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<UserProfile>, ServiceError> {
    let identity = auth::verify(&headers, &state.jwt_secret)?;
    let profile = db::with_conn(state.pool.clone(), move |conn| {
        auth::upsert_user(conn, &identity)?;
        users::table
            .find(&identity.user_id)
            .first::<UserProfile>(conn)
            .map_err(ServiceError::from)
    })
    .await?;
    Ok(Json(profile))
}

// ── Community ──

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeedQuery {
    crop_type: Option<String>,
    limit: Option<usize>,
}

async fn list_posts(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<FeedQuery>,
) -> Result<Json<Vec<PostView>>, ServiceError> {
    let viewer = viewer_of(&headers, &state.jwt_secret);
    let limit = params.limit.unwrap_or(settings().community.default_limit);
    let posts = db::with_conn(state.pool.clone(), move |conn| {
        community::get_posts(
            conn,
            viewer.as_deref(),
            params.crop_type.as_deref(),
            limit,
        )
    })
    .await?;
    Ok(Json(posts))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatePostBody {
    title: Option<String>,
    content: String,
    image_url: Option<String>,
    crop_type: Option<String>,
}

async fn create_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreatePostBody>,
) -> Result<Json<PostView>, ServiceError> {
    let identity = auth::verify(&headers, &state.jwt_secret)?;
    let post = db::with_conn(state.pool.clone(), move |conn| {
        auth::upsert_user(conn, &identity)?;
        community::create_post(
            conn,
            &identity,
            community::NewPostInput {
                title: body.title,
                content: body.content,
                image_url: body.image_url,
                crop_type: body.crop_type,
            },
        )
    })
    .await?;
    Ok(Json(PostView {
        post,
        user_vote: 0,
        user_liked: false,
        user_disliked: false,
    }))
}

async fn get_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(post_id): Path<i64>,
) -> Result<Json<PostDetail>, ServiceError> {
    let viewer = viewer_of(&headers, &state.jwt_secret);
    let detail = db::with_conn(state.pool.clone(), move |conn| {
        community::get_post(conn, post_id, viewer.as_deref())
    })
    .await?;
    Ok(Json(detail))
}

#[derive(Debug, Deserialize)]
struct VoteBody {
    value: i32,
}

async fn cast_post_vote(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(post_id): Path<i64>,
    Json(body): Json<VoteBody>,
) -> Result<Json<VoteReceipt>, ServiceError> {
    let identity = auth::verify(&headers, &state.jwt_secret)?;
    let receipt = db::with_conn(state.pool.clone(), move |conn| {
        auth::upsert_user(conn, &identity)?;
        let receipt = community::apply_vote(conn, Subject::Post(post_id), &identity, body.value)?;
        // Fires only after the vote transaction committed; a failure here
        // does not undo the vote.
        if let Some(draft) = &receipt.notification {
            notifications::deliver_best_effort(conn, draft);
        }
        Ok(receipt)
    })
    .await?;
    Ok(Json(receipt))
}

async fn cast_comment_vote(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(comment_id): Path<i64>,
    Json(body): Json<VoteBody>,
) -> Result<Json<VoteReceipt>, ServiceError> {
    let identity = auth::verify(&headers, &state.jwt_secret)?;
    let receipt = db::with_conn(state.pool.clone(), move |conn| {
        auth::upsert_user(conn, &identity)?;
        let receipt =
            community::apply_vote(conn, Subject::Comment(comment_id), &identity, body.value)?;
        if let Some(draft) = &receipt.notification {
            notifications::deliver_best_effort(conn, draft);
        }
        Ok(receipt)
    })
    .await?;
    Ok(Json(receipt))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateCommentBody {
    content: String,
    image_url: Option<String>,
}

async fn create_comment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(post_id): Path<i64>,
    Json(body): Json<CreateCommentBody>,
) -> Result<Json<community::Comment>, ServiceError> {
    let identity = auth::verify(&headers, &state.jwt_secret)?;
    let comment = db::with_conn(state.pool.clone(), move |conn| {
        auth::upsert_user(conn, &identity)?;
        let (comment, draft) = community::add_comment(
            conn,
            post_id,
            &identity,
            community::NewCommentInput {
                content: body.content,
                image_url: body.image_url,
            },
        )?;
        if let Some(draft) = &draft {
            notifications::deliver_best_effort(conn, draft);
        }
        Ok(comment)
    })
    .await?;
    Ok(Json(comment))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BestAnswerBody {
    comment_id: i64,
}

async fn mark_best_answer(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(post_id): Path<i64>,
    Json(body): Json<BestAnswerBody>,
) -> Result<Json<Value>, ServiceError> {
    let identity = auth::verify(&headers, &state.jwt_secret)?;
    db::with_conn(state.pool.clone(), move |conn| {
        community::mark_best_answer(conn, post_id, body.comment_id, &identity)
    })
    .await?;
    Ok(Json(json!({ "ok": true })))
}

// ── Fields ──

async fn list_fields(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Field>>, ServiceError> {
    let identity = auth::verify(&headers, &state.jwt_secret)?;
    let mine = db::with_conn(state.pool.clone(), move |conn| {
        fields::my_fields(conn, &identity.user_id)
    })
    .await?;
    Ok(Json(mine))
}

async fn register_field(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<fields::NewFieldInput>,
) -> Result<Json<Field>, ServiceError> {
    let identity = auth::verify(&headers, &state.jwt_secret)?;
    let field = db::with_conn(state.pool.clone(), move |conn| {
        auth::upsert_user(conn, &identity)?;
        fields::register_field(conn, &identity, body)
    })
    .await?;
    Ok(Json(field))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScanResponse {
    field: Field,
    scan: fields::ScanResult,
}

async fn scan_field(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(field_id): Path<i64>,
) -> Result<Json<ScanResponse>, ServiceError> {
    let identity = auth::verify(&headers, &state.jwt_secret)?;
    let (field, scan) = db::with_conn(state.pool.clone(), move |conn| {
        fields::record_scan(conn, field_id, &identity)
    })
    .await?;
    Ok(Json(ScanResponse { field, scan }))
}

async fn field_alerts(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(field_id): Path<i64>,
) -> Result<Json<Vec<OutbreakAlert>>, ServiceError> {
    let identity = auth::verify(&headers, &state.jwt_secret)?;
    let alerts = db::with_conn(state.pool.clone(), move |conn| {
        outbreak::alerts_containing(conn, field_id, &identity)
    })
    .await?;
    Ok(Json(alerts))
}

// ── Outbreak alerts ──

async fn list_alerts(
    State(state): State<AppState>,
) -> Result<Json<Vec<OutbreakAlert>>, ServiceError> {
    let alerts = db::with_conn(state.pool.clone(), outbreak::list_alerts).await?;
    Ok(Json(alerts))
}

async fn create_alert(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<outbreak::NewAlertInput>,
) -> Result<Json<OutbreakAlert>, ServiceError> {
    let identity = auth::verify(&headers, &state.jwt_secret)?;
    let alert = db::with_conn(state.pool.clone(), move |conn| {
        auth::upsert_user(conn, &identity)?;
        outbreak::create_alert(conn, &identity, body)
    })
    .await?;

    // One-time sweep; fields registered afterwards are never evaluated
    // against this alert.
    outbreak::notify_communities(state.pool.clone(), alert.clone()).await;

    Ok(Json(alert))
}

// ── Notifications ──

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NotificationQuery {
    unread_only: Option<bool>,
}

async fn list_notifications(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<NotificationQuery>,
) -> Result<Json<Vec<Notification>>, ServiceError> {
    let identity = auth::verify(&headers, &state.jwt_secret)?;
    let unread_only = params.unread_only.unwrap_or(false);
    let inbox = db::with_conn(state.pool.clone(), move |conn| {
        notifications::list(conn, &identity.user_id, unread_only)
    })
    .await?;
    Ok(Json(inbox))
}

async fn notification_count(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<NotificationCount>, ServiceError> {
    let identity = auth::verify(&headers, &state.jwt_secret)?;
    let count = db::with_conn(state.pool.clone(), move |conn| {
        notifications::counts(conn, &identity.user_id)
    })
    .await?;
    Ok(Json(count))
}

async fn mark_notification_read(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(notification_id): Path<i64>,
) -> Result<Json<Notification>, ServiceError> {
    let identity = auth::verify(&headers, &state.jwt_secret)?;
    let updated = db::with_conn(state.pool.clone(), move |conn| {
        notifications::mark_read(conn, &identity.user_id, notification_id)
    })
    .await?;
    Ok(Json(updated))
}

async fn mark_all_notifications_read(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ServiceError> {
    let identity = auth::verify(&headers, &state.jwt_secret)?;
    let updated = db::with_conn(state.pool.clone(), move |conn| {
        notifications::mark_all_read(conn, &identity.user_id)
    })
    .await?;
    Ok(Json(json!({ "updated": updated })))
}

async fn delete_notification(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(notification_id): Path<i64>,
) -> Result<Json<Value>, ServiceError> {
    let identity = auth::verify(&headers, &state.jwt_secret)?;
    db::with_conn(state.pool.clone(), move |conn| {
        notifications::delete(conn, &identity.user_id, notification_id)
    })
    .await?;
    Ok(Json(json!({ "ok": true })))
}

// ── Oracles ──

#[derive(Debug, Deserialize)]
struct WeatherQuery {
    lat: f64,
    lon: f64,
}

async fn current_weather(
    State(state): State<AppState>,
    Query(params): Query<WeatherQuery>,
) -> Result<Json<WeatherReport>, ServiceError> {
    let report = state.weather.current(params.lat, params.lon).await?;
    Ok(Json(report))
}

async fn list_diseases() -> Json<&'static [diseases::DiseaseInfo]> {
    Json(diseases::CATALOG)
}

async fn disease_api_status(
    State(state): State<AppState>,
) -> Result<Json<Value>, ServiceError> {
    let available = state.disease.status().await.unwrap_or(false);
    Ok(Json(json!({ "available": available })))
}

async fn get_disease(
    Path(label): Path<String>,
) -> Result<Json<&'static diseases::DiseaseInfo>, ServiceError> {
    diseases::by_label(&label)
        .map(Json)
        .ok_or(ServiceError::NotFound("disease"))
}

async fn read_upload(multipart: &mut Multipart, field_name: &str) -> Result<Vec<(String, Vec<u8>)>, ServiceError> {
    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServiceError::Invalid(e.to_string()))?
    {
        if field.name() != Some(field_name) {
            continue;
        }
        let filename = field
            .file_name()
            .unwrap_or("upload.jpg")
            .to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| ServiceError::Invalid(e.to_string()))?;
        files.push((filename, data.to_vec()));
    }
    if files.is_empty() {
        return Err(ServiceError::Invalid(format!(
            "missing multipart field \"{field_name}\""
        )));
    }
    Ok(files)
}

async fn predict_disease(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<PredictionResult>, ServiceError> {
    let mut files = read_upload(&mut multipart, "file").await?;
    let (filename, bytes) = files.remove(0);
    let result = state.disease.predict(bytes, &filename).await?;
    Ok(Json(result))
}

async fn predict_diseases_batch(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<BatchResponse>, ServiceError> {
    let files = read_upload(&mut multipart, "files").await?;
    let result = state.disease.predict_batch(files).await?;
    Ok(Json(result))
}

async fn upload_image(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<HostedImage>, ServiceError> {
    auth::verify(&headers, &state.jwt_secret)?;
    let mut files = read_upload(&mut multipart, "file").await?;
    let (filename, bytes) = files.remove(0);
    let hosted = state.images.upload(bytes, &filename).await?;
    Ok(Json(hosted))
}

// ── Fertilizer ──

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FertilizerBody {
    crop_type: String,
    disease: Option<String>,
    area_hectares: f64,
}

async fn recommend_fertilizer(
    Json(body): Json<FertilizerBody>,
) -> Result<Json<fertilizer::Recommendation>, ServiceError> {
    let recommendation = fertilizer::recommend(
        settings(),
        &body.crop_type,
        body.disease.as_deref(),
        body.area_hectares,
    )?;
    Ok(Json(recommendation))
}
