use axum::http::HeaderMap;
use chrono::Utc;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;
use crate::schema::users;

pub const FALLBACK_NAME: &str = "CropWise farmer";

/// Claims minted by the identity provider. `sub` is the stable opaque
/// user id stamped on every write.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub name: Option<String>,
    pub picture: Option<String>,
    pub exp: usize,
}

/// The authenticated caller for the duration of one request.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: String,
    pub name: String,
    pub photo_url: Option<String>,
}

/// Token issuance belongs to the identity provider; this mirrors its
/// output for tests and local tooling.
pub fn mint_token(
    secret: &str,
    user_id: &str,
    name: Option<&str>,
    picture: Option<&str>,
) -> Result<String, ServiceError> {
    let exp = (Utc::now().timestamp() + 30 * 24 * 60 * 60) as usize;
    let claims = Claims {
        sub: user_id.to_string(),
        name: name.map(str::to_string),
        picture: picture.map(str::to_string),
        exp,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ServiceError::Internal(format!("token encode: {e}")))
}

/// Fails fast with Unauthenticated before any write is attempted.
pub fn verify(headers: &HeaderMap, jwt_secret: &str) -> Result<Identity, ServiceError> {
    let token = headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ServiceError::Unauthenticated)?;

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ServiceError::Unauthenticated)?;

    Ok(Identity {
        user_id: data.claims.sub,
        name: data.claims.name.unwrap_or_else(|| FALLBACK_NAME.to_string()),
        photo_url: data.claims.picture,
    })
}

/// Caches the provider-supplied profile so later reads can render author
/// names without another round trip to the identity provider.
pub fn upsert_user(conn: &mut SqliteConnection, identity: &Identity) -> Result<(), ServiceError> {
    let now = Utc::now().timestamp();
    diesel::insert_into(users::table)
        .values((
            users::id.eq(&identity.user_id),
            users::name.eq(&identity.name),
            users::photo_url.eq(identity.photo_url.as_deref()),
            users::created_at.eq(now),
        ))
        .on_conflict(users::id)
        .do_update()
        .set((
            users::name.eq(&identity.name),
            users::photo_url.eq(identity.photo_url.as_deref()),
        ))
        .execute(conn)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const SECRET: &str = "test-secret";

    fn headers_with(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            "Authorization",
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    #[test]
    fn test_round_trip_identity() {
        let token = mint_token(SECRET, "u_abc", Some("Ana"), None).unwrap();
        let identity = verify(&headers_with(&token), SECRET).unwrap();
        assert_eq!(identity.user_id, "u_abc");
        assert_eq!(identity.name, "Ana");
        assert!(identity.photo_url.is_none());
    }

    #[test]
    fn test_missing_header_is_unauthenticated() {
        let err = verify(&HeaderMap::new(), SECRET).unwrap_err();
        assert!(matches!(err, ServiceError::Unauthenticated));
    }

    #[test]
    fn test_wrong_secret_is_unauthenticated() {
        let token = mint_token(SECRET, "u_abc", None, None).unwrap();
        let err = verify(&headers_with(&token), "other-secret").unwrap_err();
        assert!(matches!(err, ServiceError::Unauthenticated));
    }

    #[test]
    fn test_nameless_claims_fall_back() {
        let token = mint_token(SECRET, "u_abc", None, None).unwrap();
        let identity = verify(&headers_with(&token), SECRET).unwrap();
        assert_eq!(identity.name, FALLBACK_NAME);
    }
}
