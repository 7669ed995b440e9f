use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, StatusCode},
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use tracing::{debug, warn};

use super::claims::Claims;
use crate::{config::JwtConfig, state::AppState};

/// Verification half of the auth provider's HS256 keys.
#[derive(Clone)]
pub struct JwtKeys {
    pub decoding: DecodingKey,
    pub audience: Option<String>,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        Self::new(&state.config.jwt)
    }
}

impl JwtKeys {
    pub fn new(cfg: &JwtConfig) -> Self {
        Self {
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            audience: cfg.audience.clone(),
        }
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        match &self.audience {
            Some(aud) => validation.set_audience(std::slice::from_ref(aud)),
            None => validation.validate_aud = false,
        }
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(user_id = %data.claims.sub, "jwt verified");
        Ok(data.claims)
    }
}

fn bearer_token(parts: &Parts) -> Result<Option<&str>, (StatusCode, String)> {
    let Some(header) = parts.headers.get(axum::http::header::AUTHORIZATION) else {
        return Ok(None);
    };
    let value = header
        .to_str()
        .map_err(|_| (StatusCode::UNAUTHORIZED, "Invalid Authorization header".to_string()))?;
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .ok_or((StatusCode::UNAUTHORIZED, "Invalid Authorization header".to_string()))?;
    Ok(Some(token.trim()))
}

fn verify_token(keys: &JwtKeys, token: &str) -> Result<String, (StatusCode, String)> {
    match keys.verify(token) {
        Ok(claims) => Ok(claims.sub),
        Err(e) => {
            warn!(error = %e, "invalid or expired token");
            Err((StatusCode::UNAUTHORIZED, "Invalid or expired token".to_string()))
        }
    }
}

/// Caller with a verified session; rejects the request otherwise.
#[derive(Debug)]
pub struct AuthUser(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let token = bearer_token(parts)?.ok_or((
            StatusCode::UNAUTHORIZED,
            "Missing Authorization header".to_string(),
        ))?;
        Ok(AuthUser(verify_token(&keys, token)?))
    }
}

/// Anonymous when no Authorization header is sent; a bad token still rejects.
#[derive(Debug)]
pub struct MaybeAuthUser(pub Option<String>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeAuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        match bearer_token(parts)? {
            Some(token) => Ok(MaybeAuthUser(Some(verify_token(&keys, token)?))),
            None => Ok(MaybeAuthUser(None)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use time::OffsetDateTime;

    fn keys(audience: Option<&str>) -> JwtKeys {
        JwtKeys::new(&JwtConfig {
            secret: "test-secret".into(),
            audience: audience.map(Into::into),
        })
    }

    fn token(secret: &str, sub: &str, aud: Option<&str>, ttl_secs: i64) -> String {
        let exp = OffsetDateTime::now_utc().unix_timestamp() + ttl_secs;
        let claims = Claims {
            sub: sub.into(),
            exp: exp as usize,
            aud: aud.map(Into::into),
            role: Some("authenticated".into()),
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    fn parts_with(auth: Option<&str>) -> Parts {
        let mut req = Request::builder().uri("/recipes");
        if let Some(v) = auth {
            req = req.header("authorization", v);
        }
        req.body(()).unwrap().into_parts().0
    }

    #[test]
    fn verify_accepts_valid_token() {
        let claims = keys(None).verify(&token("test-secret", "u1", None, 600)).unwrap();
        assert_eq!(claims.sub, "u1");
    }

    #[test]
    fn verify_checks_audience_when_configured() {
        let k = keys(Some("authenticated"));
        assert!(k.verify(&token("test-secret", "u1", Some("authenticated"), 600)).is_ok());
        assert!(k.verify(&token("test-secret", "u1", Some("anon"), 600)).is_err());
    }

    #[test]
    fn verify_rejects_wrong_secret_and_expired() {
        let k = keys(None);
        assert!(k.verify(&token("other-secret", "u1", None, 600)).is_err());
        assert!(k.verify(&token("test-secret", "u1", None, -3600)).is_err());
    }

    #[tokio::test]
    async fn auth_user_requires_header() {
        let k = keys(None);
        let mut parts = parts_with(None);
        let err = AuthUser::from_request_parts(&mut parts, &k).await.err().unwrap();
        assert_eq!(err.0, StatusCode::UNAUTHORIZED);

        let bearer = format!("Bearer {}", token("test-secret", "u9", None, 600));
        let mut parts = parts_with(Some(&bearer));
        let AuthUser(id) = AuthUser::from_request_parts(&mut parts, &k).await.unwrap();
        assert_eq!(id, "u9");
    }

    #[tokio::test]
    async fn maybe_auth_user_is_anonymous_without_header() {
        let k = keys(None);
        let mut parts = parts_with(None);
        let MaybeAuthUser(id) = MaybeAuthUser::from_request_parts(&mut parts, &k).await.unwrap();
        assert!(id.is_none());

        let mut parts = parts_with(Some("Bearer not-a-jwt"));
        assert!(MaybeAuthUser::from_request_parts(&mut parts, &k).await.is_err());
    }
}
