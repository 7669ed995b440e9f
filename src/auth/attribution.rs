//! Best-effort owner attribution from an *unverified* bearer token.
//!
//! The signature is never checked, so the subject is advisory: it may tag a
//! generated recipe with an owner id but must not back an authorization
//! decision. Verified sessions go through [`crate::auth::jwt`].

use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine as _,
};
use serde_json::Value;
use tracing::{debug, warn};

use crate::recipes::repo_types::NewRecipe;

const CLAIMS_B64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Subject claims, in lookup order.
const SUBJECT_CLAIMS: [&str; 3] = ["sub", "user_id", "uid"];

/// Subject read from a token whose signature was not verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnverifiedSubject(String);

impl UnverifiedSubject {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_owner_id(self) -> String {
        self.0
    }
}

/// Reads the subject out of an `Authorization` header value, if it has one.
pub fn resolve_subject(header: Option<&str>) -> Option<UnverifiedSubject> {
    let header = header?.trim();
    let (scheme, token) = header.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    let mut segments = token.trim().split('.');
    let claims_segment = match (segments.next(), segments.next()) {
        (Some(_), Some(claims)) if !claims.is_empty() => claims,
        _ => {
            debug!("bearer token is not a JWT; skipping attribution");
            return None;
        }
    };

    let bytes = match CLAIMS_B64.decode(claims_segment) {
        Ok(b) => b,
        Err(e) => {
            warn!(error = %e, "failed to decode JWT claims for attribution");
            return None;
        }
    };
    let claims: Value = match serde_json::from_slice(&bytes) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "JWT claims are not JSON");
            return None;
        }
    };

    SUBJECT_CLAIMS.iter().find_map(|key| match claims.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(UnverifiedSubject(s.trim().to_string())),
        Value::Number(n) => Some(UnverifiedSubject(n.to_string())),
        _ => None,
    })
}

/// Tags `recipe` with the token's subject unless it already has an owner.
pub fn attribute(recipe: &mut NewRecipe, header: Option<&str>) {
    if recipe.user_id.is_some() {
        return;
    }
    if let Some(subject) = resolve_subject(header) {
        debug!(user_id = subject.as_str(), "attaching advisory owner to recipe");
        recipe.user_id = Some(subject.into_owner_id());
    }
}
