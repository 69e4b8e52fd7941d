use anyhow::{Context, Result};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Deserializer, Serialize};

use crate::config::JwtConfig;

/// Claims carried by LinkCrush access tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Account id; numeric ids are accepted and kept as text
    #[serde(deserialize_with = "string_or_number")]
    pub sub: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub is_staff: bool,
    #[serde(default)]
    pub is_superuser: bool,
    pub exp: i64,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Sub {
        Text(String),
        Number(i64),
    }

    Ok(match Sub::deserialize(deserializer)? {
        Sub::Text(sub) => sub,
        Sub::Number(sub) => sub.to_string(),
    })
}

/// HS256 token validator
pub struct JwtValidator {
    key: DecodingKey,
    validation: Validation,
}

impl JwtValidator {
    pub fn from_config(config: &JwtConfig) -> Result<Self> {
        if config.secret.is_empty() {
            anyhow::bail!("JWT secret must not be empty");
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_aud = false;

        Ok(Self {
            key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
        })
    }

    pub fn validate(&self, token: &str) -> Result<AccessClaims> {
        let data = decode::<AccessClaims>(token, &self.key, &self.validation)
            .context("token failed signature or structural validation")?;
        Ok(data.claims)
    }
}

/// Sign an access token with the shared secret
pub fn issue_token(secret: &str, claims: &AccessClaims) -> Result<String> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .context("failed to sign access token")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(exp_offset: i64) -> AccessClaims {
        AccessClaims {
            sub: "42".to_string(),
            username: Some("alice".to_string()),
            is_staff: true,
            is_superuser: false,
            exp: chrono::Utc::now().timestamp() + exp_offset,
        }
    }

    fn validator(secret: &str) -> JwtValidator {
        JwtValidator::from_config(&JwtConfig {
            secret: secret.to_string(),
        })
        .unwrap()
    }

    #[test]
    fn issued_tokens_validate() {
        let token = issue_token("s3cret", &claims(600)).unwrap();
        let decoded = validator("s3cret").validate(&token).unwrap();
        assert_eq!(decoded.sub, "42");
        assert_eq!(decoded.username.as_deref(), Some("alice"));
        assert!(decoded.is_staff);
        assert!(!decoded.is_superuser);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = issue_token("s3cret", &claims(600)).unwrap();
        assert!(validator("other").validate(&token).is_err());
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let token = issue_token("s3cret", &claims(-3600)).unwrap();
        assert!(validator("s3cret").validate(&token).is_err());
    }

    #[test]
    fn numeric_subject_is_accepted() {
        let token = encode(
            &Header::new(Algorithm::HS256),
            &serde_json::json!({
                "sub": 17,
                "is_superuser": true,
                "exp": chrono::Utc::now().timestamp() + 600,
            }),
            &EncodingKey::from_secret(b"s3cret"),
        )
        .unwrap();

        let decoded = validator("s3cret").validate(&token).unwrap();
        assert_eq!(decoded.sub, "17");
        assert!(decoded.username.is_none());
        assert!(decoded.is_superuser);
    }

    #[test]
    fn empty_secret_is_a_config_error() {
        assert!(JwtValidator::from_config(&JwtConfig {
            secret: String::new()
        })
        .is_err());
    }
}
