//! Auth headers for remote artifact stores

use crate::config::{TRACKING_PASSWORD, TRACKING_TOKEN, TRACKING_USERNAME};
use crate::error::ArtifactError;
use base64::Engine;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use std::fmt;
use std::sync::Arc;

/// Supplies the headers that authenticate a request
pub trait CredentialProvider: Send + Sync + fmt::Debug {
    fn headers(&self) -> Result<HeaderMap, ArtifactError>;
}

/// Anonymous access
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCredentials;

impl CredentialProvider for NoCredentials {
    fn headers(&self) -> Result<HeaderMap, ArtifactError> {
        Ok(HeaderMap::new())
    }
}

/// `Authorization: Bearer <token>`
#[derive(Clone)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(***)")
    }
}

impl CredentialProvider for BearerToken {
    fn headers(&self) -> Result<HeaderMap, ArtifactError> {
        authorization(format!("Bearer {}", self.0))
    }
}

/// `Authorization: Basic <base64(user:password)>`
#[derive(Clone)]
pub struct BasicAuth {
    username: String,
    password: String,
}

impl BasicAuth {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

impl CredentialProvider for BasicAuth {
    fn headers(&self) -> Result<HeaderMap, ArtifactError> {
        let encoded = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", self.username, self.password));
        authorization(format!("Basic {}", encoded))
    }
}

fn authorization(value: String) -> Result<HeaderMap, ArtifactError> {
    let mut value = HeaderValue::from_str(&value).map_err(|_| {
        ArtifactError::InvalidArgument("Credentials contain invalid header characters".into())
    })?;
    value.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, value);
    Ok(headers)
}

/// Credentials from environment variables: a token wins over basic auth
pub fn credentials_from_env() -> Arc<dyn CredentialProvider> {
    credentials_from_lookup(|key| std::env::var(key).ok())
}

pub fn credentials_from_lookup<F>(lookup: F) -> Arc<dyn CredentialProvider>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(token) = lookup(TRACKING_TOKEN).filter(|t| !t.is_empty()) {
        return Arc::new(BearerToken::new(token));
    }
    match (lookup(TRACKING_USERNAME), lookup(TRACKING_PASSWORD)) {
        (Some(username), Some(password)) => Arc::new(BasicAuth::new(username, password)),
        _ => Arc::new(NoCredentials),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_auth_header() {
        let headers = BasicAuth::new("user", "pass").headers().unwrap();
        assert_eq!(headers[AUTHORIZATION], "Basic dXNlcjpwYXNz");
    }

    #[test]
    fn test_token_wins_over_basic_auth() {
        let provider = credentials_from_lookup(|key| match key {
            TRACKING_TOKEN => Some("t0k3n".into()),
            TRACKING_USERNAME => Some("user".into()),
            TRACKING_PASSWORD => Some("pass".into()),
            _ => None,
        });
        let headers = provider.headers().unwrap();
        assert_eq!(headers[AUTHORIZATION], "Bearer t0k3n");
        assert!(!format!("{:?}", provider).contains("t0k3n"));
    }

    #[test]
    fn test_no_credentials() {
        let provider = credentials_from_lookup(|_| None);
        assert!(provider.headers().unwrap().is_empty());
    }
}
