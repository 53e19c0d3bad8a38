//! Settings loaded from the environment

use crate::error::ArtifactError;
use crate::transport::validate_policy;
use artifactor_types::TransferSettings;
use std::str::FromStr;

pub const ENABLE_PROGRESS_BAR: &str = "ARTIFACTOR_ENABLE_PROGRESS_BAR";
pub const MAX_THREADS: &str = "ARTIFACTOR_MAX_THREADS";
pub const HTTP_REQUEST_MAX_RETRIES: &str = "ARTIFACTOR_HTTP_REQUEST_MAX_RETRIES";
pub const HTTP_REQUEST_BACKOFF_FACTOR: &str = "ARTIFACTOR_HTTP_REQUEST_BACKOFF_FACTOR";
pub const HTTP_REQUEST_TIMEOUT: &str = "ARTIFACTOR_HTTP_REQUEST_TIMEOUT";
pub const MULTIPART_DOWNLOAD_CHUNK_SIZE: &str = "ARTIFACTOR_MULTIPART_DOWNLOAD_CHUNK_SIZE";
pub const MULTIPART_DOWNLOAD_MINIMUM_FILE_SIZE: &str =
    "ARTIFACTOR_MULTIPART_DOWNLOAD_MINIMUM_FILE_SIZE";
pub const TRACKING_TOKEN: &str = "ARTIFACTOR_TRACKING_TOKEN";
pub const TRACKING_USERNAME: &str = "ARTIFACTOR_TRACKING_USERNAME";
pub const TRACKING_PASSWORD: &str = "ARTIFACTOR_TRACKING_PASSWORD";

/// Settings from process environment variables, defaults for unset ones
pub fn settings_from_env() -> Result<TransferSettings, ArtifactError> {
    settings_from_lookup(|key| std::env::var(key).ok())
}

/// Settings from an arbitrary variable lookup
pub fn settings_from_lookup<F>(lookup: F) -> Result<TransferSettings, ArtifactError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut settings = TransferSettings::default();

    if let Some(value) = lookup(ENABLE_PROGRESS_BAR) {
        settings.enable_progress = parse_bool(ENABLE_PROGRESS_BAR, &value)?;
    }
    if let Some(value) = lookup(MAX_THREADS) {
        let threads: usize = parse_number(MAX_THREADS, &value)?;
        if threads == 0 {
            return Err(ArtifactError::InvalidArgument(format!(
                "{} must be at least 1",
                MAX_THREADS
            )));
        }
        settings.max_workers_override = Some(threads);
    }
    if let Some(value) = lookup(HTTP_REQUEST_MAX_RETRIES) {
        settings.retry.max_retries = parse_number(HTTP_REQUEST_MAX_RETRIES, &value)?;
    }
    if let Some(value) = lookup(HTTP_REQUEST_BACKOFF_FACTOR) {
        settings.retry.backoff_factor = parse_number(HTTP_REQUEST_BACKOFF_FACTOR, &value)?;
    }
    if let Some(value) = lookup(HTTP_REQUEST_TIMEOUT) {
        let timeout: u64 = parse_number(HTTP_REQUEST_TIMEOUT, &value)?;
        if timeout == 0 {
            return Err(ArtifactError::InvalidArgument(format!(
                "{} must be at least 1 second",
                HTTP_REQUEST_TIMEOUT
            )));
        }
        settings.request_timeout_secs = timeout;
    }
    if let Some(value) = lookup(MULTIPART_DOWNLOAD_CHUNK_SIZE) {
        settings.multipart_download_chunk_size =
            parse_number(MULTIPART_DOWNLOAD_CHUNK_SIZE, &value)?;
    }
    if let Some(value) = lookup(MULTIPART_DOWNLOAD_MINIMUM_FILE_SIZE) {
        settings.multipart_download_min_file_size =
            parse_number(MULTIPART_DOWNLOAD_MINIMUM_FILE_SIZE, &value)?;
    }

    validate_policy(&settings.retry)?;
    Ok(settings)
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ArtifactError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ArtifactError::InvalidArgument(format!(
            "{} must be a boolean, got {:?}",
            key, value
        ))),
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T, ArtifactError> {
    value.trim().parse().map_err(|_| {
        ArtifactError::InvalidArgument(format!("{} must be a number, got {:?}", key, value))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let settings = settings_from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings, TransferSettings::default());
    }

    #[test]
    fn test_overrides() {
        let settings = settings_from_lookup(lookup(&[
            (ENABLE_PROGRESS_BAR, "False"),
            (MAX_THREADS, "4"),
            (HTTP_REQUEST_MAX_RETRIES, "2"),
            (HTTP_REQUEST_BACKOFF_FACTOR, "0.5"),
            (MULTIPART_DOWNLOAD_CHUNK_SIZE, "1024"),
        ]))
        .unwrap();

        assert!(!settings.enable_progress);
        assert_eq!(settings.max_workers_override, Some(4));
        assert_eq!(settings.retry.max_retries, 2);
        assert_eq!(settings.retry.backoff_factor, 0.5);
        assert_eq!(settings.multipart_download_chunk_size, 1024);
    }

    #[test]
    fn test_invalid_values_name_the_variable() {
        let err = settings_from_lookup(lookup(&[(MAX_THREADS, "many")])).unwrap_err();
        assert!(err.to_string().contains(MAX_THREADS));

        let err = settings_from_lookup(lookup(&[(ENABLE_PROGRESS_BAR, "maybe")])).unwrap_err();
        assert!(err.to_string().contains(ENABLE_PROGRESS_BAR));

        assert!(settings_from_lookup(lookup(&[(MAX_THREADS, "0")])).is_err());
        assert!(settings_from_lookup(lookup(&[(HTTP_REQUEST_MAX_RETRIES, "10")])).is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = settings_from_lookup(lookup(&[(HTTP_REQUEST_TIMEOUT, "0")])).unwrap_err();
        assert!(matches!(err, ArtifactError::InvalidArgument(_)));
        assert!(err.to_string().contains(HTTP_REQUEST_TIMEOUT));

        let settings = settings_from_lookup(lookup(&[(HTTP_REQUEST_TIMEOUT, "30")])).unwrap();
        assert_eq!(settings.request_timeout_secs, 30);
    }
}
