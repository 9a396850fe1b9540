use url::Url;

use crate::types::S3Target;

const INVALID_SCHEME: &str = "scheme must be s3:// .";
const INVALID_PATH: &str = "target must be a valid s3:// URL.";
const NO_BUCKET_NAME_SPECIFIED: &str = "bucket name must be specified.";
const S3_SCHEME_PREFIX: &str = "s3://";

pub fn check_storage_path(path: &str) -> Result<String, String> {
    let parsed = Url::parse(path).map_err(|_| INVALID_PATH.to_string())?;

    if parsed.scheme() != "s3" {
        return Err(INVALID_SCHEME.to_string());
    }
    if parsed.host_str().is_none_or(|host| host.is_empty()) {
        return Err(NO_BUCKET_NAME_SPECIFIED.to_string());
    }

    Ok(path.to_string())
}

/// Splits `s3://bucket[/prefix]`. The prefix is taken verbatim.
pub fn parse_storage_path(path: &str) -> Result<S3Target, String> {
    check_storage_path(path)?;

    let without_scheme = path
        .strip_prefix(S3_SCHEME_PREFIX)
        .ok_or_else(|| INVALID_SCHEME.to_string())?;

    let (bucket, prefix) = match without_scheme.split_once('/') {
        Some((bucket, prefix)) => (bucket, prefix),
        None => (without_scheme, ""),
    };

    Ok(S3Target {
        bucket: bucket.to_string(),
        prefix: prefix.to_string(),
    })
}
