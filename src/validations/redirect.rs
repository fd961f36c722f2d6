use url::Url;
use validator::ValidationError;

/// Validates that a redirect target is an absolute http/https URL with a host
pub fn validate_target_url(url_str: &str) -> Result<(), ValidationError> {
    let url = Url::parse(url_str).map_err(|_| invalid("invalid_url", "Invalid URL format"))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(invalid("url_scheme", "URL scheme must be http or https"));
    }

    if url.host().is_none() {
        return Err(invalid("url_host", "URL must have a host"));
    }

    Ok(())
}

fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}
