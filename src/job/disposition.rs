use regex::Regex;

/// Name used when the response carries no usable `Content-Disposition`.
pub const DEFAULT_ARTIFACT_NAME: &str = "0_0_0.splat";

lazy_static::lazy_static! {
    static ref FILENAME: Regex =
        Regex::new(r#"(?i)filename="?([^";]+)"?"#).expect("filename pattern is valid");
}

/// Extract the download name from a `Content-Disposition` header value.
pub fn filename_from_content_disposition(header: Option<&str>) -> String {
    header
        .and_then(|value| FILENAME.captures(value))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| DEFAULT_ARTIFACT_NAME.to_string())
}
