//! Helpers for profile and report pictures carried as base64 data URLs.

const SUPPORTED: [&str; 5] = ["image/jpeg", "image/jpg", "image/png", "image/gif", "image/webp"];

/// Storage key holding the picture of a user.
pub fn storage_key(user_id: &str) -> String {
    format!("image_{user_id}")
}

/// `true` for `data:image/{jpeg,jpg,png,gif,webp};base64,...`.
pub fn is_valid_data_url(data_url: &str) -> bool {
    let Some((header, _)) = data_url.split_once(',') else {
        return false;
    };
    let Some(mime) = header
        .strip_prefix("data:")
        .and_then(|rest| rest.strip_suffix(";base64"))
    else {
        return false;
    };
    SUPPORTED.contains(&mime)
}
