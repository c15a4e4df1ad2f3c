//! Shareable room links.

use reqwest::Url;
use uuid::Uuid;

use crate::error::ApiError;

/// Path of the editor page in the web app.
pub const EDITOR_PATH: &str = "app";

/// Query parameter carrying the room id.
pub const ROOM_PARAM: &str = "room";

/// Build `<app>/app?room=<id>`.
pub fn room_link(app_url: &str, room_id: &str) -> Result<String, ApiError> {
    let mut url = Url::parse(app_url.trim()).map_err(|e| ApiError::InvalidUrl(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| ApiError::InvalidUrl(app_url.to_string()))?
        .pop_if_empty()
        .push(EDITOR_PATH);
    url.query_pairs_mut().clear().append_pair(ROOM_PARAM, room_id);
    url.set_fragment(None);
    Ok(url.into())
}

/// Room id from a pasted link or a bare id.
///
/// Input that is not an http(s) link is returned trimmed. A link without a
/// `room` parameter is returned unchanged.
pub fn extract_room_id(input: &str) -> String {
    let input = input.trim();
    if !(input.contains("http://") || input.contains("https://")) {
        return input.to_string();
    }
    match Url::parse(input) {
        Ok(url) => url
            .query_pairs()
            .find(|(key, value)| key == ROOM_PARAM && !value.is_empty())
            .map(|(_, value)| value.into_owned())
            .unwrap_or_else(|| input.to_string()),
        Err(_) => input.to_string(),
    }
}

/// Fresh random room id.
pub fn generate_room_id() -> String {
    Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_link() {
        assert_eq!(
            room_link("https://canvas.example.com", "abc123").unwrap(),
            "https://canvas.example.com/app?room=abc123"
        );
        assert_eq!(
            room_link("http://localhost:5173/", "a b").unwrap(),
            "http://localhost:5173/app?room=a+b"
        );
    }

    #[test]
    fn test_room_link_rejects_garbage() {
        assert!(matches!(
            room_link("not a url", "x"),
            Err(ApiError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_extract_from_link() {
        assert_eq!(
            extract_room_id("https://canvas.example.com/app?room=k3j4h5"),
            "k3j4h5"
        );
        assert_eq!(
            extract_room_id("  http://localhost:5173/app?x=1&room=r1  "),
            "r1"
        );
    }

    #[test]
    fn test_extract_bare_id() {
        assert_eq!(extract_room_id("  k3j4h5 "), "k3j4h5");
    }

    #[test]
    fn test_extract_link_without_room() {
        let link = "https://canvas.example.com/dashboard";
        assert_eq!(extract_room_id(link), link);
    }

    #[test]
    fn test_generated_ids_unique() {
        let a = generate_room_id();
        let b = generate_room_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
