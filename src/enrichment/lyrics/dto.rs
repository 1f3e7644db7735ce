//! Wire format for the lyrics lookup response.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct LyricsResponse {
    #[serde(rename = "plainLyrics")]
    pub plain_lyrics: Option<String>,
    #[serde(rename = "syncedLyrics")]
    pub synced_lyrics: Option<String>,
}

#[cfg(test)]
mod contract_tests {
    use super::*;

    #[test]
    fn test_parse_plain_lyrics_response() {
        let json = r#"{"plainLyrics": "la la la", "syncedLyrics": null}"#;
        let response: LyricsResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.plain_lyrics.as_deref(), Some("la la la"));
        assert!(response.synced_lyrics.is_none());
    }
}
