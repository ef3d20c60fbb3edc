use crate::error::{Error, Result};
use async_trait::async_trait;
use yt_transcript_rs::{FetchedTranscript, api::YouTubeTranscriptApi};

/// Anything that can hand back the caption text of a video.
#[async_trait(?Send)]
pub trait TranscriptSource {
    /// Caption text in temporal order, or `None` when the video has none.
    async fn transcript(&self, video_id: &str) -> Result<Option<String>>;
}

#[derive(Clone)]
pub struct TranscriptService {
    api: YouTubeTranscriptApi,
    languages: Vec<String>,
}

impl TranscriptService {
    pub fn new(languages: Vec<String>) -> Result<Self> {
        let api = YouTubeTranscriptApi::new(None, None, None)
            .map_err(|e| Error::custom(format!("Failed to create transcript client: {e}")))?;
        Ok(Self { api, languages })
    }

    pub async fn fetch_transcript(&self, video_id: &str) -> Result<FetchedTranscript> {
        let languages: Vec<&str> = self.languages.iter().map(String::as_str).collect();

        self.api
            .fetch_transcript(video_id, &languages, false)
            .await
            .map_err(|e| Error::custom(format!("Failed to fetch transcript: {e}")))
    }

    pub fn join_transcript(transcript: &FetchedTranscript) -> String {
        join_captions(transcript.snippets.iter().map(|snippet| snippet.text.as_str()))
    }
}

#[async_trait(?Send)]
impl TranscriptSource for TranscriptService {
    async fn transcript(&self, video_id: &str) -> Result<Option<String>> {
        match self.fetch_transcript(video_id).await {
            Ok(transcript) => {
                let text = Self::join_transcript(&transcript);
                if text.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(text))
                }
            }
            Err(e) => {
                tracing::warn!(video_id, error = %e, "transcript unavailable");
                Ok(None)
            }
        }
    }
}

/// Joins caption lines with single spaces, decoding the HTML entities the
/// caption endpoint leaves in (`&#39;`, `&amp;`, ...).
pub fn join_captions<'a, I>(lines: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    lines
        .into_iter()
        .map(|line| html_escape::decode_html_entities(line.trim()).into_owned())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn extract_video_id(url: &str) -> Option<String> {
    // Extract video ID from various YouTube URL formats
    let raw_id = if let Some(v_param) = url.split("v=").nth(1) {
        v_param.split('&').next().unwrap_or(v_param)
    } else if let Some(youtu_be) = url.split("youtu.be/").nth(1) {
        youtu_be.split('?').next().unwrap_or(youtu_be)
    } else if let Some(short) = url.split("/shorts/").nth(1) {
        short.split('?').next().unwrap_or(short)
    } else {
        url
    };

    sanitize_video_id(raw_id).ok()
}

const MAX_VIDEO_ID_LEN: usize = 128;

/// Ensure a video identifier is safe for downstream use (database keys, API calls, etc.).
/// Only ASCII alphanumeric characters plus `_` and `-` are allowed.
pub fn sanitize_video_id(raw: &str) -> Result<String> {
    let trimmed = raw.trim();

    if trimmed.is_empty() {
        return Err(Error::custom("Video ID cannot be empty"));
    }

    if trimmed.len() > MAX_VIDEO_ID_LEN {
        return Err(Error::custom("Video ID is unexpectedly long"));
    }

    if !trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
    {
        return Err(Error::custom(
            "Video ID contains unsupported characters; expected only letters, numbers, '-' or '_'",
        ));
    }

    Ok(trimmed.to_string())
}
