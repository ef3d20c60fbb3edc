use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Video {
    pub id: String,
    pub title: String,
}

/// Lists the videos of a collection, oldest page first, pagination hidden.
#[async_trait(?Send)]
pub trait VideoLister {
    async fn list_videos(&self, collection_id: &str) -> Result<Vec<Video>>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemsPage {
    #[serde(default)]
    items: Vec<PlaylistItem>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    #[serde(default)]
    title: String,
    resource_id: ResourceId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceId {
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    code: u16,
    message: String,
}

/// YouTube Data API v3 `playlistItems` client.
#[derive(Debug, Clone)]
pub struct PlaylistClient {
    client: Client,
    api_key: String,
    base_url: String,
    page_size: u32,
}

impl PlaylistClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>, page_size: u32) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            page_size,
        }
    }

    async fn fetch_page(
        &self,
        playlist_id: &str,
        page_token: Option<&str>,
    ) -> Result<PlaylistItemsPage> {
        let url = format!("{}/playlistItems", self.base_url);
        let page_size = self.page_size.to_string();

        let mut query = vec![
            ("part", "snippet"),
            ("playlistId", playlist_id),
            ("maxResults", page_size.as_str()),
            ("key", self.api_key.as_str()),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token));
        }

        let response = self.client.get(&url).query(&query).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let (code, message) = serde_json::from_str::<ApiErrorResponse>(&body)
                .ok()
                .and_then(|e| e.error)
                .map(|e| (e.code, e.message))
                .unwrap_or((status.as_u16(), body));

            tracing::error!(code, message = %message, "YouTube playlistItems request failed");
            return Err(Error::custom(format!(
                "Failed to list playlist {playlist_id}: {code} {message}"
            )));
        }

        Ok(response.json().await?)
    }
}

#[async_trait(?Send)]
impl VideoLister for PlaylistClient {
    async fn list_videos(&self, playlist_id: &str) -> Result<Vec<Video>> {
        let mut videos = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self.fetch_page(playlist_id, page_token.as_deref()).await?;
            tracing::debug!(items = page.items.len(), "fetched playlist page");

            videos.extend(page.items.into_iter().filter_map(|item| {
                let Snippet { title, resource_id } = item.snippet;
                resource_id.video_id.map(|id| Video { id, title })
            }));

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(videos)
    }
}
