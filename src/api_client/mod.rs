// HTTP client for the content backend: reading progress and chapter listings

use reqwest::StatusCode;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::domain::mapping::{map_chapter, map_progress};
use crate::domain::models::{
    ChapterOrdinal, Percent, ProgressKey, RemoteProgress, validate_key_part,
};
use crate::error::{ReadingError, Result};
use crate::reading::chapter_number_from_key;
use crate::storage::{ChapterSource, ProgressStore};

const CHAPTER_PAGE_LIMIT: i64 = 100;
/// Upper bound on listing pages followed for one work.
const MAX_CHAPTER_PAGES: i64 = 500;

#[derive(Clone, Debug)]
pub struct ContentApiClient {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl ContentApiClient {
    /// Create a new client with the given base URL (e.g. "http://localhost:8000").
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder().build()?;
        let base_url_str = base_url.into();
        tracing::debug!(base_url = %base_url_str, "creating ContentApiClient");
        Ok(ContentApiClient {
            base_url: base_url_str.trim_end_matches('/').to_string(),
            api_key: None,
            client,
        })
    }

    /// Return a client sending the key as a Bearer token. An empty key sends nothing.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        let api_key = api_key.into();
        self.api_key = (!api_key.is_empty()).then_some(api_key);
        self
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn auth_header(&self) -> Option<(String, String)> {
        self.api_key
            .as_ref()
            .map(|k| ("Authorization".to_string(), format!("Bearer {}", k)))
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.auth_header() {
            Some((k, v)) => req.header(&k, &v),
            None => req,
        }
    }

    /// The backend addresses chapters by number: `chapter-3` becomes `3`.
    pub fn progress_url(&self, key: &ProgressKey) -> String {
        let chapter = chapter_number_from_key(key.chapter_key())
            .map(|n| n.to_string())
            .unwrap_or_else(|| key.chapter_key().to_string());
        self.url(&format!("/api/{}/{}/progress", key.work_key(), chapter))
    }

    pub fn chapters_url(&self, work_key: &str) -> String {
        self.url(&format!("/api/chapters/novel/{}", work_key))
    }

    /// GET /api/{work}/{chapter}/progress; 404 means nothing stored
    #[tracing::instrument(level = "debug", skip(self, key), fields(key = %key))]
    pub async fn get_progress(&self, key: &ProgressKey) -> Result<Option<ProgressDto>> {
        let url = self.progress_url(key);
        tracing::debug!(%url, "GET progress");
        let resp = self.authorized(self.client.get(&url)).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = resp.error_for_status()?.text().await?;
        let parsed: ApiResponse<ProgressDto> = parse_body(&body, "progress")?;
        if !parsed.success {
            tracing::debug!(%url, error = parsed.error.as_deref().unwrap_or(""), "backend reported no progress");
            return Ok(None);
        }
        Ok(parsed.data)
    }

    /// POST /api/{work}/{chapter}/progress
    #[tracing::instrument(level = "debug", skip(self, key), fields(key = %key))]
    pub async fn post_progress(&self, key: &ProgressKey, percent: Percent) -> Result<()> {
        let url = self.progress_url(key);
        tracing::debug!(%url, %percent, "POST progress");
        let body = ProgressUpdateDto {
            progress: percent.value(),
        };
        self.authorized(self.client.post(&url))
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// GET /api/chapters/novel/{work}; `None` when the work does not exist
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn get_chapter_page(
        &self,
        work_key: &str,
        page: i64,
        limit: i64,
    ) -> Result<Option<PaginatedResponse<ChapterSummaryDto>>> {
        let url = self.chapters_url(work_key);
        tracing::debug!(%url, page, limit, "GET chapters");
        let req = self
            .authorized(self.client.get(&url))
            .query(&[("page", page.to_string()), ("limit", limit.to_string())]);
        let resp = req.send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = resp.error_for_status()?.text().await?;
        parse_body(&body, "chapter listing").map(Some)
    }
}

fn parse_body<T: DeserializeOwned>(body: &str, what: &str) -> Result<T> {
    match serde_json::from_str::<T>(body) {
        Ok(parsed) => Ok(parsed),
        Err(e) => {
            let snippet: String = body.chars().take(2000).collect();
            tracing::error!(error = %e, body_snippet = %snippet, "failed to parse {}", what);
            Err(e.into())
        }
    }
}

#[async_trait::async_trait]
impl ProgressStore for ContentApiClient {
    async fn fetch(&self, key: &ProgressKey) -> Result<Option<RemoteProgress>> {
        match self.get_progress(key).await? {
            Some(dto) => map_progress(&dto).map(Some),
            None => Ok(None),
        }
    }

    async fn store(&self, key: &ProgressKey, percent: Percent) -> Result<()> {
        self.post_progress(key, percent).await
    }
}

#[async_trait::async_trait]
impl ChapterSource for ContentApiClient {
    async fn list_ordinals(&self, work_key: &str) -> Result<Vec<ChapterOrdinal>> {
        validate_key_part("work key", work_key)?;
        let mut ordinals = Vec::new();
        let mut page = 1;
        loop {
            let Some(listing) = self
                .get_chapter_page(work_key, page, CHAPTER_PAGE_LIMIT)
                .await?
            else {
                if page == 1 {
                    return Err(ReadingError::UnknownWork(work_key.to_string()));
                }
                break;
            };
            ordinals.extend(listing.data.iter().filter_map(|c| map_chapter(work_key, c)));
            let more = listing
                .pagination
                .as_ref()
                .is_some_and(|p| p.has_next && page < p.total_pages);
            if !more || page >= MAX_CHAPTER_PAGES {
                break;
            }
            page += 1;
        }
        tracing::debug!(%work_key, chapters = ordinals.len(), pages = page, "listed chapters");
        Ok(ordinals)
    }
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct ApiResponse<T> {
    #[serde(default)]
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProgressDto {
    #[serde(deserialize_with = "crate::api_client::de::i64_from_str_or_num")]
    pub progress: i64,
    #[serde(default)]
    pub completed: Option<bool>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ProgressUpdateDto {
    pub progress: u8,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedResponse<T> {
    #[serde(default)]
    pub success: bool,
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    pub pagination: Option<PaginationInfo>,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaginationInfo {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChapterSummaryDto {
    pub title: Option<String>,
    pub slug: Option<String>,
    #[serde(
        deserialize_with = "crate::api_client::de::opt_i64_from_str_or_num",
        default
    )]
    pub chapter_number: Option<i64>,
}

/// Internal serde helpers
pub mod de {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumOrStr {
        Num(i64),
        Float(f64),
        Str(String),
    }

    impl NumOrStr {
        fn into_i64(self) -> Option<i64> {
            match self {
                NumOrStr::Num(n) => Some(n),
                NumOrStr::Float(f) if f.is_finite() => Some(f.round() as i64),
                NumOrStr::Float(_) => None,
                NumOrStr::Str(s) => s.trim().parse::<i64>().ok(),
            }
        }
    }

    /// Accept Option<i64> from a number or a string like "12"; null/"" -> None.
    pub fn opt_i64_from_str_or_num<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let val: Option<NumOrStr> = Option::deserialize(deserializer)?;
        Ok(val.and_then(NumOrStr::into_i64))
    }

    /// Like [`opt_i64_from_str_or_num`] but the value is required.
    pub fn i64_from_str_or_num<'de, D>(deserializer: D) -> Result<i64, D::Error>
    where
        D: Deserializer<'de>,
    {
        NumOrStr::deserialize(deserializer)?
            .into_i64()
            .ok_or_else(|| serde::de::Error::custom("expected an integer"))
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    type Route = fn(&str, &str) -> (u16, String);

    /// Serves canned JSON over plain HTTP/1.1; `route` gets the method and request target.
    async fn serve(route: Route) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = Vec::new();
                    let mut chunk = [0u8; 1024];
                    let head_end = loop {
                        let n = stream.read(&mut chunk).await.unwrap();
                        if n == 0 {
                            return;
                        }
                        buf.extend_from_slice(&chunk[..n]);
                        if let Some(i) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                            break i + 4;
                        }
                    };
                    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
                    let body_len = head
                        .lines()
                        .filter_map(|l| l.split_once(':'))
                        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                        .and_then(|(_, v)| v.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    while buf.len() < head_end + body_len {
                        let n = stream.read(&mut chunk).await.unwrap();
                        if n == 0 {
                            break;
                        }
                        buf.extend_from_slice(&chunk[..n]);
                    }

                    let mut request_line = head.split_whitespace();
                    let method = request_line.next().unwrap_or_default();
                    let target = request_line.next().unwrap_or_default();
                    let (status, body) = route(method, target);
                    let response = format!(
                        "HTTP/1.1 {status} OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    stream.write_all(response.as_bytes()).await.unwrap();
                    let _ = stream.shutdown().await;
                });
            }
        });
        format!("http://{addr}")
    }

    fn chapter_page(numbers: &[u32], page: i64, total_pages: i64) -> String {
        let data: Vec<String> = numbers
            .iter()
            .map(|n| format!(r#"{{ "title": "Chapter {n}", "slug": "chapter-{n}", "chapterNumber": {n} }}"#))
            .collect();
        format!(
            r#"{{ "success": true, "data": [{}], "pagination": {{ "page": {page}, "limit": 100, "total": 4, "totalPages": {total_pages}, "hasNext": {}, "hasPrev": {} }} }}"#,
            data.join(","),
            page < total_pages,
            page > 1
        )
    }

    #[tokio::test]
    async fn fetch_maps_missing_progress_to_none() {
        let base = serve(|_, _| (404, r#"{ "success": false, "error": "Progress not found" }"#.into())).await;
        let client = ContentApiClient::new(base).unwrap();
        assert_eq!(client.fetch(&key("chapter-3")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn fetch_reads_stored_progress() {
        let base = serve(|method, target| match (method, target) {
            ("GET", "/api/shadow-slave/3/progress") => {
                (200, r#"{ "success": true, "data": { "progress": 97 } }"#.into())
            }
            _ => (404, String::new()),
        })
        .await;
        let client = ContentApiClient::new(base).unwrap();
        let found = client.fetch(&key("chapter-3")).await.unwrap().unwrap();
        assert_eq!(found.percent.value(), 97);
        assert!(found.completed);
    }

    #[tokio::test]
    async fn store_failure_is_transient() {
        let base = serve(|method, _| match method {
            "POST" => (503, r#"{ "success": false }"#.into()),
            _ => (404, String::new()),
        })
        .await;
        let client = ContentApiClient::new(base).unwrap();
        let err = client
            .store(&key("chapter-3"), Percent::clamped(40))
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn store_posts_progress() {
        let base = serve(|method, target| match (method, target) {
            ("POST", "/api/shadow-slave/3/progress") => (201, r#"{ "success": true }"#.into()),
            _ => (404, String::new()),
        })
        .await;
        let client = ContentApiClient::new(base).unwrap();
        client
            .store(&key("chapter-3"), Percent::clamped(40))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn listing_of_unknown_work_is_an_error() {
        let base = serve(|_, _| (404, r#"{ "success": false }"#.into())).await;
        let client = ContentApiClient::new(base).unwrap();
        let err = client.list_ordinals("no-such-novel").await.unwrap_err();
        assert!(matches!(err, ReadingError::UnknownWork(w) if w == "no-such-novel"));
    }

    #[tokio::test]
    async fn listing_follows_pages_while_has_next() {
        let base = serve(|_, target| match target {
            "/api/chapters/novel/shadow-slave?page=1&limit=100" => (200, chapter_page(&[1, 2], 1, 2)),
            "/api/chapters/novel/shadow-slave?page=2&limit=100" => (200, chapter_page(&[3, 5], 2, 2)),
            _ => (500, String::new()),
        })
        .await;
        let client = ContentApiClient::new(base).unwrap();
        let ordinals = client.list_ordinals("shadow-slave").await.unwrap();
        let positions: Vec<u32> = ordinals.iter().map(|o| o.position).collect();
        assert_eq!(positions, vec![1, 2, 3, 5]);
        assert_eq!(ordinals[3].chapter_key, "chapter-5");
    }

    #[tokio::test]
    async fn listing_rejects_work_key_with_path_delimiters() {
        let client = ContentApiClient::new("http://127.0.0.1:9").unwrap();
        let err = client.list_ordinals("novels/../admin").await.unwrap_err();
        assert!(matches!(err, ReadingError::InvalidInput(_)));
    }

    fn key(chapter: &str) -> ProgressKey {
        ProgressKey::new("shadow-slave", chapter).unwrap()
    }

    #[test]
    fn build_progress_url_strips_chapter_prefix() {
        let c = ContentApiClient::new("http://localhost:8000/").unwrap();
        assert_eq!(
            c.progress_url(&key("chapter-12")),
            "http://localhost:8000/api/shadow-slave/12/progress"
        );
        assert_eq!(
            c.progress_url(&key("prologue")),
            "http://localhost:8000/api/shadow-slave/prologue/progress"
        );
    }

    #[test]
    fn build_chapters_url() {
        let c = ContentApiClient::new("http://localhost:8000").unwrap();
        assert_eq!(
            c.chapters_url("shadow-slave"),
            "http://localhost:8000/api/chapters/novel/shadow-slave"
        );
    }

    #[test]
    fn empty_api_key_sends_no_header() {
        let c = ContentApiClient::new("http://x").unwrap();
        assert_eq!(c.clone().with_api_key("").auth_header(), None);
        assert_eq!(
            c.with_api_key("secret").auth_header(),
            Some(("Authorization".to_string(), "Bearer secret".to_string()))
        );
    }

    #[test]
    fn progress_envelope_deserialize() {
        let json = r#"{ "success": true, "data": { "userId": "u1", "novelId": "n1", "chapterId": "chapter-3", "chapterNumber": 3, "progress": 42, "lastReadAt": "2025-06-01T10:00:00Z", "totalTimeSpent": 12 } }"#;
        let parsed: ApiResponse<ProgressDto> = serde_json::from_str(json).unwrap();
        assert!(parsed.success);
        let data = parsed.data.unwrap();
        assert_eq!(data.progress, 42);
        assert_eq!(data.completed, None);
    }

    #[test]
    fn progress_accepts_string_and_float_values() {
        let s: ProgressDto = serde_json::from_str(r#"{ "progress": "57" }"#).unwrap();
        assert_eq!(s.progress, 57);
        let f: ProgressDto = serde_json::from_str(r#"{ "progress": 66.6, "completed": false }"#).unwrap();
        assert_eq!(f.progress, 67);
        assert!(serde_json::from_str::<ProgressDto>(r#"{ "progress": "lots" }"#).is_err());
    }

    #[test]
    fn failed_envelope_deserialize() {
        let json = r#"{ "success": false, "error": "Progress not found" }"#;
        let parsed: ApiResponse<ProgressDto> = serde_json::from_str(json).unwrap();
        assert!(!parsed.success);
        assert_eq!(parsed.data, None);
        assert_eq!(parsed.error.as_deref(), Some("Progress not found"));
    }

    #[test]
    fn update_body_serialize() {
        let body = serde_json::to_string(&ProgressUpdateDto { progress: 80 }).unwrap();
        assert_eq!(body, r#"{"progress":80}"#);
    }

    #[test]
    fn chapter_listing_deserialize_example() {
        let json = r#"{
    "success": true,
    "data": [
        { "id": "c1", "title": "Nightmare Begins", "slug": "chapter-1", "chapterNumber": 1, "wordCount": 2310, "publishedAt": "2024-01-01", "isLocked": false },
        { "id": "c2", "title": "Survival", "slug": "chapter-2", "chapterNumber": "2", "wordCount": 2875, "publishedAt": "2024-01-02", "isLocked": false },
        { "id": "c5", "title": "Untitled", "slug": null, "chapterNumber": null, "wordCount": 0, "publishedAt": "2024-01-05", "isLocked": true }
    ],
    "pagination": { "page": 1, "limit": 100, "total": 3, "totalPages": 1, "hasNext": false, "hasPrev": false }
}"#;
        let parsed: PaginatedResponse<ChapterSummaryDto> = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.data.len(), 3);
        assert_eq!(parsed.data[1].chapter_number, Some(2));
        assert_eq!(parsed.data[2].chapter_number, None);
        let pagination = parsed.pagination.unwrap();
        assert_eq!(pagination.total_pages, 1);
        assert!(!pagination.has_next);

        let ordinals: Vec<_> = parsed
            .data
            .iter()
            .filter_map(|c| map_chapter("shadow-slave", c))
            .collect();
        assert_eq!(ordinals.len(), 2);
        assert_eq!(ordinals[1].chapter_key, "chapter-2");
    }
}
