//! Client for a posts API that answers `GET <url>` with either a bare array of
//! posts or an object wrapping a `posts` array.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::{error, info, warn};

use crate::error::{BlogError, Result};
use crate::markdown::{rewrite_image_paths, RenderContext};
use crate::models::{is_safe_slug, Blog, Post};

pub const API_TIMEOUT: Duration = Duration::from_secs(10);
pub const API_RETRIES: u32 = 3;

/// One element of the API's post array. Every field is optional so that a
/// single malformed element is skipped instead of failing the whole payload.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct RemotePost {
    #[serde(alias = "slug")]
    pub anchor: Option<String>,
    pub title: Option<String>,
    pub content: Option<String>,
    #[serde(alias = "publishedDate")]
    pub date: Option<String>,
}

impl RemotePost {
    /// Converts to a [`Post`], or `None` when the anchor or title is missing or
    /// the anchor is not a usable slug.
    pub fn into_post(self) -> Option<Post> {
        let anchor = self.anchor.filter(|anchor| is_safe_slug(anchor))?;
        let title = self.title.filter(|title| !title.trim().is_empty())?;
        let content = rewrite_image_paths(
            self.content.as_deref().unwrap_or_default(),
            &RenderContext::bundle(&anchor),
        );
        Some(Post::new(anchor, title, self.date.unwrap_or_default(), content))
    }
}

/// Builds posts from API elements, logging and skipping the invalid ones.
pub fn posts_from_remote(remote: Vec<RemotePost>) -> Vec<Post> {
    remote
        .into_iter()
        .enumerate()
        .filter_map(|(index, remote)| {
            let anchor = remote.anchor.clone();
            let post = remote.into_post();
            if post.is_none() {
                warn!(index, anchor = ?anchor, "Skipping invalid post");
            }
            post
        })
        .collect()
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub enum PostsPayload {
    Wrapped { posts: Vec<serde_json::Value> },
    Bare(Vec<serde_json::Value>),
}

impl PostsPayload {
    /// Decodes each element on its own; elements that are not post objects are logged and dropped.
    pub fn into_posts(self) -> Vec<RemotePost> {
        let elements = match self {
            PostsPayload::Wrapped { posts } | PostsPayload::Bare(posts) => posts,
        };
        elements
            .into_iter()
            .enumerate()
            .filter_map(|(index, element)| match serde_json::from_value(element) {
                Ok(post) => Some(post),
                Err(e) => {
                    warn!(index, "Skipping malformed post: {}", e);
                    None
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct RemoteSource {
    url: String,
    timeout: Duration,
    retries: u32,
}

impl RemoteSource {
    pub fn new(url: impl Into<String>) -> Self {
        RemoteSource {
            url: url.into(),
            timeout: API_TIMEOUT,
            retries: API_RETRIES,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    async fn fetch_once(&self, client: &reqwest::Client) -> Result<Vec<RemotePost>> {
        let response = client.get(&self.url).send().await?;
        if !response.status().is_success() {
            return Err(BlogError::Status(response.status()));
        }
        let body = response.bytes().await?;
        let payload: PostsPayload = serde_json::from_slice(&body)?;
        Ok(payload.into_posts())
    }

    /// Fetches the post list, retrying up to the configured count after the first attempt.
    pub async fn fetch_posts(&self) -> Result<Vec<RemotePost>> {
        let client = reqwest::Client::builder().timeout(self.timeout).build()?;

        let mut attempt = 0;
        loop {
            match self.fetch_once(&client).await {
                Ok(posts) => {
                    info!(url = %self.url, count = posts.len(), "Fetched posts from API");
                    return Ok(posts);
                }
                Err(e) if attempt < self.retries => {
                    attempt += 1;
                    warn!(url = %self.url, attempt, "Fetching posts failed, retrying: {}", e);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Post list as a [`Blog`]; any failure after retries yields an empty blog.
    pub async fn fetch_blog(&self) -> Blog {
        match self.fetch_posts().await {
            Ok(posts) => Blog::from_posts(posts_from_remote(posts)),
            Err(e) => {
                error!(url = %self.url, "Error fetching blog data, falling back to empty blog: {}", e);
                Blog::default()
            }
        }
    }

    /// Writes the fetched posts to `output` as JSON. On failure an empty array is
    /// written and the error is returned.
    pub async fn fetch_to_file(&self, output: &Path) -> Result<usize> {
        match self.fetch_posts().await {
            Ok(remote) => {
                let blog = Blog::from_posts(posts_from_remote(remote));
                write_json(output, &blog.posts).await?;
                for post in &blog.posts {
                    info!(slug = %post.slug, title = %post.title, "Saved post");
                }
                Ok(blog.posts.len())
            }
            Err(e) => {
                warn!(path = %output.display(), "Writing empty posts file as fallback");
                write_json(output, &Vec::<Post>::new()).await?;
                Err(e)
            }
        }
    }
}

async fn write_json<T: serde::Serialize>(output: &Path, value: &T) -> Result<()> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| BlogError::io(parent, e))?;
    }
    let json = serde_json::to_string_pretty(value)?;
    tokio::fs::write(output, json)
        .await
        .map_err(|e| BlogError::io(output, e))
}
