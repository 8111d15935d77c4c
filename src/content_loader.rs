use std::path::{Path, PathBuf};

use futures::stream::{self, StreamExt};
use gray_matter::{engine::YAML, Matter};
use tokio::fs;
use tracing::{error, info, warn};

use crate::config::SiteConfig;
use crate::error::{BlogError, Result};
use crate::markdown::{render_markdown_to_html, RenderContext};
use crate::models::{Blog, FrontMatter, Post};
use crate::remote::RemoteSource;
use crate::state::AppState;

const DEFAULT_LAYOUT: &str = include_str!("../content/layout.html");
const DEFAULT_NOT_FOUND: &str = include_str!("../content/not_found.html");
const DEFAULT_LETS_TALK: &str = include_str!("../content/lets-talk.md");
const BUNDLE_ENTRY_FILES: [&str; 2] = ["index.md", "post.md"];
const LOAD_CONCURRENCY: usize = 8;

/// Page templates read from the content directory, with the bundled copies as fallback.
#[derive(Debug, Clone)]
pub struct Templates {
    pub layout: String,
    pub banner: String,
    pub not_found: String, // supports {{slug}} placeholder
    pub lets_talk: String,
}

impl Default for Templates {
    fn default() -> Self {
        Templates {
            layout: DEFAULT_LAYOUT.to_string(),
            banner: String::new(),
            not_found: DEFAULT_NOT_FOUND.to_string(),
            lets_talk: render_markdown_to_html(DEFAULT_LETS_TALK, &RenderContext::flat()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SiteContent {
    pub templates: Templates,
    pub blog: Blog,
}

/// A markdown file found under `posts/`, either flat or bundled in its own directory.
#[derive(Debug, Clone, PartialEq)]
pub struct PostSource {
    pub slug: String,
    pub path: PathBuf,
    pub bundled: bool,
}

/// Slug for a flat post file: `20240329-hello-world.md` becomes `hello-world`.
pub fn slug_from_filename(filename: &str) -> String {
    let stem = filename.strip_suffix(".md").unwrap_or(filename);
    match stem.split_once('-') {
        Some((prefix, rest))
            if prefix.len() == 8 && prefix.bytes().all(|b| b.is_ascii_digit()) && !rest.is_empty() =>
        {
            rest.to_string()
        }
        _ => stem.to_string(),
    }
}

pub fn posts_dir(content_dir: &Path) -> PathBuf {
    content_dir.join("posts")
}

/// Lists post sources under `posts/`. A missing directory yields no posts.
pub async fn discover_posts(content_dir: &Path) -> Result<Vec<PostSource>> {
    let dir = posts_dir(content_dir);
    let mut entries = match fs::read_dir(&dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %dir.display(), "Posts directory not found, serving no posts");
            return Ok(Vec::new());
        }
        Err(e) => return Err(BlogError::io(&dir, e)),
    };
    let mut sources = Vec::new();

    while let Some(entry) = entries.next_entry().await.map_err(|e| BlogError::io(&dir, e))? {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
            continue;
        };
        if name.starts_with('.') {
            continue;
        }

        if path.is_dir() {
            let entry_file = BUNDLE_ENTRY_FILES
                .iter()
                .map(|file| path.join(file))
                .find(|candidate| candidate.is_file());
            if let Some(entry_file) = entry_file {
                sources.push(PostSource {
                    slug: name,
                    path: entry_file,
                    bundled: true,
                });
            }
        } else if path.extension().map_or(false, |ext| ext == "md") {
            sources.push(PostSource {
                slug: slug_from_filename(&name),
                path,
                bundled: false,
            });
        }
    }

    sources.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(sources)
}

pub fn parse_post(source: &PostSource, file_content: &str) -> Result<Post> {
    let matter = Matter::<YAML>::new();
    let parsed = matter
        .parse::<FrontMatter>(file_content)
        .map_err(|e| BlogError::FrontMatter {
            path: source.path.clone(),
            message: e.to_string(),
        })?;
    let front_matter = parsed.data.ok_or_else(|| BlogError::FrontMatter {
        path: source.path.clone(),
        message: "missing title/date block".to_string(),
    })?;

    let ctx = if source.bundled {
        RenderContext::bundle(&source.slug)
    } else {
        RenderContext::flat()
    };
    let html = render_markdown_to_html(&parsed.content, &ctx);

    Ok(Post::new(
        source.slug.clone(),
        front_matter.title,
        front_matter.date,
        html,
    ))
}

pub async fn load_post(source: &PostSource) -> Result<Post> {
    let file_content = fs::read_to_string(&source.path)
        .await
        .map_err(|e| BlogError::io(&source.path, e))?;
    parse_post(source, &file_content)
}

/// Loads every post under `content_dir`; posts that fail to load are logged and skipped.
pub async fn load_blog(content_dir: &Path) -> Result<Blog> {
    let sources = discover_posts(content_dir).await?;

    let posts: Vec<Post> = stream::iter(sources)
        .map(|source| async move {
            match load_post(&source).await {
                Ok(post) => Some(post),
                Err(e) => {
                    error!(slug = %source.slug, "Skipping post: {}", e);
                    None
                }
            }
        })
        .buffered(LOAD_CONCURRENCY)
        .filter_map(|post| async move { post })
        .collect()
        .await;

    Ok(Blog::from_posts(posts))
}

async fn read_optional(path: PathBuf) -> Result<Option<String>> {
    match fs::read_to_string(&path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(BlogError::io(path, e)),
    }
}

pub async fn load_templates(content_dir: &Path) -> Result<Templates> {
    let defaults = Templates::default();

    let layout = read_optional(content_dir.join("layout.html")).await?;
    let banner = read_optional(content_dir.join("banner.html")).await?;
    let not_found = read_optional(content_dir.join("not_found.html")).await?;
    let lets_talk = read_optional(content_dir.join("lets-talk.md"))
        .await?
        .map(|md| render_markdown_to_html(&md, &RenderContext::flat()));

    Ok(Templates {
        layout: layout.unwrap_or(defaults.layout),
        banner: banner.unwrap_or(defaults.banner),
        not_found: not_found.unwrap_or(defaults.not_found),
        lets_talk: lets_talk.unwrap_or(defaults.lets_talk),
    })
}

pub async fn load_content(config: &SiteConfig) -> Result<SiteContent> {
    let templates = load_templates(&config.content_dir).await?;
    let blog = match &config.api_url {
        Some(url) => {
            RemoteSource::new(url.clone())
                .with_timeout(config.api_timeout())
                .with_retries(config.api_retries)
                .fetch_blog()
                .await
        }
        None => load_blog(&config.content_dir).await?,
    };
    if blog.is_empty() {
        warn!("No posts loaded");
    }
    info!(posts = blog.posts.len(), slugs = ?blog.slugs().collect::<Vec<_>>(), "Content loaded");
    Ok(SiteContent { templates, blog })
}

pub async fn reload_content(app_state: &AppState) {
    info!("Reloading application content...");
    match load_content(&app_state.config).await {
        Ok(content) => {
            *app_state.content.write().await = content;
            info!("Content successfully reloaded.");
        }
        Err(e) => {
            error!("Failed to reload content: {}", e);
        }
    }
}
