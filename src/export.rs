//! Static-site export: every page the server renders, written to a directory.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tokio::fs;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::config::SiteConfig;
use crate::content_loader::{posts_dir, SiteContent};
use crate::error::{BlogError, Result};
use crate::markdown::syntax_stylesheet;
use crate::models::{is_safe_slug, Post};
use crate::render::{
    render_home_page, render_lets_talk_page, render_not_found_page, render_post_page,
};
use crate::sitemap::{render_robots, render_sitemap};

#[derive(Debug, Default)]
pub struct ExportReport {
    pub pages: Vec<PathBuf>,
    pub skipped: Vec<String>,
    pub copied_files: usize,
}

async fn write_file(path: &Path, contents: impl AsRef<[u8]>) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| BlogError::io(parent, e))?;
    }
    fs::write(path, contents)
        .await
        .map_err(|e| BlogError::io(path, e))
}

fn copy_tree(from: &Path, to: &Path) -> Result<usize> {
    let mut copied = 0;
    for entry in WalkDir::new(from) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(from).to_path_buf();
            BlogError::io(path, e.into())
        })?;
        let Ok(relative) = entry.path().strip_prefix(from) else {
            continue;
        };
        let target = to.join(relative);
        // Symlinks are not followed, so a link back up the tree cannot loop.
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target).map_err(|e| BlogError::io(&target, e))?;
        } else if entry.file_type().is_file() {
            std::fs::copy(entry.path(), &target).map_err(|e| BlogError::io(entry.path(), e))?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Copies a directory tree, returning the number of files copied. A missing source copies nothing.
async fn copy_dir(from: &Path, to: &Path) -> Result<usize> {
    if !from.is_dir() {
        return Ok(0);
    }
    let (source, target) = (from.to_path_buf(), to.to_path_buf());
    tokio::task::spawn_blocking(move || copy_tree(&source, &target))
        .await
        .map_err(|e| BlogError::io(from, std::io::Error::other(e)))?
}

fn is_exportable(post: &Post) -> bool {
    is_safe_slug(&post.slug) && !post.title.trim().is_empty() && !post.content.trim().is_empty()
}

pub async fn export_site(
    content: &SiteContent,
    site: &SiteConfig,
    out_dir: &Path,
    today: NaiveDate,
) -> Result<ExportReport> {
    let mut report = ExportReport::default();

    let mut pages = vec![
        (out_dir.join("index.html"), render_home_page(content, site)),
        (out_dir.join("lets-talk/index.html"), render_lets_talk_page(content, site)),
        (out_dir.join("404.html"), render_not_found_page(None, content, site)),
    ];

    let mut exported = Vec::new();
    for post in &content.blog.posts {
        if !is_exportable(post) {
            warn!(slug = %post.slug, "Skipping invalid post");
            report.skipped.push(post.slug.clone());
            continue;
        }
        exported.push(post);
    }

    for post in &exported {
        let html = render_post_page(post, content, site);
        pages.push((out_dir.join("blog").join(&post.slug).join("index.html"), html.clone()));
        pages.push((out_dir.join("blog").join(format!("{}.html", post.slug)), html));
    }

    for (path, html) in pages {
        write_file(&path, html).await?;
        info!(page = %path.display(), "Generated");
        report.pages.push(path);
    }

    write_file(&out_dir.join("sitemap.xml"), render_sitemap(&content.blog, site, today)).await?;
    write_file(&out_dir.join("robots.txt"), render_robots(site)).await?;
    write_file(&out_dir.join("assets/syntax.css"), syntax_stylesheet()).await?;

    let content_dir = &site.content_dir;
    report.copied_files += copy_dir(&content_dir.join("images"), &out_dir.join("images")).await?;
    report.copied_files += copy_dir(&content_dir.join("static"), &out_dir.join("static")).await?;
    for post in &exported {
        let bundle_images = posts_dir(content_dir).join(&post.slug).join("images");
        let target = out_dir.join("blog").join(&post.slug).join("images");
        report.copied_files += copy_dir(&bundle_images, &target).await?;
    }

    info!(
        pages = report.pages.len(),
        skipped = report.skipped.len(),
        files = report.copied_files,
        out = %out_dir.display(),
        "Static export finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content_loader::load_content;
    use crate::models::Blog;

    #[tokio::test]
    async fn exports_repository_content() {
        let config = SiteConfig {
            content_dir: Path::new(env!("CARGO_MANIFEST_DIR")).join("content"),
            ..Default::default()
        };
        let content = load_content(&config).await.unwrap();
        let out = tempfile::tempdir().unwrap();
        let today = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();

        let report = export_site(&content, &config, out.path(), today).await.unwrap();
        assert!(report.skipped.is_empty());

        for page in [
            "index.html",
            "404.html",
            "lets-talk/index.html",
            "blog/let-go/index.html",
            "blog/let-go.html",
            "blog/hello-world/index.html",
            "sitemap.xml",
            "robots.txt",
            "assets/syntax.css",
            "images/hello-world/diagram.svg",
            "blog/let-go/images/balloon.svg",
            "static/site.css",
        ] {
            assert!(out.path().join(page).is_file(), "missing {page}");
        }

        let post = std::fs::read_to_string(out.path().join("blog/hello-world.html")).unwrap();
        assert!(post.contains("data-language=\"java\""));

        let not_found = std::fs::read_to_string(out.path().join("404.html")).unwrap();
        assert!(not_found.contains("Page Not Found"));
        assert!(!not_found.contains("<code></code>"));
    }

    #[tokio::test]
    async fn never_writes_outside_the_output_directory() {
        let dir = tempfile::tempdir().unwrap();
        let site_dir = dir.path().join("site");
        let config = SiteConfig {
            content_dir: site_dir.join("content"),
            ..Default::default()
        };
        let content = SiteContent {
            blog: Blog::from_posts(vec![
                Post::new("../../escaped".into(), "Escaped".into(), "2024-01-01".into(), "<p>x</p>".into()),
                Post::new("safe".into(), "Safe".into(), "2024-01-02".into(), "<p>y</p>".into()),
            ]),
            ..Default::default()
        };
        let out = site_dir.join("dist");
        let today = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();

        let report = export_site(&content, &config, &out, today).await.unwrap();
        assert_eq!(report.skipped, ["../../escaped"]);
        assert!(out.join("blog/safe.html").is_file());

        let mut siblings: Vec<String> = std::fs::read_dir(&site_dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        siblings.sort();
        assert_eq!(siblings, ["dist"]);
        assert!(!dir.path().join("escaped.html").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn copying_images_ignores_symlink_loops() {
        let dir = tempfile::tempdir().unwrap();
        let images = dir.path().join("images");
        std::fs::create_dir_all(images.join("nested")).unwrap();
        std::fs::write(images.join("nested/a.png"), b"png").unwrap();
        std::os::unix::fs::symlink(".", images.join("nested/loop")).unwrap();

        let target = dir.path().join("out/images");
        let copied = copy_dir(&images, &target).await.unwrap();
        assert_eq!(copied, 1);
        assert!(target.join("nested/a.png").is_file());
        assert!(!target.join("nested/loop").exists());
    }

    #[tokio::test]
    async fn skips_posts_without_content() {
        let dir = tempfile::tempdir().unwrap();
        let config = SiteConfig {
            content_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        let content = SiteContent {
            blog: Blog::from_posts(vec![
                Post::new("empty".into(), "Empty".into(), "2024-01-01".into(), String::new()),
                Post::new("full".into(), "Full".into(), "2024-01-02".into(), "<p>x</p>".into()),
            ]),
            ..Default::default()
        };
        let out = dir.path().join("dist");
        let today = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();

        let report = export_site(&content, &config, &out, today).await.unwrap();
        assert_eq!(report.skipped, ["empty"]);
        assert!(out.join("blog/full.html").is_file());
        assert!(!out.join("blog/empty.html").exists());
        assert_eq!(report.copied_files, 0);
    }
}
