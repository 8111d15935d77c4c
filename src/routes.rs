use std::path::{Component, Path as FsPath, PathBuf};
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode, Uri},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, get_service},
    Json, Router,
};
use serde_json::json;
use tokio::fs;
use tower_http::{
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use tracing::{debug, error};

use crate::content_loader::posts_dir;
use crate::hot_reload::ws_handler;
use crate::models::is_safe_slug;
use crate::navigation::select_post;
use crate::render::{
    render_home_page, render_lets_talk_page, render_not_found_page, render_post_page,
};
use crate::sitemap::{render_robots, render_sitemap};
use crate::state::{AppState, RefreshBroadcaster, RouterState};

const IMMUTABLE_CACHE: &str = "public, max-age=31536000, immutable";

pub fn build_router(app_state: Arc<AppState>, broadcaster: RefreshBroadcaster) -> Router {
    let content_dir = app_state.config.content_dir.clone();
    let static_dir = content_dir.join("static");

    let router_state = RouterState {
        app_state,
        broadcaster,
    };

    Router::new()
        .route("/", get(homepage))
        .route("/blog", get(blog_index))
        .route("/blog/{slug}", get(render_post))
        .route("/blog/{slug}/images/{*path}", get(post_image))
        .route("/lets-talk", get(lets_talk))
        .route("/api/posts", get(api_posts))
        .route("/api/posts/{slug}", get(api_post))
        .route("/sitemap.xml", get(sitemap))
        .route("/robots.txt", get(robots))
        .route("/assets/syntax.css", get(syntax_css))
        .route("/ws", get(ws_handler))
        .nest_service("/images", get_service(ServeDir::new(content_dir.join("images"))))
        .nest_service("/static", get_service(ServeDir::new(&static_dir)))
        .route_service("/favicon.ico", get_service(ServeFile::new(static_dir.join("favicon.ico"))))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(router_state)
}

async fn homepage(State(state): State<Arc<AppState>>) -> Html<String> {
    let content = state.content.read().await;
    Html(render_home_page(&content, &state.config))
}

async fn blog_index(State(state): State<Arc<AppState>>) -> Html<String> {
    let content = state.content.read().await;
    match select_post(&content.blog.posts, None) {
        Some(selection) => Html(render_post_page(selection.post, &content, &state.config)),
        None => Html(render_home_page(&content, &state.config)),
    }
}

async fn render_post(Path(slug): Path<String>, State(state): State<Arc<AppState>>) -> Response {
    let content = state.content.read().await;
    match select_post(&content.blog.posts, Some(&slug)) {
        Some(selection) if !selection.fell_back => {
            Html(render_post_page(selection.post, &content, &state.config)).into_response()
        }
        Some(selection) => {
            debug!(requested = %slug, fallback = %selection.post.slug, "Unknown post, redirecting");
            Redirect::temporary(&format!("/blog/{}", selection.post.slug)).into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            Html(render_not_found_page(Some(&slug), &content, &state.config)),
        )
            .into_response(),
    }
}

async fn not_found(uri: Uri, State(state): State<Arc<AppState>>) -> Response {
    let content = state.content.read().await;
    (
        StatusCode::NOT_FOUND,
        Html(render_not_found_page(Some(uri.path()), &content, &state.config)),
    )
        .into_response()
}

async fn lets_talk(State(state): State<Arc<AppState>>) -> Html<String> {
    let content = state.content.read().await;
    Html(render_lets_talk_page(&content, &state.config))
}

async fn api_posts(State(state): State<Arc<AppState>>) -> Response {
    let content = state.content.read().await;
    Json(&content.blog).into_response()
}

async fn api_post(Path(slug): Path<String>, State(state): State<Arc<AppState>>) -> Response {
    let content = state.content.read().await;
    match content.blog.get_post_by_slug(&slug) {
        Some(post) => Json(post).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "Post not found" })),
        )
            .into_response(),
    }
}

async fn sitemap(State(state): State<Arc<AppState>>) -> Response {
    let content = state.content.read().await;
    let today = chrono::Utc::now().date_naive();
    (
        [(header::CONTENT_TYPE, "application/xml")],
        render_sitemap(&content.blog, &state.config, today),
    )
        .into_response()
}

async fn robots(State(state): State<Arc<AppState>>) -> Response {
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        render_robots(&state.config),
    )
        .into_response()
}

async fn syntax_css(State(state): State<Arc<AppState>>) -> Response {
    (
        [(header::CONTENT_TYPE, "text/css; charset=utf-8")],
        state.syntax_css.clone(),
    )
        .into_response()
}

/// Resolves `<content>/posts/<slug>/images/<path>`, refusing anything that escapes the posts directory.
pub fn resolve_post_image(content_dir: &FsPath, slug: &str, path: &str) -> Option<PathBuf> {
    if !is_safe_slug(slug) {
        return None;
    }
    let relative = FsPath::new(slug).join("images").join(path);
    let plain = relative
        .components()
        .all(|component| matches!(component, Component::Normal(_)));
    plain.then(|| posts_dir(content_dir).join(relative))
}

pub fn content_type_for(path: &FsPath) -> String {
    mime_guess::from_path(path).first_or_octet_stream().to_string()
}

async fn post_image(
    Path((slug, path)): Path<(String, String)>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let content_dir = &state.config.content_dir;
    let Some(file_path) = resolve_post_image(content_dir, &slug, &path) else {
        return (StatusCode::FORBIDDEN, "Forbidden").into_response();
    };

    // Symlinks inside a bundle must still land inside the posts directory.
    if let (Ok(resolved), Ok(root)) = (
        fs::canonicalize(&file_path).await,
        fs::canonicalize(posts_dir(content_dir)).await,
    ) {
        if !resolved.starts_with(&root) {
            return (StatusCode::FORBIDDEN, "Forbidden").into_response();
        }
    }

    match fs::read(&file_path).await {
        Ok(bytes) => (
            [
                (header::CONTENT_TYPE, content_type_for(&file_path)),
                (header::CACHE_CONTROL, IMMUTABLE_CACHE.to_string()),
            ],
            bytes,
        )
            .into_response(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            (StatusCode::NOT_FOUND, "Not Found").into_response()
        }
        Err(e) => {
            error!(path = %file_path.display(), "Error serving content image: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tokio::sync::broadcast;
    use tower::ServiceExt;

    use super::*;
    use crate::config::SiteConfig;
    use crate::content_loader::load_content;

    async fn router_for(content_dir: &FsPath) -> Router {
        let config = SiteConfig {
            content_dir: content_dir.to_path_buf(),
            ..Default::default()
        };
        let content = load_content(&config).await.unwrap();
        let (tx, _rx) = broadcast::channel(1);
        build_router(Arc::new(AppState::new(config, content)), tx)
    }

    async fn repo_router() -> Router {
        router_for(&FsPath::new(env!("CARGO_MANIFEST_DIR")).join("content")).await
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, axum::http::HeaderMap, String) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, headers, String::from_utf8_lossy(&bytes).into_owned())
    }

    #[tokio::test]
    async fn homepage_renders_latest_post() {
        let (status, _, body) = get(repo_router().await, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("<h1 class=\"article-title\">Hello World</h1>"));
        assert!(body.contains("href=\"/blog/let-go\""));
    }

    #[tokio::test]
    async fn renders_post_by_slug() {
        let (status, _, body) = get(repo_router().await, "/blog/let-go").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("<title>Let Go - BuyAllMemes Blog</title>"));
        assert!(body.contains("src=\"/blog/let-go/images/balloon.svg\""));
    }

    #[tokio::test]
    async fn unknown_post_redirects_to_first_post() {
        let (status, headers, _) = get(repo_router().await, "/blog/does-not-exist").await;
        assert_eq!(status, StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(headers[header::LOCATION], "/blog/hello-world");
    }

    #[tokio::test]
    async fn unknown_post_without_posts_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("posts")).unwrap();
        let (status, _, body) = get(router_for(dir.path()).await, "/blog/anything").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.contains("anything"));
    }

    #[tokio::test]
    async fn serves_bundled_images_with_cache_headers() {
        let (status, headers, body) =
            get(repo_router().await, "/blog/let-go/images/balloon.svg").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CONTENT_TYPE], "image/svg+xml");
        assert_eq!(headers[header::CACHE_CONTROL], IMMUTABLE_CACHE);
        assert!(body.starts_with("<svg"));

        let (status, _, _) = get(repo_router().await, "/blog/let-go/images/missing.png").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn image_paths_cannot_escape_the_posts_directory() {
        let root = FsPath::new("content");
        assert_eq!(
            resolve_post_image(root, "let-go", "a/b.png"),
            Some(PathBuf::from("content/posts/let-go/images/a/b.png"))
        );
        assert!(resolve_post_image(root, "let-go", "../../../secret").is_none());
        assert!(resolve_post_image(root, "..", "x.png").is_none());
        assert!(resolve_post_image(root, "let-go", "/etc/passwd").is_none());
    }

    #[test]
    fn content_types_follow_extension() {
        assert_eq!(content_type_for(FsPath::new("a.JPG")), "image/jpeg");
        assert_eq!(content_type_for(FsPath::new("a.webp")), "image/webp");
        assert_eq!(content_type_for(FsPath::new("a.avif")), "image/avif");
        assert_eq!(content_type_for(FsPath::new("favicon.ico")), "image/x-icon");
        assert_eq!(content_type_for(FsPath::new("a.bmp")), "image/bmp");
        assert_eq!(content_type_for(FsPath::new("a.bin")), "application/octet-stream");
        assert_eq!(content_type_for(FsPath::new("no-extension")), "application/octet-stream");
    }

    #[tokio::test]
    async fn serves_flat_post_images() {
        let (status, _, body) = get(repo_router().await, "/images/hello-world/diagram.svg").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.starts_with("<svg"));
    }

    #[tokio::test]
    async fn api_lists_posts_wrapped_in_blog() {
        let (status, _, body) = get(repo_router().await, "/api/posts").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["posts"][0]["slug"], "hello-world");
        assert_eq!(json["posts"][1]["formattedDate"], "January 15, 2024");
    }

    #[tokio::test]
    async fn api_reports_missing_post() {
        let (status, _, body) = get(repo_router().await, "/api/posts/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.contains("Post not found"));
    }

    #[tokio::test]
    async fn serves_sitemap_robots_and_stylesheet() {
        let (status, headers, body) = get(repo_router().await, "/sitemap.xml").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CONTENT_TYPE], "application/xml");
        assert!(body.contains("https://buyallmemes.com/blog/let-go"));

        let (_, _, body) = get(repo_router().await, "/robots.txt").await;
        assert!(body.contains("Sitemap: https://buyallmemes.com/sitemap.xml"));

        let (_, headers, body) = get(repo_router().await, "/assets/syntax.css").await;
        assert!(headers[header::CONTENT_TYPE].to_str().unwrap().starts_with("text/css"));
        assert!(body.contains(".hl-"));
    }

    #[tokio::test]
    async fn lets_talk_and_unknown_routes() {
        let (status, _, body) = get(repo_router().await, "/lets-talk").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("ProfessionalService"));

        let (status, _, _) = get(repo_router().await, "/no/such/page").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
