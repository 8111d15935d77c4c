use htmlescape::encode_minimal;

use crate::models::Post;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Selection<'a> {
    pub post: &'a Post,
    /// The requested slug was absent or unknown and the first post was chosen instead.
    pub fell_back: bool,
}

/// Picks the active post for a requested slug, defaulting to the first post.
pub fn select_post<'a>(posts: &'a [Post], requested: Option<&str>) -> Option<Selection<'a>> {
    let requested = requested.map(str::trim).filter(|slug| !slug.is_empty());

    if let Some(post) = requested.and_then(|slug| posts.iter().find(|p| p.slug == slug)) {
        return Some(Selection {
            post,
            fell_back: false,
        });
    }

    posts.first().map(|post| Selection {
        post,
        fell_back: true,
    })
}

pub fn render_sidebar(posts: &[Post], active_slug: Option<&str>) -> String {
    let mut html = String::from("<aside class=\"sidebar\">\n<h2 class=\"sidebar-title\">All Posts</h2>\n");

    if posts.is_empty() {
        html.push_str("<div class=\"sidebar-empty\"><p class=\"sidebar-empty-text\">No posts available</p></div>\n");
    } else {
        html.push_str("<ul class=\"sidebar-list\">\n");
        for post in posts {
            let active = if active_slug == Some(post.slug.as_str()) {
                " active"
            } else {
                ""
            };
            html.push_str(&format!(
                "<li class=\"sidebar-item\"><a href=\"/blog/{}\" class=\"sidebar-link{}\">{}<div class=\"sidebar-date\">{}</div></a></li>\n",
                encode_minimal(&post.slug),
                active,
                encode_minimal(&post.title),
                encode_minimal(&post.formatted_date),
            ));
        }
        html.push_str("</ul>\n");
    }

    html.push_str("</aside>\n");
    html
}
