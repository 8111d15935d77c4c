use std::cmp::Reverse;
use std::collections::HashSet;
use std::path::{Component, Path};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::dates::{display_date, parse_post_date};
use crate::markdown::{count_words, create_excerpt, EXCERPT_LENGTH};

#[derive(Deserialize, Debug, Clone)]
pub struct FrontMatter {
    pub title: String,
    pub date: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub slug: String,
    pub title: String,
    pub date: String,
    pub formatted_date: String,
    pub content: String,
    pub excerpt: String,
    pub word_count: usize,
}

impl Post {
    /// Builds a post from rendered HTML, deriving the display date, excerpt and word count.
    pub fn new(slug: String, title: String, date: String, content: String) -> Self {
        Post {
            formatted_date: display_date(&date),
            excerpt: create_excerpt(&content, EXCERPT_LENGTH),
            word_count: count_words(&content),
            slug,
            title,
            date,
            content,
        }
    }

    pub fn published_on(&self) -> Option<chrono::NaiveDate> {
        parse_post_date(&self.date).ok()
    }
}

/// A slug is used as a single path segment under `blog/` and `posts/`, so it
/// must not contain separators or `.`/`..` segments.
pub fn is_safe_slug(slug: &str) -> bool {
    if slug.contains(['/', '\\']) {
        return false;
    }
    let mut components = Path::new(slug).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Posts ordered newest first with unique slugs.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct Blog {
    pub posts: Vec<Post>,
}

impl Blog {
    pub fn from_posts(mut posts: Vec<Post>) -> Self {
        // Undated posts sort last; the stable sort keeps their load order.
        posts.sort_by_key(|post| Reverse(post.published_on()));

        let mut seen = HashSet::new();
        posts.retain(|post| {
            let fresh = seen.insert(post.slug.clone());
            if !fresh {
                warn!(slug = %post.slug, title = %post.title, "Dropping post with duplicate slug");
            }
            fresh
        });

        Blog { posts }
    }

    pub fn get_post_by_slug(&self, slug: &str) -> Option<&Post> {
        self.posts.iter().find(|post| post.slug == slug)
    }

    pub fn latest_post(&self) -> Option<&Post> {
        self.posts.first()
    }

    pub fn slugs(&self) -> impl Iterator<Item = &str> {
        self.posts.iter().map(|post| post.slug.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(slug: &str, date: &str) -> Post {
        Post::new(
            slug.to_string(),
            slug.to_uppercase(),
            date.to_string(),
            "<p>Hello there world</p>".to_string(),
        )
    }

    #[test]
    fn derives_display_fields() {
        let p = post("hello-world", "29.03.2024");
        assert_eq!(p.formatted_date, "March 29, 2024");
        assert_eq!(p.excerpt, "Hello there world");
        assert_eq!(p.word_count, 3);
    }

    #[test]
    fn sorts_newest_first_across_date_formats() {
        let blog = Blog::from_posts(vec![
            post("old", "01.02.2023"),
            post("undated", "soon"),
            post("new", "2024-06-01"),
            post("middle", "15.12.2023"),
        ]);
        let slugs: Vec<&str> = blog.slugs().collect();
        assert_eq!(slugs, ["new", "middle", "old", "undated"]);
    }

    #[test]
    fn keeps_first_post_for_duplicate_slug() {
        let blog = Blog::from_posts(vec![post("same", "2023-01-01"), post("same", "2024-01-01")]);
        assert_eq!(blog.posts.len(), 1);
        assert_eq!(blog.posts[0].date, "2024-01-01");
    }

    #[test]
    fn looks_up_posts_by_slug() {
        let blog = Blog::from_posts(vec![post("a", "2024-01-01"), post("b", "2024-02-01")]);
        assert_eq!(blog.get_post_by_slug("a").map(|p| p.slug.as_str()), Some("a"));
        assert!(blog.get_post_by_slug("missing").is_none());
        assert_eq!(blog.latest_post().map(|p| p.slug.as_str()), Some("b"));
    }

    #[test]
    fn safe_slugs_are_single_path_segments() {
        assert!(is_safe_slug("hello-world"));
        assert!(is_safe_slug("2024.notes"));
        for slug in ["", ".", "..", "../../escaped", "a/b", "a\\b", "/etc", "trailing/"] {
            assert!(!is_safe_slug(slug), "{slug:?} should be rejected");
        }
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let json = serde_json::to_value(Blog::from_posts(vec![post("a", "2024-01-01")])).unwrap();
        assert_eq!(json["posts"][0]["formattedDate"], "January 1, 2024");
        assert_eq!(json["posts"][0]["wordCount"], 3);
    }
}
