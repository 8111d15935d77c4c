use htmlescape::encode_minimal;

use crate::config::SiteConfig;
use crate::content_loader::SiteContent;
use crate::models::Post;
use crate::navigation::render_sidebar;
use crate::seo::{
    article_json_ld, json_ld_script, person_json_ld, render_meta_tags, service_json_ld,
    website_json_ld, PageMeta,
};

const HOT_RELOAD_SCRIPT: &str = r#"
<script>
    const socket = new WebSocket("ws://" + window.location.host + "/ws");
    socket.onmessage = (event) => {
        if (event.data === "reload") {
            window.location.reload();
        }
    };
</script>
"#;

const LETS_TALK_TITLE: &str = "Let's Talk - Architecture Consulting";
const LETS_TALK_DESCRIPTION: &str = "Architecture consulting, system design reviews, and technical mentoring for teams scaling distributed systems, microservices, and legacy modernization.";
const LETS_TALK_KEYWORDS: [&str; 6] = [
    "software architecture consultant",
    "system design review",
    "technical mentoring",
    "distributed systems consultant",
    "legacy system migration",
    "microservices consultant",
];

const GENERIC_NOT_FOUND: &str = "<div class=\"not-found\">\n<h1>Page Not Found</h1>\n<p>The page you are looking for does not exist.</p>\n<p><a href=\"/\">Back to the latest post</a></p>\n</div>\n";

/// Everything a page needs besides the shared layout.
pub struct Page {
    pub meta: PageMeta,
    pub structured_data: Vec<serde_json::Value>,
    pub sidebar: String,
    pub body: String,
}

pub fn render_with_layout(page: &Page, content: &SiteContent, site: &SiteConfig) -> String {
    let mut head = render_meta_tags(&page.meta, site);
    head.push_str("<link rel=\"stylesheet\" href=\"/assets/syntax.css\">\n");
    for value in &page.structured_data {
        head.push_str(&json_ld_script(value));
    }

    let mut html = content
        .templates
        .layout
        .replace("{{ title }}", &encode_minimal(&page.meta.title))
        .replace("{{ head }}", &head)
        .replace("{{ banner }}", &content.templates.banner)
        .replace("{{ sidebar }}", &page.sidebar)
        .replace("{{ content }}", &page.body);

    if site.is_development {
        html = html.replace("</body>", &format!("{}</body>", HOT_RELOAD_SCRIPT));
    }

    html
}

fn article_body(post: &Post) -> String {
    format!(
        "<article class=\"article\">\n<header class=\"article-header\">\n<h1 class=\"article-title\">{}</h1>\n<div class=\"article-meta\"><time class=\"article-date\" datetime=\"{}\">{}</time></div>\n</header>\n<div class=\"article-content\">\n{}</div>\n</article>\n",
        encode_minimal(&post.title),
        encode_minimal(&post.date),
        encode_minimal(&post.formatted_date),
        post.content,
    )
}

fn profile_label(url: &str) -> &str {
    if url.contains("linkedin.com") {
        "LinkedIn"
    } else if url.contains("github.com") {
        "GitHub"
    } else {
        url
    }
}

fn initials(name: &str) -> String {
    name.split_whitespace()
        .filter_map(|word| word.chars().next())
        .flat_map(char::to_uppercase)
        .collect()
}

/// Author card appended to every post: name, role, profile links and a booking call to action.
pub fn author_bio(site: &SiteConfig) -> String {
    let author = &site.author;
    let mut html = String::from("<footer class=\"author-bio\">\n");
    html.push_str(&format!(
        "<div class=\"author-avatar\">{}</div>\n<div class=\"author-info\">\n<h3 class=\"author-name\">{}</h3>\n<p class=\"author-title\">{}</p>\n",
        encode_minimal(&initials(&author.name)),
        encode_minimal(&author.name),
        encode_minimal(&author.job_title),
    ));

    if !author.same_as.is_empty() {
        html.push_str("<p class=\"author-links\">");
        for url in &author.same_as {
            html.push_str(&format!(
                "<a href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\">{} &rarr;</a> ",
                encode_minimal(url),
                encode_minimal(profile_label(url)),
            ));
        }
        html.push_str("</p>\n");
    }
    html.push_str("</div>\n");

    if !site.booking_url.is_empty() {
        html.push_str(&format!(
            "<div class=\"author-cta\">\n<p><strong>Need architecture advice?</strong> I help companies scale systems efficiently.</p>\n<a class=\"cta\" href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\">Book Consultation</a>\n</div>\n",
            encode_minimal(&site.booking_url)
        ));
    }
    html.push_str("</footer>\n");
    html
}

pub fn render_post_page(post: &Post, content: &SiteContent, site: &SiteConfig) -> String {
    let page = Page {
        meta: PageMeta::for_post(post, site),
        structured_data: vec![article_json_ld(post, site)],
        sidebar: render_sidebar(&content.blog.posts, Some(&post.slug)),
        body: format!("{}{}", article_body(post), author_bio(site)),
    };
    render_with_layout(&page, content, site)
}

pub fn render_home_page(content: &SiteContent, site: &SiteConfig) -> String {
    let latest = content.blog.latest_post();
    let body = match latest {
        Some(post) => article_body(post),
        None => "<div class=\"home-article\">\n<h2>No Posts Found</h2>\n<p>Check back later for new content!</p>\n</div>\n".to_string(),
    };

    let page = Page {
        meta: PageMeta::website(site.site_name.clone(), "/"),
        structured_data: vec![website_json_ld(site)],
        sidebar: render_sidebar(&content.blog.posts, latest.map(|p| p.slug.as_str())),
        body,
    };
    render_with_layout(&page, content, site)
}

pub fn render_lets_talk_page(content: &SiteContent, site: &SiteConfig) -> String {
    let title = format!("{} | {}", LETS_TALK_TITLE, site.author.name);
    let mut body = String::from("<section class=\"lets-talk\">\n");
    body.push_str(&content.templates.lets_talk);

    body.push_str("<ul class=\"services\">\n");
    for service in &site.services {
        body.push_str(&format!(
            "<li class=\"service\"><h3>{}</h3><p>{}</p></li>\n",
            encode_minimal(&service.name),
            encode_minimal(&service.description)
        ));
    }
    body.push_str("</ul>\n");
    body.push_str(&format!(
        "<a class=\"cta\" href=\"{}\">Book a call</a>\n</section>\n",
        encode_minimal(&site.booking_url)
    ));

    let page = Page {
        meta: PageMeta::website(title.clone(), "/lets-talk")
            .with_description(LETS_TALK_DESCRIPTION)
            .with_keywords(&LETS_TALK_KEYWORDS),
        structured_data: vec![
            service_json_ld(site, &title, LETS_TALK_DESCRIPTION),
            person_json_ld(site),
        ],
        sidebar: String::new(),
        body,
    };
    render_with_layout(&page, content, site)
}

/// Not-found page naming the requested slug, or a generic body when nothing specific was asked for.
pub fn render_not_found_page(
    requested: Option<&str>,
    content: &SiteContent,
    site: &SiteConfig,
) -> String {
    let body = match requested {
        Some(slug) => content
            .templates
            .not_found
            .replace("{{slug}}", &encode_minimal(slug)),
        None => GENERIC_NOT_FOUND.to_string(),
    };
    let page = Page {
        meta: PageMeta::website(format!("Post Not Found - {}", site.site_name), "/"),
        structured_data: Vec::new(),
        sidebar: render_sidebar(&content.blog.posts, None),
        body,
    };
    render_with_layout(&page, content, site)
}
