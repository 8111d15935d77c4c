//! Page metadata tags and JSON-LD structured data.

use chrono::NaiveDate;
use htmlescape::encode_minimal;
use serde_json::{json, Value};

use crate::config::SiteConfig;
use crate::dates::to_rfc3339;
use crate::markdown::plain_text;
use crate::models::Post;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Website,
    Article,
}

impl PageKind {
    fn as_str(self) -> &'static str {
        match self {
            PageKind::Website => "website",
            PageKind::Article => "article",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PageMeta {
    pub title: String,
    pub description: Option<String>,
    /// Site path such as `/blog/let-go`.
    pub path: String,
    pub kind: PageKind,
    pub image: Option<String>,
    pub published: Option<NaiveDate>,
    pub keywords: Vec<String>,
}

impl PageMeta {
    pub fn website(title: impl Into<String>, path: impl Into<String>) -> Self {
        PageMeta {
            title: title.into(),
            description: None,
            path: path.into(),
            kind: PageKind::Website,
            image: None,
            published: None,
            keywords: Vec::new(),
        }
    }

    pub fn for_post(post: &Post, site: &SiteConfig) -> Self {
        PageMeta {
            title: format!("{} - {}", post.title, site.site_name),
            description: Some(post.excerpt.clone()).filter(|d| !d.is_empty()),
            path: format!("/blog/{}", post.slug),
            kind: PageKind::Article,
            image: None,
            published: post.published_on(),
            keywords: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_keywords(mut self, keywords: &[&str]) -> Self {
        self.keywords = keywords.iter().map(|k| k.to_string()).collect();
        self
    }
}

fn meta_name(out: &mut String, name: &str, content: &str) {
    out.push_str(&format!(
        "<meta name=\"{}\" content=\"{}\">\n",
        name,
        encode_minimal(content)
    ));
}

fn meta_property(out: &mut String, property: &str, content: &str) {
    out.push_str(&format!(
        "<meta property=\"{}\" content=\"{}\">\n",
        property,
        encode_minimal(content)
    ));
}

/// `<head>` tags for a page: description, robots, canonical, Open Graph and Twitter card.
pub fn render_meta_tags(meta: &PageMeta, site: &SiteConfig) -> String {
    let description = meta.description.as_deref().unwrap_or(&site.description);
    let url = site.absolute_url(&meta.path);
    let image = site.absolute_url(meta.image.as_deref().unwrap_or(&site.default_image));

    let mut out = String::new();
    meta_name(&mut out, "description", description);
    meta_name(&mut out, "robots", "index, follow");
    if !meta.keywords.is_empty() {
        meta_name(&mut out, "keywords", &meta.keywords.join(", "));
    }
    out.push_str(&format!(
        "<link rel=\"canonical\" href=\"{}\">\n",
        encode_minimal(&url)
    ));

    meta_property(&mut out, "og:url", &url);
    meta_property(&mut out, "og:title", &meta.title);
    meta_property(&mut out, "og:description", description);
    meta_property(&mut out, "og:type", meta.kind.as_str());
    meta_property(&mut out, "og:site_name", &site.site_name);
    meta_property(&mut out, "og:image", &image);

    meta_name(&mut out, "twitter:card", "summary_large_image");
    meta_name(&mut out, "twitter:site", &site.twitter_handle);
    meta_name(&mut out, "twitter:title", &meta.title);
    meta_name(&mut out, "twitter:description", description);
    meta_name(&mut out, "twitter:image", &image);

    if let Some(published) = meta.published {
        let time = to_rfc3339(published);
        meta_property(&mut out, "article:published_time", &time);
        meta_property(&mut out, "article:modified_time", &time);
    }
    if meta.kind == PageKind::Article {
        meta_property(&mut out, "article:author", &site.author.name);
    }

    out
}

/// Embeds a JSON-LD value in a script tag, keeping `</script>` inside strings harmless.
pub fn json_ld_script(value: &Value) -> String {
    let json = serde_json::to_string_pretty(value)
        .unwrap_or_else(|_| "{}".to_string())
        .replace("</", "<\\/");
    format!("<script type=\"application/ld+json\">\n{json}\n</script>\n")
}

fn author_json(site: &SiteConfig) -> Value {
    json!({
        "@type": "Person",
        "name": site.author.name,
        "url": site.author.url,
        "sameAs": site.author.same_as,
    })
}

fn publisher_json(site: &SiteConfig) -> Value {
    let base_url = site.base_url();
    json!({
        "@type": "Organization",
        "name": site.site_name,
        "url": base_url,
        "logo": {
            "@type": "ImageObject",
            "url": format!("{base_url}/favicon.ico"),
        },
    })
}

pub fn article_json_ld(post: &Post, site: &SiteConfig) -> Value {
    let base_url = site.base_url();
    let url = site.post_url(&post.slug);
    let published = post.published_on().map(to_rfc3339);

    json!({
        "@context": "https://schema.org",
        "@type": "Article",
        "headline": post.title,
        "description": post.excerpt,
        "author": author_json(site),
        "publisher": publisher_json(site),
        "datePublished": published,
        "dateModified": published,
        "url": url,
        "mainEntityOfPage": {
            "@type": "WebPage",
            "@id": url,
        },
        "wordCount": post.word_count,
        "articleBody": plain_text(&post.content),
        "inLanguage": "en-US",
        "isPartOf": {
            "@type": "Blog",
            "name": site.site_name,
            "url": base_url,
        },
    })
}

pub fn website_json_ld(site: &SiteConfig) -> Value {
    let base_url = site.base_url();
    json!({
        "@context": "https://schema.org",
        "@type": "WebSite",
        "name": site.site_name,
        "description": site.description,
        "url": base_url,
        "author": author_json(site),
        "publisher": publisher_json(site),
        "potentialAction": {
            "@type": "SearchAction",
            "target": {
                "@type": "EntryPoint",
                "urlTemplate": format!("{base_url}/blog/{{search_term_string}}"),
            },
            "query-input": "required name=search_term_string",
        },
        "inLanguage": "en-US",
    })
}

pub fn service_json_ld(site: &SiteConfig, title: &str, description: &str) -> Value {
    let offers: Vec<Value> = site
        .services
        .iter()
        .map(|service| {
            json!({
                "@type": "Offer",
                "itemOffered": {
                    "@type": "Service",
                    "name": service.name,
                    "description": service.description,
                },
            })
        })
        .collect();
    let service_types: Vec<&str> = site.services.iter().map(|s| s.name.as_str()).collect();

    json!({
        "@context": "https://schema.org",
        "@type": "ProfessionalService",
        "name": title,
        "description": description,
        "url": site.absolute_url("/lets-talk"),
        "serviceType": service_types,
        "provider": person_fields(site),
        "areaServed": {
            "@type": "Place",
            "name": "Global",
        },
        "availableLanguage": "English",
        "contactPoint": [
            {
                "@type": "ContactPoint",
                "contactType": "Consultation Booking",
                "url": site.booking_url,
                "availableLanguage": "English",
            },
            {
                "@type": "ContactPoint",
                "contactType": "Professional Inquiry",
                "url": site.author.url,
                "availableLanguage": "English",
            },
        ],
        "makesOffer": offers,
    })
}

fn person_fields(site: &SiteConfig) -> Value {
    let mut same_as = site.author.same_as.clone();
    let base_url = site.base_url();
    if !same_as.contains(&base_url) {
        same_as.push(base_url);
    }
    json!({
        "@type": "Person",
        "name": site.author.name,
        "jobTitle": site.author.job_title,
        "url": site.author.url,
        "sameAs": same_as,
    })
}

pub fn person_json_ld(site: &SiteConfig) -> Value {
    let mut person = person_fields(site);
    if let Value::Object(fields) = &mut person {
        fields.insert("@context".to_string(), json!("https://schema.org"));
    }
    person
}
