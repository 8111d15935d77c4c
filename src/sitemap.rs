use chrono::NaiveDate;
use htmlescape::encode_minimal;

use crate::config::SiteConfig;
use crate::dates::to_iso_date;
use crate::models::Blog;

#[derive(Clone, Debug, PartialEq)]
pub struct SitemapEntry {
    pub loc: String,
    pub lastmod: Option<NaiveDate>,
    pub changefreq: &'static str,
    pub priority: f32,
}

pub fn sitemap_entries(blog: &Blog, site: &SiteConfig, today: NaiveDate) -> Vec<SitemapEntry> {
    let mut urls = Vec::with_capacity(blog.posts.len() + 2);
    urls.push(SitemapEntry {
        loc: site.absolute_url("/"),
        lastmod: Some(today),
        changefreq: "weekly",
        priority: 1.0,
    });
    urls.push(SitemapEntry {
        loc: site.absolute_url("/lets-talk"),
        lastmod: Some(today),
        changefreq: "monthly",
        priority: 0.5,
    });

    for post in &blog.posts {
        urls.push(SitemapEntry {
            loc: site.post_url(&post.slug),
            lastmod: post.published_on(),
            changefreq: "monthly",
            priority: 0.8,
        });
    }
    urls
}

pub fn render_sitemap(blog: &Blog, site: &SiteConfig, today: NaiveDate) -> String {
    let mut body = String::new();
    for entry in sitemap_entries(blog, site, today) {
        body.push_str("  <url>\n");
        body.push_str(&format!("    <loc>{}</loc>\n", encode_minimal(&entry.loc)));
        if let Some(lastmod) = entry.lastmod {
            body.push_str(&format!("    <lastmod>{}</lastmod>\n", to_iso_date(lastmod)));
        }
        body.push_str(&format!("    <changefreq>{}</changefreq>\n", entry.changefreq));
        body.push_str(&format!("    <priority>{:.1}</priority>\n", entry.priority));
        body.push_str("  </url>\n");
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
{body}</urlset>
"#
    )
}

pub fn render_robots(site: &SiteConfig) -> String {
    format!(
        "User-agent: *\nAllow: /\nDisallow: /api/\nDisallow: /admin/\n\nSitemap: {}\n",
        site.absolute_url("/sitemap.xml")
    )
}
