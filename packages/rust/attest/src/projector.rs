//! Record → attestation-command projection.
//!
//! Pure and deterministic: the same record always projects to the same
//! ordered command sequence. Downstream identifiers are derived from
//! command content, so ordering, attribute keys, and encodings must not
//! wobble between runs.

use webharvest_shared::{FeedRecord, PageRecord, SitemapRecord};

use crate::command::{AttestationCommand, predicates};

/// `source` attribute stamped on every command this harvester emits.
pub const SOURCE: &str = "webharvest";

/// At most this many image attestations per page, and only for images
/// with non-empty alt text.
const MAX_IMAGE_ATTESTATIONS: usize = 10;

fn command(subject: &str, predicate: &str, context: &str, actor: &str) -> AttestationCommand {
    AttestationCommand::new(subject, predicate, context, actor).with_attr("source", SOURCE)
}

/// Project a page record. Emits, in order: title, meta description,
/// author, published date, canonical URL, images, structured data, then
/// one command per anchor in document order (duplicates preserved —
/// anchor-text variety is part of the signal).
pub fn project_page(
    page: &PageRecord,
    actor: &str,
    include_external: bool,
) -> Vec<AttestationCommand> {
    let url = page.url.as_str();
    let mut commands = Vec::new();

    if !page.title.is_empty() {
        commands.push(command(url, predicates::HAS_TITLE, &page.title, actor));
    }

    if let Some(meta) = &page.meta {
        if let Some(description) = &meta.description {
            commands.push(command(
                url,
                predicates::HAS_META_DESCRIPTION,
                description,
                actor,
            ));
        }
        if let Some(author) = &meta.author {
            commands.push(command(url, predicates::AUTHORED_BY, author, actor));
        }
        if let Some(published) = &meta.published_date {
            commands.push(command(url, predicates::PUBLISHED_AT, published, actor));
        }
        if let Some(canonical) = &meta.canonical_url {
            if canonical != &page.url {
                commands.push(command(url, predicates::HAS_CANONICAL_URL, canonical, actor));
            }
        }
    }

    for image in page
        .images
        .iter()
        .filter(|i| i.alt.as_deref().is_some_and(|alt| !alt.is_empty()))
        .take(MAX_IMAGE_ATTESTATIONS)
    {
        let mut cmd = command(url, predicates::HAS_IMAGE, &image.src, actor);
        if let Some(alt) = &image.alt {
            cmd = cmd.with_attr("alt", alt.clone());
        }
        if let Some(title) = &image.title {
            cmd = cmd.with_attr("title", title.clone());
        }
        commands.push(cmd);
    }

    for datum in &page.structured_data {
        let encoded = serde_json::to_string(&datum.data).unwrap_or_default();
        commands.push(
            command(url, predicates::HAS_STRUCTURED_DATA, &datum.datum_type, actor)
                .with_attr("data", encoded),
        );
    }

    for link in &page.links {
        if !include_external && link.is_external {
            continue;
        }
        let predicate = if link.is_external {
            predicates::LINKS_EXTERNALLY_TO
        } else {
            predicates::LINKS_TO
        };
        let mut cmd = command(url, predicate, &link.target_url, actor);
        if !link.anchor_text.is_empty() {
            cmd = cmd.with_attr("anchor_text", link.anchor_text.clone());
        }
        if !link.rel.is_empty() {
            cmd = cmd.with_attr("rel", link.rel.join(","));
        }
        commands.push(cmd);
    }

    commands
}

/// Project a feed record: one title command (with the detected feed
/// type), then one `feed_contains` per item that has a link.
pub fn project_feed(feed: &FeedRecord, actor: &str) -> Vec<AttestationCommand> {
    let url = feed.url.as_str();
    let mut commands = Vec::new();

    if let Some(title) = &feed.title {
        commands.push(
            command(url, predicates::HAS_TITLE, title, actor)
                .with_attr("feed_type", feed.feed_type.as_str()),
        );
    }

    for item in &feed.items {
        let Some(link) = &item.link else { continue };
        let mut cmd = command(url, predicates::FEED_CONTAINS, link, actor);
        if let Some(title) = &item.title {
            cmd = cmd.with_attr("title", title.clone());
        }
        if let Some(published) = &item.published {
            cmd = cmd.with_attr("published", published.clone());
        }
        if let Some(author) = &item.author {
            cmd = cmd.with_attr("author", author.clone());
        }
        commands.push(cmd);
    }

    commands
}

/// Project a sitemap record: one `sitemap_contains` per entry.
pub fn project_sitemap(sitemap: &SitemapRecord, actor: &str) -> Vec<AttestationCommand> {
    let url = sitemap.url.as_str();

    sitemap
        .urls
        .iter()
        .map(|entry| {
            let mut cmd = command(url, predicates::SITEMAP_CONTAINS, &entry.loc, actor)
                .with_attr("priority", format!("{}", entry.priority));
            if let Some(lastmod) = &entry.lastmod {
                cmd = cmd.with_attr("lastmod", lastmod.clone());
            }
            if let Some(changefreq) = &entry.changefreq {
                cmd = cmd.with_attr("changefreq", changefreq.clone());
            }
            cmd
        })
        .collect()
}
