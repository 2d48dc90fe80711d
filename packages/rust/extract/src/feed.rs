//! RSS 2.0 / Atom feed parsing.
//!
//! Detection first, then a per-format item mapping. Element matching is
//! on local names throughout, so both prefixed (`atom:entry`) and
//! default-namespaced documents parse the same way. Ill-formed XML is
//! fatal for the record: the caller gets `feed_type = unknown` with the
//! error set.

use roxmltree::{Document, Node};
use url::Url;

use webharvest_shared::{FeedItem, FeedRecord, FeedType};

const ATOM_NS: &str = "http://www.w3.org/2005/Atom";

/// Parse a fetched feed body into a [`FeedRecord`].
pub fn parse_feed(xml: &str, url: &Url) -> FeedRecord {
    let doc = match Document::parse(xml) {
        Ok(doc) => doc,
        Err(e) => return FeedRecord::failed(url.as_str(), format!("invalid XML: {e}")),
    };

    let root = doc.root_element();
    let root_name = root.tag_name().name();
    let root_ns = root.tag_name().namespace().unwrap_or("");

    if root_name == "rss" || child(root, "channel").is_some() {
        parse_rss(root, url)
    } else if root_name == "feed" || root_ns.contains(ATOM_NS) {
        parse_atom(root, url)
    } else {
        FeedRecord::failed(
            url.as_str(),
            format!("unrecognized feed root element <{root_name}>"),
        )
    }
}

fn parse_rss(root: Node, url: &Url) -> FeedRecord {
    let channel = child(root, "channel").unwrap_or(root);

    let items = channel
        .children()
        .filter(|n| n.is_element() && n.tag_name().name() == "item")
        .map(|item| FeedItem {
            title: child_text(item, "title"),
            link: child_text(item, "link"),
            description: child_text(item, "description"),
            published: child_text(item, "pubDate"),
            // <author> with a fallback to dc:creator.
            author: child_text(item, "author").or_else(|| child_text(item, "creator")),
            guid: child_text(item, "guid"),
            categories: item
                .children()
                .filter(|n| n.is_element() && n.tag_name().name() == "category")
                .filter_map(|n| text_of(n))
                .collect(),
        })
        .collect();

    FeedRecord {
        url: url.to_string(),
        title: child_text(channel, "title"),
        description: child_text(channel, "description"),
        feed_type: FeedType::Rss,
        items,
        error: None,
    }
}

fn parse_atom(root: Node, url: &Url) -> FeedRecord {
    let items = root
        .children()
        .filter(|n| n.is_element() && n.tag_name().name() == "entry")
        .map(|entry| FeedItem {
            title: child_text(entry, "title"),
            link: atom_entry_link(entry),
            description: child_text(entry, "summary").or_else(|| child_text(entry, "content")),
            published: child_text(entry, "published").or_else(|| child_text(entry, "updated")),
            author: child(entry, "author").and_then(|a| child_text(a, "name")),
            guid: child_text(entry, "id"),
            categories: entry
                .children()
                .filter(|n| n.is_element() && n.tag_name().name() == "category")
                .filter_map(|n| n.attribute("term").map(str::to_string))
                .collect(),
        })
        .collect();

    FeedRecord {
        url: url.to_string(),
        title: child_text(root, "title"),
        description: child_text(root, "subtitle"),
        feed_type: FeedType::Atom,
        items,
        error: None,
    }
}

/// Pick an entry's link: prefer `rel="alternate"` (or no rel at all),
/// fall back to the first `<link>` carrying an href.
fn atom_entry_link(entry: Node) -> Option<String> {
    let links: Vec<Node> = entry
        .children()
        .filter(|n| n.is_element() && n.tag_name().name() == "link")
        .collect();

    links
        .iter()
        .find(|n| matches!(n.attribute("rel"), None | Some("alternate")))
        .and_then(|n| n.attribute("href"))
        .or_else(|| links.iter().find_map(|n| n.attribute("href")))
        .map(str::to_string)
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == name)
}

fn child_text(node: Node, name: &str) -> Option<String> {
    child(node, name).and_then(text_of)
}

fn text_of(node: Node) -> Option<String> {
    let text = node.text()?.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}
