//! Reply graph between posts of a single repository

use crate::record::{POST_NSID, Post};
use serde::Serialize;
use smol_str::SmolStr;
use std::collections::BTreeMap;

/// Repository DID part of an `at://` URI
pub fn uri_repo(uri: &str) -> Option<&str> {
    let rest = uri.strip_prefix("at://")?;
    Some(rest.split_once('/').map_or(rest, |(repo, _)| repo))
}

/// Collection NSID part of an `at://` URI
pub fn uri_collection(uri: &str) -> Option<&str> {
    let rest = uri.strip_prefix("at://")?;
    rest.split('/').nth(1).filter(|s| !s.is_empty())
}

/// Record key of an `at://` URI (last path segment)
pub fn uri_rkey(uri: &str) -> Option<&str> {
    let (_, rkey) = uri.strip_prefix("at://")?.rsplit_once('/')?;
    Some(rkey).filter(|s| !s.is_empty())
}

/// `at://` URI of a post in `did`'s repository
pub fn post_uri(did: &str, rkey: &str) -> String {
    format!("at://{}/{}/{}", did, POST_NSID, rkey)
}

/// Parent and direct replies of one post
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PostGraphEntry {
    /// Rkey of the post this one replies to
    pub ancestor: Option<SmolStr>,
    /// Rkeys of replies to this post, in the order they were found
    pub descendants: Vec<SmolStr>,
}

/// Reply links between posts of one repository, keyed by rkey
///
/// Only replies whose parent is a post in the same repository are linked. A post
/// can have an entry even when the parent itself isn't in `posts` (deleted).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PostGraph {
    entries: BTreeMap<SmolStr, PostGraphEntry>,
}

impl PostGraph {
    /// Build the graph for `did` from its posts
    pub fn build<'a>(did: &str, posts: impl IntoIterator<Item = (&'a SmolStr, &'a Post)>) -> Self {
        let mut entries: BTreeMap<SmolStr, PostGraphEntry> = BTreeMap::new();

        for (rkey, post) in posts {
            let Some(parent_uri) = post.parent_uri() else {
                continue;
            };
            if uri_repo(parent_uri) != Some(did) || uri_collection(parent_uri) != Some(POST_NSID) {
                continue;
            }
            let Some(parent_rkey) = uri_rkey(parent_uri) else {
                continue;
            };
            let parent_rkey = SmolStr::new(parent_rkey);

            entries
                .entry(parent_rkey.clone())
                .or_default()
                .descendants
                .push(rkey.clone());
            entries.entry(rkey.clone()).or_default().ancestor = Some(parent_rkey);
        }

        Self { entries }
    }

    /// Links of a single post
    pub fn get(&self, rkey: &str) -> Option<&PostGraphEntry> {
        self.entries.get(rkey)
    }

    /// Number of posts with at least one link
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no post has links
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Walk up from `rkey` to the top-most ancestor in this repository
    ///
    /// Stops if a cycle is found.
    pub fn root_of<'a>(&'a self, rkey: &'a str) -> &'a str {
        let mut current = rkey;
        let mut steps = 0;
        while let Some(parent) = self.get(current).and_then(|e| e.ancestor.as_deref()) {
            steps += 1;
            if steps > self.entries.len() {
                break;
            }
            current = parent;
        }
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{ReplyRef, StrongRef};

    const DID: &str = "did:web:example.com";

    fn post(parent: Option<&str>) -> Post {
        Post {
            text: String::new(),
            created_at: "2024-01-01T00:00:00Z".into(),
            reply: parent.map(|uri| ReplyRef {
                root: StrongRef {
                    uri: uri.into(),
                    cid: "bafyrei".into(),
                },
                parent: StrongRef {
                    uri: uri.into(),
                    cid: "bafyrei".into(),
                },
            }),
            embed: None,
            facets: vec![],
            langs: vec![],
            tags: vec![],
            labels: None,
        }
    }

    #[test]
    fn test_uri_parts() {
        let uri = "at://did:plc:abc/app.bsky.feed.post/3k2x";
        assert_eq!(uri_repo(uri), Some("did:plc:abc"));
        assert_eq!(uri_collection(uri), Some("app.bsky.feed.post"));
        assert_eq!(uri_rkey(uri), Some("3k2x"));
        assert_eq!(uri_repo("https://example.com"), None);
        assert_eq!(post_uri("did:plc:abc", "3k2x"), uri);
    }

    #[test]
    fn test_links_same_repo_replies() {
        let mut posts = BTreeMap::new();
        posts.insert(SmolStr::new("a"), post(None));
        posts.insert(SmolStr::new("b"), post(Some(&post_uri(DID, "a"))));
        posts.insert(SmolStr::new("c"), post(Some(&post_uri(DID, "b"))));
        posts.insert(
            SmolStr::new("d"),
            post(Some("at://did:plc:other/app.bsky.feed.post/zzz")),
        );

        let graph = PostGraph::build(DID, &posts);

        assert_eq!(graph.get("a").unwrap().ancestor, None);
        assert_eq!(graph.get("a").unwrap().descendants, vec!["b"]);
        assert_eq!(graph.get("b").unwrap().ancestor.as_deref(), Some("a"));
        assert_eq!(graph.get("c").unwrap().ancestor.as_deref(), Some("b"));
        assert!(graph.get("d").is_none());
        assert_eq!(graph.root_of("c"), "a");
    }

    #[test]
    fn test_ignores_parents_outside_posts() {
        let mut posts = BTreeMap::new();
        posts.insert(SmolStr::new("a"), post(None));
        posts.insert(
            SmolStr::new("b"),
            post(Some(&format!("at://{}/app.bsky.graph.list/a", DID))),
        );

        let graph = PostGraph::build(DID, &posts);
        assert!(graph.is_empty());
    }

    #[test]
    fn test_serializes_as_map() {
        let mut posts = BTreeMap::new();
        posts.insert(SmolStr::new("b"), post(Some(&post_uri(DID, "a"))));

        let json = serde_json::to_value(PostGraph::build(DID, &posts)).unwrap();
        assert_eq!(json["a"]["descendants"][0], "b");
        assert_eq!(json["b"]["ancestor"], "a");
    }
}
