//! Pipeline options and the optional KDL config file
//!
//! ```kdl
//! generate {
//!     with-media #true
//!     verify-blocks #false
//!     posts-per-page 50
//! }
//! export {
//!     with-media #true
//! }
//! ```
//!
//! A bare flag node (`with-media`) means `#true`. Unknown nodes are errors.

use crate::error::{Error, Result};
use skeetgen_repo::VerifyPolicy;
use std::path::Path;

/// Default number of posts per timeline page
pub const DEFAULT_POSTS_PER_PAGE: usize = 50;

/// Options for generating an archive from an export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateOptions {
    /// Copy `blobs/` entries from the input
    pub with_media: bool,
    /// Whether CAR blocks are checked against their CIDs
    pub verify: VerifyPolicy,
    /// Posts per timeline page
    pub posts_per_page: usize,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            with_media: false,
            verify: VerifyPolicy::Trust,
            posts_per_page: DEFAULT_POSTS_PER_PAGE,
        }
    }
}

/// Options for packing a repository export
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportOptions {
    /// Include blobs
    pub with_media: bool,
}

/// Settings loaded from `skeetgen.kdl`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// `generate` block
    pub generate: GenerateOptions,
    /// `export` block
    pub export: ExportOptions,
}

impl Config {
    /// Read and parse a config file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = tokio::fs::read_to_string(path.as_ref()).await?;
        Self::from_kdl(&text)
    }

    /// Parse config text
    pub fn from_kdl(text: &str) -> Result<Self> {
        let doc = text
            .parse::<kdl::KdlDocument>()
            .map_err(|e| Error::Config(format!("failed to parse KDL: {}", e)))?;

        let mut config = Config::default();

        for node in doc.nodes() {
            match node.name().value() {
                "generate" => parse_generate(node, &mut config.generate)?,
                "export" => parse_export(node, &mut config.export)?,
                other => return Err(Error::Config(format!("unknown config node: {}", other))),
            }
        }

        Ok(config)
    }
}

fn parse_generate(node: &kdl::KdlNode, options: &mut GenerateOptions) -> Result<()> {
    let Some(children) = node.children() else {
        return Ok(());
    };

    for child in children.nodes() {
        match child.name().value() {
            "with-media" => options.with_media = flag(child)?,
            "verify-blocks" => {
                options.verify = if flag(child)? {
                    VerifyPolicy::Verify
                } else {
                    VerifyPolicy::Trust
                };
            }
            "posts-per-page" => {
                let n = child
                    .entries()
                    .first()
                    .and_then(|e| e.value().as_integer())
                    .ok_or_else(|| Error::Config("posts-per-page expects an integer".into()))?;
                options.posts_per_page = usize::try_from(n)
                    .ok()
                    .filter(|n| *n > 0)
                    .ok_or_else(|| Error::Config("posts-per-page must be positive".into()))?;
            }
            other => return Err(Error::Config(format!("unknown generate field: {}", other))),
        }
    }

    Ok(())
}

fn parse_export(node: &kdl::KdlNode, options: &mut ExportOptions) -> Result<()> {
    let Some(children) = node.children() else {
        return Ok(());
    };

    for child in children.nodes() {
        match child.name().value() {
            "with-media" => options.with_media = flag(child)?,
            other => return Err(Error::Config(format!("unknown export field: {}", other))),
        }
    }

    Ok(())
}

fn flag(node: &kdl::KdlNode) -> Result<bool> {
    match node.entries().first() {
        None => Ok(true),
        Some(entry) => entry.value().as_bool().ok_or_else(|| {
            Error::Config(format!("{} expects a boolean", node.name().value()))
        }),
    }
}
