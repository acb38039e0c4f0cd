//! In-order MST traversal

use super::node::NodeData;
use crate::error::{MstError, Result};
use crate::storage::{BlockStore, read_block};
use cid::Cid as IpldCid;
use smol_str::SmolStr;
use std::collections::HashSet;

/// One level of the traversal stack
#[derive(Debug)]
struct Frame {
    node: NodeData,
    /// index of the next entry to yield
    next: usize,
    /// whether the left subtree has been pushed already
    left_done: bool,
    /// subtree of the entry just yielded, to be walked before the next entry
    pending_right: Option<IpldCid>,
    /// previous reconstructed key in this node
    last_key: Vec<u8>,
}

impl Frame {
    fn new(node: NodeData) -> Self {
        Self {
            node,
            next: 0,
            left_done: false,
            pending_right: None,
            last_key: Vec::new(),
        }
    }
}

/// Lazy depth-first walker yielding `(key, value)` pairs in ascending key order
///
/// The traversal uses an explicit stack instead of recursion, so deep or
/// degenerate trees can't overflow the call stack. For every node the walker
/// yields, in order: everything under `left`, then each entry followed by
/// everything under that entry's subtree.
///
/// Prefix compression is local to a node: the "previous key" used to expand
/// an entry resets to empty at the start of every node.
///
/// A walk can't be rewound; create a new walker to start over.
///
/// # Example
///
/// ```rust,ignore
/// let mut walker = MstWalker::new(&store, commit.data);
/// while let Some((key, cid)) = walker.next().await? {
///     println!("{} -> {}", key, cid);
/// }
/// ```
#[derive(Debug)]
pub struct MstWalker<'s, S> {
    store: &'s S,
    root: Option<IpldCid>,
    stack: Vec<Frame>,
    visited: HashSet<IpldCid>,
}

impl<'s, S: BlockStore + Sync> MstWalker<'s, S> {
    /// Create a walker over the tree rooted at `root`
    ///
    /// Nothing is read from the store until the first call to `next`.
    pub fn new(store: &'s S, root: IpldCid) -> Self {
        Self {
            store,
            root: Some(root),
            stack: Vec::new(),
            visited: HashSet::new(),
        }
    }

    async fn push(&mut self, cid: IpldCid) -> Result<()> {
        if !self.visited.insert(cid) {
            return Err(MstError::InvalidNode(format!("node {} is reachable twice", cid)).into());
        }

        let node: NodeData = read_block(self.store, &cid).await?;
        self.stack.push(Frame::new(node));
        Ok(())
    }

    /// Yield the next `(key, value)` pair, or `None` when the walk is complete
    pub async fn next(&mut self) -> Result<Option<(SmolStr, IpldCid)>> {
        if let Some(root) = self.root.take() {
            self.push(root).await?;
        }

        loop {
            let Some(frame) = self.stack.last_mut() else {
                return Ok(None);
            };

            if !frame.left_done {
                frame.left_done = true;
                if let Some(left) = frame.node.left {
                    self.push(left).await?;
                }
                continue;
            }

            if let Some(right) = frame.pending_right.take() {
                self.push(right).await?;
                continue;
            }

            if let Some(entry) = frame.node.entries.get(frame.next) {
                let prefix_len = entry.prefix_len;
                if prefix_len > frame.last_key.len() {
                    return Err(MstError::PrefixOutOfRange {
                        prefix_len,
                        previous_len: frame.last_key.len(),
                    }
                    .into());
                }

                frame.last_key.truncate(prefix_len);
                frame.last_key.extend_from_slice(&entry.key_suffix);
                frame.pending_right = entry.tree;
                frame.next += 1;

                let value = entry.value;
                let key = String::from_utf8(frame.last_key.clone()).map_err(MstError::InvalidUtf8)?;

                return Ok(Some((SmolStr::new(key), value)));
            }

            self.stack.pop();
        }
    }

    /// Drain the walk into a vector
    pub async fn collect(mut self) -> Result<Vec<(SmolStr, IpldCid)>> {
        let mut out = Vec::new();
        while let Some(item) = self.next().await? {
            out.push(item);
        }
        Ok(out)
    }
}
