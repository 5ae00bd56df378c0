//! Binary persistence for the node arena
//!
//! Layout (all integers little-endian):
//!
//! ```text
//! magic        4 bytes  "FLUX"
//! node_count   i32
//! per node, in id order:
//!   id           i32
//!   visit_count  u32
//!   value        f64
//!   parent_id    i32   (-1 for roots)
//!   n_children   i32
//!   children     n_children x i32
//! ```
//!
//! Decoding is all-or-nothing: a buffer that is truncated, has trailing
//! bytes or describes an inconsistent tree is rejected as a whole.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::debug;

use crate::{
    node::{FluxNode, NodeId},
    FluxError, Result,
};

/// File magic
pub const MAGIC: [u8; 4] = *b"FLUX";

/// Bytes taken by a node with no children
const NODE_FIXED_LEN: usize = 4 + 4 + 8 + 4 + 4;

/// Encodes a node arena into the persisted format
pub fn encode(nodes: &[FluxNode]) -> Vec<u8> {
    let links: usize = nodes.iter().map(|n| n.children().len()).sum();
    let mut out = Vec::with_capacity(8 + nodes.len() * NODE_FIXED_LEN + links * 4);

    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&(nodes.len() as i32).to_le_bytes());

    for node in nodes {
        out.extend_from_slice(&node.id().0.to_le_bytes());
        out.extend_from_slice(&node.visits().to_le_bytes());
        out.extend_from_slice(&node.value().to_le_bytes());
        out.extend_from_slice(&node.parent().0.to_le_bytes());
        out.extend_from_slice(&(node.children().len() as i32).to_le_bytes());
        for child in node.children() {
            out.extend_from_slice(&child.0.to_le_bytes());
        }
    }

    out
}

/// Decodes and validates a persisted node arena
pub fn decode(bytes: &[u8]) -> Result<Vec<FluxNode>> {
    let mut reader = Reader::new(bytes);

    let magic = reader.take(4, "magic")?;
    if magic != MAGIC {
        return Err(FluxError::Malformed(format!(
            "bad magic {:?}, expected {:?}",
            magic, MAGIC
        )));
    }

    let count = reader.read_i32("node count")?;
    let count = usize::try_from(count)
        .map_err(|_| FluxError::Malformed(format!("negative node count {}", count)))?;
    if count == 0 {
        return Err(FluxError::Malformed("tree has no nodes".to_string()));
    }
    if count > reader.remaining() / NODE_FIXED_LEN {
        return Err(FluxError::Malformed(format!(
            "node count {} exceeds {} remaining bytes",
            count,
            reader.remaining()
        )));
    }

    let mut nodes = Vec::with_capacity(count);
    for index in 0..count {
        let id = reader.read_i32("node id")?;
        if id != index as i32 {
            return Err(FluxError::Malformed(format!(
                "node at position {} has id {}",
                index, id
            )));
        }
        let visits = reader.read_u32("visit count")?;
        let value = reader.read_f64("value")?;

        let parent = reader.read_i32("parent id")?;
        if parent != -1 && !(0..id).contains(&parent) {
            return Err(FluxError::Malformed(format!(
                "node {} has invalid parent {}",
                id, parent
            )));
        }

        let n_children = reader.read_i32("child count")?;
        let n_children = usize::try_from(n_children).map_err(|_| {
            FluxError::Malformed(format!("node {} has negative child count", id))
        })?;
        if n_children > reader.remaining() / 4 {
            return Err(FluxError::Malformed(format!(
                "node {} claims {} children past end of data",
                id, n_children
            )));
        }

        let mut children = Vec::with_capacity(n_children);
        for _ in 0..n_children {
            children.push(NodeId(reader.read_i32("child id")?));
        }

        nodes.push(FluxNode::from_parts(
            NodeId(id),
            NodeId(parent),
            children,
            visits,
            value,
        ));
    }

    if reader.remaining() != 0 {
        return Err(FluxError::Malformed(format!(
            "{} trailing bytes after last node",
            reader.remaining()
        )));
    }

    check_links(&nodes)?;
    Ok(nodes)
}

/// Every child must exist, name its lister as parent and be listed once
fn check_links(nodes: &[FluxNode]) -> Result<()> {
    let mut listed = vec![false; nodes.len()];

    for node in nodes {
        for &child in node.children() {
            let slot = child
                .index()
                .filter(|&i| i < nodes.len())
                .ok_or_else(|| {
                    FluxError::Malformed(format!("node {} lists unknown child {}", node.id(), child))
                })?;

            if nodes[slot].parent() != node.id() {
                return Err(FluxError::Malformed(format!(
                    "node {} lists child {} whose parent is {}",
                    node.id(),
                    child,
                    nodes[slot].parent()
                )));
            }
            if std::mem::replace(&mut listed[slot], true) {
                return Err(FluxError::Malformed(format!("child {} listed twice", child)));
            }
        }
    }

    Ok(())
}

/// Writes the arena to `path`
///
/// The bytes go to a sibling temporary file that is renamed into place, so
/// an interrupted save never leaves a truncated file behind.
pub fn write_file(path: &Path, nodes: &[FluxNode]) -> Result<()> {
    let bytes = encode(nodes);
    write_atomic(path, &bytes)?;

    debug!(
        "saved {} nodes ({} bytes) to {}",
        nodes.len(),
        bytes.len(),
        path.display()
    );
    Ok(())
}

/// Writes `bytes` to a sibling temporary file and renames it onto `path`
///
/// On failure the temporary file is removed and `path` keeps its previous
/// contents.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = temp_path(path);

    let written = (|| -> std::io::Result<()> {
        let mut out = BufWriter::new(File::create(&tmp)?);
        out.write_all(bytes)?;
        out.flush()?;
        fs::rename(&tmp, path)
    })();

    if written.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    written
}

/// Reads and decodes an arena from `path`
pub fn read_file(path: &Path) -> Result<Vec<FluxNode>> {
    let bytes = fs::read(path)?;
    let nodes = decode(&bytes)?;
    debug!("loaded {} nodes from {}", nodes.len(), path.display());
    Ok(nodes)
}

pub(crate) fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Bounds-checked little-endian cursor
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Reader { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, len: usize, what: &str) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(FluxError::Malformed(format!(
                "truncated while reading {} at offset {}",
                what, self.pos
            )));
        }
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn read_array<const N: usize>(&mut self, what: &str) -> Result<[u8; N]> {
        let mut arr = [0u8; N];
        arr.copy_from_slice(self.take(N, what)?);
        Ok(arr)
    }

    fn read_i32(&mut self, what: &str) -> Result<i32> {
        Ok(i32::from_le_bytes(self.read_array(what)?))
    }

    fn read_u32(&mut self, what: &str) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_array(what)?))
    }

    fn read_f64(&mut self, what: &str) -> Result<f64> {
        Ok(f64::from_le_bytes(self.read_array(what)?))
    }
}
