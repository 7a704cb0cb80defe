//! Path tree and node hierarchy reconstruction.
//!
//! The PATHS section stores the path tree in depth-first order as three
//! parallel arrays. For slot `i`:
//!
//! - `path_indexes[i]` is where the rebuilt path goes in the path table
//! - `element_token_indexes[i]` is the token of the last element, negated
//!   for property names
//! - `jumps[i]` encodes the shape:
//!   `> 0` child at `i + 1` and sibling at `i + jump`,
//!   `0` sibling at `i + 1` only,
//!   `-1` child at `i + 1` only,
//!   `-2` leaf.
//!
//! The walk uses an explicit stack of pending sibling frames, so hostile
//! input can't overflow the native stack. Every slot and every path index is
//! visited at most once.

use std::collections::BTreeSet;

use smallvec::SmallVec;

use super::format::PathIndex;
use super::stream::StreamReader;
use super::tables::{read_compressed_i32s, read_compressed_u32s};
use crate::core::Path;
use crate::util::{DecodeConfig, Error, MemoryBudget, Result};

/// The three encoded arrays of the PATHS section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathArrays {
    /// Number of entries of the path table.
    pub num_paths: usize,
    pub path_indexes: Vec<u32>,
    pub element_token_indexes: Vec<i32>,
    pub jumps: Vec<i32>,
}

impl PathArrays {
    /// Number of encoded slots.
    pub fn num_encoded(&self) -> usize {
        self.path_indexes.len()
    }
}

/// Read the PATHS section header and its compressed arrays.
pub fn read_path_arrays(
    r: &mut StreamReader<'_>,
    config: &DecodeConfig,
    budget: &mut MemoryBudget,
) -> Result<PathArrays> {
    let num_paths = r.read_u64()?;
    let num_paths = budget.check_count("paths", num_paths, config.max_num_paths)?;
    let num_encoded = r.read_u64()?;
    if num_encoded > num_paths as u64 {
        return Err(Error::topology(format!(
            "{num_encoded} encoded paths but only {num_paths} path slots"
        )));
    }
    let num_encoded = num_encoded as usize;

    let path_indexes = read_compressed_u32s(r, "path indexes", num_encoded, config, budget)?;
    let element_token_indexes =
        read_compressed_i32s(r, "path element tokens", num_encoded, config, budget)?;
    let jumps = read_compressed_i32s(r, "path jumps", num_encoded, config, budget)?;

    tracing::debug!(num_paths, num_encoded, "read path arrays");
    Ok(PathArrays { num_paths, path_indexes, element_token_indexes, jumps })
}

/// Fixed-size bitset used as a visited marker.
struct VisitSet {
    words: Vec<u64>,
}

impl VisitSet {
    fn new(len: usize) -> Self {
        Self { words: vec![0; len.div_ceil(64)] }
    }

    /// Mark `i`; returns false if it was already marked.
    fn insert(&mut self, i: usize) -> bool {
        let (word, bit) = (i / 64, 1u64 << (i % 64));
        let fresh = self.words[word] & bit == 0;
        self.words[word] |= bit;
        fresh
    }
}

/// One visited slot, handed to the per-pass callback.
#[derive(Clone, Copy, Debug)]
struct Visit {
    slot: usize,
    path_index: PathIndex,
    /// `None` when the slot becomes the root.
    parent: Option<PathIndex>,
}

/// Walk the encoded tree, calling `visit` once per slot with parents always
/// visited before their children.
fn walk<F>(arrays: &PathArrays, config: &DecodeConfig, mut visit: F) -> Result<()>
where
    F: FnMut(Visit) -> Result<()>,
{
    let n = arrays.num_encoded();
    if arrays.element_token_indexes.len() != n || arrays.jumps.len() != n {
        return Err(Error::topology("path arrays differ in length"));
    }
    if n == 0 {
        return Ok(());
    }

    let mut visited_slots = VisitSet::new(n);
    let mut written_paths = VisitSet::new(arrays.num_paths);
    let mut pending: SmallVec<[(usize, Option<PathIndex>); 32]> = SmallVec::new();
    let mut iterations = 0usize;
    let mut visited = 0usize;

    let mut cursor = Some((0usize, None::<PathIndex>));
    while let Some((slot, parent)) = cursor.take().or_else(|| pending.pop()) {
        iterations += 1;
        if iterations > config.max_path_indices_decode_iteration {
            return Err(Error::topology(format!(
                "path walk exceeded {} iterations",
                config.max_path_indices_decode_iteration
            )));
        }
        if slot >= n {
            return Err(Error::topology(format!("path slot {slot} out of range (0..{n})")));
        }
        if !visited_slots.insert(slot) {
            return Err(Error::topology(format!("path slot {slot} visited twice")));
        }

        let raw_index = arrays.path_indexes[slot];
        if raw_index as usize >= arrays.num_paths {
            return Err(Error::topology(format!(
                "slot {slot} targets path index {raw_index} of {}",
                arrays.num_paths
            )));
        }
        if !written_paths.insert(raw_index as usize) {
            return Err(Error::topology(format!(
                "slot {slot} writes path index {raw_index}, which is already written"
            )));
        }
        let path_index = PathIndex(raw_index);

        visit(Visit { slot, path_index, parent })?;
        visited += 1;

        let jump = arrays.jumps[slot];
        let has_child = jump > 0 || jump == -1;
        let has_sibling = jump >= 0;

        if has_child {
            if has_sibling {
                let sibling = slot
                    .checked_add(jump as usize)
                    .ok_or_else(|| Error::topology(format!("slot {slot} jump {jump} overflows")))?;
                pending.push((sibling, parent));
            }
            cursor = Some((slot + 1, Some(path_index)));
        } else if has_sibling {
            cursor = Some((slot + 1, parent));
        } else if jump != -2 {
            return Err(Error::topology(format!("slot {slot} has invalid jump {jump}")));
        }
    }

    if visited != n {
        return Err(Error::topology(format!(
            "path walk visited {visited} of {n} encoded paths"
        )));
    }
    Ok(())
}

fn element_token<'t>(arrays: &PathArrays, slot: usize, tokens: &'t [String]) -> Result<(&'t str, bool)> {
    let e = arrays.element_token_indexes[slot];
    let is_property = e < 0;
    let token = tokens
        .get(e.unsigned_abs() as usize)
        .ok_or_else(|| Error::topology(format!("slot {slot} has element token {e} of {}", tokens.len())))?;
    Ok((token.as_str(), is_property))
}

/// Rebuild the path table from its encoded form.
///
/// Unreferenced path indices keep the empty path.
#[tracing::instrument(level = "debug", skip_all, fields(num_paths = arrays.num_paths))]
pub fn build_paths(
    arrays: &PathArrays,
    tokens: &[String],
    config: &DecodeConfig,
    budget: &mut MemoryBudget,
) -> Result<Vec<Path>> {
    budget.reserve::<Path>("paths", arrays.num_paths)?;
    let mut paths = vec![Path::default(); arrays.num_paths];

    walk(arrays, config, |v| {
        let path = match v.parent {
            None => {
                budget.reserve_bytes("path text", 1)?;
                Path::absolute_root()
            }
            Some(parent) => {
                let (name, is_property) = element_token(arrays, v.slot, tokens)?;
                let parent_path = &paths[parent.get()];
                // parent text, the element and at most one separator
                let text = parent_path
                    .text_len()
                    .checked_add(name.len() + 1)
                    .ok_or_else(|| Error::budget(format!("slot {}: path text overflows", v.slot)))?;
                budget.reserve_bytes("path text", text)?;
                let appended = if is_property {
                    parent_path.append_property(name)
                } else {
                    parent_path.append_element(name)
                };
                appended.map_err(|e| Error::topology(format!("slot {}: {e}", v.slot)))?
            }
        };
        tracing::trace!(slot = v.slot, index = v.path_index.0, %path, "path");
        paths[v.path_index.get()] = path;
        Ok(())
    })?;

    Ok(paths)
}

/// Parent link of a [`Node`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NodeParent {
    /// Top of the hierarchy.
    Root,
    /// Never reached by the walk.
    #[default]
    Unset,
    /// Child of another node.
    Node(PathIndex),
}

impl NodeParent {
    /// Raw form: `-1` for the root, `-2` when unset.
    pub fn to_i64(self) -> i64 {
        match self {
            Self::Root => -1,
            Self::Unset => -2,
            Self::Node(i) => i.0 as i64,
        }
    }
}

/// One entry of the node hierarchy, indexed like the path table.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Node {
    pub parent: NodeParent,
    pub children: Vec<PathIndex>,
    pub child_names: BTreeSet<String>,
    pub path: Path,
    pub element_name: String,
}

impl Node {
    /// Check if the walk reached this node.
    pub fn is_set(&self) -> bool {
        self.parent != NodeParent::Unset
    }
}

/// Rebuild the parent/child hierarchy over an already decoded path table.
#[tracing::instrument(level = "debug", skip_all, fields(num_paths = arrays.num_paths))]
pub fn build_node_hierarchy(
    arrays: &PathArrays,
    paths: &[Path],
    tokens: &[String],
    config: &DecodeConfig,
    budget: &mut MemoryBudget,
) -> Result<Vec<Node>> {
    if paths.len() != arrays.num_paths {
        return Err(Error::topology(format!(
            "{} paths for {} path slots",
            paths.len(),
            arrays.num_paths
        )));
    }
    budget.reserve::<Node>("nodes", arrays.num_paths)?;
    let mut nodes = vec![Node::default(); arrays.num_paths];

    walk(arrays, config, |v| {
        let idx = v.path_index.get();
        budget.reserve_bytes("node path", paths[idx].text_len())?;
        match v.parent {
            None => {
                budget.reserve_bytes("node name", 1)?;
                nodes[idx].parent = NodeParent::Root;
                nodes[idx].element_name = "/".to_string();
            }
            Some(parent) => {
                let (name, _) = element_token(arrays, v.slot, tokens)?;
                // element name, child name entry and child link
                let bytes = 2 * name.len() + std::mem::size_of::<String>() + std::mem::size_of::<PathIndex>();
                budget.reserve_bytes("node names", bytes)?;
                let parent_node = &mut nodes[parent.get()];
                if !parent_node.is_set() {
                    return Err(Error::topology(format!(
                        "slot {}: parent {parent:?} was never reached",
                        v.slot
                    )));
                }
                if !parent_node.child_names.insert(name.to_string()) {
                    return Err(Error::topology(format!(
                        "duplicate child '{name}' under {}",
                        parent_node.path
                    )));
                }
                parent_node.children.push(v.path_index);
                nodes[idx].parent = NodeParent::Node(parent);
                nodes[idx].element_name = name.to_string();
            }
        }
        nodes[idx].path = paths[idx].clone();
        Ok(())
    })?;

    tracing::debug!(nodes = nodes.len(), "built node hierarchy");
    Ok(nodes)
}
