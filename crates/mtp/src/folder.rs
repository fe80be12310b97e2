//! The derived folder tree view (`spec.md` §3 "FolderTree", §9 "Intrusive
//! linked lists").
//!
//! The C source models this as `{child, sibling}` cons-cells threaded
//! through a singly-linked `LIBMTP_folder_t` list. Per the Design Notes,
//! the replacement is an arena of [`FolderNode`] addressed by index —
//! ownership is a flat `Vec`, not a web of raw pointers, and "find a
//! node's children" is an index lookup rather than a pointer chase.

use std::collections::HashMap;

use mtp_dtyp::ObjectHandle;

use crate::cache::ObjectCache;

/// Index into [`FolderTree::nodes`].
pub type NodeIdx = usize;

/// One folder (`spec.md` ObjectFormatCode::Association) in the tree.
#[derive(Debug, Clone)]
pub struct FolderNode {
    pub handle: ObjectHandle,
    pub name: String,
    pub parent: Option<NodeIdx>,
    /// In device handle-enumeration order (`spec.md` §3 "FolderTree").
    pub children: Vec<NodeIdx>,
}

/// The subset of the object cache with format `Association`, arranged as
/// a tree by `parent_handle` (`spec.md` §3 "FolderTree").
#[derive(Debug, Clone, Default)]
pub struct FolderTree {
    nodes: Vec<FolderNode>,
    by_handle: HashMap<ObjectHandle, NodeIdx>,
    /// Root-level folders (those whose parent is a storage root), in
    /// device handle order.
    roots: Vec<NodeIdx>,
}

impl FolderTree {
    /// Builds the tree from `order` — the device's `GetObjectHandles`
    /// enumeration order — looking each handle up in `cache`. Non-folder
    /// handles and handles not present in the cache are skipped.
    pub fn build(order: &[ObjectHandle], cache: &ObjectCache) -> Self {
        let mut tree = FolderTree::default();

        for &handle in order {
            let Some(record) = cache.get(handle) else {
                continue;
            };
            if !record.is_folder() {
                continue;
            }
            let idx = tree.nodes.len();
            tree.nodes.push(FolderNode {
                handle,
                name: record.filename.clone(),
                parent: None, // filled in below once every node exists
                children: Vec::new(),
            });
            tree.by_handle.insert(handle, idx);
        }

        for &handle in order {
            let Some(&idx) = tree.by_handle.get(&handle) else {
                continue;
            };
            let parent_handle = cache.get(handle).and_then(|r| r.parent);
            match parent_handle.and_then(|p| tree.by_handle.get(&p).copied()) {
                Some(parent_idx) => {
                    tree.nodes[idx].parent = Some(parent_idx);
                    tree.nodes[parent_idx].children.push(idx);
                }
                None => tree.roots.push(idx),
            }
        }

        tree
    }

    pub fn node(&self, idx: NodeIdx) -> &FolderNode {
        &self.nodes[idx]
    }

    pub fn find(&self, handle: ObjectHandle) -> Option<NodeIdx> {
        self.by_handle.get(&handle).copied()
    }

    pub fn roots(&self) -> &[NodeIdx] {
        &self.roots
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Looks up a child of `parent` (or a root, if `parent` is `None`) by
    /// case-insensitive name — the primitive `SplCodec` path resolution
    /// builds on (`spec.md` §4.5 "Path resolution is case-insensitive per
    /// component").
    pub fn child_named(&self, parent: Option<NodeIdx>, name: &str) -> Option<NodeIdx> {
        let candidates: &[NodeIdx] = match parent {
            Some(p) => &self.nodes[p].children,
            None => &self.roots,
        };
        candidates
            .iter()
            .copied()
            .find(|&idx| self.nodes[idx].name.eq_ignore_ascii_case(name))
    }

    /// The `\`-joined absolute path of `idx`, without a trailing slash and
    /// without a leading component for the storage itself (`spec.md` §4.5).
    pub fn path_of(&self, idx: NodeIdx) -> String {
        let mut parts = Vec::new();
        let mut cur = Some(idx);
        while let Some(i) = cur {
            parts.push(self.nodes[i].name.as_str());
            cur = self.nodes[i].parent;
        }
        parts.reverse();
        format!("\\{}", parts.join("\\"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mtp_dtyp::StorageId;
    use mtp_msg::ObjectFormatCode;

    fn folder(handle: u32, parent: Option<u32>, name: &str) -> crate::cache::ObjectRecord {
        crate::cache::ObjectRecord {
            handle: ObjectHandle::new(handle),
            parent: parent.map(ObjectHandle::new),
            storage_id: StorageId::new(1),
            format_code: ObjectFormatCode::Association,
            compressed_size: 0,
            filename: name.to_string(),
            metadata: None,
            references: None,
        }
    }

    #[test]
    fn builds_tree_with_nested_children() {
        let mut cache = ObjectCache::new();
        cache.upsert(folder(1, None, "Music"));
        cache.upsert(folder(2, Some(1), "Artist"));
        cache.upsert(folder(3, None, "Pictures"));

        let order = [
            ObjectHandle::new(1),
            ObjectHandle::new(2),
            ObjectHandle::new(3),
        ];
        let tree = FolderTree::build(&order, &cache);

        assert_eq!(tree.roots().len(), 2);
        let music_idx = tree.find(ObjectHandle::new(1)).unwrap();
        assert_eq!(tree.node(music_idx).children.len(), 1);
        assert_eq!(tree.path_of(tree.find(ObjectHandle::new(2)).unwrap()), "\\Music\\Artist");
    }

    #[test]
    fn child_named_is_case_insensitive() {
        let mut cache = ObjectCache::new();
        cache.upsert(folder(1, None, "Music"));
        let order = [ObjectHandle::new(1)];
        let tree = FolderTree::build(&order, &cache);
        assert_eq!(tree.child_named(None, "MUSIC"), tree.find(ObjectHandle::new(1)));
    }
}
