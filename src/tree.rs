// Copyright 2026 Thomas Johannesson
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Repository tree: the full directory graph of a checkin's tracked
// paths, stored in an arena indexed by `NodeId`. Directories are
// synthesised from path components and carry no uuid; files carry their
// F card's uuid and permissions. Display happens through `TreeObject`,
// a sorted flat copy of one directory's children.

use std::path::Path;

use crate::repo::deck::{FCard, FilePerm};
use crate::repo::{RepoError, RepoResult};

/// Index of a node in the tree arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeId(u32);

#[derive(Debug)]
pub struct TreeNode {
    pub basename: String,
    /// Full repository-relative path.
    pub path: String,
    /// Content hash; `None` for directories.
    pub uuid: Option<String>,
    pub perms: FilePerm,
    pub is_dir: bool,
    pub parent: Option<NodeId>,
    children: Vec<NodeId>,
    /// Working-tree mtime (seconds); directories hold the max of their
    /// descendants'.
    pub mtime: i64,
}

/// Arena-backed tree of every tracked path in one checkin.
pub struct RepoTree {
    nodes: Vec<TreeNode>,
    roots: Vec<NodeId>,
}

impl RepoTree {
    /// Build the tree from a checkin's effective F cards, optionally
    /// decorating nodes with working-tree stat data.
    pub fn build(fcards: &[FCard], checkout_root: Option<&Path>) -> RepoResult<RepoTree> {
        let mut tree = RepoTree {
            nodes: Vec::with_capacity(fcards.len() * 2),
            roots: Vec::new(),
        };
        for card in fcards {
            tree.insert(card)?;
        }
        if let Some(root) = checkout_root {
            tree.decorate(root);
        }
        Ok(tree)
    }

    pub fn node(&self, id: NodeId) -> &TreeNode {
        &self.nodes[id.0 as usize]
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn insert(&mut self, card: &FCard) -> RepoResult<()> {
        let mut parent: Option<NodeId> = None;
        let mut walked = String::new();
        let components: Vec<&str> = card.name.split('/').filter(|c| !c.is_empty()).collect();
        if components.is_empty() {
            return Err(RepoError::Malformed(format!(
                "F card with empty path '{}'",
                card.name
            )));
        }
        for (i, component) in components.iter().enumerate() {
            if !walked.is_empty() {
                walked.push('/');
            }
            walked.push_str(component);
            let terminal = i == components.len() - 1;
            match self.find_child(parent, component) {
                Some(existing) => {
                    if terminal || !self.node(existing).is_dir {
                        return Err(RepoError::Malformed(format!(
                            "path '{}' conflicts with an existing entry",
                            card.name
                        )));
                    }
                    parent = Some(existing);
                }
                None => {
                    let id = self.add_node(TreeNode {
                        basename: component.to_string(),
                        path: walked.clone(),
                        uuid: if terminal { card.uuid.clone() } else { None },
                        perms: if terminal { card.perms } else { FilePerm::Regular },
                        is_dir: !terminal,
                        parent,
                        children: Vec::new(),
                        mtime: 0,
                    });
                    parent = Some(id);
                }
            }
        }
        Ok(())
    }

    fn add_node(&mut self, node: TreeNode) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        let parent = node.parent;
        self.nodes.push(node);
        match parent {
            Some(p) => self.nodes[p.0 as usize].children.push(id),
            None => self.roots.push(id),
        }
        id
    }

    fn find_child(&self, parent: Option<NodeId>, basename: &str) -> Option<NodeId> {
        let siblings = match parent {
            Some(p) => &self.node(p).children,
            None => &self.roots,
        };
        siblings
            .iter()
            .copied()
            .find(|&id| self.node(id).basename == basename)
    }

    /// Stat each file within the checkout and propagate mtimes to
    /// ancestor directories.
    fn decorate(&mut self, checkout_root: &Path) {
        for i in 0..self.nodes.len() {
            if self.nodes[i].is_dir {
                continue;
            }
            let disk = checkout_root.join(&self.nodes[i].path);
            let Ok(meta) = std::fs::symlink_metadata(&disk) else {
                continue;
            };
            let mtime = meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_secs() as i64)
                .unwrap_or(0);
            self.nodes[i].mtime = mtime;
            let mut parent = self.nodes[i].parent;
            while let Some(p) = parent {
                let dir = &mut self.nodes[p.0 as usize];
                if dir.mtime >= mtime {
                    break;
                }
                dir.mtime = mtime;
                parent = dir.parent;
            }
        }
    }

    /// Locate the directory node for a repository-relative path; `""`
    /// addresses the root.
    pub fn find_dir(&self, path: &str) -> Option<Option<NodeId>> {
        if path.is_empty() || path == "/" {
            return Some(None);
        }
        let mut parent: Option<NodeId> = None;
        for component in path.trim_matches('/').split('/') {
            let child = self.find_child(parent, component)?;
            if !self.node(child).is_dir {
                return None;
            }
            parent = Some(child);
        }
        Some(parent)
    }

    /// Materialise the display object for one directory (`None` = root):
    /// a flat copy of its children sorted by basename.
    pub fn subtree(&self, dir: Option<NodeId>) -> TreeObject {
        let ids = match dir {
            Some(d) => &self.node(d).children,
            None => &self.roots,
        };
        let mut sorted: Vec<NodeId> = ids.clone();
        sorted.sort_by(|&a, &b| self.node(a).basename.as_bytes().cmp(self.node(b).basename.as_bytes()));
        let entries = sorted
            .iter()
            .enumerate()
            .map(|(idx, &id)| {
                let node = self.node(id);
                TreeEntry {
                    id,
                    idx,
                    basename: node.basename.clone(),
                    path: node.path.clone(),
                    uuid: node.uuid.clone(),
                    perms: node.perms,
                    is_dir: node.is_dir,
                }
            })
            .collect();
        TreeObject { dir, entries }
    }

    /// Target of a symlink entry, read from the working checkout.
    pub fn link_target(&self, id: NodeId, checkout_root: Option<&Path>) -> Option<String> {
        let node = self.node(id);
        if node.perms != FilePerm::Symlink {
            return None;
        }
        let root = checkout_root?;
        std::fs::read_link(root.join(&node.path))
            .ok()
            .map(|t| t.to_string_lossy().into_owned())
    }
}

/// One row of a displayed directory listing.
#[derive(Debug, Clone)]
pub struct TreeEntry {
    pub id: NodeId,
    /// Position within the owning object.
    pub idx: usize,
    pub basename: String,
    pub path: String,
    pub uuid: Option<String>,
    pub perms: FilePerm,
    pub is_dir: bool,
}

impl TreeEntry {
    /// Display suffix: `/` directory, `*` executable, `@` symlink.
    pub fn suffix(&self) -> &'static str {
        if self.is_dir {
            "/"
        } else {
            match self.perms {
                FilePerm::Executable => "*",
                FilePerm::Symlink => "@",
                FilePerm::Regular => "",
            }
        }
    }
}

/// The flat entry array for the directory currently on display.
#[derive(Debug, Clone)]
pub struct TreeObject {
    /// The directory these entries belong to; `None` at the root.
    pub dir: Option<NodeId>,
    pub entries: Vec<TreeEntry>,
}

impl TreeObject {
    pub fn is_root(&self) -> bool {
        self.dir.is_none()
    }

    /// Width of the widest uuid in this object, for column padding.
    pub fn max_uuid_len(&self) -> usize {
        self.entries
            .iter()
            .filter_map(|e| e.uuid.as_ref().map(String::len))
            .max()
            .unwrap_or(0)
    }
}

/// Snapshot taken when descending into a subdirectory, restored verbatim
/// on the way back up.
pub struct ParentFrame {
    pub tree: TreeObject,
    pub first: usize,
    pub selected: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fcard(name: &str, uuid: &str) -> FCard {
        FCard {
            name: name.to_string(),
            uuid: Some(uuid.to_string()),
            perms: FilePerm::Regular,
            prior_name: None,
        }
    }

    fn sample_tree() -> RepoTree {
        RepoTree::build(
            &[
                fcard("README.md", "r1"),
                fcard("src/a.c", "a1"),
                fcard("src/b.c", "b1"),
                fcard("src/sub/deep.c", "d1"),
                fcard("zoo.txt", "z1"),
            ],
            None,
        )
        .unwrap()
    }

    #[test]
    fn directories_are_synthesised_without_uuids() {
        let tree = sample_tree();
        let root = tree.subtree(None);
        let names: Vec<&str> = root.entries.iter().map(|e| e.basename.as_str()).collect();
        assert_eq!(names, ["README.md", "src", "zoo.txt"]);
        let src = &root.entries[1];
        assert!(src.is_dir);
        assert!(src.uuid.is_none());
        assert_eq!(src.suffix(), "/");
    }

    #[test]
    fn parent_paths_are_strict_prefixes() {
        let tree = sample_tree();
        for id in (0..tree.nodes.len() as u32).map(NodeId) {
            let node = tree.node(id);
            if let Some(parent) = node.parent {
                let parent_path = &tree.node(parent).path;
                assert!(node.path.starts_with(&format!("{parent_path}/")));
            }
        }
    }

    #[test]
    fn subtree_entries_are_sorted_and_indexed() {
        let tree = sample_tree();
        let dir = tree.find_dir("src").unwrap();
        let obj = tree.subtree(dir);
        assert!(!obj.is_root());
        let names: Vec<&str> = obj.entries.iter().map(|e| e.basename.as_str()).collect();
        assert_eq!(names, ["a.c", "b.c", "sub"]);
        for (i, entry) in obj.entries.iter().enumerate() {
            assert_eq!(entry.idx, i);
        }
    }

    #[test]
    fn find_dir_resolves_nested_paths_and_rejects_files() {
        let tree = sample_tree();
        assert!(tree.find_dir("").unwrap().is_none());
        assert!(tree.find_dir("src/sub").is_some());
        assert!(tree.find_dir("src/a.c").is_none());
        assert!(tree.find_dir("nope").is_none());
    }

    #[test]
    fn duplicate_paths_are_rejected() {
        let err = RepoTree::build(&[fcard("a.c", "1"), fcard("a.c", "2")], None);
        assert!(err.is_err());
        // A file cannot also be a directory.
        let err = RepoTree::build(&[fcard("a", "1"), fcard("a/b.c", "2")], None);
        assert!(err.is_err());
    }

    #[test]
    fn uuid_padding_uses_the_widest_entry() {
        let tree = RepoTree::build(
            &[
                fcard("long.c", &"a".repeat(64)),
                fcard("short.c", &"b".repeat(40)),
                fcard("dir/child.c", "c1"),
            ],
            None,
        )
        .unwrap();
        let obj = tree.subtree(None);
        assert_eq!(obj.max_uuid_len(), 64);
    }
}
