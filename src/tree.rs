use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::ffi::{OsStr, OsString};
use std::path::{Component, Path};

/// One entry of a directory tree.
///
/// The JSON form of this type is the pre-built tree format: `depth` and
/// `children` may be omitted and are recomputed before rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    pub name: String,
    #[serde(default)]
    pub is_dir: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeNode>,
    #[serde(default)]
    pub depth: usize,
}

/// Ordering applied to the children of every directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortOrder {
    /// Lexicographic by name
    #[default]
    Name,
    /// Directories before files, each group lexicographic
    DirsFirst,
}

impl SortOrder {
    fn compare(self, a: &TreeNode, b: &TreeNode) -> Ordering {
        match self {
            Self::Name => a.name.cmp(&b.name),
            Self::DirsFirst => b.is_dir.cmp(&a.is_dir).then_with(|| a.name.cmp(&b.name)),
        }
    }
}

impl TreeNode {
    #[must_use]
    pub fn dir(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dir: true,
            children: Vec::new(),
            depth: 0,
        }
    }

    #[must_use]
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dir: false,
            children: Vec::new(),
            depth: 0,
        }
    }

    /// Appends a child, turning this node into a directory
    #[must_use]
    pub fn with_child(mut self, child: Self) -> Self {
        self.is_dir = true;
        self.children.push(child);
        self
    }

    /// Recomputes depths from this node (depth 0), drops everything below
    /// `max_depth` and sorts children.
    pub fn normalize(&mut self, max_depth: Option<usize>, sort: SortOrder) {
        self.normalize_at(0, max_depth, sort);
    }

    fn normalize_at(&mut self, depth: usize, max_depth: Option<usize>, sort: SortOrder) {
        self.depth = depth;
        if !self.children.is_empty() {
            self.is_dir = true;
        }
        if max_depth.is_some_and(|max| depth >= max) {
            self.children.clear();
            return;
        }
        self.children.sort_by(|a, b| sort.compare(a, b));
        for child in &mut self.children {
            child.normalize_at(depth + 1, max_depth, sort);
        }
    }

    /// Number of entries below this node
    #[must_use]
    pub fn descendant_count(&self) -> usize {
        self.children
            .iter()
            .map(|child| 1 + child.descendant_count())
            .sum()
    }

    /// Names of all descendants in depth-first pre-order
    #[must_use]
    pub fn descendant_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_names(&mut names);
        names
    }

    fn collect_names<'a>(&'a self, names: &mut Vec<&'a str>) {
        for child in &self.children {
            names.push(child.name.as_str());
            child.collect_names(names);
        }
    }
}

/// Entry under construction, keyed by its raw name so names that only
/// differ in non-UTF-8 bytes stay separate entries.
#[derive(Debug)]
struct PendingEntry {
    key: OsString,
    is_dir: bool,
    children: Vec<PendingEntry>,
}

impl PendingEntry {
    fn new(key: OsString, is_dir: bool) -> Self {
        Self {
            key,
            is_dir,
            children: Vec::new(),
        }
    }

    fn child_mut(&mut self, key: &OsStr, is_dir: bool) -> &mut Self {
        let index = match self.children.iter().position(|c| c.key.as_os_str() == key) {
            Some(index) => index,
            None => {
                self.children.push(Self::new(key.to_os_string(), is_dir));
                self.children.len() - 1
            }
        };
        let child = &mut self.children[index];
        child.is_dir |= is_dir;
        child
    }

    fn into_node(mut self, depth: usize) -> TreeNode {
        self.children.sort_by(|a, b| a.key.cmp(&b.key));
        TreeNode {
            name: self.key.to_string_lossy().into_owned(),
            is_dir: self.is_dir,
            children: self
                .children
                .into_iter()
                .map(|child| child.into_node(depth + 1))
                .collect(),
            depth,
        }
    }
}

/// Assembles a [`TreeNode`] from entry paths relative to a root.
///
/// Intermediate directories are created on demand and repeated paths are
/// merged, so backends may list entries in any order.
#[derive(Debug)]
pub struct TreeBuilder {
    root: PendingEntry,
    max_depth: Option<usize>,
}

impl TreeBuilder {
    #[must_use]
    pub fn new(root_name: impl Into<String>, max_depth: Option<usize>) -> Self {
        Self {
            root: PendingEntry::new(OsString::from(root_name.into()), true),
            max_depth,
        }
    }

    /// Inserts an entry given by its name components.
    ///
    /// Returns `false` when the entry lies below `max_depth` and was skipped;
    /// its ancestor at the depth limit is still recorded as a directory.
    pub fn insert<S: AsRef<OsStr>>(&mut self, components: &[S], is_dir: bool) -> bool {
        if components.is_empty() {
            return false;
        }
        if let Some(max) = self.max_depth
            && components.len() > max
        {
            // the ancestor at the depth limit still exists even if it was never listed
            if max > 0 {
                self.insert(&components[..max], true);
            }
            return false;
        }
        let last = components.len() - 1;
        let mut node = &mut self.root;
        for (i, name) in components.iter().enumerate() {
            node = node.child_mut(name.as_ref(), i < last || is_dir);
        }
        true
    }

    /// Inserts a slash-separated path such as `docs/guide/index.md`
    pub fn insert_str(&mut self, path: &str, is_dir: bool) -> bool {
        let components: Vec<&str> = path
            .split('/')
            .filter(|c| !c.is_empty() && *c != ".")
            .collect();
        self.insert(&components, is_dir)
    }

    /// Inserts a relative filesystem path
    pub fn insert_path(&mut self, path: &Path, is_dir: bool) -> bool {
        let components: Vec<&OsStr> = path
            .components()
            .filter_map(|c| match c {
                Component::Normal(name) => Some(name),
                _ => None,
            })
            .collect();
        self.insert(&components, is_dir)
    }

    #[must_use]
    pub fn finish(self, sort: SortOrder) -> TreeNode {
        let mut root = self.root.into_node(0);
        root.normalize(self.max_depth, sort);
        root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TreeNode {
        TreeNode::dir("root")
            .with_child(TreeNode::dir("sub").with_child(TreeNode::file("b.txt")))
            .with_child(TreeNode::file("a.txt"))
            .with_child(TreeNode::dir("empty"))
    }

    #[test]
    fn test_normalize_sorts_by_name() {
        let mut tree = sample();
        tree.normalize(None, SortOrder::Name);
        assert_eq!(tree.descendant_names(), vec!["a.txt", "empty", "sub", "b.txt"]);
        assert_eq!(tree.children[2].children[0].depth, 2);
    }

    #[test]
    fn test_normalize_dirs_first() {
        let mut tree = sample();
        tree.normalize(None, SortOrder::DirsFirst);
        assert_eq!(tree.descendant_names(), vec!["empty", "sub", "b.txt", "a.txt"]);
    }

    #[test]
    fn test_normalize_prunes_below_max_depth() {
        let mut tree = sample();
        tree.normalize(Some(1), SortOrder::Name);
        assert_eq!(tree.descendant_count(), 3);
        assert!(tree.children.iter().all(|c| c.children.is_empty()));

        let mut tree = sample();
        tree.normalize(Some(0), SortOrder::Name);
        assert_eq!(tree.descendant_count(), 0);
    }

    #[test]
    fn test_node_with_children_becomes_dir() {
        let json = r#"{"name": "root", "children": [{"name": "x", "children": [{"name": "y"}]}]}"#;
        let mut tree: TreeNode = serde_json::from_str(json).unwrap();
        tree.normalize(None, SortOrder::Name);
        assert!(tree.is_dir);
        assert!(tree.children[0].is_dir);
        assert!(!tree.children[0].children[0].is_dir);
    }

    #[test]
    fn test_builder_creates_intermediate_dirs() {
        let mut builder = TreeBuilder::new("repo", None);
        assert!(builder.insert_str("docs/guide/index.md", false));
        assert!(builder.insert_str("docs/", true));
        assert!(builder.insert_str("README.md", false));
        let tree = builder.finish(SortOrder::Name);

        assert_eq!(
            tree.descendant_names(),
            vec!["README.md", "docs", "guide", "index.md"]
        );
        assert!(tree.children[1].is_dir);
        assert!(tree.children[1].children[0].is_dir);
    }

    #[test]
    fn test_builder_merges_duplicates() {
        let mut builder = TreeBuilder::new("repo", None);
        builder.insert_str("a/b", false);
        builder.insert_str("a/b", false);
        builder.insert_str("./a", true);
        let tree = builder.finish(SortOrder::Name);
        assert_eq!(tree.descendant_count(), 2);
    }

    #[test]
    fn test_builder_respects_max_depth() {
        let mut builder = TreeBuilder::new("repo", Some(1));
        assert!(builder.insert_str("top.txt", false));
        assert!(!builder.insert_str("dir/nested.txt", false));
        assert!(!builder.insert_str("", true));
        let tree = builder.finish(SortOrder::Name);
        assert_eq!(tree.descendant_names(), vec!["dir", "top.txt"]);
        assert!(tree.children[0].is_dir);
        assert!(tree.children[0].children.is_empty());
    }

    #[test]
    fn test_builder_insert_path() {
        let mut builder = TreeBuilder::new("root", None);
        builder.insert_path(Path::new("src/lib.rs"), false);
        let tree = builder.finish(SortOrder::Name);
        assert_eq!(tree.descendant_names(), vec!["src", "lib.rs"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_builder_keeps_distinct_non_utf8_names() {
        use std::os::unix::ffi::OsStrExt;

        let mut builder = TreeBuilder::new("root", None);
        builder.insert(&[OsStr::from_bytes(b"a\xff")], false);
        builder.insert(&[OsStr::from_bytes(b"a\xfe")], false);
        builder.insert(&[OsStr::from_bytes(b"a\xff")], false);
        let tree = builder.finish(SortOrder::Name);
        assert_eq!(tree.descendant_names(), vec!["a\u{fffd}", "a\u{fffd}"]);
    }
}
