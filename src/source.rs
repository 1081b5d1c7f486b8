use crate::error::{Result, TreefenceError};
use crate::remote::{RemoteBackend, RemoteLocation, StorageOptions, required_options};
use crate::tree::{SortOrder, TreeBuilder, TreeNode};
use globset::GlobSet;
use ignore::WalkBuilder;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};
use walkdir::WalkDir;

/// Anything that can produce an enumerable tree of entries.
///
/// Implementations must not materialize entries deeper than `max_depth`
/// and must return children in `sort` order.
pub trait TreeProvider {
    /// # Errors
    ///
    /// `NotFound` if the source does not resolve to a readable directory,
    /// `Access` if a remote source rejects the request.
    fn tree(&self, max_depth: Option<usize>, sort: SortOrder) -> Result<TreeNode>;
}

/// Filters applied while walking a local directory
#[derive(Debug, Clone)]
pub struct WalkOptions {
    /// Include entries whose name starts with `.`
    pub show_hidden: bool,
    /// Honor `.gitignore`, `.ignore` and `.git/info/exclude` files found
    /// inside the walked root. Ignore files in parent directories and the
    /// user's global excludes file are never read, so output only depends
    /// on the rendered tree itself.
    pub use_gitignore: bool,
    /// Patterns matched against paths relative to the walked root
    pub exclude: Option<GlobSet>,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            show_hidden: false,
            use_gitignore: true,
            exclude: None,
        }
    }
}

/// A directory on the local filesystem
#[derive(Debug, Clone)]
pub struct LocalDir {
    pub path: PathBuf,
    pub options: WalkOptions,
}

impl LocalDir {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            options: WalkOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: WalkOptions) -> Self {
        self.options = options;
        self
    }

    fn root_name(&self) -> String {
        self.path.file_name().map_or_else(
            || self.path.display().to_string(),
            |name| name.to_string_lossy().into_owned(),
        )
    }

    fn walk_plain(&self, builder: &mut TreeBuilder, max_depth: Option<usize>) -> Result<()> {
        let mut walker = WalkDir::new(&self.path).sort_by_file_name();
        if let Some(max) = max_depth {
            walker = walker.max_depth(max);
        }

        let show_hidden = self.options.show_hidden;
        let exclude = self.options.exclude.as_ref();
        let entries = walker.into_iter().filter_entry(|entry| {
            entry.depth() == 0
                || keep_entry(&self.path, entry.path(), entry.file_name(), show_hidden, exclude)
        });

        for entry in entries {
            let entry = entry?;
            if entry.depth() == 0 {
                continue;
            }
            let relative = entry.path().strip_prefix(&self.path).unwrap_or(entry.path());
            trace!(path = %relative.display(), "walk entry");
            builder.insert_path(relative, entry.file_type().is_dir());
        }
        Ok(())
    }

    fn walk_gitignore(&self, builder: &mut TreeBuilder, max_depth: Option<usize>) -> Result<()> {
        let root = self.path.clone();
        let exclude = self.options.exclude.clone();

        let mut walk = WalkBuilder::new(&self.path);
        walk.hidden(!self.options.show_hidden)
            .ignore(true)
            .git_ignore(true)
            .git_exclude(true)
            .git_global(false)
            .parents(false)
            .require_git(false)
            .max_depth(max_depth)
            .sort_by_file_name(|a, b| a.cmp(b))
            .filter_entry(move |entry| {
                entry.depth() == 0
                    || keep_entry(&root, entry.path(), entry.file_name(), true, exclude.as_ref())
            });

        for entry in walk.build() {
            let entry = entry?;
            if entry.depth() == 0 {
                continue;
            }
            let relative = entry.path().strip_prefix(&self.path).unwrap_or(entry.path());
            let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
            trace!(path = %relative.display(), "walk entry");
            builder.insert_path(relative, is_dir);
        }
        Ok(())
    }
}

fn keep_entry(
    root: &Path,
    path: &Path,
    name: &OsStr,
    show_hidden: bool,
    exclude: Option<&GlobSet>,
) -> bool {
    if !show_hidden && name.to_string_lossy().starts_with('.') {
        return false;
    }
    if let Some(set) = exclude {
        let relative = path.strip_prefix(root).unwrap_or(path);
        if set.is_match(relative) {
            return false;
        }
    }
    true
}

impl TreeProvider for LocalDir {
    fn tree(&self, max_depth: Option<usize>, sort: SortOrder) -> Result<TreeNode> {
        if !self.path.is_dir() {
            return Err(TreefenceError::NotFound {
                path: self.path.clone(),
            });
        }
        debug!(
            path = %self.path.display(),
            ?max_depth,
            gitignore = self.options.use_gitignore,
            "walking local directory"
        );

        let mut builder = TreeBuilder::new(self.root_name(), max_depth);
        if self.options.use_gitignore {
            self.walk_gitignore(&mut builder, max_depth)?;
        } else {
            self.walk_plain(&mut builder, max_depth)?;
        }
        Ok(builder.finish(sort))
    }
}

/// A tree that was built in memory or loaded from JSON
impl TreeProvider for TreeNode {
    fn tree(&self, max_depth: Option<usize>, sort: SortOrder) -> Result<TreeNode> {
        let mut tree = self.clone();
        tree.normalize(max_depth, sort);
        Ok(tree)
    }
}

/// A tree listed through a [`RemoteBackend`]
#[derive(Debug, Clone)]
pub struct RemoteTree<'a> {
    pub location: RemoteLocation,
    pub options: StorageOptions,
    pub backend: &'a dyn RemoteBackend,
}

impl<'a> RemoteTree<'a> {
    #[must_use]
    pub fn new(
        location: RemoteLocation,
        options: StorageOptions,
        backend: &'a dyn RemoteBackend,
    ) -> Self {
        Self {
            location,
            options,
            backend,
        }
    }

    fn root_name(&self) -> String {
        match self.location.path.rsplit('/').next() {
            Some(last) if !last.is_empty() => last.to_string(),
            _ => self
                .options
                .get("repo")
                .unwrap_or(self.location.protocol.as_str())
                .to_string(),
        }
    }
}

impl TreeProvider for RemoteTree<'_> {
    fn tree(&self, max_depth: Option<usize>, sort: SortOrder) -> Result<TreeNode> {
        for key in required_options(&self.location.protocol) {
            self.options.require(key, &self.location)?;
        }
        if !self.backend.supports(&self.location.protocol) {
            return Err(TreefenceError::access(
                self.location.to_string(),
                format!("no backend for protocol `{}`", self.location.protocol),
            ));
        }

        debug!(location = %self.location, ?max_depth, "listing remote tree");
        let entries = self.backend.list(&self.location, &self.options)?;

        let prefix = self.location.path.as_str();
        let mut found = prefix.is_empty();
        let mut builder = TreeBuilder::new(self.root_name(), max_depth);
        for entry in &entries {
            let path = entry.path.trim_matches('/');
            let relative = if prefix.is_empty() {
                path
            } else if path == prefix {
                found |= entry.is_dir;
                continue;
            } else if let Some(rest) = path.strip_prefix(prefix).and_then(|r| r.strip_prefix('/')) {
                found = true;
                rest
            } else {
                continue;
            };
            builder.insert_str(relative, entry.is_dir);
        }

        if !found {
            return Err(TreefenceError::NotFound {
                path: PathBuf::from(self.location.to_string()),
            });
        }
        Ok(builder.finish(sort))
    }
}

/// The three kinds of tree input, chosen explicitly by the caller
#[derive(Debug, Clone)]
pub enum Source<'a> {
    Local(LocalDir),
    Tree(TreeNode),
    Remote(RemoteTree<'a>),
}

impl TreeProvider for Source<'_> {
    fn tree(&self, max_depth: Option<usize>, sort: SortOrder) -> Result<TreeNode> {
        match self {
            Self::Local(dir) => dir.tree(max_depth, sort),
            Self::Tree(node) => node.tree(max_depth, sort),
            Self::Remote(remote) => remote.tree(max_depth, sort),
        }
    }
}
