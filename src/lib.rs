//! # treefence
//!
//! Renders directory trees as fenced text blocks for generated documentation.
//! A tree can come from a local directory, a pre-built [`TreeNode`], or a
//! remote store reached through a [`RemoteBackend`].
//!
//! ## Features
//!
//! - Glyph styles: `default`, `ansi`, `ascii`, `rounded`, `spaces`
//! - Depth limiting; subtrees below the limit are never read
//! - Deterministic ordering for reproducible builds
//! - `.gitignore`, hidden-file and glob filtering for local directories
//! - `{{ tree ... }}` directives inside documentation templates
//!
//! ## Usage
//!
//! ### As a Library
//!
//! ```no_run
//! use treefence::{LocalDir, render};
//!
//! match render(&LocalDir::new("docs"), "ascii", Some(2)) {
//!     Ok(block) => println!("{block}"),
//!     Err(e) => eprintln!("Error: {e}"),
//! }
//! ```
//!
//! ### In a Template
//!
//! ```text
//! ## Layout
//! {{ tree @src/ style=rounded maximum_depth=2 }}
//! {{ tree github://docs org=acme repo=site }}
//! ```
//!
//! ### As a CLI Tool
//!
//! ```bash
//! # Render a directory
//! treefence docs/ --style ascii -d 2
//!
//! # Expand directives in a template
//! treefence --template layout.md.in -o layout.md
//! ```

pub mod error;
pub mod fs_utils;
pub mod remote;
pub mod render;
pub mod source;
pub mod style;
pub mod template;
pub mod tree;

// Re-export main types and functions for convenience
pub use error::{ErrorKind, Result, TreefenceError};
pub use remote::{MemoryBackend, RemoteBackend, RemoteEntry, RemoteLocation, StorageOptions};
pub use render::{FENCE, RenderConfig, RenderedOutput, TreeRenderer, render};
pub use source::{LocalDir, RemoteTree, Source, TreeProvider, WalkOptions};
pub use style::{Glyphs, TreeStyle};
pub use template::{
    DirectiveTarget, TemplateConfig, TreeDirective, find_directives, process_directive,
    process_template, process_template_file,
};
pub use tree::{SortOrder, TreeBuilder, TreeNode};
