use crate::error::Result;
use crate::source::TreeProvider;
use crate::style::TreeStyle;
use crate::tree::{SortOrder, TreeNode};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use tracing::debug;

/// Fence line placed before and after every rendered tree
pub const FENCE: &str = "```";

/// Settings for a single render
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderConfig {
    #[serde(default)]
    pub style: TreeStyle,
    /// Deepest level shown; `None` is unlimited and `Some(0)` shows nothing
    #[serde(default, alias = "maximum_depth")]
    pub max_depth: Option<usize>,
    #[serde(default)]
    pub sort: SortOrder,
}

/// Tree lines plus the fence that wraps them.
///
/// `Display` writes the fenced block; [`RenderedOutput::body`] gives the
/// bare lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedOutput {
    pub lines: Vec<String>,
    pub fence: &'static str,
}

impl RenderedOutput {
    #[must_use]
    pub fn body(&self) -> String {
        self.lines.join("\n")
    }
}

impl fmt::Display for RenderedOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.fence)?;
        for line in &self.lines {
            writeln!(f, "{line}")?;
        }
        f.write_str(self.fence)
    }
}

/// Formats trees depth-first, one line per entry below the root.
///
/// The root itself is never printed; output starts with its children.
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeRenderer {
    config: RenderConfig,
}

impl TreeRenderer {
    #[must_use]
    pub const fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Materializes the source and renders it.
    ///
    /// # Errors
    ///
    /// Whatever the provider reports; nothing is rendered on failure.
    pub fn render(&self, source: &dyn TreeProvider) -> Result<RenderedOutput> {
        let mut tree = source.tree(self.config.max_depth, self.config.sort)?;
        // providers outside this crate may not bound or order their output
        tree.normalize(self.config.max_depth, self.config.sort);

        let lines = self.render_lines(&tree);
        debug!(
            root = %tree.name,
            style = %self.config.style,
            entries = lines.len(),
            "rendered tree"
        );
        Ok(RenderedOutput {
            lines,
            fence: FENCE,
        })
    }

    /// Renders an already normalized tree without the fence
    #[must_use]
    pub fn render_lines(&self, root: &TreeNode) -> Vec<String> {
        let mut lines = Vec::with_capacity(root.descendant_count());
        let mut prefix = String::new();
        self.push_children(root, &mut prefix, &mut lines);
        lines
    }

    fn push_children(&self, node: &TreeNode, prefix: &mut String, lines: &mut Vec<String>) {
        let glyphs = self.config.style.glyphs();
        let count = node.children.len();
        for (i, child) in node.children.iter().enumerate() {
            let is_last = i + 1 == count;
            let connector = if is_last { glyphs.last } else { glyphs.branch };
            lines.push(format!("{prefix}{connector}{}", display_name(&child.name)));

            if !child.children.is_empty() {
                let len = prefix.len();
                prefix.push_str(if is_last { glyphs.blank } else { glyphs.vertical });
                self.push_children(child, prefix, lines);
                prefix.truncate(len);
            }
        }
    }
}

/// Escapes control characters so every entry stays on one line
fn display_name(name: &str) -> Cow<'_, str> {
    if !name.chars().any(char::is_control) {
        return Cow::Borrowed(name);
    }
    let mut escaped = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        if c.is_control() {
            escaped.extend(c.escape_debug());
        } else {
            escaped.push(c);
        }
    }
    Cow::Owned(escaped)
}

/// Renders `source` as a fenced tree.
///
/// The style key is validated before the source is touched.
///
/// # Errors
///
/// - `TreefenceError::Configuration` if `style` is not a known style.
/// - `TreefenceError::NotFound` / `TreefenceError::Access` from the source.
pub fn render(source: &dyn TreeProvider, style: &str, max_depth: Option<usize>) -> Result<String> {
    let style: TreeStyle = style.parse()?;
    let renderer = TreeRenderer::new(RenderConfig {
        style,
        max_depth,
        ..RenderConfig::default()
    });
    Ok(renderer.render(source)?.to_string())
}
