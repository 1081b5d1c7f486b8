use crate::error::{Result, TreefenceError};
use crate::fs_utils::{read_template, resolve_local_path};
use crate::remote::{RemoteBackend, RemoteLocation, StorageOptions};
use crate::render::{RenderConfig, TreeRenderer};
use crate::source::{LocalDir, RemoteTree, Source, WalkOptions};
use crate::tree::SortOrder;
use clap::ValueEnum;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Configuration for template processing
#[derive(Debug, Clone)]
pub struct TemplateConfig {
    /// Base directory for resolving `@path` targets (usually current working directory)
    pub base_dir: PathBuf,
    /// Style, depth and ordering used when a directive doesn't override them
    pub render: RenderConfig,
    /// Filters for local directory walks
    pub walk: WalkOptions,
    /// Backend for `protocol://path` targets
    pub remote: Option<Arc<dyn RemoteBackend>>,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            base_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            render: RenderConfig::default(),
            walk: WalkOptions::default(),
            remote: None,
        }
    }
}

/// What a directive renders
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectiveTarget {
    /// `@relative/path`, resolved against the base directory
    Local(String),
    /// `protocol://path`
    Remote(RemoteLocation),
}

impl DirectiveTarget {
    fn parse(token: &str) -> Result<Self> {
        if token.starts_with('@') {
            Ok(Self::Local(token.to_string()))
        } else if token.contains("://") {
            token.parse().map(Self::Remote)
        } else {
            Err(TreefenceError::config(
                "target",
                format!("`{token}` is neither `@path` nor `protocol://path`"),
            ))
        }
    }
}

/// A `{{ tree TARGET key=value ... }}` directive found in a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeDirective {
    /// The full match including {{ and }}
    pub full_match: String,
    pub target: DirectiveTarget,
    /// Options in the order written
    pub args: Vec<(String, String)>,
    /// Starting position in the template
    pub start: usize,
    /// Ending position in the template
    pub end: usize,
}

impl TreeDirective {
    /// Splits directive options into render settings and storage options
    ///
    /// # Errors
    ///
    /// `TreefenceError::Configuration` for an unknown style, sort order or
    /// a depth that isn't a non-negative integer.
    pub fn settings(&self, defaults: RenderConfig) -> Result<(RenderConfig, StorageOptions)> {
        let mut config = defaults;
        let mut options = StorageOptions::new();
        for (key, value) in &self.args {
            match key.as_str() {
                "style" => config.style = value.parse()?,
                "maximum_depth" | "max_depth" => config.max_depth = parse_depth(key, value)?,
                "sort" => {
                    config.sort = <SortOrder as ValueEnum>::from_str(value, true).map_err(|_| {
                        TreefenceError::config(key, format!("unknown sort order `{value}`"))
                    })?;
                }
                _ => options.insert(key, value),
            }
        }
        Ok((config, options))
    }
}

fn parse_depth(key: &str, value: &str) -> Result<Option<usize>> {
    if value.eq_ignore_ascii_case("none") || value.eq_ignore_ascii_case("unlimited") {
        return Ok(None);
    }
    value.parse().map(Some).map_err(|_| {
        TreefenceError::config(key, format!("`{value}` is not a non-negative integer"))
    })
}

/// Finds all tree directives in the given text
///
/// # Errors
///
/// - `TreefenceError::Regex` if there's an error compiling the regex pattern.
/// - `TreefenceError::Configuration` if a directive has no target, an
///   invalid target or an option not written as `key=value`.
pub fn find_directives(template: &str) -> Result<Vec<TreeDirective>> {
    let pattern = Regex::new(r"\{\{\s*tree\s+([^}]*?)\s*\}\}")?;
    let mut directives = Vec::new();

    for capture in pattern.captures_iter(template) {
        if let Some(full_match) = capture.get(0)
            && let Some(body) = capture.get(1)
        {
            let mut tokens = body.as_str().split_whitespace();
            let target = tokens.next().ok_or_else(|| {
                TreefenceError::config(
                    "target",
                    format!("missing target in `{}`", full_match.as_str()),
                )
            })?;
            let args = tokens
                .map(|token| {
                    token
                        .split_once('=')
                        .filter(|(key, _)| !key.is_empty())
                        .map(|(key, value)| (key.to_string(), value.to_string()))
                        .ok_or_else(|| {
                            TreefenceError::config(token, "expected an option written as key=value")
                        })
                })
                .collect::<Result<Vec<_>>>()?;

            directives.push(TreeDirective {
                full_match: full_match.as_str().to_string(),
                target: DirectiveTarget::parse(target)?,
                args,
                start: full_match.start(),
                end: full_match.end(),
            });
        }
    }

    Ok(directives)
}

/// Renders a single directive into its fenced tree block
///
/// # Errors
///
/// - `TreefenceError::Configuration` for invalid options.
/// - `TreefenceError::Access` if a local target escapes the base directory,
///   no remote backend is configured, or the backend rejects the request.
/// - `TreefenceError::NotFound` if the target doesn't exist.
pub fn process_directive(directive: &TreeDirective, config: &TemplateConfig) -> Result<String> {
    let (render_config, options) = directive.settings(config.render)?;

    let source = match &directive.target {
        DirectiveTarget::Local(target) => {
            if !options.is_empty() {
                warn!(target = %target, "storage options ignored for local target");
            }
            let path = resolve_local_path(target, &config.base_dir)?;
            Source::Local(LocalDir::new(path).with_options(config.walk.clone()))
        }
        DirectiveTarget::Remote(location) => {
            let backend = config.remote.as_deref().ok_or_else(|| {
                TreefenceError::access(location.to_string(), "no remote backend configured")
            })?;
            Source::Remote(RemoteTree::new(location.clone(), options, backend))
        }
    };

    debug!(directive = %directive.full_match, "expanding tree directive");
    let output = TreeRenderer::new(render_config).render(&source)?;
    Ok(output.to_string())
}

/// Expands every tree directive in a template
///
/// # Errors
///
/// The first error from `find_directives` or `process_directive`; the
/// template is never partially expanded.
pub fn process_template(template: &str, config: &TemplateConfig) -> Result<String> {
    let directives = find_directives(template)?;

    // Process from end to beginning to maintain correct positions
    let mut result = template.to_string();
    for directive in directives.iter().rev() {
        let block = process_directive(directive, config)?;
        let replacement = on_own_lines(template, directive.start, directive.end, block);
        result.replace_range(directive.start..directive.end, &replacement);
    }

    Ok(result)
}

/// Moves a block onto its own lines when the directive it replaces shares
/// a line with other text; fence lines must stand alone.
fn on_own_lines(template: &str, start: usize, end: usize, mut block: String) -> String {
    let rest = &template[end..];
    if !(rest.is_empty() || rest.starts_with('\n') || rest.starts_with("\r\n")) {
        block.push('\n');
    }
    if start > 0 && !template[..start].ends_with('\n') {
        block.insert(0, '\n');
    }
    block
}

/// Process a template from a file
///
/// # Errors
///
/// - `TreefenceError::NotFound` if the template file doesn't exist.
/// - Other errors from `process_template`.
pub fn process_template_file(template_path: &Path, config: &TemplateConfig) -> Result<String> {
    let template = read_template(template_path)?;
    process_template(&template, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::remote::{MemoryBackend, RemoteEntry};
    use crate::style::TreeStyle;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_env() -> (TempDir, TemplateConfig) {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path();
        fs::create_dir_all(base.join("docs/guide")).unwrap();
        fs::write(base.join("docs/index.md"), "index").unwrap();
        fs::write(base.join("docs/guide/setup.md"), "setup").unwrap();

        let config = TemplateConfig {
            base_dir: base.to_path_buf(),
            render: RenderConfig {
                style: TreeStyle::Ascii,
                ..RenderConfig::default()
            },
            ..TemplateConfig::default()
        };
        (temp_dir, config)
    }

    #[test]
    fn test_find_directives_basic() {
        let template = "Start {{ tree @docs }} middle {{ tree github://src org=acme repo=site }} end";
        let directives = find_directives(template).unwrap();
        assert_eq!(directives.len(), 2);
        assert_eq!(directives[0].target, DirectiveTarget::Local("@docs".to_string()));
        assert!(directives[0].args.is_empty());
        assert_eq!(&template[directives[0].start..directives[0].end], "{{ tree @docs }}");

        let DirectiveTarget::Remote(location) = &directives[1].target else {
            panic!("expected remote target");
        };
        assert_eq!(location.protocol, "github");
        assert_eq!(location.path, "src");
        assert_eq!(directives[1].args.len(), 2);
    }

    #[test]
    fn test_find_directives_with_spaces() {
        let template = "{{   tree    @.   style=rounded   maximum_depth=2  }}";
        let directives = find_directives(template).unwrap();
        assert_eq!(directives.len(), 1);
        assert_eq!(
            directives[0].args,
            vec![
                ("style".to_string(), "rounded".to_string()),
                ("maximum_depth".to_string(), "2".to_string()),
            ]
        );
    }

    #[test]
    fn test_find_directives_empty_template() {
        assert!(find_directives("").unwrap().is_empty());
        assert!(find_directives("No directives here").unwrap().is_empty());
        // other placeholders belong to other renderers
        assert!(find_directives("{{ @file.txt }} {{ treeview }}").unwrap().is_empty());
    }

    #[test]
    fn test_find_directives_malformed() {
        assert!(find_directives("{{ tree @docs").unwrap().is_empty());

        let err = find_directives("{{ tree docs }}").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let err = find_directives("{{ tree @docs ascii }}").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let err = find_directives("{{ tree  }}").unwrap_err();
        assert!(err.to_string().contains("missing target"));
    }

    #[test]
    fn test_directive_settings() {
        let directives =
            find_directives("{{ tree github:// style=spaces max_depth=3 sort=dirs-first org=acme }}")
                .unwrap();
        let (config, options) = directives[0].settings(RenderConfig::default()).unwrap();
        assert_eq!(config.style, TreeStyle::Spaces);
        assert_eq!(config.max_depth, Some(3));
        assert_eq!(config.sort, SortOrder::DirsFirst);
        assert_eq!(options.get("org"), Some("acme"));

        let defaults = RenderConfig {
            max_depth: Some(4),
            ..RenderConfig::default()
        };
        let directives = find_directives("{{ tree @. maximum_depth=none }}").unwrap();
        let (config, _) = directives[0].settings(defaults).unwrap();
        assert_eq!(config.max_depth, None);
    }

    #[test]
    fn test_directive_settings_invalid() {
        for text in [
            "{{ tree @. style=bogus }}",
            "{{ tree @. maximum_depth=-1 }}",
            "{{ tree @. maximum_depth=deep }}",
            "{{ tree @. sort=size }}",
        ] {
            let directives = find_directives(text).unwrap();
            let err = directives[0].settings(RenderConfig::default()).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Configuration, "{text}");
        }
    }

    #[test]
    fn test_process_template_integration() {
        let (_temp_dir, config) = create_test_env();
        let template = "# Layout\n\n{{ tree @docs }}\n\nTop level only:\n\n{{ tree @. maximum_depth=1 style=ansi }}\n";
        let output = process_template(template, &config).unwrap();

        assert_eq!(
            output,
            "# Layout\n\n```\n|-- guide\n|   `-- setup.md\n`-- index.md\n```\n\n\
             Top level only:\n\n```\n└── docs\n```\n"
        );
    }

    #[test]
    fn test_process_template_position_preservation() {
        let (_temp_dir, config) = create_test_env();
        let template = "A{{ tree @docs/guide }}B{{ tree @docs/guide }}C";
        let result = process_template(template, &config).unwrap();

        let block = "```\n`-- setup.md\n```";
        assert_eq!(result, format!("A\n{block}\nB\n{block}\nC"));
    }

    #[test]
    fn test_inline_directive_gets_own_lines() {
        let (_temp_dir, config) = create_test_env();
        let result = process_template("See: {{ tree @docs/guide }} done", &config).unwrap();
        assert_eq!(result, "See: \n```\n`-- setup.md\n```\n done");
        assert_eq!(result.lines().filter(|line| *line == "```").count(), 2);

        // already on its own line: nothing added
        let result = process_template("Intro\r\n{{ tree @docs/guide }}\r\nEnd", &config).unwrap();
        assert_eq!(result, "Intro\r\n```\n`-- setup.md\n```\r\nEnd");
    }

    #[test]
    fn test_process_template_empty() {
        let (_, config) = create_test_env();
        assert_eq!(process_template("", &config).unwrap(), "");
        assert_eq!(process_template("No directives", &config).unwrap(), "No directives");
    }

    #[test]
    fn test_process_template_all_or_nothing() {
        let (_temp_dir, config) = create_test_env();
        let template = "{{ tree @docs }}\n{{ tree @missing }}";
        let err = process_template(template, &config).unwrap_err();
        assert!(matches!(err, TreefenceError::NotFound { .. }));
    }

    #[test]
    fn test_process_directive_traversal() {
        let (temp_dir, _) = create_test_env();
        let config = TemplateConfig {
            base_dir: temp_dir.path().join("docs"),
            ..TemplateConfig::default()
        };
        let err = process_template("{{ tree @../ }}", &config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Access);
    }

    #[test]
    fn test_process_remote_directive() {
        let (_temp_dir, mut config) = create_test_env();
        let backend = MemoryBackend::new(
            "github",
            vec![
                RemoteEntry::file("docs/index.md"),
                RemoteEntry::file("docs/api/mod.md"),
                RemoteEntry::file("src/lib.rs"),
            ],
        )
        .with_credential("token", "abc");
        config.remote = Some(Arc::new(backend));

        let output =
            process_template("{{ tree github://docs org=acme repo=site token=abc }}", &config)
                .unwrap();
        assert_eq!(output, "```\n|-- api\n|   `-- mod.md\n`-- index.md\n```");

        let err = process_template("{{ tree github://docs org=acme repo=site token=x }}", &config)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Access);

        let err = process_template("{{ tree github://docs token=abc }}", &config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Access);
    }

    #[test]
    fn test_process_remote_without_backend() {
        let (_temp_dir, config) = create_test_env();
        let err = process_template("{{ tree github://docs org=a repo=b }}", &config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Access);
        assert!(err.to_string().contains("no remote backend"));
    }

    #[test]
    fn test_process_template_file() {
        let (temp_dir, config) = create_test_env();
        let template_path = temp_dir.path().join("layout.md.in");
        fs::write(&template_path, "{{ tree @docs/guide }}").unwrap();

        let output = process_template_file(&template_path, &config).unwrap();
        assert_eq!(output, "```\n`-- setup.md\n```");

        let err = process_template_file(&temp_dir.path().join("nope.md"), &config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_config_default() {
        let config = TemplateConfig::default();
        assert_eq!(config.render.style, TreeStyle::Default);
        assert_eq!(config.render.max_depth, None);
        assert!(config.walk.use_gitignore);
        assert!(!config.walk.show_hidden);
        assert!(config.remote.is_none());
    }
}
