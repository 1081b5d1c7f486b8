use clap::{Parser, ValueEnum};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Serialize;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use treefence::{
    DirectiveTarget, LocalDir, RenderConfig, Result, SortOrder, Source, TemplateConfig,
    TreeNode, TreeProvider, TreeRenderer, TreeStyle, WalkOptions, find_directives,
    process_template,
};

const LONG_HELP: &str = r#"
Directives:
  {{ tree @docs/ }}                              - Tree of a directory under the base dir
  {{ tree @. style=ascii maximum_depth=2 }}      - Override style and depth
  {{ tree @src/ sort=dirs-first }}               - Group directories before files
  {{ tree github://docs org=acme repo=site }}    - Remote tree (needs a backend)

Styles:
  default, ansi   ├── └── │
  ascii           |-- `-- |
  rounded         ├── ╰── │
  spaces          indentation only

Examples:
  # Render a directory
  treefence docs/
  # Limit depth and pick a style
  treefence docs/ -d 2 --style rounded
  # Render a pre-built tree
  treefence --tree-json tree.json
  # Expand directives in a template
  treefence --template layout.md.in -o layout.md
  # Process from stdin
  echo "{{ tree @. }}" | treefence --template -
  # List directives in a template as JSON
  treefence --template layout.md.in --list=json
"#;

/// Directory trees as fenced text blocks for documentation.
#[derive(Parser, Debug)]
#[command(
    name = "treefence",
    version,
    about = "Directory trees as fenced text blocks for documentation.",
    after_long_help = LONG_HELP
)]
struct Cli {
    /// Directories to render
    #[arg(value_name = "INPUTS", required_unless_present_any = ["template", "tree_json"])]
    inputs: Vec<PathBuf>,

    /// Template file whose directives are expanded. Use '-' for stdin.
    #[arg(long, short, value_name = "TEMPLATE", conflicts_with_all = ["inputs", "tree_json"])]
    template: Option<PathBuf>,

    /// Pre-built tree in JSON form. Use '-' for stdin.
    #[arg(long, value_name = "FILE", conflicts_with = "inputs")]
    tree_json: Option<PathBuf>,

    /// Base directory for relative inputs and @ targets
    #[arg(short, long, value_name = "DIR", env = "TREEFENCE_BASE_DIR")]
    base_dir: Option<PathBuf>,

    /// Output file (defaults to stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Glyph style
    #[arg(short, long, value_enum, default_value = "default")]
    style: TreeStyle,

    /// Maximum depth shown (unlimited when omitted)
    #[arg(short = 'd', long, value_name = "DEPTH")]
    max_depth: Option<usize>,

    /// Ordering of entries within a directory
    #[arg(long, value_enum, default_value = "name")]
    sort: SortOrder,

    /// Include hidden entries
    #[arg(long)]
    hidden: bool,

    /// Exclude glob patterns (repeatable). Patterns are relative to each rendered root
    #[arg(short = 'x', long = "exclude", value_name = "GLOB", action = clap::ArgAction::Append)]
    exclude: Vec<String>,

    /// Disable compliance with .gitignore files
    #[arg(long)]
    no_gitignore: bool,

    /// List directives in the template (optionally with format: plain, json)
    #[arg(long, value_name = "FORMAT", num_args = 0..=1, default_missing_value = "plain", requires = "template")]
    list: Option<ListFormat>,

    /// Output format for rendered trees
    #[arg(short = 'f', long, value_enum, default_value = "fenced")]
    format: OutputFormat,

    /// Increase verbosity (can be used multiple times)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
enum OutputFormat {
    /// Tree wrapped in fence lines
    Fenced,
    /// Tree lines only
    Plain,
    /// HTML preformatted block
    Html,
    /// Tree structure as JSON
    Json,
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
enum ListFormat {
    /// One directive per line
    Plain,
    /// JSON output for scripting
    Json,
}

#[derive(Serialize)]
struct DirectiveInfo {
    directive: String,
    kind: &'static str,
    target: String,
    start: usize,
    end: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    options: Vec<(String, String)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exists: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let walk = match walk_options(&cli) {
        Ok(walk) => walk,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(2);
        }
    };

    let result = if let Some(list_format) = cli.list {
        list_directives(&cli, list_format)
    } else if cli.template.is_some() {
        expand_template(&cli, walk)
    } else {
        render_trees(&cli, walk)
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn walk_options(cli: &Cli) -> Result<WalkOptions> {
    Ok(WalkOptions {
        show_hidden: cli.hidden,
        use_gitignore: !cli.no_gitignore,
        exclude: exclude_set(&cli.exclude)?,
    })
}

fn exclude_set(patterns: &[String]) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(Some(builder.build()?))
}

fn base_dir(cli: &Cli) -> PathBuf {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    match &cli.base_dir {
        Some(dir) => dir.canonicalize().unwrap_or_else(|_| cwd.join(dir)),
        None => cwd,
    }
}

fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        info!("Reading from stdin...");
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        info!("Reading {}", path.display());
        treefence::fs_utils::read_template(path)
    }
}

fn render_config(cli: &Cli) -> RenderConfig {
    RenderConfig {
        style: cli.style,
        max_depth: cli.max_depth,
        sort: cli.sort,
    }
}

fn render_trees(cli: &Cli, walk: WalkOptions) -> Result<()> {
    let sources: Vec<Source<'static>> = if let Some(path) = &cli.tree_json {
        let tree: TreeNode = serde_json::from_str(&read_input(path)?)?;
        vec![Source::Tree(tree)]
    } else {
        let base = base_dir(cli);
        cli.inputs
            .iter()
            .map(|input| Source::Local(LocalDir::new(base.join(input)).with_options(walk.clone())))
            .collect()
    };

    let config = render_config(cli);
    let renderer = TreeRenderer::new(config);
    let mut blocks = Vec::with_capacity(sources.len());
    for source in &sources {
        let block = match cli.format {
            OutputFormat::Json => {
                let tree = source.tree(config.max_depth, config.sort)?;
                serde_json::to_string_pretty(&tree)?
            }
            OutputFormat::Fenced => renderer.render(source)?.to_string(),
            OutputFormat::Plain => renderer.render(source)?.body(),
            OutputFormat::Html => format_as_html(&renderer.render(source)?.body()),
        };
        blocks.push(block);
    }

    let mut rendered = blocks.join("\n\n");
    rendered.push('\n');
    write_output(cli.output.as_deref(), &rendered)
}

fn expand_template(cli: &Cli, walk: WalkOptions) -> Result<()> {
    let Some(template_path) = &cli.template else {
        return Ok(());
    };
    let template = read_input(template_path)?;
    let config = TemplateConfig {
        base_dir: base_dir(cli),
        render: render_config(cli),
        walk,
        remote: None,
    };

    debug!("Processing directives...");
    let processed = process_template(&template, &config)?;
    write_output(cli.output.as_deref(), &processed)
}

fn write_output(output: Option<&Path>, content: &str) -> Result<()> {
    if let Some(output_path) = output {
        info!("Writing output to {}", output_path.display());
        std::fs::write(output_path, content)?;
    } else {
        print!("{content}");
        io::stdout().flush()?;
    }
    info!("Processing complete!");
    Ok(())
}

fn list_directives(cli: &Cli, format: ListFormat) -> Result<()> {
    let Some(template_path) = &cli.template else {
        return Ok(());
    };
    debug!("Listing template directives...");
    let template = read_input(template_path)?;
    let directives = find_directives(&template)?;
    let base = base_dir(cli);

    match format {
        ListFormat::Plain => {
            for directive in &directives {
                println!("{}", directive.full_match);
            }
        }
        ListFormat::Json => {
            let infos: Vec<DirectiveInfo> = directives
                .iter()
                .map(|directive| {
                    let mut info = DirectiveInfo {
                        directive: directive.full_match.clone(),
                        kind: "local",
                        target: String::new(),
                        start: directive.start,
                        end: directive.end,
                        options: directive.args.clone(),
                        exists: None,
                        error: None,
                    };
                    match &directive.target {
                        DirectiveTarget::Local(target) => {
                            match treefence::fs_utils::resolve_local_path(target, &base) {
                                Ok(path) => {
                                    info.exists = Some(path.is_dir());
                                    info.target = path.display().to_string();
                                }
                                Err(e) => {
                                    info.target.clone_from(target);
                                    info.error = Some(e.to_string());
                                }
                            }
                        }
                        DirectiveTarget::Remote(location) => {
                            info.kind = "remote";
                            info.target = location.to_string();
                        }
                    }
                    info
                })
                .collect();

            let json = serde_json::to_string_pretty(&infos)?;
            println!("{json}");
        }
    }

    Ok(())
}

fn format_as_html(content: &str) -> String {
    let escaped = content
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;");
    format!("<pre><code>{escaped}</code></pre>")
}
