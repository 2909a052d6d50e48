//! snipsync CLI: browse, edit and sync code snippets

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use snipsync_core::diagnostics::Severity;
use snipsync_core::remote::extract_gist_id;
use snipsync_core::{
    discover, edit, ledger, reader, transfer, CollectingSink, Config, GistClient, LocateContext,
    Snippet, SnippetFile, SyncEngine, SyncReport,
};
use syntect::easy::HighlightLines;
use syntect::highlighting::ThemeSet;
use syntect::parsing::SyntaxSet;
use syntect::util::{as_24_bit_terminal_escaped, LinesWithEndings};

#[derive(Parser)]
#[command(name = "snipsync")]
#[command(about = "Browse, edit and sync code snippets", long_about = None)]
#[command(version)]
struct Cli {
    /// Global snippets directory (default: the editor's user snippets folder)
    #[arg(long, global = true, env = "SNIPSYNC_SNIPPETS_DIR")]
    snippets_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the snippet files that apply to a language and workspace
    Locate {
        /// Active language id
        #[arg(short, long)]
        language: Option<String>,

        /// Open workspace folders
        #[arg(short, long = "workspace")]
        workspaces: Vec<PathBuf>,
    },

    /// Print the snippets of a file
    Show {
        /// Snippet file, relative to the snippets directory or a path
        file: PathBuf,
    },

    /// Create an empty snippet file
    New { file: PathBuf },

    /// Add or replace a snippet
    Add {
        file: PathBuf,
        title: String,

        #[arg(short, long)]
        prefix: String,

        /// Body text; newlines are kept
        #[arg(short, long)]
        body: String,

        #[arg(short, long)]
        description: Option<String>,

        /// Scope for snippets added to a bundle
        #[arg(short, long)]
        language: Option<String>,
    },

    /// Remove a snippet
    Remove { file: PathBuf, title: String },

    /// Enable a disabled snippet file
    Enable { file: PathBuf },

    /// Disable a snippet file
    Disable { file: PathBuf },

    /// Sync the snippets directory with its remote collection
    Sync,

    /// Merge a remote collection into the snippets directory without pushing
    Merge {
        /// Collection URL or id (default: the synced collection)
        collection: Option<String>,
    },

    /// Publish snippet files as a new bundle collection
    Export {
        /// Bundle name
        name: String,

        files: Vec<PathBuf>,

        #[arg(short, long)]
        description: Option<String>,

        #[arg(long)]
        public: bool,
    },

    /// Save the snippet files of a collection
    Import {
        /// Collection URL or id
        collection: String,

        /// Target directory (default: the snippets directory)
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Only import .code-snippets bundles
        #[arg(long)]
        only_snippets: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();
    let sink = Arc::new(CollectingSink::new());
    let home = dirs::home_dir().context("Could not determine the home directory")?;

    let result = match cli.command {
        Commands::Locate {
            language,
            workspaces,
        } => cmd_locate(&home, cli.snippets_dir, language, workspaces),
        Commands::Show { file } => {
            let root = snippets_root(&home, cli.snippets_dir)?;
            cmd_show(&resolve_file(&root, &file)).await
        }
        Commands::New { file } => {
            let root = snippets_root(&home, cli.snippets_dir)?;
            let path = edit::create_file(&resolve_file(&root, &file)).await?;
            println!("✓ {}", path.display());
            Ok(())
        }
        Commands::Add {
            file,
            title,
            prefix,
            body,
            description,
            language,
        } => {
            let root = snippets_root(&home, cli.snippets_dir)?;
            let mut snippet = Snippet::new(prefix.as_str(), body.as_str());
            snippet.description = description;
            let path = edit::write_snippet(
                &resolve_file(&root, &file),
                &title,
                snippet,
                language.as_deref(),
            )
            .await?;
            println!("✓ Saved '{}' to {}", title, path.display());
            Ok(())
        }
        Commands::Remove { file, title } => {
            let root = snippets_root(&home, cli.snippets_dir)?;
            if edit::delete_snippet(&resolve_file(&root, &file), &title).await? {
                println!("✓ Removed '{}'", title);
            } else {
                println!("No snippet named '{}'", title);
            }
            Ok(())
        }
        Commands::Enable { file } => {
            let root = snippets_root(&home, cli.snippets_dir)?;
            let current = ledger::resolve_save_target(&resolve_file(&root, &file)).await;
            let path = ledger::enable(&current).await?;
            println!("✓ Enabled {}", path.display());
            Ok(())
        }
        Commands::Disable { file } => {
            let root = snippets_root(&home, cli.snippets_dir)?;
            let current = ledger::resolve_save_target(&resolve_file(&root, &file)).await;
            let path = ledger::disable(&current).await?;
            println!("✓ Disabled {}", path.display());
            Ok(())
        }
        Commands::Sync => {
            let root = snippets_root(&home, cli.snippets_dir)?;
            cmd_sync(root, None, false, &sink).await
        }
        Commands::Merge { collection } => {
            let root = snippets_root(&home, cli.snippets_dir)?;
            let id = collection.as_deref().map(extract_gist_id).transpose()?;
            cmd_sync(root, id, true, &sink).await
        }
        Commands::Export {
            name,
            files,
            description,
            public,
        } => {
            let root = snippets_root(&home, cli.snippets_dir)?;
            cmd_export(&root, &name, &files, description, public, &sink).await
        }
        Commands::Import {
            collection,
            dir,
            only_snippets,
        } => {
            let root = snippets_root(&home, cli.snippets_dir)?;
            cmd_import(&root, &collection, dir, only_snippets, &sink).await
        }
    };

    print_diagnostics(&sink);
    result
}

fn snippets_root(home: &Path, snippets_dir: Option<PathBuf>) -> Result<PathBuf> {
    snippets_dir
        .or_else(|| discover::global_snippets_dir(home))
        .context("No snippets directory for this platform. Pass --snippets-dir.")
}

/// Paths that exist as given win over names inside the snippets directory.
fn resolve_file(root: &Path, file: &Path) -> PathBuf {
    if file.is_absolute() || file.exists() {
        file.to_path_buf()
    } else {
        root.join(file)
    }
}

fn spinner(message: &'static str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb.set_message(message);
    Ok(pb)
}

fn cmd_locate(
    home: &Path,
    snippets_dir: Option<PathBuf>,
    language: Option<String>,
    workspaces: Vec<PathBuf>,
) -> Result<()> {
    let mut ctx = LocateContext::new(home);
    ctx.global_dir = snippets_dir;
    ctx.language = language;
    ctx.workspace_folders = workspaces;
    if ctx.extensions_dir.is_none() {
        if let Some(root) = ctx.global_dir() {
            ctx.extensions_dir = Config::load(&root)?.extensions_dir;
        }
    }

    let found = snipsync_core::locate(&ctx);
    if found.is_empty() {
        println!("No snippet files found.");
        return Ok(());
    }

    for located in found {
        let state = if located.file.enabled {
            ""
        } else {
            " \x1b[2m(disabled)\x1b[0m"
        };
        println!(
            "\x1b[1;36m{:<18}\x1b[0m {}{}",
            format!("{:?}", located.kind),
            located.path().display(),
            state
        );
    }

    Ok(())
}

async fn cmd_show(path: &Path) -> Result<()> {
    let path = ledger::resolve_save_target(path).await;
    let snippets = reader::read_file(&path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let file = SnippetFile::from_disk_path(&path);
    let file_language = (!file.is_bundle())
        .then(|| file.logical_path.file_stem())
        .flatten()
        .and_then(|s| s.to_str())
        .map(str::to_string);

    let highlighter = SyntaxHighlighter::new();
    for (title, snippet) in &snippets {
        println!(
            "\x1b[1;36m{}\x1b[0m  \x1b[33m{}\x1b[0m",
            title,
            snippet.prefix.values().join(", ")
        );
        if let Some(description) = &snippet.description {
            println!("\x1b[2m{}\x1b[0m", description);
        }
        let language = snippet
            .scopes()
            .first()
            .map(|s| s.to_string())
            .or_else(|| file_language.clone());
        println!(
            "{}",
            highlighter.highlight(&snippet.body_text(), language.as_deref())
        );
        println!();
    }

    Ok(())
}

async fn cmd_sync(
    root: PathBuf,
    collection: Option<String>,
    merge_only: bool,
    sink: &Arc<CollectingSink>,
) -> Result<()> {
    let engine = SyncEngine::from_config(root)?.with_sink(sink.clone());

    let pb = spinner(if merge_only { "Merging..." } else { "Syncing..." })?;
    let report = if merge_only {
        engine.merge(collection.as_deref()).await
    } else {
        engine.sync().await
    };
    pb.finish_and_clear();

    let report = report.with_context(|| format!("Sync of {} failed", engine.root().display()))?;
    print_report(&report);
    Ok(())
}

async fn cmd_export(
    root: &Path,
    name: &str,
    files: &[PathBuf],
    description: Option<String>,
    public: bool,
    sink: &CollectingSink,
) -> Result<()> {
    let config = Config::load(root)?;
    let store = GistClient::from_config(&config)?;
    let paths: Vec<PathBuf> = files.iter().map(|f| resolve_file(root, f)).collect();
    let description = description.unwrap_or_else(|| name.to_string());

    let pb = spinner("Exporting...")?;
    let url = transfer::export(
        &store,
        name,
        &description,
        public || config.public,
        &paths,
        sink,
    )
    .await;
    pb.finish_and_clear();

    println!("✓ Exported to {}", url?);
    Ok(())
}

async fn cmd_import(
    root: &Path,
    collection: &str,
    dir: Option<PathBuf>,
    only_snippets: bool,
    sink: &CollectingSink,
) -> Result<()> {
    let config = Config::load(root)?;
    let store = GistClient::from_config(&config)?;
    let id = extract_gist_id(collection)?;
    let dir = dir.unwrap_or_else(|| root.to_path_buf());

    let pb = spinner("Importing...")?;
    let saved = transfer::import(
        &store,
        &id,
        &dir,
        only_snippets || config.only_snippets,
        sink,
    )
    .await;
    pb.finish_and_clear();

    println!("✓ Imported {} files into {}", saved?, dir.display());
    Ok(())
}

fn print_report(report: &SyncReport) {
    if report.created {
        println!("✓ Created collection {}", report.collection_id);
    } else {
        println!("✓ Synced with collection {}", report.collection_id);
    }
    if let Some(url) = &report.html_url {
        println!("  {}", url);
    }
    println!("  Pushed:    {}", report.pushed.len());
    println!("  Pulled:    {}", report.pulled.len());
    println!("  Merged:    {}", report.merged.len());
    println!("  Unchanged: {}", report.unchanged);
    if !report.skipped.is_empty() {
        println!("  Skipped:   {}", report.skipped.join(", "));
    }
    for conflict in &report.conflicts {
        println!("  \x1b[33mconflict\x1b[0m {}: {}", conflict.file, conflict.conflict);
    }
}

fn print_diagnostics(sink: &CollectingSink) {
    let diagnostics = sink.drain();
    if diagnostics.is_empty() {
        return;
    }

    eprintln!();
    for diagnostic in &diagnostics {
        let color = match diagnostic.severity {
            Severity::Error => "\x1b[31m",
            Severity::Warning => "\x1b[33m",
        };
        eprintln!("{}{}\x1b[0m", color, diagnostic);
    }
    eprintln!("{} problem(s) reported", diagnostics.len());
}

/// Wrapper around syntect for syntax highlighting.
struct SyntaxHighlighter {
    syntax_set: SyntaxSet,
    theme_set: ThemeSet,
}

impl SyntaxHighlighter {
    fn new() -> Self {
        Self {
            syntax_set: SyntaxSet::load_defaults_newlines(),
            theme_set: ThemeSet::load_defaults(),
        }
    }

    /// Highlight `code` for a language id such as `rust` or `python`.
    fn highlight(&self, code: &str, language: Option<&str>) -> String {
        let syntax = language
            .and_then(|l| self.syntax_set.find_syntax_by_token(l))
            .unwrap_or_else(|| self.syntax_set.find_syntax_plain_text());

        let theme = &self.theme_set.themes["base16-ocean.dark"];
        let mut highlighter = HighlightLines::new(syntax, theme);

        let mut output = String::new();
        for line in LinesWithEndings::from(code) {
            match highlighter.highlight_line(line, &self.syntax_set) {
                Ok(ranges) => {
                    output.push_str(&as_24_bit_terminal_escaped(&ranges[..], false));
                }
                Err(_) => {
                    output.push_str(line);
                }
            }
        }
        output.push_str("\x1b[0m");

        output
    }
}
