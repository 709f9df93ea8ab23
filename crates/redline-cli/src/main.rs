use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use redline_config::Config;
use redline_engine::changes::{accept_all, accept_group, reject_all, reject_group, toggle_group_visibility};
use redline_engine::invariants::check_tree;
use redline_engine::outline::{Outline, render};
use redline_engine::{
    BatchRequest, ChangeSource, ChangeType, Document, DocumentStore, EditOperation, Engine, MemoryStore,
    ProjectionOptions, project,
};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "redline")]
#[command(about = "Text-anchored edits with tracked changes for rich-text documents", long_about = None)]
struct Args {
    /// Config file (default: ~/.config/redline/config.toml)
    #[arg(short = 'c', long = "config", value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Log more; repeat for debug output
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply a JSON list of edit operations as one tracked change group
    Apply {
        /// Document file, or an id under the configured documents path
        document: String,
        /// JSON file holding the operations
        operations: PathBuf,
        /// Label for the change group
        #[arg(short = 'l', long = "label")]
        label: Option<String>,
        #[arg(short = 's', long = "source", value_enum, default_value = "tool")]
        source: SourceArg,
        /// Write the result here instead of over the document
        #[arg(short = 'o', long = "output", value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Print the document outline with change markers
    Show {
        document: String,
        /// Print the outline as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the plain text operations are matched against
    Project {
        document: String,
        /// Concatenate blocks without separators
        #[arg(long)]
        raw: bool,
        /// Print the offset-to-position ranges as JSON
        #[arg(long)]
        ranges: bool,
    },
    /// List change groups and their annotations
    Groups { document: String },
    /// Accept, reject or hide tracked changes
    Review {
        document: String,
        #[command(subcommand)]
        action: ReviewAction,
        #[arg(short = 'o', long = "output", value_name = "FILE", global = true)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum ReviewAction {
    /// Accept every change
    AcceptAll,
    /// Reject every change
    RejectAll,
    /// Accept one change group
    Accept { id: String },
    /// Reject one change group
    Reject { id: String },
    /// Show or hide one change group
    Toggle { id: String },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SourceArg {
    Tool,
    User,
}

impl From<SourceArg> for ChangeSource {
    fn from(source: SourceArg) -> Self {
        match source {
            SourceArg::Tool => ChangeSource::Tool,
            SourceArg::User => ChangeSource::User,
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load_from_path(path)?
            .with_context(|| format!("config file {} not found", path.display()))?,
        None => Config::load_or_default()?,
    };
    Ok(config)
}

fn read_document(path: &Path) -> Result<Document> {
    let json = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    Document::from_json(&json).with_context(|| format!("parsing {}", path.display()))
}

fn write_document(path: &Path, doc: &Document) -> Result<()> {
    if let Err(violation) = check_tree(&doc.content) {
        bail!("refusing to write {}: {violation}", path.display());
    }
    std::fs::write(path, doc.to_json_pretty()?).with_context(|| format!("writing {}", path.display()))?;
    log::info!("wrote {}", path.display());
    Ok(())
}

fn apply(
    config: &Config,
    path: &Path,
    operations: &Path,
    label: Option<String>,
    source: ChangeSource,
    output: Option<&Path>,
) -> Result<()> {
    let doc = read_document(path)?;
    let ops_json =
        std::fs::read_to_string(operations).with_context(|| format!("reading {}", operations.display()))?;
    let operations = EditOperation::list_from_json(&ops_json)
        .with_context(|| format!("parsing operations in {}", operations.display()))?;

    let id = path.to_string_lossy().to_string();
    let store = MemoryStore::new().with_max_attempts(config.store.max_attempts);
    store.insert(id.clone(), doc);

    let engine = Engine::new(config.engine_config()).with_schema(config.vocabulary.schema());
    let request = BatchRequest {
        document_id: id.clone(),
        operations,
        label,
        source,
    };
    let report = engine.run(&store, &request)?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if report.applied > 0 {
        if report.change_id.is_none() {
            log::warn!("no change group recorded, writing the edited document unannotated");
        }
        let stored = store.snapshot(&id)?;
        write_document(output.unwrap_or(path), &stored.document)?;
    }
    if !report.success {
        bail!("{}", report.message);
    }
    Ok(())
}

fn show(path: &Path, json: bool) -> Result<()> {
    let doc = read_document(path)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&Outline::of(&doc))?);
    } else {
        print!("{}", render(&doc));
    }
    Ok(())
}

fn print_projection(config: &Config, path: &Path, raw: bool, ranges: bool) -> Result<()> {
    let doc = read_document(path)?;
    let options = if raw {
        ProjectionOptions::raw()
    } else {
        config.matcher.projection.clone()
    };
    let projection = project(&doc.content, &options);
    if ranges {
        println!("{}", serde_json::to_string_pretty(&projection)?);
    } else {
        println!("{}", projection.text);
    }
    Ok(())
}

fn groups(path: &Path) -> Result<()> {
    let doc = read_document(path)?;
    if doc.change_groups.is_empty() {
        println!("no change groups");
        return Ok(());
    }
    for group in &doc.change_groups {
        let source = match group.source {
            ChangeSource::Tool => "tool",
            ChangeSource::User => "user",
        };
        let hidden = if group.visible { "" } else { ", hidden" };
        println!(
            "{} {:?} ({source}{hidden}, {})",
            group.id,
            group.label,
            group.created_at.format("%Y-%m-%d %H:%M")
        );
        for patch in &group.patches {
            let sign = match patch.change_type {
                ChangeType::Added => '+',
                ChangeType::Deleted => '-',
            };
            println!(
                "  {sign} {}..{} {}: {:?}",
                patch.from,
                patch.to,
                patch.semantic_type.name(),
                patch.text
            );
        }
    }
    Ok(())
}

fn review(path: &Path, action: &ReviewAction, output: Option<&Path>) -> Result<()> {
    let doc = read_document(path)?;
    let reviewed = match action {
        ReviewAction::AcceptAll => accept_all(&doc),
        ReviewAction::RejectAll => reject_all(&doc),
        ReviewAction::Accept { id } => accept_group(&doc, id)?,
        ReviewAction::Reject { id } => reject_group(&doc, id)?,
        ReviewAction::Toggle { id } => toggle_group_visibility(&doc, id)?,
    };
    write_document(output.unwrap_or(path), &reviewed)?;
    print!("{}", render(&reviewed));
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    };
    env_logger::Builder::from_default_env().filter_level(level).init();

    let config = load_config(args.config.as_deref())?;
    log::debug!("using config {config:?}");

    match &args.command {
        Commands::Apply {
            document,
            operations,
            label,
            source,
            output,
        } => apply(
            &config,
            &config.document_path(document),
            operations,
            label.clone(),
            (*source).into(),
            output.as_deref(),
        ),
        Commands::Show { document, json } => show(&config.document_path(document), *json),
        Commands::Project { document, raw, ranges } => {
            print_projection(&config, &config.document_path(document), *raw, *ranges)
        }
        Commands::Groups { document } => groups(&config.document_path(document)),
        Commands::Review {
            document,
            action,
            output,
        } => review(&config.document_path(document), action, output.as_deref()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn setup(paragraph: &str, operations: &str) -> (TempDir, PathBuf, PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let document = temp_dir.path().join("brief.json");
        let ops = temp_dir.path().join("ops.json");
        std::fs::write(&document, Document::from_paragraphs(&[paragraph]).to_json_pretty().unwrap()).unwrap();
        std::fs::write(&ops, operations).unwrap();
        (temp_dir, document, ops)
    }

    #[test]
    fn apply_writes_whitespace_only_edits() {
        let (_temp_dir, document, ops) = setup(
            "Hello  world",
            r#"[{ "type": "replace", "findText": "Hello  world", "replaceText": "Hello world" }]"#,
        );

        apply(&Config::default(), &document, &ops, None, ChangeSource::Tool, None).unwrap();

        let written = read_document(&document).unwrap();
        assert_eq!(written.block_texts(), vec!["Hello world"]);
        assert_eq!(written.change_groups.len(), 1);
        assert_eq!(reject_all(&written), Document::from_paragraphs(&["Hello  world"]));
    }

    #[test]
    fn apply_leaves_the_document_alone_when_nothing_applies() {
        let (_temp_dir, document, ops) = setup(
            "Hello world",
            r#"[{ "type": "delete", "findText": "Goodbye" }]"#,
        );

        let result = apply(&Config::default(), &document, &ops, None, ChangeSource::Tool, None);

        assert!(result.is_err());
        assert_eq!(read_document(&document).unwrap(), Document::from_paragraphs(&["Hello world"]));
    }
}
