use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use onto_types::EntityKind;

#[derive(Parser)]
#[command(
    name = "onto",
    about = "onto — schema-flexible persistence over a document store",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Database snapshot file
    #[arg(long, global = true, default_value = "onto.json")]
    pub db: PathBuf,

    /// Engine configuration (TOML); `onto.toml` is used when present
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create the database and its collections
    Init(InitArgs),
    /// Commit a new entity from a JSON document
    Commit(CommitArgs),
    /// Set offsets on a committed entity
    Set(SetArgs),
    /// Remove offsets from a committed entity
    Unset(UnsetArgs),
    /// Delete a committed entity
    Delete(EntityArgs),
    /// Show a stored entity
    Show(EntityArgs),
    /// Show the descriptor a tag resolves to
    Resolve(ResolveArgs),
    /// Create sparse indexes over registered tag paths
    Index(IndexArgs),
}

#[derive(Args)]
pub struct InitArgs {
    /// Write the default configuration to this file
    #[arg(long)]
    pub write_config: Option<PathBuf>,
}

#[derive(Args)]
pub struct CommitArgs {
    pub kind: EntityKind,
    /// JSON object of offsets
    pub document: Option<String>,
    /// Read the JSON object from a file instead
    #[arg(short, long, conflicts_with = "document")]
    pub file: Option<PathBuf>,
}

#[derive(Args)]
pub struct SetArgs {
    pub kind: EntityKind,
    pub id: String,
    /// JSON object of offsets
    pub document: String,
}

#[derive(Args)]
pub struct UnsetArgs {
    pub kind: EntityKind,
    pub id: String,
    #[arg(required = true)]
    pub tags: Vec<String>,
}

#[derive(Args)]
pub struct EntityArgs {
    pub kind: EntityKind,
    pub id: String,
}

#[derive(Args)]
pub struct ResolveArgs {
    pub tag: String,
}

#[derive(Args)]
pub struct IndexArgs {
    pub kind: EntityKind,
    /// Index one tag's paths instead of rebuilding every index
    #[arg(long)]
    pub tag: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_init() {
        let cli = Cli::try_parse_from(["onto", "init"]).unwrap();
        assert!(matches!(cli.command, Command::Init(_)));
        assert_eq!(cli.db, PathBuf::from("onto.json"));
    }

    #[test]
    fn parse_commit() {
        let cli = Cli::try_parse_from(["onto", "commit", "term", r#"{"lid": "x"}"#]).unwrap();
        if let Command::Commit(args) = cli.command {
            assert_eq!(args.kind, EntityKind::Term);
            assert_eq!(args.document.as_deref(), Some(r#"{"lid": "x"}"#));
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_commit_from_file() {
        let cli = Cli::try_parse_from(["onto", "commit", "unit", "-f", "u.json"]).unwrap();
        if let Command::Commit(args) = cli.command {
            assert_eq!(args.file, Some(PathBuf::from("u.json")));
            assert!(args.document.is_none());
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn unknown_kind_is_rejected() {
        assert!(Cli::try_parse_from(["onto", "show", "gadget", "1"]).is_err());
    }

    #[test]
    fn parse_unset_needs_tags() {
        assert!(Cli::try_parse_from(["onto", "unset", "unit", "u1"]).is_err());
        let cli = Cli::try_parse_from(["onto", "unset", "unit", "u1", "color", "size"]).unwrap();
        if let Command::Unset(args) = cli.command {
            assert_eq!(args.tags, vec!["color", "size"]);
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_index_tag() {
        let cli = Cli::try_parse_from(["onto", "index", "unit", "--tag", "color"]).unwrap();
        if let Command::Index(args) = cli.command {
            assert_eq!(args.kind, EntityKind::Unit);
            assert_eq!(args.tag, Some("color".into()));
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_global_options() {
        let cli = Cli::try_parse_from([
            "onto", "--db", "/tmp/x.json", "--verbose", "--format", "json", "resolve", "label",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.format, OutputFormat::Json));
        assert_eq!(cli.db, PathBuf::from("/tmp/x.json"));
    }
}
