use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use colored::Colorize;
use serde_json::json;

use onto_dict::{resolve, Dictionary, MemoryDictionary};
use onto_engine::{
    bootstrap, reject_private_input, strip_private_output, DeleteOutcome, Engine, EngineConfig,
    EngineResult, UsageDiff,
};
use onto_store::{Database, MemoryDatabase};
use onto_types::{
    document_from_json, document_to_json, Document, Entity, EntityKind, NativeId, Value,
};

use crate::cli::*;

const DEFAULT_CONFIG: &str = "onto.toml";

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let out = Output { format: cli.format };
    match cli.command {
        Command::Init(args) => cmd_init(&cli.db, config, args, &out),
        Command::Commit(args) => cmd_commit(&Session::open(&cli.db, config)?, args, &out),
        Command::Set(args) => cmd_set(&Session::open(&cli.db, config)?, args, &out),
        Command::Unset(args) => cmd_unset(&Session::open(&cli.db, config)?, args, &out),
        Command::Delete(args) => cmd_delete(&Session::open(&cli.db, config)?, args, &out),
        Command::Show(args) => cmd_show(&Session::open(&cli.db, config)?, args, &out),
        Command::Resolve(args) => cmd_resolve(&Session::open(&cli.db, config)?, args, &out),
        Command::Index(args) => cmd_index(&Session::open(&cli.db, config)?, args, &out),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    match path {
        Some(path) => Ok(EngineConfig::load(path)?),
        None if Path::new(DEFAULT_CONFIG).exists() => Ok(EngineConfig::load(DEFAULT_CONFIG)?),
        None => Ok(EngineConfig::default()),
    }
}

/// An opened snapshot with its dictionary and engine.
struct Session {
    db: Arc<MemoryDatabase>,
    engine: Engine,
    path: PathBuf,
}

impl Session {
    fn open(path: &Path, config: EngineConfig) -> anyhow::Result<Self> {
        if !path.exists() {
            bail!(
                "no database at {} (run `onto init` first)",
                path.display()
            );
        }
        let db = MemoryDatabase::open(path)
            .with_context(|| format!("opening {}", path.display()))?;
        Self::with_database(Arc::new(db), path, config)
    }

    fn with_database(
        db: Arc<MemoryDatabase>,
        path: &Path,
        config: EngineConfig,
    ) -> anyhow::Result<Self> {
        let shared: Arc<dyn Database> = db.clone();
        let dict =
            MemoryDictionary::with_tag_collection(shared, config.collection_for(EntityKind::Tag));
        let loaded = dict.load()?;
        tracing::debug!(tags = loaded, "loaded dictionary");
        Ok(Self {
            db,
            engine: Engine::new(Arc::new(dict), config),
            path: path.to_path_buf(),
        })
    }

    fn dictionary(&self) -> &dyn Dictionary {
        self.engine.dictionary().as_ref()
    }

    fn save(&self) -> anyhow::Result<()> {
        self.db
            .save_to(&self.path)
            .with_context(|| format!("saving {}", self.path.display()))
    }

    /// Save after an engine write, whether or not it succeeded.
    ///
    /// A failed call may already have written its primary document or
    /// committed embedded objects; the snapshot keeps those writes.
    fn persist<T>(&self, result: EngineResult<T>) -> anyhow::Result<T> {
        self.save()?;
        Ok(result?)
    }

    fn load(&self, kind: EntityKind, id: &str) -> anyhow::Result<(NativeId, Entity)> {
        let id = kind.id_type().cast(&Value::from(id))?;
        match self.engine.load(kind, &id)? {
            Some(entity) => Ok((id, entity)),
            None => bail!("{kind} {id} not found"),
        }
    }
}

struct Output {
    format: OutputFormat,
}

impl Output {
    fn json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    fn print_json(&self, value: serde_json::Value) -> anyhow::Result<()> {
        println!("{}", serde_json::to_string_pretty(&value)?);
        Ok(())
    }
}

fn parse_document(text: &str) -> anyhow::Result<Document> {
    let json: serde_json::Value = serde_json::from_str(text).context("parsing JSON document")?;
    match document_from_json(json) {
        Some(doc) => Ok(doc),
        None => bail!("expected a JSON object of offsets"),
    }
}

fn cmd_init(
    db_path: &Path,
    config: EngineConfig,
    args: InitArgs,
    out: &Output,
) -> anyhow::Result<()> {
    let db = if db_path.exists() {
        MemoryDatabase::open(db_path)?
    } else {
        MemoryDatabase::new()
    };
    bootstrap(&db, &config)?;
    db.save_to(db_path)?;

    if let Some(path) = &args.write_config {
        std::fs::write(path, config.to_toml_string()?)
            .with_context(|| format!("writing {}", path.display()))?;
    }

    if out.json() {
        return out.print_json(json!({
            "database": db_path.display().to_string(),
            "collections": db.collection_names()?,
        }));
    }
    println!(
        "{} Initialized database in {}",
        "✓".green().bold(),
        db_path.display().to_string().bold()
    );
    for kind in EntityKind::ALL {
        println!("  {:<7} {}", kind.to_string(), config.collection_for(kind).cyan());
    }
    Ok(())
}

fn cmd_commit(session: &Session, args: CommitArgs, out: &Output) -> anyhow::Result<()> {
    let text = match (&args.document, &args.file) {
        (_, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?,
        (Some(text), None) => text.clone(),
        (None, None) => bail!("a JSON document or --file is required"),
    };
    let doc = parse_document(&text)?;
    reject_private_input(session.dictionary(), &doc)?;

    let mut entity = Entity::from_document(args.kind, doc);
    let id = session.persist(session.engine.commit(&mut entity))?;

    if out.json() {
        return out.print_json(json!({"kind": args.kind.name(), "id": id.to_value().to_json()}));
    }
    println!(
        "{} Committed {} {}",
        "✓".green().bold(),
        args.kind,
        id.to_string().yellow()
    );
    Ok(())
}

fn cmd_set(session: &Session, args: SetArgs, out: &Output) -> anyhow::Result<()> {
    let (id, mut entity) = session.load(args.kind, &args.id)?;
    let offsets = parse_document(&args.document)?;
    let diff = session.persist(session.engine.modify_add(&mut entity, offsets))?;
    report_update(args.kind, &id, &diff, out)
}

fn cmd_unset(session: &Session, args: UnsetArgs, out: &Output) -> anyhow::Result<()> {
    let (id, mut entity) = session.load(args.kind, &args.id)?;
    let diff = session.persist(session.engine.modify_del(&mut entity, &args.tags))?;
    report_update(args.kind, &id, &diff, out)
}

fn report_update(
    kind: EntityKind,
    id: &NativeId,
    diff: &UsageDiff,
    out: &Output,
) -> anyhow::Result<()> {
    if out.json() {
        return out.print_json(json!({
            "kind": kind.name(),
            "id": id.to_value().to_json(),
            "added": diff.added_tags.keys().collect::<Vec<_>>(),
            "removed": diff.removed_tags,
        }));
    }
    println!("{} Updated {} {}", "✓".green().bold(), kind, id.to_string().yellow());
    for tag in diff.added_tags.keys() {
        println!("  {} {}", "+".green(), tag);
    }
    for tag in &diff.removed_tags {
        println!("  {} {}", "-".red(), tag);
    }
    Ok(())
}

fn cmd_delete(session: &Session, args: EntityArgs, out: &Output) -> anyhow::Result<()> {
    let (_, mut entity) = session.load(args.kind, &args.id)?;
    match session.persist(session.engine.delete(&mut entity))? {
        DeleteOutcome::Deleted(id) => {
            if out.json() {
                return out.print_json(
                    json!({"kind": args.kind.name(), "deleted": id.to_value().to_json()}),
                );
            }
            println!(
                "{} Deleted {} {}",
                "✓".green().bold(),
                args.kind,
                id.to_string().yellow()
            );
            Ok(())
        }
        DeleteOutcome::NothingToDelete => {
            println!("Nothing to delete.");
            Ok(())
        }
        DeleteOutcome::Refused(reason) => bail!("delete refused: {reason}"),
    }
}

fn cmd_show(session: &Session, args: EntityArgs, out: &Output) -> anyhow::Result<()> {
    let (id, entity) = session.load(args.kind, &args.id)?;
    let visible = strip_private_output(session.dictionary(), entity.offsets())?;
    let doc = document_to_json(&visible);
    if out.json() {
        return out.print_json(doc);
    }
    println!("{} {}", args.kind.to_string().bold(), id.to_string().yellow());
    if let serde_json::Value::Object(map) = doc {
        for (tag, value) in map {
            println!("  {}: {}", tag.cyan(), value);
        }
    }
    Ok(())
}

fn cmd_resolve(session: &Session, args: ResolveArgs, out: &Output) -> anyhow::Result<()> {
    let descriptor = resolve(session.dictionary(), &args.tag)?;
    let types: Vec<&str> = descriptor.types.iter().map(|t| t.code()).collect();
    let kinds: Vec<&str> = descriptor.kinds.iter().map(|k| k.code()).collect();
    if out.json() {
        return out.print_json(json!({"tag": args.tag, "types": types, "kinds": kinds}));
    }
    println!("{}", args.tag.bold());
    println!("  types: {}", types.join(", ").cyan());
    if !kinds.is_empty() {
        println!("  kinds: {}", kinds.join(", ").cyan());
    }
    Ok(())
}

fn cmd_index(session: &Session, args: IndexArgs, out: &Output) -> anyhow::Result<()> {
    let names: Vec<String> = match &args.tag {
        Some(tag) => session
            .engine
            .index_tag_offsets(args.kind, tag)?
            .into_iter()
            .map(|spec| spec.name)
            .collect(),
        None => {
            session.engine.rebuild_indexes(args.kind)?;
            session
                .engine
                .collection(args.kind)?
                .indexes()?
                .into_iter()
                .map(|spec| spec.name)
                .collect()
        }
    };
    session.save()?;

    if out.json() {
        return out.print_json(json!({"kind": args.kind.name(), "indexes": names}));
    }
    println!(
        "{} {} index(es) on {}",
        "✓".green().bold(),
        names.len(),
        session.engine.config().collection_for(args.kind).cyan()
    );
    for name in &names {
        println!("  {}", name);
    }
    Ok(())
}
