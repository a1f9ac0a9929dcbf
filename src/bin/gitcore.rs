//! A thin plumbing CLI exposing the operations in `gitcore` directly, the
//! way `git`'s own plumbing commands (`hash-object`, `cat-file`, `rev-parse`,
//! ...) expose the object/index/ref layer beneath the porcelain.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gitcore::types::ObjectKind;
use gitcore::Repo;

/// Plumbing commands over a from-scratch git-compatible object store, index,
/// and ref layer.
#[derive(Parser)]
#[command(name = "gitcore", version, about)]
struct Cli {
    /// Path to the repository's metadata directory (defaults to `.git` under
    /// the working tree root).
    #[arg(long, global = true)]
    gitdir: Option<PathBuf>,

    /// Path to the working tree root (defaults to the current directory).
    #[arg(long, global = true)]
    worktree: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a fresh repository layout at `--gitdir`/`--worktree`.
    Init,
    /// Compute and store the hash of stdin, printing the resulting id.
    HashObject {
        /// Object kind to hash as.
        #[arg(long, default_value = "blob")]
        kind: String,
        /// Only print the id; don't write the object to the store.
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the decompressed content of an object.
    CatFile {
        /// The object id (full 40-hex, or a 4-40 char prefix).
        id: String,
    },
    /// Stage a path into the index at stage 0.
    UpdateIndex {
        /// Path relative to the working tree root.
        path: String,
    },
    /// Fold the current index into a tree object, printing its id.
    WriteTree,
    /// Resolve a revision token to an object id.
    RevParse {
        /// The revision token, e.g. `HEAD`, `main`, or a hex prefix.
        token: String,
    },
    /// List refs under `refs/heads`, `refs/tags`, and `refs/remotes`.
    ShowRef,
    /// Compare the index against the working tree.
    DiffFiles,
    /// Fold the index into a tree, wrap it in a commit, and advance HEAD.
    Commit {
        /// The commit message.
        #[arg(short, long)]
        message: String,
        /// Author/committer name. Defaults to `gitcore`.
        #[arg(long, default_value = "gitcore")]
        author: String,
        /// Author/committer email. Defaults to `gitcore@localhost`.
        #[arg(long, default_value = "gitcore@localhost")]
        email: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let worktree = cli.worktree.unwrap_or_else(|| PathBuf::from("."));
    let gitdir = cli.gitdir.unwrap_or_else(|| worktree.join(".git"));
    let repo = Repo::new(&gitdir, &worktree);

    match cli.command {
        Command::Init => {
            Repo::init(&gitdir, &worktree).context("initializing repository")?;
            println!("Initialized repository in {}", gitdir.display());
        }
        Command::HashObject { kind, dry_run } => {
            use std::io::Read as _;
            let kind: ObjectKind = kind.parse().context("parsing object kind")?;
            let mut payload = Vec::new();
            std::io::stdin().read_to_end(&mut payload)?;

            if dry_run {
                let (id, _) = gitcore::objects::ObjectStore::hash(kind, &payload);
                println!("{id}");
            } else {
                let id = repo.objects().write_or_reuse(kind, &payload)?;
                println!("{id}");
            }
        }
        Command::CatFile { id } => {
            let objects = repo.objects();
            let resolved = if id.len() == 40 {
                id.parse()?
            } else {
                gitcore::revparse::RevParse::new(&repo.refs(), &objects)
                    .parse(&id)?
                    .id
            };
            let (_kind, payload) = objects.read(resolved)?;
            use std::io::Write as _;
            std::io::stdout().write_all(&payload)?;
        }
        Command::UpdateIndex { path } => {
            let mut index = repo.index()?;
            let full_path = worktree.join(&path);
            let content = std::fs::read(&full_path).context("reading path to stage")?;
            let id = repo.objects().write_or_reuse(ObjectKind::Blob, &content)?;
            index.add_stage(gitcore::IndexEntry {
                path,
                stage: gitcore::Stage::Normal,
                mode: gitcore::Mode::Blob,
                id,
                size: content.len() as u32,
                ctime_secs: 0,
                ctime_nanos: 0,
                mtime_secs: 0,
                mtime_nanos: 0,
                dev: 0,
                ino: 0,
                uid: 0,
                gid: 0,
                assume_valid: false,
            });
            repo.write_index(&index)?;
        }
        Command::WriteTree => {
            let index = repo.index()?;
            let id = repo.write_tree(index.entries())?;
            println!("{id}");
        }
        Command::RevParse { token } => {
            let rev = repo.rev_parse(&token).context("resolving revision")?;
            if rev.excluded {
                print!("^");
            }
            println!("{}", rev.id);
        }
        Command::ShowRef => {
            let refs = repo.refs();
            for name in refs
                .branches()?
                .into_iter()
                .chain(refs.tags()?)
                .chain(refs.remote_refs()?)
            {
                if let Some(id) = refs.resolve_opt(&name)? {
                    println!("{id} {name}");
                }
            }
        }
        Command::DiffFiles => {
            for change in repo.diff_files()? {
                let worktree_desc = change
                    .worktree_mode
                    .map_or_else(|| "missing".to_string(), |m| m.octal_str());
                println!(
                    "{}  index:{} ({})  worktree:{}",
                    change.path,
                    change.index_id,
                    change.index_mode.octal_str(),
                    worktree_desc
                );
            }
        }
        Command::Commit { message, author, email } => {
            let seconds = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .context("reading system clock")?
                .as_secs() as i64;
            let signature = gitcore::Signature::new(author, email, seconds, "+0000");
            let commit_id = repo
                .commit(signature.clone(), signature, &message)
                .context("creating commit")?;
            println!("{commit_id}");
        }
    }

    Ok(())
}
