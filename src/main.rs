use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use eyre::{Result, eyre};
use std::net::SocketAddr;
use std::path::PathBuf;
use todostore::{FileStorage, FilterKind, SharedStorage, SqliteBackend, TaskStore};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "todostore")]
#[command(about = "Todo list backed by versioned key-value storage")]
#[command(version)]
struct Cli {
    /// Path to the storage directory (default: platform data dir)
    #[arg(short, long)]
    store_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a task; blank or duplicate titles are silently ignored
    Add { title: String },

    /// List tasks with a stats line
    List {
        #[arg(short, long, value_enum, default_value = "all")]
        filter: FilterArg,
    },

    /// Mark a task complete (or incomplete with --off)
    Toggle {
        id: Uuid,
        #[arg(long)]
        off: bool,
    },

    /// Remove a task
    Remove { id: Uuid },

    /// Remove every completed task
    ClearCompleted,

    /// Mark every task complete
    CompleteAll,

    /// Mark every task incomplete
    UncheckAll,

    /// Serve the HTTP API over the SQLite backend
    Serve {
        #[arg(long, default_value = "127.0.0.1:3000")]
        addr: SocketAddr,

        /// Database path (an in-memory database when omitted)
        #[arg(long)]
        db: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum FilterArg {
    All,
    Active,
    Completed,
}

impl From<FilterArg> for FilterKind {
    fn from(arg: FilterArg) -> Self {
        match arg {
            FilterArg::All => FilterKind::All,
            FilterArg::Active => FilterKind::Active,
            FilterArg::Completed => FilterKind::Completed,
        }
    }
}

fn main() -> Result<()> {
    // Setup tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { addr, db } => {
            let backend = match db {
                Some(path) => SqliteBackend::open(path)?,
                None => SqliteBackend::open_in_memory()?,
            };
            tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?
                .block_on(todostore::http::serve(addr, backend))
        }
        command => run_store_command(cli.store_path, command),
    }
}

fn run_store_command(store_path: Option<PathBuf>, command: Commands) -> Result<()> {
    let store_path = match store_path {
        Some(path) => path,
        None => dirs::data_dir()
            .ok_or_else(|| eyre!("No data directory on this platform; pass --store-path"))?
            .join("todostore"),
    };

    let storage = SharedStorage::new(FileStorage::open(&store_path)?);
    let mut store = TaskStore::new(storage.attach());
    store.load();

    match command {
        Commands::Add { title } => {
            if store.add(&title) {
                println!("Added {:?}", title.trim());
            } else {
                println!("Ignored (blank or duplicate title)");
            }
        }
        Commands::List { filter } => {
            print_list(&store, filter.into());
        }
        Commands::Toggle { id, off } => {
            if store.toggle(id, !off) {
                println!("Updated {id}");
            } else {
                println!("No task with id {id}");
            }
        }
        Commands::Remove { id } => {
            if store.remove(id) {
                println!("Removed {id}");
            } else {
                println!("No task with id {id}");
            }
        }
        Commands::ClearCompleted => {
            let removed = store.clear_completed();
            println!("Removed {removed} completed task(s)");
        }
        Commands::CompleteAll => {
            store.complete_all();
            println!("Marked all tasks complete");
        }
        Commands::UncheckAll => {
            store.uncheck_all();
            println!("Marked all tasks incomplete");
        }
        Commands::Serve { .. } => unreachable!("handled above"),
    }

    Ok(())
}

fn print_list(store: &TaskStore, kind: FilterKind) {
    for task in store.filter(kind) {
        let marker = if task.completed {
            "[x]".green()
        } else {
            "[ ]".normal()
        };
        let title = if task.completed {
            task.title.strikethrough().dimmed()
        } else {
            task.title.normal()
        };
        let created = chrono::DateTime::from_timestamp_millis(task.created_at)
            .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();

        println!(
            "{} {}  {} {}",
            marker,
            title,
            task.id.to_string().dimmed(),
            created.dimmed()
        );
    }

    let stats = store.stats();
    println!(
        "{} total, {} active, {} completed",
        stats.total, stats.active, stats.completed
    );
}
