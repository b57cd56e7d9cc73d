//! LexNote CLI
//!
//! Command-line interface for LexNote - vocabulary notes on your own
//! documents, backed by a local database.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use lexnote_core::{Config, Dictionary, StorageClient, Store};

mod commands;
mod output;
mod prompt;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "lexnote")]
#[command(about = "LexNote - vocabulary note taking with a local database")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage documents
    Doc {
        #[command(subcommand)]
        command: DocCommands,
    },
    /// Manage vocabulary words
    Word {
        #[command(subcommand)]
        command: WordCommands,
    },
    /// Export the whole database to a file
    Export {
        /// Destination file
        path: PathBuf,
    },
    /// Replace the database with a previously exported file
    Import {
        /// Export file to restore
        path: PathBuf,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Show database location and row counts
    Status,
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum DocCommands {
    /// Create a new document
    #[command(alias = "new")]
    Create {
        /// Document title
        title: Option<String>,
    },
    /// List all documents
    #[command(alias = "ls")]
    List,
    /// Show a document with its vocabulary
    Show {
        /// Document ID
        id: i64,
    },
    /// Rename a document
    Rename {
        /// Document ID
        id: i64,
        /// New title
        title: String,
    },
    /// Delete a document and its words
    #[command(alias = "rm")]
    Delete {
        /// Document ID
        id: i64,
    },
}

#[derive(Subcommand)]
enum WordCommands {
    /// Record a vocabulary word on a document
    Add {
        /// Document ID
        doc_id: i64,
        /// The word as it appears in the text
        headword: String,
    },
    /// List a document's vocabulary words
    #[command(alias = "ls")]
    List {
        /// Document ID
        doc_id: i64,
    },
    /// Look up a word (dictionary entry plus your notes)
    #[command(alias = "define")]
    Show {
        /// Word ID
        id: i64,
    },
    /// Set personal notes or overrides on a word
    Note {
        /// Word ID
        id: i64,
        /// Your own definition
        #[arg(short, long)]
        definition: Option<String>,
        /// Your own phonetic spelling
        #[arg(short, long)]
        phonetic: Option<String>,
        /// Free-form notes
        #[arg(short, long)]
        notes: Option<String>,
    },
    /// Unmark a word, keeping its text in the document
    #[command(alias = "rm")]
    Delete {
        /// Word ID
        id: i64,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (data_dir, dictionary_api_url, fetch_timeout_secs)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("lexnote_core=warn,lexnote=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Config can be handled without opening the database
    if let Commands::Config { command } = &cli.command {
        return handle_config_command(command.clone(), &output);
    }

    let config = Config::load()?;
    let client = StorageClient::connect(config.clone());
    let backend = client.initialize().await?;
    let store = Store::new(client);

    let result = match cli.command {
        Commands::Doc { command } => handle_doc_command(command, &store, &output).await,
        Commands::Word { command } => {
            let dictionary = Dictionary::new(store.clone(), &config)?;
            handle_word_command(command, &store, &dictionary, &output).await
        }
        Commands::Export { path } => commands::transfer::export(&store, path, &output).await,
        Commands::Import { path, yes } => {
            commands::transfer::import(&store, path, yes, &output).await
        }
        Commands::Status => commands::status::show(&store, &config, backend, &output).await,
        Commands::Config { .. } => unreachable!(), // Handled above
    };

    // Release the database handle before exiting
    let _ = store.client().close().await;

    result
}

async fn handle_doc_command(command: DocCommands, store: &Store, output: &Output) -> Result<()> {
    match command {
        DocCommands::Create { title } => commands::doc::create(store, title, output).await,
        DocCommands::List => commands::doc::list(store, output).await,
        DocCommands::Show { id } => commands::doc::show(store, id, output).await,
        DocCommands::Rename { id, title } => commands::doc::rename(store, id, title, output).await,
        DocCommands::Delete { id } => commands::doc::delete(store, id, output).await,
    }
}

async fn handle_word_command(
    command: WordCommands,
    store: &Store,
    dictionary: &Dictionary,
    output: &Output,
) -> Result<()> {
    match command {
        WordCommands::Add { doc_id, headword } => {
            commands::word::add(store, doc_id, headword, output).await
        }
        WordCommands::List { doc_id } => commands::word::list(store, doc_id, output).await,
        WordCommands::Show { id } => commands::word::show(dictionary, id, output).await,
        WordCommands::Note {
            id,
            definition,
            phonetic,
            notes,
        } => commands::word::note(store, dictionary, id, definition, phonetic, notes, output).await,
        WordCommands::Delete { id } => commands::word::delete(store, id, output).await,
    }
}

fn handle_config_command(command: Option<ConfigCommands>, output: &Output) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(output),
        Some(ConfigCommands::Set { key, value }) => commands::config::set(key, value, output),
    }
}
