use std::cmp;
use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use hanja_gloss::client::HttpRelatedWords;
use hanja_gloss::dictionary::DEFAULT_RELATED_LIMIT;
use hanja_gloss::{DetailsView, Dictionary, HanjaCharacter, KoreanWord, Messages, Variant};
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "hanja-gloss", about = "Explore Korean words through their Hanja", version)]
pub struct Cli {
    /// Emit JSON instead of human-readable tables.
    #[arg(long, global = true)]
    json: bool,

    /// kengdic TSV export with `id`, `surface`, `hanja` and `gloss` columns.
    #[arg(long = "words-file", global = true, default_value = "data/kengdic.tsv")]
    words_file: PathBuf,

    /// Hanja reading list (`字=reading,definition` lines).
    #[arg(long = "hanja-file", global = true, default_value = "data/hanja.txt")]
    hanja_file: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the Hanja characters and dictionary entries for a Korean word.
    Word {
        word: String,
    },
    /// List words sharing a Hanja character.
    Related {
        hanja: String,
        /// Word to leave out of the results, usually the one being studied.
        #[arg(long)]
        original_word: Option<String>,
        #[arg(short, long, default_value_t = DEFAULT_RELATED_LIMIT)]
        limit: usize,
    },
    /// Open a related-words panel against a running server and print its markup.
    Fetch {
        hanja: String,
        /// Base URL of the server exposing `/related-words`.
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        server: String,
        #[arg(long)]
        original_word: Option<String>,
        /// Use the legacy request/render behavior (no search context, no escaping).
        #[arg(long, conflicts_with = "original_word")]
        baseline: bool,
        #[command(flatten)]
        messages: MessageArgs,
    },
    /// Serve the search pages and the `/related-words` endpoint.
    #[cfg(feature = "web")]
    Serve {
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: std::net::SocketAddr,
        #[arg(long, value_enum, default_value_t = ThemeArg::Tailwind)]
        theme: ThemeArg,
        #[arg(long, default_value_t = DEFAULT_RELATED_LIMIT)]
        related_limit: usize,
        /// Number of related-word lookups kept in memory.
        #[arg(long, default_value_t = 1024)]
        cache_size: usize,
        #[command(flatten)]
        messages: MessageArgs,
    },
}

#[derive(clap::Args, Debug)]
struct MessageArgs {
    /// Panel text when a character has no related words.
    #[arg(long)]
    no_results_message: Option<String>,
    /// Panel text when related words cannot be loaded.
    #[arg(long)]
    error_message: Option<String>,
}

impl MessageArgs {
    fn into_messages(self) -> Messages {
        let defaults = Messages::default();
        Messages {
            no_results: self.no_results_message.unwrap_or(defaults.no_results),
            error: self.error_message.unwrap_or(defaults.error),
        }
    }
}

#[cfg(feature = "web")]
#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ThemeArg {
    Tailwind,
    Bootstrap,
}

#[cfg(feature = "web")]
impl From<ThemeArg> for hanja_gloss::web::WebTheme {
    fn from(value: ThemeArg) -> Self {
        match value {
            ThemeArg::Tailwind => hanja_gloss::web::WebTheme::Tailwind,
            ThemeArg::Bootstrap => hanja_gloss::web::WebTheme::Bootstrap,
        }
    }
}

pub fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing();
    match cli.command {
        Command::Word { ref word } => {
            let dictionary = Dictionary::open(&cli.words_file, &cli.hanja_file)?;
            handle_word(&dictionary, word, cli.json)
        }
        Command::Related {
            ref hanja,
            ref original_word,
            limit,
        } => {
            let dictionary = Dictionary::open(&cli.words_file, &cli.hanja_file)?;
            handle_related(&dictionary, hanja, original_word.as_deref(), limit, cli.json)
        }
        Command::Fetch {
            hanja,
            server,
            original_word,
            baseline,
            messages,
        } => {
            let variant = if baseline {
                Variant::Baseline
            } else {
                Variant::enhanced(original_word.unwrap_or_default(), messages.into_messages())
            };
            runtime()?.block_on(handle_fetch(hanja, server, variant, cli.json))
        }
        #[cfg(feature = "web")]
        Command::Serve {
            addr,
            theme,
            related_limit,
            cache_size,
            messages,
        } => {
            let dictionary = Dictionary::open(&cli.words_file, &cli.hanja_file)?;
            let config = hanja_gloss::web::WebConfig {
                addr,
                theme: theme.into(),
                related_limit: cmp::max(1, related_limit),
                cache_size,
                messages: messages.into_messages(),
            };
            runtime()?.block_on(hanja_gloss::web::serve(
                config,
                std::sync::Arc::new(dictionary),
            ))?;
            Ok(())
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("hanja_gloss=info,tower_http=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn runtime() -> Result<tokio::runtime::Runtime, Box<dyn Error>> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?)
}

fn handle_word(dictionary: &Dictionary, word: &str, as_json: bool) -> Result<(), Box<dyn Error>> {
    let entries = dictionary.words_by_korean(word);
    if entries.is_empty() {
        return Err(format!("No entry found for word {word:?}").into());
    }
    let characters = dictionary.hanja_meanings_for_word(word).unwrap_or_default();

    if as_json {
        let payload = json!({
            "word": word,
            "characters": characters,
            "entries": entries,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        print_entries(word, &entries);
        print_characters(&characters);
    }
    Ok(())
}

fn handle_related(
    dictionary: &Dictionary,
    hanja: &str,
    original_word: Option<&str>,
    limit: usize,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    if hanja.trim().is_empty() {
        return Err("Hanja cannot be empty".into());
    }
    let limit = cmp::max(1, limit);
    let related = dictionary.related_words(hanja.trim(), original_word, limit);

    if as_json {
        println!("{}", serde_json::to_string_pretty(&related)?);
        return Ok(());
    }
    if related.is_empty() {
        println!("No words contain \"{hanja}\".");
        return Ok(());
    }
    let width = related
        .iter()
        .map(|row| row.word.chars().count())
        .max()
        .unwrap_or(4)
        .max("WORD".len());
    println!("{:<width$}  {:<8}  {}", "WORD", "HANJA", "GLOSS", width = width);
    println!("{:-<width$}  {:-<8}  {}", "", "", "-----", width = width);
    for row in &related {
        println!(
            "{:<width$}  {:<8}  {}",
            row.word,
            row.hanja,
            row.lemma,
            width = width
        );
    }
    Ok(())
}

async fn handle_fetch(
    hanja: String,
    server: String,
    variant: Variant,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    let source = HttpRelatedWords::new(server);
    let mut view = DetailsView::with_keys(variant, [hanja.clone()]);
    view.toggle_and_load(&hanja, &source).await;
    let panel = view
        .panel(&hanja)
        .ok_or_else(|| format!("No panel registered for {hanja:?}"))?;

    if as_json {
        let payload = json!({
            "hanja": hanja,
            "url": source.endpoint_url(&view.variant().query(&hanja)),
            "state": format!("{:?}", panel.state()),
            "container_class": panel.container_class(),
            "html": panel.content(),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        println!("{}", panel.content());
    }
    Ok(())
}

fn print_entries(word: &str, entries: &[&KoreanWord]) {
    println!("Entries for \"{word}\":");
    for entry in entries {
        let hanja = entry
            .hanja
            .as_deref()
            .map(|h| format!(" ({h})"))
            .unwrap_or_default();
        let gloss = entry.glossary.as_deref().unwrap_or("<no gloss>");
        println!("- #{}{}: {}", entry.id, hanja, gloss);
    }
}

fn print_characters(characters: &[HanjaCharacter]) {
    if characters.is_empty() {
        println!("\nNo Hanja found.");
        return;
    }
    println!("\nHanja:");
    for character in characters {
        for reading in &character.readings {
            println!(
                "  {}  {:<12}  {}",
                character.character, reading.korean, reading.meaning
            );
        }
    }
}
