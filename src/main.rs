//! Veil Search CLI - text-mode web search with provider fallback.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use veil_search::{
    normalize_address, AnonymizerControl, AnswerKind, CancellationToken, DirectAnswer,
    HistoryEntry, HistorySink, HttpTransport, MemoryHistory, PageFetcher, PageView,
    ProviderRegistry, SearchError, SearchOrchestrator, SearchQuery, SearchResult, SearchResults,
    Settings, TorProcess,
};

/// Veil Search - search the web through independent providers
#[derive(Parser)]
#[command(name = "veil-search")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Settings file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Route requests through the local SOCKS proxy
    #[arg(short, long, global = true)]
    anonymize: bool,

    /// Start a Tor process for the session (implies --anonymize)
    #[arg(long, global = true)]
    tor: bool,

    /// Request timeout in seconds
    #[arg(short, long, global = true)]
    timeout: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Search the web
    Search(SearchArgs),

    /// Load a page and print its text
    Fetch(FetchArgs),

    /// Ask a question and print the instant answer
    Ask(AskArgs),

    /// List search providers
    Providers,

    /// Interactive session
    Shell,
}

#[derive(Parser)]
struct SearchArgs {
    /// Search query
    #[arg(required = true, num_args = 1..)]
    query: Vec<String>,

    /// Provider to start with (ddg, ddg_api, google, wikipedia, brave)
    #[arg(short, long)]
    provider: Option<String>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,
}

#[derive(Parser)]
struct FetchArgs {
    /// Page URL
    url: String,

    /// Output format
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,
}

#[derive(Parser)]
struct AskArgs {
    /// Question
    #[arg(required = true, num_args = 1..)]
    question: Vec<String>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output
    Json,
    /// Compact single-line output
    Compact,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(Level::DEBUG)
            .with_writer(std::io::stderr)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_writer(std::io::stderr)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }

    let mut settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    if let Some(secs) = cli.timeout {
        settings.timeout_secs = secs;
    }
    settings.anonymize |= cli.anonymize || cli.tor;
    settings.validate()?;

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    let mut app = App::new(settings, cancel)?;
    if cli.tor && !app.tor.start().await {
        anyhow::bail!("Tor did not start; is `{}` installed?", app.settings.tor_binary);
    }

    let outcome = match cli.command {
        Commands::Search(args) => app.run_search(args).await,
        Commands::Fetch(args) => app.run_fetch(args).await,
        Commands::Ask(args) => app.run_ask(args).await,
        Commands::Providers => {
            app.list_providers();
            Ok(())
        }
        Commands::Shell => app.run_shell().await,
    };
    app.tor.stop().await;

    match outcome {
        Err(e) if e.downcast_ref::<SearchError>().is_some_and(SearchError::is_cancelled) => {
            eprintln!("Cancelled");
            std::process::exit(130);
        }
        other => other,
    }
}

struct App {
    settings: Settings,
    registry: ProviderRegistry,
    orchestrator: SearchOrchestrator,
    fetcher: PageFetcher,
    history: Arc<MemoryHistory>,
    tor: TorProcess,
    cancel: CancellationToken,
    last_results: Vec<SearchResult>,
    last_page: Option<PageView>,
}

impl App {
    fn new(settings: Settings, cancel: CancellationToken) -> Result<Self> {
        let mut registry = ProviderRegistry::builtin();
        registry.apply_settings(&settings)?;

        let transport = Arc::new(HttpTransport::new(&settings.proxy(), settings.jitter())?);
        let history = Arc::new(MemoryHistory::new());
        let orchestrator = SearchOrchestrator::new(transport.clone())
            .with_history(history.clone())
            .with_timeout(settings.timeout());
        let fetcher = PageFetcher::new(transport)
            .with_history(history.clone())
            .with_timeout(settings.timeout());
        let tor = TorProcess::new(settings.tor_binary.clone(), settings.proxy());

        Ok(Self {
            settings,
            registry,
            orchestrator,
            fetcher,
            history,
            tor,
            cancel,
            last_results: Vec::new(),
            last_page: None,
        })
    }

    async fn search(&mut self, text: &str, provider: Option<String>) -> Result<SearchResults> {
        let mut query = SearchQuery::new(text).with_anonymizing(self.settings.anonymize);
        query.provider = provider;
        let results = self
            .orchestrator
            .search(&self.registry, &query, &self.cancel)
            .await?;
        self.last_results = results.items().to_vec();
        Ok(results)
    }

    async fn run_search(&mut self, args: SearchArgs) -> Result<()> {
        let text = args.query.join(" ");
        let results = self.search(&text, args.provider).await?;
        print_results(&text, &results, args.format)?;
        Ok(())
    }

    async fn run_fetch(&mut self, args: FetchArgs) -> Result<()> {
        let page = self.load(&args.url).await?;
        print_page(&page, args.format)?;
        Ok(())
    }

    async fn run_ask(&mut self, args: AskArgs) -> Result<()> {
        let question = args.question.join(" ");
        let answer = self.ask(&question).await?;
        print_answer(&question, answer.as_ref(), args.format)?;
        Ok(())
    }

    async fn ask(&self, question: &str) -> Result<Option<DirectAnswer>> {
        let query = SearchQuery::new(question).with_anonymizing(self.settings.anonymize);
        let answer = self
            .orchestrator
            .answer(&self.registry, &query, &self.cancel)
            .await?;
        Ok(answer)
    }

    /// Loads a typed address, adding `https://` when no scheme is given.
    async fn load(&mut self, address: &str) -> Result<PageView> {
        let url = normalize_address(address);
        let page = self
            .fetcher
            .load(&url, self.settings.anonymize, &self.cancel)
            .await?;
        self.last_page = Some(page.clone());
        Ok(page)
    }

    fn list_providers(&self) {
        println!("Search providers:\n");
        for provider in self.registry.providers() {
            let marker = if provider.id() == self.registry.default_id() {
                "*"
            } else {
                " "
            };
            let state = if provider.is_enabled() { "on " } else { "off" };
            println!(
                "  {} {:<10} {} {:<16} {}",
                marker,
                provider.id(),
                state,
                provider.name(),
                provider.response().label()
            );
        }
        println!();
        println!("  * default   anonymize: {}", on_off(self.settings.anonymize));
    }

    async fn run_shell(&mut self) -> Result<()> {
        println!("Veil Search interactive session. Type `help` for commands.");
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdout = tokio::io::stdout();

        loop {
            stdout.write_all(b"veil> ").await?;
            stdout.flush().await?;

            let Some(line) = self.cancel.run(lines.next_line()).await?? else {
                break;
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match self.dispatch(line).await {
                Ok(ShellFlow::Continue) => {}
                Ok(ShellFlow::Quit) => break,
                Err(e) => {
                    if e.downcast_ref::<SearchError>().is_some_and(SearchError::is_cancelled) {
                        return Err(e);
                    }
                    eprintln!("Error: {}", e);
                }
            }
        }
        Ok(())
    }

    async fn dispatch(&mut self, line: &str) -> Result<ShellFlow> {
        let (command, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();
        debug!(command, "Shell command");

        match command {
            "quit" | "exit" | "q" => {
                self.cancel.cancel();
                return Ok(ShellFlow::Quit);
            }
            "help" | "?" => print_help(),
            "search" | "s" => {
                let results = self.search(rest, None).await?;
                print_results(rest, &results, OutputFormat::Text)?;
            }
            "open" | "o" => {
                let index: usize = rest
                    .parse()
                    .map_err(|_| anyhow::anyhow!("usage: open <result number>"))?;
                let url = self
                    .last_results
                    .get(index.wrapping_sub(1))
                    .map(|r| r.url.clone())
                    .ok_or_else(|| anyhow::anyhow!("no result #{}", index))?;
                self.open(&url).await?;
            }
            "fetch" | "f" | "go" => self.open(rest).await?,
            "ask" | "ai" => {
                let answer = self.ask(rest).await?;
                print_answer(rest, answer.as_ref(), OutputFormat::Text)?;
            }
            "bookmark" | "b" => self.bookmark(rest)?,
            "bookmarks" | "bm" => self.bookmarks(rest).await?,
            "providers" | "p" => self.list_providers(),
            "use" => {
                let (id, text) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
                if text.trim().is_empty() {
                    self.registry.set_default(id)?;
                    println!("Default provider: {}", self.registry.get(id)?);
                } else {
                    let text = text.trim().to_string();
                    let results = self.search(&text, Some(id.to_string())).await?;
                    print_results(&text, &results, OutputFormat::Text)?;
                }
            }
            "enable" => {
                self.registry.set_enabled(rest, true)?;
                println!("Enabled {}", rest);
            }
            "disable" => {
                self.registry.set_enabled(rest, false)?;
                println!("Disabled {}", rest);
            }
            "anon" => match rest {
                "on" => self.settings.anonymize = true,
                "off" => self.settings.anonymize = false,
                _ => println!("anonymize: {}", on_off(self.settings.anonymize)),
            },
            "tor" => match rest {
                "on" => {
                    if self.tor.start().await {
                        self.settings.anonymize = true;
                        println!("Tor running on {}", self.tor.proxy().url());
                    } else {
                        eprintln!("Tor did not start");
                    }
                }
                "off" => {
                    self.tor.stop().await;
                    self.settings.anonymize = false;
                    println!("Tor stopped");
                }
                _ => {
                    let state = if self.tor.is_running() { "running" } else { "stopped" };
                    println!("Tor: {}", state);
                }
            },
            "history" | "h" => print_history(&self.history.entries()),
            _ => {
                let results = self.search(line, None).await?;
                print_results(line, &results, OutputFormat::Text)?;
            }
        }
        Ok(ShellFlow::Continue)
    }

    async fn open(&mut self, address: &str) -> Result<()> {
        let page = self.load(address).await?;
        print_page(&page, OutputFormat::Text)
    }

    /// `bookmark` saves the last loaded page, `bookmark <n>` result n of the
    /// last search.
    fn bookmark(&mut self, rest: &str) -> Result<()> {
        let (title, url) = if rest.is_empty() {
            let page = self
                .last_page
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("no page loaded yet; usage: bookmark [n]"))?;
            (page.title.clone(), page.url.clone())
        } else {
            let index: usize = rest
                .parse()
                .map_err(|_| anyhow::anyhow!("usage: bookmark [result number]"))?;
            let result = self
                .last_results
                .get(index.wrapping_sub(1))
                .ok_or_else(|| anyhow::anyhow!("no result #{}", index))?;
            (result.title.clone(), result.url.clone())
        };

        let entry = HistoryEntry::bookmark(&title, url);
        if let HistoryEntry::Bookmark { title, .. } = &entry {
            println!("Bookmarked: {}", title);
        }
        self.history.record(entry);
        Ok(())
    }

    /// `bookmarks` lists, `bookmarks <n>` opens and `bookmarks delete <n>`
    /// removes.
    async fn bookmarks(&mut self, rest: &str) -> Result<()> {
        let (action, arg) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        let position = |text: &str| -> Result<usize> {
            let index: usize = text
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("usage: bookmarks [n | delete <n>]"))?;
            index
                .checked_sub(1)
                .ok_or_else(|| anyhow::anyhow!("bookmarks are numbered from 1"))
        };

        match action {
            "" | "list" => print_bookmarks(&self.history.bookmarks()),
            "delete" | "rm" => match self.history.remove_bookmark(position(arg)?) {
                Some(HistoryEntry::Bookmark { title, .. }) => println!("Removed: {}", title),
                _ => anyhow::bail!("no bookmark #{}", arg.trim()),
            },
            n => {
                let bookmarks = self.history.bookmarks();
                let url = match bookmarks.get(position(n)?) {
                    Some(HistoryEntry::Bookmark { url, .. }) => url.clone(),
                    _ => anyhow::bail!("no bookmark #{}", n),
                };
                self.open(&url).await?;
            }
        }
        Ok(())
    }
}

enum ShellFlow {
    Continue,
    Quit,
}

fn print_results(query: &str, results: &SearchResults, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            if let Some(hint) = results.hint() {
                println!("\nNo results for \"{}\".", query);
                println!("{}", hint);
                return Ok(());
            }
            println!(
                "\nSearch results for \"{}\" via {} ({} results in {}ms):\n",
                query,
                results.provider.as_deref().unwrap_or("-"),
                results.count,
                results.duration_ms
            );
            for (i, result) in results.items().iter().enumerate() {
                println!("{}. {}", i + 1, result.title);
                println!("   URL: {}", result.url);
                if !result.snippet.is_empty() {
                    println!("   {}", result.snippet);
                }
                println!();
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(results)?);
        }
        OutputFormat::Compact => {
            for result in results.items() {
                println!("{}\t{}", result.title, result.url);
            }
        }
    }
    Ok(())
}

fn print_answer(question: &str, answer: Option<&DirectAnswer>, format: OutputFormat) -> Result<()> {
    match (format, answer) {
        (OutputFormat::Json, _) => println!("{}", serde_json::to_string_pretty(&answer)?),
        (_, None) => {
            println!("\nNo direct answer found. Try: search {}", question);
        }
        (OutputFormat::Text, Some(answer)) => {
            let label = match answer.kind {
                AnswerKind::Definition => "Definition: ",
                AnswerKind::Abstract | AnswerKind::Answer => "",
            };
            println!("\n{}{}", label, answer.text);
            if let Some(source) = &answer.source {
                println!("Source: {}", source);
            }
            println!();
        }
        (OutputFormat::Compact, Some(answer)) => println!("{}", answer.text),
    }
    Ok(())
}

fn print_page(page: &PageView, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            println!("\n{}", page.title);
            println!("{}", page.url);
            if page.anonymized {
                println!("(loaded through anonymizing proxy)");
            }
            println!("\n{}\n", page.content);
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(page)?),
        OutputFormat::Compact => println!("{}\t{}", page.title, page.content),
    }
    Ok(())
}

fn print_history(entries: &[HistoryEntry]) {
    if entries.is_empty() {
        println!("No history");
        return;
    }
    for entry in entries.iter().rev().take(15) {
        let time = entry.timestamp().format("%Y-%m-%d %H:%M");
        match entry {
            HistoryEntry::Search {
                query,
                provider,
                result_count,
                ..
            } => println!(
                "  {}  search  {} ({}, {} results)",
                time, query, provider, result_count
            ),
            HistoryEntry::Visit { url, title, .. } => {
                println!("  {}  visit   {} <{}>", time, title, url)
            }
            HistoryEntry::Bookmark { url, title, .. } => {
                println!("  {}  saved   {} <{}>", time, title, url)
            }
        }
    }
}

fn print_bookmarks(bookmarks: &[HistoryEntry]) {
    if bookmarks.is_empty() {
        println!("No bookmarks");
        return;
    }
    for (i, entry) in bookmarks.iter().enumerate() {
        if let HistoryEntry::Bookmark { title, url, .. } = entry {
            println!("{:>3}. {}", i + 1, title);
            println!("     {}", url);
        }
    }
}

fn on_off(flag: bool) -> &'static str {
    if flag {
        "on"
    } else {
        "off"
    }
}

fn print_help() {
    println!("Commands:");
    println!("  <text> | search <text>    search with the default provider");
    println!("  use <id> [text]           set the default provider, or search with it once");
    println!("  open <n>                  load result n from the last search");
    println!("  fetch <url> | go <url>    load a page (https:// is added when missing)");
    println!("  ask <question>            instant answer from DuckDuckGo");
    println!("  bookmark [n]              save result n, or the last loaded page");
    println!("  bookmarks [n]             list bookmarks, or open bookmark n");
    println!("  bookmarks delete <n>      remove bookmark n");
    println!("  providers                 list providers");
    println!("  enable <id> | disable <id>");
    println!("  anon on|off               toggle the anonymizing proxy");
    println!("  tor on|off                start or stop the Tor process");
    println!("  history                   recent searches, visits and bookmarks");
    println!("  quit");
}
