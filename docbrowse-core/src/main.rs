//! src/main.rs
//! ============================================================================
//! # docbrowse: line-oriented shell over the documentation browser core
//!
//! Reads commands from stdin, one per line. Documents are printed as raw
//! markdown; rendering belongs to whatever sits on top of the core.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin, Stdout},
    signal,
};
use tracing::{info, warn};

use docbrowse_core::{
    DocBrowser, Logger,
    config::Config,
    fetch::{FsFetcher, TimeoutFetcher},
    store::{Dispatch, Entry},
    tree::{ChildKind, TreeView},
};

const HELP: &str = "\
commands:
  search <query>     fuzzy-match document paths
  tree [prefix]      list one level of the tree (root when omitted)
  toggle <path>      expand or collapse a tree node ('' for root)
  collapse           collapse the whole tree
  rows               print the expanded tree
  open <route>       show a document ('/' for the root document)
  reload <route>     fetch a document again
  status             loading state and fetch statistics
  help               this text
  quit               exit";

#[tokio::main]
async fn main() -> Result<()> {
    let (config, config_error) = match Config::load().await {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };

    let _guard = Logger::init(&config.logging).context("Failed to initialize logging")?;
    info!("Starting docbrowse");

    if let Some(e) = config_error {
        warn!("Failed to load config, using defaults: {e:#}");
    }

    let app: App = App::new(config);
    app.run().await.context("Shell runtime error")?;

    info!("docbrowse exited cleanly");
    Ok(())
}

struct App {
    browser: DocBrowser,
    view: TreeView,
    out: Stdout,
}

enum Flow {
    Continue,
    Quit,
}

impl App {
    fn new(config: Config) -> Self {
        let fetcher = TimeoutFetcher::new(FsFetcher::from_config(&config.fetch), config.fetch.timeout);

        Self {
            browser: DocBrowser::new(config, Arc::new(fetcher)),
            view: TreeView::new(),
            out: tokio::io::stdout(),
        }
    }

    async fn run(mut self) -> Result<()> {
        let (manifest, _) = self.browser.open("/").await;
        if manifest == Dispatch::Failed {
            self.report_manifest_error().await?;
        } else if let Some(index) = self.browser.path_index() {
            self.say(&format!("{} documents indexed; type 'help'", index.len()))
                .await?;
        }

        let mut lines: Lines<BufReader<Stdin>> = BufReader::new(tokio::io::stdin()).lines();

        loop {
            self.prompt().await?;

            let line = tokio::select! {
                _ = signal::ctrl_c() => {
                    info!("Interrupt received");
                    break;
                }
                line = lines.next_line() => line.context("Failed to read stdin")?,
            };

            let Some(line) = line else {
                break;
            };

            match self.handle(line.trim()).await? {
                Flow::Continue => {}
                Flow::Quit => break,
            }
        }

        Ok(())
    }

    async fn handle(&mut self, line: &str) -> Result<Flow> {
        let (command, arg) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(command, arg)| (command, arg.trim()));

        match command {
            "" => {}
            "quit" | "exit" => return Ok(Flow::Quit),
            "help" => self.say(HELP).await?,
            "search" => self.search(arg).await?,
            "tree" => self.tree(arg).await?,
            "toggle" => {
                let path = arg.trim_matches('\'');
                let open = self.view.toggle(path);
                self.say(if open { "expanded" } else { "collapsed" }).await?;
            }
            "collapse" => {
                self.view.collapse_all();
                self.say("collapsed").await?;
            }
            "rows" => self.rows().await?,
            "open" => self.open(route_or_root(arg), false).await?,
            "reload" => self.open(route_or_root(arg), true).await?,
            "status" => self.status().await?,
            other => {
                self.say(&format!("unknown command '{other}'; type 'help'"))
                    .await?;
            }
        }

        Ok(Flow::Continue)
    }

    async fn search(&mut self, query: &str) -> Result<()> {
        let result = self.browser.search(query);
        if result.is_empty() {
            return self.say("no matches").await;
        }

        let listing: Vec<String> = result
            .hits()
            .iter()
            .map(|hit| format!("{:>3}  {}", hit.distance, hit.path))
            .collect();
        self.say(&listing.join("\n")).await
    }

    async fn tree(&mut self, prefix: &str) -> Result<()> {
        let children = self.browser.tree_children(prefix);
        if children.is_empty() {
            return self.say("no children").await;
        }

        let listing: Vec<String> = children
            .iter()
            .map(|child| {
                let marker = if child.is_leaf() { ' ' } else { '+' };
                format!("{marker} {}", child.path)
            })
            .collect();
        self.say(&listing.join("\n")).await
    }

    async fn rows(&mut self) -> Result<()> {
        let rows = self.browser.tree_rows(&self.view);

        let listing: Vec<String> = rows
            .iter()
            .map(|row| {
                let marker = match (row.kind, row.expanded) {
                    (ChildKind::Leaf, _) => ' ',
                    (ChildKind::Node, true) => '-',
                    (ChildKind::Node, false) => '+',
                };
                format!("{}{marker} {}", "  ".repeat(row.depth), row.label())
            })
            .collect();
        self.say(&listing.join("\n")).await
    }

    async fn open(&mut self, route: &str, reload: bool) -> Result<()> {
        if reload {
            self.browser.reload_document(route).await;
        } else {
            self.browser.ensure_document(route).await;
        }

        match self.browser.document_entry(route) {
            Some(Entry {
                error: Some(error), ..
            }) => {
                self.say(&format!("error: {error} (try 'reload {route}')"))
                    .await
            }
            _ => match self.browser.document(route) {
                Some(text) => self.say(&text).await,
                None => self.say("still loading").await,
            },
        }
    }

    async fn status(&mut self) -> Result<()> {
        let stats = self.browser.stats();
        let store = self.browser.store();

        let report = format!(
            "loading: {}\nentries: {}\ndispatches: {} (skipped in-flight: {})\n\
             loads: {} ok, {} failed, avg {:?}",
            self.browser.is_loading(),
            store.len(),
            stats.dispatches,
            stats.in_flight_skips,
            stats.successes,
            stats.failures,
            stats.average_load_time,
        );
        self.say(&report).await
    }

    async fn report_manifest_error(&mut self) -> Result<()> {
        let error = self
            .browser
            .manifest_entry()
            .and_then(|entry| entry.error)
            .map(|e| e.to_string())
            .unwrap_or_default();
        warn!("Manifest unavailable: {error}");
        self.say(&format!("manifest unavailable: {error}")).await
    }

    async fn prompt(&mut self) -> Result<()> {
        self.out.write_all(b"> ").await?;
        self.out.flush().await?;
        Ok(())
    }

    async fn say(&mut self, text: &str) -> Result<()> {
        self.out.write_all(text.as_bytes()).await?;
        self.out.write_all(b"\n").await?;
        self.out.flush().await?;
        Ok(())
    }
}

fn route_or_root(arg: &str) -> &str {
    if arg.is_empty() { "/" } else { arg }
}
