pub mod cache;
pub mod config;
pub mod export;
pub mod model;
pub mod search;

use std::io::Write;

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};

use config::SearchConfig;
use search::query::parse;
use search::service::{DEFAULT_QUERY, SearchParams, SearchService};

/// Command-line interface.
#[derive(Parser, Debug)]
#[command(
    name = "blogsearch",
    version,
    about = "Semantic search over blog posts and RSS feeds"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a search and print the JSON response
    Search {
        /// Query string; defaults to the front-page query
        query: Option<String>,

        #[command(flatten)]
        opts: SearchOpts,
    },
    /// Print an RSS 2.0 feed for a search
    Rss {
        query: String,

        #[command(flatten)]
        opts: SearchOpts,
    },
    /// Export matching feeds as OPML or CSV
    Export {
        #[arg(value_enum)]
        format: ExportFormat,

        query: String,

        #[command(flatten)]
        opts: SearchOpts,
    },
    /// Show how a query is parsed (no network access)
    Parse { query: String },
    /// Generate shell completions to stdout
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate man page to stdout
    Man,
}

/// Shorthand parameters shared by the search-backed commands.
#[derive(Args, Debug)]
pub struct SearchOpts {
    /// Search individual posts or whole sites
    #[arg(long = "type", default_value = "pages", value_parser = ["pages", "sites"])]
    pub search_type: String,

    /// Content type shorthand (blog, news, academic, ...)
    #[arg(long)]
    pub content: Option<String>,

    /// Recency shorthand (week, month, 3days, ...)
    #[arg(long)]
    pub time: Option<String>,

    /// Secondary ordering; `time` sorts newest first
    #[arg(long)]
    pub sort: Option<String>,

    /// Attach each feed's latest post (site searches only)
    #[arg(long, default_value_t = false)]
    pub include_posts: bool,

    /// Drop results with duplicate titles
    #[arg(long, default_value_t = false)]
    pub dedupe: bool,
}

impl SearchOpts {
    pub fn to_params(&self, query: &str) -> SearchParams {
        let flag = |on: bool| if on { "true" } else { "false" };
        let mut pairs = vec![
            ("qry", query.to_string()),
            ("type", self.search_type.clone()),
            ("include_posts", flag(self.include_posts).to_string()),
            ("dedupe", flag(self.dedupe).to_string()),
        ];
        let optional = [
            ("content", &self.content),
            ("time", &self.time),
            ("sort", &self.sort),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                pairs.push((key, value.clone()));
            }
        }
        SearchParams::from_pairs(pairs)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Opml,
    Csv,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let mut out = std::io::stdout().lock();

    match cli.command {
        Commands::Search { query, opts } => {
            let service = service_from_env()?;
            let params = opts.to_params(query.as_deref().unwrap_or(DEFAULT_QUERY));
            let response = service.perform_search(&params);
            serde_json::to_writer_pretty(&mut out, &response).context("writing search response")?;
            writeln!(out)?;
        }
        Commands::Rss { query, opts } => {
            let service = service_from_env()?;
            let doc = service.rss(&opts.to_params(&query));
            writeln!(out, "{doc}")?;
        }
        Commands::Export { format, query, opts } => {
            let service = service_from_env()?;
            let params = opts.to_params(&query);
            let doc = match format {
                ExportFormat::Opml => service.export_opml(&params),
                ExportFormat::Csv => service.export_csv(&params),
            };
            write!(out, "{doc}")?;
            if !doc.ends_with('\n') {
                writeln!(out)?;
            }
        }
        Commands::Parse { query } => {
            let parsed = parse(&query);
            serde_json::to_writer_pretty(&mut out, &parsed).context("writing parsed query")?;
            writeln!(out)?;
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "blogsearch", &mut out);
        }
        Commands::Man => {
            let cmd = Cli::command();
            let man = clap_mangen::Man::new(cmd);
            man.render(&mut out)?;
        }
    }
    Ok(())
}

fn service_from_env() -> Result<SearchService> {
    let config = SearchConfig::from_env();
    if config.pinecone_host.is_empty() {
        tracing::warn!("PINECONE_HOST is not set; searches will return no results");
    }
    SearchService::from_config(&config).context("building search service")
}
