use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use feedfold::config::Config;
use feedfold::feed::{collect, parse, FeedItem, Fetcher, FileFetcher, HttpFetcher};

#[derive(Parser, Debug)]
#[command(
    name = "feedfold",
    about = "Fetch RSS feeds concurrently and print every item"
)]
struct Args {
    /// Feed URLs. Overrides `feeds` from the config file
    #[arg(value_name = "URL")]
    urls: Vec<String>,

    /// Config file (default: ~/.config/feedfold/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print items as a JSON array
    #[arg(long)]
    json: bool,

    /// Read each URL as a local file path instead of fetching it
    #[arg(long)]
    files: bool,

    /// Print items from the feeds that succeeded even when others fail
    #[arg(long)]
    partial: bool,
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    let path = match path {
        Some(p) => p.clone(),
        None => match Config::default_path() {
            Some(p) => p,
            None => return Ok(Config::default()),
        },
    };
    Config::load(&path).with_context(|| format!("Failed to load config '{}'", path.display()))
}

fn write_item(out: &mut impl Write, item: &FeedItem) -> std::io::Result<()> {
    writeln!(out, "----- ITEM -----")?;
    writeln!(out, "Title={}", item.title)?;
    writeln!(out, "Source={}", item.source)?;
    writeln!(out, "SourceURL={}", item.source_url)?;
    writeln!(out, "Link={}", item.link)?;
    writeln!(
        out,
        "PublishDate={}",
        item.publish_date.format("%Y-%m-%d %H:%M:%S %z")
    )?;
    writeln!(out, "Description={}", item.description)?;
    writeln!(out)
}

fn write_items(items: &[FeedItem], json: bool) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if json {
        serde_json::to_writer_pretty(&mut out, items).context("Failed to encode items")?;
        writeln!(out)?;
    } else {
        for item in items {
            write_item(&mut out, item)?;
        }
    }
    out.flush()?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays clean for items
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = load_config(args.config.as_ref())?;

    let urls = if args.urls.is_empty() {
        config.feeds.clone()
    } else {
        args.urls.clone()
    };
    if urls.is_empty() {
        anyhow::bail!("No feeds to fetch: pass URLs as arguments or list them under `feeds` in the config file");
    }

    let fetcher: Arc<dyn Fetcher> = if args.files {
        Arc::new(FileFetcher)
    } else {
        Arc::new(HttpFetcher::new(&config.fetch_config()).context("Failed to build HTTP client")?)
    };

    if args.partial {
        let report = collect(fetcher, &urls).await;
        write_items(&report.items, args.json)?;
        if !report.is_complete() {
            for failure in &report.failures {
                eprintln!("error: {}", failure);
            }
            anyhow::bail!(
                "{} of {} feeds failed",
                report.failures.len(),
                report.total
            );
        }
        return Ok(());
    }

    let items = parse(fetcher, &urls)
        .await
        .context("Encountered error in feed parser")?;
    write_items(&items, args.json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    #[test]
    fn test_write_item_block_format() {
        let item = FeedItem {
            title: "Hello".to_string(),
            source: "Example".to_string(),
            source_url: "https://example.com/rss".to_string(),
            link: "https://example.com/hello".to_string(),
            publish_date: DateTime::parse_from_rfc3339("2006-01-02T15:04:05-07:00").unwrap(),
            description: "Body".to_string(),
        };

        let mut buf = Vec::new();
        write_item(&mut buf, &item).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert_eq!(
            text,
            "----- ITEM -----\n\
             Title=Hello\n\
             Source=Example\n\
             SourceURL=https://example.com/rss\n\
             Link=https://example.com/hello\n\
             PublishDate=2006-01-02 15:04:05 -0700\n\
             Description=Body\n\n"
        );
    }

    #[test]
    fn test_args_parse_urls_and_flags() {
        let args = Args::parse_from(["feedfold", "--json", "--partial", "https://a/rss", "https://b/rss"]);
        assert!(args.json);
        assert!(args.partial);
        assert!(!args.files);
        assert_eq!(args.urls, vec!["https://a/rss", "https://b/rss"]);
    }
}
