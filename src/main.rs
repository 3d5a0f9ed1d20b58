use clap::{Parser, Subcommand};
use scripture_viewer::loader::FsFetcher;
use scripture_viewer::navigation::{QueryParams, resolve_with_default};
use scripture_viewer::prefs::JsonFileStore;
use scripture_viewer::viewer::Viewer;
use scripture_viewer::{audit, config, output};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use url::Url;

#[derive(Parser)]
#[command(name = "scripture-viewer")]
#[command(about = "Query-driven viewer for chapter-by-chapter Bible study sites")]
#[command(long_about = "\
Query-driven viewer for chapter-by-chapter Bible study sites

The URL query is the whole navigation state. `book`, `chapter`, `tab` and
`doc` resolve to one HTML fragment under the site's books directory, which
is mounted into the viewer shell and enhanced in place.

Site structure:

  site/
  ├── config.toml                         # Viewer config (optional)
  ├── assets/bibles-json/
  │   ├── nkjv/titus.json                 # Verse data per translation and book
  │   └── nlt/titus.json
  └── books/
      ├── new-testament/titus/
      │   ├── 000-book/titus-0-book-introduction.html
      │   └── 001/
      │       ├── titus-1-chapter-scripture.html
      │       ├── titus-1-chapter-explanation.html
      │       └── titus-1-g96.html         # Word study
      └── old-testament/obadiah/001/
          └── obadiah-1-resources-idols.html

Queries:
  book=titus&chapter=1&tab=chapter_explanation
  doc=obadiah-1-resources-idols.html      # book, chapter and tab inferred
  book=titus&chapter=0&tab=book_home      # hero state, nothing loaded

Run 'scripture-viewer gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Site root directory
    #[arg(long, default_value = ".", global = true)]
    site: PathBuf,

    /// Origin and page the viewer runs on
    #[arg(long, default_value = "http://localhost/view.html", global = true)]
    page: Url,

    /// Log decisions to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the navigation state and document a query resolves to
    Resolve {
        /// Query string, e.g. "book=titus&chapter=1"
        query: String,
    },
    /// Load a query through the site and print the mounted HTML
    Render {
        query: String,
        /// Print a complete HTML page instead of the mount's contents
        #[arg(long)]
        full_page: bool,
    },
    /// Check that every fragment under books/ sits at its resolved path
    Check,
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn init_logging(verbose: bool) {
    let fallback = if verbose { "scripture_viewer=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback.into()))
        .init();
}

/// `page` with its query replaced by `query`.
fn page_with_query(page: &Url, query: &str) -> Url {
    QueryParams::parse(query).apply_to(page)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Resolve { query } => {
            let config = config::load_config(&cli.site)?;
            let resolution =
                resolve_with_default(&QueryParams::parse(&query), &config.default_book);
            let url = resolution.canonical_query.apply_to(&cli.page);
            output::print_resolve_output(&resolution, &url);
        }
        Command::Render { query, full_page } => {
            let config = config::load_config(&cli.site)?;
            let prefs_path = cli.site.join(&config.preferences.file);
            info!(site = %cli.site.display(), "rendering");
            let mut viewer = Viewer::new(
                &config,
                page_with_query(&cli.page, &query),
                Box::new(FsFetcher::new(&cli.site)),
                Box::new(JsonFileStore::new(prefs_path)),
            );
            let outcome = viewer.navigate();
            output::print_load_outcome(&outcome);
            if full_page {
                println!("{}", viewer.page_html());
            } else {
                println!("{}", viewer.mount_html());
            }
        }
        Command::Check => {
            println!("==> Checking {}", cli.site.display());
            let report = audit::audit_site(&cli.site)?;
            output::print_check_output(&report);
            if !report.is_clean() {
                return Err("site has misplaced or unrecognized fragments".into());
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn version_is_package_version() {
        let cmd = Cli::command();
        assert_eq!(cmd.get_version(), Some(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn render_takes_query_and_full_page_flag() {
        let cli = Cli::try_parse_from([
            "scripture-viewer",
            "--site",
            "site",
            "render",
            "book=titus&chapter=1",
            "--full-page",
        ])
        .unwrap();
        assert_eq!(cli.site, PathBuf::from("site"));
        assert!(matches!(cli.command, Command::Render { full_page: true, .. }));
    }
}
