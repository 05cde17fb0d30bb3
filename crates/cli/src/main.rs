use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use marginalia_core::{Controller, FetchConfig, PageContext, PageSource, ProviderConfig};
use owo_colors::OwoColorize;

mod echo;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Highlight key sentences and terms in a web article
#[derive(Parser, Debug)]
#[command(name = "marginalia")]
#[command(author = "Marginalia Contributors")]
#[command(version = VERSION)]
#[command(about = "Highlight key sentences and terms in web articles", long_about = None)]
struct Args {
    /// URL to fetch, local HTML file, or "-" for stdin
    #[arg(value_name = "INPUT")]
    input: String,

    /// Output file for the annotated page (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// API key for the model service
    #[arg(long, env = "MARGINALIA_API_KEY", value_name = "KEY", hide_env_values = true)]
    api_key: String,

    /// Chat-completions endpoint URL
    #[arg(
        long,
        default_value = "https://api.deepseek.com/v1/chat/completions",
        value_name = "URL"
    )]
    endpoint: String,

    /// Model identifier
    #[arg(long, default_value = "deepseek-chat", value_name = "MODEL")]
    model: String,

    /// Model request timeout in seconds
    #[arg(long, default_value = "120", value_name = "SECS")]
    timeout: u64,

    /// HTTP timeout for fetching the page, in seconds
    #[arg(long, default_value = "30", value_name = "SECS")]
    fetch_timeout: u64,

    /// Custom User-Agent for page fetches
    #[arg(long, value_name = "UA")]
    user_agent: Option<String>,

    /// Print the pass report as JSON to stderr
    #[arg(long)]
    report: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("marginalia_core=debug,marginalia=debug"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.verbose {
        echo::print_banner();
        init_logging();
    }

    let source = PageSource::parse(&args.input).context("Unusable input")?;

    if args.verbose {
        echo::print_step(1, 4, &format!("Loading page from {}", args.input.bright_white()));
    }

    let fetch_config = FetchConfig {
        timeout: args.fetch_timeout,
        user_agent: args
            .user_agent
            .unwrap_or_else(|| FetchConfig::default().user_agent),
    };
    let html = source.load(&fetch_config).await.context("Failed to load page")?;

    if args.verbose {
        echo::print_detail("Size", &echo::format_size(html.len()));
    }

    let page = PageContext {
        html,
        source_url: source.url().cloned(),
        provider: ProviderConfig {
            endpoint: args.endpoint,
            api_key: args.api_key,
            model: args.model,
            timeout: args.timeout,
        },
    };

    if args.verbose {
        echo::print_step(2, 4, "Requesting analysis");
    }

    let mut controller = Controller::new(page);
    controller
        .trigger_analysis()
        .await
        .context("Failed to trigger analysis")?;

    if args.verbose {
        echo::print_step(3, 4, "Waiting for highlights");
    }

    let annotated = controller.recv_outcome().await.context("Analysis failed")?;

    if args.verbose {
        echo::print_detail("Paragraphs", &annotated.report.paragraphs.to_string());
        echo::print_detail("Matched", &annotated.report.matched.to_string());
        if annotated.report.skipped > 0 {
            echo::print_warning(&format!("{} highlight(s) had no match", annotated.report.skipped));
        }
    }

    if args.report {
        eprintln!("{}", annotated.report.to_json());
    }

    if args.verbose {
        echo::print_step(4, 4, "Writing annotated page");
    }

    match args.output {
        Some(path) => {
            fs::write(&path, annotated.html)
                .with_context(|| format!("Failed to write to file: {}", path.display()))?;
            echo::print_success(&format!("Annotated page written to {}", path.display().bright_white()));
        }
        None => {
            print!("{}", annotated.html);
        }
    }

    if args.verbose {
        echo::print_info("Done");
    }

    Ok(())
}
