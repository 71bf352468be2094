//! # Axiom - Semantic Coordinate Graph
//!
//! The driver binary for the `axiom-core` library.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                apps/axiom (THE BINARY)               │
//! │                                                      │
//! │  ┌─────────────┐   ┌──────────────┐   ┌──────────┐  │
//! │  │    CLI      │   │   Scripts    │   │  Config  │  │
//! │  │   (clap)    │   │ (serde_json) │   │  (toml)  │  │
//! │  └──────┬──────┘   └──────┬───────┘   └────┬─────┘  │
//! │         └─────────────────┼────────────────┘        │
//! │                           ▼                         │
//! │                   ┌───────────────┐                 │
//! │                   │  axiom-core   │                 │
//! │                   │  (THE LOGIC)  │                 │
//! │                   └───────────────┘                 │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! axiom demo
//! axiom run -f ops.json --json-mode
//! axiom coord 01-01-02-0001 --other 01-01-02-0002
//! axiom ledger -f ops.json -n 20
//! ```

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    let cli = axiom::cli::Cli::parse();

    // AXIOM_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("AXIOM_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let fallback = if cli.verbose {
        "axiom=debug,axiom_core=debug"
    } else {
        "axiom=info,axiom_core=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| fallback.into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = axiom::cli::execute(cli) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the Axiom startup banner.
fn print_banner() {
    println!(
        r#"
   █████╗ ██╗  ██╗██╗ ██████╗ ███╗   ███╗
  ██╔══██╗╚██╗██╔╝██║██╔═══██╗████╗ ████║
  ███████║ ╚███╔╝ ██║██║   ██║██╔████╔██║
  ██╔══██║ ██╔██╗ ██║██║   ██║██║╚██╔╝██║
  ██║  ██║██╔╝ ██╗██║╚██████╔╝██║ ╚═╝ ██║
  ╚═╝  ╚═╝╚═╝  ╚═╝╚═╝ ╚═════╝ ╚═╝     ╚═╝

  Semantic Coordinate Graph v{}

  Positional • Derived • Audited
"#,
        env!("CARGO_PKG_VERSION")
    );
}
