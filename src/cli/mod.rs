//! Command Line Interface module
//!
//! Argument parsing for wsrelay.

use clap::Parser;

use crate::config::Config;

#[derive(Parser, Debug, Clone)]
#[command(name = "wsrelay")]
#[command(about = "Interactive WebSocket console relay")]
#[command(
    long_about = "Sends each line typed on stdin to a WebSocket peer and prints every frame received.\n\
                  A line of the form send_file('<path>') sends the file as one binary frame."
)]
#[command(version)]
pub struct Cli {
    /// The URL to connect to
    #[arg(short = 'u', long = "url", value_name = "URL")]
    pub url: String,

    /// The origin to use in the WS request
    #[arg(short = 'o', long, value_name = "URL")]
    pub origin: Option<String>,

    /// Headers to use in the WS request, can be used multiple times.
    /// Example: -H "Sample-Header-1: foo" -H "Sample-Header-2: bar"
    #[arg(short = 'H', long = "header", value_name = "HEADER")]
    pub headers: Vec<String>,

    /// Configuration file path
    #[arg(long, default_value = "wsrelay.toml")]
    pub config_file: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Close the session when stdin reaches end of input
    #[arg(long)]
    pub close_on_eof: bool,

    /// Disable coloured prefixes
    #[arg(long)]
    pub no_color: bool,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Log level from flags, falling back to the configuration file
    pub fn effective_log_level(&self, config: &Config) -> String {
        if self.verbose {
            "debug".to_string()
        } else {
            self.log_level
                .clone()
                .unwrap_or_else(|| config.log_level.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_headers_keep_order() {
        let cli = Cli::try_parse_from([
            "wsrelay",
            "-u",
            "ws://localhost:9000/ws",
            "-H",
            "Sample-Header-1: foo",
            "-H",
            "Sample-Header-2: bar",
            "-o",
            "http://localhost",
        ])
        .unwrap();

        assert_eq!(cli.url, "ws://localhost:9000/ws");
        assert_eq!(
            cli.headers,
            vec!["Sample-Header-1: foo", "Sample-Header-2: bar"]
        );
        assert_eq!(cli.origin.as_deref(), Some("http://localhost"));
        assert!(!cli.close_on_eof);
    }

    #[test]
    fn test_url_is_required() {
        assert!(Cli::try_parse_from(["wsrelay"]).is_err());
    }

    #[test]
    fn test_effective_log_level() {
        let mut config = Config::default();
        config.log_level = "warn".to_string();

        let cli = Cli::try_parse_from(["wsrelay", "-u", "ws://x"]).unwrap();
        assert_eq!(cli.effective_log_level(&config), "warn");

        let cli = Cli::try_parse_from(["wsrelay", "-u", "ws://x", "--log-level", "trace"]).unwrap();
        assert_eq!(cli.effective_log_level(&config), "trace");

        let cli = Cli::try_parse_from(["wsrelay", "-u", "ws://x", "-v"]).unwrap();
        assert_eq!(cli.effective_log_level(&config), "debug");
    }
}
