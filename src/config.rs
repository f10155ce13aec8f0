// Application configuration, loaded from environment variables and CLI flags.

use std::path::PathBuf;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Database URL (SQLite connection string).
    pub database_url: String,
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Directory containing `<language>.txt` dictionary files.
    pub words_dir: PathBuf,
}

impl Config {
    /// Load configuration from environment variables and CLI arguments.
    ///
    /// Environment variables:
    /// - `DATABASE_URL` - SQLite connection string (default: `sqlite:kaladont.db?mode=rwc`)
    /// - `PORT` - HTTP server port (default: 3000)
    /// - `WORDS_DIR` - Path to the dictionary directory (default: `data/words`)
    ///
    /// CLI flags:
    /// - `--port <PORT>` - Override the port
    /// - `--words-dir <DIR>` - Override the dictionary directory
    pub fn load() -> Self {
        let args: Vec<String> = std::env::args().collect();

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite:kaladont.db?mode=rwc".to_string());

        // Port: CLI flag --port takes precedence, then env var, then default
        let port = Self::parse_cli_value(&args, "--port")
            .and_then(|v| v.parse().ok())
            .or_else(|| std::env::var("PORT").ok().and_then(|v| v.parse().ok()))
            .unwrap_or(3000);

        let words_dir = Self::parse_cli_value(&args, "--words-dir")
            .map(PathBuf::from)
            .or_else(|| std::env::var("WORDS_DIR").ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("data/words"));

        Config {
            database_url,
            port,
            words_dir,
        }
    }

    /// Parse a CLI flag value like `--port 8080`.
    fn parse_cli_value(args: &[String], flag: &str) -> Option<String> {
        args.windows(2).find_map(|pair| {
            if pair[0] == flag {
                Some(pair[1].clone())
            } else {
                None
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cli_value() {
        let args: Vec<String> = ["prog", "--port", "8080", "--words-dir", "/tmp/words"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(Config::parse_cli_value(&args, "--port").as_deref(), Some("8080"));
        assert_eq!(
            Config::parse_cli_value(&args, "--words-dir").as_deref(),
            Some("/tmp/words")
        );
        assert_eq!(Config::parse_cli_value(&args, "--missing"), None);
    }
}
