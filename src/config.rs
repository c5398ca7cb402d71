use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "homeworkd", version, about = "School homework tracking backend")]
pub struct Cli {
    /// Workspace directory holding the data file. Opened at startup when set.
    #[arg(long, env = "HOMEWORK_WORKSPACE", global = true)]
    pub workspace: Option<PathBuf>,

    /// Backend base URL used in api mode.
    #[arg(long, env = "HOMEWORK_API_URL", global = true)]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// JSON-lines requests on stdin, one response per line on stdout.
    Stdio,
    /// Serve the request envelope over HTTP.
    Serve {
        #[arg(long, env = "HOMEWORK_BIND", default_value = "127.0.0.1:8787")]
        bind: String,
    },
    /// Send a single action through the client facade and print the reply.
    Call {
        action: String,
        /// JSON object of action params.
        #[arg(long, default_value = "{}")]
        params: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_stdio_and_parses_subcommands() {
        let cli = Cli::parse_from(["homeworkd"]);
        assert!(cli.command.is_none());

        let cli = Cli::parse_from(["homeworkd", "--workspace", "/tmp/ws", "serve", "--bind", "0.0.0.0:9000"]);
        assert_eq!(cli.workspace, Some(PathBuf::from("/tmp/ws")));
        assert!(matches!(cli.command, Some(Command::Serve { ref bind }) if bind == "0.0.0.0:9000"));

        let cli = Cli::parse_from(["homeworkd", "call", "health", "--params", r#"{"a":1}"#]);
        match cli.command {
            Some(Command::Call { action, params }) => {
                assert_eq!(action, "health");
                assert_eq!(params, r#"{"a":1}"#);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
