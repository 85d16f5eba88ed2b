mod client;
mod exit;
mod logging;
mod server;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::{ArgGroup, Parser};

use crate::exit::{CliError, CliResult, FAILURE};
use crate::logging::init_logging;

#[derive(Parser, Debug)]
#[command(
    name = "pclipsync",
    version,
    about = "Synchronize X11 clipboard selections between machines over an SSH-tunneled socket",
    group(ArgGroup::new("mode").required(true).args(["server", "client"]))
)]
struct Cli {
    /// Run in server mode (listen and accept one peer).
    #[arg(long)]
    server: bool,

    /// Run in client mode (connect with automatic retry).
    #[arg(long)]
    client: bool,

    /// Unix domain socket path.
    #[arg(long, value_name = "PATH")]
    socket: PathBuf,

    /// Enable DEBUG-level logging.
    #[arg(long, short = 'v')]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let shutdown = Arc::new(AtomicBool::new(false));
    if let Err(err) = install_signal_handler(shutdown.clone()) {
        eprintln!("error: {err}");
        std::process::exit(err.code);
    }

    let result = if cli.server {
        server::run(&cli.socket, shutdown)
    } else {
        client::run(&cli.socket, shutdown)
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

/// SIGINT and SIGTERM request cooperative shutdown: the event loop finishes
/// the current event, releases its resources and exits 0.
fn install_signal_handler(shutdown: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        shutdown.store(true, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(FAILURE, format!("signal handler setup failed: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_server_mode() {
        let cli = Cli::try_parse_from(["pclipsync", "--server", "--socket", "/tmp/clip.sock"])
            .expect("server args should parse");
        assert!(cli.server);
        assert!(!cli.client);
        assert_eq!(cli.socket, PathBuf::from("/tmp/clip.sock"));
    }

    #[test]
    fn parses_client_mode_with_verbose() {
        let cli = Cli::try_parse_from([
            "pclipsync",
            "--client",
            "--socket",
            "/tmp/clip.sock",
            "--verbose",
        ])
        .expect("client args should parse");
        assert!(cli.client);
        assert!(cli.verbose);
    }

    #[test]
    fn rejects_missing_mode() {
        let err = Cli::try_parse_from(["pclipsync", "--socket", "/tmp/clip.sock"])
            .expect_err("missing mode should fail");
        assert_eq!(
            err.kind(),
            clap::error::ErrorKind::MissingRequiredArgument
        );
    }

    #[test]
    fn rejects_both_modes() {
        let err = Cli::try_parse_from([
            "pclipsync",
            "--server",
            "--client",
            "--socket",
            "/tmp/clip.sock",
        ])
        .expect_err("conflicting modes should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn rejects_missing_socket() {
        let err = Cli::try_parse_from(["pclipsync", "--server"])
            .expect_err("missing socket should fail");
        assert_eq!(
            err.kind(),
            clap::error::ErrorKind::MissingRequiredArgument
        );
    }
}
