//! Blocking (lease-based mutual exclusion) replica server executable.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use env_logger::Env;

use tokio::runtime::Builder;

use quorumkv::{kv_error, kv_warn, serve, BlockingStore, KvError};

/// Command line arguments definition.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct CliArgs {
    /// Port to listen on (bound on 0.0.0.0).
    port: u16,
}

impl CliArgs {
    /// Sanitize command line arguments.
    fn sanitize(&self) -> Result<(), KvError> {
        if self.port <= 1024 {
            Err(KvError(format!("invalid port {}", self.port)))
        } else {
            Ok(())
        }
    }
}

// Server side executable main entrance.
fn server_main() -> Result<(), KvError> {
    // read in and parse command line arguments
    let args = CliArgs::parse();
    args.sanitize()?;

    // create tokio multi-threaded runtime
    let runtime = Builder::new_multi_thread()
        .enable_all()
        .thread_name("tokio-worker-blocking")
        .build()?;

    // enter tokio runtime and serve requests until killed
    runtime.block_on(serve(Arc::new(BlockingStore::new()), args.port))
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .format_module_path(false)
        .format_target(false)
        .init();

    if let Err(ref e) = server_main() {
        kv_error!("server_main exitted: {}", e);
        ExitCode::FAILURE
    } else {
        kv_warn!("server_main exitted successfully");
        ExitCode::SUCCESS
    }
}

#[cfg(test)]
mod server_args_tests {
    use super::*;

    #[test]
    fn sanitize_valid() {
        let args = CliArgs { port: 9002 };
        assert_eq!(args.sanitize(), Ok(()));
    }

    #[test]
    fn sanitize_invalid_port() {
        let args = CliArgs { port: 80 };
        assert!(args.sanitize().is_err());
    }
}
