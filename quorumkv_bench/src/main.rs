//! QuorumKV workload driver executable.

mod stats;

use std::collections::HashSet;
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use clap::error::ErrorKind;
use clap::Parser;

use env_logger::Env;

use futures::future::join_all;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use tokio::runtime::Builder;
use tokio::time::Instant;

use quorumkv::{
    kv_error, kv_info, parse_servers, ClientId, KvError, KvProtocol,
};

use crate::stats::summarize;

/// Command line arguments definition.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct CliArgs {
    /// Protocol to drive: 'abd' or 'blocking'.
    protocol: String,

    /// Number of concurrent client tasks.
    num_clients: u64,

    /// Operations issued by each client.
    ops_per_client: u64,

    /// Fraction of operations that are GETs, in [0, 1].
    get_fraction: f64,

    /// Number of distinct keys in the synthetic keyspace.
    num_keys: u64,

    /// Replica endpoints as 'ip:port', in shared index order.
    #[arg(required = true)]
    servers: Vec<String>,
}

impl CliArgs {
    /// Sanitize command line arguments, returning the parsed protocol and
    /// replica addresses on success.
    fn sanitize(&self) -> Result<(KvProtocol, Vec<SocketAddr>), KvError> {
        let protocol =
            KvProtocol::parse_name(&self.protocol).ok_or_else(|| {
                KvError(format!(
                    "protocol name '{}' unrecognized",
                    self.protocol
                ))
            })?;

        if !(0.0..=1.0).contains(&self.get_fraction) {
            return Err(KvError(format!(
                "invalid get_fraction {}",
                self.get_fraction
            )));
        }
        if self.num_keys == 0 {
            return Err(KvError(format!("invalid num_keys {}", self.num_keys)));
        }

        // check for duplicate servers
        let mut server_set = HashSet::new();
        for s in self.servers.iter() {
            if server_set.contains(s) {
                return Err(KvError(format!(
                    "duplicate server address {} given",
                    s
                )));
            }
            server_set.insert(s.clone());
        }

        let servers = parse_servers(&self.servers)?;
        Ok((protocol, servers))
    }
}

/// Success/failure tallies shared across client tasks.
#[derive(Default)]
struct Counters {
    succ_get: AtomicU64,
    succ_put: AtomicU64,
    fail: AtomicU64,
}

/// One client task: a private protocol core, a decorrelated RNG, and a loop
/// of randomly mixed operations with per-op latency recording.
#[allow(clippy::too_many_arguments)]
async fn client_worker(
    id: ClientId,
    protocol: KvProtocol,
    servers: Vec<SocketAddr>,
    ops: u64,
    get_fraction: f64,
    num_keys: u64,
    counters: Arc<Counters>,
    get_lats: Arc<Mutex<Vec<f64>>>,
    put_lats: Arc<Mutex<Vec<f64>>>,
) -> Result<(), KvError> {
    let client = protocol.new_client(id, servers)?;
    let mut rng = StdRng::seed_from_u64(
        rand::random::<u64>() ^ id.wrapping_mul(0x9e3779b97f4a7c15),
    );

    for _ in 0..ops {
        let key = format!("key{}", rng.gen_range(0..num_keys));

        if rng.gen::<f64>() < get_fraction {
            let start = Instant::now();
            let ok = client.get(&key).await.is_ok();
            let lat_us = start.elapsed().as_secs_f64() * 1_000_000.0;

            get_lats
                .lock()
                .expect("latency mutex poisoned")
                .push(lat_us);
            if ok {
                counters.succ_get.fetch_add(1, Ordering::Relaxed);
            } else {
                counters.fail.fetch_add(1, Ordering::Relaxed);
            }
        } else {
            let value = format!("v{}_{}", id, rng.gen_range(0..1_000_000));
            let start = Instant::now();
            let ok = client.put(&key, &value).await.is_ok();
            let lat_us = start.elapsed().as_secs_f64() * 1_000_000.0;

            put_lats
                .lock()
                .expect("latency mutex poisoned")
                .push(lat_us);
            if ok {
                counters.succ_put.fetch_add(1, Ordering::Relaxed);
            } else {
                counters.fail.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    Ok(())
}

/// Parses command line arguments, passing `--help`/`--version` output
/// through and mapping genuine argument errors to `KvError` so that the
/// process exits with code 1.
fn parse_args() -> Result<Option<CliArgs>, KvError> {
    match CliArgs::try_parse() {
        Ok(args) => Ok(Some(args)),
        Err(e) if e.kind() == ErrorKind::DisplayHelp
            || e.kind() == ErrorKind::DisplayVersion =>
        {
            e.print()?;
            Ok(None)
        }
        Err(e) => Err(KvError::msg(e)),
    }
}

// Workload driver executable main entrance.
fn driver_main() -> Result<(), KvError> {
    // read in and parse command line arguments
    let args = match parse_args()? {
        Some(args) => args,
        None => return Ok(()),
    };
    let (protocol, servers) = args.sanitize()?;

    kv_info!("driving {} x {} {:?} ops over {} keys against {} replicas",
             args.num_clients, args.ops_per_client, protocol,
             args.num_keys, servers.len());

    // create tokio multi-threaded runtime
    let runtime = Builder::new_multi_thread()
        .enable_all()
        .thread_name("tokio-worker-bench")
        .build()?;

    // enter tokio runtime, run all client tasks to completion
    runtime.block_on(async move {
        let counters = Arc::new(Counters::default());
        let get_lats = Arc::new(Mutex::new(Vec::new()));
        let put_lats = Arc::new(Mutex::new(Vec::new()));

        let start = Instant::now();
        let handles: Vec<_> = (1..=args.num_clients)
            .map(|id| {
                tokio::spawn(client_worker(
                    id,
                    protocol,
                    servers.clone(),
                    args.ops_per_client,
                    args.get_fraction,
                    args.num_keys,
                    counters.clone(),
                    get_lats.clone(),
                    put_lats.clone(),
                ))
            })
            .collect();
        for joined in join_all(handles).await {
            joined??;
        }
        let elapsed = start.elapsed();

        // aggregate and print the report
        let succ_get = counters.succ_get.load(Ordering::Relaxed);
        let succ_put = counters.succ_put.load(Ordering::Relaxed);
        let fail = counters.fail.load(Ordering::Relaxed);
        let attempted = args.num_clients * args.ops_per_client;

        let mut get_samples =
            std::mem::take(&mut *get_lats.lock().expect("latency mutex poisoned"));
        let mut put_samples =
            std::mem::take(&mut *put_lats.lock().expect("latency mutex poisoned"));
        let get_summary = summarize(&mut get_samples);
        let put_summary = summarize(&mut put_samples);

        let elapsed_s = elapsed.as_secs_f64();
        let throughput = if elapsed_s > 0.0 {
            (succ_get + succ_put) as f64 / elapsed_s
        } else {
            0.0
        };

        println!("[{} workload] completed", args.protocol);
        println!("  GET success:   {}", succ_get);
        println!("  PUT success:   {}", succ_put);
        println!("  FAIL count:    {}", fail);
        println!("  ops attempted: {}", attempted);
        println!("  ops succeeded: {}", succ_get + succ_put);
        println!("  elapsed:       {:.3} s", elapsed_s);
        println!("  throughput:    {:.1} ops/s", throughput);
        println!("--- latency (microseconds) ---");
        println!(
            "  GET median: {:>10.1}   p95: {:>10.1}   ({} samples)",
            get_summary.median, get_summary.p95, get_summary.count
        );
        println!(
            "  PUT median: {:>10.1}   p95: {:>10.1}   ({} samples)",
            put_summary.median, put_summary.p95, put_summary.count
        );

        Ok::<(), KvError>(()) // give type hint for this async closure
    })
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .format_module_path(false)
        .format_target(false)
        .init();

    if let Err(ref e) = driver_main() {
        kv_error!("driver_main exitted: {}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
