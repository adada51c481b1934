use std::collections::HashSet;
use std::env;
use std::path::PathBuf;

use serde::Deserialize;

use shellcache::{DiskStorage, NoHost, ResourceManifest, Worker, WorkerConfig};
use shellcache::store::CacheStorage;
use shellcache::url::resource_key;

/// CLI configuration file: worker settings plus the paths the library
/// deliberately knows nothing about.
#[derive(Debug, Deserialize)]
struct CliConfig {
    origin: String,
    /// Path to the deploy-time manifest JSON (key → fingerprint).
    manifest: PathBuf,
    #[serde(default = "default_cache_dir")]
    cache_dir: PathBuf,
    #[serde(default)]
    shell: Vec<String>,
    #[serde(default = "default_concurrent_fetches")]
    concurrent_fetches: usize,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".shellcache")
}

const fn default_concurrent_fetches() -> usize {
    4
}

fn print_usage() {
    eprintln!("Usage: shellcache <COMMAND> [OPTIONS]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  sync        Stage the shell and reconcile the cache against the manifest");
    eprintln!("  prefetch    Fetch every manifest resource not yet cached");
    eprintln!("  status      Show cached vs manifest resource counts");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -c, --config <PATH>   Config file (default: shellcache.toml)");
    eprintln!("  -h, --help            Show this help");
}

fn load_config(path: &PathBuf) -> shellcache::Result<CliConfig> {
    let contents = std::fs::read_to_string(path)?;
    toml::from_str(&contents).map_err(|e| {
        shellcache::Error::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("{}: {e}", path.display()),
        ))
    })
}

async fn build_worker(config: CliConfig) -> shellcache::Result<Worker<DiskStorage>> {
    let manifest_json = tokio::fs::read_to_string(&config.manifest).await?;
    let manifest = ResourceManifest::from_json(&manifest_json)?;
    log::info!(
        "loaded manifest with {} resources from {}",
        manifest.len(),
        config.manifest.display()
    );

    let worker_config = WorkerConfig::new(config.origin)
        .with_shell(config.shell)
        .with_concurrent_fetches(config.concurrent_fetches);
    let storage = DiskStorage::new(config.cache_dir);
    Ok(Worker::new(manifest, worker_config, storage))
}

async fn print_status(worker: &Worker<DiskStorage>) -> shellcache::Result<()> {
    let origin = &worker.config().origin;
    let mut cached = HashSet::new();
    for url in worker.storage().keys(&worker.config().content_store).await? {
        if let Some(key) = resource_key(origin, &url) {
            cached.insert(key);
        }
    }
    let missing = worker
        .manifest()
        .keys()
        .filter(|key| !cached.contains(*key))
        .count();

    println!("manifest resources: {}", worker.manifest().len());
    println!("cached resources:   {}", cached.len());
    println!("missing resources:  {missing}");
    Ok(())
}

#[tokio::main]
async fn main() -> shellcache::Result<()> {
    env_logger::init();

    let mut command: Option<String> = None;
    let mut config_path = PathBuf::from("shellcache.toml");

    let args: Vec<String> = env::args().skip(1).collect();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_usage();
                std::process::exit(0);
            }
            "-c" | "--config" => {
                i += 1;
                if i < args.len() {
                    config_path = PathBuf::from(&args[i]);
                } else {
                    eprintln!("Error: --config requires a value");
                    std::process::exit(1);
                }
            }
            arg if !arg.starts_with('-') && command.is_none() => {
                command = Some(arg.to_string());
            }
            arg => {
                eprintln!("Error: unexpected argument {arg:?}");
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let Some(command) = command else {
        print_usage();
        std::process::exit(1);
    };

    let config = load_config(&config_path)?;
    let worker = build_worker(config).await?;

    match command.as_str() {
        "sync" => {
            worker.install(&NoHost).await?;
            worker.activate(&NoHost).await;
            println!("cache synchronized ({} shell resources staged)", worker.config().shell.len());
            Ok(())
        }
        "prefetch" => {
            let count = worker.prefetch_missing().await?;
            println!("prefetched {count} resources");
            Ok(())
        }
        "status" => print_status(&worker).await,
        other => {
            eprintln!("Error: unknown command {other:?}");
            print_usage();
            std::process::exit(1);
        }
    }
}
