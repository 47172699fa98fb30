//! Looks pokemon up through a `ResourceCache`, the way a suspense-driven UI would.
//!
//! ```text
//! cargo run --example pokemon_cache -- pikachu Mew PIKACHU --fetch-delay-ms 800
//! ```

use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use suspense_resource_cache::{fetch_fn, ConfigLoader, ReadError, ResourceCache};
use tokio::time::sleep;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(about = "Fetch pokemon through an expiring resource cache")]
struct Args {
    /// Names to look up, in order. Repeats are served from the cache.
    #[arg(required = true)]
    names: Vec<String>,

    /// Simulated latency of every fetch.
    #[arg(long, default_value_t = 500)]
    fetch_delay_ms: u64,

    /// Give up waiting on a single lookup after this long.
    #[arg(long, default_value_t = 4000)]
    timeout_ms: u64,

    /// Idle for this long after the lookups and report what the sweep evicted.
    #[arg(long, default_value_t = 0)]
    linger_ms: u64,
}

#[derive(Debug, Clone)]
struct Pokemon {
    name: String,
    number: u32,
    kind: &'static str,
}

fn lookup(name: &str) -> Result<Pokemon, String> {
    let (number, kind) = match name.to_lowercase().as_str() {
        "bulbasaur" => (1, "grass"),
        "charmander" => (4, "fire"),
        "squirtle" => (7, "water"),
        "pikachu" => (25, "electric"),
        "mew" => (151, "psychic"),
        _ => return Err(format!("Unsupported pokemon: \"{name}\". Try \"pikachu\".")),
    };
    Ok(Pokemon {
        name: name.to_string(),
        number,
        kind,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let config = ConfigLoader::load().context("Failed to load cache configuration")?;
    info!(?config, "using cache configuration");

    let delay = Duration::from_millis(args.fetch_delay_ms);
    let fetcher = fetch_fn(move |name: String| async move {
        sleep(delay).await;
        lookup(&name)
    });
    let cache = ResourceCache::new(fetcher, config)?;
    let timeout = Duration::from_millis(args.timeout_ms);

    for name in &args.names {
        let resource = cache.get(name).await;
        let outcome = match resource.read() {
            Ok(pokemon) => Ok(pokemon),
            Err(err) if err.is_pending() => {
                println!("Loading {name}...");
                resource.wait_timeout(timeout).await.map_err(|err| {
                    let reason = err.to_string();
                    // Show the fetcher's own message when there is one.
                    err.into_failure().unwrap_or(reason)
                })
            }
            Err(ReadError::Failed(message)) => Err(message),
            Err(err) => Err(err.to_string()),
        };

        match outcome {
            Ok(pokemon) => println!("#{:03} {} ({})", pokemon.number, pokemon.name, pokemon.kind),
            Err(err) => println!("There was an error: {err}"),
        }
    }

    if args.linger_ms > 0 {
        sleep(Duration::from_millis(args.linger_ms)).await;
    }

    let stats = cache.stats().await;
    println!(
        "cached: {}, hits: {}, misses: {}, evicted: {}",
        cache.len().await,
        stats.hits,
        stats.misses,
        stats.evictions
    );
    Ok(())
}
