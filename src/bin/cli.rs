//! memcluster CLI
//!
//! Command-line interface for poking at a memcached cluster.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use memcluster::cluster::PollOutcome;
use memcluster::{CacheItem, ClientConfig, ClusterClient, MutationMode, StoreMode};
use tracing_subscriber::{fmt, EnvFilter};

/// memcluster CLI
#[derive(Parser, Debug)]
#[command(name = "memcluster-cli")]
#[command(about = "CLI for memcached clusters with auto discovery")]
#[command(version)]
struct Args {
    /// Configuration endpoint (host:port) of an auto discovery cluster
    #[arg(short, long, conflicts_with = "server")]
    endpoint: Option<String>,

    /// Static server (host:port); may be repeated
    #[arg(short, long)]
    server: Vec<String>,

    /// Topology poll interval in milliseconds
    #[arg(long, default_value = "60000")]
    poll_ms: u64,

    /// SASL username
    #[arg(long, requires = "password")]
    username: Option<String>,

    /// SASL password
    #[arg(long)]
    password: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        key: String,
    },

    /// Set a key-value pair
    Set {
        key: String,
        value: String,

        /// Expiration in seconds, 0 for none
        #[arg(short = 't', long, default_value = "0")]
        expires: u32,

        #[arg(short, long, default_value = "0")]
        flags: u32,
    },

    /// Delete a key
    Delete {
        key: String,
    },

    /// Increment a counter
    Incr {
        key: String,

        #[arg(default_value = "1")]
        delta: u64,
    },

    /// Decrement a counter
    Decr {
        key: String,

        #[arg(default_value = "1")]
        delta: u64,
    },

    /// Print statistics of every node
    Stats {
        group: Option<String>,
    },

    /// Invalidate every item
    Flush {
        #[arg(default_value = "0")]
        delay: u32,
    },

    /// List the nodes of the cluster
    Nodes,

    /// Keep polling the topology and print changes
    Watch,
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,memcluster=info"));

    fmt().with_env_filter(filter).with_target(true).with_thread_ids(true).init();

    let args = Args::parse();

    let config = match build_config(&args) {
        Some(config) => config,
        None => {
            eprintln!("either --endpoint or at least one --server is required");
            std::process::exit(2);
        }
    };

    let client = match ClusterClient::new(config) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!("Failed to create client: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(&client, args.command) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn build_config(args: &Args) -> Option<ClientConfig> {
    let mut builder = ClientConfig::builder();

    if let Some(endpoint) = &args.endpoint {
        let (host, port) = match endpoint.rsplit_once(':') {
            Some((host, port)) => (host.to_string(), port.parse().ok()?),
            None => (endpoint.clone(), memcluster::DiscoveryConfig::DEFAULT_PORT),
        };
        builder = builder.discovery(host, port).poll_interval_ms(args.poll_ms);
    } else if args.server.is_empty() {
        return None;
    }

    for server in &args.server {
        builder = builder.server(server.clone());
    }

    if let (Some(username), Some(password)) = (&args.username, &args.password) {
        builder = builder.authentication("", username.clone(), password.clone());
    }

    Some(builder.build())
}

fn run(client: &ClusterClient, command: Commands) -> memcluster::Result<()> {
    match command {
        Commands::Get { key } => {
            let result = client.get(key)?;
            match result.value {
                Some(item) => println!("{}", String::from_utf8_lossy(&item.data)),
                None => println!("(nil) {}", result.result),
            }
        }
        Commands::Set {
            key,
            value,
            expires,
            flags,
        } => {
            let result = client.store(StoreMode::Set, key, CacheItem::new(flags, value), expires)?;
            println!("{}", result);
        }
        Commands::Delete { key } => {
            println!("{}", client.delete(key)?);
        }
        Commands::Incr { key, delta } => {
            print_counter(client.mutate(MutationMode::Increment, key, delta, delta, 0)?);
        }
        Commands::Decr { key, delta } => {
            print_counter(client.mutate(MutationMode::Decrement, key, 0, delta, 0)?);
        }
        Commands::Stats { group } => {
            for (endpoint, stats) in client.stats(group.as_deref()) {
                println!("{}", endpoint);
                let mut entries: Vec<_> = stats.into_iter().collect();
                entries.sort();
                for (name, value) in entries {
                    println!("  {} {}", name, value);
                }
            }
        }
        Commands::Flush { delay } => {
            println!("{}", client.flush(delay));
        }
        Commands::Nodes => print_nodes(client),
        Commands::Watch => watch(client),
    }

    Ok(())
}

fn print_counter(result: memcluster::ValueResult<u64>) {
    match result.value {
        Some(value) => println!("{}", value),
        None => println!("{}", result.result),
    }
}

fn print_nodes(client: &ClusterClient) {
    if let Some(discovery) = client.discovery() {
        println!("configuration version {}", discovery.cluster_version());
    }
    for node in client.server_pool().nodes() {
        let state = if node.is_alive() { "alive" } else { "dead" };
        println!("{} {}", node.endpoint(), state);
    }
}

fn watch(client: &ClusterClient) {
    client.on_node_failed(Arc::new(|node| {
        println!("node {} failed", node.endpoint());
    }));

    let Some(discovery) = client.discovery() else {
        print_nodes(client);
        return;
    };

    let interval = discovery.config().poll_interval().max(Duration::from_secs(1));
    print_nodes(client);

    loop {
        std::thread::sleep(interval);
        match memcluster::cluster::poll_once(discovery, client.server_pool()) {
            PollOutcome::Updated(count) => {
                println!("topology changed, {} nodes", count);
                print_nodes(client);
            }
            PollOutcome::Unchanged => {}
            PollOutcome::Degraded => println!("configuration unavailable, no nodes in use"),
        }
    }
}
