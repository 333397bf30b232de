//! `travel` binary: runs either one resource shard or the coordinator

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;
use travel_common::ShardKind;
use travel_coordinator::{CoordinatorConfig, CoordinatorServer, ShardSet};
use travel_shard::{ShardConfig, ShardServer};

#[derive(Parser, Debug)]
#[command(version, about = "Distributed travel reservations with 2PL and 2PC")]
struct Args {
    #[arg(long, help = "Enable debug logging", default_value = "false", global = true)]
    debug: bool,

    #[command(subcommand)]
    role: Role,
}

#[derive(Subcommand, Debug)]
enum Role {
    /// Serve one class of records (flight, car, room or customer)
    Shard {
        #[arg(long, value_name = "kind")]
        kind: ShardKind,

        #[arg(
            long,
            value_name = "listen-address",
            help = "Listen address, defaults to 0.0.0.0 on the kind's port"
        )]
        listen: Option<SocketAddr>,

        #[arg(long, value_name = "snapshot", help = "JSON snapshot to preload")]
        seed: Option<PathBuf>,
    },

    /// Accept client transactions and drive them across the shards
    Coordinator {
        #[arg(long, value_name = "listen-address", default_value = "0.0.0.0:3035")]
        listen: SocketAddr,

        #[arg(long, value_name = "host:port", default_value = "localhost:5001")]
        flight: String,

        #[arg(long, value_name = "host:port", default_value = "localhost:5002")]
        car: String,

        #[arg(long, value_name = "host:port", default_value = "localhost:5003")]
        room: String,

        #[arg(long, value_name = "host:port", default_value = "localhost:5004")]
        customer: String,

        #[arg(long, help = "Worker pool size", default_value = "4")]
        workers: usize,

        #[arg(long, help = "Transaction queue capacity", default_value = "1024")]
        queue_capacity: usize,
    },
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), eyre::Error> {
    color_eyre::install()?;
    let args = Args::parse();

    let main_subscriber = tracing_subscriber::fmt()
        .compact()
        .with_ansi(true)
        .with_file(true)
        .with_line_number(true)
        .with_thread_names(true)
        .with_max_level(if args.debug {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .finish();
    tracing::subscriber::set_global_default(main_subscriber)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, stopping...");
            let _ = shutdown_tx.send(true);
        }
    });

    match args.role {
        Role::Shard { kind, listen, seed } => {
            let mut config = ShardConfig::new(kind);
            if let Some(listen) = listen {
                config.listen = listen;
            }
            config.seed = seed;

            let store = Arc::new(config.open_store()?);
            let server = ShardServer::bind(config.listen, store).await?;
            server.run(shutdown_rx).await?;
        }
        Role::Coordinator {
            listen,
            flight,
            car,
            room,
            customer,
            workers,
            queue_capacity,
        } => {
            let config = CoordinatorConfig {
                listen,
                workers,
                queue_capacity,
                ..CoordinatorConfig::default()
            }
            .with_endpoint(ShardKind::Flight, flight)
            .with_endpoint(ShardKind::Car, car)
            .with_endpoint(ShardKind::Room, room)
            .with_endpoint(ShardKind::Customer, customer);

            let shards = ShardSet::connect(&config)?;
            let server = CoordinatorServer::bind(&config, shards).await?;
            server.run(shutdown_rx).await?;
        }
    }

    info!("Done.");
    Ok(())
}
