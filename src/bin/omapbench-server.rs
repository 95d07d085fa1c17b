use anyhow::Context;
use clap::Parser;
use log::{debug, error, info};
use omapbench::objectstore::ObjectStore;
use omapbench::server::{routes, ServerConfig, ServerConfigError};
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use warp::Filter;

#[derive(Debug, Parser)]
#[clap(name = "omapbench-server", about = "Object store server for omapbench")]
struct Opt {
    #[clap(value_parser)]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pretty_env_logger::init_custom_env("OMAPBENCH_SERVER_LOG");

    let opt = Opt::parse();
    let config = load_config(&opt.config)?;

    let addresses: Vec<SocketAddr> = config.address.to_socket_addrs()?.collect();
    if addresses.is_empty() {
        error!("specified address is empty set: {:?}", addresses);
        eprintln!("ERROR: server address is empty: {:?}", addresses);
        return Err(ServerConfigError::BadServerAddress.into());
    }

    let store = ObjectStore::open(&config.data)?;
    for pool in config.pools.iter() {
        store.create_pool(pool)?;
    }
    let store = Arc::new(Mutex::new(store));

    info!("omapbench server starting up");
    debug!("opt: {:#?}", opt);
    debug!("Configuration: {:#?}", config);

    let webroot = routes(store).with(warp::log("omapbench"));

    debug!("starting warp");
    match (config.tls_key, config.tls_cert) {
        (Some(key), Some(cert)) => {
            warp::serve(webroot)
                .tls()
                .key_path(key)
                .cert_path(cert)
                .run(addresses[0])
                .await
        }
        _ => warp::serve(webroot).run(addresses[0]).await,
    }
    Ok(())
}

fn load_config(filename: &Path) -> Result<ServerConfig, anyhow::Error> {
    let config = ServerConfig::read_config(filename).with_context(|| {
        format!(
            "Couldn't read default configuration file {}",
            filename.display()
        )
    })?;
    Ok(config)
}
