#[cfg(not(feature = "node"))]
fn main() {
    eprintln!("Build with --features node to enable the registry node.");
}

#[cfg(feature = "node")]
fn main() {
    use stakereg_core::node::config::GenesisConfig;
    use stakereg_core::node::http::start_http_server;
    use stakereg_core::node::service::{
        RegistrySnapshot, Service, ServiceConfig, SystemClock,
    };
    use stakereg_core::upgrade::UpgradeController;
    use std::env;
    use std::fs;
    use std::sync::{mpsc, Arc, RwLock};

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut genesis_path: Option<String> = None;
    let mut client_override: Option<String> = None;
    let mut data_dir_override: Option<String> = None;

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--genesis" => genesis_path = args.next(),
            "--client" => client_override = args.next(),
            "--data-dir" => data_dir_override = args.next(),
            _ => {
                eprintln!("unknown arg {}", arg);
                return;
            }
        }
    }

    let genesis_path = genesis_path.expect("missing --genesis");
    let genesis_bytes = fs::read_to_string(&genesis_path).expect("read genesis");
    let genesis: GenesisConfig =
        serde_json::from_str(&genesis_bytes).expect("parse genesis json");

    let client_addr = client_override.unwrap_or_else(|| genesis.client.listen_addr.clone());
    let data_dir =
        data_dir_override.unwrap_or_else(|| format!("data/{}", genesis.registry_id));

    let snapshot = Arc::new(RwLock::new(RegistrySnapshot::new()));
    let (tx_cmd, rx_cmd) = mpsc::channel();

    start_http_server(client_addr, Arc::clone(&snapshot), tx_cmd);

    // Migrations for this logic build get registered here before install.
    let upgrades = UpgradeController::new();

    let service = Service::new(
        genesis,
        ServiceConfig {
            data_dir: Some(data_dir),
        },
        snapshot,
        upgrades,
        Box::new(SystemClock),
    )
    .expect("service init");

    service.run(rx_cmd);
}
