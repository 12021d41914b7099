use std::sync::Arc;

use cache_cluster::config::Config;
use cache_cluster::httpc::ReqwestClient;
use cache_cluster::master::{HttpDatabaseList, Master, StaticDatabaseList};
use cache_cluster::meta::MemoryMeta;
use cache_cluster::node::Node;

fn usage(program: &str) -> ! {
    eprintln!("Usage: {} master [--bind <addr:port>] [--dbs <url,url,...>] [--db-master <url>]", program);
    eprintln!("       {} node --http <addr:port> --node <addr:port> [--master <addr:port>]", program);
    eprintln!();
    eprintln!("Example: {} master --bind 127.0.0.1:5550 --dbs 127.0.0.1:9001,127.0.0.1:9002", program);
    eprintln!("Example: {} node --http 127.0.0.1:5241 --node 127.0.0.1:5242 --master 127.0.0.1:5550", program);
    std::process::exit(1);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let cfg = Config::from_env();
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        usage(&args[0]);
    }

    let mut bind: Option<String> = None;
    let mut http_addr: Option<String> = None;
    let mut node_addr: Option<String> = None;
    let mut master_addr: Option<String> = None;
    let mut dbs: Vec<String> = vec![];
    let mut db_master: Option<String> = None;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--bind" => {
                bind = Some(args[i + 1].clone());
                i += 2;
            }
            "--http" => {
                http_addr = Some(args[i + 1].clone());
                i += 2;
            }
            "--node" => {
                node_addr = Some(args[i + 1].clone());
                i += 2;
            }
            "--master" => {
                master_addr = Some(args[i + 1].clone());
                i += 2;
            }
            "--dbs" => {
                dbs = args[i + 1]
                    .split(',')
                    .filter(|db| !db.is_empty())
                    .map(|db| db.to_string())
                    .collect();
                i += 2;
            }
            "--db-master" => {
                db_master = Some(args[i + 1].clone());
                i += 2;
            }
            _ => {
                i += 1;
            }
        }
    }

    let http = Arc::new(ReqwestClient::new(cfg.http_request_timeout));

    match args[1].as_str() {
        "master" => {
            let bind = bind.unwrap_or_else(|| cfg.cache_master_addr.clone());
            let dbs_source: Arc<dyn cache_cluster::master::DatabaseList> =
                if let Some(db_master) = db_master {
                    HttpDatabaseList::new(&db_master, http.clone())
                } else {
                    if dbs.is_empty() {
                        tracing::warn!("no --dbs and no --db-master; nodes will see an empty database list");
                    }
                    StaticDatabaseList::new(dbs)
                };

            let meta = Arc::new(MemoryMeta::new());
            tracing::info!("starting master on {}", bind);
            let master = Master::new(&bind, &cfg, meta, dbs_source, http).await?;
            master.start().await
        }
        "node" => {
            let Some(http_addr) = http_addr else {
                usage(&args[0]);
            };
            let Some(node_addr) = node_addr else {
                usage(&args[0]);
            };
            let master_addr = master_addr.unwrap_or_else(|| cfg.cache_master_addr.clone());

            tracing::info!("starting node: api {} peers {}", http_addr, node_addr);
            let node = Node::new(&http_addr, &node_addr, &master_addr, &cfg, http);
            node.start().await
        }
        _ => usage(&args[0]),
    }
}
