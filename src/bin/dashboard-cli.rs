use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::Value;

use dashboard_client::config::load_config;
use dashboard_client::http::{BatchItem, FileUpload, ProgressCallback, Query, RequestOptions, ResponseBody};
use dashboard_client::lifecycle::{wait_for_signal, Shutdown};
use dashboard_client::notifications::NotificationPoller;
use dashboard_client::notify::{Notifier, TracingNotifier};
use dashboard_client::observability::init_logging;
use dashboard_client::storage::{FileStore, KeyValueStore, MemoryStore};
use dashboard_client::{ApiClient, DashboardConfig};

#[derive(Parser)]
#[command(name = "dashboard-cli")]
#[command(about = "Command-line client for the social media dashboard API", long_about = None)]
struct Cli {
    /// Backend base URL (overrides the config file)
    #[arg(short, long)]
    url: Option<String>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// GET a path
    Get {
        path: String,
        /// Query parameter as key=value
        #[arg(short, long = "query", value_parser = parse_pair)]
        query: Vec<(String, String)>,
        /// Give up after this many milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Call a named operation, e.g. `posts.publish -p id=3`
    Call {
        operation: String,
        #[arg(short, long = "param", value_parser = parse_pair)]
        params: Vec<(String, String)>,
        /// JSON request body
        #[arg(short, long)]
        data: Option<String>,
    },
    /// Upload a file as multipart form data
    Upload {
        path: String,
        file: PathBuf,
        /// Extra form field as key=value
        #[arg(short, long = "field", value_parser = parse_pair)]
        fields: Vec<(String, String)>,
    },
    /// GET several paths concurrently
    Batch { paths: Vec<String> },
    /// List the known operations
    Endpoints,
    /// Poll for new notifications until Ctrl-C
    WatchNotifications,
}

fn parse_pair(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{}'", s))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => DashboardConfig::default(),
    };
    if let Some(url) = cli.url {
        config.client.base_url = url;
    }
    init_logging(&config.observability.log_level);

    let notifier: Arc<dyn Notifier> = Arc::new(TracingNotifier);
    let client = Arc::new(ApiClient::from_config(&config, notifier.clone())?);

    match cli.command {
        Commands::Get { path, query, timeout_ms } => {
            let query: Query = query.into_iter().collect();
            let url = query.append_to(&path);
            let timeout = timeout_ms.map(Duration::from_millis);
            let envelope = client
                .request_with_timeout(&url, RequestOptions::new(), timeout)
                .await?;
            print_body(&envelope.data)?;
        }
        Commands::Call { operation, params, data } => {
            let params: Query = params.into_iter().collect();
            let data = data.map(|d| serde_json::from_str::<Value>(&d)).transpose()?;
            let body = client.call(&operation, &params, data).await?;
            print_body(&body)?;
        }
        Commands::Upload { path, file, fields } => {
            let upload = FileUpload::from_path(&file).await?;
            let on_progress: ProgressCallback = Arc::new(|percent, loaded, total| {
                eprintln!("{:>6.1}% ({}/{} bytes)", percent, loaded, total);
            });
            let envelope = client.upload(&path, upload, fields, Some(on_progress)).await?;
            print_body(&envelope.data)?;
        }
        Commands::Batch { paths } => {
            let items = paths.into_iter().map(BatchItem::get).collect();
            for result in client.batch(items).await {
                match (result.data, result.error) {
                    (Some(data), _) => {
                        println!("{} ok", result.request.url);
                        print_body(&data)?;
                    }
                    (None, Some(error)) => println!("{} failed: {}", result.request.url, error),
                    (None, None) => println!("{} failed", result.request.url),
                }
            }
        }
        Commands::Endpoints => {
            for name in client.endpoints().names() {
                if let Some(endpoint) = client.endpoints().get(name) {
                    println!("{:<36} {:<6} {}", name, endpoint.method.as_str(), endpoint.path);
                }
            }
        }
        Commands::WatchNotifications => {
            if !config.notifications.enabled {
                tracing::info!("Notification polling disabled");
                return Ok(());
            }
            let store: Arc<dyn KeyValueStore> = match &config.notifications.store_path {
                Some(path) => Arc::new(FileStore::open(path)?),
                None => Arc::new(MemoryStore::new()),
            };
            let poller = NotificationPoller::new(
                client.clone(),
                store,
                notifier,
                Duration::from_secs(config.notifications.poll_interval_secs),
            );

            let shutdown = Shutdown::new();
            let rx = shutdown.subscribe();
            tokio::spawn(wait_for_signal(shutdown));
            poller.run(rx).await;
            tracing::info!("Shutdown complete");
        }
    }

    Ok(())
}

fn print_body(body: &ResponseBody) -> Result<(), Box<dyn std::error::Error>> {
    match body {
        ResponseBody::Json(value) => println!("{}", serde_json::to_string_pretty(value)?),
        ResponseBody::Text(text) => println!("{}", text),
    }
    Ok(())
}
