use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "gate-cli")]
#[command(about = "Management CLI for the authentication gate", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:5000")]
    url: String,

    /// Shared secret sent as X-Demo-Secret.
    #[arg(short, long, default_value = "changeme")]
    secret: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the event journal, oldest first
    Events {
        /// Only the newest N events
        #[arg(short, long)]
        limit: Option<usize>,
        /// Keep polling and print new events as they arrive
        #[arg(short, long)]
        follow: bool,
        /// Poll interval in seconds
        #[arg(long, default_value_t = 2)]
        interval: u64,
    },
    /// Attempt a login
    Login {
        username: String,
        password: String,
        /// Source to claim via X-Forwarded-For
        #[arg(long)]
        ip: Option<String>,
    },
    /// Generate simulated failures for a source
    Simulate {
        #[arg(long, default_value = "203.0.113.55")]
        ip: String,
        #[arg(short, long, default_value_t = 20)]
        count: usize,
    },
    /// Check gate status
    Status,
    /// Inspect the rate limiter, optionally for one source
    Limiter {
        #[arg(long)]
        ip: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut admin_headers = HeaderMap::new();
    admin_headers.insert("x-demo-secret", HeaderValue::from_str(&cli.secret)?);

    match cli.command {
        Commands::Events { limit, follow, interval } => {
            let mut url = format!("{}/api/events", cli.url);
            if let Some(limit) = limit {
                url.push_str(&format!("?limit={limit}"));
            }

            let mut last: Option<Value> = None;
            loop {
                let events: Vec<Value> = client.get(&url).send().await?.error_for_status()?.json().await?;
                for event in new_since(last.as_ref(), &events) {
                    println!("{}", format_event(event));
                }
                if let Some(newest) = events.last() {
                    last = Some(newest.clone());
                }
                if !follow {
                    break;
                }
                tokio::time::sleep(Duration::from_secs(interval)).await;
            }
        }
        Commands::Login { username, password, ip } => {
            let mut request = client
                .post(format!("{}/login", cli.url))
                .header(USER_AGENT, concat!("gate-cli/", env!("CARGO_PKG_VERSION")))
                .form(&[("username", username), ("password", password)]);
            if let Some(ip) = ip {
                request = request.header("x-forwarded-for", ip);
            }
            let res = request.send().await?;
            println!("{}", res.status());
            print_json(res).await?;
        }
        Commands::Simulate { ip, count } => {
            let res = client
                .post(format!("{}/simulate", cli.url))
                .query(&[("ip", ip), ("count", count.to_string())])
                .headers(admin_headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Status => {
            let res = client.get(format!("{}/admin/status", cli.url))
                .headers(admin_headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Limiter { ip } => {
            let mut request = client
                .get(format!("{}/admin/limiter", cli.url))
                .headers(admin_headers);
            if let Some(ip) = ip {
                request = request.query(&[("ip", ip)]);
            }
            print_response(request.send().await?).await?;
        }
    }

    Ok(())
}

/// Events after the previously newest one. Falls back to everything when the
/// previous event has been evicted.
fn new_since<'a>(last: Option<&Value>, events: &'a [Value]) -> &'a [Value] {
    match last.and_then(|last| events.iter().rposition(|e| e == last)) {
        Some(pos) => &events[pos + 1..],
        None => events,
    }
}

fn format_event(event: &Value) -> String {
    let field = |name: &str| event.get(name).and_then(Value::as_str).unwrap_or("-").to_string();
    format!(
        "[{}] {} {} → {} (UA={})",
        field("t"),
        field("ip"),
        field("user"),
        field("event"),
        field("ua")
    )
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: gate returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    print_json(res).await
}

async fn print_json(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
