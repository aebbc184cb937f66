use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::Method;

#[derive(Parser)]
#[command(name = "tpc-cli")]
#[command(about = "Issue third-party COPY requests against an http-tpc server", long_about = None)]
struct Cli {
    /// Base URL of the http-tpc server.
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// Bearer token passed through to storage authorization.
    #[arg(short, long)]
    token: Option<String>,

    /// Line forwarded verbatim to the remote peer (repeatable), e.g. "X-Auth: abc".
    #[arg(long = "copy-header")]
    copy_headers: Vec<String>,

    /// Header forwarded to the remote peer as NAME=VALUE (repeatable).
    #[arg(long = "transfer-header", value_parser = parse_pair)]
    transfer_headers: Vec<(String, String)>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Server pulls REMOTE into local PATH
    Pull {
        remote: String,
        path: String,
        /// Fail instead of replacing an existing file
        #[arg(long)]
        no_overwrite: bool,
    },
    /// Server pushes local PATH to REMOTE
    Push { path: String, remote: String },
    /// Show the server's advertised capabilities
    Options { path: Option<String> },
}

fn parse_pair(value: &str) -> Result<(String, String), String> {
    value
        .split_once('=')
        .map(|(n, v)| (n.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected NAME=VALUE, got {:?}", value))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()?;
    let copy = Method::from_bytes(b"COPY")?;

    let mut headers = HeaderMap::new();
    if let Some(token) = &cli.token {
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", token))?);
    }
    for line in &cli.copy_headers {
        headers.append("Copy-Header", HeaderValue::from_str(line)?);
    }
    for (name, value) in &cli.transfer_headers {
        let name = HeaderName::from_bytes(format!("TransferHeader{}", name).as_bytes())?;
        headers.append(name, HeaderValue::from_str(value)?);
    }

    let res = match cli.command {
        Commands::Pull { remote, path, no_overwrite } => {
            headers.insert("Source", HeaderValue::from_str(&remote)?);
            if no_overwrite {
                headers.insert("Overwrite", HeaderValue::from_static("F"));
            }
            client.request(copy, target(&cli.url, &path))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Push { path, remote } => {
            headers.insert("Destination", HeaderValue::from_str(&remote)?);
            client.request(copy, target(&cli.url, &path))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Options { path } => {
            client.request(Method::OPTIONS, target(&cli.url, path.as_deref().unwrap_or("/")))
                .send()
                .await?
        }
    };

    print_response(res).await
}

fn target(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    for name in ["location", "dav", "allow", "x-request-id"] {
        for value in res.headers().get_all(name) {
            println!("{}: {}", name, value.to_str().unwrap_or("<binary>"));
        }
    }
    let text = res.text().await?;
    if status.is_success() || status.is_redirection() {
        println!("{} {}", status.as_u16(), text);
        Ok(())
    } else {
        eprintln!("Error: server returned status {}", status);
        eprintln!("Response: {}", text);
        Err(format!("COPY failed with status {}", status.as_u16()).into())
    }
}
