use std::path::{Path, PathBuf};

use anyhow::Context;
use bongchun_core::{Client, Config};
use bongchun_llm::{AnyProvider, LlmProvider};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Parser)]
#[command(
    name = "bongchun",
    version,
    about = "Chat with Gemini using tools hosted by MCP servers"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "config/default.toml")]
    config: PathBuf,

    /// Answer a single query and exit instead of starting the prompt loop.
    #[arg(long, short)]
    query: Option<String>,

    /// Image to send along with `--query`.
    #[arg(long, requires = "query")]
    attach: Option<PathBuf>,

    /// File whose contents are placed before every query.
    #[arg(long)]
    prompt_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_subscriber();
    let cli = Cli::parse();

    let config = Config::load(&cli.config)?;
    let provider = AnyProvider::from(config.gemini_provider()?);
    let additional_prompt = cli
        .prompt_file
        .as_deref()
        .map(|p| {
            std::fs::read_to_string(p)
                .with_context(|| format!("failed to read prompt file {}", p.display()))
        })
        .transpose()?;

    let (status_tx, mut status_rx) = tokio::sync::mpsc::unbounded_channel::<String>();
    tokio::spawn(async move {
        while let Some(line) = status_rx.recv().await {
            eprintln!("[status] {line}");
        }
    });

    let mut client = Client::new(provider, config.client_settings()).with_status_tx(status_tx);
    let summary = client.connect_all(&config.mcp.servers).await;
    tracing::info!(
        connected = summary.connected.len(),
        failed = summary.failures.len(),
        tools = summary.tool_count,
        "ready"
    );

    let token = client.cancellation_token();
    let signal_token = token.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e:#}");
            return;
        }
        tracing::info!("received shutdown signal");
        signal_token.cancel();
    });

    let result = match cli.query {
        Some(query) => {
            one_shot(
                &mut client,
                &query,
                additional_prompt.as_deref(),
                cli.attach.as_deref(),
            )
            .await
        }
        None => repl(&mut client, additional_prompt.as_deref(), &token).await,
    };

    client.cleanup().await;
    result
}

async fn one_shot<P: LlmProvider>(
    client: &mut Client<P>,
    query: &str,
    additional_prompt: Option<&str>,
    attachment: Option<&Path>,
) -> anyhow::Result<()> {
    let answer = client
        .process_query(query, additional_prompt, attachment)
        .await
        .context("query failed")?;
    println!("{answer}");
    Ok(())
}

async fn repl<P: LlmProvider>(
    client: &mut Client<P>,
    additional_prompt: Option<&str>,
    token: &CancellationToken,
) -> anyhow::Result<()> {
    print_tools(client);
    println!("Type a message, /attach <image>, /tools, /new, or /quit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut attachment: Option<PathBuf> = None;
    loop {
        let line = tokio::select! {
            () = token.cancelled() => break,
            line = lines.next_line() => line.context("failed to read stdin")?,
        };
        let Some(line) = line else { break };
        let input = line.trim();
        match input {
            "" => {}
            "/quit" | "/exit" => break,
            "/new" => {
                client.start_new_chat();
                attachment = None;
                println!("Started a new chat.");
            }
            "/tools" => print_tools(client),
            _ if input.starts_with("/attach ") => {
                let path = PathBuf::from(input["/attach ".len()..].trim());
                println!("Will attach {} to the next message.", path.display());
                attachment = Some(path);
            }
            query => {
                let file = attachment.take();
                match client
                    .process_query(query, additional_prompt, file.as_deref())
                    .await
                {
                    Ok(answer) => println!("{answer}"),
                    Err(e) => println!("Error: {e}"),
                }
                if token.is_cancelled() {
                    break;
                }
            }
        }
    }
    Ok(())
}

fn print_tools<P: LlmProvider>(client: &Client<P>) {
    let names = client.tool_names();
    if names.is_empty() {
        println!("No tools available.");
    } else {
        println!("Available tools: {}", names.join(", "));
    }
}

fn init_subscriber() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
