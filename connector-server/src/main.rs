// Connector server - remote debug connectors over Model Context Protocol
//
// Exposes the connector tree (parameters, launch, default selection) as tools

use anyhow::Result;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, error, info};

mod config;
mod handlers;
mod protocol;
mod session;
mod tools;

use config::ServerConfig;
use handlers::RequestHandler;
use protocol::*;

#[tokio::main]
async fn main() -> Result<()> {
    // Tracing to stderr only - stdout is reserved for JSON-RPC protocol
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("connector_server=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Starting connector server...");

    let config = ServerConfig::from_env()?;
    info!(
        "Connectors: {:?}, connect timeout {:?}",
        config.connector_names, config.connect_timeout
    );

    let handler = RequestHandler::new(&config);

    let stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();
    let mut reader = BufReader::new(stdin);

    info!("Connector server ready, waiting for requests...");

    loop {
        let mut line = String::new();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                info!("Client disconnected");
                break;
            }
            Ok(_) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                debug!("Received: {}", line);

                match serde_json::from_str::<Value>(line) {
                    Ok(value) => {
                        // Requests carry an id, notifications do not
                        if value.get("id").is_some() {
                            match serde_json::from_value::<JsonRpcRequest>(value) {
                                Ok(request) => {
                                    let response = handler.handle_request(request).await;
                                    write_response(&mut stdout, &response).await?;
                                }
                                Err(e) => {
                                    error!("Invalid request: {}", e);
                                    let response = JsonRpcResponse::failure(
                                        Value::Null,
                                        INVALID_REQUEST,
                                        "Invalid request",
                                    );
                                    write_response(&mut stdout, &response).await?;
                                }
                            }
                        } else {
                            match serde_json::from_value::<JsonRpcNotification>(value) {
                                Ok(notification) => {
                                    handler.handle_notification(notification).await;
                                }
                                Err(e) => {
                                    error!("Invalid notification: {}", e);
                                }
                            }
                        }
                    }
                    Err(e) => {
                        error!("Parse error: {}", e);
                        let response =
                            JsonRpcResponse::failure(Value::Null, PARSE_ERROR, "Parse error");
                        write_response(&mut stdout, &response).await?;
                    }
                }
            }
            Err(e) => {
                error!("Read error: {}", e);
                break;
            }
        }
    }

    info!("Connector server shutting down");
    Ok(())
}

async fn write_response<W: AsyncWrite + Unpin>(out: &mut W, response: &JsonRpcResponse) -> Result<()> {
    let response_str = serde_json::to_string(response)?;
    debug!("Sending: {}", response_str);
    out.write_all(response_str.as_bytes()).await?;
    out.write_all(b"\n").await?;
    out.flush().await?;
    Ok(())
}
