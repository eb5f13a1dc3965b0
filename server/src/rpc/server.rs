//! Server Implementation
//!
//! Routes JSON-RPC requests to the [`FaqService`]. Each request runs on its own
//! task and every response goes through a single writer task, so a slow
//! `retrain` never holds up `query`.

use super::protocol::*;
use super::transport::{self, Incoming, RequestReader, ResponseWriter};
use crate::error::{ServerError, ServerResult};
use crate::service::FaqService;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncWrite};
use tokio::sync::mpsc;

/// Responses waiting for the writer
const RESPONSE_QUEUE: usize = 64;

const SERVER_NAME: &str = "faqbot";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Line-delimited JSON-RPC front end
pub struct FaqServer {
    service: Arc<FaqService>,
}

impl FaqServer {
    pub fn new(service: Arc<FaqService>) -> Self {
        Self { service }
    }

    /// Serve over stdin/stdout until the client closes stdin
    pub async fn run_stdio(&self) -> io::Result<()> {
        let (reader, writer) = transport::stdio();
        self.run(reader, writer).await
    }

    /// Serve until `reader` reaches end of input and every in-flight request has answered
    pub async fn run<R, W>(
        &self,
        mut reader: RequestReader<R>,
        mut writer: ResponseWriter<W>,
    ) -> io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, mut rx) = mpsc::channel::<JsonRpcResponse>(RESPONSE_QUEUE);

        // Ends once the reader loop and every request task have dropped their sender
        let writer_task = tokio::spawn(async move {
            while let Some(response) = rx.recv().await {
                writer.write_response(&response).await?;
            }
            Ok::<(), io::Error>(())
        });

        tracing::info!("Server starting...");

        let read_result = loop {
            match reader.next_message().await {
                Ok(Some(Incoming::Request(request))) => {
                    let service = Arc::clone(&self.service);
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        let notification = request.id.is_none();
                        let response = handle_request(&service, request).await;
                        if !notification {
                            let _ = tx.send(response).await;
                        }
                    });
                }
                Ok(Some(Incoming::Malformed(e))) => {
                    let response = JsonRpcResponse::error(
                        None,
                        JsonRpcError::parse_error(format!("Parse error: {}", e)),
                    );
                    let _ = tx.send(response).await;
                }
                Ok(None) => {
                    tracing::info!("Client disconnected");
                    break Ok(());
                }
                Err(e) => break Err(e),
            }
        };

        drop(tx);
        writer_task
            .await
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))??;
        read_result
    }
}

/// Handle a JSON-RPC request
async fn handle_request(service: &FaqService, request: JsonRpcRequest) -> JsonRpcResponse {
    tracing::debug!("Handling request: {}", request.method);

    let id = request.id;
    if request.jsonrpc != "2.0" {
        return JsonRpcResponse::error(
            id,
            JsonRpcError::invalid_request(format!("Unsupported jsonrpc version {}", request.jsonrpc)),
        );
    }

    match request.method.as_str() {
        "initialize" => {
            let result = InitializeResult {
                server_info: ServerInfo {
                    name: SERVER_NAME.to_string(),
                    version: SERVER_VERSION.to_string(),
                },
                generation: service.health().generation,
            };
            JsonRpcResponse::from_result(id, &result)
        }
        "initialized" | "notifications/cancelled" => JsonRpcResponse::success(id, Value::Null),
        "ping" => JsonRpcResponse::from_result(id, &PingResult {}),
        "query" => handle_query(service, id, request.params).await,
        "retrain" => handle_retrain(service, id).await,
        "retrain/status" => JsonRpcResponse::from_result(id, &service.snapshot_status()),
        "health" => JsonRpcResponse::from_result(id, &service.health()),
        _ => JsonRpcResponse::error(id, JsonRpcError::method_not_found(&request.method)),
    }
}

async fn handle_query(
    service: &FaqService,
    id: Option<Value>,
    params: Option<Value>,
) -> JsonRpcResponse {
    let params: QueryParams = match parse_params(params) {
        Ok(params) => params,
        Err(e) => return JsonRpcResponse::error(id, e.into()),
    };

    let reply = service.ask(&params.question).await;
    JsonRpcResponse::from_result(
        id,
        &QueryResult {
            answer: reply.answer,
            matched: reply.matched,
        },
    )
}

async fn handle_retrain(service: &FaqService, id: Option<Value>) -> JsonRpcResponse {
    match service.retrain().await {
        Ok(summary) => {
            let result = RetrainResult {
                status: "success".to_string(),
                count: summary.record_count,
                build_duration_ms: summary.build_duration.as_millis() as u64,
                generation: summary.generation.to_string(),
                timestamp: summary.built_at.to_rfc3339(),
            };
            JsonRpcResponse::from_result(id, &result)
        }
        Err(e) => JsonRpcResponse::error(id, e.into()),
    }
}

fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> ServerResult<T> {
    let params = params.ok_or_else(|| ServerError::InvalidParams("Missing params".to_string()))?;
    serde_json::from_value(params)
        .map_err(|e| ServerError::InvalidParams(format!("Invalid params: {}", e)))
}
