//! tollgated - token lifecycle service
//!
//! Wires together:
//! - Configuration loading
//! - Store initialization
//! - Token service
//! - IPC server

mod dispatch;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Mutex;
use tollgate_api::{ClientRole, ErrorCode, ErrorInfo, Event, EventPayload, Response};
use tollgate_config::{load_config, ServiceConfig};
use tollgate_core::TokenService;
use tollgate_ipc::{IpcServer, ServerMessage};
use tollgate_store::{AuditEvent, AuditEventType, SqliteStore, Store};
use tollgate_util::{default_config_path, RateLimiter};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// tollgated - API token lifecycle service
#[derive(Parser, Debug)]
#[command(name = "tollgated")]
#[command(about = "API token lifecycle service", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/tollgate/config.toml)
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Socket path override (or set TOLLGATE_SOCKET env var)
    #[arg(short, long, env = "TOLLGATE_SOCKET")]
    socket: Option<PathBuf>,

    /// Data directory override (or set TOLLGATE_DATA_DIR env var)
    #[arg(short, long, env = "TOLLGATE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

/// Main service state
struct Service {
    tokens: Arc<TokenService>,
    ipc: Arc<IpcServer>,
    store: Arc<dyn Store>,
    rate_limiter: RateLimiter,
}

impl Service {
    async fn new(args: &Args) -> Result<Self> {
        let config = if args.config.exists() {
            let config = load_config(&args.config)
                .with_context(|| format!("Failed to load config from {:?}", args.config))?;
            info!(config_path = %args.config.display(), "Configuration loaded");
            config
        } else {
            warn!(
                config_path = %args.config.display(),
                "Config file not found, using defaults"
            );
            ServiceConfig::default()
        };

        let socket_path = args
            .socket
            .clone()
            .unwrap_or_else(|| config.service.socket_path.clone());

        let data_dir = args
            .data_dir
            .clone()
            .unwrap_or_else(|| config.service.data_dir.clone());

        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

        let db_path = data_dir.join("tollgated.db");
        let store: Arc<dyn Store> = Arc::new(
            SqliteStore::open(&db_path)
                .with_context(|| format!("Failed to open database {:?}", db_path))?,
        );

        info!(db_path = %db_path.display(), "Store initialized");

        store.append_audit(AuditEvent::new(AuditEventType::ServiceStarted))?;

        let tokens = Arc::new(TokenService::new(store.clone(), config.tokens));

        let mut ipc = IpcServer::new(&socket_path);
        ipc.start().await?;

        info!(socket_path = %socket_path.display(), "IPC server started");

        let rate_limiter = RateLimiter::new(
            config.rate_limit.requests,
            config.rate_limit.interval,
        );

        Ok(Self {
            tokens,
            ipc: Arc::new(ipc),
            store,
            rate_limiter,
        })
    }

    async fn run(self) -> Result<()> {
        let ipc_ref = self.ipc.clone();
        let mut ipc_messages = ipc_ref
            .take_message_receiver()
            .await
            .context("IPC message receiver already taken")?;

        let tokens = self.tokens.clone();
        let store = self.store.clone();
        let rate_limiter = Arc::new(Mutex::new(self.rate_limiter));

        let ipc_accept = ipc_ref.clone();
        tokio::spawn(async move {
            if let Err(e) = ipc_accept.run().await {
                error!(error = %e, "IPC server error");
            }
        });

        let mut sigterm = signal(SignalKind::terminate())
            .context("Failed to create SIGTERM handler")?;
        let mut sigint = signal(SignalKind::interrupt())
            .context("Failed to create SIGINT handler")?;
        let mut sighup = signal(SignalKind::hangup())
            .context("Failed to create SIGHUP handler")?;

        info!("Service running");

        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully");
                    break;
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully");
                    break;
                }
                _ = sighup.recv() => {
                    info!("Received SIGHUP, shutting down gracefully");
                    break;
                }

                Some(msg) = ipc_messages.recv() => {
                    Self::handle_ipc_message(&tokens, &ipc_ref, &store, &rate_limiter, msg).await;
                }
            }
        }

        info!("Shutting down tollgated");

        ipc_ref.broadcast_event(Event::new(EventPayload::Shutdown));

        audit(store.as_ref(), AuditEventType::ServiceStopped);

        info!("Shutdown complete");
        Ok(())
    }

    async fn handle_ipc_message(
        tokens: &Arc<TokenService>,
        ipc: &Arc<IpcServer>,
        store: &Arc<dyn Store>,
        rate_limiter: &Arc<Mutex<RateLimiter>>,
        msg: ServerMessage,
    ) {
        match msg {
            ServerMessage::Request { client_id, request } => {
                {
                    let mut limiter = rate_limiter.lock().await;
                    if !limiter.check(&client_id) {
                        let response = Response::error(
                            request.request_id,
                            ErrorInfo::new(ErrorCode::RateLimited, "Too many requests"),
                        );
                        let _ = ipc.send_response(&client_id, response).await;
                        return;
                    }
                }

                // Unknown clients (already gone) get the least privilege
                let role = ipc
                    .get_client_info(&client_id)
                    .await
                    .map(|info| info.role)
                    .unwrap_or(ClientRole::Viewer);

                let outcome = dispatch::handle_command(
                    tokens,
                    role,
                    &client_id,
                    request.request_id,
                    request.command,
                    tollgate_util::now_unix(),
                );

                if let Some(event) = outcome.event {
                    ipc.broadcast_event(Event::new(event));
                }

                if let Err(e) = ipc.send_response(&client_id, outcome.response).await {
                    debug!(client_id = %client_id, error = %e, "Failed to send response");
                }
            }

            ServerMessage::ClientConnected { client_id, info } => {
                info!(
                    client_id = %client_id,
                    role = ?info.role,
                    uid = ?info.uid,
                    "Client connected"
                );

                audit(
                    store.as_ref(),
                    AuditEventType::ClientConnected {
                        client_id: client_id.to_string(),
                        role: format!("{:?}", info.role),
                        uid: info.uid,
                    },
                );
            }

            ServerMessage::ClientDisconnected { client_id } => {
                debug!(client_id = %client_id, "Client disconnected");

                audit(
                    store.as_ref(),
                    AuditEventType::ClientDisconnected {
                        client_id: client_id.to_string(),
                    },
                );

                let mut limiter = rate_limiter.lock().await;
                limiter.remove_client(&client_id);
            }
        }
    }
}

/// Append an audit event; failures are logged and never stop the service
fn audit(store: &dyn Store, event: AuditEventType) -> bool {
    match store.append_audit(AuditEvent::new(event)) {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Failed to append audit event");
            false
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        mock_time = tollgate_util::is_mock_time_active(),
        "tollgated starting"
    );

    let service = Service::new(&args).await?;
    service.run().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tollgate_api::Token;
    use tollgate_store::{Precondition, StoreError, StoreResult, TokenColumns};
    use tollgate_util::{TokenId, UserId};

    /// Store whose audit log rejects every append
    struct ReadOnlyAudit;

    impl Store for ReadOnlyAudit {
        fn append_audit(&self, _event: AuditEvent) -> StoreResult<()> {
            Err(StoreError::Database("attempt to write a readonly database".into()))
        }

        fn recent_audits(&self, _limit: usize) -> StoreResult<Vec<AuditEvent>> {
            Ok(Vec::new())
        }

        fn fetch_by_id(&self, _id: TokenId, _owner: UserId) -> StoreResult<Option<Token>> {
            Ok(None)
        }

        fn fetch_by_key(&self, _key: &str, _include_disabled: bool) -> StoreResult<Option<Token>> {
            Ok(None)
        }

        fn list_by_owner(
            &self,
            _owner: UserId,
            _offset: u64,
            _limit: u32,
        ) -> StoreResult<(Vec<Token>, u64)> {
            Ok((Vec::new(), 0))
        }

        fn search_by_owner(
            &self,
            _owner: UserId,
            _keyword: &str,
            _key_prefix: &str,
        ) -> StoreResult<Vec<Token>> {
            Ok(Vec::new())
        }

        fn insert(&self, _token: &Token) -> StoreResult<TokenId> {
            Err(StoreError::Database("read-only".into()))
        }

        fn update(
            &self,
            token: &Token,
            _columns: TokenColumns,
            _precondition: Precondition<'_>,
        ) -> StoreResult<()> {
            Err(StoreError::NotFound(format!("token {}", token.id)))
        }

        fn delete_by_id(&self, _id: TokenId, _owner: UserId) -> StoreResult<bool> {
            Ok(false)
        }

        fn delete_batch(&self, _ids: &[TokenId], _owner: UserId) -> StoreResult<u64> {
            Ok(0)
        }

        fn is_healthy(&self) -> bool {
            false
        }
    }

    #[test]
    fn audit_failure_is_reported_not_raised() {
        assert!(!audit(&ReadOnlyAudit, AuditEventType::ServiceStopped));
        assert!(!audit(
            &ReadOnlyAudit,
            AuditEventType::ClientDisconnected {
                client_id: "c1".into(),
            },
        ));
    }

    #[test]
    fn audit_success() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(audit(&store, AuditEventType::ServiceStarted));
        assert_eq!(store.recent_audits(1).unwrap().len(), 1);
    }
}
