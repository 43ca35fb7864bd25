//! `StarlaneServer` builder and accept loop.
//!
//! This is the entry point for running the realtime backend. It ties the
//! layers together: transport → protocol → session → realm, with the
//! persistence gateway on the side.

use std::sync::Arc;

use starlane_hub::{RealmConfig, RealmHandle, spawn_realm};
use starlane_persist::PersistenceGateway;
use starlane_protocol::JsonCodec;
use starlane_session::{Authenticator, SessionConfig};
use starlane_transport::{Listener, WebSocketListener};

use crate::StarlaneError;
use crate::handler::handle_connection;

/// Shared server state handed to every connection handler task.
pub(crate) struct ServerState<A: Authenticator, P: PersistenceGateway> {
    pub(crate) auth: A,
    pub(crate) gateway: Arc<P>,
    pub(crate) realm: RealmHandle,
    pub(crate) codec: JsonCodec,
    pub(crate) config: SessionConfig,
}

/// Builder for configuring and starting a Starlane server.
///
/// # Example
///
/// ```rust,ignore
/// use starlane::prelude::*;
///
/// let server = StarlaneServer::builder()
///     .bind("0.0.0.0:3001")
///     .build(my_auth, my_gateway)
///     .await?;
/// server.run().await
/// ```
pub struct StarlaneServerBuilder {
    bind_addr: String,
    session_config: SessionConfig,
    realm_config: RealmConfig,
}

impl StarlaneServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:3001".to_string(),
            session_config: SessionConfig::default(),
            realm_config: RealmConfig::default(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the session timeouts.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Sets the realm knobs (hub capacity, tick rate, reaper cadence).
    pub fn realm_config(mut self, config: RealmConfig) -> Self {
        self.realm_config = config;
        self
    }

    /// Binds the listener, spawns the realm, and returns the server.
    ///
    /// Uses `JsonCodec` over the WebSocket transport.
    pub async fn build<A, P>(
        self,
        auth: A,
        gateway: P,
    ) -> Result<StarlaneServer<A, P>, StarlaneError>
    where
        A: Authenticator,
        P: PersistenceGateway,
    {
        let listener = WebSocketListener::bind(&self.bind_addr).await?;

        let gateway = Arc::new(gateway);
        let realm = spawn_realm(self.realm_config, Arc::clone(&gateway));

        let state = Arc::new(ServerState {
            auth,
            gateway,
            realm,
            codec: JsonCodec,
            config: self.session_config,
        });

        Ok(StarlaneServer { listener, state })
    }
}

impl Default for StarlaneServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running Starlane server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct StarlaneServer<A: Authenticator, P: PersistenceGateway> {
    listener: WebSocketListener,
    state: Arc<ServerState<A, P>>,
}

impl<A, P> StarlaneServer<A, P>
where
    A: Authenticator,
    P: PersistenceGateway,
{
    /// Creates a new builder.
    pub fn builder() -> StarlaneServerBuilder {
        StarlaneServerBuilder::new()
    }

    /// The local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// A handle to the realm actor (embedding, tests, admin tooling).
    pub fn realm(&self) -> RealmHandle {
        self.state.realm.clone()
    }

    /// Runs the accept loop until the process terminates.
    ///
    /// Each accepted connection gets its own handler task; a handler
    /// error ends that connection only.
    pub async fn run(mut self) -> Result<(), StarlaneError> {
        tracing::info!("Starlane server running");

        loop {
            match self.listener.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
