//! Lifecycle orchestration for a management endpoint.

use crate::endpoint::{
    adapters::{
        LocateRegistry, RegistryError, TcpAddressBinder, TcpConnectorFactory,
        memory::InMemoryObjectStoreFactory,
    },
    domain::{
        ConfigurationRule, EndpointConfig, EndpointDomainError, EndpointId,
        EndpointLifecycleState, ManagedObject, ObjectName, ServiceAddress,
    },
    ports::{
        AddressBinder, BindError, ConnectorError, ConnectorFactory, ManagedObjectStore,
        ManagementConnector, ObjectStoreError, ObjectStoreFactory,
    },
};
use chrono::{DateTime, Utc};
use mockable::{Clock, DefaultClock};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Failure while bringing up the listeners of a management endpoint.
///
/// Each variant names the stage that failed and keeps the underlying error
/// as its source.
#[derive(Debug, Error)]
pub enum StartupError {
    /// The object store could not be created.
    #[error("cannot create object store for domain '{domain}'")]
    ObjectStore {
        /// Domain the store was requested for.
        domain: String,
        /// Store failure.
        #[source]
        source: ObjectStoreError,
    },

    /// The locate registry listener could not be bound.
    #[error("cannot bind locate registry listener")]
    RegistryBind(#[source] BindError),

    /// The connector listener could not be bound.
    #[error("cannot bind connector listener")]
    ConnectorBind(#[source] BindError),

    /// The bound listeners cannot be advertised.
    #[error("cannot advertise bound listeners")]
    Address(#[source] EndpointDomainError),

    /// The connector could not be created or started.
    #[error("cannot start connector")]
    Connector(#[source] ConnectorError),

    /// The connector could not be published in the locate registry.
    #[error("cannot publish connector in locate registry")]
    Registry(#[source] RegistryError),
}

/// Errors returned by [`ManagementEndpoint`] operations.
#[derive(Debug, Error)]
pub enum ManagementEndpointError {
    /// `start` found the configuration invalid.
    #[error("invalid endpoint configuration: {0}")]
    InvalidConfiguration(ConfigurationRule),

    /// The service address cannot be built from the configuration.
    #[error("endpoint is not configured: {0}")]
    NotConfigured(ConfigurationRule),

    /// Configuration cannot change in the current lifecycle state.
    #[error("endpoint configuration is locked while {0}")]
    ConfigurationLocked(EndpointLifecycleState),

    /// The endpoint is already running.
    #[error("endpoint is already started")]
    AlreadyStarted,

    /// The operation needs a running endpoint.
    #[error("endpoint is not started")]
    NotStarted,

    /// The endpoint has been shut down and cannot be used again.
    #[error("endpoint has been shut down")]
    ShutDown,

    /// The listen backlog is zero.
    #[error("listen backlog must be at least 1 (got {0})")]
    InvalidBacklog(u32),

    /// Bringing up the listeners failed; nothing was left running.
    #[error("endpoint startup failed")]
    Startup(#[from] StartupError),

    /// The object store rejected a query.
    #[error(transparent)]
    Store(#[from] ObjectStoreError),

    /// The connector failed while stopping.
    #[error(transparent)]
    Connector(#[from] ConnectorError),

    /// A lifecycle transition was rejected.
    #[error(transparent)]
    Domain(#[from] EndpointDomainError),
}

/// Result type for management endpoint operations.
pub type ManagementEndpointResult<T> = Result<T, ManagementEndpointError>;

/// Management endpoint wired to the TCP adapters and the system clock.
pub type TcpManagementEndpoint = ManagementEndpoint<
    InMemoryObjectStoreFactory,
    TcpConnectorFactory,
    TcpAddressBinder,
    DefaultClock,
>;

struct RunningEndpoint {
    store: Arc<dyn ManagedObjectStore>,
    registry: LocateRegistry,
    connector: Box<dyn ManagementConnector>,
    address: ServiceAddress,
    started_at: DateTime<Utc>,
}

/// Management endpoint: a locate registry plus a connector over one object
/// store.
///
/// Configuration may change until [`ManagementEndpoint::start`] succeeds.
/// Both listeners are bound through the same [`AddressBinder`], each with its
/// own [`BindSpec`](crate::endpoint::domain::BindSpec). Operations that change
/// state take `&mut self`, so callers sharing an endpoint must serialise them.
pub struct ManagementEndpoint<S, C, B, K>
where
    S: ObjectStoreFactory,
    C: ConnectorFactory,
    B: AddressBinder,
    K: Clock + Send + Sync,
{
    id: EndpointId,
    config: EndpointConfig,
    state: EndpointLifecycleState,
    store_factory: Arc<S>,
    connector_factory: Arc<C>,
    binder: Arc<B>,
    clock: Arc<K>,
    running: Option<RunningEndpoint>,
}

impl TcpManagementEndpoint {
    /// Creates an unconfigured endpoint using the TCP adapters.
    #[must_use]
    pub fn tcp() -> Self {
        Self::new(
            Arc::new(InMemoryObjectStoreFactory::new()),
            Arc::new(TcpConnectorFactory::new()),
            Arc::new(TcpAddressBinder::new()),
            Arc::new(DefaultClock),
        )
    }
}

impl<S, C, B, K> ManagementEndpoint<S, C, B, K>
where
    S: ObjectStoreFactory,
    C: ConnectorFactory,
    B: AddressBinder,
    K: Clock + Send + Sync,
{
    /// Creates an unconfigured endpoint with the default configuration.
    #[must_use]
    pub fn new(
        store_factory: Arc<S>,
        connector_factory: Arc<C>,
        binder: Arc<B>,
        clock: Arc<K>,
    ) -> Self {
        Self {
            id: EndpointId::new(),
            config: EndpointConfig::default(),
            state: EndpointLifecycleState::Unconfigured,
            store_factory,
            connector_factory,
            binder,
            clock,
            running: None,
        }
    }

    /// Returns the endpoint identifier.
    #[must_use]
    pub const fn id(&self) -> EndpointId {
        self.id
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub const fn state(&self) -> EndpointLifecycleState {
        self.state
    }

    /// Returns the current configuration.
    #[must_use]
    pub const fn config(&self) -> &EndpointConfig {
        &self.config
    }

    /// Returns the configured object store domain.
    #[must_use]
    pub fn domain(&self) -> &str {
        self.config.domain()
    }

    /// Returns when the endpoint last started, while it is running.
    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.running.as_ref().map(|running| running.started_at)
    }

    /// Sets the host both listeners bind to and advertise. `None` or a blank
    /// host binds the wildcard address and advertises `localhost`.
    ///
    /// # Errors
    ///
    /// Returns [`ManagementEndpointError::ConfigurationLocked`] once started.
    pub fn configure_host(&mut self, host: Option<&str>) -> ManagementEndpointResult<()> {
        self.update_config(|config| Ok(config.with_host(host)))
    }

    /// Sets the locate registry port.
    ///
    /// # Errors
    ///
    /// Returns [`ManagementEndpointError::ConfigurationLocked`] once started.
    pub fn configure_registry_port(&mut self, port: u16) -> ManagementEndpointResult<()> {
        self.update_config(|config| Ok(config.with_registry_port(port)))
    }

    /// Sets the connector port.
    ///
    /// # Errors
    ///
    /// Returns [`ManagementEndpointError::ConfigurationLocked`] once started.
    pub fn configure_connector_port(&mut self, port: u16) -> ManagementEndpointResult<()> {
        self.update_config(|config| Ok(config.with_connector_port(port)))
    }

    /// Sets the name the connector is published under.
    ///
    /// # Errors
    ///
    /// Returns [`ManagementEndpointError::ConfigurationLocked`] once started.
    pub fn configure_context(&mut self, context: impl Into<String>) -> ManagementEndpointResult<()> {
        let context_name = context.into();
        self.update_config(|config| Ok(config.with_context(context_name)))
    }

    /// Sets the object store domain.
    ///
    /// # Errors
    ///
    /// Returns [`ManagementEndpointError::ConfigurationLocked`] once started.
    pub fn configure_domain(&mut self, domain: impl Into<String>) -> ManagementEndpointResult<()> {
        let domain_name = domain.into();
        self.update_config(|config| Ok(config.with_domain(domain_name)))
    }

    /// Sets the listen backlog of both listeners.
    ///
    /// # Errors
    ///
    /// Returns [`ManagementEndpointError::InvalidBacklog`] for zero and
    /// [`ManagementEndpointError::ConfigurationLocked`] once started.
    pub fn configure_backlog(&mut self, backlog: u32) -> ManagementEndpointResult<()> {
        self.update_config(|config| {
            config
                .with_backlog(backlog)
                .map_err(|_| ManagementEndpointError::InvalidBacklog(backlog))
        })
    }

    /// Replaces the whole configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ManagementEndpointError::ConfigurationLocked`] once started.
    pub fn configure(&mut self, config: EndpointConfig) -> ManagementEndpointResult<()> {
        self.update_config(|_| Ok(config))
    }

    fn update_config<F>(&mut self, change: F) -> ManagementEndpointResult<()>
    where
        F: FnOnce(EndpointConfig) -> ManagementEndpointResult<EndpointConfig>,
    {
        if !self.state.accepts_configuration() {
            return Err(ManagementEndpointError::ConfigurationLocked(self.state));
        }
        self.config = change(self.config.clone())?;
        self.state = self
            .state
            .transition_to(EndpointLifecycleState::Unconfigured)?;
        Ok(())
    }

    /// Returns the service address clients use to reach the connector.
    ///
    /// Before start the address is computed from the configuration; once
    /// started it carries the ports actually bound.
    ///
    /// # Errors
    ///
    /// Returns [`ManagementEndpointError::NotConfigured`] when the
    /// configuration is invalid and [`ManagementEndpointError::ShutDown`]
    /// once the endpoint has shut down.
    pub fn address(&self) -> ManagementEndpointResult<ServiceAddress> {
        if let Some(running) = &self.running {
            return Ok(running.address.clone());
        }
        if self.state == EndpointLifecycleState::Stopped {
            return Err(ManagementEndpointError::ShutDown);
        }
        ServiceAddress::build(&self.config).map_err(ManagementEndpointError::NotConfigured)
    }

    /// Validates the configuration and brings up the object store, the
    /// locate registry and the connector, in that order.
    ///
    /// Either everything starts or nothing is left running: on failure the
    /// endpoint stays in `Validated` and every bound socket is released.
    ///
    /// # Errors
    ///
    /// Returns [`ManagementEndpointError::AlreadyStarted`] when running,
    /// [`ManagementEndpointError::ShutDown`] after shutdown,
    /// [`ManagementEndpointError::InvalidConfiguration`] before any socket is
    /// opened, or [`ManagementEndpointError::Startup`] naming the failed
    /// stage.
    pub async fn start(&mut self) -> ManagementEndpointResult<ServiceAddress> {
        match self.state {
            EndpointLifecycleState::Started => return Err(ManagementEndpointError::AlreadyStarted),
            EndpointLifecycleState::Stopped => return Err(ManagementEndpointError::ShutDown),
            EndpointLifecycleState::Unconfigured | EndpointLifecycleState::Validated => {}
        }

        self.config
            .validate()
            .map_err(ManagementEndpointError::InvalidConfiguration)?;
        self.state = self.state.transition_to(EndpointLifecycleState::Validated)?;

        let running = self.launch().await?;
        let address = running.address.clone();
        self.running = Some(running);
        self.state = self.state.transition_to(EndpointLifecycleState::Started)?;
        info!(endpoint_id = %self.id, %address, "management endpoint started");
        Ok(address)
    }

    async fn launch(&self) -> Result<RunningEndpoint, StartupError> {
        let store = self
            .store_factory
            .create_store(self.config.domain())
            .map_err(|source| StartupError::ObjectStore {
                domain: self.config.domain().to_owned(),
                source,
            })?;

        let registry_spec = self
            .config
            .registry_bind_spec()
            .map_err(|err| StartupError::RegistryBind(err.into()))?;
        let registry_socket = self
            .binder
            .bind(&registry_spec)
            .await
            .map_err(StartupError::RegistryBind)?;
        let mut registry = LocateRegistry::start(registry_socket);

        match self.attach_connector(&registry, Arc::clone(&store)).await {
            Ok((connector, address)) => Ok(RunningEndpoint {
                store,
                registry,
                connector,
                address,
                started_at: self.clock.utc(),
            }),
            Err(err) => {
                warn!(endpoint_id = %self.id, error = %err, "rolling back partially started endpoint");
                registry.shutdown().await;
                Err(err)
            }
        }
    }

    async fn attach_connector(
        &self,
        registry: &LocateRegistry,
        store: Arc<dyn ManagedObjectStore>,
    ) -> Result<(Box<dyn ManagementConnector>, ServiceAddress), StartupError> {
        let connector_spec = self
            .config
            .connector_bind_spec()
            .map_err(|err| StartupError::ConnectorBind(err.into()))?;
        let connector_socket = self
            .binder
            .bind(&connector_spec)
            .await
            .map_err(StartupError::ConnectorBind)?;

        let advertised = self.config.with_bound_ports(
            registry.local_addr().port(),
            connector_socket.local_addr().port(),
        );
        let address = ServiceAddress::build(&advertised)
            .map_err(|rule| StartupError::Address(EndpointDomainError::InvalidConfiguration(rule)))?;

        let mut connector = self
            .connector_factory
            .new_connector(address.clone(), connector_socket, store)
            .map_err(StartupError::Connector)?;
        connector.start().await.map_err(StartupError::Connector)?;
        publish(
            registry,
            self.config.context(),
            address.clone(),
            connector.as_mut(),
        )
        .await?;
        Ok((connector, address))
    }

    /// Returns the running locate registry.
    ///
    /// # Errors
    ///
    /// Returns [`ManagementEndpointError::NotStarted`] before start and
    /// [`ManagementEndpointError::ShutDown`] after shutdown.
    pub fn registry(&self) -> ManagementEndpointResult<&LocateRegistry> {
        self.running().map(|running| &running.registry)
    }

    /// Returns the running connector.
    ///
    /// # Errors
    ///
    /// Returns [`ManagementEndpointError::NotStarted`] before start and
    /// [`ManagementEndpointError::ShutDown`] after shutdown.
    pub fn connector(&self) -> ManagementEndpointResult<&dyn ManagementConnector> {
        self.running().map(|running| running.connector.as_ref())
    }

    /// Returns the object store served by the connector, so collaborators can
    /// register objects.
    ///
    /// # Errors
    ///
    /// Returns [`ManagementEndpointError::NotStarted`] before start and
    /// [`ManagementEndpointError::ShutDown`] after shutdown.
    pub fn object_store(&self) -> ManagementEndpointResult<Arc<dyn ManagedObjectStore>> {
        self.running().map(|running| Arc::clone(&running.store))
    }

    /// Returns a snapshot of every registered object in store order.
    ///
    /// # Errors
    ///
    /// Returns [`ManagementEndpointError::NotStarted`] before start, or the
    /// store failure.
    pub fn list_managed_objects(&self) -> ManagementEndpointResult<Vec<ManagedObject>> {
        let objects = self.running()?.store.query_all()?;
        debug!(endpoint_id = %self.id, count = objects.len(), "listed managed objects");
        Ok(objects)
    }

    /// Returns a snapshot of every registered object name in store order.
    ///
    /// # Errors
    ///
    /// Returns [`ManagementEndpointError::NotStarted`] before start, or the
    /// store failure.
    pub fn list_object_names(&self) -> ManagementEndpointResult<Vec<ObjectName>> {
        let names = self.running()?.store.query_names()?;
        debug!(endpoint_id = %self.id, count = names.len(), "listed object names");
        Ok(names)
    }

    /// Stops the connector and the locate registry, releases both sockets and
    /// moves the endpoint to the terminal `Stopped` state.
    ///
    /// # Errors
    ///
    /// Returns [`ManagementEndpointError::NotStarted`] when the endpoint is
    /// not running, [`ManagementEndpointError::ShutDown`] when called twice,
    /// or the connector failure. The registry is released either way.
    pub async fn shutdown(&mut self) -> ManagementEndpointResult<()> {
        self.running()?;
        self.state = self.state.transition_to(EndpointLifecycleState::Stopped)?;
        let Some(mut running) = self.running.take() else {
            return Err(ManagementEndpointError::NotStarted);
        };

        let stopped = running.connector.stop().await;
        running.registry.shutdown().await;
        info!(endpoint_id = %self.id, address = %running.address, "management endpoint shut down");
        stopped.map_err(ManagementEndpointError::from)
    }

    fn running(&self) -> ManagementEndpointResult<&RunningEndpoint> {
        match (&self.running, self.state) {
            (Some(running), _) => Ok(running),
            (None, EndpointLifecycleState::Stopped) => Err(ManagementEndpointError::ShutDown),
            (None, _) => Err(ManagementEndpointError::NotStarted),
        }
    }
}

/// Publishes a started connector under `context`. A connector that cannot be
/// published is stopped before the error is returned.
async fn publish(
    registry: &LocateRegistry,
    context: &str,
    address: ServiceAddress,
    connector: &mut dyn ManagementConnector,
) -> Result<(), StartupError> {
    let Err(err) = registry.bind(context, address) else {
        return Ok(());
    };
    if let Err(stop_err) = connector.stop().await {
        warn!(context, error = %stop_err, "connector did not stop cleanly");
    }
    Err(StartupError::Registry(err))
}
