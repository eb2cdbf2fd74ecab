//! Lifecycle tests for the management endpoint service.

use super::support::{RecordingBinder, loopback_config};
use crate::endpoint::{
    adapters::{TcpConnectorFactory, memory::InMemoryObjectStoreFactory},
    domain::{ConfigurationRule, EndpointConfig, EndpointLifecycleState, ManagedObject, ObjectName},
    ports::{
        BindError, ConnectorError, ManagedObjectStore, ManagementConnector,
        MockConnectorFactory, MockManagementConnector, MockObjectStoreFactory, ObjectStoreError,
        ObjectStoreFactory,
    },
    services::{ManagementEndpoint, ManagementEndpointError, StartupError},
};
use mockable::DefaultClock;
use rstest::{fixture, rstest};
use std::io;
use std::net::TcpListener;
use std::sync::Arc;

type TestEndpoint<S = InMemoryObjectStoreFactory, C = TcpConnectorFactory> =
    ManagementEndpoint<S, C, RecordingBinder, DefaultClock>;

fn endpoint_with<S>(store_factory: S, binder: &Arc<RecordingBinder>) -> TestEndpoint<S>
where
    S: ObjectStoreFactory,
{
    ManagementEndpoint::new(
        Arc::new(store_factory),
        Arc::new(TcpConnectorFactory::new()),
        Arc::clone(binder),
        Arc::new(DefaultClock),
    )
}

#[fixture]
fn binder() -> Arc<RecordingBinder> {
    Arc::new(RecordingBinder::default())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn colliding_ports_fail_before_any_bind(binder: Arc<RecordingBinder>) {
    let mut endpoint = endpoint_with(InMemoryObjectStoreFactory::new(), &binder);
    endpoint
        .configure(loopback_config().with_registry_port(7114).with_connector_port(7114))
        .expect("configure");

    let result = endpoint.start().await;

    assert!(matches!(
        result,
        Err(ManagementEndpointError::InvalidConfiguration(
            ConfigurationRule::PortsCollide { port: 7114 }
        ))
    ));
    assert_eq!(binder.calls(), 0);
    assert_eq!(endpoint.state(), EndpointLifecycleState::Unconfigured);
}

#[rstest]
#[case(EndpointConfig::new(" ", "ctx").with_registry_port(1).with_connector_port(2), ConfigurationRule::BlankDomain)]
#[case(EndpointConfig::new("d", "").with_registry_port(1).with_connector_port(2), ConfigurationRule::BlankContext)]
#[tokio::test(flavor = "multi_thread")]
async fn invalid_configuration_names_violated_rule(
    binder: Arc<RecordingBinder>,
    #[case] config: EndpointConfig,
    #[case] rule: ConfigurationRule,
) {
    let mut endpoint = endpoint_with(InMemoryObjectStoreFactory::new(), &binder);
    endpoint.configure(config).expect("configure");

    let result = endpoint.start().await;

    let Err(ManagementEndpointError::InvalidConfiguration(violated)) = result else {
        panic!("expected invalid configuration, got {result:?}");
    };
    assert_eq!(violated, rule);
    assert_eq!(binder.calls(), 0);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn store_failure_leaves_endpoint_validated(binder: Arc<RecordingBinder>) {
    let mut store_factory = MockObjectStoreFactory::new();
    store_factory
        .expect_create_store()
        .times(1)
        .returning(|_| Err(ObjectStoreError::unavailable(io::Error::other("store down"))));
    let mut endpoint = endpoint_with(store_factory, &binder);
    endpoint.configure(loopback_config()).expect("configure");

    let result = endpoint.start().await;

    assert!(matches!(
        result,
        Err(ManagementEndpointError::Startup(StartupError::ObjectStore { .. }))
    ));
    assert_eq!(endpoint.state(), EndpointLifecycleState::Validated);
    assert_eq!(binder.calls(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn connector_bind_failure_releases_registry_socket() {
    let binder = Arc::new(RecordingBinder::refusing(1));
    let mut endpoint = endpoint_with(InMemoryObjectStoreFactory::new(), &binder);
    endpoint.configure(loopback_config()).expect("configure");

    let result = endpoint.start().await;

    assert!(matches!(
        result,
        Err(ManagementEndpointError::Startup(StartupError::ConnectorBind(
            BindError::AddressInUse { .. }
        )))
    ));
    assert_eq!(endpoint.state(), EndpointLifecycleState::Validated);
    assert!(matches!(
        endpoint.registry(),
        Err(ManagementEndpointError::NotStarted)
    ));
    let registry_addr = *binder.bound().first().expect("registry was bound");
    TcpListener::bind(registry_addr).expect("registry port should be free again");
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn connector_start_failure_releases_both_sockets(binder: Arc<RecordingBinder>) {
    let mut connector_factory = MockConnectorFactory::new();
    connector_factory
        .expect_new_connector()
        .times(1)
        .returning(|_, _, _| {
            let mut mock = MockManagementConnector::new();
            mock.expect_start()
                .times(1)
                .returning(|| Err(ConnectorError::transport(io::Error::other("listener closed"))));
            let connector: Box<dyn ManagementConnector> = Box::new(mock);
            Ok(connector)
        });
    let mut endpoint: TestEndpoint<InMemoryObjectStoreFactory, MockConnectorFactory> =
        ManagementEndpoint::new(
            Arc::new(InMemoryObjectStoreFactory::new()),
            Arc::new(connector_factory),
            Arc::clone(&binder),
            Arc::new(DefaultClock),
        );
    endpoint.configure(loopback_config()).expect("configure");

    let result = endpoint.start().await;

    assert!(matches!(
        result,
        Err(ManagementEndpointError::Startup(StartupError::Connector(
            ConnectorError::Transport(_)
        )))
    ));
    assert_eq!(endpoint.state(), EndpointLifecycleState::Validated);
    assert!(matches!(
        endpoint.registry(),
        Err(ManagementEndpointError::NotStarted)
    ));
    assert_eq!(binder.bound().len(), 2);
    for address in binder.bound() {
        TcpListener::bind(address).expect("listener should be released");
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn reconfiguring_validated_endpoint_requires_revalidation() {
    let binder = Arc::new(RecordingBinder::refusing(1));
    let mut endpoint = endpoint_with(InMemoryObjectStoreFactory::new(), &binder);
    endpoint.configure(loopback_config()).expect("configure");
    let _failed = endpoint.start().await;
    assert_eq!(endpoint.state(), EndpointLifecycleState::Validated);

    endpoint.configure_context("other").expect("configure context");

    assert_eq!(endpoint.state(), EndpointLifecycleState::Unconfigured);
    assert_eq!(endpoint.config().context(), "other");
}

#[rstest]
fn zero_backlog_is_rejected(binder: Arc<RecordingBinder>) {
    let mut endpoint = endpoint_with(InMemoryObjectStoreFactory::new(), &binder);

    let result = endpoint.configure_backlog(0);

    assert!(matches!(
        result,
        Err(ManagementEndpointError::InvalidBacklog(0))
    ));
    assert_eq!(endpoint.config().backlog(), 50);
}

#[rstest]
fn default_configuration_has_no_address(binder: Arc<RecordingBinder>) {
    let endpoint = endpoint_with(InMemoryObjectStoreFactory::new(), &binder);

    let result = endpoint.address();

    assert!(matches!(
        result,
        Err(ManagementEndpointError::NotConfigured(ConfigurationRule::BlankDomain))
    ));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn started_endpoint_serves_registered_objects(binder: Arc<RecordingBinder>) {
    let mut endpoint = endpoint_with(InMemoryObjectStoreFactory::new(), &binder);
    endpoint.configure(loopback_config()).expect("configure");
    endpoint.start().await.expect("start");
    let name = ObjectName::new("test.domain", [("type", "Gauge"), ("name", "heap")])
        .expect("valid name");

    endpoint
        .object_store()
        .expect("store")
        .register(ManagedObject::new(name.clone(), "Gauge"))
        .expect("register");

    assert_eq!(endpoint.list_object_names().expect("names"), vec![name]);
    assert_eq!(endpoint.list_managed_objects().expect("objects").len(), 1);
    assert_eq!(endpoint.domain(), "test.domain");
    assert!(endpoint.started_at().is_some());
    assert_eq!(binder.calls(), 2);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn started_endpoint_publishes_connector_under_context(binder: Arc<RecordingBinder>) {
    let mut endpoint = endpoint_with(InMemoryObjectStoreFactory::new(), &binder);
    endpoint.configure(loopback_config()).expect("configure");

    let address = endpoint.start().await.expect("start");

    let registry = endpoint.registry().expect("registry");
    assert_eq!(registry.lookup("test").expect("lookup"), Some(address.clone()));
    assert_eq!(registry.list().expect("list"), vec!["test".to_owned()]);
    assert_eq!(
        endpoint.connector().expect("connector").advertised_address(),
        &address
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn shutdown_is_terminal(binder: Arc<RecordingBinder>) {
    let mut endpoint = endpoint_with(InMemoryObjectStoreFactory::new(), &binder);
    endpoint.configure(loopback_config()).expect("configure");
    endpoint.start().await.expect("start");

    endpoint.shutdown().await.expect("shutdown");

    assert_eq!(endpoint.state(), EndpointLifecycleState::Stopped);
    assert!(endpoint.started_at().is_none());
    assert!(matches!(
        endpoint.start().await,
        Err(ManagementEndpointError::ShutDown)
    ));
    assert!(matches!(
        endpoint.configure_registry_port(1),
        Err(ManagementEndpointError::ConfigurationLocked(
            EndpointLifecycleState::Stopped
        ))
    ));
    assert!(matches!(
        endpoint.list_managed_objects(),
        Err(ManagementEndpointError::ShutDown)
    ));
    assert!(matches!(
        endpoint.address(),
        Err(ManagementEndpointError::ShutDown)
    ));
    assert!(matches!(
        endpoint.shutdown().await,
        Err(ManagementEndpointError::ShutDown)
    ));
    for address in binder.bound() {
        TcpListener::bind(address).expect("listener should be released");
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn shutdown_before_start_is_rejected(binder: Arc<RecordingBinder>) {
    let mut endpoint = endpoint_with(InMemoryObjectStoreFactory::new(), &binder);

    let result = endpoint.shutdown().await;

    assert!(matches!(result, Err(ManagementEndpointError::NotStarted)));
    assert_eq!(endpoint.state(), EndpointLifecycleState::Unconfigured);
}
