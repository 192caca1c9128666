use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use loadcap_core::{
    ApplyPhase, CapBackend, ClientCap, ClientCounter, ClientGuard, CycleOutcome, Directive,
    FleetClient, GrpcFleetClient, Rebalancer, RebalancerConfig, ServerId, apply_directive,
    poll_snapshot,
};
use tokio::task::JoinHandle;
use tonic::transport::Server;

const RPC_TIMEOUT: Duration = Duration::from_millis(500);

struct TestBackend {
    id: ServerId,
    counter: Arc<ClientCounter>,
    _clients: Vec<ClientGuard>,
    handle: JoinHandle<()>,
}

impl Drop for TestBackend {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Start a backend with `active` clients on an ephemeral port.
async fn start_backend(active: u32) -> TestBackend {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let counter = Arc::new(ClientCounter::new());
    let clients = (0..active).map(|_| counter.try_admit().unwrap()).collect();
    let service = CapBackend::new(Arc::clone(&counter)).into_service();

    let handle = tokio::spawn(async move {
        Server::builder()
            .add_service(service)
            .serve_with_incoming(tokio_stream::wrappers::TcpListenerStream::new(listener))
            .await
            .expect("backend server failed");
    });

    TestBackend {
        id: addr.to_string(),
        counter,
        _clients: clients,
        handle,
    }
}

/// An address that nothing is listening on.
async fn dead_address() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

#[tokio::test]
async fn polls_real_backends() {
    let a = start_backend(4).await;
    let b = start_backend(7).await;
    let servers = vec![a.id.clone(), b.id.clone()];
    let client = GrpcFleetClient::new(&servers, RPC_TIMEOUT).unwrap();

    let snapshot = poll_snapshot(&client, &servers).await.unwrap();

    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot.get(&a.id).unwrap().active_clients, 4);
    assert_eq!(snapshot.get(&b.id).unwrap().active_clients, 7);
    assert_eq!(snapshot.get(&b.id).unwrap().max_clients, ClientCap::Unbounded);
    assert_eq!(snapshot.total_active_clients(), 11);
}

#[tokio::test]
async fn set_max_clients_reaches_the_backend() {
    let a = start_backend(0).await;
    let client = GrpcFleetClient::new(std::slice::from_ref(&a.id), RPC_TIMEOUT).unwrap();

    client.set_max_clients(&a.id, ClientCap::Limit(3)).await.unwrap();
    assert_eq!(a.counter.max_clients(), ClientCap::Limit(3));

    let status = client.client_status(&a.id).await.unwrap();
    assert_eq!(status.max_clients, ClientCap::Limit(3));

    client.set_max_clients(&a.id, ClientCap::Unbounded).await.unwrap();
    assert_eq!(a.counter.max_clients(), ClientCap::Unbounded);
}

#[tokio::test]
async fn unreachable_server_fails_the_whole_poll() {
    let a = start_backend(2).await;
    let dead = dead_address().await.to_string();
    let servers = vec![a.id.clone(), dead.clone()];
    let client = GrpcFleetClient::new(&servers, RPC_TIMEOUT).unwrap();

    let err = poll_snapshot(&client, &servers).await.unwrap_err();

    assert_eq!(err.0.server(), dead);
}

#[tokio::test]
async fn apply_aborts_when_a_release_target_is_down() {
    let a = start_backend(10).await;
    let dead = dead_address().await.to_string();
    let servers = vec![a.id.clone(), dead.clone()];
    let client = GrpcFleetClient::new(&servers, RPC_TIMEOUT).unwrap();

    let mut directive = Directive::unbounded(servers.iter().map(String::as_str));
    directive.restrict(&a.id, 6);

    let err = apply_directive(&client, &directive).await.unwrap_err();

    assert_eq!(err.phase, ApplyPhase::Release);
    assert_eq!(err.source.server(), dead);
    assert_eq!(a.counter.max_clients(), ClientCap::Unbounded);
}

#[tokio::test]
async fn rebalancer_caps_the_overloaded_backend() {
    let a = start_backend(10).await;
    let b = start_backend(2).await;

    let mut config = RebalancerConfig::new([a.id.clone(), b.id.clone()]);
    config.stability_threshold = 1;
    config.rpc_timeout = RPC_TIMEOUT;
    let client = GrpcFleetClient::new(&config.servers, config.rpc_timeout).unwrap();
    let mut rebalancer = Rebalancer::new(&config, client).unwrap();

    assert_eq!(
        rebalancer.run_cycle().await,
        CycleOutcome::Unstable {
            stable_iterations: 0
        }
    );
    let outcome = rebalancer.run_cycle().await;
    assert!(
        matches!(outcome, CycleOutcome::Rebalanced { .. }),
        "unexpected outcome {outcome:?}"
    );

    assert_eq!(a.counter.max_clients(), ClientCap::Limit(6));
    assert_eq!(b.counter.max_clients(), ClientCap::Unbounded);

    let view = rebalancer.status_handle().view();
    assert_eq!(view.rebalances, 1);
    assert_eq!(view.stable_iterations, 0);
}
