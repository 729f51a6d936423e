//! Broker and actors talking over real sockets.

use auxo_fleet::{Actor, Broker, BrokerRuntime, HandshakeState};
use auxo_rpc::{FleetClient, RpcClient};
use auxo_types::config::{AgentConfig, BrokerConfig, ServerAddress};
use auxo_types::{DiscoveryMessage, Entity, Header};
use auxo_wire::{decode, encode, Dealer, Shutdown};
use std::time::Duration;

const DEADLINE: Duration = Duration::from_secs(2);

fn broker_config(heartbeat_interval_ms: u64) -> BrokerConfig {
    BrokerConfig {
        hostname: "127.0.0.1".to_string(),
        port: 0,
        frontend_server: ServerAddress::new("127.0.0.1", 0),
        heartbeat_interval_ms,
        liveness_multiplier: 3,
    }
}

fn agent_config(name: &str, runtime: &BrokerRuntime, heartbeat_interval_ms: u64) -> AgentConfig {
    AgentConfig {
        name: name.to_string(),
        olympus: "127.0.0.1".to_string(),
        port: runtime.fleet_endpoint().port(),
        workers_endpoint: "tcp://127.0.0.1:0".to_string(),
        heartbeat_interval_ms,
    }
}

fn fleet_client(runtime: &BrokerRuntime) -> FleetClient {
    FleetClient::new(RpcClient::new(runtime.rpc_addr().to_string(), DEADLINE))
}

/// Poll the agent count until it equals `expected` or `within` runs out.
async fn wait_for_count(client: &FleetClient, expected: i32, within: Duration) -> i32 {
    let started = tokio::time::Instant::now();
    loop {
        let count = client.get_number_of_agents(DEADLINE).await.unwrap();
        if count == expected || started.elapsed() > within {
            return count;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

async fn announce(runtime: &BrokerRuntime, name: &str) -> Dealer {
    let mut dealer = Dealer::connect(runtime.fleet_endpoint()).await.unwrap();
    let ready = encode(&DiscoveryMessage::ready(Entity::agent(name))).unwrap();
    dealer.send(ready).await.unwrap();
    let ack = tokio::time::timeout(DEADLINE, dealer.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(decode(&ack).unwrap().header(), &Header::Ack);
    dealer
}

#[tokio::test]
async fn test_one_actor_counted_then_gone_after_close() {
    let shutdown = Shutdown::new();
    let runtime = Broker::new(broker_config(50))
        .start(shutdown.subscribe())
        .await
        .unwrap();
    let client = fleet_client(&runtime);
    assert_eq!(client.get_number_of_agents(DEADLINE).await.unwrap(), 0);

    let mut actor = Actor::new(agent_config("apollo", &runtime, 50));
    actor.bind().await.unwrap();
    let actor_shutdown = Shutdown::new();
    let rx = actor_shutdown.subscribe();
    let task = tokio::spawn(async move {
        let result = actor.run(rx).await;
        (actor, result)
    });

    assert_eq!(wait_for_count(&client, 1, Duration::from_secs(3)).await, 1);

    // Still counted well past the liveness window thanks to heartbeats.
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(client.get_number_of_agents(DEADLINE).await.unwrap(), 1);

    actor_shutdown.trigger();
    let (mut actor, result) = task.await.unwrap();
    result.unwrap();
    assert_eq!(actor.state(), HandshakeState::Connected);
    actor.close().await;

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(wait_for_count(&client, 0, Duration::from_secs(3)).await, 0);

    shutdown.trigger();
    runtime.wait().await.unwrap();
}

#[tokio::test]
async fn test_silent_agent_is_evicted() {
    let shutdown = Shutdown::new();
    let runtime = Broker::new(broker_config(50))
        .start(shutdown.subscribe())
        .await
        .unwrap();
    let client = fleet_client(&runtime);

    // Announce once, then say nothing while keeping the connection open.
    let _dealer = announce(&runtime, "quiet").await;
    let count = client.get_number_of_agents(DEADLINE).await.unwrap();
    assert!(count <= 1);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(client.get_number_of_agents(DEADLINE).await.unwrap(), 0);
    shutdown.trigger();
}

#[tokio::test]
async fn test_heartbeats_keep_agent_counted() {
    let shutdown = Shutdown::new();
    let runtime = Broker::new(broker_config(100))
        .start(shutdown.subscribe())
        .await
        .unwrap();
    let client = fleet_client(&runtime);

    let dealer = announce(&runtime, "steady").await;
    for _ in 0..10 {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let heartbeat = encode(&DiscoveryMessage::heartbeat(Entity::agent("steady"))).unwrap();
        dealer.send(heartbeat).await.unwrap();
    }
    assert_eq!(client.get_number_of_agents(DEADLINE).await.unwrap(), 1);
    shutdown.trigger();
}

#[tokio::test]
async fn test_concurrent_actors_each_counted_once() {
    let shutdown = Shutdown::new();
    let runtime = Broker::new(broker_config(1_000))
        .start(shutdown.subscribe())
        .await
        .unwrap();
    let client = fleet_client(&runtime);

    let mut joins = Vec::new();
    for i in 0..8 {
        let endpoint = runtime.fleet_endpoint().clone();
        joins.push(tokio::spawn(async move {
            let mut dealer = Dealer::connect(&endpoint).await.unwrap();
            let ready = encode(&DiscoveryMessage::ready(Entity::agent(format!("agent-{i}")))).unwrap();
            // A repeated READY must update, not duplicate.
            dealer.send(ready.clone()).await.unwrap();
            dealer.send(ready).await.unwrap();
            for _ in 0..2 {
                tokio::time::timeout(DEADLINE, dealer.recv())
                    .await
                    .unwrap()
                    .unwrap();
            }
            dealer
        }));
    }
    let mut dealers = Vec::new();
    for join in joins {
        dealers.push(join.await.unwrap());
    }

    assert_eq!(client.get_number_of_agents(DEADLINE).await.unwrap(), 8);
    shutdown.trigger();
    runtime.wait().await.unwrap();
}

#[tokio::test]
async fn test_disconnect_removes_immediately() {
    let shutdown = Shutdown::new();
    let runtime = Broker::new(broker_config(1_000))
        .start(shutdown.subscribe())
        .await
        .unwrap();
    let client = fleet_client(&runtime);
    let handle = runtime.handle();

    let dealer = announce(&runtime, "leaving").await;
    assert_eq!(handle.live_agent_count().await.unwrap(), 1);

    let bye = encode(&DiscoveryMessage::disconnect(Entity::agent("leaving"), None)).unwrap();
    dealer.send(bye).await.unwrap();
    assert_eq!(wait_for_count(&client, 0, Duration::from_secs(2)).await, 0);
    shutdown.trigger();
}

#[tokio::test]
async fn test_count_unavailable_after_shutdown() {
    let shutdown = Shutdown::new();
    let runtime = Broker::new(broker_config(1_000))
        .start(shutdown.subscribe())
        .await
        .unwrap();
    let handle = runtime.handle();
    shutdown.trigger();
    runtime.wait().await.unwrap();

    let err = handle.live_agent_count().await.unwrap_err();
    assert!(matches!(err, auxo_rpc::RpcError::Unavailable(_)));
}
