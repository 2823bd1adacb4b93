//! Formation tests against the in-process cluster.

use pst_cluster::{BarrierConfigBuilder, BarrierState, ClusterBarrier, LocalCluster, NodeId};
use std::time::Duration;

fn barrier(expected: usize) -> ClusterBarrier {
    ClusterBarrier::new(
        BarrierConfigBuilder::new()
            .expected_size(expected)
            .poll_interval(Duration::from_millis(100))
            .timeout(Duration::from_secs(1))
            .build(),
    )
}

#[tokio::test(start_paused = true)]
async fn test_forms_when_peer_joins_late() {
    let cluster: LocalCluster<()> = LocalCluster::new();
    let view = cluster.join(NodeId::new("node-1"), ());

    let joiner = cluster.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(250)).await;
        joiner.join(NodeId::new("node-2"), ());
    });

    let outcome = barrier(2).wait(&view).await;

    assert_eq!(outcome.state, BarrierState::Formed);
    assert_eq!(outcome.observed_size, 2);
    assert!(outcome.elapsed < Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_times_out_when_peer_never_joins() {
    let cluster: LocalCluster<()> = LocalCluster::new();
    let view = cluster.join(NodeId::new("node-1"), ());

    let outcome = barrier(2).wait(&view).await;

    assert_eq!(outcome.state, BarrierState::TimedOut);
    assert!(!outcome.is_formed());
}

#[tokio::test(start_paused = true)]
async fn test_both_members_pass_the_same_barrier() {
    let cluster: LocalCluster<()> = LocalCluster::new();
    let first = cluster.join(NodeId::new("node-1"), ());
    let second = cluster.join(NodeId::new("node-2"), ());

    let barrier = barrier(2);
    let (a, b) = tokio::join!(barrier.wait(&first), barrier.wait(&second));

    assert!(a.is_formed());
    assert!(b.is_formed());
}

#[tokio::test(start_paused = true)]
async fn test_departure_before_wait_is_observed() {
    let cluster: LocalCluster<()> = LocalCluster::new();
    let view = cluster.join(NodeId::new("node-1"), ());
    let other = cluster.join(NodeId::new("node-2"), ());
    other.leave();

    let outcome = barrier(2).wait(&view).await;

    assert_eq!(outcome.state, BarrierState::TimedOut);
    assert_eq!(outcome.observed_size, 1);
}
