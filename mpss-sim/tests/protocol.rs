//! End-to-end protocol runs: board plus nodes over real TCP listeners.
//!
//! Every scenario boots the full deployment on ephemeral ports, runs a
//! number of re-sharing epochs and checks the board's diagnostic secret
//! recovery for every epoch, bootstrap included.

use std::{collections::BTreeMap, time::Duration};

use mpss_board::{BoardArgs, RecoveredSecret};
use mpss_common::{
    bootstrap,
    config::{PeerConfig, PrimaryConfig, SystemConfig},
};
use mpss_core::NodeId;
use mpss_node::NodeArgs;
use mpss_types::Epoch;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

struct Deployment {
    config: SystemConfig,
    board_listener: TcpListener,
    node_listeners: BTreeMap<String, TcpListener>,
}

/// Binds ephemeral listeners first so the config can carry real addresses.
async fn deployment(
    degree: usize,
    ids: &[u64],
    old_group: Option<Vec<u64>>,
    new_group: Option<Vec<u64>>,
) -> Deployment {
    let board_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let primary = PrimaryConfig {
        url: board_listener.local_addr().unwrap().to_string(),
    };

    let mut peers = BTreeMap::new();
    let mut node_listeners = BTreeMap::new();
    for &id in ids {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let label = format!("node_{id}");
        peers.insert(
            label.clone(),
            PeerConfig {
                id: NodeId(id),
                url: listener.local_addr().unwrap().to_string(),
            },
        );
        node_listeners.insert(label, listener);
    }

    Deployment {
        config: SystemConfig {
            degree,
            old_group,
            new_group,
            primary,
            peers,
        },
        board_listener,
        node_listeners,
    }
}

/// Runs the whole protocol and returns one recovery per epoch, bootstrap
/// included.
async fn run_protocol(deployment: Deployment, epochs: u32) -> Vec<RecoveredSecret> {
    let Deployment {
        config,
        board_listener,
        node_listeners,
    } = deployment;
    let cancellation_token = CancellationToken::new();

    let mut board = mpss_board::start(BoardArgs {
        config: config.clone(),
        listener: board_listener,
        allow_suicide: false,
        cancellation_token: cancellation_token.clone(),
    })
    .await
    .unwrap();

    let mut nodes = Vec::new();
    for (label, listener) in node_listeners {
        nodes.push(
            mpss_node::start(NodeArgs {
                config: config.clone(),
                label,
                max_epoch: Epoch(epochs),
                listener,
                cancellation_token: cancellation_token.clone(),
            })
            .await
            .unwrap(),
        );
    }

    let mut recoveries = Vec::new();
    for _ in 0..=epochs {
        recoveries.push(board.recovered_secrets.recv().await.unwrap());
    }

    for node in nodes {
        node.protocol.await.unwrap().unwrap();
    }

    cancellation_token.cancel();
    board.board.await.unwrap().unwrap();
    recoveries
}

#[tokio::test(flavor = "multi_thread")]
async fn single_epoch_recovers_the_secret() {
    let deployment = deployment(1, &[1, 2, 3, 4], None, None).await;
    let recoveries = tokio::time::timeout(Duration::from_secs(120), run_protocol(deployment, 1))
        .await
        .expect("protocol run timed out");

    assert_eq!(recoveries.len(), 2);
    for (index, recovery) in recoveries.iter().enumerate() {
        assert_eq!(recovery.epoch, Epoch(index as u32));
        assert_eq!(recovery.secret, bootstrap::bootstrap_secret());
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn three_epochs_keep_recovering_the_secret() {
    let deployment = deployment(2, &[1, 2, 3, 4, 5, 6, 7], None, None).await;
    let recoveries = tokio::time::timeout(Duration::from_secs(120), run_protocol(deployment, 3))
        .await
        .expect("protocol run timed out");

    assert_eq!(recoveries.len(), 4);
    for recovery in &recoveries {
        assert_eq!(recovery.secret, bootstrap::bootstrap_secret());
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn disjoint_rotation_hands_the_secret_over() {
    let deployment = deployment(
        1,
        &[1, 2, 3, 4, 5, 6, 7, 8],
        Some(vec![1, 2, 3, 4]),
        Some(vec![5, 6, 7, 8]),
    )
    .await;
    let recoveries = tokio::time::timeout(Duration::from_secs(120), run_protocol(deployment, 1))
        .await
        .expect("protocol run timed out");

    assert_eq!(recoveries.len(), 2);
    assert_eq!(recoveries[0].secret, bootstrap::bootstrap_secret());
    assert_eq!(recoveries[1].secret, bootstrap::bootstrap_secret());
}
