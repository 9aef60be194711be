mod common;

use common::*;
use nacosctl::cluster::{
    DatasourceMode, ExternalDatabase, JoinOptions, LeaveOptions, TopologyStore,
};
use nacosctl::error::NacosctlError;
use nacosctl::node::StartMode;
use nacosctl::properties;
use std::fs;
use tempfile::TempDir;

fn join_opts(cluster_id: &str) -> JoinOptions {
    JoinOptions {
        cluster_id: cluster_id.to_string(),
        base_port: 8848,
        auto_start: false,
        detach: true,
        ready_timeout_secs: 5,
    }
}

#[tokio::test]
async fn test_join_extends_membership_everywhere() {
    let root = TempDir::new().unwrap();
    let cache = seeded_cache(&root.path().join("cache"), TEST_VERSION);
    let lifecycle = RecordingLifecycle::new();
    let orchestrator = orchestrator_with(root.path(), cache, lifecycle.clone());

    // Created detached, so membership is fully converged on disk.
    let mut opts = create_opts("pair");
    opts.node_count = 2;
    orchestrator.create_cluster(&opts).await.unwrap();

    let summary = orchestrator.join_cluster(&join_opts("pair")).await.unwrap();
    assert_eq!(summary.nodes.len(), 1);
    assert_eq!(summary.nodes[0].index, 2);
    assert_eq!(summary.nodes[0].ports.main, 8868);
    assert_eq!(summary.nodes[0].ports.console, Some(8100));

    // Every membership file, old and new, now lists all three nodes.
    let cluster_dir = root.path().join("pair");
    let expected = vec![
        "127.0.0.1:8848".to_string(),
        "127.0.0.1:8858".to_string(),
        "127.0.0.1:8868".to_string(),
    ];
    for i in 0..3 {
        let node_dir = cluster_dir.join(format!("{i}-v{TEST_VERSION}"));
        assert_eq!(
            TopologyStore::read_node_membership(&node_dir).unwrap(),
            expected,
            "membership of node {i}"
        );
    }
    let store = TopologyStore::new(&cluster_dir);
    assert_eq!(store.read_master_membership().unwrap(), expected);

    // The joined node runs with the cluster's original secrets.
    let secrets = store.load_shared_secrets().unwrap();
    let config = cluster_dir.join(format!("2-v{TEST_VERSION}/conf/application.properties"));
    assert_eq!(
        properties::read_property(
            &config,
            "nacos.core.auth.plugin.nacos.token.secret.key"
        )
        .unwrap(),
        Some(secrets.token_secret)
    );
}

#[tokio::test]
async fn test_join_starts_only_the_new_node() {
    let root = TempDir::new().unwrap();
    let cache = seeded_cache(&root.path().join("cache"), TEST_VERSION);
    let lifecycle = RecordingLifecycle::new();
    let orchestrator = orchestrator_with(root.path(), cache, lifecycle.clone());

    let mut opts = create_opts("grow");
    opts.node_count = 2;
    opts.auto_start = false;
    orchestrator.create_cluster(&opts).await.unwrap();

    let mut join = join_opts("grow");
    join.auto_start = true;
    orchestrator.join_cluster(&join).await.unwrap();

    let starts = lifecycle.starts();
    assert_eq!(starts.len(), 1);
    assert!(starts[0].dir.ends_with(format!("2-v{TEST_VERSION}")));
    assert_eq!(starts[0].mode, StartMode::Cluster);
    assert!(starts[0].embedded);
    // The admin account was initialized at create time, not again.
    assert!(lifecycle.passwords().is_empty());
}

#[tokio::test]
async fn test_join_requires_cluster_state() {
    let root = TempDir::new().unwrap();
    let cache = seeded_cache(&root.path().join("cache"), TEST_VERSION);
    let orchestrator = orchestrator_with(root.path(), cache, RecordingLifecycle::new());

    assert!(matches!(
        orchestrator.join_cluster(&join_opts("ghost")).await.unwrap_err(),
        NacosctlError::MissingClusterState(_)
    ));

    // A directory without any node directories is just as unusable.
    fs::create_dir_all(root.path().join("hollow")).unwrap();
    assert!(matches!(
        orchestrator.join_cluster(&join_opts("hollow")).await.unwrap_err(),
        NacosctlError::MissingClusterState(_)
    ));
}

#[tokio::test]
async fn test_join_inherits_the_external_datasource() {
    let root = TempDir::new().unwrap();
    let cache = seeded_cache(&root.path().join("cache"), TEST_VERSION);
    let lifecycle = RecordingLifecycle::new();
    let orchestrator = orchestrator_with(root.path(), cache, lifecycle.clone());

    let mut opts = create_opts("shared-db");
    opts.node_count = 1;
    opts.auto_start = false;
    opts.datasource = DatasourceMode::External(ExternalDatabase {
        url: "jdbc:mysql://db:3306/nacos".to_string(),
        user: "nacos".to_string(),
        password: "secret".to_string(),
    });
    orchestrator.create_cluster(&opts).await.unwrap();

    let mut join = join_opts("shared-db");
    join.auto_start = true;
    orchestrator.join_cluster(&join).await.unwrap();

    let config = root
        .path()
        .join(format!("shared-db/1-v{TEST_VERSION}/conf/application.properties"));
    assert_eq!(
        properties::read_property(&config, "spring.datasource.platform").unwrap(),
        Some("mysql".to_string())
    );
    assert_eq!(
        properties::read_property(&config, "db.url.0").unwrap(),
        Some("jdbc:mysql://db:3306/nacos".to_string())
    );
    // External storage, so the launch does not pass the embedded flag.
    assert!(!lifecycle.starts()[0].embedded);
}

#[tokio::test]
async fn test_leave_contracts_membership() {
    let root = TempDir::new().unwrap();
    let cache = seeded_cache(&root.path().join("cache"), TEST_VERSION);
    let orchestrator = orchestrator_with(root.path(), cache, RecordingLifecycle::new());

    // Started detached so every membership file lists all three nodes.
    let opts = create_opts("shrink");
    orchestrator.create_cluster(&opts).await.unwrap();

    orchestrator
        .leave_cluster(&LeaveOptions {
            cluster_id: "shrink".to_string(),
            index: 1,
        })
        .await
        .unwrap();

    let cluster_dir = root.path().join("shrink");
    assert!(!cluster_dir.join(format!("1-v{TEST_VERSION}")).exists());

    let expected = vec!["127.0.0.1:8848".to_string(), "127.0.0.1:8868".to_string()];
    for i in [0, 2] {
        let node_dir = cluster_dir.join(format!("{i}-v{TEST_VERSION}"));
        assert_eq!(
            TopologyStore::read_node_membership(&node_dir).unwrap(),
            expected
        );
    }
    let store = TopologyStore::new(&cluster_dir);
    assert_eq!(store.read_master_membership().unwrap(), expected);

    // The node is gone; removing it again cannot work.
    let err = orchestrator
        .leave_cluster(&LeaveOptions {
            cluster_id: "shrink".to_string(),
            index: 1,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, NacosctlError::MissingClusterState(_)));
}

#[tokio::test]
async fn test_leave_without_recorded_ports_only_removes_the_directory() {
    let root = TempDir::new().unwrap();
    let cache = seeded_cache(&root.path().join("cache"), TEST_VERSION);
    let orchestrator = orchestrator_with(root.path(), cache, RecordingLifecycle::new());

    let mut opts = create_opts("ragged");
    opts.node_count = 2;
    orchestrator.create_cluster(&opts).await.unwrap();

    let cluster_dir = root.path().join("ragged");
    fs::remove_file(cluster_dir.join(format!("1-v{TEST_VERSION}/conf/application.properties")))
        .unwrap();

    orchestrator
        .leave_cluster(&LeaveOptions {
            cluster_id: "ragged".to_string(),
            index: 1,
        })
        .await
        .unwrap();

    assert!(!cluster_dir.join(format!("1-v{TEST_VERSION}")).exists());
    // Without the node's recorded main port the membership files stay
    // as they were.
    let node0 = cluster_dir.join(format!("0-v{TEST_VERSION}"));
    let members = TopologyStore::read_node_membership(&node0).unwrap();
    assert!(members.contains(&"127.0.0.1:8858".to_string()));
}

#[tokio::test]
async fn test_clean_removes_the_cluster() {
    let root = TempDir::new().unwrap();
    let cache = seeded_cache(&root.path().join("cache"), TEST_VERSION);
    let orchestrator = orchestrator_with(root.path(), cache, RecordingLifecycle::new());

    let mut opts = create_opts("gone");
    opts.auto_start = false;
    orchestrator.create_cluster(&opts).await.unwrap();
    assert!(root.path().join("gone").is_dir());

    orchestrator.clean_cluster("gone").await.unwrap();
    assert!(!root.path().join("gone").exists());

    assert!(matches!(
        orchestrator.clean_cluster("gone").await.unwrap_err(),
        NacosctlError::MissingClusterState(_)
    ));
}
