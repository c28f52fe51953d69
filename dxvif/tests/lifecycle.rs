//! Lifecycle tests for the virtual interface reconciler against the in-memory
//! provider. Time is paused, so convergence waits complete instantly.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tonic::Status;

use dxvif::clients::{DescribeFilter, MemoryClient, ProviderClient};
use dxvif::reconciler::{Reconciler, VirtualInterfaceReconciler};
use dxvif::{Error, LocalRecord, ReconcilerConfig, VirtualInterfaceSpec};

fn make_spec() -> VirtualInterfaceSpec {
    VirtualInterfaceSpec {
        connection_id: "dxcon-fg5678gh".to_string(),
        virtual_interface_name: "vif-prod".to_string(),
        vlan: 101,
        asn: 65000,
        auth_key: Some("s3cret".to_string()),
        amazon_address: Some("169.254.10.1/30".to_string()),
        customer_address: Some("169.254.10.2/30".to_string()),
        virtual_gateway_id: "vgw-12345678".to_string(),
        route_filter_prefixes: vec![
            "10.20.0.0/16".to_string(),
            "10.10.0.0/16".to_string(),
            "192.168.0.0/24".to_string(),
        ],
    }
}

fn reconciler(client: &Arc<MemoryClient>) -> VirtualInterfaceReconciler {
    reconciler_with(client, ReconcilerConfig::default())
}

fn reconciler_with(client: &Arc<MemoryClient>, config: ReconcilerConfig) -> VirtualInterfaceReconciler {
    let client: Arc<dyn ProviderClient> = client.clone();
    VirtualInterfaceReconciler::new(client, config)
}

async fn created(client: &Arc<MemoryClient>) -> LocalRecord {
    let mut record = LocalRecord::new(make_spec());
    reconciler(client).create(&mut record).await.unwrap();
    record
}

#[tokio::test(start_paused = true)]
async fn test_create_converges_and_describes_to_target() {
    let client = Arc::new(MemoryClient::with_script(["pending", "pending", "available"]));
    let mut record = LocalRecord::new(make_spec());

    let vi = reconciler(&client).create(&mut record).await.unwrap();

    assert_eq!(vi.state, "available");
    assert_eq!(record.id.as_deref(), Some(vi.virtual_interface_id.as_str()));
    assert_eq!(record.state.as_deref(), Some("available"));
    assert_eq!(client.describe_calls(), 3);

    let found = client
        .describe(&DescribeFilter::new("dxcon-fg5678gh", &vi.virtual_interface_id))
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert!(["confirming", "available"].contains(&found[0].state.as_str()));
}

#[tokio::test(start_paused = true)]
async fn test_create_accepts_confirming() {
    let client = Arc::new(MemoryClient::with_script(["pending", "confirming"]));
    let mut record = LocalRecord::new(make_spec());

    let vi = reconciler(&client).create(&mut record).await.unwrap();
    assert_eq!(vi.state, "confirming");
    assert!(record.is_present());
}

#[tokio::test(start_paused = true)]
async fn test_create_then_read_round_trips() {
    let client = Arc::new(MemoryClient::new());
    let mut record = LocalRecord::new(make_spec());
    let reconciler = reconciler(&client);

    reconciler.create(&mut record).await.unwrap();
    let vi = reconciler.read(&mut record).await.unwrap().unwrap();

    assert_eq!(vi.spec, make_spec());
    assert_eq!(record.spec, make_spec());
    assert_eq!(
        record.spec.route_filter_prefixes,
        vec!["10.20.0.0/16", "10.10.0.0/16", "192.168.0.0/24"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_create_rejected_clears_identity() {
    let client = Arc::new(MemoryClient::with_script(["pending", "rejected"]));
    let mut record = LocalRecord::new(make_spec());

    let err = reconciler(&client).create(&mut record).await.unwrap_err();

    match err {
        Error::UnexpectedState { state, .. } => assert_eq!(state, "rejected"),
        other => panic!("expected unexpected state, got {:?}", other),
    }
    assert!(!record.is_present());
    assert_eq!(record.state, None);
    // The half-created interface is removed on the provider side too.
    assert!(client.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_create_timeout_clears_identity() {
    let client = Arc::new(MemoryClient::with_script(["pending"]));
    let mut record = LocalRecord::new(make_spec());
    let config = ReconcilerConfig {
        create_timeout: Duration::from_secs(10),
        poll_interval: Duration::from_secs(1),
        ..ReconcilerConfig::default()
    };

    let started = tokio::time::Instant::now();
    let err = reconciler_with(&client, config)
        .create(&mut record)
        .await
        .unwrap_err();

    match err {
        Error::Timeout { last_state, .. } => assert_eq!(last_state, "pending"),
        other => panic!("expected timeout, got {:?}", other),
    }
    assert!(started.elapsed() <= Duration::from_secs(11));
    assert!(!record.is_present());
}

#[tokio::test(start_paused = true)]
async fn test_create_call_failure_leaves_record_empty() {
    let client = Arc::new(MemoryClient::new());
    client.fail_next_create(Status::invalid_argument("vlan in use"));
    let mut record = LocalRecord::new(make_spec());

    let err = reconciler(&client).create(&mut record).await.unwrap_err();

    match err {
        Error::Client { operation, id, .. } => {
            assert_eq!(operation, "create");
            assert_eq!(id, "vif-prod");
        }
        other => panic!("expected client error, got {:?}", other),
    }
    assert!(!record.is_present());
    assert!(client.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_create_describe_failure_is_fatal() {
    let client = Arc::new(MemoryClient::new());
    client.fail_next_describe(Status::unavailable("throttled"));
    let mut record = LocalRecord::new(make_spec());

    let err = reconciler(&client).create(&mut record).await.unwrap_err();

    assert!(matches!(err, Error::Client { operation: "describe", .. }));
    assert_eq!(client.describe_calls(), 1);
    assert!(!record.is_present());
}

#[tokio::test(start_paused = true)]
async fn test_create_twice_is_rejected() {
    let client = Arc::new(MemoryClient::new());
    let mut record = created(&client).await;
    let id = record.id.clone().unwrap();

    let err = reconciler(&client).create(&mut record).await.unwrap_err();

    assert!(matches!(err, Error::AlreadyCreated(ref existing) if *existing == id));
    assert_eq!(record.id, Some(id));
    assert_eq!(client.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_create_cancelled_by_shutdown() {
    let client = Arc::new(MemoryClient::with_script(["pending"]));
    let (tx, rx) = watch::channel(false);
    let reconciler = reconciler(&client).with_shutdown(rx);
    let mut record = LocalRecord::new(make_spec());

    let (result, _) = tokio::join!(reconciler.create(&mut record), async {
        tokio::time::sleep(Duration::from_secs(7)).await;
        tx.send(true).unwrap();
    });

    assert!(matches!(result, Err(Error::Cancelled { .. })));
    assert!(!record.is_present());
}

#[tokio::test(start_paused = true)]
async fn test_read_after_external_delete_clears_identity() {
    let client = Arc::new(MemoryClient::new());
    let mut record = created(&client).await;
    let id = record.id.clone().unwrap();

    assert!(client.remove(&id));
    let result = reconciler(&client).read(&mut record).await.unwrap();

    assert!(result.is_none());
    assert!(!record.is_present());
    // Desired attributes are kept for the next create.
    assert_eq!(record.spec, make_spec());
}

#[tokio::test(start_paused = true)]
async fn test_read_terminal_state_clears_identity() {
    let client = Arc::new(MemoryClient::new());
    let mut record = created(&client).await;
    let id = record.id.clone().unwrap();

    client.set_state(&id, "deleted");
    assert!(reconciler(&client).read(&mut record).await.unwrap().is_none());
    assert!(!record.is_present());
}

#[tokio::test(start_paused = true)]
async fn test_read_picks_up_drift() {
    let client = Arc::new(MemoryClient::new());
    let mut record = created(&client).await;
    let id = record.id.clone().unwrap();

    let mut remote = make_spec();
    remote.route_filter_prefixes.push("172.16.0.0/12".to_string());
    remote.customer_address = None;
    client.set_spec(&id, remote.clone());

    let vi = reconciler(&client).read(&mut record).await.unwrap().unwrap();
    assert_eq!(vi.spec, remote);
    assert_eq!(record.spec, remote);
    assert_eq!(record.id.as_deref(), Some(id.as_str()));
}

#[tokio::test(start_paused = true)]
async fn test_read_error_keeps_record() {
    let client = Arc::new(MemoryClient::new());
    let mut record = created(&client).await;
    let before = record.clone();

    client.fail_next_describe(Status::permission_denied("denied"));
    let err = reconciler(&client).read(&mut record).await.unwrap_err();

    assert!(matches!(err, Error::Client { .. }));
    assert_eq!(record, before);
}

#[tokio::test(start_paused = true)]
async fn test_read_without_identity() {
    let client = Arc::new(MemoryClient::new());
    let mut record = LocalRecord::new(make_spec());

    let err = reconciler(&client).read(&mut record).await.unwrap_err();
    assert!(matches!(err, Error::MissingId));
    assert_eq!(client.describe_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_update_only_reprobes() {
    let client = Arc::new(MemoryClient::new());
    let mut record = created(&client).await;
    let calls = client.describe_calls();

    // A changed desired attribute is not pushed to the provider.
    record.spec.vlan = 202;
    let vi = reconciler(&client).update(&mut record).await.unwrap().unwrap();

    assert_eq!(client.describe_calls(), calls + 1);
    assert_eq!(vi.spec.vlan, 101);
    assert_eq!(record.spec.vlan, 101);
}

#[tokio::test(start_paused = true)]
async fn test_update_after_external_delete_clears_identity() {
    let client = Arc::new(MemoryClient::new());
    let mut record = created(&client).await;
    client.remove(record.id.as_deref().unwrap());

    assert!(reconciler(&client).update(&mut record).await.unwrap().is_none());
    assert!(!record.is_present());
}

#[tokio::test(start_paused = true)]
async fn test_delete_is_idempotent() {
    let client = Arc::new(MemoryClient::new());
    let record = created(&client).await;
    let reconciler = reconciler(&client);

    let mut first = record.clone();
    reconciler.delete(&mut first).await.unwrap();
    assert!(!first.is_present());
    assert!(client.is_empty());

    // Same identity again: the provider reports not found.
    let mut second = record.clone();
    reconciler.delete(&mut second).await.unwrap();
    assert!(!second.is_present());
    assert_eq!(client.delete_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_delete_does_not_wait_by_default() {
    let client = Arc::new(MemoryClient::new());
    let mut record = created(&client).await;
    let calls = client.describe_calls();

    reconciler(&client).delete(&mut record).await.unwrap();
    assert_eq!(client.describe_calls(), calls);
}

#[tokio::test(start_paused = true)]
async fn test_delete_waits_for_removal_when_configured() {
    let client = Arc::new(MemoryClient::new());
    let mut record = created(&client).await;
    let calls = client.describe_calls();
    let config = ReconcilerConfig {
        wait_for_deletion: true,
        ..ReconcilerConfig::default()
    };

    reconciler_with(&client, config).delete(&mut record).await.unwrap();
    assert_eq!(client.describe_calls(), calls + 1);
    assert!(!record.is_present());
}

#[tokio::test(start_paused = true)]
async fn test_delete_failure_keeps_identity() {
    let client = Arc::new(MemoryClient::new());
    let mut record = created(&client).await;
    client.fail_next_delete(Status::failed_precondition("interface busy"));

    let err = reconciler(&client).delete(&mut record).await.unwrap_err();

    assert!(matches!(err, Error::Client { operation: "delete", .. }));
    assert!(record.is_present());
    assert_eq!(client.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_delete_without_identity_is_noop() {
    let client = Arc::new(MemoryClient::new());
    let mut record = LocalRecord::new(make_spec());

    reconciler(&client).delete(&mut record).await.unwrap();
    assert_eq!(client.delete_calls(), 0);
}
