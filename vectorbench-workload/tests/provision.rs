//! Provisioning against the in-memory index client.

use serde_json::{Value, json};
use vectorbench_test::client::{Call, CountingContext, InMemoryClient};
use vectorbench_workload::provision::{CREATE_INDICES_RUNNER, NoopContext};
use vectorbench_workload::{
    ClientError, Options, ProvisionError, Registry, RunnerResponse, WorkloadError,
    create_tenant_indices,
};

fn options(value: Value) -> Options {
    match value {
        Value::Object(map) => map,
        _ => panic!("expected an object"),
    }
}

fn expected_calls(prefix: &str, tenants: usize) -> Vec<Call> {
    (0..tenants)
        .flat_map(|i| {
            let index = format!("{prefix}_{i}");
            [Call::Delete(index.clone()), Call::Create(index)]
        })
        .collect()
}

#[tokio::test]
async fn recreates_every_tenant_in_order() {
    vectorbench_test::tracing::init();
    let client = InMemoryClient::new().with_index("tenant_1");
    let mut context = CountingContext::default();

    let response = create_tenant_indices(
        &client,
        &mut context,
        &options(json!({"num_tenants": 3, "index_prefix": "tenant", "dims": 16})),
    )
    .await
    .unwrap();

    assert_eq!(
        response,
        RunnerResponse {
            success: true,
            weight: 1,
            unit: "ops",
        }
    );
    assert_eq!(client.calls(), expected_calls("tenant", 3));
    assert_eq!(client.index_names(), ["tenant_0", "tenant_1", "tenant_2"]);
    assert_eq!(context.started, 3);
    assert_eq!(context.ended, 3);

    let body = client.index("tenant_2").unwrap();
    assert_eq!(
        body["mappings"]["properties"]["target_field"]["dimension"],
        json!(16)
    );
}

#[tokio::test]
async fn running_twice_is_idempotent() {
    let client = InMemoryClient::new();
    let raw = options(json!({"num_tenants": 2}));

    for _ in 0..2 {
        create_tenant_indices(&client, &mut NoopContext, &raw)
            .await
            .unwrap();
    }

    assert_eq!(client.index_names(), ["tenant_index_0", "tenant_index_1"]);
    assert_eq!(client.calls().len(), 8);
}

#[tokio::test]
async fn create_failure_aborts_remaining_tenants() {
    let client = InMemoryClient::new().fail_create("tenant_1", 500);

    let err = create_tenant_indices(
        &client,
        &mut NoopContext,
        &options(json!({"num_tenants": 3, "index_prefix": "tenant"})),
    )
    .await
    .unwrap_err();

    match err {
        ProvisionError::Create {
            index,
            cause: ClientError::Status { status, .. },
        } => {
            assert_eq!(index, "tenant_1");
            assert_eq!(status, 500);
        }
        other => panic!("unexpected error {other:?}"),
    }

    // Partial provisioning: tenant 0 exists, tenant 2 was never touched.
    assert_eq!(
        client.calls(),
        [
            Call::Delete("tenant_0".into()),
            Call::Create("tenant_0".into()),
            Call::Delete("tenant_1".into()),
            Call::Create("tenant_1".into()),
        ]
    );
    assert_eq!(client.index_names(), ["tenant_0"]);
}

#[tokio::test]
async fn delete_failure_other_than_not_found_aborts() {
    let client = InMemoryClient::new().fail_delete("tenant_index_0", 403);

    let err = create_tenant_indices(&client, &mut NoopContext, &options(json!({"num_tenants": 2})))
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionError::Delete { ref index, .. } if index == "tenant_index_0"));
    assert_eq!(client.calls(), [Call::Delete("tenant_index_0".into())]);
}

#[tokio::test]
async fn invalid_options_fail_before_any_call() {
    let client = InMemoryClient::new();

    let err = create_tenant_indices(&client, &mut NoopContext, &options(json!({"dims": 0})))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ProvisionError::Options(WorkloadError::InvalidOption { name: "dims", .. })
    ));
    assert!(client.calls().is_empty());
}

#[tokio::test]
async fn zero_tenants_fail_before_any_call() {
    let client = InMemoryClient::new();

    let err = create_tenant_indices(&client, &mut NoopContext, &options(json!({"num_tenants": 0})))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ProvisionError::Options(WorkloadError::InvalidOption {
            name: "num_tenants",
            ..
        })
    ));
    assert!(client.calls().is_empty());
}

#[tokio::test]
async fn numeric_settings_reach_the_index_body() {
    let client = InMemoryClient::new();

    create_tenant_indices(
        &client,
        &mut NoopContext,
        &options(json!({
            "num_tenants": 2,
            "index_prefix": 2024,
            "refresh_interval": -1,
            "approximate_graph_build_threshold": 0,
        })),
    )
    .await
    .unwrap();

    assert_eq!(client.calls(), expected_calls("2024", 2));
    let body = client.index("2024_1").unwrap();
    let index = &body["settings"]["index"];
    assert_eq!(index["refresh_interval"], json!(-1));
    assert_eq!(index["knn.advanced.approximate_threshold"], json!(0));
}

#[tokio::test]
async fn runs_through_the_registry() {
    let registry = Registry::with_defaults();
    let client = InMemoryClient::new();
    let raw = options(json!({"num_tenants": 2, "index_prefix": "reg"}));

    // The setup source hands the options to the runner unchanged.
    let mut setup = registry
        .param_source("multi-tenant-setup-param-source", &raw)
        .unwrap()
        .partition(0, 1);
    let setup_options = match setup.params().into_descriptor() {
        Some(vectorbench_workload::RequestDescriptor::Setup(options)) => options,
        other => panic!("unexpected {other:?}"),
    };

    let runner = registry.runner(CREATE_INDICES_RUNNER).unwrap();
    let mut context = CountingContext::default();
    let response = runner(&client, &mut context, &setup_options).await.unwrap();

    assert!(response.success);
    assert_eq!(client.calls(), expected_calls("reg", 2));
}
