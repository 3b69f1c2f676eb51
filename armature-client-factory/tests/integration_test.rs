//! Integration tests for client assembly and calls against a mock server.

use armature_client_factory::*;
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// =============================================================================
// Fixtures
// =============================================================================

fn users_interface() -> ClientInterfaceDescriptor {
    ClientInterfaceDescriptor::new("users")
        .header("Accept: application/json")
        .operation(OperationDescriptor::new("get_user", "GET /users/{id}"))
        .operation(OperationDescriptor::new("search", "GET /users?name={name}"))
        .operation(OperationDescriptor::new("create", "POST /users"))
}

fn discovery() -> StaticDiscovery {
    StaticDiscovery::new()
        .register(users_interface())
        .interceptor("first")
        .interceptor("second")
}

fn users() -> InterfaceId {
    InterfaceId::from("users")
}

fn id(value: u32) -> Arguments {
    Arguments::new().param("id", value)
}

/// Marks every failure as retryable.
struct AlwaysRetry;

impl ErrorDecoder for AlwaysRetry {
    fn decode(&self, operation: &str, response: &Response) -> HttpClientError {
        HttpClientError::Retryable {
            status: Some(response.status().as_u16()),
            message: format!("{} failed", operation),
            retry_after: None,
        }
    }
}

/// Retries up to three attempts without waiting.
struct ThreeAttempts;

impl RetryStrategy for ThreeAttempts {
    fn should_retry(&self, attempt: u32, error: &HttpClientError) -> bool {
        attempt < 3 && error.is_retryable()
    }

    fn retry_delay(&self, _attempt: u32, _error: &HttpClientError) -> Duration {
        Duration::ZERO
    }
}

/// Default contract that records being used.
struct FlaggingContract {
    used: Arc<AtomicBool>,
}

impl Contract for FlaggingContract {
    fn parse(
        &self,
        interface: &ClientInterfaceDescriptor,
        operation: &OperationDescriptor,
    ) -> std::result::Result<MethodMetadata, BoxError> {
        self.used.store(true, Ordering::SeqCst);
        DefaultContract.parse(interface, operation)
    }
}

/// Appends its name to the `X-Order` header.
struct OrderInterceptor(&'static str);

impl RequestInterceptor for OrderInterceptor {
    fn apply(&self, template: &mut RequestTemplate) {
        let value = match template.headers().get("x-order").and_then(|v| v.to_str().ok()) {
            Some(existing) => format!("{}>{}", existing, self.0),
            None => self.0.to_string(),
        };
        template.header("X-Order", value);
    }
}

/// Fallback factory recording whether it was triggered by a timeout.
struct CauseRecorder {
    timed_out: Arc<Mutex<Option<bool>>>,
}

impl FallbackFactory for CauseRecorder {
    fn create(&self, cause: &HttpClientError) -> Arc<dyn Fallback> {
        *self.timed_out.lock() = Some(cause.is_timeout());
        Arc::new(|_: &str, _: &Arguments| -> Result<Value> { Ok(json!({"source": "fallback"})) })
    }
}

fn registry() -> ComponentRegistry {
    ComponentRegistry::new()
        .register_error_decoder("always-retry", || Ok(Arc::new(AlwaysRetry)))
        .register_retryer("three-attempts", || Ok(Arc::new(ThreeAttempts)))
        .register_interceptor("first", || Ok(Arc::new(OrderInterceptor("first"))))
        .register_interceptor("second", || Ok(Arc::new(OrderInterceptor("second"))))
        .register_fallback("canned", || {
            Ok(Arc::new(|op: &str, _: &Arguments| -> Result<Value> {
                Ok(json!({"source": "canned", "operation": op}))
            }))
        })
}

fn factory(config: GlobalConfig, present: bool) -> ClientFactory {
    ClientFactory::new(config, &discovery(), registry()).with_presence(present)
}

fn endpoint(server: &MockServer) -> EndpointConfigBuilder {
    EndpointConfig::builder().base_url(format!("{}/api", server.uri()))
}

// =============================================================================
// Calls
// =============================================================================

#[tokio::test]
async fn test_nominal_call() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/users/42"))
        .and(header("accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 42, "name": "ann"})))
        .expect(1)
        .mount(&server)
        .await;

    let config = GlobalConfig::new().with_endpoint("users", endpoint(&server).build());
    let client = factory(config, false).build(&users()).unwrap();

    let user = client.invoke("get_user", &id(42)).await.unwrap();
    assert_eq!(user["name"], "ann");
}

#[tokio::test]
async fn test_query_and_json_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/users"))
        .and(query_param("name", "ann lee"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/users"))
        .and(body_json(json!({"name": "ann"})))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let config = GlobalConfig::new().with_endpoint("users", endpoint(&server).build());
    let client = factory(config, false).build(&users()).unwrap();

    let found = client
        .invoke("search", &Arguments::new().param("name", "ann lee"))
        .await
        .unwrap();
    assert_eq!(found, json!([]));

    let created = client
        .invoke("create", &Arguments::new().param("name", "ann"))
        .await
        .unwrap();
    assert_eq!(created, Value::Null);
}

#[tokio::test]
async fn test_interceptors_run_in_declared_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("x-order", "second>first"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let config = GlobalConfig::new().with_endpoint(
        "users",
        endpoint(&server).interceptor("second").interceptor("first").build(),
    );
    let client = factory(config, false).build(&users()).unwrap();

    client.invoke("get_user", &id(1)).await.unwrap();
}

#[tokio::test]
async fn test_custom_contract_is_used() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/users/5"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let used = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&used);
    let registry = registry().register_contract("flagging", move || {
        Ok(Arc::new(FlaggingContract {
            used: Arc::clone(&flag),
        }))
    });

    let config = GlobalConfig::new().with_endpoint("users", endpoint(&server).contract("flagging").build());
    let client = ClientFactory::new(config, &discovery(), registry)
        .build(&users())
        .unwrap();

    assert!(used.load(Ordering::SeqCst));
    assert_eq!(client.profile().contract, Some(TypeRef::from("flagging")));
    client.invoke("get_user", &id(5)).await.unwrap();
}

#[tokio::test]
async fn test_custom_target_routes_to_its_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/users/3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 3})))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/v2", server.uri());
    let registry = registry().register_target("users-v2", move || Ok(Arc::new(UrlTarget::new("users", url.clone()))));

    let config = GlobalConfig::new().with_endpoint("users", EndpointConfig::builder().target("users-v2").build());
    let client = ClientFactory::new(config, &discovery(), registry)
        .build(&users())
        .unwrap();

    assert_eq!(client.target().custom_type(), Some(&TypeRef::from("users-v2")));
    assert_eq!(client.invoke("get_user", &id(3)).await.unwrap(), json!({"id": 3}));
}

#[tokio::test]
async fn test_shared_transport_honours_endpoint_redirect_policy() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/users/1"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", format!("{}/moved", server.uri())))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/moved"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"followed": true})))
        .mount(&server)
        .await;

    let transport = Arc::new(ReqwestTransport::new(&RequestOptions::default()).unwrap());

    let pinned = GlobalConfig::new().with_endpoint("users", endpoint(&server).follow_redirects(false).build());
    let client = factory(pinned, false)
        .with_transport(transport.clone())
        .build(&users())
        .unwrap();
    assert!(!client.options().follow_redirects);
    let err = client.invoke("get_user", &id(1)).await.unwrap_err();
    assert_eq!(err.status_code(), Some(302));

    let following = GlobalConfig::new().with_endpoint("users", endpoint(&server).build());
    let client = factory(following, false)
        .with_transport(transport.clone())
        .build(&users())
        .unwrap();
    let value = client.invoke("get_user", &id(1)).await.unwrap();
    assert_eq!(value, json!({"followed": true}));

    assert_eq!(transport.pooled_clients(), 2);
}

// =============================================================================
// Retry
// =============================================================================

#[tokio::test]
async fn test_endpoint_retry_makes_max_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(4)
        .mount(&server)
        .await;

    let config = GlobalConfig::new().with_endpoint(
        "users",
        endpoint(&server)
            .retry(RetryParams::new(100, 1000, 4))
            .error_decoder("always-retry")
            .resilience_mode(ResilienceMode::Disabled)
            .build(),
    );
    let client = factory(config, true).build(&users()).unwrap();

    let err = client.invoke("get_user", &id(1)).await.unwrap_err();
    assert!(matches!(err, HttpClientError::RetryExhausted { attempts: 4, .. }));
    assert_eq!(err.status_code(), Some(500));
}

#[tokio::test]
async fn test_global_inactive_retry_makes_one_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let config = GlobalConfig::new()
        .with_retry(RetryParams::inactive())
        .with_endpoint("users", endpoint(&server).error_decoder("always-retry").build());
    let client = factory(config, false).build(&users()).unwrap();

    assert_eq!(client.profile().retry, RetryPolicyDecision::Never { scope: RetryScope::Global });
    let err = client.invoke("get_user", &id(1)).await.unwrap_err();
    assert!(matches!(err, HttpClientError::Retryable { status: Some(500), .. }));
}

#[tokio::test]
async fn test_global_custom_retryer() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let config = GlobalConfig::new()
        .with_retryer("three-attempts")
        .with_endpoint("users", endpoint(&server).build());
    let client = factory(config, false).build(&users()).unwrap();

    let err = client.invoke("get_user", &id(1)).await.unwrap_err();
    assert!(matches!(err, HttpClientError::RetryExhausted { attempts: 3, .. }));
}

#[test]
fn test_conflicting_retry_config_names_scope() {
    let endpoint_conflict = GlobalConfig::new().with_endpoint(
        "users",
        EndpointConfig::builder()
            .base_url("http://svc")
            .retryer("three-attempts")
            .retry(RetryParams::default())
            .build(),
    );
    let err = factory(endpoint_conflict, true).build(&users()).unwrap_err();
    assert_eq!(
        err.as_configuration(),
        Some(&ConfigurationError::ConflictingRetryConfig {
            scope: RetryScope::Endpoint
        })
    );

    let global_conflict = GlobalConfig::new()
        .with_retryer("three-attempts")
        .with_retry(RetryParams::default())
        .with_endpoint(
            "users",
            EndpointConfig::builder()
                .base_url("http://svc")
                .retry(RetryParams::new(10, 20, 2))
                .build(),
        );
    let err = factory(global_conflict, true).build(&users()).unwrap_err();
    assert_eq!(
        err.as_configuration(),
        Some(&ConfigurationError::ConflictingRetryConfig {
            scope: RetryScope::Global
        })
    );
}

#[test]
fn test_endpoint_retry_overrides_global() {
    let config = GlobalConfig::new().with_retryer("three-attempts").with_endpoint(
        "users",
        EndpointConfig::builder()
            .base_url("http://svc")
            .retry(RetryParams::inactive())
            .build(),
    );

    let client = factory(config, true).build(&users()).unwrap();
    assert_eq!(
        client.profile().retry,
        RetryPolicyDecision::Never {
            scope: RetryScope::Endpoint
        }
    );
}

// =============================================================================
// Resilience
// =============================================================================

#[test]
fn test_resilience_modes() {
    let build = |mode: ResilienceMode, present: bool, fallback: Option<&str>| {
        let mut endpoint = EndpointConfig::builder().base_url("http://svc").resilience_mode(mode);
        if let Some(fallback) = fallback {
            endpoint = endpoint.fallback(fallback);
        }
        factory(GlobalConfig::new().with_endpoint("users", endpoint.build()), present).build(&users())
    };

    let not_present = Some(&ResilienceError::RuntimeNotPresent { endpoint: users() });

    let err = build(ResilienceMode::Enabled, false, None).unwrap_err();
    assert_eq!(err.as_resilience(), not_present);

    let client = build(ResilienceMode::Auto, false, None).unwrap();
    assert!(!client.is_wrapped());

    let err = build(ResilienceMode::Disabled, true, Some("canned")).unwrap_err();
    assert_eq!(err.as_resilience(), not_present);

    let client = build(ResilienceMode::Auto, true, Some("canned")).unwrap();
    assert!(client.is_wrapped() && client.has_fallback());
}

#[tokio::test]
async fn test_static_fallback_on_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let config = GlobalConfig::new().with_endpoint(
        "users",
        endpoint(&server)
            .resilience_mode(ResilienceMode::Enabled)
            .fallback("canned")
            .build(),
    );
    let client = factory(config, true).build(&users()).unwrap();

    let value = client.invoke("get_user", &id(404)).await.unwrap();
    assert_eq!(value, json!({"source": "canned", "operation": "get_user"}));
}

#[tokio::test]
async fn test_fallback_factory_receives_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let timed_out = Arc::new(Mutex::new(None));
    let recorder = Arc::clone(&timed_out);
    let registry = registry().register_fallback_factory("recorder", move || {
        Ok(Arc::new(CauseRecorder {
            timed_out: Arc::clone(&recorder),
        }))
    });

    let config = GlobalConfig::new().with_endpoint(
        "users",
        endpoint(&server)
            .timeouts(1_000, 50, TimeUnit::Milliseconds)
            .retry(RetryParams::inactive())
            .fallback("recorder")
            .build(),
    );
    let client = ClientFactory::new(config, &discovery(), registry)
        .with_presence(true)
        .build(&users())
        .unwrap();

    let value = client.invoke("get_user", &id(1)).await.unwrap();
    assert_eq!(value, json!({"source": "fallback"}));
    assert_eq!(*timed_out.lock(), Some(true));
}

#[tokio::test]
async fn test_open_circuit_short_circuits_to_fallback() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let config = GlobalConfig::new().with_endpoint(
        "users",
        endpoint(&server)
            .retry(RetryParams::inactive())
            .fallback("canned")
            .circuit_breaker(CircuitBreakerConfig::new(2, Duration::from_secs(60)))
            .build(),
    );
    let client = factory(config, true).build(&users()).unwrap();

    for _ in 0..4 {
        let value = client.invoke("get_user", &id(1)).await.unwrap();
        assert_eq!(value["source"], "canned");
    }
    assert_eq!(client.circuit_state(), Some(CircuitState::Open));
}

// =============================================================================
// Assembly
// =============================================================================

#[test]
fn test_literal_target_scenario() {
    let config = GlobalConfig::new().with_endpoint("users", EndpointConfig::with_base_url("http://svc/api"));
    let client = factory(config, true).build(&users()).unwrap();

    assert_eq!(client.target().url(), "http://svc/api");
    assert_eq!(client.target().interface(), &users());
}

#[test]
fn test_missing_registrations_report_kind() {
    let cases = [
        (EndpointConfig::builder().encoder("xml"), ComponentKind::Encoder),
        (EndpointConfig::builder().decoder("xml"), ComponentKind::Decoder),
        (EndpointConfig::builder().logger("slf", LogLevel::Full), ComponentKind::Logger),
        (EndpointConfig::builder().contract("jaxrs"), ComponentKind::Contract),
        (EndpointConfig::builder().error_decoder("strict"), ComponentKind::ErrorDecoder),
        (EndpointConfig::builder().retryer("patient"), ComponentKind::Retryer),
        (EndpointConfig::builder().target("nowhere"), ComponentKind::Target),
        (EndpointConfig::builder().fallback("missing"), ComponentKind::Fallback),
    ];

    for (builder, kind) in cases {
        let config = GlobalConfig::new().with_endpoint("users", builder.base_url("http://svc").build());
        let err = factory(config, true).build(&users()).unwrap_err();
        assert_eq!(err.component_kind(), Some(kind), "{err}");
    }
}

#[test]
fn test_build_all_reports_each_endpoint() {
    let discovery = discovery().register(
        ClientInterfaceDescriptor::new("orders").operation(OperationDescriptor::new("list", "GET /orders")),
    );
    let config = GlobalConfig::new()
        .with_endpoint("users", EndpointConfig::with_base_url("http://users"))
        .with_endpoint(
            "orders",
            EndpointConfig::builder()
                .base_url("http://orders")
                .resilience_mode(ResilienceMode::Enabled)
                .build(),
        );

    let report = ClientFactory::new(config, &discovery, registry())
        .with_presence(false)
        .build_all();

    assert_eq!(report.clients().count(), 1);
    let (failed, err) = report.failures().next().unwrap();
    assert_eq!(failed.as_str(), "orders");
    assert!(err.as_resilience().is_some());
}

#[tokio::test]
async fn test_config_from_toml() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/users/8"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 8})))
        .expect(1)
        .mount(&server)
        .await;

    let config = GlobalConfig::from_toml_str(&format!(
        r#"
        [retry]
        active = false

        [endpoints.users]
        baseUrl = "{}/api"
        logLevel = "FULL"
        interceptors = ["first"]
        resilienceMode = "DISABLED"
        "#,
        server.uri()
    ))
    .unwrap();

    let client = factory(config, true).build(&users()).unwrap();
    assert!(!client.is_wrapped());
    assert_eq!(client.profile().log_level, LogLevel::Full);
    assert_eq!(client.invoke("get_user", &id(8)).await.unwrap(), json!({"id": 8}));
}
