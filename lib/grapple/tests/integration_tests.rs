//! End-to-end tests for the call pipeline over the hyper transport, using
//! wiremock.

use std::time::Duration;

use grapple::prelude::*;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_json, header, method, path, query_param},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Contributor {
    login: String,
    contributions: u32,
}

fn framework(uri: &str) -> Grapple {
    Grapple::builder()
        .base_url(uri)
        .converter_factory(JsonConverterFactory::new())
        .build()
        .expect("framework")
}

fn contributors_endpoint() -> Endpoint {
    Endpoint::builder(Method::GET, "/repos/{owner}/{repo}/contributors")
        .path_param::<String>("owner")
        .path_param::<String>("repo")
        .build()
        .expect("endpoint")
}

fn contributors_args() -> Args {
    Args::new()
        .scalar("square".to_string())
        .scalar("retrofit".to_string())
}

#[tokio::test]
async fn get_with_path_params_decodes_array_in_order() {
    let mock_server = MockServer::start().await;

    let contributors = vec![
        Contributor {
            login: "user1".to_string(),
            contributions: 100,
        },
        Contributor {
            login: "user2".to_string(),
            contributions: 50,
        },
    ];

    Mock::given(method("GET"))
        .and(path("/repos/square/retrofit/contributors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&contributors))
        .mount(&mock_server)
        .await;

    let service = framework(&mock_server.uri())
        .bind_json::<Vec<Contributor>>(contributors_endpoint(), ReturnShape::Call)
        .expect("bind");

    let call = service
        .invoke(contributors_args())
        .into_call()
        .expect("call shape");
    let response = call.execute().await.expect("response");

    assert!(response.is_successful());
    assert_eq!(response.status(), 200);
    assert_eq!(response.body(), Some(&contributors));
    assert!(call.is_executed());
}

#[tokio::test]
async fn query_map_pairs_are_appended() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/square/retrofit/contributors"))
        .and(query_param("per_page", "5"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(Vec::<Contributor>::new()))
        .mount(&mock_server)
        .await;

    let endpoint = Endpoint::builder(Method::GET, "/repos/{owner}/{repo}/contributors")
        .path_param::<String>("owner")
        .path_param::<String>("repo")
        .query_map("options")
        .build()
        .expect("endpoint");

    let service = framework(&mock_server.uri())
        .bind_json::<Vec<Contributor>>(endpoint, ReturnShape::Response)
        .expect("bind");

    let response = service
        .invoke(
            Args::new()
                .scalar("square".to_string())
                .scalar("retrofit".to_string())
                .pairs([("per_page", "5"), ("page", "2")]),
        )
        .into_response_future()
        .expect("response shape")
        .await
        .expect("response");

    assert!(response.is_successful());
    assert_eq!(response.body(), Some(&Vec::new()));
}

#[tokio::test]
async fn non_success_status_yields_error_envelope_with_exact_bytes() {
    let mock_server = MockServer::start().await;

    let error_payload: &[u8] = br#"{"message":"Not Found","documentation_url":"x"}"#;
    Mock::given(method("GET"))
        .and(path("/repos/square/retrofit/contributors"))
        .respond_with(ResponseTemplate::new(404).set_body_raw(error_payload, "application/json"))
        .mount(&mock_server)
        .await;

    let service = framework(&mock_server.uri())
        .bind_json::<Vec<Contributor>>(contributors_endpoint(), ReturnShape::Response)
        .expect("bind");

    let response = service
        .invoke(contributors_args())
        .into_response_future()
        .expect("response shape")
        .await
        .expect("envelope, not a raised failure");

    assert!(!response.is_successful());
    assert_eq!(response.status(), 404);
    assert!(response.body().is_none());
    // The buffered payload is byte-exact and rereadable.
    assert_eq!(response.error_body().map(|b| b.as_ref()), Some(error_payload));
    assert_eq!(response.error_body().map(|b| b.as_ref()), Some(error_payload));
}

#[tokio::test]
async fn delete_with_no_content_yields_absent_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/notes/7"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&mock_server)
        .await;

    let endpoint = Endpoint::builder(Method::DELETE, "/notes/{id}")
        .path_param::<u64>("id")
        .build()
        .expect("endpoint");

    let service = framework(&mock_server.uri())
        .bind_unit(endpoint, ReturnShape::Response)
        .expect("bind");

    let response = service
        .invoke(Args::new().scalar(7_u64))
        .into_response_future()
        .expect("response shape")
        .await
        .expect("response");

    assert!(response.is_successful());
    assert_eq!(response.status(), 204);
    assert!(response.body().is_none());
}

#[tokio::test]
async fn body_shape_returns_the_decoded_value() {
    let mock_server = MockServer::start().await;

    let contributors = vec![Contributor {
        login: "octocat".to_string(),
        contributions: 32,
    }];
    Mock::given(method("GET"))
        .and(path("/repos/square/retrofit/contributors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&contributors))
        .mount(&mock_server)
        .await;

    let service = framework(&mock_server.uri())
        .bind_json::<Vec<Contributor>>(contributors_endpoint(), ReturnShape::Body)
        .expect("bind");

    let body = service
        .invoke(contributors_args())
        .into_body_future()
        .expect("body shape")
        .await
        .expect("decoded body");
    assert_eq!(body, contributors);
}

#[tokio::test]
async fn body_shape_surfaces_http_failures_as_errors() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/square/retrofit/contributors"))
        .respond_with(ResponseTemplate::new(500).set_body_raw(&b"boom"[..], "text/plain"))
        .mount(&mock_server)
        .await;

    let service = framework(&mock_server.uri())
        .bind_json::<Vec<Contributor>>(contributors_endpoint(), ReturnShape::Body)
        .expect("bind");

    let err = service
        .invoke(contributors_args())
        .into_body_future()
        .expect("body shape")
        .await
        .expect_err("http failure");
    assert_eq!(err.status(), Some(500));
    assert_eq!(err.body().map(|b| b.as_ref()), Some(&b"boom"[..]));
}

#[tokio::test]
async fn post_encodes_json_body_and_headers() {
    let mock_server = MockServer::start().await;

    let input = Contributor {
        login: "octocat".to_string(),
        contributions: 1,
    };
    Mock::given(method("POST"))
        .and(path("/repos/square/retrofit/contributors"))
        .and(header("Content-Type", "application/json"))
        .and(header("X-Request-Id", "req-1"))
        .and(header("Accept", "application/json"))
        .and(body_json(&input))
        .respond_with(ResponseTemplate::new(201).set_body_json(&input))
        .mount(&mock_server)
        .await;

    let endpoint = Endpoint::builder(Method::POST, "/repos/{owner}/{repo}/contributors")
        .path_param::<String>("owner")
        .path_param::<String>("repo")
        .header_param::<String>("X-Request-Id")
        .body(Target::json_request::<Contributor>())
        .static_header("Accept", "application/json")
        .build()
        .expect("endpoint");

    let service = framework(&mock_server.uri())
        .bind_json::<Contributor>(endpoint, ReturnShape::Body)
        .expect("bind");

    let created = service
        .invoke(
            Args::new()
                .scalar("square".to_string())
                .scalar("retrofit".to_string())
                .scalar("req-1".to_string())
                .scalar(input.clone()),
        )
        .into_body_future()
        .expect("body shape")
        .await
        .expect("created");
    assert_eq!(created, input);
}

#[tokio::test]
async fn enqueue_delivers_exactly_one_callback() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/square/retrofit/contributors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(Vec::<Contributor>::new()))
        .mount(&mock_server)
        .await;

    let service = framework(&mock_server.uri())
        .bind_json::<Vec<Contributor>>(contributors_endpoint(), ReturnShape::Call)
        .expect("bind");
    let call = service
        .invoke(contributors_args())
        .into_call()
        .expect("call shape");

    let (tx, rx) = tokio::sync::oneshot::channel();
    call.enqueue(move |result| {
        tx.send(result).ok();
    })
    .expect("enqueue");

    let response = rx.await.expect("delivered").expect("success");
    assert!(response.is_successful());

    // The call is spent: a second start reports the usage error synchronously.
    let err = call.enqueue(|_| {}).expect_err("second start");
    assert!(matches!(err, Error::AlreadyExecuted));
}

#[tokio::test]
async fn cancel_aborts_an_in_flight_call() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/square/retrofit/contributors"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(30))
                .set_body_json(Vec::<Contributor>::new()),
        )
        .mount(&mock_server)
        .await;

    let service = framework(&mock_server.uri())
        .bind_json::<Vec<Contributor>>(contributors_endpoint(), ReturnShape::Call)
        .expect("bind");
    let call = service
        .invoke(contributors_args())
        .into_call()
        .expect("call shape");

    let (tx, rx) = tokio::sync::oneshot::channel();
    call.enqueue(move |result| {
        tx.send(result).ok();
    })
    .expect("enqueue");

    call.cancel();
    assert!(call.is_canceled());

    let err = rx.await.expect("delivered").expect_err("canceled");
    assert!(err.is_canceled(), "expected cancellation, got: {err}");
    // The flag stays observable after completion.
    assert!(call.is_canceled());
}

#[tokio::test]
async fn connection_failures_surface_as_transport_errors() {
    // Nothing listens on this port.
    let service = framework("http://127.0.0.1:9")
        .bind_json::<Vec<Contributor>>(contributors_endpoint(), ReturnShape::Response)
        .expect("bind");

    let err = service
        .invoke(contributors_args())
        .into_response_future()
        .expect("response shape")
        .await
        .expect_err("refused");
    assert!(err.is_connection(), "expected connection error, got: {err}");
}

#[tokio::test]
async fn slow_responses_hit_the_transport_timeout() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/square/retrofit/contributors"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(30))
                .set_body_json(Vec::<Contributor>::new()),
        )
        .mount(&mock_server)
        .await;

    let framework = Grapple::builder()
        .base_url(mock_server.uri())
        .transport(
            HyperTransport::builder()
                .timeout(Duration::from_millis(100))
                .build(),
        )
        .converter_factory(JsonConverterFactory::new())
        .build()
        .expect("framework");

    let service = framework
        .bind_json::<Vec<Contributor>>(contributors_endpoint(), ReturnShape::Response)
        .expect("bind");

    let err = service
        .invoke(contributors_args())
        .into_response_future()
        .expect("response shape")
        .await
        .expect_err("timeout");
    assert!(err.is_timeout(), "expected timeout, got: {err}");
}
