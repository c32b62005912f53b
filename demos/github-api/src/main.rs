//! GitHub API demo.
//!
//! Lists the contributors of a repository through an explicitly described
//! endpoint, driving the bound call by hand.

// Demo-specific lint allowances
#![allow(missing_docs)]
#![allow(clippy::print_stdout)]

use grapple::prelude::*;

const API_URL: &str = "https://api.github.com";

/// A GitHub contributor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contributor {
    pub login: String,
    pub contributions: u32,
}

/// The `GET /repos/{owner}/{repo}/contributors` endpoint, with an optional
/// bag of extra query parameters.
fn contributors_endpoint() -> Result<Endpoint> {
    Endpoint::builder(Method::GET, "/repos/{owner}/{repo}/contributors")
        .path_param::<String>("owner")
        .path_param::<String>("repo")
        .query_map("options")
        .static_header("User-Agent", "grapple-github-demo/0.1.0")
        .static_header("Accept", "application/vnd.github+json")
        .build()
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let framework = Grapple::builder()
        .base_url(API_URL)
        .transport(HyperTransport::builder().with_logging().build())
        .converter_factory(JsonConverterFactory::new())
        .build()?;

    let contributors =
        framework.bind_json::<Vec<Contributor>>(contributors_endpoint()?, ReturnShape::Call)?;

    // One invocation = one single-use call.
    let call = contributors
        .invoke(
            Args::new()
                .scalar("square".to_string())
                .scalar("retrofit".to_string())
                .pairs([("per_page", "16")]),
        )
        .into_call()
        .ok_or_else(|| Error::configuration("expected the call shape"))?;

    let response = call.execute().await?;
    println!("HTTP {}", response.status());

    match response.body() {
        Some(contributors) => {
            for contributor in contributors {
                println!("{} ({})", contributor.login, contributor.contributions);
            }
        }
        None => {
            let detail = response
                .error_body()
                .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
                .unwrap_or_default();
            println!("request failed: {detail}");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{header, method, path, query_param},
    };

    #[tokio::test]
    async fn contributors_round_trip() {
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
            .and(query_param("per_page", "16"))
            .and(header("Accept", "application/vnd.github+json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&contributors))
            .mount(&mock_server)
            .await;

        let framework = Grapple::builder()
            .base_url(mock_server.uri())
            .converter_factory(JsonConverterFactory::new())
            .build()
            .expect("framework");

        let service = framework
            .bind_json::<Vec<Contributor>>(
                contributors_endpoint().expect("endpoint"),
                ReturnShape::Call,
            )
            .expect("bind");

        let call = service
            .invoke(
                Args::new()
                    .scalar("square".to_string())
                    .scalar("retrofit".to_string())
                    .pairs([("per_page", "16")]),
            )
            .into_call()
            .expect("call shape");

        let response = call.execute().await.expect("response");
        assert!(response.is_successful());
        assert_eq!(response.body(), Some(&contributors));
    }
}
