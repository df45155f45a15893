//! Mock processing service and transformer wiring

use super::fixtures::{CAPABILITIES, execute_accepted};
use reprocess_wps::{Config, L2aTransformer};
use std::sync::Arc;
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path of the service endpoint on the mock server
pub const REQUEST_PATH: &str = "/cgi-bin/pywps.cgi";

/// Path of the monitoring locations on the mock server
pub const STATUS_PATH: &str = "/cgi-bin/pywpsmon.cgi";

/// Path the result archives are served from
pub const RESULT_PATH: &str = "/restsrv/rest/ngEO";

/// XML response with status 200
pub fn xml(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("Content-Type", "text/xml")
        .set_body_string(body)
}

/// A mock service answering capabilities requests, plus a scratch directory
pub struct TestService {
    /// The mock HTTP server
    pub server: MockServer,
    /// Scratch directory receiving the results
    pub scratch: TempDir,
}

impl TestService {
    /// Start the mock server with the capabilities document mounted
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(REQUEST_PATH))
            .and(query_param("REQUEST", "GetCapabilities"))
            .respond_with(xml(CAPABILITIES))
            .mount(&server)
            .await;

        Self {
            server,
            scratch: TempDir::new().expect("create scratch dir"),
        }
    }

    /// Configuration pointing at the mock server
    pub fn config(&self) -> Config {
        let endpoint = Url::parse(&format!("{}{}", self.server.uri(), REQUEST_PATH))
            .expect("valid endpoint");
        let mut config = Config::new(endpoint, "test_user_2", "0.0.7", "60");
        config.scratch_dir = self.scratch.path().to_path_buf();
        config
    }

    /// Transformer connected to the mock server
    pub async fn transformer(&self) -> Arc<L2aTransformer> {
        Arc::new(
            L2aTransformer::new(Arc::new(self.config()))
                .await
                .expect("connect transformer"),
        )
    }

    /// Monitoring location handed out on submission
    pub fn monitoring_url(&self) -> String {
        format!("{}{}?Id=789c558e4d4bc4301445ff4d76493d", self.server.uri(), STATUS_PATH)
    }

    /// Location of the result archive
    pub fn result_url(&self) -> String {
        format!(
            "{}{}?PdiID=S2_EPA__l2a_20180305_3.tar&userPriority=1&user=test_user_2",
            self.server.uri(),
            RESULT_PATH
        )
    }

    /// Accept every execute request
    pub async fn accept_orders(&self) {
        Mock::given(method("GET"))
            .and(path(REQUEST_PATH))
            .and(query_param("REQUEST", "Execute"))
            .respond_with(xml(&execute_accepted(&self.monitoring_url())))
            .mount(&self.server)
            .await;
    }

    /// Answer the next `times` status queries with `response`
    pub async fn status_responds(&self, response: ResponseTemplate, times: Option<u64>) {
        let mock = Mock::given(method("GET"))
            .and(path(STATUS_PATH))
            .respond_with(response);
        match times {
            Some(times) => mock.up_to_n_times(times).mount(&self.server).await,
            None => mock.mount(&self.server).await,
        }
    }

    /// Serve result archives with `response`
    pub async fn result_responds(&self, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(RESULT_PATH))
            .respond_with(response)
            .mount(&self.server)
            .await;
    }

    /// Number of requests received on `route`
    pub async fn requests_to(&self, route: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|request| request.url.path() == route)
            .count()
    }
}
