use std::time::Duration;

use anyhow::Result;
use indicatif::ProgressBar;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::PipelineError;
use crate::settings::Settings;

/// One page of the studies search endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct SearchPage {
    #[serde(default)]
    pub studies: Vec<Value>,
    #[serde(rename = "nextPageToken")]
    pub next_page_token: Option<String>,
    #[serde(rename = "totalCount")]
    pub total_count: Option<u64>,
}

/// Anything that can serve search pages by continuation token.
pub trait PageSource {
    fn fetch_page(&mut self, token: Option<&str>) -> Result<SearchPage>;
}

/// ClinicalTrials.gov v2 studies endpoint over blocking HTTP.
pub struct StudiesApi {
    client: Client,
    url: String,
    condition: String,
    page_size: u32,
}

impl StudiesApi {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(PipelineError::from)?;
        Ok(StudiesApi {
            client,
            url: settings.api_url.clone(),
            condition: settings.condition.clone(),
            page_size: settings.page_size,
        })
    }

    fn query_params(&self, token: Option<&str>) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("query.cond", self.condition.clone()),
            ("pageSize", self.page_size.to_string()),
            ("countTotal", "true".to_string()),
            ("format", "json".to_string()),
        ];
        if let Some(t) = token {
            params.push(("pageToken", t.to_string()));
        }
        params
    }
}

impl PageSource for StudiesApi {
    fn fetch_page(&mut self, token: Option<&str>) -> Result<SearchPage> {
        let resp = self
            .client
            .get(&self.url)
            .query(&self.query_params(token))
            .send()
            .map_err(PipelineError::from)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(PipelineError::HttpStatus {
                status,
                url: resp.url().to_string(),
            }
            .into());
        }
        let page: SearchPage = resp.json().map_err(PipelineError::from)?;
        Ok(page)
    }
}

/// Request pages until one comes back without a continuation token and
/// return every study in order. The first error aborts the loop.
pub fn fetch_all(source: &mut dyn PageSource, pb: &ProgressBar) -> Result<Vec<Value>> {
    let mut all = Vec::new();
    let mut token: Option<String> = None;
    let mut pages = 0usize;
    let mut reported_total = None;

    loop {
        let page = source.fetch_page(token.as_deref())?;
        pages += 1;
        if pages == 1 {
            reported_total = page.total_count;
            if let Some(total) = reported_total {
                info!(total, "API reports matching studies");
            }
        }
        debug!(page = pages, studies = page.studies.len(), "received page");
        all.extend(page.studies);
        pb.set_message(format!("{} pages, {} studies", pages, all.len()));
        pb.tick();

        token = page.next_page_token.filter(|t| !t.is_empty());
        if token.is_none() {
            break;
        }
    }

    if let Some(total) = reported_total {
        if total != all.len() as u64 {
            warn!(reported = total, collected = all.len(), "study count mismatch");
        }
    }
    info!(pages, studies = all.len(), "pagination finished");
    Ok(all)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Serves canned pages and records the tokens it was asked for.
    struct FakeSource {
        pages: Vec<SearchPage>,
        seen: Vec<Option<String>>,
        fail_at: Option<usize>,
    }

    impl FakeSource {
        fn new(pages: Vec<SearchPage>) -> Self {
            FakeSource { pages, seen: Vec::new(), fail_at: None }
        }
    }

    impl PageSource for FakeSource {
        fn fetch_page(&mut self, token: Option<&str>) -> Result<SearchPage> {
            let i = self.seen.len();
            self.seen.push(token.map(String::from));
            if self.fail_at == Some(i) {
                anyhow::bail!("connection reset");
            }
            Ok(std::mem::take(&mut self.pages[i]))
        }
    }

    fn page(n: usize, token: Option<&str>) -> SearchPage {
        SearchPage {
            studies: (0..n).map(|i| json!({"i": i})).collect(),
            next_page_token: token.map(String::from),
            total_count: None,
        }
    }

    #[test]
    fn accumulates_every_page_and_echoes_tokens() {
        let mut src = FakeSource::new(vec![page(3, Some("t1")), page(2, Some("t2")), page(4, None)]);
        let all = fetch_all(&mut src, &ProgressBar::hidden()).unwrap();
        assert_eq!(all.len(), 9);
        assert_eq!(
            src.seen,
            vec![None, Some("t1".to_string()), Some("t2".to_string())]
        );
    }

    #[test]
    fn single_page_without_token_stops() {
        let mut src = FakeSource::new(vec![page(5, None), page(1, None)]);
        let all = fetch_all(&mut src, &ProgressBar::hidden()).unwrap();
        assert_eq!(all.len(), 5);
        assert_eq!(src.seen.len(), 1);
    }

    #[test]
    fn empty_token_terminates() {
        let mut src = FakeSource::new(vec![page(1, Some("")), page(1, None)]);
        let all = fetch_all(&mut src, &ProgressBar::hidden()).unwrap();
        assert_eq!(all.len(), 1);
    }

    #[test]
    fn error_mid_pagination_aborts() {
        let mut src = FakeSource::new(vec![page(2, Some("t1")), page(2, None)]);
        src.fail_at = Some(1);
        let err = fetch_all(&mut src, &ProgressBar::hidden()).unwrap_err();
        assert!(err.to_string().contains("connection reset"));
    }

    #[test]
    fn fixture_pages_deserialize() {
        let p1: SearchPage = serde_json::from_str(
            &std::fs::read_to_string("tests/fixtures/studies_page_1.json").unwrap(),
        )
        .unwrap();
        assert_eq!(p1.studies.len(), 3);
        assert_eq!(p1.next_page_token.as_deref(), Some("NF0g5JGBlvE"));
        assert_eq!(p1.total_count, Some(4));

        let p2: SearchPage = serde_json::from_str(
            &std::fs::read_to_string("tests/fixtures/studies_page_2.json").unwrap(),
        )
        .unwrap();
        assert_eq!(p2.studies.len(), 1);
        assert_eq!(p2.next_page_token, None);
    }

    #[test]
    fn missing_studies_array_is_empty_page() {
        let p: SearchPage = serde_json::from_str("{}").unwrap();
        assert!(p.studies.is_empty());
        assert!(p.next_page_token.is_none());
    }

    /// Local server that answers a single request with `status_line`.
    fn serve_once(status_line: &'static str) -> String {
        use std::io::{Read, Write};
        use std::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut buf = [0u8; 4096];
                let _ = stream.read(&mut buf);
                let resp = format!(
                    "HTTP/1.1 {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                    status_line
                );
                let _ = stream.write_all(resp.as_bytes());
            }
        });
        format!("http://{}/api/v2/studies", addr)
    }

    #[test]
    fn non_success_status_aborts_fetch() {
        let settings = Settings {
            api_url: serve_once("503 Service Unavailable"),
            timeout_secs: 5,
            ..Settings::default()
        };
        let mut api = StudiesApi::new(&settings).unwrap();
        let err = fetch_all(&mut api, &ProgressBar::hidden()).unwrap_err();
        match err.downcast_ref::<PipelineError>() {
            Some(PipelineError::HttpStatus { status, url }) => {
                assert_eq!(status.as_u16(), 503);
                assert!(url.contains("query.cond=immunology"), "{url}");
            }
            other => panic!("expected HttpStatus, got {other:?}"),
        }
    }

    #[test]
    fn first_request_has_no_page_token() {
        let api = StudiesApi::new(&Settings::default()).unwrap();
        let first = api.query_params(None);
        assert!(first.contains(&("query.cond", "immunology".to_string())));
        assert!(first.contains(&("pageSize", "100".to_string())));
        assert!(first.contains(&("countTotal", "true".to_string())));
        assert!(first.contains(&("format", "json".to_string())));
        assert!(first.iter().all(|(k, _)| *k != "pageToken"));

        let next = api.query_params(Some("abc"));
        assert!(next.contains(&("pageToken", "abc".to_string())));
    }
}
