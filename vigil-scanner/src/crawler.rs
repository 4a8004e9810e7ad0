use crate::error::{CrawlError, Result};
use crate::filter::is_useful_link;
use crate::matcher::TermMatcher;
use crate::result::PageResult;
use regex::Regex;
use reqwest::Client;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub type ProgressCallback = Arc<dyn Fn(usize, String) + Send + Sync>;

/// Depth-first site crawler that scores every reachable same-domain page
/// with a [`TermMatcher`].
///
/// The frontier is an explicit shared stack, so traversal depth is bounded
/// by the heap and not the call stack. With one worker the visitation
/// order matches plain depth-first recursion; more workers trade that
/// determinism for throughput while the claimed set keeps every page
/// fetched at most once per run.
pub struct Crawler {
    client: Client,
    base_domain: String,
    matcher: Arc<TermMatcher>,
    /// URLs reserved for fetching or already scored. Failed fetches are
    /// released again, so broken links reached via another path retry.
    claimed: Arc<Mutex<HashSet<String>>>,
    /// Scored pages in visitation order: the visited set with counts.
    results: Arc<Mutex<Vec<PageResult>>>,
    max_pages: Option<usize>,
    deadline: Option<Duration>,
    progress_callback: Option<ProgressCallback>,
    href_double: Regex,
    href_single: Regex,
}

impl Crawler {
    pub fn new(base_domain: impl Into<String>, matcher: TermMatcher) -> Self {
        Self::with_fetch_timeout(base_domain, matcher, 10)
    }

    pub fn with_fetch_timeout(
        base_domain: impl Into<String>,
        matcher: TermMatcher,
        timeout_secs: u64,
    ) -> Self {
        let client = Client::builder()
            .user_agent(concat!("Vigil/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(timeout_secs.div_ceil(2)))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_domain: base_domain.into(),
            matcher: Arc::new(matcher),
            claimed: Arc::new(Mutex::new(HashSet::new())),
            results: Arc::new(Mutex::new(Vec::new())),
            max_pages: None,
            deadline: None,
            progress_callback: None,
            href_double: Regex::new(r##"href="(.*?)["#]"##).expect("valid href pattern"),
            href_single: Regex::new(r##"href='(.*?)['#]"##).expect("valid href pattern"),
        }
    }

    /// Caps how many pages may be claimed for fetching in one run.
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = Some(max_pages);
        self
    }

    /// Overall wall-clock budget; workers stop pulling work once it is
    /// spent and the partial visited set is still returned.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Crawls from `seed_url` and returns every scored page in visitation
    /// order. An unreachable seed yields an empty set, not an error.
    pub async fn crawl(&self, seed_url: &str, workers: usize) -> Result<Vec<PageResult>> {
        let workers = workers.max(1);
        info!("Starting crawl of {} with {} workers", seed_url, workers);

        let seed = normalize(seed_url, &self.base_domain);
        let frontier: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(vec![seed]));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let started = Instant::now();

        let mut worker_handles = Vec::new();

        for worker_id in 0..workers {
            let client = self.client.clone();
            let base_domain = self.base_domain.clone();
            let matcher = self.matcher.clone();
            let claimed = self.claimed.clone();
            let results = self.results.clone();
            let frontier = frontier.clone();
            let in_flight = in_flight.clone();
            let progress_cb = self.progress_callback.clone();
            let max_pages = self.max_pages;
            let deadline = self.deadline;
            let href_double = self.href_double.clone();
            let href_single = self.href_single.clone();

            let handle = tokio::spawn(async move {
                debug!("Worker {} started", worker_id);
                let mut empty_iterations = 0;
                const MAX_EMPTY_ITERATIONS: usize = 10;

                loop {
                    if let Some(budget) = deadline {
                        if started.elapsed() >= budget {
                            debug!("Worker {} stopping at deadline", worker_id);
                            break;
                        }
                    }

                    let next = { frontier.lock().await.pop() };

                    let url = match next {
                        Some(url) => {
                            empty_iterations = 0;
                            url
                        }
                        None => {
                            if in_flight.load(Ordering::SeqCst) == 0 {
                                empty_iterations += 1;
                                if empty_iterations >= MAX_EMPTY_ITERATIONS {
                                    debug!("Worker {} exiting", worker_id);
                                    break;
                                }
                            } else {
                                empty_iterations = 0;
                            }
                            tokio::time::sleep(Duration::from_millis(10)).await;
                            continue;
                        }
                    };

                    // Atomic reservation: the first worker to claim a URL
                    // fetches it; later frontier duplicates fall out here.
                    {
                        let mut claimed_lock = claimed.lock().await;
                        if claimed_lock.contains(&url) {
                            debug!("{} : skip, already crawled", url);
                            continue;
                        }
                        if let Some(cap) = max_pages {
                            if claimed_lock.len() >= cap {
                                debug!("{} : skip, page cap reached", url);
                                continue;
                            }
                        }
                        claimed_lock.insert(url.clone());
                    }

                    in_flight.fetch_add(1, Ordering::SeqCst);

                    if let Some(ref callback) = progress_cb {
                        callback(worker_id, url.clone());
                    }

                    info!("{} : fetching", url);
                    // The overall deadline is propagated into the fetch:
                    // an in-flight request races the remaining budget and
                    // expiry counts as a per-page failure, so the partial
                    // visited set is still returned.
                    let fetched = match deadline {
                        Some(budget) => {
                            let remaining = budget.saturating_sub(started.elapsed());
                            match tokio::time::timeout(
                                remaining,
                                Self::fetch_page(&client, &url),
                            )
                            .await
                            {
                                Ok(outcome) => outcome,
                                Err(_) => Err(CrawlError::DeadlineExpired(url.clone())),
                            }
                        }
                        None => Self::fetch_page(&client, &url).await,
                    };
                    match fetched {
                        Ok(content) => {
                            let score = matcher.score(&content);
                            {
                                let mut results_lock = results.lock().await;
                                results_lock.push(PageResult::new(
                                    url.clone(),
                                    score.total_excess,
                                    score.findings,
                                ));
                            }

                            // Content is dropped after this scope; only the
                            // extracted links survive.
                            let children =
                                Self::extract_links(&href_double, &href_single, &content);
                            let mut accepted = Vec::new();
                            {
                                let claimed_lock = claimed.lock().await;
                                for child in children {
                                    if !is_useful_link(&child, &base_domain) {
                                        continue;
                                    }
                                    let child = normalize(&child, &base_domain);
                                    if !claimed_lock.contains(&child) {
                                        accepted.push(child);
                                    }
                                }
                            }
                            if !accepted.is_empty() {
                                let mut frontier_lock = frontier.lock().await;
                                // Reversed so a lone worker pops children in
                                // document order.
                                for child in accepted.into_iter().rev() {
                                    frontier_lock.push(child);
                                }
                            }
                        }
                        Err(e) => {
                            warn!("{} : fetch failed: {}", url, e);
                            // Failed fetches are not memoized: release the
                            // claim so a later reference retries.
                            claimed.lock().await.remove(&url);
                        }
                    }

                    in_flight.fetch_sub(1, Ordering::SeqCst);
                }

                debug!("Worker {} finished", worker_id);
            });

            worker_handles.push(handle);
        }

        for outcome in futures::future::join_all(worker_handles).await {
            outcome.map_err(CrawlError::from)?;
        }

        let results = self.results.lock().await;
        info!("Crawl complete. Visited {} pages", results.len());
        Ok(results.clone())
    }

    /// One GET per page. Transport errors, HTTP error statuses and
    /// undecodable bodies are all per-page failures.
    async fn fetch_page(client: &Client, url: &str) -> Result<String> {
        debug!("Fetching {}", url);

        let response = client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CrawlError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        String::from_utf8(body.to_vec()).map_err(|e| CrawlError::DecodeError(e.to_string()))
    }

    /// Extracts `href="…"` and `href='…'` values terminated by the
    /// matching quote or a `#` fragment marker, trimmed and deduplicated
    /// in first-seen order. Pattern search, not HTML parsing: nested or
    /// malformed quoting can confuse it, which is an accepted trade-off.
    fn extract_links(href_double: &Regex, href_single: &Regex, content: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut links = Vec::new();
        for caps in href_double
            .captures_iter(content)
            .chain(href_single.captures_iter(content))
        {
            let link = caps[1].trim().to_string();
            if seen.insert(link.clone()) {
                links.push(link);
            }
        }
        links
    }
}

/// Root-relative paths are completed by prepending the base domain; the
/// original's plain concatenation, not URL resolution.
fn normalize(url: &str, base_domain: &str) -> String {
    if url.starts_with('/') {
        format!("{}{}", base_domain, url)
    } else {
        url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::{MatchMode, TermSpec};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn html_page(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200)
            .insert_header("content-type", "text/html")
            .set_body_bytes(body.as_bytes().to_vec())
    }

    async fn mount_page(server: &MockServer, route: &str, body: &str) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(html_page(body))
            .mount(server)
            .await;
    }

    fn plain_matcher(term: &str, threshold: usize) -> TermMatcher {
        TermMatcher::new(vec![TermSpec::new(term, threshold)], MatchMode::PlainText).unwrap()
    }

    #[test]
    fn normalize_prepends_base_for_root_relative() {
        assert_eq!(
            normalize("/about", "http://my.base.domain"),
            "http://my.base.domain/about"
        );
        assert_eq!(normalize("http://other/x", "http://my.base.domain"), "http://other/x");
    }

    #[test]
    fn extract_links_merges_quote_styles_and_trims() {
        let crawler = Crawler::new("http://x", plain_matcher("t", 0));
        let content = r##"<a href=" /a ">a</a> <a href='/b#frag'>b</a> <a href="/a">dup</a>"##;
        let links = Crawler::extract_links(&crawler.href_double, &crawler.href_single, content);
        assert_eq!(links, vec!["/a", "/b"]);
    }

    #[tokio::test]
    async fn crawl_follows_filtered_links_only() {
        let server = MockServer::start().await;
        let root = r#"<a href="/about">About</a><a href="http://evil.com/x.pdf">x</a>"#;
        mount_page(&server, "/", root).await;
        mount_page(&server, "/about", "<html><body>About us</body></html>").await;

        let crawler = Crawler::new(server.uri(), plain_matcher("promotion", 0));
        let results = crawler.crawl(&server.uri(), 1).await.unwrap();

        let urls: Vec<_> = results.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, vec![server.uri(), format!("{}/about", server.uri())]);
    }

    #[tokio::test]
    async fn flagged_page_scores_excess_over_threshold() {
        let server = MockServer::start().await;
        mount_page(
            &server,
            "/",
            "promotion one, promotion two, promotion three",
        )
        .await;

        let crawler = Crawler::new(server.uri(), plain_matcher("promotion", 1));
        let results = crawler.crawl(&server.uri(), 1).await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].excess, 2);
        assert_eq!(results[0].findings[0].count, 3);
        assert!(!results[0].is_clear());
    }

    #[tokio::test]
    async fn link_back_to_seed_is_not_refetched() {
        let server = MockServer::start().await;
        let root = format!(r#"<a href="{}">home again</a>"#, server.uri());
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(html_page(&root))
            .expect(1)
            .mount(&server)
            .await;

        let crawler = Crawler::new(server.uri(), plain_matcher("t", 0));
        let results = crawler.crawl(&server.uri(), 1).await.unwrap();

        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn page_reached_via_two_paths_is_fetched_once() {
        let server = MockServer::start().await;
        mount_page(&server, "/", r#"<a href="/a">a</a><a href="/b">b</a>"#).await;
        mount_page(&server, "/a", r#"<a href="/shared">s</a>"#).await;
        mount_page(&server, "/b", r#"<a href="/shared">s</a>"#).await;
        Mock::given(method("GET"))
            .and(path("/shared"))
            .respond_with(html_page("leaf"))
            .expect(1)
            .mount(&server)
            .await;

        let crawler = Crawler::new(server.uri(), plain_matcher("t", 0));
        let results = crawler.crawl(&server.uri(), 1).await.unwrap();

        assert_eq!(results.len(), 4);
        let unique: HashSet<_> = results.iter().map(|r| r.url.clone()).collect();
        assert_eq!(unique.len(), results.len());
    }

    #[tokio::test]
    async fn failed_fetch_is_retried_when_reached_again() {
        let server = MockServer::start().await;
        mount_page(
            &server,
            "/",
            r#"<a href="/missing">m</a><a href="/b">b</a>"#,
        )
        .await;
        mount_page(&server, "/b", r#"<a href="/missing">m again</a>"#).await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&server)
            .await;

        let crawler = Crawler::new(server.uri(), plain_matcher("t", 0));
        let results = crawler.crawl(&server.uri(), 1).await.unwrap();

        // The broken page never enters the visited set.
        let urls: Vec<_> = results.iter().map(|r| r.url.as_str()).collect();
        assert!(!urls.iter().any(|u| u.ends_with("/missing")));
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn single_worker_visits_depth_first_in_document_order() {
        let server = MockServer::start().await;
        mount_page(&server, "/", r#"<a href="/a">a</a><a href="/b">b</a>"#).await;
        mount_page(&server, "/a", r#"<a href="/a/deep">d</a>"#).await;
        mount_page(&server, "/a/deep", "leaf").await;
        mount_page(&server, "/b", "leaf").await;

        let crawler = Crawler::new(server.uri(), plain_matcher("t", 0));
        let results = crawler.crawl(&server.uri(), 1).await.unwrap();

        let paths: Vec<_> = results
            .iter()
            .map(|r| r.url.trim_start_matches(server.uri().as_str()).to_string())
            .collect();
        assert_eq!(paths, vec!["", "/a", "/a/deep", "/b"]);
    }

    #[tokio::test]
    async fn page_cap_bounds_the_crawl() {
        let server = MockServer::start().await;
        let mut root = String::new();
        for i in 0..10 {
            root.push_str(&format!(r#"<a href="/page{}">p</a>"#, i));
        }
        mount_page(&server, "/", &root).await;
        for i in 0..10 {
            mount_page(&server, &format!("/page{}", i), "leaf").await;
        }

        let crawler = Crawler::new(server.uri(), plain_matcher("t", 0)).with_max_pages(3);
        let results = crawler.crawl(&server.uri(), 1).await.unwrap();

        assert_eq!(results.len(), 3);
    }

    #[tokio::test]
    async fn zero_deadline_returns_partial_visited_set() {
        let server = MockServer::start().await;
        mount_page(&server, "/", "never fetched").await;

        let crawler =
            Crawler::new(server.uri(), plain_matcher("t", 0)).with_deadline(Duration::ZERO);
        let results = crawler.crawl(&server.uri(), 2).await.unwrap();

        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn deadline_aborts_in_flight_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(html_page("slow page").set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let crawler = Crawler::new(server.uri(), plain_matcher("t", 0))
            .with_deadline(Duration::from_millis(100));

        let started = Instant::now();
        let results = crawler.crawl(&server.uri(), 1).await.unwrap();

        // The in-flight fetch is cut off at the budget, not left to run
        // into its own timeout.
        assert!(
            started.elapsed() < Duration::from_secs(2),
            "crawl overran the deadline: {:?}",
            started.elapsed()
        );
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn worker_pool_preserves_at_most_once_visits() {
        let server = MockServer::start().await;
        let mut root = String::new();
        for i in 0..8 {
            root.push_str(&format!(r#"<a href="/page{}">p</a>"#, i));
        }
        mount_page(&server, "/", &root).await;
        for i in 0..8 {
            // Every page links to a sibling, closing a cycle.
            let body = format!(
                r#"<a href="/page0">f</a><a href="/page{}">s</a>"#,
                (i + 1) % 8
            );
            mount_page(&server, &format!("/page{}", i), &body).await;
        }

        let crawler = Crawler::new(server.uri(), plain_matcher("t", 0));
        let results = crawler.crawl(&server.uri(), 4).await.unwrap();

        assert_eq!(results.len(), 9);
        let unique: HashSet<_> = results.iter().map(|r| r.url.clone()).collect();
        assert_eq!(unique.len(), 9);
    }

    #[tokio::test]
    async fn undecodable_body_is_skipped() {
        let server = MockServer::start().await;
        let root = r#"<a href="/binary">b</a><a href="/text">t</a>"#;
        mount_page(&server, "/", root).await;
        Mock::given(method("GET"))
            .and(path("/binary"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xff, 0xfe, 0x80]))
            .mount(&server)
            .await;
        mount_page(&server, "/text", "plain").await;

        let crawler = Crawler::new(server.uri(), plain_matcher("t", 0));
        let results = crawler.crawl(&server.uri(), 1).await.unwrap();

        let urls: Vec<_> = results.iter().map(|r| r.url.as_str()).collect();
        assert!(!urls.iter().any(|u| u.ends_with("/binary")));
        assert!(urls.iter().any(|u| u.ends_with("/text")));
    }
}
