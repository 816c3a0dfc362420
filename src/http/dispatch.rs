//! Turning verdicts into responses.
//!
//! # Responsibilities
//! - Evaluate the policy against each inbound request
//! - Allow: forward upstream unchanged
//! - Deny: answer locally with the configured status and an empty body
//! - Error: report, then fail open and forward
//! - Notify an observer with a fresh correlation id per request
//!
//! # Design Decisions
//! - Fail open: a broken rule must never take the upstream offline
//! - Observation is a trait with no-op defaults; the classification engine
//!   knows nothing about logging
//! - Identifier generation is injected, never global

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    response::{IntoResponse, Response},
};

use crate::filter::{Action, EvalError, Policy, RequestView, Verdict};
use crate::http::forward::Upstream;
use crate::http::request::{IdGenerator, RequestId, UuidGenerator};
use crate::observability::metrics;

/// A request that went upstream, as seen once the upstream answered.
#[derive(Debug, Clone, Copy)]
pub struct Forwarded<'a> {
    pub method: &'a Method,
    pub path: &'a str,
    /// Status returned by the upstream, or 502 when it could not be reached.
    pub status: StatusCode,
}

/// Hooks fired while a request is dispatched.
///
/// Every hook defaults to doing nothing.
pub trait DispatchObserver: Send + Sync {
    /// Handling has started; nothing has been evaluated yet.
    fn on_processing(&self, _id: &RequestId, _req: &RequestView) {}

    /// The request was forwarded and the upstream has responded.
    fn on_allowed(&self, _id: &RequestId, _forwarded: &Forwarded<'_>) {}

    /// The request was denied by the rule set at `verdict.ruleset`.
    fn on_denied(&self, _id: &RequestId, _req: &RequestView, _verdict: &Verdict) {}

    /// Evaluation failed; the request will be forwarded anyway.
    fn on_error(&self, _id: &RequestId, _err: &EvalError) {}
}

/// Observer that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl DispatchObserver for NoopObserver {}

/// Applies the policy to requests and carries out the chosen action.
#[derive(Clone)]
pub struct Dispatcher {
    policy: Arc<Policy>,
    upstream: Arc<dyn Upstream>,
    deny_status: StatusCode,
    observer: Arc<dyn DispatchObserver>,
    ids: Arc<dyn IdGenerator>,
}

impl Dispatcher {
    pub fn new(policy: Arc<Policy>, upstream: Arc<dyn Upstream>, deny_status: StatusCode) -> Self {
        Self {
            policy,
            upstream,
            deny_status,
            observer: Arc::new(NoopObserver),
            ids: Arc::new(UuidGenerator),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn DispatchObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Classify a request and respond to it.
    pub async fn dispatch(&self, request: Request<Body>, peer_addr: Option<SocketAddr>) -> Response {
        let id = self.ids.next_id();
        let mut view = RequestView::new(request, peer_addr);
        self.observer.on_processing(&id, &view);

        let started = Instant::now();
        let result = self.policy.evaluate(&mut view).await;
        metrics::record_evaluation(started.elapsed());

        match result {
            Ok(Verdict { action: Action::Allow, .. }) => self.allow(&id, view).await,
            Ok(verdict @ Verdict { action: Action::Deny, .. }) => self.deny(&id, &view, &verdict),
            Err(err) => {
                self.observer.on_error(&id, &err);
                self.allow(&id, view).await
            }
        }
    }

    async fn allow(&self, id: &RequestId, view: RequestView) -> Response {
        let method = view.method().clone();
        let path = view.path().to_string();

        let response = self.upstream.forward(view.into_request()).await;
        self.observer.on_allowed(
            id,
            &Forwarded {
                method: &method,
                path: &path,
                status: response.status(),
            },
        );
        response
    }

    fn deny(&self, id: &RequestId, view: &RequestView, verdict: &Verdict) -> Response {
        self.observer.on_denied(id, view, verdict);
        (self.deny_status, Body::empty()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{ActorMatcher, Matcher, NoteContentMatcher, RuleSet, UserAgentMatcher};
    use futures_util::future::BoxFuture;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;

    /// Records forwarded requests and answers 200 with the request body.
    #[derive(Default)]
    struct EchoUpstream {
        seen: Mutex<Vec<(String, Vec<u8>)>>,
    }

    impl Upstream for EchoUpstream {
        fn forward(&self, request: Request<Body>) -> BoxFuture<'_, Response> {
            Box::pin(async move {
                let path = request.uri().path().to_string();
                let body = axum::body::to_bytes(request.into_body(), usize::MAX).await.unwrap();
                self.seen.lock().unwrap().push((path, body.to_vec()));
                (StatusCode::OK, body).into_response()
            })
        }
    }

    #[derive(Default)]
    struct SequentialIds(AtomicU64);

    impl IdGenerator for SequentialIds {
        fn next_id(&self) -> RequestId {
            RequestId::new(format!("req-{}", self.0.fetch_add(1, Ordering::SeqCst)))
        }
    }

    #[derive(Default)]
    struct RecordingObserver {
        events: Mutex<Vec<String>>,
    }

    impl RecordingObserver {
        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    impl DispatchObserver for RecordingObserver {
        fn on_processing(&self, id: &RequestId, _req: &RequestView) {
            self.events.lock().unwrap().push(format!("processing {id}"));
        }
        fn on_allowed(&self, id: &RequestId, forwarded: &Forwarded<'_>) {
            self.events
                .lock()
                .unwrap()
                .push(format!("allowed {id} {}", forwarded.status.as_u16()));
        }
        fn on_denied(&self, id: &RequestId, _req: &RequestView, verdict: &Verdict) {
            self.events
                .lock()
                .unwrap()
                .push(format!("denied {id} ruleset={:?}", verdict.ruleset));
        }
        fn on_error(&self, id: &RequestId, _err: &EvalError) {
            self.events.lock().unwrap().push(format!("error {id}"));
        }
    }

    struct Harness {
        dispatcher: Dispatcher,
        upstream: Arc<EchoUpstream>,
        observer: Arc<RecordingObserver>,
    }

    fn harness(rulesets: Vec<RuleSet>) -> Harness {
        let upstream = Arc::new(EchoUpstream::default());
        let observer = Arc::new(RecordingObserver::default());
        let dispatcher = Dispatcher::new(
            Arc::new(Policy::new(rulesets)),
            upstream.clone(),
            StatusCode::NOT_FOUND,
        )
        .with_observer(observer.clone())
        .with_id_generator(Arc::new(SequentialIds::default()));
        Harness { dispatcher, upstream, observer }
    }

    fn deny_spam() -> Vec<RuleSet> {
        let matchers: Vec<Box<dyn Matcher>> = vec![Box::new(NoteContentMatcher::new("spam").unwrap())];
        vec![RuleSet::new(Action::Deny, matchers).unwrap()]
    }

    fn inbox_post(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/inbox")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_of(response: Response) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
    }

    #[tokio::test]
    async fn test_denied_request_gets_empty_deny_status() {
        let h = harness(deny_spam());
        let body = r#"{"type":"Create","object":{"type":"Note","content":"buy spam"}}"#;

        let response = h.dispatcher.dispatch(inbox_post(body), None).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_of(response).await.is_empty());
        assert!(h.upstream.seen.lock().unwrap().is_empty());
        assert_eq!(h.observer.events(), vec!["processing req-0", "denied req-0 ruleset=Some(0)"]);
    }

    #[tokio::test]
    async fn test_allowed_request_is_forwarded_unchanged() {
        let h = harness(deny_spam());
        let body = r#"{"type":"Create","object":{"type":"Note","content":"hello"}}"#;

        let response = h.dispatcher.dispatch(inbox_post(body), None).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_of(response).await, body.as_bytes());
        let seen = h.upstream.seen.lock().unwrap().clone();
        assert_eq!(seen, vec![("/inbox".to_string(), body.as_bytes().to_vec())]);
        assert_eq!(h.observer.events(), vec!["processing req-0", "allowed req-0 200"]);
    }

    #[tokio::test]
    async fn test_matcher_error_fails_open() {
        let h = harness(deny_spam());

        let response = h.dispatcher.dispatch(inbox_post("{broken"), None).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_of(response).await, b"{broken");
        assert_eq!(
            h.observer.events(),
            vec!["processing req-0", "error req-0", "allowed req-0 200"]
        );
    }

    #[tokio::test]
    async fn test_each_request_gets_a_fresh_id() {
        let matchers: Vec<Box<dyn Matcher>> = vec![Box::new(UserAgentMatcher::new("BadBot").unwrap())];
        let h = harness(vec![RuleSet::new(Action::Deny, matchers).unwrap()]);

        let bot = Request::builder()
            .uri("/")
            .header("User-Agent", "BadBot/1.0")
            .body(Body::empty())
            .unwrap();
        let browser = Request::builder()
            .uri("/")
            .header("User-Agent", "Firefox")
            .body(Body::empty())
            .unwrap();

        assert_eq!(h.dispatcher.dispatch(bot, None).await.status(), StatusCode::NOT_FOUND);
        assert_eq!(h.dispatcher.dispatch(browser, None).await.status(), StatusCode::OK);
        assert_eq!(
            h.observer.events(),
            vec![
                "processing req-0",
                "denied req-0 ruleset=Some(0)",
                "processing req-1",
                "allowed req-1 200",
            ]
        );
    }

    #[tokio::test]
    async fn test_configured_deny_status_is_used() {
        let matchers: Vec<Box<dyn Matcher>> =
            vec![Box::new(ActorMatcher::new("https://spam.example").unwrap())];
        let upstream = Arc::new(EchoUpstream::default());
        let dispatcher = Dispatcher::new(
            Arc::new(Policy::new(vec![RuleSet::new(Action::Deny, matchers).unwrap()])),
            upstream,
            StatusCode::FORBIDDEN,
        );

        let response = dispatcher
            .dispatch(inbox_post(r#"{"actor":"https://spam.example/users/1"}"#), None)
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_explicit_allow_rule_short_circuits_deny() {
        let allow: Vec<Box<dyn Matcher>> = vec![Box::new(ActorMatcher::new("https://friend.example").unwrap())];
        let deny: Vec<Box<dyn Matcher>> = vec![Box::new(NoteContentMatcher::new("spam").unwrap())];
        let h = harness(vec![
            RuleSet::new(Action::Allow, allow).unwrap(),
            RuleSet::new(Action::Deny, deny).unwrap(),
        ]);
        let body = r#"{"type":"Create","actor":"https://friend.example/users/a","object":{"type":"Note","content":"spam joke"}}"#;

        let response = h.dispatcher.dispatch(inbox_post(body), None).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    /// Upstream that logs into the observer's event list, then fails.
    struct UnavailableUpstream {
        observer: Arc<RecordingObserver>,
    }

    impl Upstream for UnavailableUpstream {
        fn forward(&self, _request: Request<Body>) -> BoxFuture<'_, Response> {
            Box::pin(async move {
                self.observer.events.lock().unwrap().push("forwarded".to_string());
                StatusCode::SERVICE_UNAVAILABLE.into_response()
            })
        }
    }

    #[tokio::test]
    async fn test_allowed_hook_follows_upstream_response() {
        let observer = Arc::new(RecordingObserver::default());
        let upstream = Arc::new(UnavailableUpstream {
            observer: observer.clone(),
        });
        let dispatcher = Dispatcher::new(Arc::new(Policy::default()), upstream, StatusCode::NOT_FOUND)
            .with_observer(observer.clone())
            .with_id_generator(Arc::new(SequentialIds::default()));

        let response = dispatcher.dispatch(inbox_post("{}"), None).await;

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            observer.events(),
            vec!["processing req-0", "forwarded", "allowed req-0 503"]
        );
    }
}
