//! End-to-end execution against the in-memory driver

use probe_browser::{MockDriver, MockFailure, PageBuilder};
use probe_core::config::ExecutorConfig;
use indexmap::IndexMap;
use probe_core::{Action, Condition, DomSnapshot, ExecutionContext, FailureKind};
use probe_executor::{run_flow, verify_page, AdaptiveExecutor, SequenceOptions};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn fast_config() -> ExecutorConfig {
    ExecutorConfig {
        max_retries: 2,
        retry_delay_ms: 1,
        stale_wait_ms: 1,
        ..ExecutorConfig::default()
    }
}

fn editor_page() -> DomSnapshot {
    PageBuilder::new("http://localhost/editor")
        .title("Editor")
        .text("h1", "Draft")
        .button("Save")
        .with_id("save")
        .build()
}

fn setup(page: DomSnapshot) -> (Arc<MockDriver>, AdaptiveExecutor) {
    let driver = Arc::new(MockDriver::with_page(page));
    let executor = AdaptiveExecutor::new(driver.clone(), fast_config());
    (driver, executor)
}

#[tokio::test]
async fn test_stale_element_retries_same_selector() {
    let (driver, executor) = setup(editor_page());
    driver.fail_times("click", MockFailure::Stale, 2);

    let result = executor
        .execute(&Action::click("Save button"), &mut ExecutionContext::new())
        .await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.retry_count, 2);
    assert_eq!(result.attempted_selectors, vec!["#save".to_string()]);
    assert_eq!(driver.calls_to("click").len(), 3);
}

#[tokio::test]
async fn test_timeouts_exhaust_retry_budget() {
    let (driver, executor) = setup(editor_page());
    driver.fail_times("click", MockFailure::Timeout, 10);

    let result = executor
        .execute(&Action::click("Save button"), &mut ExecutionContext::new())
        .await;

    assert!(!result.success);
    assert_eq!(result.failure_kind, Some(FailureKind::Timeout));
    assert_eq!(result.retry_count, 2);
    assert_eq!(driver.calls_to("click").len(), 3);
}

#[tokio::test]
async fn test_multi_field_fill_shares_one_retry_budget() {
    let page = PageBuilder::new("http://localhost/signup")
        .begin_form("signup")
        .labeled_input("Email", "email", "email")
        .checkbox("terms", "yes", "I accept the terms")
        .end_form()
        .build();
    let (driver, executor) = setup(page);
    driver.fail_times("fill", MockFailure::Stale, 2);
    driver.fail_times("click", MockFailure::Stale, 2);

    let mut data = IndexMap::new();
    data.insert("email".to_string(), "test@example.com".to_string());
    data.insert("terms".to_string(), "yes".to_string());
    let result = executor
        .execute(&Action::fill(data), &mut ExecutionContext::new())
        .await;

    assert!(!result.success);
    assert_eq!(result.failure_kind, Some(FailureKind::StaleElement));
    assert_eq!(result.retry_count, 2);
    assert_eq!(driver.calls_to("fill").len(), 3);
    assert_eq!(driver.calls_to("click").len(), 1);
}

#[tokio::test]
async fn test_conditional_branch_reports_bounded_retries() {
    let (driver, executor) = setup(editor_page());
    driver.fail_times("click", MockFailure::Stale, 4);

    let action = Action::conditional(Condition {
        predicate: "Draft is visible".to_string(),
        then_branch: vec![Action::click("#save"), Action::click("#save")],
        else_branch: Vec::new(),
    });
    let result = executor.execute(&action, &mut ExecutionContext::new()).await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.retry_count, 2);
    assert_eq!(driver.calls_to("click").len(), 6);
}

#[tokio::test]
async fn test_stalled_url_lookup_does_not_block_navigation() {
    let driver = Arc::new(MockDriver::with_page(editor_page()));
    driver.route("http://localhost/signup", PageBuilder::new("http://localhost/signup").build());
    driver.stall("current_url");
    let config = ExecutorConfig {
        selector_timeout_ms: 20,
        ..fast_config()
    };
    let executor = AdaptiveExecutor::new(driver.clone(), config);

    let result = tokio::time::timeout(
        std::time::Duration::from_secs(5),
        executor.execute(&Action::navigate("http://localhost/signup"), &mut ExecutionContext::new()),
    )
    .await
    .expect("navigation stalled");

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.url, None);
    assert_eq!(driver.url(), "http://localhost/signup");
}

#[tokio::test]
async fn test_iframe_rescue_completes_click() {
    let (driver, executor) = setup(editor_page());
    driver.place_in_frame("#pay");

    let result = executor
        .execute(&Action::click("#pay"), &mut ExecutionContext::new())
        .await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.rescued_by.as_deref(), Some("iframe"));
    assert_eq!(result.retry_count, 0);
    assert!(driver.calls_to("act_in:shadow_root").is_empty());
}

#[tokio::test]
async fn test_rescues_disabled_means_plain_not_found() {
    let driver = Arc::new(MockDriver::with_page(editor_page()));
    driver.place_in_frame("#pay");
    let config = ExecutorConfig {
        enable_rescues: false,
        ..fast_config()
    };
    let executor = AdaptiveExecutor::new(driver.clone(), config);

    let result = executor
        .execute(&Action::click("#pay"), &mut ExecutionContext::new())
        .await;

    assert!(!result.success);
    assert_eq!(result.failure_kind, Some(FailureKind::NotFound));
    assert!(driver.calls_to("act_in:iframe").is_empty());
}

#[tokio::test]
async fn test_optional_failure_does_not_fail_sequence() {
    let (driver, executor) = setup(editor_page());
    let actions = vec![
        Action::click("#dismiss-banner").optional(),
        Action::click("Save button"),
    ];

    let result = executor
        .execute_sequence(&actions, SequenceOptions::default())
        .await;

    assert!(result.success);
    assert_eq!(result.results.len(), 2);
    assert_eq!(result.aborted_at, None);
    assert_eq!(result.non_fatal_errors.len(), 1);
    assert!(result.non_fatal_errors[0].optional);
    assert_eq!(result.non_fatal_errors[0].index, 0);
    assert!(driver.calls_to("click").iter().any(|c| c.target == "#save"));
}

#[tokio::test]
async fn test_non_critical_failure_continues_but_fails_sequence() {
    let (driver, executor) = setup(editor_page());
    let actions = vec![
        Action::click("#export").with_critical(false),
        Action::click("Save button"),
    ];

    let result = executor
        .execute_sequence(&actions, SequenceOptions::default())
        .await;

    assert!(!result.success);
    assert_eq!(result.aborted_at, None);
    assert_eq!(result.results.len(), 2);
    assert!(!result.non_fatal_errors[0].optional);
    assert!(driver.calls_to("click").iter().any(|c| c.target == "#save"));
}

#[tokio::test]
async fn test_critical_failure_aborts_sequence() {
    let (driver, executor) = setup(editor_page());
    let actions = vec![Action::click("#missing"), Action::click("Save button")];

    let result = executor
        .execute_sequence(&actions, SequenceOptions::default())
        .await;

    assert!(!result.success);
    assert_eq!(result.aborted_at, Some(0));
    assert_eq!(result.results.len(), 1);
    assert!(result
        .error
        .as_deref()
        .is_some_and(|e| e.contains("aborted at step 0")));
    assert!(driver.calls_to("click").iter().all(|c| c.target != "#save"));
}

#[tokio::test]
async fn test_cancelled_run_stops_before_next_action() {
    let (driver, executor) = setup(editor_page());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = executor
        .execute_sequence(
            &[Action::click("Save button")],
            SequenceOptions::new().with_cancel(cancel),
        )
        .await;

    assert!(!result.success);
    assert!(result.results.is_empty());
    assert_eq!(result.aborted_at, Some(0));
    assert!(result.error.as_deref().is_some_and(|e| e.contains("cancelled")));
    assert!(driver.calls_to("click").is_empty());
}

#[tokio::test]
async fn test_initial_context_feeds_substitution() {
    let (_driver, executor) = setup(editor_page());
    let mut ctx = ExecutionContext::new();
    ctx.set("heading", "Draft");

    let result = executor
        .execute_sequence(
            &[Action::assert_text("${heading}")],
            SequenceOptions::new().with_context(ctx),
        )
        .await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.context.get("heading").map(String::as_str), Some("Draft"));
}

#[tokio::test]
async fn test_signup_flow_end_to_end() {
    let home = PageBuilder::new("http://localhost/")
        .text("h1", "Home")
        .link("Sign up", "/signup")
        .build();
    let signup = PageBuilder::new("http://localhost/signup")
        .title("Create your account")
        .begin_form("signup")
        .labeled_input("Email", "email", "email")
        .labeled_input("Password", "password", "password")
        .checkbox("terms", "yes", "I accept the terms")
        .button("Sign up")
        .with_id("signup-btn")
        .end_form()
        .build();
    let welcome = PageBuilder::new("http://localhost/welcome")
        .text("h1", "Welcome aboard")
        .build();

    let driver = Arc::new(MockDriver::with_page(home));
    driver.route("http://localhost/signup", signup);
    driver.route("http://localhost/welcome", welcome);
    driver.route_click("#signup-btn", "http://localhost/welcome");
    let executor = AdaptiveExecutor::new(driver.clone(), fast_config());

    let report = run_flow(
        &executor,
        "Sign up for a new account with email test@example.com and password SecurePass123, then accept terms and submit",
        Some("http://localhost/"),
        SequenceOptions::default(),
    )
    .await;

    assert!(report.success(), "{:#?}", report.result);
    assert_eq!(report.actions.len(), 5);
    assert_eq!(report.final_url.as_deref(), Some("http://localhost/welcome"));

    let navigations: Vec<String> = driver
        .calls_to("navigate")
        .into_iter()
        .map(|c| c.target)
        .collect();
    assert_eq!(navigations, vec!["http://localhost/", "http://localhost/signup"]);

    let fills: Vec<(String, Option<String>)> = driver
        .calls_to("fill")
        .into_iter()
        .map(|c| (c.target, c.value))
        .collect();
    assert_eq!(fills.len(), 2);
    assert_eq!(fills[0].1.as_deref(), Some("test@example.com"));
    assert_eq!(fills[1].1.as_deref(), Some("SecurePass123"));

    let clicks = driver.calls_to("click");
    assert_eq!(clicks.len(), 2);
    assert_eq!(clicks[1].target, "#signup-btn");

    let verification = verify_page(driver.as_ref(), &["Welcome aboard".to_string()], &[])
        .await
        .unwrap();
    assert!(verification.passed);
}

#[tokio::test]
async fn test_field_fill_then_wait_for_selector() {
    let page = PageBuilder::new("http://localhost/editor")
        .labeled_input("Title", "text", "title")
        .button("Publish")
        .with_id("publish")
        .build();
    let (driver, executor) = setup(page);

    let mut ctx = ExecutionContext::new();
    let fill = executor
        .execute(&Action::fill_field("Title", "Release notes").with_wait_for("#publish"), &mut ctx)
        .await;
    assert!(fill.success, "{:?}", fill.error);
    assert_eq!(driver.value_of("#title").as_deref(), Some("Release notes"));
    assert_eq!(driver.calls_to("wait_for").len(), 1);

    let click = executor.click_button("Publish", &mut ctx).await;
    assert!(click.success, "{:?}", click.error);
    assert_eq!(click.attempted_selectors, vec!["#publish".to_string()]);
}
