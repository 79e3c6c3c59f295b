mod common;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use common::{EMAIL, MockBackend, PASSWORD, assert_no_notification, next_notification};
use habit_client::AppContext;
use habit_client::api::models::{
    CheckOffRequest, CreateHabitRequest, CreateOngoingHabitRequest, Frequency, Habit,
    OngoingStatus, UpdateHabitRequest, UpdateOngoingHabitRequest, UpdateUserRequest,
};
use habit_client::error::ClientError;
use habit_client::notify::NotificationLevel;
use habit_client::query::QueryState;
use habit_client::query::keys::{habits_key, user_key};
use habit_client::session::MemoryTokenStore;
use habit_client::stats::DashboardSummary;

async fn signed_in(backend: &MockBackend) -> AppContext {
    let ctx = backend.context(Arc::new(MemoryTokenStore::new()));
    ctx.session.login(EMAIL, PASSWORD).await.unwrap();
    ctx
}

fn new_habit(name: &str) -> CreateHabitRequest {
    CreateHabitRequest {
        name: name.into(),
        frequency: Frequency::Weekly,
        target: 3,
    }
}

#[tokio::test]
async fn concurrent_subscribers_share_one_request() {
    let backend = MockBackend::start().await;
    backend.state.lock().list_delay = Duration::from_millis(50);
    let ctx = signed_in(&backend).await;

    let first = ctx.habits();
    let second = ctx.habits();
    let (a, b) = tokio::join!(first.settled(), second.settled());

    assert_eq!(backend.hits("GET /habits"), 1);
    assert_eq!(a.data, b.data);
    assert_eq!(a.data.unwrap().len(), 1);
}

#[tokio::test]
async fn creating_a_habit_refetches_the_list() {
    let backend = MockBackend::start().await;
    let ctx = signed_in(&backend).await;
    let habits = ctx.habits();
    assert_eq!(habits.settled().await.data.unwrap().len(), 1);
    let mut notifications = ctx.notifier.subscribe();

    let mutation = ctx.create_habit();
    let created = mutation.mutate(new_habit("Run")).await.unwrap();

    assert_eq!(created.name, "Run");
    assert!(!mutation.is_pending());
    assert_eq!(backend.hits("GET /habits"), 2);
    let snapshot = habits.snapshot();
    assert_eq!(snapshot.state, QueryState::Success);
    assert!(!snapshot.is_stale);
    let names: Vec<_> = snapshot
        .data
        .unwrap()
        .iter()
        .map(|h| h.name.clone())
        .collect();
    assert_eq!(names, vec!["Read", "Run"]);

    let note = next_notification(&mut notifications).await;
    assert_eq!(note.level, NotificationLevel::Success);
    assert_eq!(note.message, "Habit created successfully!");
}

#[tokio::test]
async fn invalid_habit_never_reaches_the_network() {
    let backend = MockBackend::start().await;
    let ctx = signed_in(&backend).await;
    let mut notifications = ctx.notifier.subscribe();

    let err = ctx.create_habit().mutate(new_habit("  ")).await.unwrap_err();

    assert!(matches!(err, ClientError::Validation(_)));
    assert_eq!(backend.hits("POST /habits"), 0);
    assert_no_notification(&mut notifications).await;
}

#[tokio::test]
async fn failed_write_leaves_cached_list_untouched() {
    let backend = MockBackend::start().await;
    let ctx = signed_in(&backend).await;
    let habits = ctx.habits();
    let before = habits.settled().await;
    backend.state.lock().fail_writes = true;
    let mut notifications = ctx.notifier.subscribe();

    let err = ctx.create_habit().mutate(new_habit("Run")).await.unwrap_err();

    assert_eq!(err.status(), Some(500));
    assert_eq!(backend.hits("GET /habits"), 1);
    let after = habits.snapshot();
    assert_eq!(after.data, before.data);
    assert_eq!(after.last_fetched_at, before.last_fetched_at);
    assert!(!after.is_stale);

    let note = next_notification(&mut notifications).await;
    assert_eq!(note.level, NotificationLevel::Error);
    assert_eq!(note.message, "Database unavailable");
    assert_no_notification(&mut notifications).await;
}

#[tokio::test]
async fn check_off_shows_the_backend_counter() {
    let backend = MockBackend::start().await;
    let ctx = signed_in(&backend).await;
    let ongoing = ctx.ongoing_habits();
    assert_eq!(ongoing.settled().await.data.unwrap()[0].counter, 2);

    ctx.check_off()
        .mutate(("o1".into(), CheckOffRequest::default()))
        .await
        .unwrap();

    let list = ongoing.snapshot().data.unwrap();
    assert_eq!(list[0].counter, 3);
    assert_eq!(backend.hits("GET /ongoing-habit"), 2);
}

#[tokio::test]
async fn ongoing_habit_lifecycle() {
    let backend = MockBackend::start().await;
    let ctx = signed_in(&backend).await;
    let ongoing = ctx.ongoing_habits();
    ongoing.settled().await;

    let created = ctx
        .create_ongoing_habit()
        .mutate(CreateOngoingHabitRequest {
            habit_id: "h1".into(),
            start_date: "2024-03-01".into(),
        })
        .await
        .unwrap();
    assert_eq!(ongoing.snapshot().data.unwrap().len(), 2);

    ctx.update_ongoing_habit()
        .mutate((
            created.ongoing_habit_id.clone(),
            UpdateOngoingHabitRequest {
                status: Some(OngoingStatus::Paused),
                ..Default::default()
            },
        ))
        .await
        .unwrap();
    let paused = ongoing
        .snapshot()
        .data
        .unwrap()
        .iter()
        .find(|o| o.ongoing_habit_id == created.ongoing_habit_id)
        .map(|o| o.status);
    assert_eq!(paused, Some(OngoingStatus::Paused));

    ctx.delete_ongoing_habit()
        .mutate(created.ongoing_habit_id)
        .await
        .unwrap();
    assert_eq!(ongoing.snapshot().data.unwrap().len(), 1);
}

#[tokio::test]
async fn updating_a_habit_refreshes_detail_and_list() {
    let backend = MockBackend::start().await;
    let ctx = signed_in(&backend).await;
    let list = ctx.habits();
    let detail = ctx.habit("h1");
    list.settled().await;
    assert_eq!(detail.settled().await.data.unwrap().name, "Read");

    ctx.update_habit()
        .mutate((
            "h1".into(),
            UpdateHabitRequest {
                name: Some("Read more".into()),
                ..Default::default()
            },
        ))
        .await
        .unwrap();

    // 详情键以列表键为前缀，一起失效
    assert_eq!(detail.snapshot().data.unwrap().name, "Read more");
    assert_eq!(list.snapshot().data.unwrap()[0].name, "Read more");
    assert_eq!(backend.hits("GET /habits/:id"), 2);
}

#[tokio::test]
async fn deleting_an_unwatched_habit_marks_the_list_stale() {
    let backend = MockBackend::start().await;
    let ctx = signed_in(&backend).await;
    {
        let habits = ctx.habits();
        habits.settled().await;
    }

    ctx.delete_habit().mutate("h1".into()).await.unwrap();

    let entry = ctx.cache.entry::<Vec<Habit>>(&habits_key()).unwrap();
    assert!(entry.is_stale);
    assert_eq!(backend.hits("GET /habits"), 1);

    let habits = ctx.habits();
    assert!(habits.settled().await.data.unwrap().is_empty());
    assert_eq!(backend.hits("GET /habits"), 2);
}

#[tokio::test]
async fn profile_update_refreshes_the_user_entry() {
    let backend = MockBackend::start().await;
    let ctx = signed_in(&backend).await;
    let user = ctx.current_user();
    user.settled().await;

    ctx.update_profile()
        .mutate(UpdateUserRequest {
            name: Some("Ada L.".into()),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(user.snapshot().data.unwrap().name, "Ada L.");
    assert!(ctx.cache.contains(&user_key()));
}

#[tokio::test]
async fn progress_filters_are_part_of_the_key() {
    let backend = MockBackend::start().await;
    let ctx = signed_in(&backend).await;

    let mut filters = BTreeMap::new();
    filters.insert("habit".to_string(), "Read".to_string());
    let read = ctx.progress(filters.clone());
    let same = ctx.progress(filters);
    let all = ctx.progress(BTreeMap::new());

    let (read, _, all) = tokio::join!(read.settled(), same.settled(), all.settled());
    assert_eq!(backend.hits("GET /progress"), 2);
    let read = read.data.unwrap();
    assert_eq!(read.habit_name.as_deref(), Some("Read"));
    assert_eq!(read.percentage(), Some(40.0));
    assert!(all.data.unwrap().habit_name.is_none());
}

#[tokio::test]
async fn admin_queries_page_and_search() {
    let backend = MockBackend::start().await;
    let ctx = signed_in(&backend).await;

    let page = ctx.admin_users(0, 20).settled().await.data.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.users[0].email, EMAIL);

    let empty = ctx.search_users_by_phone("");
    assert_eq!(empty.snapshot().state, QueryState::Idle);
    assert_eq!(backend.hits("GET /admin/search/phone"), 0);

    // 精确匹配返回单个对象，同样读成列表
    let found = ctx.search_users_by_phone("5550100").settled().await;
    assert_eq!(found.state, QueryState::Success);
    assert_eq!(found.data.unwrap()[0].email, EMAIL);

    let none = ctx.search_users_by_phone("0000000").settled().await;
    assert!(none.data.unwrap().is_empty());
}

#[tokio::test]
async fn dashboard_summary_from_fetched_lists() {
    let backend = MockBackend::start().await;
    let ctx = signed_in(&backend).await;
    let habits = ctx.habits();
    let ongoing = ctx.ongoing_habits();
    let (habits, ongoing) = tokio::join!(habits.settled(), ongoing.settled());

    let summary = DashboardSummary::from_lists(&habits.data.unwrap(), &ongoing.data.unwrap());
    assert_eq!(summary.total_habits, 1);
    assert_eq!(summary.in_progress, 1);
    assert_eq!(summary.overall_progress, 0.0);
}

#[tokio::test]
async fn anonymous_queries_surface_unauthorized() {
    let backend = MockBackend::start().await;
    let ctx = backend.context(Arc::new(MemoryTokenStore::new()));
    let mut notifications = ctx.notifier.subscribe();

    let habits = ctx.habits();
    let entry = habits.settled().await;

    assert_eq!(entry.state, QueryState::Error);
    assert!(entry.error.unwrap().is_auth_failure());
    assert_eq!(next_notification(&mut notifications).await.message, "Unauthorized");
}
