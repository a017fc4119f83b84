use std::sync::atomic::AtomicUsize;

use canvas::doc::ItemStatus;

use super::*;
use crate::chat::ChatMessage;
use crate::remote::types::SessionDetail;
use crate::state::test_helpers::{ApiCall, MockApi, SESSION_ID, task, test_state};

const DELAY: Duration = Duration::from_millis(20);

async fn past_delay() {
    tokio::time::sleep(DELAY * 3).await;
}

// =============================================================================
// Debouncer
// =============================================================================

#[tokio::test]
async fn burst_on_one_key_runs_only_the_last_job() {
    let debouncer = Debouncer::new(DELAY);
    let runs = Arc::new(Mutex::new(Vec::new()));
    for n in 0..5 {
        let runs = Arc::clone(&runs);
        debouncer.schedule("view", move || async move { runs.lock().unwrap().push(n) });
    }
    assert_eq!(debouncer.pending(), 1);

    past_delay().await;
    assert_eq!(*runs.lock().unwrap(), vec![4]);
    assert_eq!(debouncer.pending(), 0);
}

#[tokio::test]
async fn separate_keys_do_not_delay_each_other() {
    let debouncer = Debouncer::new(DELAY);
    let runs = Arc::new(AtomicUsize::new(0));
    for key in ["a", "b", "c"] {
        let runs = Arc::clone(&runs);
        debouncer.schedule(key, move || async move {
            runs.fetch_add(1, Ordering::SeqCst);
        });
    }
    assert_eq!(debouncer.pending(), 3);

    past_delay().await;
    assert_eq!(runs.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn cancelled_jobs_never_run() {
    let debouncer = Debouncer::new(DELAY);
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&runs);
    debouncer.schedule(1_u32, move || async move {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    debouncer.cancel_all();

    past_delay().await;
    assert_eq!(runs.load(Ordering::SeqCst), 0);
    assert_eq!(debouncer.pending(), 0);
}

// =============================================================================
// SessionSync
// =============================================================================

#[tokio::test]
async fn pending_item_patches_merge() {
    let api = MockApi::new();
    let sync = SessionSync::new(Arc::clone(&api) as Arc<dyn SessionApi>, SESSION_ID, DELAY);
    let id = Uuid::new_v4();

    sync.schedule_item(id, "r1".into(), ItemPatch::position(1.0, 2.0));
    sync.schedule_item(id, "r1".into(), ItemPatch { width: Some(10.0), height: Some(20.0), ..ItemPatch::default() });
    sync.schedule_item(id, "r1".into(), ItemPatch::position(3.0, 4.0));
    past_delay().await;

    let expected = ItemPatch { x: Some(3.0), y: Some(4.0), width: Some(10.0), height: Some(20.0) };
    assert_eq!(api.calls(), vec![ApiCall::UpdateCanvasItem("r1".into(), expected)]);
}

#[tokio::test]
async fn view_write_sends_latest_view() {
    let api = MockApi::new();
    let sync = SessionSync::new(Arc::clone(&api) as Arc<dyn SessionApi>, SESSION_ID, DELAY);

    sync.schedule_view(View { zoom: 1.5, pan: Point::new(0.0, 0.0) });
    sync.schedule_view(View { zoom: 2.0, pan: Point::new(5.0, 5.0) });
    past_delay().await;

    assert_eq!(api.calls(), vec![ApiCall::UpdateSession(View { zoom: 2.0, pan: Point::new(5.0, 5.0) })]);
}

#[tokio::test]
async fn cancel_all_drops_pending_writes() {
    let api = MockApi::new();
    let sync = SessionSync::new(Arc::clone(&api) as Arc<dyn SessionApi>, SESSION_ID, DELAY);

    sync.schedule_view(View::default());
    sync.schedule_item(Uuid::new_v4(), "r1".into(), ItemPatch::position(1.0, 1.0));
    assert_eq!(sync.pending(), 2);
    sync.cancel_all();
    past_delay().await;

    assert!(api.calls().is_empty());
}

// =============================================================================
// hydrate
// =============================================================================

fn remote_item(id: &str, kind: ItemKind, x: f64) -> RemoteCanvasItem {
    RemoteCanvasItem {
        id: id.to_string(),
        kind,
        url: format!("https://cdn.test/{id}.png"),
        x,
        y: 2000.0,
        width: 100.0,
        height: 100.0,
        prompt: None,
    }
}

fn record(id: &str, status: ItemStatus) -> GenerationRecord {
    GenerationRecord {
        id: id.to_string(),
        task_id: None,
        status,
        prompt: format!("prompt {id}"),
        model: "test-model".into(),
        aspect_ratio: Some("1:1".into()),
        quality: None,
        style: None,
        message_id: Some(format!("msg-{id}")),
        created_at: Some(1),
        canvas_item: None,
    }
}

#[tokio::test]
async fn hydrate_replaces_local_state_and_resumes_jobs() {
    let api = MockApi::new();
    let stable_id = Uuid::new_v4();
    let view = View { zoom: 2.0, pan: Point::new(10.0, 20.0) };

    let mut running = record("gen-1", ItemStatus::Processing);
    running.task_id = Some("job-1".into());
    running.canvas_item = Some(Rect::new(500.0, 500.0, 200.0, 200.0));
    let already_queued = record("job-2", ItemStatus::Queued);
    let mut no_geometry = record("gen-3", ItemStatus::Queued);
    no_geometry.aspect_ratio = Some("16:9".into());
    let finished = record("gen-4", ItemStatus::Completed);

    api.set_detail(SessionDetail {
        id: SESSION_ID.into(),
        view: Some(view),
        items: vec![
            remote_item(&stable_id.to_string(), ItemKind::Image, 2000.0),
            remote_item("legacy-7", ItemKind::Video, 2200.0),
            remote_item("ghost", ItemKind::Placeholder, 2400.0),
        ],
        generations: vec![running, already_queued, no_geometry, finished],
        messages: vec![ChatMessage::user("hello", vec![]), ChatMessage::pending_assistant("")],
        ..SessionDetail::default()
    });

    let (_dir, state) = test_state(Arc::clone(&api));
    state.queue.add(task("job-2", 1)).unwrap();
    let stale = CanvasItem::media(ItemKind::Image, "https://cdn.test/stale.png", Rect::new(0.0, 0.0, 10.0, 10.0), None);
    let stale_id = stale.id;
    state.canvas.write().await.insert_item(stale, None);

    let report = hydrate(&state).await.unwrap();
    assert_eq!(report, HydrateReport { items: 2, messages: 2, enqueued: 2 });

    let canvas = state.canvas.read().await;
    assert_eq!(canvas.view(), view);
    assert_eq!(canvas.items().len(), 2);
    assert!(!canvas.items().contains(&stale_id));
    assert!(canvas.items().contains(&stable_id));
    assert_eq!(canvas.remote_id_for(&stable_id), Some(stable_id.to_string().as_str()));
    let legacy = canvas.items().iter().find(|i| i.kind == ItemKind::Video).unwrap();
    assert_eq!(canvas.remote_id_for(&legacy.id), Some("legacy-7"));
    assert_eq!(canvas.placeholders().len(), 3);
    drop(canvas);

    let queued = state.queue.get().unwrap();
    let ids: Vec<&str> = queued.iter().map(|t| t.task_id.as_str()).collect();
    assert_eq!(ids.len(), 3);
    for id in ["job-1", "job-2", "gen-3"] {
        assert!(ids.contains(&id), "{id} should be queued");
    }
    let job_1 = queued.iter().find(|t| t.task_id == "job-1").unwrap();
    assert_eq!(job_1.rect(), Rect::new(500.0, 500.0, 200.0, 200.0));
    assert_eq!(job_1.message_id, "msg-gen-1");
    assert_eq!(job_1.status, ItemStatus::Processing);

    let gen_3 = queued.iter().find(|t| t.task_id == "gen-3").unwrap();
    let origin = view.placement_origin();
    assert_eq!((gen_3.x, gen_3.y), (origin.x, origin.y));
    assert!(gen_3.width > gen_3.height);

    assert_eq!(state.transcript.read().await.len(), 2);
}

#[tokio::test]
async fn hydrate_of_empty_session_clears_everything() {
    let api = MockApi::new();
    let (_dir, state) = test_state(Arc::clone(&api));
    let item = CanvasItem::media(ItemKind::Image, "https://cdn.test/a.png", Rect::new(0.0, 0.0, 10.0, 10.0), None);
    state.canvas.write().await.insert_item(item, Some("r1".into()));
    state.transcript.write().await.push(ChatMessage::user("old", vec![]));

    let report = hydrate(&state).await.unwrap();

    assert_eq!(report, HydrateReport::default());
    assert!(state.canvas.read().await.items().is_empty());
    assert_eq!(state.canvas.read().await.view(), View::default());
    assert!(state.transcript.read().await.is_empty());
    assert_eq!(api.calls(), vec![ApiCall::GetSessionDetail(SESSION_ID.into())]);
}
