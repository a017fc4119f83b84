use std::sync::Arc;
use std::time::Duration;

use canvas::geometry::overlaps;
use uuid::Uuid;

use super::*;
use crate::error::ErrorCode;
use crate::notice::NoticeLevel;
use crate::remote::RemoteError;
use crate::state::test_helpers::{ApiCall, MockApi, task_at, test_state, wait_until};

const WAIT: Duration = Duration::from_secs(2);

async fn seed(state: &StudioState, rects: &[Rect]) -> Vec<ItemId> {
    let mut canvas = state.canvas.write().await;
    rects
        .iter()
        .enumerate()
        .map(|(i, rect)| {
            let item = CanvasItem::media(ItemKind::Image, format!("https://cdn.test/{i}.png"), *rect, None);
            let id = item.id;
            canvas.insert_item(item, Some(format!("remote-item-{i}")));
            id
        })
        .collect()
}

/// Wait past the debounce so pending writes fire.
async fn settle_debounce(state: &StudioState) {
    tokio::time::sleep(state.config.sync_debounce * 3).await;
}

fn item_updates(api: &MockApi) -> Vec<(String, ItemPatch)> {
    api.calls()
        .into_iter()
        .filter_map(|call| match call {
            ApiCall::UpdateCanvasItem(id, patch) => Some((id, patch)),
            _ => None,
        })
        .collect()
}

// =============================================================================
// move / resize
// =============================================================================

#[tokio::test]
async fn repeated_moves_coalesce_into_one_write() {
    let api = MockApi::new();
    let (_dir, state) = test_state(Arc::clone(&api));
    let ids = seed(&state, &[Rect::new(0.0, 0.0, 100.0, 100.0)]).await;

    for step in 1..=5 {
        move_item(&state, ids[0], f64::from(step) * 10.0, 0.0).await.unwrap();
    }
    // Local state moves immediately.
    assert_eq!(state.canvas.read().await.items().get(&ids[0]).unwrap().x, 50.0);
    assert!(item_updates(&api).is_empty());

    settle_debounce(&state).await;
    assert_eq!(item_updates(&api), vec![("remote-item-0".to_string(), ItemPatch::position(50.0, 0.0))]);
}

#[tokio::test]
async fn move_then_resize_persists_both() {
    let api = MockApi::new();
    let (_dir, state) = test_state(Arc::clone(&api));
    let ids = seed(&state, &[Rect::new(0.0, 0.0, 100.0, 100.0)]).await;

    resize_item(&state, ids[0], Rect::new(0.0, 0.0, 240.0, 120.0)).await.unwrap();
    move_item(&state, ids[0], 30.0, 40.0).await.unwrap();
    settle_debounce(&state).await;

    let expected = ItemPatch::transform(Rect::new(30.0, 40.0, 240.0, 120.0));
    assert_eq!(item_updates(&api), vec![("remote-item-0".to_string(), expected)]);
}

#[tokio::test]
async fn different_items_do_not_coalesce() {
    let api = MockApi::new();
    let (_dir, state) = test_state(Arc::clone(&api));
    let ids = seed(&state, &[Rect::new(0.0, 0.0, 10.0, 10.0), Rect::new(50.0, 0.0, 10.0, 10.0)]).await;

    move_item(&state, ids[0], 1.0, 1.0).await.unwrap();
    move_item(&state, ids[1], 2.0, 2.0).await.unwrap();
    settle_debounce(&state).await;

    let updates = item_updates(&api);
    assert_eq!(updates.len(), 2);
    assert!(updates.contains(&("remote-item-0".to_string(), ItemPatch::position(1.0, 1.0))));
    assert!(updates.contains(&("remote-item-1".to_string(), ItemPatch::position(2.0, 2.0))));
}

#[tokio::test]
async fn move_unknown_item_fails() {
    let api = MockApi::new();
    let (_dir, state) = test_state(api);
    let err = move_item(&state, Uuid::new_v4(), 0.0, 0.0).await.unwrap_err();
    assert!(matches!(err, ActionError::ItemNotFound(_)));
    assert_eq!(err.error_code(), "E_ITEM_NOT_FOUND");
}

#[tokio::test]
async fn move_persist_failure_keeps_local_change() {
    let api = MockApi::new();
    api.fail_updates(RemoteError::Response { status: 500, body: String::new() });
    let (_dir, state) = test_state(Arc::clone(&api));
    let ids = seed(&state, &[Rect::new(0.0, 0.0, 10.0, 10.0)]).await;

    move_item(&state, ids[0], 70.0, 80.0).await.unwrap();
    settle_debounce(&state).await;

    assert_eq!(item_updates(&api).len(), 1);
    assert_eq!(state.canvas.read().await.items().get(&ids[0]).unwrap().rect(), Rect::new(70.0, 80.0, 10.0, 10.0));
}

// =============================================================================
// view
// =============================================================================

#[tokio::test]
async fn view_changes_coalesce() {
    let api = MockApi::new();
    let (_dir, state) = test_state(Arc::clone(&api));

    pan_by(&state, 10.0, 0.0).await;
    pan_by(&state, 10.0, 5.0).await;
    zoom_at(&state, Point::new(0.0, 0.0), 2.0).await;
    settle_debounce(&state).await;

    let views: Vec<View> = api
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            ApiCall::UpdateSession(view) => Some(view),
            _ => None,
        })
        .collect();
    assert_eq!(views.len(), 1);
    assert_eq!(views[0], state.canvas.read().await.view());
    assert!((views[0].zoom - 2.0).abs() < f64::EPSILON);
}

// =============================================================================
// copy / paste
// =============================================================================

#[tokio::test]
async fn copy_requires_a_selection() {
    let api = MockApi::new();
    let (_dir, state) = test_state(api);
    seed(&state, &[Rect::new(0.0, 0.0, 10.0, 10.0)]).await;
    assert!(matches!(copy(&state).await, Err(ActionError::NothingSelected)));
}

#[tokio::test]
async fn copy_single_and_multi_are_exclusive() {
    let api = MockApi::new();
    let (_dir, state) = test_state(api);
    let ids = seed(&state, &[Rect::new(0.0, 0.0, 10.0, 10.0), Rect::new(50.0, 0.0, 10.0, 10.0)]).await;

    select_all(&state).await;
    assert_eq!(copy(&state).await.unwrap(), 2);
    assert!(matches!(state.clipboard.read().unwrap(), Some(ClipboardPayload::Multi(_))));

    select(&state, ids[1]).await;
    assert_eq!(copy(&state).await.unwrap(), 1);
    let payload = state.clipboard.read().unwrap().unwrap();
    assert!(matches!(&payload, ClipboardPayload::Single(item) if item.id == ids[1]));
}

#[tokio::test]
async fn paste_places_items_clear_of_everything() {
    let api = MockApi::new();
    let (_dir, state) = test_state(Arc::clone(&api));
    seed(&state, &[Rect::new(0.0, 0.0, 200.0, 200.0)]).await;

    let copied = vec![
        CanvasItem::media(ItemKind::Image, "https://cdn.test/a.png", Rect::new(0.0, 0.0, 200.0, 200.0), None),
        CanvasItem::media(ItemKind::Image, "https://cdn.test/b.png", Rect::new(0.0, 0.0, 200.0, 200.0), None),
    ];
    let source_ids: Vec<ItemId> = copied.iter().map(|i| i.id).collect();
    state.clipboard.write(&ClipboardPayload::Multi(copied)).unwrap();

    let pasted = paste(&state).await.unwrap();
    assert_eq!(pasted.len(), 2);
    assert!(pasted.iter().all(|p| !source_ids.contains(&p.id)));

    let canvas = state.canvas.read().await;
    let rects: Vec<Rect> = canvas.items().rects();
    assert_eq!(rects.len(), 3);
    for (i, a) in rects.iter().enumerate() {
        for b in &rects[i + 1..] {
            assert!(!overlaps(a, b, state.config.placement_padding), "{a:?} overlaps {b:?}");
        }
    }
    for item in &pasted {
        assert!(canvas.remote_id_for(&item.id).is_some());
    }
    assert_eq!(canvas.selection().len(), 2);
    assert_eq!(api.count(|c| matches!(c, ApiCall::CreateCanvasItem(_))), 2);
}

#[tokio::test]
async fn paste_avoids_placeholders() {
    let api = MockApi::new();
    let (_dir, state) = test_state(api);
    state.queue.add(task_at("t1", 1, Rect::new(0.0, 0.0, 100.0, 100.0))).unwrap();
    reconcile_placeholders(&state).await.unwrap();

    let source = CanvasItem::media(ItemKind::Image, "https://cdn.test/a.png", Rect::new(0.0, 0.0, 100.0, 100.0), None);
    state.clipboard.write(&ClipboardPayload::Single(source)).unwrap();
    let pasted = paste(&state).await.unwrap();

    let placeholder = state.canvas.read().await.placeholder_for_task("t1").unwrap().rect();
    assert!(!overlaps(&pasted[0].rect(), &placeholder, state.config.placement_padding));
}

#[tokio::test]
async fn paste_keeps_items_when_persist_fails() {
    let api = MockApi::new();
    api.fail_create(RemoteError::Request("offline".into()));
    let (_dir, state) = test_state(api);

    let source = CanvasItem::media(ItemKind::Image, "https://cdn.test/a.png", Rect::new(0.0, 0.0, 50.0, 50.0), None);
    state.clipboard.write(&ClipboardPayload::Single(source)).unwrap();
    let pasted = paste(&state).await.unwrap();

    let canvas = state.canvas.read().await;
    assert!(canvas.items().contains(&pasted[0].id));
    assert!(canvas.remote_id_for(&pasted[0].id).is_none());
}

#[tokio::test]
async fn move_during_paste_create_is_persisted_once_created() {
    let api = MockApi::new();
    api.set_create_delay(Duration::from_millis(100));
    let (_dir, state) = test_state(Arc::clone(&api));
    let source = CanvasItem::media(ItemKind::Image, "https://cdn.test/a.png", Rect::new(0.0, 0.0, 50.0, 50.0), None);
    state.clipboard.write(&ClipboardPayload::Single(source)).unwrap();

    let pasting = tokio::spawn({
        let state = state.clone();
        async move { paste(&state).await }
    });
    assert!(wait_until(WAIT, || state.canvas.try_read().is_ok_and(|c| c.items().len() == 1)).await);
    let id = state.canvas.read().await.items().as_slice()[0].id;
    move_item(&state, id, 700.0, 800.0).await.unwrap();
    assert!(state.canvas.read().await.remote_id_for(&id).is_none());

    let pasted = pasting.await.unwrap().unwrap();
    assert_eq!(pasted[0].id, id);
    settle_debounce(&state).await;

    let remote_id = state.canvas.read().await.remote_id_for(&id).unwrap().to_string();
    assert_eq!(item_updates(&api), vec![(remote_id, ItemPatch::position(700.0, 800.0))]);
}

#[tokio::test]
async fn paste_with_empty_clipboard_fails() {
    let api = MockApi::new();
    let (_dir, state) = test_state(api);
    assert!(matches!(paste(&state).await, Err(ActionError::ClipboardEmpty)));
}

// =============================================================================
// delete / cut
// =============================================================================

#[tokio::test]
async fn delete_removes_items_and_prunes_selection() {
    let api = MockApi::new();
    let (_dir, state) = test_state(Arc::clone(&api));
    let ids = seed(&state, &[Rect::new(0.0, 0.0, 10.0, 10.0), Rect::new(50.0, 0.0, 10.0, 10.0)]).await;
    select_all(&state).await;

    assert_eq!(delete_items(&state, &[ids[0]]).await.unwrap(), 1);

    let canvas = state.canvas.read().await;
    assert!(!canvas.items().contains(&ids[0]));
    assert_eq!(canvas.selection().ids(), &[ids[1]]);
    assert_eq!(api.calls().last(), Some(&ApiCall::BatchDelete(vec!["remote-item-0".to_string()])));
}

#[tokio::test]
async fn rejected_delete_leaves_items_and_notifies() {
    let api = MockApi::new();
    api.fail_batch_delete(RemoteError::Rejected("locked".into()));
    let (_dir, state) = test_state(Arc::clone(&api));
    let mut notices = state.notices.subscribe();
    let ids = seed(&state, &[Rect::new(0.0, 0.0, 10.0, 10.0), Rect::new(50.0, 0.0, 10.0, 10.0)]).await;
    select_all(&state).await;

    let err = delete_selected(&state).await.unwrap_err();
    assert!(matches!(err, ActionError::Remote(RemoteError::Rejected(_))));

    let canvas = state.canvas.read().await;
    assert_eq!(canvas.items().len(), 2);
    assert!(ids.iter().all(|id| canvas.items().contains(id) && !canvas.is_deleting(id)));
    assert_eq!(canvas.selection().len(), 2);

    let notice = notices.try_recv().unwrap();
    assert_eq!(notice.level, NoticeLevel::Error);
    assert_eq!(notice.code, Some("E_REMOTE_REJECTED"));
}

#[tokio::test]
async fn delete_of_unpersisted_items_skips_remote() {
    let api = MockApi::new();
    let (_dir, state) = test_state(Arc::clone(&api));
    let item = CanvasItem::media(ItemKind::Image, "https://cdn.test/a.png", Rect::new(0.0, 0.0, 10.0, 10.0), None);
    let id = item.id;
    state.canvas.write().await.insert_item(item, None);

    assert_eq!(delete_items(&state, &[id]).await.unwrap(), 1);
    assert_eq!(api.count(|c| matches!(c, ApiCall::BatchDelete(_))), 0);
}

#[tokio::test]
async fn delete_with_nothing_selected_fails() {
    let api = MockApi::new();
    let (_dir, state) = test_state(api);
    assert!(matches!(delete_selected(&state).await, Err(ActionError::NothingSelected)));
}

#[tokio::test]
async fn cut_copies_then_deletes() {
    let api = MockApi::new();
    let (_dir, state) = test_state(api);
    let ids = seed(&state, &[Rect::new(0.0, 0.0, 10.0, 10.0)]).await;
    select(&state, ids[0]).await;

    assert_eq!(cut(&state).await.unwrap(), 1);
    assert!(state.canvas.read().await.items().is_empty());
    assert!(matches!(state.clipboard.read().unwrap(), Some(ClipboardPayload::Single(item)) if item.id == ids[0]));
}

#[tokio::test]
async fn cut_deletes_even_when_copy_fails() {
    let api = MockApi::new();
    let (_dir, state) = test_state(api);
    // A directory where the clipboard file should be makes the write fail.
    std::fs::create_dir_all(state.clipboard.path()).unwrap();
    let ids = seed(&state, &[Rect::new(0.0, 0.0, 10.0, 10.0)]).await;
    select(&state, ids[0]).await;

    assert_eq!(cut(&state).await.unwrap(), 1);
    assert!(state.canvas.read().await.items().is_empty());
}

// =============================================================================
// placeholders
// =============================================================================

#[tokio::test]
async fn queue_watcher_reconciles_placeholders() {
    let api = MockApi::new();
    let (_dir, state) = test_state(api);
    let stop = CancellationToken::new();
    let watcher = watch_queue(state.clone(), stop.clone());

    state.queue.add(task_at("t1", 1, Rect::new(0.0, 0.0, 100.0, 100.0))).unwrap();
    state.queue.add(task_at("t2", 2, Rect::new(0.0, 0.0, 100.0, 100.0))).unwrap();
    let placeholders = |n: usize| state.canvas.try_read().is_ok_and(|c| c.placeholders().len() == n);
    assert!(wait_until(WAIT, || placeholders(2)).await);

    state.queue.remove("t1").unwrap();
    assert!(wait_until(WAIT, || placeholders(1)).await);

    stop.cancel();
    watcher.await.unwrap();
}
