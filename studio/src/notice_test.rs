use super::*;
use crate::remote::RemoteError;

#[tokio::test]
async fn error_notice_carries_code() {
    let notices = Notices::new();
    let mut rx = notices.subscribe();
    notices.error("delete failed", &RemoteError::Rejected("locked".into()));

    let notice = rx.recv().await.unwrap();
    assert_eq!(notice.level, NoticeLevel::Error);
    assert_eq!(notice.code, Some("E_REMOTE_REJECTED"));
    assert!(notice.message.starts_with("delete failed: "));
    assert!(notice.message.contains("locked"));
}

#[tokio::test]
async fn info_and_message_notices_have_no_code() {
    let notices = Notices::new();
    let mut rx = notices.subscribe();
    notices.info("queue resumed");
    notices.error_message("content policy");

    let first = rx.recv().await.unwrap();
    assert_eq!(first.level, NoticeLevel::Info);
    assert!(first.code.is_none());
    let second = rx.recv().await.unwrap();
    assert_eq!(second.level, NoticeLevel::Error);
    assert_eq!(second.message, "content policy");
}

#[test]
fn send_without_subscribers_is_silent() {
    let notices = Notices::default();
    notices.info("nobody listening");
}
