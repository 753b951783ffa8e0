//! Recording surface integration tests.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use loggate_api::record_router;
use loggate_record::Recorder;

const HEADER: &str = concat!(
    r#"{"version":2,"width":80,"height":24,"timestamp":1257894000,"#,
    r#""srcNode":"builder-7","srcNodeID":"nQRJBE5CNTRL","sshUser":"root","#,
    r#""localUser":"root","connectionID":"conn-1"}"#,
);

async fn router(dir: &std::path::Path) -> axum::Router {
    record_router(Arc::new(Recorder::new(dir).await.unwrap()))
}

fn post_record(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/record")
        .body(Body::from(body))
        .unwrap()
}

fn cast_body(payload: &str) -> Vec<u8> {
    let mut b = HEADER.as_bytes().to_vec();
    b.push(b'\n');
    b.extend_from_slice(payload.as_bytes());
    b
}

#[tokio::test]
async fn recording_is_persisted_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let router = router(dir.path()).await;

    let body = cast_body("[0.1, \"o\", \"$ ls\"]\n[0.2, \"o\", \"src\"]\n");
    let resp = router.oneshot(post_record(body.clone())).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let path = dir
        .path()
        .join("nQRJBE5CNTRL")
        .join("2009-11-10T23:00:00Z.cast");
    assert_eq!(std::fs::read(&path).unwrap(), body);
}

#[tokio::test]
async fn duplicate_recording_is_rejected_first_intact() {
    let dir = tempfile::tempdir().unwrap();
    let router = router(dir.path()).await;

    let first = cast_body("first\n");
    let resp = router.clone().oneshot(post_record(first.clone())).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = router
        .oneshot(post_record(cast_body("second\n")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let path = dir
        .path()
        .join("nQRJBE5CNTRL")
        .join("2009-11-10T23:00:00Z.cast");
    assert_eq!(std::fs::read(&path).unwrap(), first);
}

#[tokio::test]
async fn header_without_newline_is_a_500() {
    let dir = tempfile::tempdir().unwrap();
    let router = router(dir.path()).await;

    let resp = router
        .oneshot(post_record(HEADER.as_bytes().to_vec()))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn empty_body_is_discarded_with_success() {
    let dir = tempfile::tempdir().unwrap();
    let router = router(dir.path()).await;

    let resp = router.oneshot(post_record(Vec::new())).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn unknown_route_is_a_404() {
    let dir = tempfile::tempdir().unwrap();
    let router = router(dir.path()).await;

    let resp = router
        .oneshot(
            Request::builder()
                .uri("/recordings")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
