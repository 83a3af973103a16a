use std::{
    fs,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{SystemTime, UNIX_EPOCH},
};

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use dream_gateway::{build_gateway_router, GatewayState};
use dream_share::{decode_share_token, encode_share_token, ShareLinkBuilder};
use dream_survey::{load_survey_catalog, ClientContext, FixedFraction, SurveyLoadOptions};
use serde_json::{json, Value};
use tower::ServiceExt;

static WORKSPACE_COUNTER: AtomicU64 = AtomicU64::new(1);

struct IsolatedWorkspace {
    root: PathBuf,
}

impl IsolatedWorkspace {
    fn new(label: &str) -> Self {
        let tick = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        let count = WORKSPACE_COUNTER.fetch_add(1, Ordering::Relaxed);
        let root = std::env::temp_dir().join(format!(
            "dream-{label}-{}-{tick}-{count}",
            std::process::id()
        ));
        fs::create_dir_all(&root).expect("must create isolated workspace root");
        Self { root }
    }

    fn root(&self) -> &Path {
        &self.root
    }

    fn write_survey(&self, name: &str, body: &str) {
        fs::write(self.root.join(name), body).expect("must write survey config");
    }
}

impl Drop for IsolatedWorkspace {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.root);
    }
}

const WELCOME_SURVEY: &str = "\
title: Welcome
description: First impressions
options:
  great:
    name: Great
    color: green
  meh:
    name: Meh
trigger:
  first_time_user: true
  after_session_start: true
  with_probability: 0.4
";

const SKILL_SURVEY: &str = "\
title: Skill feedback
description: Was the movie skill helpful?
options:
  yes:
    name: Yes
  no:
    name: No
trigger:
  when_skill_activated: dff_movie_skill
  only_after_n_messages: 3
  with_probability: 0.6
";

const BROKEN_SURVEY: &str = "\
title: Broken
description: Missing probability
options:
  a:
    name: A
trigger:
  first_time_user: true
";

fn router_for(workspace: &IsolatedWorkspace, fraction: f64) -> Router {
    let catalog = load_survey_catalog(workspace.root(), SurveyLoadOptions::default())
        .expect("load surveys");
    let state = GatewayState::new(
        catalog,
        ShareLinkBuilder::new("dream.deeppavlov.ai").expect("share links"),
        Box::new(FixedFraction(fraction)),
    );
    build_gateway_router(Arc::new(state))
}

async fn call(router: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.expect("gateway response");
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    let parsed = serde_json::from_slice(&body).expect("response body should be json");
    (status, parsed)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

#[tokio::test]
async fn integration_share_link_round_trips_through_gateway() {
    let workspace = IsolatedWorkspace::new("share-roundtrip");
    let router = router_for(&workspace, 0.0);

    let (status, built) = call(
        router.clone(),
        post_json(
            "/api/share",
            json!({
                "dialog_id": "65f1c0ffee",
                "messages": [{"idx": 3}, {"idx": 4}, {"idx": 0}, {"idx": 10}, {"idx": 5}]
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let url = built["url"].as_str().expect("url string");
    assert_eq!(url, "https://dream.deeppavlov.ai/shared?d=65f1c0ffee&m=0.3-5.10");

    let (_, query) = url.split_once('?').expect("share url has a query");
    let request = Request::builder()
        .uri(format!("/api/shared?{query}"))
        .body(Body::empty())
        .expect("request");
    let (status, parsed) = call(router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parsed["dialog_id"], "65f1c0ffee");
    assert_eq!(parsed["message_idxs"], json!([0, null, 3, 4, 5, null, 10]));
}

#[tokio::test]
async fn integration_survey_catalog_from_disk_drives_selection() {
    let workspace = IsolatedWorkspace::new("survey-selection");
    workspace.write_survey("welcome.yml", WELCOME_SURVEY);
    workspace.write_survey("movie_skill.yaml", SKILL_SURVEY);
    workspace.write_survey("broken.yml", BROKEN_SURVEY);

    let context = ClientContext {
        first_time_user: true,
        messages_so_far: 4,
        just_started_session: true,
        active_skill: "dff_movie_skill".to_string(),
    };
    let body = serde_json::to_value(&context).expect("encode context");

    // Files load as movie_skill (60 slots) then welcome (40 slots).
    let (status, selected) = call(
        router_for(&workspace, 0.59),
        post_json("/api/survey", body.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(selected["id"], "movie_skill");

    let (_, selected) = call(router_for(&workspace, 0.6), post_json("/api/survey", body)).await;
    assert_eq!(selected["id"], "welcome");
    assert_eq!(selected["options"]["great"]["color"], "green");
}

#[tokio::test]
async fn integration_survey_endpoint_returns_null_for_unmatched_context() {
    let workspace = IsolatedWorkspace::new("survey-null");
    workspace.write_survey("welcome.yml", WELCOME_SURVEY);

    let context = json!({
        "firstTimeUser": false,
        "messagesSoFar": 12,
        "justStartedSession": false,
        "activeSkill": "dff_movie_skill"
    });
    let (status, selected) =
        call(router_for(&workspace, 0.0), post_json("/api/survey", context)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(selected, Value::Null);
}

#[test]
fn integration_codec_matches_documented_examples() {
    assert_eq!(
        encode_share_token([0u32, 1, 2, 5, 7, 8, 9]).expect("encode"),
        "0-2.5.7-9"
    );
    assert_eq!(
        decode_share_token("0-2.5.7-9").expect("decode"),
        vec![
            Some(0),
            Some(1),
            Some(2),
            None,
            Some(5),
            None,
            Some(7),
            Some(8),
            Some(9)
        ]
    );
}
