//! A test suite traced with plain `tracing` spans, drawn as a task tree.
//!
//! [`TaskLayer`] turns every span into a task nested under its parent span,
//! and every event into a log line kept above the tree.

use std::time::Duration;

use task_tally::*;
use tracing::{info, info_span, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let store = TaskStore::new();
    tracing_subscriber::registry()
        .with(TaskLayer::new(store.clone()).spans_as_tasks(true))
        .init();

    let tally = Tally::new(RendererConfig::default().log_history(3))?.store(store);
    tally
        .run(|_| async {
            // Spans are entered on a blocking thread, like synchronous test
            // runners do.
            if let Err(e) = tokio::task::spawn_blocking(run_suite).await {
                eprintln!("suite panicked: {e}");
            }
        })
        .await
}

fn run_suite() {
    let suite = info_span!("test suite", total = 3, completed = tracing::field::Empty);
    let _suite = suite.enter();

    let auth = info_span!(parent: &suite, "auth");
    auth.in_scope(|| {
        run_test(&auth, "login with valid credentials");
        run_test(&auth, "reject expired token");
        run_test(&auth, "refresh token rotation");
    });
    drop(auth);
    suite.record("completed", 1);

    let api = info_span!(parent: &suite, "api");
    api.in_scope(|| {
        run_test(&api, "GET /users returns 200");
        run_test(&api, "POST /users validates body");

        let pagination = info_span!(parent: &api, "pagination");
        pagination.in_scope(|| {
            run_test(&pagination, "default page size");
            run_test(&pagination, "cursor-based navigation");
        });
    });
    drop(api);
    suite.record("completed", 2);

    let db = info_span!(parent: &suite, "database", total = 4, completed = 0);
    for (i, name) in ["migrations", "seed", "rollback", "vacuum"].iter().enumerate() {
        std::thread::sleep(Duration::from_millis(250));
        if *name == "rollback" {
            warn!(step = *name, "rollback took longer than expected");
        }
        db.record("completed", i as u64 + 1);
    }
    drop(db);
    suite.record("completed", 3);
    info!(passed = 11, "suite finished");
}

fn run_test(parent: &tracing::Span, name: &str) {
    let span = info_span!(parent: parent, "test", message = name);
    let _guard = span.enter();
    std::thread::sleep(Duration::from_millis(200));
    info!(test = name, "ok");
}
