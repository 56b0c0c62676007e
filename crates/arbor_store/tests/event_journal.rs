mod common;

use arbor_store::{EntityEvent, LeafRepository, RootRepository};
use common::{Chore, Workspace, open_store, seed_tree, ts};
use serde_json::json;
use tempfile::tempdir;

#[tokio::test]
async fn events_are_journaled_with_the_entity_version() {
    let dir = tempdir().expect("tempdir");
    let store = open_store(dir.path()).await;
    let (_, _, list_id) = seed_tree(&store).await;
    let conn = store.connection();
    let chores = LeafRepository::new(conn, store.schemas(), store.codecs().clone())
        .await
        .expect("repo");

    let created = chores
        .create(
            Chore::new(list_id, "Laundry", ts(2025, 2, 1, 8)),
            &[EntityEvent::new(
                "Created",
                ts(2025, 2, 1, 8),
                json!({ "name": "Laundry" }),
            )],
        )
        .await
        .expect("create");
    let ref_id = created.header.ref_id;

    let mut renamed = created;
    renamed.name = "Laundry and folding".to_owned();
    renamed.header.version += 1;
    renamed.header.last_modified_time = ts(2025, 2, 2, 8);
    chores
        .save(
            renamed,
            &[EntityEvent::new(
                "Renamed",
                ts(2025, 2, 2, 8),
                json!({ "name": "Laundry and folding" }),
            )],
        )
        .await
        .expect("save");

    let history = chores.load_history(ref_id).await.expect("history");
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].kind, "Created");
    assert_eq!(history[0].version, 1);
    assert_eq!(history[1].kind, "Renamed");
    assert_eq!(history[1].version, 2);
    assert!(history[0].version < history[1].version);
    assert_eq!(history[1].payload["name"], "Laundry and folding");
    assert_eq!(chores.count_events(ref_id).await.expect("count"), 2);
}

#[tokio::test]
async fn one_mutation_with_k_events_appends_k_rows() {
    let dir = tempdir().expect("tempdir");
    let store = open_store(dir.path()).await;
    let conn = store.connection();
    let workspaces = RootRepository::new(conn, store.schemas(), store.codecs().clone())
        .await
        .expect("repo");

    let created = workspaces
        .create(
            Workspace::new("Home", ts(2025, 1, 1, 9)),
            &[
                EntityEvent::new("Created", ts(2025, 1, 1, 9), json!({})),
                EntityEvent::new("Tagged", ts(2025, 1, 1, 9), json!({ "tag": "default" })),
            ],
        )
        .await
        .expect("create");
    assert_eq!(
        workspaces
            .count_events(created.header.ref_id)
            .await
            .expect("count"),
        2
    );
}

#[tokio::test]
async fn a_read_never_returns_unpersisted_events() {
    let dir = tempdir().expect("tempdir");
    let store = open_store(dir.path()).await;
    let conn = store.connection();
    let workspaces = RootRepository::new(conn, store.schemas(), store.codecs().clone())
        .await
        .expect("repo");

    let created = workspaces
        .create(Workspace::new("Quiet", ts(2025, 1, 1, 9)), &[])
        .await
        .expect("create");
    let history = workspaces
        .load_history(created.header.ref_id)
        .await
        .expect("history");
    assert!(history.is_empty());
}

#[tokio::test]
async fn remove_purges_only_that_entitys_events() {
    let dir = tempdir().expect("tempdir");
    let store = open_store(dir.path()).await;
    let conn = store.connection();
    let workspaces = RootRepository::new(conn, store.schemas(), store.codecs().clone())
        .await
        .expect("repo");

    let doomed = workspaces
        .create(
            Workspace::new("Doomed", ts(2025, 1, 1, 9)),
            &[EntityEvent::new("Created", ts(2025, 1, 1, 9), json!({}))],
        )
        .await
        .expect("create doomed");
    let survivor = workspaces
        .create(
            Workspace::new("Survivor", ts(2025, 1, 1, 10)),
            &[EntityEvent::new("Created", ts(2025, 1, 1, 10), json!({}))],
        )
        .await
        .expect("create survivor");

    workspaces
        .remove(doomed.header.ref_id)
        .await
        .expect("remove");
    assert_eq!(
        workspaces
            .count_events(doomed.header.ref_id)
            .await
            .expect("count doomed"),
        0
    );
    assert_eq!(
        workspaces
            .count_events(survivor.header.ref_id)
            .await
            .expect("count survivor"),
        1
    );
}
