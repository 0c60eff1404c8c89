// tests/task_engine_test.rs
// Mutation-path coverage for the task engine: outline numbering, baseline
// aggregation, resource synchronization, permissions, soft delete.

use chrono::NaiveDate;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use ganttd::projects::store as project_store;
use ganttd::projects::types::{ProjectResourceRow, ProjectStatus};
use ganttd::tasks::error::TaskError;
use ganttd::tasks::policy::{Caller, Role};
use ganttd::tasks::service::TaskService;
use ganttd::tasks::types::{Segment, TaskNode, TaskResourceInput};

/// In-memory database with migrations. One connection only: the database
/// lives and dies with it.
async fn create_test_db() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");

    ganttd::db::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    pool
}

async fn seed_project(pool: &SqlitePool, created_by: &str) -> Uuid {
    let id = Uuid::new_v4();
    let mut conn = pool.acquire().await.expect("acquire");
    project_store::create_project(&mut conn, id, "Test Project", ProjectStatus::Active, created_by)
        .await
        .expect("Failed to seed project");
    id
}

fn admin() -> Caller {
    Caller {
        user_id: "admin".to_string(),
        role: Role::Admin,
        resource_id: None,
    }
}

fn user(user_id: &str) -> Caller {
    Caller {
        user_id: user_id.to_string(),
        role: Role::User,
        resource_id: None,
    }
}

fn resource_user(user_id: &str, resource_id: &str) -> Caller {
    Caller {
        user_id: user_id.to_string(),
        role: Role::User,
        resource_id: Some(resource_id.to_string()),
    }
}

fn node(name: &str) -> TaskNode {
    TaskNode {
        id: None,
        parent_id: None,
        name: name.to_string(),
        start_date: None,
        end_date: None,
        baseline_start: None,
        baseline_end: None,
        duration: None,
        progress: None,
        cost: None,
        predecessor: None,
        segments: Vec::new(),
        indicators: Vec::new(),
        resource_groups: Vec::new(),
        resources: Vec::new(),
        subtasks: Vec::new(),
    }
}

fn d(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

async fn project_window(pool: &SqlitePool, project_id: Uuid) -> (Option<NaiveDate>, Option<NaiveDate>) {
    let project = project_store::fetch_project(pool, project_id)
        .await
        .expect("fetch project")
        .expect("project exists");
    (project.start_date, project.end_date)
}

#[tokio::test]
async fn scenario_a_root_outline_numbers() {
    let pool = create_test_db().await;
    let project = seed_project(&pool, "alice").await;
    let service = TaskService::new(pool.clone());
    let caller = user("alice");

    let t1 = service
        .create_task(project, node("T1"), &caller)
        .await
        .expect("create T1");
    let t2 = service
        .create_task(project, node("T2"), &caller)
        .await
        .expect("create T2");

    let tree1 = service.get_task(t1, &caller).await.expect("get T1");
    let tree2 = service.get_task(t2, &caller).await.expect("get T2");
    assert_eq!(tree1.task.outline_number, "1");
    assert_eq!(tree2.task.outline_number, "2");
    assert!(!tree1.task.is_subtask);
}

#[tokio::test]
async fn scenario_b_subtask_outline_numbers() {
    let pool = create_test_db().await;
    let project = seed_project(&pool, "alice").await;
    let service = TaskService::new(pool.clone());
    let caller = user("alice");

    let t1 = service
        .create_task(project, node("T1"), &caller)
        .await
        .expect("create T1");

    let mut sub1 = node("S1");
    sub1.parent_id = Some(t1);
    let s1 = service
        .create_task(project, sub1, &caller)
        .await
        .expect("create first subtask");

    let mut sub2 = node("S2");
    sub2.parent_id = Some(t1);
    let s2 = service
        .create_task(project, sub2, &caller)
        .await
        .expect("create second subtask");

    let tree1 = service.get_task(s1, &caller).await.expect("get S1");
    let tree2 = service.get_task(s2, &caller).await.expect("get S2");
    assert_eq!(tree1.task.outline_number, "1.1");
    assert_eq!(tree2.task.outline_number, "1.2");
    assert!(tree1.task.is_subtask);
    assert!(tree2.task.is_subtask);
}

#[tokio::test]
async fn scenario_c_baseline_window_tracks_tasks() {
    let pool = create_test_db().await;
    let project = seed_project(&pool, "alice").await;
    let service = TaskService::new(pool.clone());
    let caller = user("alice");

    let mut t1 = node("T1");
    t1.baseline_start = Some(d("2024-01-01"));
    t1.baseline_end = Some(d("2024-01-10"));
    service.create_task(project, t1, &caller).await.expect("create T1");

    let mut t2 = node("T2");
    t2.baseline_start = Some(d("2024-02-01"));
    t2.baseline_end = Some(d("2024-02-05"));
    let t2_id = service.create_task(project, t2, &caller).await.expect("create T2");

    assert_eq!(
        project_window(&pool, project).await,
        (Some(d("2024-01-01")), Some(d("2024-02-05")))
    );

    service
        .delete_tasks(project, vec![t2_id], &caller)
        .await
        .expect("delete T2");

    assert_eq!(
        project_window(&pool, project).await,
        (Some(d("2024-01-01")), Some(d("2024-01-10")))
    );
}

#[tokio::test]
async fn empty_project_window_is_null() {
    let pool = create_test_db().await;
    let project = seed_project(&pool, "alice").await;
    let service = TaskService::new(pool.clone());
    let caller = user("alice");

    let t1 = service
        .create_task(project, node("T1"), &caller)
        .await
        .expect("create T1");
    service
        .delete_tasks(project, vec![t1], &caller)
        .await
        .expect("delete T1");

    assert_eq!(project_window(&pool, project).await, (None, None));
}

#[tokio::test]
async fn scenario_d_resource_sync_backfills_roster() {
    let pool = create_test_db().await;
    let project = seed_project(&pool, "alice").await;
    let service = TaskService::new(pool.clone());
    let caller = user("alice");

    let t1 = service
        .create_task(project, node("T1"), &caller)
        .await
        .expect("create T1");

    // R1 is already on the roster; R2 is not
    {
        let mut conn = pool.acquire().await.expect("acquire");
        project_store::insert_project_resources(
            &mut conn,
            &[ProjectResourceRow {
                project_id: project,
                resource_id: "R1".to_string(),
                role: None,
                editable: false,
                created_by: "alice".to_string(),
            }],
        )
        .await
        .expect("seed roster");
    }

    let mut update = node("T1");
    update.id = Some(t1);
    update.resources = vec![
        TaskResourceInput { resource_id: "R1".to_string(), units: 50.0 },
        TaskResourceInput { resource_id: "R2".to_string(), units: 100.0 },
    ];
    service.update_task(update, &caller).await.expect("update T1");

    let roster = project_store::fetch_project_resources(&pool, project)
        .await
        .expect("fetch roster");
    let r2: Vec<_> = roster.iter().filter(|r| r.resource_id == "R2").collect();
    assert_eq!(r2.len(), 1, "R2 must gain exactly one roster row");
    assert!(r2[0].editable);
    assert_eq!(r2[0].role, None);
    assert_eq!(r2[0].created_by, "alice");
    // R1's existing roster row is untouched
    assert_eq!(roster.iter().filter(|r| r.resource_id == "R1").count(), 1);

    let tree = service.get_task(t1, &caller).await.expect("get T1");
    let mut units: Vec<(String, f64)> = tree
        .resources
        .iter()
        .map(|r| (r.resource_id.clone(), r.units))
        .collect();
    units.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(units, vec![("R1".to_string(), 50.0), ("R2".to_string(), 100.0)]);
}

#[tokio::test]
async fn resource_set_is_replaced_wholesale() {
    let pool = create_test_db().await;
    let project = seed_project(&pool, "alice").await;
    let service = TaskService::new(pool.clone());
    let caller = user("alice");

    let mut create = node("T1");
    create.resources = vec![
        TaskResourceInput { resource_id: "R1".to_string(), units: 25.0 },
        TaskResourceInput { resource_id: "R2".to_string(), units: 75.0 },
    ];
    let t1 = service.create_task(project, create, &caller).await.expect("create");

    let mut update = node("T1");
    update.id = Some(t1);
    update.resources = vec![TaskResourceInput { resource_id: "R3".to_string(), units: 10.0 }];
    service.update_task(update, &caller).await.expect("update");

    let tree = service.get_task(t1, &caller).await.expect("get");
    assert_eq!(tree.resources.len(), 1);
    assert_eq!(tree.resources[0].resource_id, "R3");
}

#[tokio::test]
async fn negative_allocation_units_rejected() {
    let pool = create_test_db().await;
    let project = seed_project(&pool, "alice").await;
    let service = TaskService::new(pool.clone());
    let caller = user("alice");

    let mut create = node("T1");
    create.resources = vec![TaskResourceInput { resource_id: "R1".to_string(), units: -1.0 }];
    let err = service.create_task(project, create, &caller).await.unwrap_err();
    assert!(matches!(err, TaskError::Validation(_)));

    // the rejected create left nothing behind
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tasks")
        .fetch_one(&pool)
        .await
        .expect("count");
    assert_eq!(count, 0);
}

#[tokio::test]
async fn segmented_task_cannot_acquire_children() {
    let pool = create_test_db().await;
    let project = seed_project(&pool, "alice").await;
    let service = TaskService::new(pool.clone());
    let caller = user("alice");

    let mut segmented = node("T1");
    segmented.segments = vec![Segment {
        name: Some("phase 1".to_string()),
        start_date: d("2024-01-01"),
        end_date: d("2024-01-05"),
    }];
    let t1 = service
        .create_task(project, segmented.clone(), &caller)
        .await
        .expect("create segmented task");

    // attaching a subtask to a segmented parent is rejected
    let mut sub = node("S1");
    sub.parent_id = Some(t1);
    let err = service.create_task(project, sub, &caller).await.unwrap_err();
    assert!(matches!(err, TaskError::Validation(_)));

    // an update declaring both segments and subtasks is rejected too
    segmented.id = Some(t1);
    segmented.subtasks = vec![node("S1")];
    let err = service.update_task(segmented, &caller).await.unwrap_err();
    assert!(matches!(err, TaskError::Validation(_)));
}

#[tokio::test]
async fn batch_create_numbers_roots_consecutively() {
    let pool = create_test_db().await;
    let project = seed_project(&pool, "alice").await;
    let service = TaskService::new(pool.clone());
    let caller = user("alice");

    let mut second = node("B");
    second.subtasks = vec![node("B1")];
    service
        .create_tasks(project, vec![node("A"), second, node("C")], &caller)
        .await
        .expect("batch create");

    let rows = sqlx::query("SELECT name, outline_number FROM tasks WHERE deleted = 0")
        .fetch_all(&pool)
        .await
        .expect("fetch rows");
    let mut outlines: Vec<(String, String)> = rows
        .iter()
        .map(|r| (r.get::<String, _>("name"), r.get::<String, _>("outline_number")))
        .collect();
    outlines.sort();
    assert_eq!(
        outlines,
        vec![
            ("A".to_string(), "1".to_string()),
            ("B".to_string(), "2".to_string()),
            ("B1".to_string(), "2.1".to_string()),
            ("C".to_string(), "3".to_string()),
        ]
    );
}

#[tokio::test]
async fn batch_failure_rolls_back_all_members() {
    let pool = create_test_db().await;
    let project = seed_project(&pool, "alice").await;
    let service = TaskService::new(pool.clone());
    let caller = user("alice");

    let mut bad = node("B");
    bad.progress = Some(250.0);
    let err = service
        .create_tasks(project, vec![node("A"), bad], &caller)
        .await
        .unwrap_err();
    assert!(matches!(err, TaskError::Validation(_)));

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tasks")
        .fetch_one(&pool)
        .await
        .expect("count");
    assert_eq!(count, 0, "no partial batch application is ever visible");
}

#[tokio::test]
async fn update_replaces_payload_subtree() {
    let pool = create_test_db().await;
    let project = seed_project(&pool, "alice").await;
    let service = TaskService::new(pool.clone());
    let caller = user("alice");

    let mut root = node("T1");
    root.subtasks = vec![node("keep"), node("drop")];
    let t1 = service.create_task(project, root, &caller).await.expect("create");

    let created = service.get_task(t1, &caller).await.expect("get");
    assert_eq!(created.subtasks.len(), 2);
    let keep_id = created.subtasks[0].task.id;

    let mut update = node("T1 renamed");
    update.id = Some(t1);
    let mut keep = node("keep renamed");
    keep.id = Some(keep_id);
    update.subtasks = vec![keep];
    service.update_task(update, &caller).await.expect("update");

    let after = service.get_task(t1, &caller).await.expect("get after");
    assert_eq!(after.task.name, "T1 renamed");
    assert_eq!(after.subtasks.len(), 1);
    assert_eq!(after.subtasks[0].task.id, keep_id);
    assert_eq!(after.subtasks[0].task.name, "keep renamed");
    assert_eq!(after.subtasks[0].task.outline_number, "1.1");
}

#[tokio::test]
async fn update_rejects_ids_outside_the_subtree() {
    let pool = create_test_db().await;
    let project = seed_project(&pool, "alice").await;
    let service = TaskService::new(pool.clone());
    let caller = user("alice");

    let t1 = service.create_task(project, node("T1"), &caller).await.expect("T1");
    let mut second = node("T2");
    second.subtasks = vec![node("T2-child")];
    let t2 = service.create_task(project, second, &caller).await.expect("T2");

    // a payload subtask naming a sibling root must not pull it under T1
    let mut update = node("T1");
    update.id = Some(t1);
    let mut stolen = node("T2 stolen");
    stolen.id = Some(t2);
    update.subtasks = vec![stolen];
    let err = service.update_task(update, &caller).await.unwrap_err();
    assert!(matches!(err, TaskError::Validation(_)));

    // the tree is untouched: T2 still roots its child at "2"/"2.1"
    let mut outlines: Vec<(String, String)> =
        sqlx::query("SELECT name, outline_number FROM tasks WHERE deleted = 0")
            .fetch_all(&pool)
            .await
            .expect("fetch rows")
            .iter()
            .map(|r| (r.get::<String, _>("name"), r.get::<String, _>("outline_number")))
            .collect();
    outlines.sort();
    assert_eq!(
        outlines,
        vec![
            ("T1".to_string(), "1".to_string()),
            ("T2".to_string(), "2".to_string()),
            ("T2-child".to_string(), "2.1".to_string()),
        ]
    );
}

#[tokio::test]
async fn update_rejects_deleted_subtask_ids() {
    let pool = create_test_db().await;
    let project = seed_project(&pool, "alice").await;
    let service = TaskService::new(pool.clone());
    let caller = user("alice");

    let mut root = node("T1");
    root.subtasks = vec![node("gone")];
    let t1 = service.create_task(project, root, &caller).await.expect("create");
    let gone_id = service.get_task(t1, &caller).await.expect("get").subtasks[0].task.id;

    // dropping the subtask from the payload soft-deletes it
    let mut update = node("T1");
    update.id = Some(t1);
    service.update_task(update, &caller).await.expect("shrink subtree");

    // reusing the deleted id is a validation error, not a storage conflict
    let mut update = node("T1");
    update.id = Some(t1);
    let mut revived = node("revived");
    revived.id = Some(gone_id);
    update.subtasks = vec![revived];
    let err = service.update_task(update, &caller).await.unwrap_err();
    assert!(matches!(err, TaskError::Validation(_)));
}

#[tokio::test]
async fn deleting_a_parent_takes_its_subtree() {
    let pool = create_test_db().await;
    let project = seed_project(&pool, "alice").await;
    let service = TaskService::new(pool.clone());
    let caller = user("alice");

    let mut root = node("T1");
    root.subtasks = vec![node("S1")];
    let t1 = service.create_task(project, root, &caller).await.expect("create");
    service.create_task(project, node("T2"), &caller).await.expect("create T2");

    service
        .delete_tasks(project, vec![t1], &caller)
        .await
        .expect("delete subtree");

    let live: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tasks WHERE deleted = 0")
        .fetch_one(&pool)
        .await
        .expect("count");
    assert_eq!(live, 1, "only T2 remains live");

    // soft delete keeps the rows around
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tasks")
        .fetch_one(&pool)
        .await
        .expect("count all");
    assert_eq!(total, 3);
}

#[tokio::test]
async fn outline_numbers_skip_nothing_after_delete() {
    let pool = create_test_db().await;
    let project = seed_project(&pool, "alice").await;
    let service = TaskService::new(pool.clone());
    let caller = user("alice");

    service.create_task(project, node("T1"), &caller).await.expect("T1");
    let t2 = service.create_task(project, node("T2"), &caller).await.expect("T2");
    service.delete_tasks(project, vec![t2], &caller).await.expect("delete");

    // deleted tasks are excluded from outline generation
    let t3 = service.create_task(project, node("T3"), &caller).await.expect("T3");
    let tree = service.get_task(t3, &caller).await.expect("get T3");
    assert_eq!(tree.task.outline_number, "2");
}

#[tokio::test]
async fn outline_numbers_unique_among_live_tasks() {
    let pool = create_test_db().await;
    let project = seed_project(&pool, "alice").await;
    let service = TaskService::new(pool.clone());
    let caller = user("alice");

    let mut root = node("root");
    root.subtasks = (0..11).map(|i| node(&format!("c{i}"))).collect();
    service.create_task(project, root, &caller).await.expect("create");
    service.create_task(project, node("second"), &caller).await.expect("create second");

    let outlines: Vec<String> =
        sqlx::query_scalar("SELECT outline_number FROM tasks WHERE deleted = 0")
            .fetch_all(&pool)
            .await
            .expect("outlines");
    let mut dedup = outlines.clone();
    dedup.sort();
    dedup.dedup();
    assert_eq!(dedup.len(), outlines.len(), "outline numbers are unique per project");
}

#[tokio::test]
async fn permission_gate_blocks_strangers() {
    let pool = create_test_db().await;
    let project = seed_project(&pool, "alice").await;
    let service = TaskService::new(pool.clone());

    let t1 = service
        .create_task(project, node("T1"), &admin())
        .await
        .expect("admin creates");

    let mut update = node("T1 hijacked");
    update.id = Some(t1);
    let err = service.update_task(update.clone(), &user("mallory")).await.unwrap_err();
    assert!(matches!(err, TaskError::PermissionDenied(_)));

    let err = service
        .delete_tasks(project, vec![t1], &user("mallory"))
        .await
        .unwrap_err();
    assert!(matches!(err, TaskError::PermissionDenied(_)));

    // the project creator may still edit
    update.name = "T1 renamed".to_string();
    service.update_task(update, &user("alice")).await.expect("creator edits");
}

#[tokio::test]
async fn assigned_resource_and_pm_may_edit() {
    let pool = create_test_db().await;
    let project = seed_project(&pool, "alice").await;
    let service = TaskService::new(pool.clone());

    let mut create = node("T1");
    create.resources = vec![TaskResourceInput { resource_id: "R9".to_string(), units: 100.0 }];
    let t1 = service.create_task(project, create, &admin()).await.expect("create");

    {
        let mut conn = pool.acquire().await.expect("acquire");
        project_store::insert_project_resources(
            &mut conn,
            &[ProjectResourceRow {
                project_id: project,
                resource_id: "R-PM".to_string(),
                role: Some("PM".to_string()),
                editable: true,
                created_by: "alice".to_string(),
            }],
        )
        .await
        .expect("seed PM");
    }

    let mut update = node("edited by assignee");
    update.id = Some(t1);
    update.resources = vec![TaskResourceInput { resource_id: "R9".to_string(), units: 100.0 }];
    service
        .update_task(update.clone(), &resource_user("bob", "R9"))
        .await
        .expect("assigned resource edits");

    update.name = "edited by PM".to_string();
    service
        .update_task(update, &resource_user("carol", "R-PM"))
        .await
        .expect("PM edits");
}

#[tokio::test]
async fn delete_rejects_unknown_and_foreign_tasks() {
    let pool = create_test_db().await;
    let project = seed_project(&pool, "alice").await;
    let other_project = seed_project(&pool, "alice").await;
    let service = TaskService::new(pool.clone());
    let caller = user("alice");

    let err = service
        .delete_tasks(project, vec![Uuid::new_v4()], &caller)
        .await
        .unwrap_err();
    assert!(matches!(err, TaskError::NotFound(_)));

    let foreign = service
        .create_task(other_project, node("elsewhere"), &caller)
        .await
        .expect("create");
    let err = service
        .delete_tasks(project, vec![foreign], &caller)
        .await
        .unwrap_err();
    assert!(matches!(err, TaskError::Validation(_)));
}
