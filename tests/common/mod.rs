//! Shared fixture: the "prepare family dinner" plan.
//!
//! Top level:
//! - 101 Buy Groceries, 102 Clean Kitchen, 103 Prepare Ingredients,
//!   104 Preheat Oven: READY, no predecessors
//! - 105 Cook Main Course (after 103, 104), 106 Cook Side Dish (after 105),
//!   107 Prepare Dessert (after 106), 108 Make Coffee (after 107)
//! - 200 Serve Dinner (after 106), 201 Clean Up (after 200, 108)
//! - 300 Call Family, no predecessors
//!
//! Subtasks of 200:
//! - 300.1 Set Table (after 101, 102): 300.1.1 (after 101), 300.1.2 (after 300.1.1)
//! - 300.2 Pour Drinks: 300.2.1 (after 300.1), 300.2.2 (after 300.2.1)
//! - 300.3 Plate Food (after 300.1): 300.3.1, 300.3.2 (after 300.1),
//!   300.3.3 (after 300.3.1, 300.3.2)
//! - 300.4 Serve Plates (after 201, 300.3), 300.5 Toast (after 300.4),
//!   300.6 Clear Table (after 300.5, 201)
//!
//! 300.4 waits on 201, which waits on 300.4's own parent 200: tests reach
//! 300.4 by closing 201 directly.

#![allow(dead_code)]

use plan_graph::db::{MemoryStore, Store};
use plan_graph::{Plan, Task, TaskStatus};
use std::sync::Arc;

pub const PLAN_ID: &str = "PL-dinner";
pub const AGENT_ID: &str = "agent-1";

pub fn memory_store() -> Arc<dyn Store> {
    Arc::new(MemoryStore::new())
}

pub fn task(id: &str, goal: &str) -> Task {
    Task::with_id(id, goal, "")
}

/// Two READY tasks, no relations.
pub async fn groceries_plan(store: Arc<dyn Store>) -> Plan {
    let mut plan = Plan::new(PLAN_ID, AGENT_ID, "Prepare family dinner", store);
    plan.add_tasks(
        vec![task("101", "Buy Groceries"), task("102", "Clean Kitchen")],
        TaskStatus::Ready,
    )
    .await
    .expect("failed to add tasks");
    plan
}

async fn link(plan: &mut Plan, task_id: &str, predecessors: &[&str]) {
    for predecessor in predecessors {
        plan.add_predecessor(task_id, predecessor)
            .await
            .unwrap_or_else(|e| panic!("failed to link {} after {}: {}", task_id, predecessor, e));
    }
}

async fn subtask(plan: &mut Plan, parent: &str, id: &str, goal: &str, predecessors: &[&str]) {
    plan.add_subtask(parent, task(id, goal), TaskStatus::Backlog)
        .await
        .unwrap_or_else(|e| panic!("failed to add subtask {}: {}", id, e));
    link(plan, id, predecessors).await;
}

pub async fn dinner_plan(store: Arc<dyn Store>) -> Plan {
    let mut plan = Plan::new(PLAN_ID, AGENT_ID, "Prepare family dinner", store)
        .with_description("Dinner for six at seven");

    plan.add_tasks(
        vec![
            task("101", "Buy Groceries"),
            task("102", "Clean Kitchen"),
            task("103", "Prepare Ingredients"),
            task("104", "Preheat Oven"),
        ],
        TaskStatus::Ready,
    )
    .await
    .expect("failed to add ready tasks");

    plan.add_tasks(
        vec![
            task("105", "Cook Main Course"),
            task("106", "Cook Side Dish"),
            task("107", "Prepare Dessert"),
            task("108", "Make Coffee"),
            task("200", "Serve Dinner"),
            task("201", "Clean Up"),
            task("300", "Call Family"),
        ],
        TaskStatus::Backlog,
    )
    .await
    .expect("failed to add backlog tasks");

    link(&mut plan, "105", &["103", "104"]).await;
    link(&mut plan, "106", &["105"]).await;
    link(&mut plan, "107", &["106"]).await;
    link(&mut plan, "108", &["107"]).await;
    link(&mut plan, "200", &["106"]).await;
    link(&mut plan, "201", &["200", "108"]).await;

    subtask(&mut plan, "200", "300.1", "Set Table", &["101", "102"]).await;
    subtask(&mut plan, "300.1", "300.1.1", "Lay Tablecloth", &["101"]).await;
    subtask(&mut plan, "300.1", "300.1.2", "Place Cutlery", &["300.1.1"]).await;

    subtask(&mut plan, "200", "300.2", "Pour Drinks", &[]).await;
    subtask(&mut plan, "300.2", "300.2.1", "Open Wine", &["300.1"]).await;
    subtask(&mut plan, "300.2", "300.2.2", "Fill Glasses", &["300.2.1"]).await;

    subtask(&mut plan, "200", "300.3", "Plate Food", &["300.1"]).await;
    subtask(&mut plan, "300.3", "300.3.1", "Plate Main", &["300.1"]).await;
    subtask(&mut plan, "300.3", "300.3.2", "Plate Sides", &["300.1"]).await;
    subtask(&mut plan, "300.3", "300.3.3", "Garnish", &["300.3.1", "300.3.2"]).await;

    subtask(&mut plan, "200", "300.4", "Serve Plates", &["201", "300.3"]).await;
    subtask(&mut plan, "200", "300.5", "Toast", &["300.4"]).await;
    subtask(&mut plan, "200", "300.6", "Clear Table", &["300.5", "201"]).await;

    plan
}

/// Close each id in order, asserting success.
pub async fn close_all(plan: &mut Plan, ids: &[&str]) {
    for id in ids {
        plan.close_task(id)
            .await
            .unwrap_or_else(|e| panic!("failed to close {}: {}", id, e));
    }
}

/// Bring 300.4 to READY: finish 300.1 and 300.3 through their subtasks,
/// then close 201.
pub async fn make_serve_plates_ready(plan: &mut Plan) {
    close_all(
        plan,
        &["101", "102", "300.1.1", "300.1.2", "300.3.1", "300.3.2", "300.3.3", "201"],
    )
    .await;
}

pub fn ready_ids(plan: &Plan) -> Vec<&str> {
    plan.get_ready_tasks_ids().iter().map(String::as_str).collect()
}
