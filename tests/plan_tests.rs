//! Integration tests for plan scheduling on the dinner fixture.
//!
//! Tests are organized by area: the end-to-end scenarios first, then graph
//! invariants, then boundary and error behavior.

mod common;

use common::*;
use plan_graph::{ErrorCode, Plan, TaskStatus};
use std::collections::HashMap;

mod scenario_tests {
    use super::*;

    #[tokio::test]
    async fn cold_start_returns_front_of_ready_queue() {
        let mut plan = groceries_plan(memory_store()).await;
        let next = plan.get_next_task(None).await.unwrap().unwrap();
        assert_eq!(next.task_id, "101");

        let mut dinner = dinner_plan(memory_store()).await;
        assert_eq!(ready_ids(&dinner), vec!["101", "102", "103", "104"]);
        let next = dinner.get_next_task(None).await.unwrap().unwrap();
        assert_eq!(next.task_id, "101");
    }

    #[tokio::test]
    async fn closing_front_task_moves_to_the_next() {
        let mut plan = groceries_plan(memory_store()).await;
        plan.close_task("101").await.unwrap();

        assert_eq!(plan.get_task("101").await.unwrap().state(), TaskStatus::Done);
        let next = plan.get_next_task(Some("101")).await.unwrap().unwrap();
        assert_eq!(next.task_id, "102");
    }

    #[tokio::test]
    async fn closing_predecessor_frees_successor() {
        let mut plan = dinner_plan(memory_store()).await;
        assert!(!plan.is_ready("300.2.2").await.unwrap());

        plan.close_task("300.2.1").await.unwrap();

        assert!(plan.is_ready("300.2.2").await.unwrap());
        assert_eq!(plan.get_task("300.2.2").await.unwrap().state(), TaskStatus::Ready);
        // Promotion appends behind the tasks already queued.
        assert_eq!(ready_ids(&plan).last(), Some(&"300.2.2"));
    }

    #[tokio::test]
    async fn freed_task_is_next_once_the_queue_drains() {
        let mut plan = dinner_plan(memory_store()).await;
        close_all(&mut plan, &["101", "102", "300.1.1", "300.1.2"]).await;
        // 300.1 closed with its last subtask, freeing 300.2.1 among others.
        assert_eq!(plan.get_task("300.1").await.unwrap().state(), TaskStatus::Done);

        close_all(&mut plan, &["103", "104", "105", "300.3.1", "300.3.2"]).await;
        assert_eq!(ready_ids(&plan), vec!["300.2.1", "106", "300.3.3"]);

        plan.close_task("300.2.1").await.unwrap();
        let next = plan.get_next_task(Some("300.2.1")).await.unwrap().unwrap();
        assert_eq!(next.task_id, "106");
        assert_eq!(ready_ids(&plan), vec!["106", "300.3.3", "300.2.2"]);
    }

    #[tokio::test]
    async fn task_waits_for_every_predecessor() {
        let mut plan = dinner_plan(memory_store()).await;

        plan.close_task("201").await.unwrap();
        assert!(!plan.is_ready("300.4").await.unwrap());

        close_all(
            &mut plan,
            &["101", "102", "300.1.1", "300.1.2", "300.3.1", "300.3.2"],
        )
        .await;
        assert!(!plan.is_ready("300.4").await.unwrap());

        plan.close_task("300.3.3").await.unwrap();
        assert_eq!(plan.get_task("300.3").await.unwrap().state(), TaskStatus::Done);
        assert!(plan.is_ready("300.4").await.unwrap());
        assert_eq!(plan.get_task("300.4").await.unwrap().state(), TaskStatus::Ready);
    }

    #[tokio::test]
    async fn retry_puts_clone_at_front() {
        let mut plan = dinner_plan(memory_store()).await;
        make_serve_plates_ready(&mut plan).await;
        assert!(ready_ids(&plan).contains(&"300.4"));
        let before = plan.get_ready_tasks_ids().len();

        let clone_id = plan.retry("300.4").await.unwrap();

        let ready = ready_ids(&plan);
        assert_eq!(ready.len(), before + 1);
        assert_eq!(ready[0], clone_id);
        assert!(ready.contains(&"300.4"));

        let toast = plan.get_task("300.5").await.unwrap();
        assert!(toast.predecessors().contains("300.4"));
        assert!(toast.predecessors().contains(&clone_id));

        let clone = plan.get_task(&clone_id).await.unwrap();
        assert_eq!(clone.task_goal, "Serve Plates");
        assert_eq!(clone.state(), TaskStatus::Ready);
        assert_eq!(clone.parent_task_id(), Some("200"));
        assert_eq!(clone.retried_from.as_deref(), Some("300.4"));
        assert_eq!(clone.attempt, 2);
        assert!(clone.successors().contains("300.5"));

        let serve = plan.get_task("200").await.unwrap();
        assert!(serve.subtasks().contains(&clone_id));
    }

    #[tokio::test]
    async fn priority_moves_queued_task_to_front() {
        let mut plan = dinner_plan(memory_store()).await;
        plan.set_as_priority("103").await.unwrap();
        assert_eq!(ready_ids(&plan), vec!["103", "101", "102", "104"]);

        plan.set_as_priority("103").await.unwrap();
        assert_eq!(ready_ids(&plan), vec!["103", "101", "102", "104"]);
    }

    #[tokio::test]
    async fn priority_inserts_eligible_backlog_task() {
        let mut plan = dinner_plan(memory_store()).await;
        plan.set_as_priority("300").await.unwrap();
        assert_eq!(ready_ids(&plan), vec!["300", "101", "102", "103", "104"]);
        assert_eq!(plan.get_task("300").await.unwrap().state(), TaskStatus::Ready);
    }
}

mod invariant_tests {
    use super::*;

    fn assert_ready_and_done_disjoint(plan: &Plan) {
        for id in plan.get_ready_tasks_ids() {
            assert!(
                !plan.get_all_done_tasks_ids().contains(id),
                "{} is both ready and done",
                id
            );
        }
    }

    #[tokio::test]
    async fn ready_and_done_never_overlap() {
        let mut plan = dinner_plan(memory_store()).await;
        assert_ready_and_done_disjoint(&plan);

        for id in ["101", "102", "300.1.1", "103", "104", "300.1.2", "105"] {
            plan.close_task(id).await.unwrap();
            assert_ready_and_done_disjoint(&plan);
        }
        plan.retry("106").await.unwrap();
        assert_ready_and_done_disjoint(&plan);
        plan.set_as_priority("300").await.unwrap();
        assert_ready_and_done_disjoint(&plan);
    }

    #[tokio::test]
    async fn readiness_matches_relation_states() {
        let mut plan = dinner_plan(memory_store()).await;
        close_all(&mut plan, &["101", "102", "103", "104", "300.1.1"]).await;

        let ids = plan.get_all_tasks_ids().to_vec();
        for id in &ids {
            let task = plan.get_task(id).await.unwrap().clone();
            let mut expected = true;
            for related in task.predecessors().iter().chain(task.subtasks().iter()) {
                expected &= plan.get_task(related).await.unwrap().state().is_done();
            }
            assert_eq!(plan.would_be_ready(id).await.unwrap(), expected, "task {}", id);
        }
    }

    #[tokio::test]
    async fn predecessor_and_successor_lists_are_symmetric() {
        let mut plan = dinner_plan(memory_store()).await;
        make_serve_plates_ready(&mut plan).await;
        plan.retry("300.4").await.unwrap();

        let ids = plan.get_all_tasks_ids().to_vec();
        let tasks = plan.resolve(&ids).await.unwrap();
        let by_id: HashMap<&str, _> = tasks.iter().map(|t| (t.task_id.as_str(), *t)).collect();

        for task in &tasks {
            for predecessor in task.predecessors().iter() {
                assert!(
                    by_id[predecessor].successors().contains(&task.task_id),
                    "{} lists {} as predecessor without the reverse edge",
                    task.task_id,
                    predecessor
                );
            }
            for successor in task.successors().iter() {
                assert!(
                    by_id[successor].predecessors().contains(&task.task_id),
                    "{} lists {} as successor without the reverse edge",
                    task.task_id,
                    successor
                );
            }
        }
    }

    #[tokio::test]
    async fn retry_leaves_original_state_alone() {
        let mut plan = dinner_plan(memory_store()).await;

        plan.retry("101").await.unwrap();
        assert_eq!(plan.get_task("101").await.unwrap().state(), TaskStatus::Ready);

        plan.close_task("102").await.unwrap();
        plan.retry("102").await.unwrap();
        assert_eq!(plan.get_task("102").await.unwrap().state(), TaskStatus::Done);
        assert!(plan.get_all_done_tasks_ids().contains(&"102".to_string()));
    }

    #[tokio::test]
    async fn task_path_is_root_first_and_stable() {
        let mut plan = dinner_plan(memory_store()).await;

        let first: Vec<String> = plan
            .get_task_path("300.1.2", true)
            .await
            .unwrap()
            .iter()
            .map(|t| t.task_id.clone())
            .collect();
        let second: Vec<String> = plan
            .get_task_path("300.1.2", true)
            .await
            .unwrap()
            .iter()
            .map(|t| t.task_id.clone())
            .collect();

        assert_eq!(first, vec!["200", "300.1", "300.1.2"]);
        assert_eq!(first, second);

        let ancestors = plan.get_task_path("300.1.2", false).await.unwrap();
        assert_eq!(ancestors.len(), 2);
        assert!(plan.get_task_path("101", false).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn registration_order_is_kept() {
        let plan = dinner_plan(memory_store()).await;
        let all = plan.get_all_tasks_ids();
        assert_eq!(&all[..4], &["101", "102", "103", "104"]);
        assert_eq!(all[11], "300.1");
        assert_eq!(all.len(), 24);
        assert_eq!(plan.subtasks().len(), 11);
    }
}

mod boundary_tests {
    use super::*;

    #[tokio::test]
    async fn empty_plan_has_no_next_task() {
        let mut plan = Plan::new("P0", AGENT_ID, "Nothing", memory_store());
        assert!(plan.get_next_task(None).await.unwrap().is_none());
        assert!(plan.is_complete());
    }

    #[tokio::test]
    async fn closing_the_last_task_completes_the_plan() {
        let mut plan = Plan::new("P0", AGENT_ID, "Tea", memory_store());
        plan.add_task(task("1", "Boil water"), TaskStatus::Ready).await.unwrap();
        plan.close_task("1").await.unwrap();

        assert!(plan.get_next_task(Some("1")).await.unwrap().is_none());
        assert!(plan.is_complete());
    }

    #[tokio::test]
    async fn next_task_on_ready_task_returns_it_unchanged() {
        let mut plan = dinner_plan(memory_store()).await;
        let next = plan.get_next_task(Some("102")).await.unwrap().unwrap();
        assert_eq!(next.task_id, "102");
        assert_eq!(ready_ids(&plan), vec!["101", "102", "103", "104"]);
    }

    #[tokio::test]
    async fn next_task_on_started_task_is_an_error() {
        let mut plan = dinner_plan(memory_store()).await;
        plan.set_task_state("101", TaskStatus::InProgress).await.unwrap();
        assert!(!ready_ids(&plan).contains(&"101"));

        let err = plan.get_next_task(Some("101")).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidState);

        let err = plan.get_next_task(Some("105")).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidState);
    }

    #[tokio::test]
    async fn empty_queue_falls_back_to_registration_scan() {
        let mut plan = Plan::new("P0", AGENT_ID, "Tea", memory_store());
        plan.add_task(task("1", "Boil water"), TaskStatus::Ready).await.unwrap();
        plan.add_task(task("2", "Find cups"), TaskStatus::Backlog).await.unwrap();
        plan.close_task("1").await.unwrap();
        assert!(plan.get_ready_tasks_ids().is_empty());

        let next = plan.get_next_task(Some("1")).await.unwrap().unwrap();
        assert_eq!(next.task_id, "2");
        assert_eq!(next.state(), TaskStatus::Ready);
        assert_eq!(ready_ids(&plan), vec!["2"]);
    }

    #[tokio::test]
    async fn ready_status_needs_done_predecessors() {
        let mut plan = groceries_plan(memory_store()).await;
        let mut cook = task("105", "Cook");
        let mut groceries = plan.get_task("101").await.unwrap().clone();
        cook.add_predecessor(&mut groceries).unwrap();

        plan.add_task(cook, TaskStatus::Ready).await.unwrap();
        assert_eq!(plan.get_task("105").await.unwrap().state(), TaskStatus::Backlog);
        assert!(plan.get_task("101").await.unwrap().successors().contains("105"));

        plan.close_task("101").await.unwrap();
        assert_eq!(ready_ids(&plan), vec!["102", "105"]);
    }

    #[tokio::test]
    async fn marking_last_subtask_done_frees_the_parents_successor() {
        let mut plan = Plan::new(PLAN_ID, AGENT_ID, "Prepare family dinner", memory_store());
        plan.add_task(task("200", "Serve Dinner"), TaskStatus::Ready).await.unwrap();
        plan.add_task(task("201", "Clean Up"), TaskStatus::Backlog).await.unwrap();
        plan.add_predecessor("201", "200").await.unwrap();
        plan.add_subtask("200", task("300.1", "Set Table"), TaskStatus::Ready)
            .await
            .unwrap();

        plan.set_task_state("300.1", TaskStatus::Done).await.unwrap();

        assert_eq!(plan.get_task("200").await.unwrap().state(), TaskStatus::Done);
        let next = plan.get_next_task(Some("300.1")).await.unwrap().unwrap();
        assert_eq!(next.task_id, "201");
        plan.close_task("201").await.unwrap();
        assert!(plan.is_complete());
    }

    #[tokio::test]
    async fn failed_add_can_be_repeated() {
        let mut plan = Plan::new(PLAN_ID, AGENT_ID, "Prepare family dinner", memory_store());
        let mut groceries = task("101", "Buy Groceries");
        let mut cook = task("105", "Cook Main Course");
        cook.add_predecessor(&mut groceries).unwrap();

        let err = plan.add_task(cook.clone(), TaskStatus::Ready).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::UnknownTask);
        assert!(plan.get_all_tasks_ids().is_empty());

        plan.add_task(groceries, TaskStatus::Ready).await.unwrap();
        plan.add_task(cook, TaskStatus::Ready).await.unwrap();
        assert_eq!(ready_ids(&plan), vec!["101"]);
        assert_eq!(plan.get_task("105").await.unwrap().state(), TaskStatus::Backlog);
    }

    #[tokio::test]
    async fn unknown_and_missing_ids() {
        let mut plan = dinner_plan(memory_store()).await;

        let err = plan.close_task("999").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::UnknownTask);
        assert!(err.is_structural());

        let err = plan.get_task("999").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::TaskNotFound);
        assert!(err.is_not_found());
    }
}

mod error_tests {
    use super::*;

    #[tokio::test]
    async fn duplicate_registration_fails() {
        let mut plan = groceries_plan(memory_store()).await;
        let err = plan
            .add_task(task("101", "Buy Groceries again"), TaskStatus::Ready)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::DuplicateTask);
        assert_eq!(plan.get_all_tasks_ids().len(), 2);
    }

    #[tokio::test]
    async fn self_reference_fails() {
        let mut plan = groceries_plan(memory_store()).await;
        let err = plan.add_predecessor("101", "101").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::SelfReference);
    }

    #[tokio::test]
    async fn cycles_are_rejected() {
        let mut plan = dinner_plan(memory_store()).await;
        let err = plan.add_predecessor("103", "108").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::DependencyCycle);
        assert!(!plan.get_task("103").await.unwrap().predecessors().contains("108"));
    }

    #[tokio::test]
    async fn new_unfinished_predecessor_demotes_ready_task() {
        let mut plan = dinner_plan(memory_store()).await;
        plan.add_predecessor("102", "300").await.unwrap();

        assert_eq!(plan.get_task("102").await.unwrap().state(), TaskStatus::Backlog);
        assert_eq!(ready_ids(&plan), vec!["101", "103", "104"]);

        plan.close_task("300").await.unwrap();
        assert_eq!(ready_ids(&plan), vec!["101", "103", "104", "102"]);
    }

    #[tokio::test]
    async fn done_tasks_cannot_reopen() {
        let mut plan = groceries_plan(memory_store()).await;
        plan.close_task("101").await.unwrap();

        let err = plan.set_task_state("101", TaskStatus::Ready).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidState);
        let err = plan.set_as_priority("101").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidState);
        let err = plan.add_predecessor("101", "102").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidState);

        // Closing again is a no-op.
        assert_eq!(plan.close_task("101").await.unwrap(), None);
        assert_eq!(plan.get_all_done_tasks_ids(), &["101".to_string()]);
    }

    #[tokio::test]
    async fn composite_tasks_need_finished_subtasks() {
        let mut plan = dinner_plan(memory_store()).await;
        assert_eq!(
            plan.get_task("200").await.unwrap().state(),
            TaskStatus::InProgressWithSubtasks
        );

        let err = plan.close_task("200").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidState);
        let err = plan.set_task_state("300.1", TaskStatus::InProgress).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidState);
    }

    #[tokio::test]
    async fn waiting_tasks_cannot_be_prioritised_or_retried() {
        let mut plan = dinner_plan(memory_store()).await;

        let err = plan.set_as_priority("105").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidState);
        let err = plan.retry("105").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidState);
        assert_eq!(ready_ids(&plan), vec!["101", "102", "103", "104"]);
    }

    #[tokio::test]
    async fn completed_parent_rejects_subtasks() {
        let mut plan = groceries_plan(memory_store()).await;
        plan.close_task("101").await.unwrap();
        let err = plan
            .add_subtask("101", task("101.1", "Late errand"), TaskStatus::Ready)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidState);
        assert!(!plan.contains("101.1"));
    }
}

mod view_tests {
    use super::*;

    #[tokio::test]
    async fn siblings_share_a_parent() {
        let mut plan = dinner_plan(memory_store()).await;
        let siblings = plan.get_siblings_ids("300.2").await.unwrap();
        assert_eq!(siblings, vec!["300.1", "300.3", "300.4", "300.5", "300.6"]);

        let top = plan.get_siblings_ids("300").await.unwrap();
        assert_eq!(top.len(), 10);
        assert!(!top.contains(&"300".to_string()));
    }

    #[tokio::test]
    async fn stacks_resolve_through_the_plan() {
        let mut plan = dinner_plan(memory_store()).await;
        close_all(&mut plan, &["101", "102", "300.1.1", "300.1.2", "300.3.1"]).await;

        let plating = plan.get_task("300.3").await.unwrap().subtasks().clone();
        let goals: Vec<String> = plating
            .get_all_tasks_from_stack(&mut plan)
            .await
            .unwrap()
            .iter()
            .map(|t| t.task_goal.clone())
            .collect();
        assert_eq!(goals, vec!["Plate Main", "Plate Sides", "Garnish"]);

        let active = plating.get_active_tasks_from_stack(&mut plan).await.unwrap();
        assert_eq!(active.len(), 2);
        let done = plating.get_done_tasks_from_stack(&mut plan).await.unwrap();
        assert_eq!(done[0].task_id, "300.3.1");

        let ready: Vec<String> = plan
            .get_ready_tasks()
            .await
            .unwrap()
            .iter()
            .map(|t| t.task_id.clone())
            .collect();
        assert_eq!(ready, plan.get_ready_tasks_ids());
    }

    #[tokio::test]
    async fn last_achieved_tasks_are_most_recent_first() {
        let mut plan = dinner_plan(memory_store()).await;
        close_all(&mut plan, &["101", "102", "300.1.1", "300.1.2"]).await;

        let last: Vec<String> = plan
            .get_last_achieved_tasks(2)
            .await
            .unwrap()
            .iter()
            .map(|t| t.task_id.clone())
            .collect();
        assert_eq!(last, vec!["300.1", "300.1.2"]);
    }

    #[tokio::test]
    async fn tree_dump_shows_nesting() {
        let mut plan = dinner_plan(memory_store()).await;
        let tree = plan.debug_dump_str(0).await.unwrap();

        assert!(tree.starts_with("Plan PL-dinner : Prepare family dinner\n"));
        assert!(tree.contains("├── Task 200 : Serve Dinner [IN_PROGRESS_WITH_SUBTASKS] (6 subtasks)\n"));
        assert!(tree.contains("│   ├── Task 300.1 : Set Table [IN_PROGRESS_WITH_SUBTASKS] (2 subtasks)\n"));
        assert!(tree.ends_with("└── Task 300 : Call Family [BACKLOG]\n"));

        let shallow = plan.debug_dump_str(1).await.unwrap();
        assert!(!shallow.contains("300.1"));
    }

    #[tokio::test]
    async fn formatted_path_indents_each_level() {
        let mut plan = dinner_plan(memory_store()).await;
        let text = plan.get_formatted_task_path("300.3.1").await.unwrap();
        assert_eq!(
            text,
            "Prepare family dinner\n  -> 200 : Serve Dinner\n    -> 300.3 : Plate Food\n      -> 300.3.1 : Plate Main\n"
        );
    }
}
