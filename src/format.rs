//! Human-readable rendering of plans and tasks.

use crate::stack::TaskStack;
use crate::task::Task;
use crate::types::TaskStatus;
use std::collections::HashMap;

/// Output format for CLI query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    Json,
    #[default]
    Markdown,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => Err(format!("Unknown output format '{}'", other)),
        }
    }
}

/// Format a single task as markdown. `waiting_on` lists unfinished
/// predecessor ids.
pub fn format_task_markdown(task: &Task, waiting_on: &[String]) -> String {
    let mut md = String::new();

    md.push_str(&format!("## Task: {}\n", task.task_goal));
    md.push_str(&format!("- **id**: `{}`\n", task.task_id));
    md.push_str(&format!("- **state**: {}\n", task.state()));

    if let Some(parent_id) = task.parent_task_id() {
        md.push_str(&format!("- **parent**: `{}`\n", parent_id));
    }

    if !task.predecessors().is_empty() {
        md.push_str(&format!("- **predecessors**: {}\n", backticked(task.predecessors())));
    }

    if !waiting_on.is_empty() {
        let ids: Vec<String> = waiting_on.iter().map(|id| format!("`{}`", id)).collect();
        md.push_str(&format!("- **waiting_on**: {}\n", ids.join(", ")));
    }

    if !task.subtasks().is_empty() {
        md.push_str(&format!("- **subtasks**: {}\n", backticked(task.subtasks())));
    }

    if let Some(ref origin) = task.retried_from {
        md.push_str(&format!("- **retry of**: `{}` (attempt {})\n", origin, task.attempt));
    }

    if !task.long_description.is_empty() {
        md.push_str("\n### Description\n");
        md.push_str(&task.long_description);
        md.push('\n');
    }

    if let Some(ref output) = task.task_text_output {
        md.push_str("\n### Output\n");
        md.push_str(output);
        md.push('\n');
    }

    md
}

fn backticked(stack: &TaskStack) -> String {
    stack
        .iter()
        .map(|id| format!("`{}`", id))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Format a list of tasks as markdown, grouped by state.
pub fn format_tasks_markdown(tasks: &[&Task]) -> String {
    let mut md = String::new();
    md.push_str(&format!("# Tasks ({})\n\n", tasks.len()));

    let states = [
        TaskStatus::Ready,
        TaskStatus::InProgress,
        TaskStatus::InProgressWithSubtasks,
        TaskStatus::Backlog,
        TaskStatus::Done,
    ];
    for state in states {
        let group: Vec<&&Task> = tasks.iter().filter(|t| t.state() == state).collect();
        if group.is_empty() {
            continue;
        }
        md.push_str(&format!("## {} ({})\n", format_state_name(state.as_str()), group.len()));
        for task in group {
            md.push_str(&format_task_short(task));
        }
        md.push('\n');
    }

    md
}

/// `IN_PROGRESS_WITH_SUBTASKS` -> `In Progress With Subtasks`.
fn format_state_name(state: &str) -> String {
    state
        .split('_')
        .map(|word| {
            let lower = word.to_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                None => String::new(),
                Some(first) => first.to_uppercase().chain(chars).collect(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn format_task_short(task: &Task) -> String {
    let waiting = if task.predecessors().is_empty() {
        String::new()
    } else {
        format!(" [after {}]", task.predecessors().len())
    };
    let retry = if task.attempt > 1 {
        format!(" (attempt {})", task.attempt)
    } else {
        String::new()
    };
    format!("- {} `{}`{}{}\n", task.task_goal, task.task_id, waiting, retry)
}

/// Plan goal followed by each task on the path, indented one level deeper.
pub fn format_task_path(plan_goal: &str, path: &[&Task]) -> String {
    let mut out = format!("{}\n", plan_goal);
    for (depth, task) in path.iter().enumerate() {
        out.push_str(&"  ".repeat(depth + 1));
        out.push_str(&format!("-> {} : {}\n", task.task_id, task.task_goal));
    }
    out
}

/// ASCII tree of a plan. `depth` limits the number of task levels shown;
/// 0 shows everything. Ids missing from `tasks` are shown as unloaded.
pub fn format_plan_tree(
    plan_id: &str,
    plan_goal: &str,
    roots: &TaskStack,
    tasks: &HashMap<String, Task>,
    depth: usize,
) -> String {
    let mut out = format!("Plan {} : {}\n", plan_id, plan_goal);
    let ids: Vec<&str> = roots.iter().collect();
    render_children(&mut out, &ids, tasks, "", 1, depth);
    out
}

fn render_children(
    out: &mut String,
    ids: &[&str],
    tasks: &HashMap<String, Task>,
    prefix: &str,
    level: usize,
    depth: usize,
) {
    if depth != 0 && level > depth {
        return;
    }
    for (i, id) in ids.iter().enumerate() {
        let last = i + 1 == ids.len();
        let branch = if last { "└── " } else { "├── " };
        match tasks.get(*id) {
            Some(task) => {
                out.push_str(&format!("{}{}{}\n", prefix, branch, task.debug_formatted_str(true)));
                let child_prefix = format!("{}{}", prefix, if last { "    " } else { "│   " });
                let children: Vec<&str> = task.subtasks().iter().collect();
                render_children(out, &children, tasks, &child_prefix, level + 1, depth);
            }
            None => out.push_str(&format!("{}{}{} (not loaded)\n", prefix, branch, id)),
        }
    }
}
