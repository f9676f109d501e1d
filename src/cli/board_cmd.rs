//! Board CLI commands

use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate, Utc};

use super::app::Commands;
use super::board_file::{load_payload, save_board};
use super::output::Output;
use crate::domain::{
    BoardId, BoardSnapshot, DependencyGraph, FilterCriteria, ListId, MoveCommand, TaskId, UserId,
};
use crate::session::{BoardSession, SessionUpdate};
use crate::store::TaskEdit;
use crate::sync::LoopbackServer;

pub type Session = BoardSession<LoopbackServer, LoopbackServer>;

/// Runs a command against the open board. Returns true if the board changed.
pub async fn run(
    cmd: Commands,
    session: &mut Session,
    server: &LoopbackServer,
    output: &Output,
) -> Result<bool> {
    match cmd {
        Commands::Show => {
            show(session, output)?;
            Ok(false)
        }
        Commands::Filter {
            search,
            label,
            member,
            due_soon,
            due_within,
            today,
        } => {
            let mut criteria = FilterCriteria {
                search: search.unwrap_or_default(),
                label_colors: label.into_iter().collect(),
                member_ids: member
                    .iter()
                    .map(|m| m.parse::<UserId>())
                    .collect::<Result<_, _>>()?,
                due_within_days: due_within,
            };
            if due_soon {
                criteria.due_within_days = session.due_soon().due_within_days;
            }
            filter(session, output, &criteria, today.as_deref())?;
            Ok(false)
        }
        Commands::MoveList { from, to } => {
            let moved = session.move_item(&MoveCommand::ListMove {
                source_index: from,
                dest_index: to,
            })?;
            report_move(output, moved, &format!("Moved list from {} to {}", from, to));
            Ok(moved)
        }
        Commands::MoveTask {
            list,
            index,
            to_index,
            to,
        } => {
            let source_list: ListId = list.parse()?;
            let dest_list: ListId = match to {
                Some(to) => to.parse()?,
                None => source_list.clone(),
            };
            let message = format!(
                "Moved task {}[{}] to {}[{}]",
                source_list, index, dest_list, to_index
            );
            let moved = session.move_item(&MoveCommand::TaskMove {
                source_list,
                dest_list,
                source_index: index,
                dest_index: to_index,
            })?;
            report_move(output, moved, &message);
            Ok(moved)
        }
        Commands::AddList { title } => {
            let id = session.create_list(&title)?;
            report_created(output, "list", id.as_str(), title.trim());
            Ok(true)
        }
        Commands::AddTask { list, title } => {
            let list_id: ListId = list.parse()?;
            let id = session.create_task(&list_id, &title)?;
            report_created(output, "task", id.as_str(), title.trim());
            Ok(true)
        }
        Commands::RenameList { list, title } => {
            let list_id: ListId = list.parse()?;
            session.rename_list(&list_id, &title)?;
            output.success(&format!("Renamed list {} to {}", list_id, title.trim()));
            Ok(true)
        }
        Commands::RmList { list } => {
            let list_id: ListId = list.parse()?;
            session.delete_list(&list_id)?;
            let orphaned = session.store().map(|s| s.orphaned_tasks().len()).unwrap_or(0);
            if output.is_json() {
                output.data(&serde_json::json!({
                    "removed": list_id.to_string(),
                    "orphaned_tasks": orphaned,
                }));
            } else {
                output.success(&format!(
                    "Removed list {} ({} orphaned task(s) on board)",
                    list_id, orphaned
                ));
            }
            Ok(true)
        }
        Commands::RmTask { task } => {
            let task_id: TaskId = task.parse()?;
            session.delete_task(&task_id)?;
            output.success(&format!("Removed task {}", task_id));
            Ok(true)
        }
        Commands::DupTask { task } => {
            let task_id: TaskId = task.parse()?;
            let copy = session.duplicate_task(&task_id)?;
            let title = session
                .snapshot()
                .and_then(|s| s.task(&copy).map(|t| t.title.clone()))
                .unwrap_or_default();
            report_created(output, "task", copy.as_str(), &title);
            Ok(true)
        }
        Commands::Edit { task, edit } => {
            let task_id: TaskId = task.parse()?;
            let edit: TaskEdit = serde_json::from_str(&edit).context("Invalid task edit")?;
            session.edit_task(&task_id, &edit)?;
            output.success(&format!("Applied {} to {}", edit.kind(), task_id));
            Ok(true)
        }
        Commands::Dep { task, target } => {
            let task_id: TaskId = task.parse()?;
            let target_id: TaskId = target.parse()?;
            let added = session.toggle_dependency(&task_id, &target_id)?;
            if output.is_json() {
                output.data(&serde_json::json!({
                    "task": task_id.to_string(),
                    "depends_on": target_id.to_string(),
                    "added": added,
                }));
            } else if added {
                output.success(&format!("{} now depends on {}", task_id, target_id));
            } else {
                output.success(&format!("{} no longer depends on {}", task_id, target_id));
            }
            Ok(true)
        }
        Commands::Satisfied { task } => {
            let task_id: TaskId = task.parse()?;
            satisfied(session, output, &task_id)?;
            Ok(false)
        }
        Commands::Merge { payload } => merge(session, server, output, &payload).await,
        Commands::New { .. } | Commands::Check => {
            bail!("Command does not operate on an open board")
        }
    }
}

/// Creates a new, empty board file
pub fn new_board(output: &Output, path: &Path, title: &str, background: &str, force: bool) -> Result<()> {
    let title = title.trim();
    if title.is_empty() {
        bail!("Board title must not be empty");
    }
    if path.exists() && !force {
        bail!(
            "Board file already exists: {} (use --force to overwrite)",
            path.display()
        );
    }

    let now = Utc::now();
    let snapshot = BoardSnapshot::new(BoardId::generate(title, now), title, background, now);
    save_board(path, &snapshot)?;

    if output.is_json() {
        output.data(&serde_json::json!({
            "id": snapshot.id.to_string(),
            "title": snapshot.title,
            "path": path.display().to_string(),
        }));
    } else {
        output.success(&format!("Created board {} at {}", snapshot.id, path.display()));
    }

    Ok(())
}

/// Reports invariant violations and orphaned tasks in a board file as loaded
pub fn check(output: &Output, snapshot: &BoardSnapshot) -> Result<()> {
    let violations: Vec<String> = snapshot.violations().iter().map(|v| v.to_string()).collect();
    let orphaned = snapshot.orphaned_tasks();

    if output.is_json() {
        output.data(&serde_json::json!({
            "board": snapshot.id.to_string(),
            "violations": violations,
            "orphaned_tasks": orphaned,
        }));
    } else {
        for violation in &violations {
            output.line(&format!("violation: {}", violation));
        }
        for task in &orphaned {
            output.line(&format!("orphaned: {}", task));
        }
        if violations.is_empty() {
            output.success(&format!("Board {} is consistent", snapshot.id));
        }
    }

    if !violations.is_empty() {
        bail!("{} invariant violation(s) found", violations.len());
    }
    Ok(())
}

fn show(session: &Session, output: &Output) -> Result<()> {
    let snap = session.snapshot().context("No board is open")?;

    if output.is_json() {
        output.data(&*snap);
        return Ok(());
    }

    let graph = DependencyGraph::from_snapshot(&snap);

    output.line(&format!("{} ({})", snap.title, snap.id));
    for list in snap.ordered_lists() {
        output.blank();
        output.line(&format!("{} [{}] ({})", list.title, list.len(), list.id));

        for task in snap.tasks_in(list) {
            let mut columns = vec![
                format!("  {}", task.order),
                task.id.to_string(),
                task.title.clone(),
            ];
            if let Some(due) = task.due_date {
                columns.push(format!("due {}", due.format("%Y-%m-%d")));
            }
            if !task.checklist.is_empty() {
                let (done, total) = task.checklist_progress();
                columns.push(format!("{}/{}", done, total));
            }
            if !graph.is_satisfied(&task.id, &snap) {
                columns.push("blocked".to_string());
            }
            let refs: Vec<&str> = columns.iter().map(String::as_str).collect();
            output.row(&refs);
        }
    }

    let orphaned = snap.orphaned_tasks();
    if !orphaned.is_empty() {
        output.blank();
        let ids: Vec<String> = orphaned.iter().map(|t| t.to_string()).collect();
        output.line(&format!("Orphaned tasks: {}", ids.join(", ")));
    }

    Ok(())
}

fn filter(session: &mut Session, output: &Output, criteria: &FilterCriteria, today: Option<&str>) -> Result<()> {
    let today = match today {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .with_context(|| format!("Invalid date: {} (expected YYYY-MM-DD)", s))?,
        None => Local::now().date_naive(),
    };

    let view = session.filter_on(criteria, today)?;

    if output.is_json() {
        output.data(&view);
        return Ok(());
    }

    let snap = session.snapshot().context("No board is open")?;
    for filtered in &view.lists {
        let title = snap
            .list(&filtered.list_id)
            .map(|l| l.title.as_str())
            .unwrap_or_default();
        output.line(&format!("{} ({})", title, filtered.list_id));
        for id in &filtered.task_ids {
            let task_title = snap.task(id).map(|t| t.title.as_str()).unwrap_or_default();
            output.row(&["  ", id.as_str(), task_title]);
        }
    }
    output.line(&format!("{} task(s) match", view.total()));

    Ok(())
}

fn satisfied(session: &Session, output: &Output, task_id: &TaskId) -> Result<()> {
    let is_satisfied = session.is_satisfied(task_id)?;
    let snap = session.snapshot().context("No board is open")?;
    let dependencies = DependencyGraph::from_snapshot(&snap).outgoing(task_id);

    if output.is_json() {
        output.data(&serde_json::json!({
            "task": task_id.to_string(),
            "satisfied": is_satisfied,
            "dependencies": dependencies,
        }));
        return Ok(());
    }

    let state = if is_satisfied { "satisfied" } else { "blocked" };
    output.line(&format!("{} is {}", task_id, state));
    for dep in &dependencies {
        let status = match snap.task(dep) {
            Some(task) => {
                let (done, total) = task.checklist_progress();
                format!("{} ({}/{})", task.title, done, total)
            }
            None => "(missing)".to_string(),
        };
        output.row(&["  ", dep.as_str(), &status]);
    }

    Ok(())
}

async fn merge(session: &mut Session, server: &LoopbackServer, output: &Output, path: &Path) -> Result<bool> {
    let payload = load_payload(path)?;
    let board_id = session
        .snapshot()
        .map(|s| s.id.clone())
        .context("No board is open")?;

    if server.publish(&board_id, payload) == 0 {
        bail!("No live channel for board {}", board_id);
    }

    match session.next_event().await {
        Some(SessionUpdate::Merged { replaced_fields }) => {
            if output.is_json() {
                output.data(&serde_json::json!({
                    "merged": true,
                    "replaced_fields": replaced_fields,
                }));
            } else {
                output.success(&format!("Merged fields: {}", replaced_fields.join(", ")));
            }
            Ok(true)
        }
        Some(SessionUpdate::Unchanged) => {
            output.success("Board already matches payload");
            Ok(false)
        }
        Some(SessionUpdate::Ignored(reason)) => {
            output.warning(&format!("Payload ignored: {:?}", reason));
            Ok(false)
        }
        other => bail!("Unexpected session event: {:?}", other),
    }
}

fn report_move(output: &Output, moved: bool, message: &str) {
    if output.is_json() {
        output.data(&serde_json::json!({ "moved": moved }));
    } else if moved {
        output.success(message);
    } else {
        output.success("Nothing to move: item is already in place");
    }
}

fn report_created(output: &Output, kind: &str, id: &str, title: &str) {
    if output.is_json() {
        output.data(&serde_json::json!({
            "id": id,
            "title": title,
        }));
    } else {
        output.success(&format!("Created {} {} - {}", kind, id, title));
    }
}
