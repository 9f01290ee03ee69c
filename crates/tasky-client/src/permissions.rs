use tasky_types::{Deal, Role, Task, TaskStatus, User};

/// What the current viewer may do on a task.
///
/// Always produced by [`derive`]; there are no setters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DerivedSession {
    pub task_id: Option<i64>,
    pub publisher_id: Option<i64>,
    pub assigned_tasker_id: Option<i64>,
    pub deal_id: Option<i64>,
    pub is_publisher: bool,
    pub can_review_tasker: bool,
    pub can_chat: bool,
    pub can_send_offer: bool,
}

/// Publisher: `task.publisher_id`, then `task.client_id`, then the deal's client.
pub fn publisher_id(task: Option<&Task>, deal: Option<&Deal>) -> Option<i64> {
    task.and_then(|t| t.publisher_id)
        .or_else(|| task.and_then(|t| t.client_id))
        .or_else(|| deal.and_then(|d| d.client_id))
}

/// Assigned tasker: `task.assigned_tasker_id`, then the deal's tasker.
pub fn assigned_tasker_id(task: Option<&Task>, deal: Option<&Deal>) -> Option<i64> {
    task.and_then(|t| t.assigned_tasker_id)
        .or_else(|| deal.and_then(|d| d.tasker_id))
}

/// Deal: the resolved deal, then the ids some task payloads embed.
pub fn deal_id(task: Option<&Task>, deal: Option<&Deal>) -> Option<i64> {
    deal.map(|d| d.id)
        .or_else(|| task.and_then(|t| t.deal_id))
        .or_else(|| task.and_then(|t| t.task_dealed_id))
}

/// Computes the session flags. Pure: same inputs, same output, no I/O.
pub fn derive(task: Option<&Task>, deal: Option<&Deal>, viewer: Option<&User>) -> DerivedSession {
    let publisher_id = publisher_id(task, deal);
    let assigned_tasker_id = assigned_tasker_id(task, deal);
    let status = task.map(|t| t.status);
    let viewer_id = viewer.map(|v| v.id);
    let role = viewer.map(|v| v.role);

    let is_publisher = viewer_id.is_some() && publisher_id == viewer_id;

    let can_review_tasker = status == Some(TaskStatus::Completed)
        && role == Some(Role::Client)
        && viewer_id.is_some()
        && publisher_id == viewer_id
        && assigned_tasker_id.is_some();

    let can_chat = status.is_some_and(TaskStatus::has_chat)
        && viewer_id.is_some_and(|id| {
            task.and_then(|t| t.client_id) == Some(id) || assigned_tasker_id == Some(id)
        });

    // Raw publisher field, no fallback: a task that only carries client_id
    // does not block offers.
    let can_send_offer = viewer.is_some_and(|v| {
        v.role == Role::Tasker && task.and_then(|t| t.publisher_id) != Some(v.id)
    });

    DerivedSession {
        task_id: task.map(|t| t.id),
        publisher_id,
        assigned_tasker_id,
        deal_id: deal_id(task, deal),
        is_publisher,
        can_review_tasker,
        can_chat,
        can_send_offer,
    }
}
