/// Request body types and their validation rules

use crate::error::ApiError;
use crate::github::parse_repo_name;
use crate::model::{Plan, ProjectPatch, TaskPatch, TaskStatus};
use crate::service::TaskDraft;
use serde::Deserialize;

pub const MAX_MARKDOWN_BYTES: usize = 1024 * 1024;
pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_DESCRIPTION_CHARS: usize = 10_000;
pub const MAX_TASKS_PER_BATCH: usize = 100;
const MAX_BRANCH_CHARS: usize = 255;
const MAX_TOKEN_CHARS: usize = 512;

pub trait Validate {
    fn validate(&self) -> Result<(), ApiError>;
}

fn check_repo_name(repo_name: &str) -> Result<(), ApiError> {
    parse_repo_name(repo_name)
        .map(|_| ())
        .map_err(|e| ApiError::validation(e.to_string()))
}

fn check_branch(branch: &str) -> Result<(), ApiError> {
    if branch.chars().count() > MAX_BRANCH_CHARS
        || branch.chars().any(|c| c.is_whitespace() || c.is_control())
    {
        return Err(ApiError::validation("branch must be a single git ref name"));
    }
    Ok(())
}

fn check_token(token: &str) -> Result<(), ApiError> {
    if token.chars().count() > MAX_TOKEN_CHARS || token.chars().any(char::is_whitespace) {
        return Err(ApiError::validation("github_token is malformed"));
    }
    Ok(())
}

fn check_markdown(markdown: &str) -> Result<(), ApiError> {
    if markdown.trim().is_empty() {
        return Err(ApiError::validation("markdown must not be empty"));
    }
    if markdown.len() > MAX_MARKDOWN_BYTES {
        return Err(ApiError::validation(format!(
            "markdown exceeds {} bytes",
            MAX_MARKDOWN_BYTES
        )));
    }
    Ok(())
}

fn check_title(title: &str) -> Result<(), ApiError> {
    let length = title.trim().chars().count();
    if length == 0 || length > MAX_TITLE_CHARS {
        return Err(ApiError::validation(format!(
            "title must be between 1 and {} characters",
            MAX_TITLE_CHARS
        )));
    }
    Ok(())
}

fn check_description(description: &str) -> Result<(), ApiError> {
    if description.chars().count() > MAX_DESCRIPTION_CHARS {
        return Err(ApiError::validation(format!(
            "description exceeds {} characters",
            MAX_DESCRIPTION_CHARS
        )));
    }
    Ok(())
}

/// Empty strings clear optional fields
fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub repo_name: String,
    pub github_token: Option<String>,
    pub default_branch: Option<String>,
}

impl Validate for CreateProjectRequest {
    fn validate(&self) -> Result<(), ApiError> {
        check_repo_name(self.repo_name.trim())?;
        if let Some(token) = &self.github_token {
            check_token(token.trim())?;
        }
        if let Some(branch) = &self.default_branch {
            check_branch(branch.trim())?;
        }
        Ok(())
    }
}

impl CreateProjectRequest {
    pub fn into_parts(self) -> (String, Option<String>, Option<String>) {
        (
            self.repo_name.trim().to_string(),
            non_empty(self.github_token),
            non_empty(self.default_branch),
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateProjectRequest {
    pub repo_name: Option<String>,
    /// Empty string removes the stored token
    pub github_token: Option<String>,
    /// Empty string removes the default branch
    pub default_branch: Option<String>,
}

impl Validate for UpdateProjectRequest {
    fn validate(&self) -> Result<(), ApiError> {
        if self.repo_name.is_none()
            && self.github_token.is_none()
            && self.default_branch.is_none()
        {
            return Err(ApiError::validation("nothing to update"));
        }
        if let Some(repo_name) = &self.repo_name {
            check_repo_name(repo_name.trim())?;
        }
        if let Some(token) = &self.github_token {
            check_token(token.trim())?;
        }
        if let Some(branch) = &self.default_branch {
            check_branch(branch.trim())?;
        }
        Ok(())
    }
}

impl From<UpdateProjectRequest> for ProjectPatch {
    fn from(request: UpdateProjectRequest) -> Self {
        ProjectPatch {
            repo_name: request.repo_name.map(|r| r.trim().to_string()),
            github_token: request.github_token.map(|t| non_empty(Some(t))),
            default_branch: request.default_branch.map(|b| non_empty(Some(b))),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateSnapshotRequest {
    pub markdown: String,
    pub branch: Option<String>,
}

impl Validate for CreateSnapshotRequest {
    fn validate(&self) -> Result<(), ApiError> {
        check_markdown(&self.markdown)?;
        if let Some(branch) = &self.branch {
            check_branch(branch.trim())?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct TaskInput {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub markdown: Option<String>,
    pub status: Option<TaskStatus>,
}

impl From<TaskInput> for TaskDraft {
    fn from(input: TaskInput) -> Self {
        TaskDraft {
            title: input.title.trim().to_string(),
            description: input.description,
            markdown: input.markdown,
            status: input.status,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateTasksRequest {
    pub tasks: Vec<TaskInput>,
}

impl Validate for CreateTasksRequest {
    fn validate(&self) -> Result<(), ApiError> {
        if self.tasks.is_empty() || self.tasks.len() > MAX_TASKS_PER_BATCH {
            return Err(ApiError::validation(format!(
                "tasks must contain between 1 and {} items",
                MAX_TASKS_PER_BATCH
            )));
        }
        for (index, task) in self.tasks.iter().enumerate() {
            let at = |e: ApiError| ApiError::validation(format!("tasks[{}]: {}", index, e));
            check_title(&task.title).map_err(at)?;
            check_description(&task.description).map_err(at)?;
            if let Some(markdown) = &task.markdown {
                if markdown.len() > MAX_MARKDOWN_BYTES {
                    return Err(at(ApiError::validation("markdown is too large")));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub markdown: Option<String>,
    pub status: Option<TaskStatus>,
}

impl Validate for UpdateTaskRequest {
    fn validate(&self) -> Result<(), ApiError> {
        if self.title.is_none()
            && self.description.is_none()
            && self.markdown.is_none()
            && self.status.is_none()
        {
            return Err(ApiError::validation("nothing to update"));
        }
        if let Some(title) = &self.title {
            check_title(title)?;
        }
        if let Some(description) = &self.description {
            check_description(description)?;
        }
        if let Some(markdown) = &self.markdown {
            check_markdown(markdown)?;
        }
        Ok(())
    }
}

impl From<UpdateTaskRequest> for TaskPatch {
    fn from(request: UpdateTaskRequest) -> Self {
        TaskPatch {
            title: request.title.map(|t| t.trim().to_string()),
            description: request.description,
            markdown: request.markdown,
            status: request.status,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub plan: Plan,
}

impl Validate for CheckoutRequest {
    fn validate(&self) -> Result<(), ApiError> {
        if !self.plan.is_paid() {
            return Err(ApiError::validation("checkout requires a paid plan"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(title: &str) -> TaskInput {
        TaskInput {
            title: title.to_string(),
            description: String::new(),
            markdown: None,
            status: None,
        }
    }

    #[test]
    fn project_requests_check_repo_and_branch() {
        let ok = CreateProjectRequest {
            repo_name: " octo/app ".to_string(),
            github_token: Some(String::new()),
            default_branch: Some("main".to_string()),
        };
        assert!(ok.validate().is_ok());
        let (repo, token, branch) = ok.into_parts();
        assert_eq!(repo, "octo/app");
        assert_eq!(token, None);
        assert_eq!(branch.as_deref(), Some("main"));

        let bad_branch = CreateProjectRequest {
            repo_name: "octo/app".to_string(),
            github_token: None,
            default_branch: Some("feature branch".to_string()),
        };
        assert!(bad_branch.validate().is_err());

        let bad_repo = CreateProjectRequest {
            repo_name: "octo".to_string(),
            github_token: None,
            default_branch: None,
        };
        assert!(bad_repo.validate().is_err());
    }

    #[test]
    fn empty_update_is_rejected_and_blank_clears() {
        let empty = UpdateProjectRequest {
            repo_name: None,
            github_token: None,
            default_branch: None,
        };
        assert!(empty.validate().is_err());

        let clear = UpdateProjectRequest {
            repo_name: None,
            github_token: Some(String::new()),
            default_branch: None,
        };
        assert!(clear.validate().is_ok());
        let patch = ProjectPatch::from(clear);
        assert_eq!(patch.github_token, Some(None));
        assert_eq!(patch.default_branch, None);
    }

    #[test]
    fn snapshot_markdown_bounds() {
        let empty = CreateSnapshotRequest { markdown: "  \n".to_string(), branch: None };
        assert!(empty.validate().is_err());
        let huge = CreateSnapshotRequest {
            markdown: "x".repeat(MAX_MARKDOWN_BYTES + 1),
            branch: None,
        };
        assert!(huge.validate().is_err());
        let fine = CreateSnapshotRequest { markdown: "# Repo".to_string(), branch: None };
        assert!(fine.validate().is_ok());
    }

    #[test]
    fn task_batches_report_the_failing_index() {
        let empty = CreateTasksRequest { tasks: vec![] };
        assert!(empty.validate().is_err());

        let request = CreateTasksRequest { tasks: vec![task("ok"), task("   ")] };
        let message = request.validate().unwrap_err().to_string();
        assert!(message.starts_with("tasks[1]"), "{message}");

        let too_long = CreateTasksRequest { tasks: vec![task(&"t".repeat(MAX_TITLE_CHARS + 1))] };
        assert!(too_long.validate().is_err());

        let too_many = CreateTasksRequest {
            tasks: (0..=MAX_TASKS_PER_BATCH).map(|i| task(&format!("t{i}"))).collect(),
        };
        assert!(too_many.validate().is_err());
    }

    #[test]
    fn checkout_requires_paid_plan() {
        assert!(CheckoutRequest { plan: Plan::Free }.validate().is_err());
        assert!(CheckoutRequest { plan: Plan::Team }.validate().is_ok());
    }
}
