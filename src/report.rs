//! Turns a parsed query into the request handed to the report-fetching collaborator.
//!
//! Parsing accepts structurally valid but incomplete queries; everything that is
//! only required at fetch time (an interval, a resolvable workspace) is checked here.

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::ast::{DisplayField, Entity, GroupBy, Query, QueryType, SelectionGroup, Sort};
use crate::config::PluginSettings;

/// Resolves workspace names written in queries to service ids.
pub trait WorkspaceDirectory {
    /// Names in configuration order; the first one is the default workspace.
    fn workspace_names(&self) -> Vec<String>;
    fn workspace_id(&self, name: &str) -> Option<String>;
}

impl WorkspaceDirectory for PluginSettings {
    fn workspace_names(&self) -> Vec<String> {
        PluginSettings::workspace_names(self)
    }

    fn workspace_id(&self, name: &str) -> Option<String> {
        self.workspace(name).map(|w| w.id.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReportError {
    #[error("The query has no date interval; add e.g. BETWEEN 2024-01-01 AND 2024-01-31 or THISWEEK")]
    MissingInterval,
    #[error("No workspace selected and none configured")]
    NoWorkspace,
    #[error("Workspace \"{0}\" is not configured")]
    UnknownWorkspace(String),
    #[error("Interval end {0} is out of the supported date range")]
    DateOutOfRange(NaiveDate),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    /// Aggregated durations per group.
    Summary,
    /// Individual time entries.
    Detailed,
}

impl From<QueryType> for ReportKind {
    fn from(query_type: QueryType) -> Self {
        match query_type {
            QueryType::Summary => ReportKind::Summary,
            QueryType::List => ReportKind::Detailed,
        }
    }
}

/// Vendor-neutral description of one report fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    pub workspace: String,
    pub workspace_id: String,
    pub kind: ReportKind,
    pub group_by: GroupBy,
    /// First day included in the report.
    pub start: NaiveDate,
    /// First day after the report.
    pub end_exclusive: NaiveDate,
    pub projects: SelectionGroup,
    pub clients: SelectionGroup,
    pub tags: SelectionGroup,
    pub sort: Sort,
    pub show: Vec<DisplayField>,
    pub title: String,
}

impl ReportRequest {
    pub fn from_query<D>(query: &Query, directory: &D) -> Result<Self, ReportError>
    where
        D: WorkspaceDirectory + ?Sized,
    {
        let interval = query.interval.ok_or(ReportError::MissingInterval)?;
        let end_exclusive = interval
            .end
            .succ_opt()
            .ok_or(ReportError::DateOutOfRange(interval.end))?;

        let workspace = match &query.workspace {
            Some(name) => name.clone(),
            None => directory
                .workspace_names()
                .into_iter()
                .next()
                .ok_or(ReportError::NoWorkspace)?,
        };
        let workspace_id = directory
            .workspace_id(&workspace)
            .ok_or_else(|| ReportError::UnknownWorkspace(workspace.clone()))?;

        let title = query
            .custom_title
            .clone()
            .unwrap_or_else(|| default_title(query.query_type, interval.start, interval.end));

        let request = ReportRequest {
            workspace,
            workspace_id,
            kind: query.query_type.into(),
            group_by: query.effective_group_by(),
            start: interval.start,
            end_exclusive,
            projects: query.selection.group(Entity::Projects).clone(),
            clients: query.selection.group(Entity::Clients).clone(),
            tags: query.selection.group(Entity::Tags).clone(),
            sort: query.sort,
            show: query.list.show.clone(),
            title,
        };
        debug!(
            workspace = %request.workspace,
            kind = ?request.kind,
            start = %request.start,
            end_exclusive = %request.end_exclusive,
            days = interval.days(),
            filtered = !query.selection.is_empty(),
            "planned report request"
        );
        Ok(request)
    }
}

fn default_title(query_type: QueryType, start: NaiveDate, end: NaiveDate) -> String {
    let prefix = match query_type {
        QueryType::Summary => "Time report",
        QueryType::List => "Time entries",
    };
    if start == end {
        format!("{} {}", prefix, start)
    } else {
        format!("{} {} to {}", prefix, start, end)
    }
}
