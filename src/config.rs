//! 配置模块，负责加载插件的 JSON 配置文件，并构造解析上下文

use std::fs;
use std::path::Path;

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::ast::{DisplayField, DisplayList, QueryType};
use crate::parser::{workspace_names_match, ParserOptions};

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("配置文件不存在: {0}")]
    NotFound(String),
    #[error("无法读取配置文件 {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("无法解析JSON配置: {0}")]
    Json(#[from] serde_json::Error),
    #[error("工作区名称不能为空 (id: {0})")]
    EmptyWorkspaceName(String),
    #[error("工作区名称重复: {0}")]
    DuplicateWorkspace(String),
    #[error("默认展示列不能为空")]
    EmptyDisplay,
}

/// 一个已配置的工作区：查询里使用名称，请求报表时使用 id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    pub name: String,
    pub id: String,
}

fn default_week_start() -> Weekday {
    Weekday::Mon
}

/// 插件配置结构
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginSettings {
    /// 第一个工作区是查询的默认工作区
    #[serde(default)]
    pub workspaces: Vec<WorkspaceConfig>,
    #[serde(default = "default_week_start")]
    pub week_start: Weekday,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_query_type: Option<QueryType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_display: Option<Vec<DisplayField>>,
}

impl Default for PluginSettings {
    fn default() -> Self {
        Self {
            workspaces: Vec::new(),
            week_start: default_week_start(),
            default_query_type: None,
            default_display: None,
        }
    }
}

impl PluginSettings {
    /// 从JSON文件加载配置
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();

        if !path_ref.exists() {
            return Err(ConfigError::NotFound(path_ref.display().to_string()));
        }

        let content = fs::read_to_string(path_ref).map_err(|source| ConfigError::Io {
            path: path_ref.display().to_string(),
            source,
        })?;

        let settings = Self::from_json_str(&content)?;
        debug!(
            path = %path_ref.display(),
            workspaces = settings.workspaces.len(),
            "loaded plugin settings"
        );
        Ok(settings)
    }

    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let settings: PluginSettings = serde_json::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (i, workspace) in self.workspaces.iter().enumerate() {
            if workspace.name.trim().is_empty() {
                return Err(ConfigError::EmptyWorkspaceName(workspace.id.clone()));
            }
            // 查询中的名称大小写不敏感，所以这里也按大小写不敏感判重
            let duplicate = self.workspaces[..i]
                .iter()
                .any(|other| workspace_names_match(&other.name, &workspace.name));
            if duplicate {
                return Err(ConfigError::DuplicateWorkspace(workspace.name.clone()));
            }
        }
        if matches!(&self.default_display, Some(fields) if fields.is_empty()) {
            return Err(ConfigError::EmptyDisplay);
        }
        Ok(())
    }

    pub fn workspace_names(&self) -> Vec<String> {
        self.workspaces.iter().map(|w| w.name.clone()).collect()
    }

    /// 按名称（大小写不敏感）查找工作区
    pub fn workspace(&self, name: &str) -> Option<&WorkspaceConfig> {
        self.workspaces
            .iter()
            .find(|w| workspace_names_match(&w.name, name))
    }

    /// 以给定日期为参考日期构造解析上下文
    pub fn parser_options(&self, today: NaiveDate) -> ParserOptions {
        let mut options = ParserOptions::new(today)
            .with_workspaces(self.workspace_names())
            .with_week_start(self.week_start);
        if let Some(query_type) = self.default_query_type {
            options.default_query_type = query_type;
        }
        if let Some(show) = &self.default_display {
            options.default_display = DisplayList { show: show.clone() };
        }
        options
    }
}
