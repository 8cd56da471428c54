//! 查询对象模型：语法分析的唯一输出，也是报表模块的唯一输入

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::parser::ParserOptions;

/// 字符串无法转换为封闭枚举时的错误，携带允许的取值
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {} \"{}\", expected one of: {}", .kind, .value, .allowed.join(", "))]
pub struct UnknownValue {
    pub kind: &'static str,
    pub value: String,
    pub allowed: &'static [&'static str],
}

/// 为封闭枚举生成 `NAMES`、`as_str`、`Display` 和大小写不敏感的 `FromStr`
macro_rules! closed_enum {
    ($(#[$meta:meta])* $name:ident, $kind:literal { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const NAMES: &'static [&'static str] = &[$($text),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownValue;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $(
                    if s.eq_ignore_ascii_case($text) {
                        return Ok($name::$variant);
                    }
                )+
                Err(UnknownValue {
                    kind: $kind,
                    value: s.to_string(),
                    allowed: Self::NAMES,
                })
            }
        }
    };
}

closed_enum!(
    /// 报表类型
    QueryType, "query type" {
        Summary => "summary",
        List => "list",
    }
);

closed_enum!(
    /// 分组维度
    GroupBy, "grouping" {
        Project => "project",
        Client => "client",
        Entry => "entry",
        Date => "date",
    }
);

closed_enum!(
    SortField, "sort field" {
        Time => "time",
        Name => "name",
        Date => "date",
    }
);

closed_enum!(
    SortOrder, "sort order" {
        Asc => "asc",
        Desc => "desc",
    }
);

closed_enum!(
    /// 报表中展示的列，顺序有意义
    DisplayField, "display field" {
        Project => "project",
        Client => "client",
        Entry => "entry",
        Date => "date",
        Time => "time",
        Tags => "tags",
        Start => "start",
        End => "end",
    }
);

closed_enum!(
    /// 可以被包含或排除的实体类别
    Entity, "entity" {
        Projects => "projects",
        Clients => "clients",
        Tags => "tags",
    }
);

impl Entity {
    /// 单数形式的显示名，用于错误信息
    pub fn singular(&self) -> &'static str {
        match self {
            Entity::Projects => "Project",
            Entity::Clients => "Client",
            Entity::Tags => "Tag",
        }
    }
}

impl Default for QueryType {
    fn default() -> Self {
        QueryType::Summary
    }
}

impl QueryType {
    /// 未显式指定 GROUPBY 时使用的分组
    pub fn default_group_by(&self) -> GroupBy {
        match self {
            QueryType::Summary => GroupBy::Project,
            QueryType::List => GroupBy::Date,
        }
    }
}

/// 日期区间，`start` 和 `end` 两天都包含在报表内
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Interval {
    /// `end` 早于 `start` 时返回 None
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    pub fn single_day(day: NaiveDate) -> Self {
        Self { start: day, end: day }
    }

    /// 区间包含的天数
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

/// 选择器：数字按 ID 匹配，其余按名称匹配
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Selector {
    Id(u64),
    Name(String),
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Id(id) => write!(f, "{}", id),
            Selector::Name(name) => write!(f, "\"{}\"", name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    Include,
    Exclude,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionGroup {
    pub include: BTreeSet<Selector>,
    pub exclude: BTreeSet<Selector>,
}

impl SelectionGroup {
    /// 加入选择器；若同一选择器已在相反集合中则拒绝并返回 false
    pub fn insert(&mut self, mode: SelectionMode, selector: Selector) -> bool {
        let (target, opposite) = match mode {
            SelectionMode::Include => (&mut self.include, &self.exclude),
            SelectionMode::Exclude => (&mut self.exclude, &self.include),
        };
        if opposite.contains(&selector) {
            return false;
        }
        target.insert(selector);
        true
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub projects: SelectionGroup,
    pub clients: SelectionGroup,
    pub tags: SelectionGroup,
}

impl Selection {
    pub fn group(&self, entity: Entity) -> &SelectionGroup {
        match entity {
            Entity::Projects => &self.projects,
            Entity::Clients => &self.clients,
            Entity::Tags => &self.tags,
        }
    }

    pub fn group_mut(&mut self, entity: Entity) -> &mut SelectionGroup {
        match entity {
            Entity::Projects => &mut self.projects,
            Entity::Clients => &mut self.clients,
            Entity::Tags => &mut self.tags,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty() && self.clients.is_empty() && self.tags.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    pub field: SortField,
    pub order: SortOrder,
}

impl Default for Sort {
    fn default() -> Self {
        Self {
            field: SortField::Time,
            order: SortOrder::Desc,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayList {
    pub show: Vec<DisplayField>,
}

impl Default for DisplayList {
    fn default() -> Self {
        Self {
            show: vec![DisplayField::Project, DisplayField::Time],
        }
    }
}

/// AST 的根节点, 代表一个完整的报表查询
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    pub query_type: QueryType,
    /// 解析时可以缺省，获取报表时才是必需的
    pub interval: Option<Interval>,
    pub workspace: Option<String>,
    pub selection: Selection,
    /// None 表示使用报表类型的默认分组
    pub group_by: Option<GroupBy>,
    pub sort: Sort,
    pub list: DisplayList,
    pub custom_title: Option<String>,
}

impl Query {
    /// 按解析上下文构造带默认值的查询
    pub fn with_defaults(options: &ParserOptions) -> Self {
        Self {
            query_type: options.default_query_type,
            workspace: options.workspaces.first().cloned(),
            list: options.default_display.clone(),
            ..Default::default()
        }
    }

    pub fn effective_group_by(&self) -> GroupBy {
        self.group_by
            .unwrap_or_else(|| self.query_type.default_group_by())
    }
}
