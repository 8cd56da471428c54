//! 报表查询的语法分析器
//!
//! ## 解析流程
//!
//! ```text
//! parse()
//!   └─ 每一轮按固定顺序调用全部语法规则，直到 token 耗尽
//!        ├─ parse_query_type()   TYPE summary|list
//!        ├─ parse_interval()     BETWEEN/FROM 日期 AND/TO 日期 | TODAY | THISWEEK | PAST n DAYS ...
//!        ├─ parse_workspace()    WORKSPACE 名称（允许的名称由配置注入）
//!        ├─ parse_selection()    INCLUDE/EXCLUDE PROJECTS|CLIENTS|TAGS [a, b, 42]
//!        ├─ parse_group_by()     GROUPBY project|client|entry|date
//!        ├─ parse_sort()         SORT time|name|date ASC|DESC
//!        ├─ parse_list()         SHOW project, time, ...
//!        └─ parse_title()        TITLE "..."
//! ```
//!
//! 每条规则只看自己的引导关键字：不存在时原样返回查询对象，存在时消费整个子句。
//! 子句在文本中的顺序是自由的；一轮下来没有任何规则前进则报错。
//! 规则的调用顺序是固定的，决定类型的规则总是先于依赖默认值的规则。
//!
//! ## 示例
//!
//! ```text
//! TYPE summary
//! BETWEEN 2024-01-01 AND 2024-01-31
//! INCLUDE PROJECTS [Website, "Internal tools", 1042]
//! EXCLUDE TAGS [meeting]
//! GROUPBY client
//! SORT time desc
//! SHOW client, project, time
//! TITLE "January"
//! ```

use std::str::FromStr;

use chrono::{Datelike, Days, Months, NaiveDate, Weekday};
use tracing::debug;

use crate::ast::{
    DisplayField, DisplayList, Entity, GroupBy, Interval, Query, QueryType, SelectionMode,
    Selector, SortField, SortOrder, UnknownValue,
};
use crate::cursor::TokenCursor;
pub use crate::cursor::ParsingError;
use crate::lexer::tokenize;
use crate::token::{Span, Token, TokenKind};

/// 解析上下文：所有依赖外部环境的值都由调用方注入，解析本身保持确定性
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserOptions {
    /// 相对日期（TODAY、THISWEEK 等）的参考日期
    pub today: NaiveDate,
    /// 一周的第一天
    pub week_start: Weekday,
    /// WORKSPACE 子句允许的名称，第一个为默认工作区
    pub workspaces: Vec<String>,
    pub default_query_type: QueryType,
    pub default_display: DisplayList,
}

impl ParserOptions {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            today,
            week_start: Weekday::Mon,
            workspaces: Vec::new(),
            default_query_type: QueryType::default(),
            default_display: DisplayList::default(),
        }
    }

    pub fn with_workspaces<I, S>(mut self, workspaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.workspaces = workspaces.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_week_start(mut self, week_start: Weekday) -> Self {
        self.week_start = week_start;
        self
    }
}

/// 子句种类，用于检测重复子句
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Clause {
    QueryType,
    Interval,
    Workspace,
    Selection,
    GroupBy,
    Sort,
    List,
    Title,
}

impl Clause {
    fn describe(&self) -> &'static str {
        match self {
            Clause::QueryType => "TYPE",
            Clause::Interval => "interval",
            Clause::Workspace => "WORKSPACE",
            Clause::Selection => "selection",
            Clause::GroupBy => "GROUPBY",
            Clause::Sort => "SORT",
            Clause::List => "SHOW",
            Clause::Title => "TITLE",
        }
    }
}

type Rule = fn(&mut TokenCursor<'_, '_>, Query, &ParserOptions) -> Result<Query, ParsingError>;

struct GrammarRule {
    clause: Clause,
    /// 引导该子句的关键字
    keywords: &'static [&'static str],
    /// 可重复的子句会累积结果，其余子句最多出现一次
    repeatable: bool,
    apply: Rule,
}

const RELATIVE_INTERVALS: &[&str] = &[
    "TODAY",
    "YESTERDAY",
    "THISWEEK",
    "LASTWEEK",
    "THISMONTH",
    "LASTMONTH",
    "THISYEAR",
];

/// 调用顺序固定
const GRAMMAR: &[GrammarRule] = &[
    GrammarRule {
        clause: Clause::QueryType,
        keywords: &["TYPE"],
        repeatable: false,
        apply: parse_query_type,
    },
    GrammarRule {
        clause: Clause::Interval,
        keywords: &[
            "BETWEEN", "FROM", "PAST", "TODAY", "YESTERDAY", "THISWEEK", "LASTWEEK",
            "THISMONTH", "LASTMONTH", "THISYEAR",
        ],
        repeatable: false,
        apply: parse_interval,
    },
    GrammarRule {
        clause: Clause::Workspace,
        keywords: &["WORKSPACE"],
        repeatable: false,
        apply: parse_workspace,
    },
    GrammarRule {
        clause: Clause::Selection,
        keywords: &["INCLUDE", "EXCLUDE", "PROJECTS", "CLIENTS", "TAGS"],
        repeatable: true,
        apply: parse_selection,
    },
    GrammarRule {
        clause: Clause::GroupBy,
        keywords: &["GROUPBY", "GROUP"],
        repeatable: false,
        apply: parse_group_by,
    },
    GrammarRule {
        clause: Clause::Sort,
        keywords: &["SORT"],
        repeatable: false,
        apply: parse_sort,
    },
    GrammarRule {
        clause: Clause::List,
        keywords: &["SHOW"],
        repeatable: false,
        apply: parse_list,
    },
    GrammarRule {
        clause: Clause::Title,
        keywords: &["TITLE"],
        repeatable: false,
        apply: parse_title,
    },
];

pub struct Parser<'t, 'a, 'o> {
    cursor: TokenCursor<'t, 'a>,
    options: &'o ParserOptions,
}

impl<'t, 'a, 'o> Parser<'t, 'a, 'o> {
    pub fn new(tokens: &'t [Token<'a>], options: &'o ParserOptions) -> Self {
        Self {
            cursor: TokenCursor::new(tokens),
            options,
        }
    }

    pub fn parse(&mut self) -> Result<Query, ParsingError> {
        let mut query = Query::with_defaults(self.options);
        let mut seen: Vec<Clause> = Vec::new();

        while !self.cursor.at_end() {
            let pass_start = self.cursor.position();

            for rule in GRAMMAR {
                if !self.cursor.peek_any_keyword(rule.keywords) {
                    continue;
                }
                if !rule.repeatable && seen.contains(&rule.clause) {
                    return Err(self
                        .cursor
                        .error(format!("Duplicate {} clause", rule.clause.describe())));
                }
                query = (rule.apply)(&mut self.cursor, query, self.options)?;
                debug!(clause = ?rule.clause, "applied query clause");
                seen.push(rule.clause);
            }

            if self.cursor.position() == pass_start {
                let token = self.cursor.consume_any()?;
                return Err(self.cursor.error_at(
                    format!(
                        "Unexpected {}, expected a clause such as TYPE, BETWEEN, WORKSPACE, INCLUDE, GROUPBY, SORT, SHOW or TITLE",
                        token
                    ),
                    token.span,
                ));
            }
        }

        Ok(query)
    }
}

/// 对一段查询文本分词并解析
pub fn parse(source: &str, options: &ParserOptions) -> Result<Query, ParsingError> {
    let tokens = tokenize(source);
    debug!(tokens = tokens.len(), "tokenized query block");
    Parser::new(&tokens, options).parse()
}

/// 把候选值列成 `"a", "b" or "c"`
fn describe_choices(names: &[&str]) -> String {
    let quoted: Vec<String> = names.iter().map(|n| format!("\"{}\"", n)).collect();
    match quoted.split_last() {
        None => String::new(),
        Some((last, [])) => last.clone(),
        Some((last, rest)) => format!("{} or {}", rest.join(", "), last),
    }
}

/// 读取一个 WORD 并转换为封闭枚举，未知值报错而不是回退到默认值
fn parse_choice<T>(
    cursor: &mut TokenCursor<'_, '_>,
    after: &str,
    allowed: &[&str],
) -> Result<T, ParsingError>
where
    T: FromStr<Err = UnknownValue>,
{
    let expected = format!("Expected {} after {}", describe_choices(allowed), after);
    let Some(token) = cursor.current() else {
        return Err(cursor.error(format!("{}, found end of input", expected)));
    };
    let value = match token.kind {
        TokenKind::Word => token.value.parse::<T>().ok(),
        _ => None,
    };
    match value {
        Some(value) => {
            cursor.consume_any()?;
            Ok(value)
        }
        None => Err(cursor.error_at(format!("{}, found {}", expected, token), token.span)),
    }
}

pub fn parse_query_type(
    cursor: &mut TokenCursor<'_, '_>,
    mut query: Query,
    _options: &ParserOptions,
) -> Result<Query, ParsingError> {
    if !cursor.peek_keyword("TYPE") {
        return Ok(query);
    }
    cursor.consume_keyword("TYPE")?;
    query.query_type = parse_choice(cursor, "TYPE", QueryType::NAMES)?;
    Ok(query)
}

pub fn parse_interval(
    cursor: &mut TokenCursor<'_, '_>,
    mut query: Query,
    options: &ParserOptions,
) -> Result<Query, ParsingError> {
    if cursor.peek_any_keyword(&["BETWEEN", "FROM"]) {
        let intro = cursor.consume_any()?.value.to_ascii_uppercase();
        let start = parse_endpoint(cursor, &intro, options)?;
        if !cursor.peek_any_keyword(&["AND", "TO"]) {
            let found = describe_current(cursor);
            return Err(cursor.error(format!(
                "Expected AND or TO after {} {}, found {}",
                intro, start, found
            )));
        }
        let connector = cursor.consume_any()?.value.to_ascii_uppercase();
        let end_span = cursor.current_span();
        let end = parse_endpoint(cursor, &connector, options)?;
        query.interval = Some(Interval::new(start, end).ok_or_else(|| {
            let message = format!("Interval end {} is before its start {}", end, start);
            match end_span {
                Some(span) => cursor.error_at(message, span),
                None => cursor.error(message),
            }
        })?);
        return Ok(query);
    }

    if cursor.peek_keyword("PAST") {
        cursor.consume_keyword("PAST")?;
        query.interval = Some(parse_past(cursor, options)?);
        return Ok(query);
    }

    if cursor.peek_any_keyword(RELATIVE_INTERVALS) {
        let token = cursor.consume_any()?;
        let keyword = token.value.to_ascii_uppercase();
        let interval = relative_interval(&keyword, options.today, options.week_start)
            .ok_or_else(|| {
                cursor.error_at(
                    format!("{} is out of the supported date range", keyword),
                    token.span,
                )
            })?;
        query.interval = Some(interval);
    }
    Ok(query)
}

fn describe_current(cursor: &TokenCursor<'_, '_>) -> String {
    cursor
        .current()
        .map_or_else(|| "end of input".to_string(), |token| token.to_string())
}

/// 区间端点：ISO 日期或 TODAY / YESTERDAY
fn parse_endpoint(
    cursor: &mut TokenCursor<'_, '_>,
    after: &str,
    options: &ParserOptions,
) -> Result<NaiveDate, ParsingError> {
    if cursor.peek_keyword("TODAY") {
        cursor.consume_any()?;
        return Ok(options.today);
    }
    if cursor.peek_keyword("YESTERDAY") {
        let token = cursor.consume_any()?;
        return options
            .today
            .pred_opt()
            .ok_or_else(|| cursor.error_at("YESTERDAY is out of the supported date range", token.span));
    }
    if !cursor.peek_kind(TokenKind::Date) {
        let found = describe_current(cursor);
        return Err(cursor.error(format!(
            "Expected date (YYYY-MM-DD) after {}, found {}",
            after, found
        )));
    }
    let token = cursor.consume(TokenKind::Date, None)?;
    NaiveDate::parse_from_str(token.value, "%Y-%m-%d")
        .map_err(|_| cursor.error_at(format!("Invalid date \"{}\"", token.value), token.span))
}

/// `PAST n DAYS|WEEKS|MONTHS`：以参考日期结尾的最近 n 个单位
fn parse_past(
    cursor: &mut TokenCursor<'_, '_>,
    options: &ParserOptions,
) -> Result<Interval, ParsingError> {
    if !cursor.peek_kind(TokenKind::Number) {
        let found = describe_current(cursor);
        return Err(cursor.error(format!("Expected number after PAST, found {}", found)));
    }
    let count_token = cursor.consume(TokenKind::Number, None)?;
    let count: u32 = count_token
        .value
        .parse()
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| {
            cursor.error_at(
                format!("Expected a positive count after PAST, found {}", count_token.value),
                count_token.span,
            )
        })?;

    const UNITS: &[&str] = &["DAY", "DAYS", "WEEK", "WEEKS", "MONTH", "MONTHS"];
    if !cursor.peek_any_keyword(UNITS) {
        let found = describe_current(cursor);
        return Err(cursor.error(format!(
            "Expected DAYS, WEEKS or MONTHS after PAST {}, found {}",
            count, found
        )));
    }
    let unit = cursor.consume_any()?;
    let today = options.today;
    let start = match unit.value.to_ascii_uppercase().trim_end_matches('S') {
        "DAY" => today.checked_sub_days(Days::new(u64::from(count) - 1)),
        "WEEK" => today.checked_sub_days(Days::new(u64::from(count) * 7 - 1)),
        _ => today
            .checked_sub_months(Months::new(count))
            .and_then(|d| d.succ_opt()),
    };
    start
        .and_then(|start| Interval::new(start, today))
        .ok_or_else(|| {
            cursor.error_at(
                format!("PAST {} {} is out of the supported date range", count, unit.value),
                unit.span,
            )
        })
}

/// 把相对区间关键字展开为具体日期
pub fn relative_interval(keyword: &str, today: NaiveDate, week_start: Weekday) -> Option<Interval> {
    let month_start = |day: NaiveDate| day.checked_sub_days(Days::new(u64::from(day.day0())));
    let month_end = |day: NaiveDate| {
        month_start(day)?
            .checked_add_months(Months::new(1))?
            .pred_opt()
    };
    let week_offset = (7 + today.weekday().num_days_from_monday()
        - week_start.num_days_from_monday())
        % 7;
    let this_week_start = today.checked_sub_days(Days::new(u64::from(week_offset)))?;

    match keyword {
        "TODAY" => Some(Interval::single_day(today)),
        "YESTERDAY" => today.pred_opt().map(Interval::single_day),
        "THISWEEK" => Interval::new(this_week_start, this_week_start.checked_add_days(Days::new(6))?),
        "LASTWEEK" => {
            let start = this_week_start.checked_sub_days(Days::new(7))?;
            Interval::new(start, this_week_start.pred_opt()?)
        }
        "THISMONTH" => Interval::new(month_start(today)?, month_end(today)?),
        "LASTMONTH" => {
            let last_month_end = month_start(today)?.pred_opt()?;
            Interval::new(month_start(last_month_end)?, last_month_end)
        }
        "THISYEAR" => Interval::new(
            NaiveDate::from_ymd_opt(today.year(), 1, 1)?,
            NaiveDate::from_ymd_opt(today.year(), 12, 31)?,
        ),
        _ => None,
    }
}

pub fn parse_workspace(
    cursor: &mut TokenCursor<'_, '_>,
    mut query: Query,
    options: &ParserOptions,
) -> Result<Query, ParsingError> {
    if !cursor.peek_keyword("WORKSPACE") {
        return Ok(query);
    }
    let keyword = cursor.consume_keyword("WORKSPACE")?;
    if options.workspaces.is_empty() {
        return Err(cursor.error_at(
            "WORKSPACE cannot be used: no workspaces are configured",
            keyword.span,
        ));
    }

    let names: Vec<&str> = options.workspaces.iter().map(String::as_str).collect();
    let expected = format!("Expected {} after WORKSPACE", describe_choices(&names));
    let Some(token) = cursor.current() else {
        return Err(cursor.error(format!("{}, found end of input", expected)));
    };
    let workspace = match token.kind {
        TokenKind::Word | TokenKind::String => options
            .workspaces
            .iter()
            .find(|name| workspace_names_match(name, token.value)),
        _ => None,
    };
    match workspace {
        Some(name) => {
            cursor.consume_any()?;
            query.workspace = Some(name.clone());
            Ok(query)
        }
        None => Err(cursor.error_at(format!("{}, found {}", expected, token), token.span)),
    }
}

/// 工作区名称大小写不敏感，按 Unicode 小写比较（`Büro` 与 `BÜRO` 相同）
pub(crate) fn workspace_names_match(a: &str, b: &str) -> bool {
    a == b || a.to_lowercase() == b.to_lowercase()
}

pub fn parse_selection(
    cursor: &mut TokenCursor<'_, '_>,
    mut query: Query,
    _options: &ParserOptions,
) -> Result<Query, ParsingError> {
    let (mode, entity) = if cursor.peek_any_keyword(&["INCLUDE", "EXCLUDE"]) {
        let mode = parse_selection_mode(cursor, None)?;
        let entity = parse_entity(cursor, mode_keyword(mode))?;
        (mode, entity)
    } else if cursor.peek_any_keyword(Entity::NAMES) {
        let entity = parse_entity(cursor, "")?;
        let mode = parse_selection_mode(cursor, Some(entity))?;
        (mode, entity)
    } else {
        return Ok(query);
    };

    let items = parse_selectors(cursor, entity, mode)?;
    let group = query.selection.group_mut(entity);
    for (selector, span) in items {
        let message = format!(
            "{} {} cannot be both included and excluded",
            entity.singular(),
            selector
        );
        if !group.insert(mode, selector) {
            return Err(cursor.error_at(message, span));
        }
    }
    Ok(query)
}

fn mode_keyword(mode: SelectionMode) -> &'static str {
    match mode {
        SelectionMode::Include => "INCLUDE",
        SelectionMode::Exclude => "EXCLUDE",
    }
}

fn parse_selection_mode(
    cursor: &mut TokenCursor<'_, '_>,
    entity: Option<Entity>,
) -> Result<SelectionMode, ParsingError> {
    if cursor.peek_keyword("INCLUDE") {
        cursor.consume_any()?;
        return Ok(SelectionMode::Include);
    }
    if cursor.peek_keyword("EXCLUDE") {
        cursor.consume_any()?;
        return Ok(SelectionMode::Exclude);
    }
    let after = entity.map_or(String::new(), |e| format!(" after {}", e.as_str().to_ascii_uppercase()));
    let found = describe_current(cursor);
    Err(cursor.error(format!("Expected INCLUDE or EXCLUDE{}, found {}", after, found)))
}

fn parse_entity(cursor: &mut TokenCursor<'_, '_>, after: &str) -> Result<Entity, ParsingError> {
    if cursor.peek_any_keyword(Entity::NAMES) {
        let token = cursor.consume_any()?;
        if let Ok(entity) = token.value.parse::<Entity>() {
            return Ok(entity);
        }
    }
    let found = describe_current(cursor);
    Err(cursor.error(format!(
        "Expected PROJECTS, CLIENTS or TAGS after {}, found {}",
        after, found
    )))
}

/// `[a, b, 42]` 或不带方括号的 `a, b, 42`
fn parse_selectors(
    cursor: &mut TokenCursor<'_, '_>,
    entity: Entity,
    mode: SelectionMode,
) -> Result<Vec<(Selector, Span)>, ParsingError> {
    let bracketed = cursor.peek(TokenKind::Punctuation, Some("["));
    if bracketed {
        cursor.consume(TokenKind::Punctuation, Some("["))?;
    }

    let mut items = Vec::new();
    loop {
        items.push(parse_selector(cursor, entity, mode)?);
        if cursor.peek(TokenKind::Punctuation, Some(",")) {
            cursor.consume_any()?;
            continue;
        }
        break;
    }

    if bracketed {
        if !cursor.peek(TokenKind::Punctuation, Some("]")) {
            let found = describe_current(cursor);
            return Err(cursor.error(format!(
                "Expected \",\" or \"]\" in {} {} list, found {}",
                mode_keyword(mode),
                entity.as_str().to_ascii_uppercase(),
                found
            )));
        }
        cursor.consume_any()?;
    }
    Ok(items)
}

fn parse_selector(
    cursor: &mut TokenCursor<'_, '_>,
    entity: Entity,
    mode: SelectionMode,
) -> Result<(Selector, Span), ParsingError> {
    let expected = format!(
        "Expected {} name or id in {} {} list",
        entity.singular().to_ascii_lowercase(),
        mode_keyword(mode),
        entity.as_str().to_ascii_uppercase()
    );
    let Some(token) = cursor.current() else {
        return Err(cursor.error(format!("{}, found end of input", expected)));
    };
    let selector = match token.kind {
        // 带前导零的数字（如 `007`）按原文当作名称，避免 `007` 与 `7` 被视为同一 ID
        TokenKind::Number if token.value == "0" || !token.value.starts_with('0') => token
            .value
            .parse()
            .map(Selector::Id)
            .unwrap_or_else(|_| Selector::Name(token.value.to_string())),
        TokenKind::Number => Selector::Name(token.value.to_string()),
        TokenKind::Word | TokenKind::String => Selector::Name(token.value.to_string()),
        TokenKind::Keyword => {
            return Err(cursor.error_at(
                format!("{}, found {} (quote names that are keywords)", expected, token),
                token.span,
            ))
        }
        _ => return Err(cursor.error_at(format!("{}, found {}", expected, token), token.span)),
    };
    cursor.consume_any()?;
    Ok((selector, token.span))
}

pub fn parse_group_by(
    cursor: &mut TokenCursor<'_, '_>,
    mut query: Query,
    _options: &ParserOptions,
) -> Result<Query, ParsingError> {
    if cursor.peek_keyword("GROUPBY") {
        cursor.consume_keyword("GROUPBY")?;
    } else if cursor.peek_keyword("GROUP") {
        cursor.consume_keyword("GROUP")?;
        cursor.consume_keyword("BY")?;
    } else {
        return Ok(query);
    }
    query.group_by = Some(parse_choice(cursor, "GROUPBY", GroupBy::NAMES)?);
    Ok(query)
}

pub fn parse_sort(
    cursor: &mut TokenCursor<'_, '_>,
    mut query: Query,
    _options: &ParserOptions,
) -> Result<Query, ParsingError> {
    if !cursor.peek_keyword("SORT") {
        return Ok(query);
    }
    cursor.consume_keyword("SORT")?;

    let has_field = cursor.peek_kind(TokenKind::Word);
    if has_field {
        query.sort.field = parse_choice::<SortField>(cursor, "SORT", SortField::NAMES)?;
    }
    if cursor.peek_any_keyword(&["ASC", "DESC"]) {
        query.sort.order = match cursor.consume_any()?.value.to_ascii_uppercase().as_str() {
            "ASC" => SortOrder::Asc,
            _ => SortOrder::Desc,
        };
    } else if !has_field {
        let found = describe_current(cursor);
        return Err(cursor.error(format!(
            "Expected {}, ASC or DESC after SORT, found {}",
            describe_choices(SortField::NAMES),
            found
        )));
    }
    Ok(query)
}

pub fn parse_list(
    cursor: &mut TokenCursor<'_, '_>,
    mut query: Query,
    _options: &ParserOptions,
) -> Result<Query, ParsingError> {
    if !cursor.peek_keyword("SHOW") {
        return Ok(query);
    }
    cursor.consume_keyword("SHOW")?;

    let mut show: Vec<DisplayField> = Vec::new();
    loop {
        let span = cursor.current_span();
        let field = parse_choice::<DisplayField>(cursor, "SHOW", DisplayField::NAMES)?;
        if show.contains(&field) {
            let message = format!("Display field \"{}\" is listed more than once", field);
            return Err(match span {
                Some(span) => cursor.error_at(message, span),
                None => cursor.error(message),
            });
        }
        show.push(field);
        if !cursor.peek(TokenKind::Punctuation, Some(",")) {
            break;
        }
        cursor.consume_any()?;
    }
    query.list = DisplayList { show };
    Ok(query)
}

pub fn parse_title(
    cursor: &mut TokenCursor<'_, '_>,
    mut query: Query,
    _options: &ParserOptions,
) -> Result<Query, ParsingError> {
    if !cursor.peek_keyword("TITLE") {
        return Ok(query);
    }
    cursor.consume_keyword("TITLE")?;
    let title = cursor.consume(TokenKind::String, None)?;
    query.custom_title = Some(title.value.to_string());
    Ok(query)
}
