use anyhow::{Context, Result};
use chrono::Local;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use report_query::config::PluginSettings;
use report_query::lexer::tokenize;
use report_query::parser::{Parser, ParsingError};
use report_query::report::ReportRequest;

const SETTINGS_FILE: &str = "settings.json";

/// 优先使用JSON配置，失败时使用默认配置
fn load_settings() -> PluginSettings {
    match PluginSettings::from_json_file(SETTINGS_FILE) {
        Ok(settings) => {
            info!(workspaces = settings.workspaces.len(), "使用配置文件 {}", SETTINGS_FILE);
            settings
        }
        Err(e) => {
            warn!(error = %e, "无法加载配置文件，使用默认配置");
            PluginSettings::default()
        }
    }
}

/// 在出错的行下方用 `^` 标出出错的 token
fn render_error(source: &str, error: &ParsingError) -> String {
    let Some(span) = error.span else {
        return format!("✗ 解析失败: {}", error.message);
    };
    let line_start = source[..span.start].rfind('\n').map_or(0, |i| i + 1);
    let line_end = source[span.start..]
        .find('\n')
        .map_or(source.len(), |i| span.start + i);
    let line = &source[line_start..line_end];
    let column = source[line_start..span.start].chars().count();
    let width = source[span.start..span.end.min(line_end)].chars().count().max(1);

    format!(
        "✗ 解析失败: {}\n  | {}\n  | {}{}",
        error.message,
        line,
        " ".repeat(column),
        "^".repeat(width)
    )
}

fn run_block(source: &str, settings: &PluginSettings) -> Result<()> {
    let options = settings.parser_options(Local::now().date_naive());
    let tokens = tokenize(source);

    let query = match Parser::new(&tokens, &options).parse() {
        Ok(query) => query,
        Err(e) => {
            println!("{}", render_error(source, &e));
            return Ok(());
        }
    };
    println!("[Query]:\n{}", serde_json::to_string_pretty(&query)?);

    match ReportRequest::from_query(&query, settings) {
        Ok(request) => println!("[报表请求]:\n{}", serde_json::to_string_pretty(&request)?),
        Err(e) => println!("⚠️ 无法生成报表请求: {}", e),
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    println!("--- Report Query: 报表查询解析器 ---");
    println!("逐行输入查询，空行提交，:quit 退出");

    let settings = load_settings();
    let mut editor = DefaultEditor::new().context("无法初始化行编辑器")?;
    let mut block = String::new();

    loop {
        let prompt = if block.is_empty() { "query> " } else { "  ...> " };
        match editor.readline(prompt) {
            Ok(line) if line.trim() == ":quit" => break,
            Ok(line) if line.trim().is_empty() => {
                if !block.trim().is_empty() {
                    run_block(&block, &settings)?;
                }
                block.clear();
            }
            Ok(line) => {
                editor.add_history_entry(line.as_str())?;
                block.push_str(&line);
                block.push('\n');
            }
            Err(ReadlineError::Interrupted) => block.clear(),
            Err(ReadlineError::Eof) => {
                if !block.trim().is_empty() {
                    run_block(&block, &settings)?;
                }
                break;
            }
            Err(e) => return Err(e).context("读取输入失败"),
        }
    }
    Ok(())
}
