use std::collections::BTreeMap;
use std::io::Write;

use anyhow::{Context, Result};
use chrono::NaiveDate;

use crate::issue::{IssueRef, Project};
use crate::ledger::Filters;
use crate::time_entry::TimeEntry;

const NOT_AVAILABLE: &str = "<N/A>";
const NONE_LABEL: &str = "-";
const RULE_WIDTH: usize = 53;

/// レポートの集計単位。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Layout {
    /// time entryを1件ずつ表示する。
    Entries,
    Day,
    Issue,
    User,
}

/// レポートの先頭に表示する絞り込み条件。
#[derive(Debug)]
pub struct FilterSummary<'a> {
    pub filters: &'a Filters,
    pub search: Option<&'a str>,
    pub projects: &'a [Project],
}

/// Consoleにtime entryを表示するためのtrait。
pub trait ConsolePresenter {
    /// 絞り込み条件を表示する。
    fn show_filters(&mut self, summary: &FilterSummary) -> Result<()>;

    /// タイムエントリーを表示する。
    ///
    /// # Arguments
    ///
    /// * `time_entries` - 表示するタイムエントリー
    fn show_time_entries(&mut self, time_entries: &[TimeEntry]) -> Result<()>;
}

/// タイムエントリーを罫線付きの表で表示する。
pub struct ConsoleTable<'a, W: Write> {
    writer: &'a mut W,
    layout: Layout,
}

impl<'a, W: Write> ConsoleTable<'a, W> {
    /// 新しい`ConsoleTable`を返す。
    pub fn new(writer: &'a mut W, layout: Layout) -> Self {
        Self { writer, layout }
    }

    fn write_table(&mut self, table: &Table) -> Result<()> {
        table
            .render(&mut *self.writer)
            .context("Failed to write time entry table")
    }
}

impl<'a, W: Write> ConsolePresenter for ConsoleTable<'a, W> {
    fn show_filters(&mut self, summary: &FilterSummary) -> Result<()> {
        let filters = summary.filters;
        let projects = summary
            .projects
            .iter()
            .map(|project| project.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let rule = "-".repeat(RULE_WIDTH);

        writeln!(self.writer)?;
        writeln!(self.writer, "{}", rule)?;
        writeln!(self.writer, "  Filter:")?;
        writeln!(
            self.writer,
            "   - Author: {}",
            filters.author.as_deref().unwrap_or(NONE_LABEL)
        )?;
        writeln!(
            self.writer,
            "   - Period: {} to {}",
            format_optional_date(filters.date_begin),
            format_optional_date(filters.date_end)
        )?;
        writeln!(
            self.writer,
            "   - Milestone: {}",
            filters.milestone.as_deref().unwrap_or(NONE_LABEL)
        )?;
        writeln!(
            self.writer,
            "   - Search terms: {}",
            summary.search.unwrap_or(NONE_LABEL)
        )?;
        writeln!(self.writer, "   - Projects: {}", projects)?;
        writeln!(self.writer, "{}", rule)?;
        writeln!(self.writer).context("Failed to write filter summary")?;

        Ok(())
    }

    fn show_time_entries(&mut self, time_entries: &[TimeEntry]) -> Result<()> {
        let table = match self.layout {
            Layout::Entries => entries_table(time_entries),
            Layout::Day => day_table(time_entries),
            Layout::Issue => issue_table(time_entries),
            Layout::User => user_table(time_entries),
        };
        self.write_table(&table)
    }
}

/// 秒数を`1h 5m`形式の文字列にする。
///
/// `tabular`が`true`の場合は分を2桁幅で右寄せする。
pub fn format_duration(seconds: i64, tabular: bool) -> String {
    let sign = if seconds < 0 { "-" } else { "" };
    let seconds = seconds.unsigned_abs();
    let hours = seconds / 3600;
    let minutes = seconds % 3600 / 60;

    if tabular {
        format!("{}{}h {:2}m", sign, hours, minutes)
    } else {
        format!("{}{}h {}m", sign, hours, minutes)
    }
}

fn format_optional_date(date: Option<NaiveDate>) -> String {
    date.map(|date| date.to_string())
        .unwrap_or_else(|| NONE_LABEL.to_string())
}

fn format_date(date: Option<NaiveDate>) -> String {
    date.map(|date| date.to_string())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

/// issueの参照を`IssueRef`の順に並べる。
fn format_issues(issues: &BTreeMap<IssueRef, &str>) -> String {
    issues.values().copied().collect::<Vec<_>>().join(", ")
}

fn total_duration(time_entries: &[TimeEntry]) -> i64 {
    time_entries.iter().map(|entry| entry.duration).sum()
}

fn entries_table(time_entries: &[TimeEntry]) -> Table {
    let rows = time_entries
        .iter()
        .map(|entry| {
            vec![
                format_date(entry.date),
                entry.reference.clone(),
                entry.author.clone(),
                entry.milestone.clone(),
                format_duration(entry.duration, true),
            ]
        })
        .collect();

    Table {
        headers: vec!["Date", "Issue", "Author", "Milestone", "Time Spent"],
        right_aligned: 4,
        rows,
        total: total_duration(time_entries),
    }
}

/// 日付ごとに集計する。日付のないtime entryは最後にまとめる。
fn day_table(time_entries: &[TimeEntry]) -> Table {
    let mut days: BTreeMap<(bool, Option<NaiveDate>), (i64, BTreeMap<IssueRef, &str>)> =
        BTreeMap::new();
    for entry in time_entries {
        let (duration, issues) = days.entry((entry.date.is_none(), entry.date)).or_default();
        *duration += entry.duration;
        issues.insert(entry.issue, entry.reference.as_str());
    }

    let rows = days
        .iter()
        .map(|((_, date), (duration, issues))| {
            vec![
                format_date(*date),
                format_duration(*duration, true),
                format_issues(issues),
            ]
        })
        .collect();

    Table {
        headers: vec!["Date", "Time Spent", "Issues"],
        right_aligned: 1,
        rows,
        total: total_duration(time_entries),
    }
}

fn issue_table(time_entries: &[TimeEntry]) -> Table {
    let mut issues: BTreeMap<IssueRef, (&str, &str, i64)> = BTreeMap::new();
    for entry in time_entries {
        let (_, _, duration) = issues.entry(entry.issue).or_insert((
            entry.reference.as_str(),
            entry.issue_title.as_str(),
            0,
        ));
        *duration += entry.duration;
    }

    let rows = issues
        .values()
        .map(|(reference, title, duration)| {
            vec![
                reference.to_string(),
                title.to_string(),
                format_duration(*duration, true),
            ]
        })
        .collect();

    Table {
        headers: vec!["Issue", "Title", "Time Spent"],
        right_aligned: 2,
        rows,
        total: total_duration(time_entries),
    }
}

fn user_table(time_entries: &[TimeEntry]) -> Table {
    let mut users: BTreeMap<&str, (i64, BTreeMap<IssueRef, &str>)> = BTreeMap::new();
    for entry in time_entries {
        let (duration, issues) = users.entry(entry.author.as_str()).or_default();
        *duration += entry.duration;
        issues.insert(entry.issue, entry.reference.as_str());
    }

    let rows = users
        .iter()
        .map(|(author, (duration, issues))| {
            vec![
                author.to_string(),
                format_duration(*duration, true),
                format_issues(issues),
            ]
        })
        .collect();

    Table {
        headers: vec!["Author", "Time Spent", "Issues"],
        right_aligned: 1,
        rows,
        total: total_duration(time_entries),
    }
}

/// 表示用の表。
///
/// `right_aligned`の列は作業時間の列として扱い、合計行にも合計時間を表示する。
struct Table {
    headers: Vec<&'static str>,
    right_aligned: usize,
    rows: Vec<Vec<String>>,
    total: i64,
}

impl Table {
    fn render<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        let mut total_row = vec![String::new(); self.headers.len()];
        total_row[0] = "Total".to_string();
        total_row[self.right_aligned] = format_duration(self.total, true);

        let widths: Vec<usize> = self
            .headers
            .iter()
            .enumerate()
            .map(|(column, header)| {
                self.rows
                    .iter()
                    .chain(std::iter::once(&total_row))
                    .map(|row| row[column].chars().count())
                    .fold(header.chars().count(), usize::max)
            })
            .collect();

        let rule = widths
            .iter()
            .map(|width| "-".repeat(width + 2))
            .collect::<Vec<_>>()
            .join("|");
        let rule = format!("|{}|", rule);

        writeln!(writer, "{}", rule)?;
        let headers: Vec<String> = self.headers.iter().map(|header| header.to_string()).collect();
        self.render_row(writer, &headers, &widths)?;
        writeln!(writer, "{}", rule)?;
        for row in &self.rows {
            self.render_row(writer, row, &widths)?;
        }
        writeln!(writer, "{}", rule)?;
        self.render_row(writer, &total_row, &widths)?;
        writeln!(writer, "{}", rule)
    }

    fn render_row<W: Write>(
        &self,
        writer: &mut W,
        row: &[String],
        widths: &[usize],
    ) -> std::io::Result<()> {
        let cells = row
            .iter()
            .zip(widths.iter().copied())
            .enumerate()
            .map(|(column, (cell, width))| {
                if column == self.right_aligned {
                    format!(" {:>width$} ", cell, width = width)
                } else {
                    format!(" {:<width$} ", cell, width = width)
                }
            })
            .collect::<Vec<_>>()
            .join("|");
        writeln!(writer, "|{}|", cells)
    }
}
