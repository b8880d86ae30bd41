use std::io;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use log::{debug, info, warn};

use crate::config::Config;
use crate::console::{ConsolePresenter, ConsoleTable, FilterSummary, Layout};
use crate::gitlab::{GitlabClient, GitlabRepository, ProjectQuery};
use crate::issue::Project;
use crate::ledger::{Filters, Ledger};
use crate::time_entry::TimeEntry;

/// レポート系サブコマンドで共通の引数。
#[derive(Debug, clap::Args)]
pub struct ReportArgs {
    #[clap(
        long = "access-token",
        env = "GITLAB_ACCESS_TOKEN",
        hide_env_values = true,
        value_name = "TOKEN",
        help = "Personal access token"
    )]
    access_token: Option<String>,

    #[clap(
        long = "host-url",
        value_name = "URL",
        help = "URL of the GitLab instance (default: https://gitlab.com)"
    )]
    host_url: Option<String>,

    #[clap(
        long = "filter-by-author",
        value_name = "USERNAME",
        help = "Only consider time spent by this user"
    )]
    filter_by_author: Option<String>,

    #[clap(
        long = "all-authors",
        conflicts_with = "filter-by-author",
        help = "Consider time spent by every user, ignoring the author in the config file"
    )]
    all_authors: bool,

    #[clap(
        long = "filter-by-date-begin",
        value_name = "DATE",
        help = "Only consider time spent on or after this date in the format YYYY-MM-DD",
        parse(try_from_str = parse_date),
    )]
    filter_by_date_begin: Option<NaiveDate>,

    #[clap(
        long = "filter-by-date-end",
        value_name = "DATE",
        help = "Only consider time spent on or before this date in the format YYYY-MM-DD",
        parse(try_from_str = parse_date),
    )]
    filter_by_date_end: Option<NaiveDate>,

    #[clap(
        long = "filter-by-search",
        value_name = "TEXT",
        help = "Project search keywords"
    )]
    filter_by_search: Option<String>,

    #[clap(
        long = "filter-by-project-membership",
        help = "Only consider projects the user is currently a member of"
    )]
    filter_by_project_membership: bool,

    #[clap(
        long = "filter-by-milestone",
        value_name = "TITLE",
        help = "Only consider issues of this milestone"
    )]
    filter_by_milestone: Option<String>,
}

impl ReportArgs {
    /// 引数と設定ファイルから取得条件を組み立てる。引数の値を優先する。
    fn query(&self, config: &Config) -> ReportQuery {
        ReportQuery {
            projects: ProjectQuery {
                search: self.filter_by_search.clone(),
                membership: self.filter_by_project_membership,
            },
            filters: Filters {
                author: self.author(config),
                date_begin: self.filter_by_date_begin,
                date_end: self.filter_by_date_end,
                milestone: self.filter_by_milestone.clone(),
            },
        }
    }

    /// 絞り込みに使う作者を決める。
    ///
    /// `--filter-by-author`がなければ設定ファイルの`author`を使う。`--all-authors`の場合は絞り込まない。
    fn author(&self, config: &Config) -> Option<String> {
        if self.all_authors {
            return None;
        }
        if let Some(author) = &self.filter_by_author {
            return Some(author.clone());
        }
        if let Some(author) = &config.author {
            info!(
                "Filtering by author {} from the config file (use --all-authors to disable)",
                author
            );
        }
        config.author.clone()
    }

    /// 引数と設定ファイルからGitLabクライアントを作成する。
    fn client(&self, config: &Config) -> Result<GitlabClient> {
        let access_token = self
            .access_token
            .as_deref()
            .or(config.access_token.as_deref())
            .context(
                "An access token must be set with --access-token, GITLAB_ACCESS_TOKEN or the config file",
            )?;
        let host_url = self.host_url.as_deref().unwrap_or(&config.host_url);
        info!("GitLab: {}", host_url);

        GitlabClient::new(host_url, access_token)
    }
}

/// time entryの取得条件。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReportQuery {
    pub projects: ProjectQuery,
    pub filters: Filters,
}

/// 取得結果。
#[derive(Debug)]
pub struct Report {
    pub projects: Vec<Project>,
    pub time_entries: Vec<TimeEntry>,
}

pub struct ReportCommand<'a, T: GitlabRepository> {
    gitlab: &'a T,
}

impl<'a, T: GitlabRepository> ReportCommand<'a, T> {
    /// 新しい`ReportCommand`を返す。
    ///
    /// # Arguments
    /// * `gitlab` - GitLab APIと通信するためのリポジトリ
    pub fn new(gitlab: &'a T) -> Self {
        Self { gitlab }
    }

    /// 条件に合うプロジェクトのすべてのissueからtime entryを集める。
    ///
    /// issueごとにnoteを古い順に取得して`Ledger`に取り込む。
    /// 解析できないnoteが1件でもあればエラーとし、途中までの結果は返さない。
    ///
    /// # Arguments
    ///
    /// * `query` - 取得条件
    pub async fn run(&self, query: &ReportQuery) -> Result<Report> {
        debug!(
            "Getting projects. search={:?} only_member={}",
            query.projects.search, query.projects.membership
        );
        let projects = self
            .gitlab
            .list_projects(&query.projects)
            .await
            .context("Failed to retrieve projects")?;
        info!("Projects retrieved: {}", projects.len());

        let mut ledger = Ledger::new();
        for project in &projects {
            let issues = self
                .gitlab
                .list_issues(project.id)
                .await
                .with_context(|| format!("Failed to retrieve issues of {}", project.name))?;
            debug!(
                "Getting notes for project={} ({} issues)",
                project.name,
                issues.len()
            );

            for issue in &issues {
                let notes = self
                    .gitlab
                    .list_notes(issue.issue_ref())
                    .await
                    .with_context(|| {
                        format!(
                            "Failed to retrieve notes of {}#{}",
                            project.path_with_namespace, issue.iid
                        )
                    })?;
                ledger
                    .apply(issue, &notes, &query.filters)
                    .with_context(|| {
                        format!(
                            "Failed to parse time tracking notes of {}#{}",
                            project.path_with_namespace, issue.iid
                        )
                    })?;
            }
            debug!("Time entries so far: {}", ledger.len());
        }

        if ledger.is_empty() {
            warn!("No time entries matched the filters");
        }
        let time_entries = ledger.into_entries();
        info!("Time entries collected: {}", time_entries.len());

        Ok(Report {
            projects,
            time_entries,
        })
    }
}

/// レポート系サブコマンドの処理を行う。
///
/// GitLabからtime entryを集め、絞り込み条件と集計結果の表を標準出力に表示する。
///
/// # Arguments
///
/// * `layout` - 表の集計単位
/// * `args` - サブコマンドの引数
/// * `config` - 設定ファイルの内容
pub async fn report_command(layout: Layout, args: ReportArgs, config: &Config) -> Result<()> {
    let client = args
        .client(config)
        .context("Failed to create GitLab client")?;
    let query = args.query(config);

    let report = ReportCommand::new(&client)
        .run(&query)
        .await
        .context("Failed to collect time entries")?;

    let stdout = io::stdout();
    let mut writer = stdout.lock();
    let mut presenter = ConsoleTable::new(&mut writer, layout);
    presenter.show_filters(&FilterSummary {
        filters: &query.filters,
        search: query.projects.search.as_deref(),
        projects: &report.projects,
    })?;
    presenter.show_time_entries(&report.time_entries)?;

    Ok(())
}

/// 日付をパースする。
fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("Failed to parse date: {}", s))
}
