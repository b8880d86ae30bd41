use anyhow::{Context, Result};
use log::debug;
#[cfg(test)]
use mockall::automock;
use reqwest::{header::CONTENT_TYPE, Client};
use serde::{de::DeserializeOwned, Deserialize};

use crate::issue::{Author, Issue, IssueRef, Milestone, Note, Project};

/// 1回のリクエストで取得する件数。GitLab APIの上限値。
const PER_PAGE: &str = "100";
const NEXT_PAGE_HEADER: &str = "x-next-page";

/// GitLab APIのプロジェクト情報をデシリアライズするための構造体。
#[derive(Debug, Deserialize)]
struct GitlabProject {
    id: u64,
    name: String,
    path_with_namespace: String,
}

/// GitLab APIのissueをデシリアライズするための構造体。
#[derive(Debug, Deserialize)]
struct GitlabIssue {
    project_id: u64,
    iid: u64,
    title: String,
    milestone: Option<GitlabMilestone>,
    references: GitlabReferences,
}

#[derive(Debug, Deserialize)]
struct GitlabReferences {
    full: String,
}

#[derive(Debug, Deserialize)]
struct GitlabMilestone {
    title: String,
}

/// GitLab APIのnoteをデシリアライズするための構造体。
#[derive(Debug, Deserialize)]
struct GitlabNote {
    body: String,
    system: bool,
    author: GitlabAuthor,
}

#[derive(Debug, Deserialize)]
struct GitlabAuthor {
    username: String,
}

impl From<GitlabProject> for Project {
    fn from(project: GitlabProject) -> Self {
        Self {
            id: project.id,
            name: project.name,
            path_with_namespace: project.path_with_namespace,
        }
    }
}

impl From<GitlabIssue> for Issue {
    fn from(issue: GitlabIssue) -> Self {
        Self {
            project_id: issue.project_id,
            iid: issue.iid,
            reference: issue.references.full,
            title: issue.title,
            milestone: issue.milestone.map(|milestone| Milestone {
                title: milestone.title,
            }),
        }
    }
}

impl From<GitlabNote> for Note {
    fn from(note: GitlabNote) -> Self {
        Self {
            system: note.system,
            body: note.body,
            author: Author {
                username: note.author.username,
            },
        }
    }
}

/// 取得するプロジェクトの条件。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProjectQuery {
    /// プロジェクトの検索キーワード。namespaceも検索対象になる。
    pub search: Option<String>,
    /// `true`の場合は自分がメンバーのプロジェクトのみ取得する。
    pub membership: bool,
}

/// GitLabからプロジェクト、issue、noteを取得するためのtrait。
#[cfg_attr(test, automock)]
pub trait GitlabRepository {
    /// 条件に合うプロジェクトを取得する。
    async fn list_projects(&self, query: &ProjectQuery) -> Result<Vec<Project>>;

    /// プロジェクトのissueをすべて取得する。
    async fn list_issues(&self, project_id: u64) -> Result<Vec<Issue>>;

    /// issueのnoteを作成日時の昇順ですべて取得する。
    async fn list_notes(&self, issue: IssueRef) -> Result<Vec<Note>>;
}

/// GitLab APIと通信するためのクライアント。
///
/// # Examples
///
/// ```
/// let client = GitlabClient::new("https://gitlab.com", "token").unwrap();
/// let projects = client.list_projects(&ProjectQuery::default()).await.unwrap();
/// ```
pub struct GitlabClient {
    client: Client,
    api_url: String,
    access_token: String,
}

impl GitlabClient {
    /// 新しい`GitlabClient`を返す。
    ///
    /// # Arguments
    ///
    /// * `host_url` - GitLabのURL。例: `https://gitlab.com`
    /// * `access_token` - パーソナルアクセストークン
    pub fn new(host_url: &str, access_token: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_url: format!("{}/api/v4", host_url.trim_end_matches('/')),
            access_token: access_token.to_string(),
        })
    }

    /// ページングをたどって全件を取得する。
    ///
    /// レスポンスの`x-next-page`ヘッダーが空になるまでリクエストを繰り返す。
    async fn read_all<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>> {
        let url = format!("{}{}", self.api_url, path);
        let mut items = Vec::new();
        let mut page = "1".to_string();

        loop {
            debug!("GET {} page={}", url, page);
            let response = self
                .client
                .get(&url)
                .header("PRIVATE-TOKEN", &self.access_token)
                .header(CONTENT_TYPE, "application/json")
                .query(query)
                .query(&[("per_page", PER_PAGE), ("page", page.as_str())])
                .send()
                .await
                .with_context(|| format!("Failed to send request to GitLab API at {}", url))?
                .error_for_status()
                .context("Request returned an error status")?;

            let next_page = response
                .headers()
                .get(NEXT_PAGE_HEADER)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string);

            let mut body = response
                .json::<Vec<T>>()
                .await
                .context("Failed to deserialize response")?;
            items.append(&mut body);

            match next_page {
                Some(next) => page = next,
                None => break,
            }
        }

        Ok(items)
    }
}

impl GitlabRepository for GitlabClient {
    async fn list_projects(&self, query: &ProjectQuery) -> Result<Vec<Project>> {
        let membership = query.membership.to_string();
        let mut params = vec![
            ("membership", membership.as_str()),
            ("search_namespaces", "true"),
        ];
        if let Some(search) = query.search.as_deref() {
            params.push(("search", search));
        }

        let projects = self
            .read_all::<GitlabProject>("/projects", &params)
            .await
            .context("Failed to get project list from GitLab")?;

        Ok(projects.into_iter().map(Project::from).collect())
    }

    async fn list_issues(&self, project_id: u64) -> Result<Vec<Issue>> {
        let issues = self
            .read_all::<GitlabIssue>(&format!("/projects/{}/issues", project_id), &[])
            .await
            .with_context(|| format!("Failed to get issues of project {}", project_id))?;

        Ok(issues.into_iter().map(Issue::from).collect())
    }

    async fn list_notes(&self, issue: IssueRef) -> Result<Vec<Note>> {
        let notes = self
            .read_all::<GitlabNote>(
                &format!("/projects/{}/issues/{}/notes", issue.project_id, issue.iid),
                &[("order_by", "created_at"), ("sort", "asc")],
            )
            .await
            .with_context(|| {
                format!(
                    "Failed to get notes of issue {} in project {}",
                    issue, issue.project_id
                )
            })?;

        Ok(notes.into_iter().map(Note::from).collect())
    }
}
