use std::fmt;

/// GitLabのプロジェクト。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Project {
    pub id: u64,
    pub name: String,
    pub path_with_namespace: String,
}

/// issueを一意に識別するためのキー。
///
/// `iid`はプロジェクト内でのみ一意なので、プロジェクトIDと組にして扱う。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IssueRef {
    pub project_id: u64,
    pub iid: u64,
}

impl fmt::Display for IssueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.iid)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Milestone {
    pub title: String,
}

/// GitLabのissue。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Issue {
    pub project_id: u64,
    pub iid: u64,
    /// プロジェクトのパスを含むissueの参照。例: `group/project#1`
    pub reference: String,
    pub title: String,
    pub milestone: Option<Milestone>,
}

impl Issue {
    /// このissueを指す`IssueRef`を返す。
    pub fn issue_ref(&self) -> IssueRef {
        IssueRef {
            project_id: self.project_id,
            iid: self.iid,
        }
    }

    /// マイルストーンのタイトルを返す。マイルストーンがない場合は空文字列。
    pub fn milestone_title(&self) -> &str {
        self.milestone
            .as_ref()
            .map(|milestone| milestone.title.as_str())
            .unwrap_or_default()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Author {
    pub username: String,
}

/// issueに付いたコメント。
///
/// `system`が`true`のものはGitLabが自動生成したnoteで、時間記録もこれに含まれる。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Note {
    pub system: bool,
    pub body: String,
    pub author: Author,
}
