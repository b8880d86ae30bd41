use chrono::NaiveDate;

use crate::issue::IssueRef;

/// issueのnoteから取り出した1件の作業時間。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimeEntry {
    /// noteに記録された作業日。記録されていない場合は`None`。
    pub date: Option<NaiveDate>,
    pub issue: IssueRef,
    /// 表示用のissueの参照。例: `group/project#1`
    pub reference: String,
    /// 秒単位。`subtracted`の場合は負になる。
    pub duration: i64,
    pub issue_title: String,
    pub author: String,
    /// issueのマイルストーン名。ない場合は空文字列。
    pub milestone: String,
}
