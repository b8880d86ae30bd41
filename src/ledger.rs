use std::collections::HashMap;

use chrono::NaiveDate;
use log::debug;

use crate::issue::{Issue, IssueRef, Note};
use crate::note::{parse, NoteKind, NoteParseError, ParsedNote};
use crate::time_entry::TimeEntry;

/// time entryを絞り込むための条件。
///
/// 条件は作業時間のnoteを取り込む時点でのみ評価され、取り込み済みのtime entryには影響しない。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Filters {
    /// noteを書いたユーザー名と完全一致するもののみ残す。
    pub author: Option<String>,
    /// この日以降の作業のみ残す。
    pub date_begin: Option<NaiveDate>,
    /// この日以前の作業のみ残す。
    pub date_end: Option<NaiveDate>,
    /// マイルストーン名と完全一致するもののみ残す。
    pub milestone: Option<String>,
}

impl Filters {
    fn accepts_author(&self, username: &str) -> bool {
        self.author
            .as_deref()
            .map_or(true, |author| author == username)
    }

    /// 日付が記録されていないnoteは期間の条件で除外しない。
    fn accepts_date(&self, date: Option<NaiveDate>) -> bool {
        let Some(date) = date else {
            return true;
        };
        self.date_begin.map_or(true, |begin| begin <= date)
            && self.date_end.map_or(true, |end| date <= end)
    }

    fn accepts_milestone(&self, issue: &Issue) -> bool {
        match (&self.milestone, &issue.milestone) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(filter), Some(milestone)) => *filter == milestone.title,
        }
    }
}

/// issueのnoteを古い順に取り込み、time entryの一覧を組み立てる。
///
/// `removed time spent`のnoteを取り込むと、そのissueについてそれまでに取り込んだ
/// time entryをすべて取り除く。そのためnoteは必ず作成日時の昇順で渡すこと。
///
/// # Examples
///
/// ```
/// let mut ledger = Ledger::new();
/// ledger.apply(&issue, &notes, &Filters::default())?;
/// let time_entries = ledger.into_entries();
/// ```
#[derive(Debug, Default)]
pub struct Ledger {
    slots: Vec<Option<TimeEntry>>,
    by_issue: HashMap<IssueRef, Vec<usize>>,
    len: usize,
}

impl Ledger {
    /// 新しい空の`Ledger`を返す。
    pub fn new() -> Self {
        Self::default()
    }

    /// 1つのissueのnoteを順に取り込む。
    ///
    /// # Arguments
    ///
    /// * `issue` - noteが付いているissue
    /// * `notes` - 作成日時の昇順に並んだnote
    /// * `filters` - 絞り込み条件
    pub fn apply(
        &mut self,
        issue: &Issue,
        notes: &[Note],
        filters: &Filters,
    ) -> Result<(), NoteParseError> {
        notes
            .iter()
            .try_for_each(|note| self.apply_note(issue, note, filters))
    }

    /// noteを1件取り込む。
    pub fn apply_note(
        &mut self,
        issue: &Issue,
        note: &Note,
        filters: &Filters,
    ) -> Result<(), NoteParseError> {
        if !note.system {
            return Ok(());
        }

        // 作者で除外するnoteは解析しない
        if NoteKind::of(&note.body) == NoteKind::TimeSpent
            && !filters.accepts_author(&note.author.username)
        {
            return Ok(());
        }

        match parse(&note.body)? {
            ParsedNote::Removal => {
                let removed = self.remove_issue(issue.issue_ref());
                debug!("Removed {} time entries of issue {}", removed, issue.reference);
            }
            ParsedNote::TimeSpent { duration, date } => {
                if !filters.accepts_date(date) || !filters.accepts_milestone(issue) {
                    return Ok(());
                }

                self.push(TimeEntry {
                    date,
                    issue: issue.issue_ref(),
                    reference: issue.reference.clone(),
                    duration,
                    issue_title: issue.title.clone(),
                    author: note.author.username.clone(),
                    milestone: issue.milestone_title().to_string(),
                });
            }
            ParsedNote::Other => {}
        }

        Ok(())
    }

    /// 残っているtime entryの件数を返す。
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// 残っているtime entryを取り込んだ順に返す。
    pub fn into_entries(self) -> Vec<TimeEntry> {
        self.slots.into_iter().flatten().collect()
    }

    fn push(&mut self, entry: TimeEntry) {
        self.by_issue
            .entry(entry.issue)
            .or_default()
            .push(self.slots.len());
        self.slots.push(Some(entry));
        self.len += 1;
    }

    /// 指定したissueのtime entryをすべて取り除き、取り除いた件数を返す。
    fn remove_issue(&mut self, issue: IssueRef) -> usize {
        let positions = self.by_issue.remove(&issue).unwrap_or_default();
        for &position in &positions {
            self.slots[position] = None;
        }
        self.len -= positions.len();
        positions.len()
    }
}

/// issueごとのnoteをまとめて取り込み、time entryの一覧を返す。
///
/// issueは任意の順で良いが、各issueのnoteは作成日時の昇順であること。
pub fn reduce(
    stream: &[(Issue, Vec<Note>)],
    filters: &Filters,
) -> Result<Vec<TimeEntry>, NoteParseError> {
    let mut ledger = Ledger::new();
    stream
        .iter()
        .try_for_each(|(issue, notes)| ledger.apply(issue, notes, filters))?;
    Ok(ledger.into_entries())
}
