/// Top-accounts report: rank by page hits, run session segmentation on the
/// kept accounts, and render as a tab-separated table or JSON.
use crate::aggregate::Aggregator;
use crate::session::SessionEngine;
use serde::Serialize;
use std::io::Write;

/// One table row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    pub id: String,
    pub pages: u64,
    pub sessions: u64,
    pub longest_mins: i64,
    pub shortest_mins: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub total_users: usize,
    pub top: Vec<ReportRow>,
}

/// The first `n` items by `key`, largest first. Equal keys keep input order.
pub fn top_by_key<T, K, F>(items: &[T], n: usize, key: F) -> Vec<&T>
where
    K: Ord,
    F: Fn(&T) -> K,
{
    let mut ranked: Vec<&T> = items.iter().collect();
    ranked.sort_by(|a, b| key(b).cmp(&key(a)));
    ranked.truncate(n);
    ranked
}

impl Report {
    /// Build the report for the `top` busiest accounts.
    pub fn build(agg: &Aggregator, engine: &SessionEngine, top: usize) -> Self {
        let rows = top_by_key(agg.records(), top, |r| r.hits())
            .into_iter()
            .filter_map(|rec| {
                let stats = engine.analyze(&rec.timestamps)?;
                Some(ReportRow {
                    id: rec.account.clone(),
                    pages: rec.hits(),
                    sessions: stats.sessions,
                    longest_mins: stats.longest_mins,
                    shortest_mins: stats.shortest_mins,
                })
            })
            .collect();

        Report {
            total_users: agg.len(),
            top: rows,
        }
    }

    pub fn write_text<W: Write>(&self, mut out: W) -> std::io::Result<()> {
        writeln!(out, "Total unique users: {}", self.total_users)?;
        writeln!(out, "Top users:")?;
        writeln!(out, "id\t\t# pages\t# sess\tlongest\tshortest")?;
        for row in &self.top {
            writeln!(
                out,
                "{}\t{}\t{}\t{}\t{}",
                row.id, row.pages, row.sessions, row.longest_mins, row.shortest_mins
            )?;
        }
        out.flush()
    }

    pub fn write_json<W: Write>(&self, mut out: W) -> Result<(), serde_json::Error> {
        serde_json::to_writer_pretty(&mut out, self)?;
        writeln!(out).map_err(serde_json::Error::io)
    }
}
