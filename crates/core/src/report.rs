//! CSV report of the ranked collection.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use csv::{QuoteStyle, WriterBuilder};
use thiserror::Error;
use tracing::info;

use crate::ranking::RankedItem;

pub const COLUMNS: [&str; 19] = [
    "Sell Order",
    "CollectionFolder",
    "Artist",
    "Title",
    "Label",
    "Format",
    "Released",
    "Catalog#",
    "release_id",
    "Release URL",
    "want_count",
    "have_count",
    "num_for_sale",
    "lowest_price",
    "currency",
    "blocked_from_sale",
    "liquidity_score",
    "classification",
    "signal_status",
];

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// `collection-output-MMDDYYYY.csv`
pub fn default_output_path(date: NaiveDate) -> PathBuf {
    PathBuf::from(format!("collection-output-{}.csv", date.format("%m%d%Y")))
}

/// Write the report to `path`.
///
/// Rows go to `<path>.tmp` first, which is renamed over `path` once every row
/// is flushed. An interrupted write leaves no partial report behind.
pub fn write_report(path: &Path, ranked: &[RankedItem]) -> Result<usize, ReportError> {
    let tmp = tmp_path(path);

    let result = File::create(&tmp)
        .map_err(ReportError::from)
        .and_then(|file| {
            let mut out = BufWriter::new(file);
            let rows = render(&mut out, ranked)?;
            out.flush()?;
            out.get_ref().sync_all()?;
            Ok(rows)
        });

    let rows = match result {
        Ok(rows) => rows,
        Err(e) => {
            let _ = std::fs::remove_file(&tmp);
            return Err(e);
        }
    };

    std::fs::rename(&tmp, path)?;
    info!("Wrote {} rows to {:?}", rows, path);
    Ok(rows)
}

/// Write header and rows to any writer. Returns the row count.
pub fn render<W: Write>(writer: W, ranked: &[RankedItem]) -> Result<usize, ReportError> {
    let mut csv = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .from_writer(writer);

    csv.write_record(COLUMNS)?;
    for ranked_item in ranked {
        csv.write_record(row(ranked_item))?;
    }
    csv.flush()?;
    Ok(ranked.len())
}

fn row(ranked: &RankedItem) -> Vec<String> {
    let scored = &ranked.scored;
    let item = &scored.item;
    let demand = scored.bundle.demand.value();
    let market = scored.bundle.marketplace.value();
    let price = market.and_then(|m| m.lowest_price.as_ref());

    vec![
        ranked.sell_order.to_string(),
        item.folder.clone(),
        opt(&item.artist),
        opt(&item.title),
        opt(&item.label),
        opt(&item.format),
        item.year.map(|y| y.to_string()).unwrap_or_default(),
        opt(&item.catalog_number),
        item.release_id.to_string(),
        item.release_url(),
        demand.map(|d| d.want_count.to_string()).unwrap_or_default(),
        demand.map(|d| d.have_count.to_string()).unwrap_or_default(),
        market.map(|m| m.active_listings.to_string()).unwrap_or_default(),
        price.map(|p| format!("{:.2}", p.value)).unwrap_or_default(),
        price.map(|p| p.currency.clone()).unwrap_or_default(),
        demand
            .map(|d| d.blocked_from_sale.to_string())
            .unwrap_or_default(),
        format!("{:.4}", scored.liquidity.score),
        scored.classification().to_string(),
        scored.bundle.status().to_string(),
    ]
}

fn opt(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::CatalogItem;
    use crate::discogs::{DemandSignal, MarketplaceSignal, Price};
    use crate::fetcher::{Resolved, SignalBundle};
    use crate::ranking::{rank, ScoredItem};
    use tempfile::TempDir;

    fn sample() -> Vec<RankedItem> {
        let listed = ScoredItem::new(
            CatalogItem::new(1867708, "selling")
                .with_artist("Massive Attack")
                .with_title("Blue Lines"),
            SignalBundle {
                release_id: 1867708,
                demand: Resolved::Cache(DemandSignal::new(50, 5)),
                marketplace: Resolved::Remote(MarketplaceSignal::new(
                    3,
                    Some(Price {
                        value: 24.5,
                        currency: "USD".to_string(),
                    }),
                )),
            },
        );
        let unknown = ScoredItem::new(
            CatalogItem::new(42, "selling"),
            SignalBundle {
                release_id: 42,
                demand: Resolved::Unavailable {
                    error: "429".to_string(),
                    throttled: true,
                },
                marketplace: Resolved::Remote(MarketplaceSignal::empty()),
            },
        );
        rank(vec![unknown, listed])
    }

    fn render_to_string(ranked: &[RankedItem]) -> String {
        let mut buf = Vec::new();
        render(&mut buf, ranked).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_default_output_path() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(
            default_output_path(date),
            PathBuf::from("collection-output-03072024.csv")
        );
    }

    #[test]
    fn test_render_layout() {
        let out = render_to_string(&sample());
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("\"Sell Order\",\"CollectionFolder\",\"Artist\""));
        assert!(lines[0].ends_with("\"classification\",\"signal_status\""));

        let first: Vec<&str> = lines[1].split("\",\"").collect();
        assert_eq!(first.len(), COLUMNS.len());
        assert_eq!(first[0], "\"1");
        assert_eq!(first[2], "Massive Attack");
        assert_eq!(first[9], "https://www.discogs.com/release/1867708");
        assert_eq!(first[13], "24.50");
        assert_eq!(first[14], "USD");
        assert_eq!(first[15], "false");
        assert_eq!(first[17], "scored");
        assert_eq!(first[18], "ok\"");
    }

    #[test]
    fn test_unknown_row_leaves_missing_fields_empty() {
        let out = render_to_string(&sample());
        let row = out.lines().nth(2).unwrap();
        assert!(row.starts_with("\"2\",\"selling\",\"\",\"\""));
        assert!(row.contains("\"0.0000\",\"unknown\",\"unavailable\""));
    }

    #[test]
    fn test_write_report_replaces_atomically() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.csv");
        std::fs::write(&path, "old").unwrap();

        let rows = write_report(&path, &sample()).unwrap();
        assert_eq!(rows, 2);

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("\"Sell Order\""));
        assert!(!dir.path().join("report.csv.tmp").exists());
    }

    #[test]
    fn test_write_report_into_missing_dir_fails_cleanly() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("report.csv");
        assert!(matches!(write_report(&path, &sample()), Err(ReportError::Io(_))));
        assert!(!path.exists());
    }
}
