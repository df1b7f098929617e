//! Collection import from a CSV export.

use std::io::Read;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use csv::StringRecord;
use tracing::{info, warn};

use super::{CatalogItem, CategoryFilter, CollectionError, CollectionSource};

const FOLDER_COLUMN: &str = "CollectionFolder";
const RELEASE_ID_COLUMN: &str = "release_id";

/// Column positions in the header row.
struct Columns {
    folder: usize,
    release_id: usize,
    artist: Option<usize>,
    title: Option<usize>,
    label: Option<usize>,
    format: Option<usize>,
    released: Option<usize>,
    catalog_number: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &StringRecord) -> Result<Self, CollectionError> {
        let find = |name: &str| headers.iter().position(|h| h == name);
        let require = |name: &str| {
            find(name).ok_or_else(|| CollectionError::MissingColumn(name.to_string()))
        };

        Ok(Self {
            folder: require(FOLDER_COLUMN)?,
            release_id: require(RELEASE_ID_COLUMN)?,
            artist: find("Artist"),
            title: find("Title"),
            label: find("Label"),
            format: find("Format"),
            released: find("Released"),
            catalog_number: find("Catalog#"),
        })
    }
}

/// Collection source reading a Discogs collection CSV export.
///
/// Required columns: `CollectionFolder` and `release_id`. `Artist`, `Title`,
/// `Label`, `Format`, `Released` and `Catalog#` are picked up when present.
pub struct CsvCollection {
    path: PathBuf,
}

impl CsvCollection {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse an export from any reader.
    pub fn parse<R: Read>(reader: R, filter: &CategoryFilter) -> Result<Vec<CatalogItem>, CollectionError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let columns = Columns::from_headers(reader.headers()?)?;

        let mut items = Vec::new();
        let mut skipped = 0usize;
        for (idx, record) in reader.records().enumerate() {
            let record = record?;
            let row = idx + 2;

            let folder = field(&record, Some(columns.folder)).unwrap_or_default();
            if !filter.matches(&folder) {
                continue;
            }

            let raw_id = record.get(columns.release_id).unwrap_or("");
            let Some(release_id) = parse_release_id(raw_id) else {
                warn!("Skipping CSV row {}: invalid release_id {:?}", row, raw_id);
                skipped += 1;
                continue;
            };

            items.push(CatalogItem {
                release_id,
                folder: folder.to_lowercase(),
                artist: field(&record, columns.artist),
                title: field(&record, columns.title),
                label: field(&record, columns.label),
                format: field(&record, columns.format),
                year: field(&record, columns.released).and_then(|v| parse_year(&v)),
                catalog_number: field(&record, columns.catalog_number),
            });
        }

        if skipped > 0 {
            warn!("Skipped {} CSV rows without a usable release_id", skipped);
        }
        Ok(items)
    }
}

#[async_trait]
impl CollectionSource for CsvCollection {
    fn name(&self) -> &str {
        "csv"
    }

    async fn load(&self, filter: &CategoryFilter) -> Result<Vec<CatalogItem>, CollectionError> {
        let file = std::fs::File::open(&self.path)?;
        let items = Self::parse(file, filter)?;
        info!("Loaded {} items from {:?}", items.len(), self.path);
        Ok(items)
    }
}

fn field(record: &StringRecord, column: Option<usize>) -> Option<String> {
    let value = record.get(column?)?;
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Accepts `123` and spreadsheet-style `123.0`.
fn parse_release_id(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    if let Ok(id) = raw.parse::<u64>() {
        return (id > 0).then_some(id);
    }
    let value = raw.parse::<f64>().ok()?;
    if value.is_finite() && value >= 1.0 && value.fract() == 0.0 && value < u64::MAX as f64 {
        Some(value as u64)
    } else {
        None
    }
}

/// Leading four-digit year of values like `1991` or `1991-05-01`.
fn parse_year(raw: &str) -> Option<u32> {
    let digits: String = raw.chars().take(4).collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().filter(|y| *y > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use tokio_test::assert_err;

    const EXPORT: &str = "\
Catalog#,Artist,Title,Label,Format,Rating,Released,release_id,CollectionFolder,Date Added
WBRLP 1,Massive Attack,Blue Lines,Wild Bunch Records,\"LP, Album\",,1991,1867708,Selling,2020-01-01
XLLP 3,Some Artist,Some Title,XL,LP,,0,abc,Selling,2020-01-02
,Portishead,Dummy,Go! Beat,\"LP, Album\",,1994-08-22,48514.0,Keepers,2020-01-03
";

    #[test]
    fn test_parse_all() {
        let items = CsvCollection::parse(EXPORT.as_bytes(), &CategoryFilter::All).unwrap();
        assert_eq!(items.len(), 2);

        let blue_lines = &items[0];
        assert_eq!(blue_lines.release_id, 1867708);
        assert_eq!(blue_lines.folder, "selling");
        assert_eq!(blue_lines.artist.as_deref(), Some("Massive Attack"));
        assert_eq!(blue_lines.format.as_deref(), Some("LP, Album"));
        assert_eq!(blue_lines.year, Some(1991));
        assert_eq!(blue_lines.catalog_number.as_deref(), Some("WBRLP 1"));

        let dummy = &items[1];
        assert_eq!(dummy.release_id, 48514);
        assert_eq!(dummy.year, Some(1994));
        assert!(dummy.catalog_number.is_none());
    }

    #[test]
    fn test_parse_filters_folder_case_insensitively() {
        let items =
            CsvCollection::parse(EXPORT.as_bytes(), &CategoryFilter::parse("KEEPERS")).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title.as_deref(), Some("Dummy"));
    }

    #[test]
    fn test_missing_required_column() {
        let csv = "Artist,Title,release_id\nA,B,1\n";
        let err = CsvCollection::parse(csv.as_bytes(), &CategoryFilter::All).unwrap_err();
        assert!(matches!(err, CollectionError::MissingColumn(c) if c == "CollectionFolder"));

        let csv = "Artist,CollectionFolder\nA,selling\n";
        let err = CsvCollection::parse(csv.as_bytes(), &CategoryFilter::All).unwrap_err();
        assert!(matches!(err, CollectionError::MissingColumn(c) if c == "release_id"));
    }

    #[test]
    fn test_minimal_columns() {
        let csv = "CollectionFolder,release_id\nselling,7\n";
        let items = CsvCollection::parse(csv.as_bytes(), &CategoryFilter::All).unwrap();
        assert_eq!(items, vec![CatalogItem::new(7, "selling")]);
    }

    #[test]
    fn test_parse_release_id() {
        assert_eq!(parse_release_id("123"), Some(123));
        assert_eq!(parse_release_id("123.0"), Some(123));
        assert_eq!(parse_release_id("0"), None);
        assert_eq!(parse_release_id("12.5"), None);
        assert_eq!(parse_release_id("-4"), None);
        assert_eq!(parse_release_id(""), None);
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(EXPORT.as_bytes()).unwrap();

        let source = CsvCollection::new(file.path());
        let items = source.load(&CategoryFilter::parse("selling")).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(source.name(), "csv");
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let source = CsvCollection::new("/nonexistent/collection.csv");
        let err = assert_err!(source.load(&CategoryFilter::All).await);
        assert!(matches!(err, CollectionError::Io(_)));
    }
}
