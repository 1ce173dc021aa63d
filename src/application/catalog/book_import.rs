use crate::domain::{BookCandidate, Genre};

use super::super::{LendingError, Result, ServiceDependencies};
use super::catalog_service::add_or_merge_book;

const EXPECTED_COLUMNS: usize = 6;

/// 取り込みに失敗した行
#[derive(Debug)]
pub struct RowFailure {
    /// 1始まりの行番号
    pub line: usize,
    pub error: LendingError,
}

/// CSV取り込みの結果（行ごとの成否）
#[derive(Debug, Default)]
pub struct ImportReport {
    pub created: usize,
    pub updated: usize,
    pub failures: Vec<RowFailure>,
}

impl ImportReport {
    pub fn processed(&self) -> usize {
        self.created + self.updated + self.failures.len()
    }
}

/// 1行をフィールドに分割する
///
/// ダブルクォートで囲まれたフィールド内のカンマと `""` エスケープを扱う。
fn split_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);

    fields.into_iter().map(|f| f.trim().to_string()).collect()
}

fn is_header(fields: &[String]) -> bool {
    fields
        .first()
        .is_some_and(|f| f.eq_ignore_ascii_case("title"))
}

/// CSVの1行を受け入れ候補に変換する
///
/// 列: title, author, genre, isbn, year, copies
/// 複数著者は `;` で区切る。
pub fn parse_csv_row(line_no: usize, line: &str) -> Result<BookCandidate> {
    let fields = split_fields(line);
    let invalid = |reason: String| LendingError::InvalidCsvRow {
        line: line_no,
        reason,
    };

    if fields.len() != EXPECTED_COLUMNS {
        return Err(invalid(format!(
            "expected {} columns, found {}",
            EXPECTED_COLUMNS,
            fields.len()
        )));
    }

    let title = fields[0].clone();
    if title.is_empty() {
        return Err(invalid("title is empty".to_string()));
    }

    let authors: Vec<String> = fields[1]
        .split(';')
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string)
        .collect();
    if authors.is_empty() {
        return Err(invalid("author is empty".to_string()));
    }

    let genre = fields[2]
        .parse::<Genre>()
        .map_err(LendingError::InvalidGenre)?;

    let publication_year = fields[4]
        .parse::<i32>()
        .map_err(|_| invalid(format!("year is not a number: {:?}", fields[4])))?;

    let total_copies = fields[5]
        .parse::<u32>()
        .map_err(|_| invalid(format!("copies is not a non-negative number: {:?}", fields[5])))?;

    Ok(BookCandidate {
        title,
        authors,
        genre,
        isbn: fields[3].clone(),
        publication_year,
        total_copies,
    })
}

/// CSVテキストから書籍を一括取り込みする
///
/// 行を順に処理し、不正な行はその行だけを失敗として記録する。
/// 処理済みの行は取り消さない。空行と先頭のヘッダ行は読み飛ばす。
pub async fn import_books_csv(deps: &ServiceDependencies, csv: &str) -> ImportReport {
    let mut report = ImportReport::default();

    for (index, line) in csv.lines().enumerate() {
        let line_no = index + 1;
        if line.trim().is_empty() {
            continue;
        }
        if report.processed() == 0 && is_header(&split_fields(line)) {
            continue;
        }

        let outcome = match parse_csv_row(line_no, line) {
            Ok(candidate) => add_or_merge_book(deps, candidate).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(merged) if merged.is_new => report.created += 1,
            Ok(_) => report.updated += 1,
            Err(error) => {
                tracing::warn!(line = line_no, error = %error, "Skipped CSV row");
                report.failures.push(RowFailure {
                    line: line_no,
                    error,
                });
            }
        }
    }

    tracing::info!(
        created = report.created,
        updated = report.updated,
        failed = report.failures.len(),
        "Book import finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_csv_row() {
        let candidate =
            parse_csv_row(2, "Good Omens,Terry Pratchett; Neil Gaiman,Fantasy,9780060853983,1990,3")
                .unwrap();
        assert_eq!(candidate.title, "Good Omens");
        assert_eq!(
            candidate.authors,
            vec!["Terry Pratchett".to_string(), "Neil Gaiman".to_string()]
        );
        assert_eq!(candidate.genre, Genre::Fantasy);
        assert_eq!(candidate.publication_year, 1990);
        assert_eq!(candidate.total_copies, 3);
    }

    #[test]
    fn test_parse_csv_row_with_quoted_comma() {
        let candidate = parse_csv_row(
            1,
            r#""Crime, and Punishment",Fyodor Dostoevsky,fiction,9780143058144,1866,1"#,
        )
        .unwrap();
        assert_eq!(candidate.title, "Crime, and Punishment");
    }

    #[test]
    fn test_parse_csv_row_wrong_column_count() {
        let err = parse_csv_row(3, "Dune,Frank Herbert,fiction,9780441172719,1965").unwrap_err();
        assert!(matches!(err, LendingError::InvalidCsvRow { line: 3, .. }));
    }

    #[test]
    fn test_parse_csv_row_non_numeric_year() {
        let err = parse_csv_row(5, "Dune,Frank Herbert,fiction,9780441172719,sixties,2").unwrap_err();
        assert!(matches!(err, LendingError::InvalidCsvRow { line: 5, .. }));
    }

    #[test]
    fn test_parse_csv_row_invalid_genre() {
        let err = parse_csv_row(1, "Dune,Frank Herbert,cookbook,9780441172719,1965,2").unwrap_err();
        assert!(matches!(err, LendingError::InvalidGenre(_)));
    }

    #[test]
    fn test_split_fields_escaped_quote() {
        assert_eq!(
            split_fields(r#"a,"say ""hi""",c"#),
            vec!["a".to_string(), r#"say "hi""#.to_string(), "c".to_string()]
        );
    }
}
