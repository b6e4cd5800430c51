//! Paragraph-vector embedding files
//!
//! The file format is the plain-text word2vec/doc2vec layout: a header line
//! (skipped), then one line per entity holding its opaque id followed by
//! exactly k space-separated floats. Every malformed line is reported with its
//! line number; nothing is dropped silently.

use crate::error::{ParVecMfError, Result};
use crate::id_mapping::IdIndex;
use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;

/// Parsed embeddings keyed by dense index
pub type Embeddings = HashMap<usize, Vec<f64>>;

/// Load an embedding file, resolving ids through `index`
pub fn load_embeddings(path: impl AsRef<Path>, dimension: usize, index: &IdIndex) -> Result<Embeddings> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|e| ParVecMfError::io(path, e))?;

    let embeddings = parse_embeddings(
        std::io::BufReader::new(file),
        &path.display().to_string(),
        dimension,
        index,
    )?;

    tracing::debug!(
        path = %path.display(),
        rows = embeddings.len(),
        dimension,
        "loaded embeddings"
    );

    Ok(embeddings)
}

/// Parse embeddings from any buffered reader
///
/// `source_name` only labels errors. Blank lines are skipped.
pub fn parse_embeddings<R: BufRead>(
    reader: R,
    source_name: &str,
    dimension: usize,
    index: &IdIndex,
) -> Result<Embeddings> {
    let mut embeddings = Embeddings::new();

    for (line_idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| ParVecMfError::io(source_name, e))?;
        let line_no = line_idx + 1;

        // header: "<count> <dimension>"
        if line_idx == 0 {
            continue;
        }

        let mut tokens = line.split_whitespace();
        let Some(id) = tokens.next() else {
            continue;
        };

        let values = tokens
            .map(|token| {
                token
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| ParVecMfError::EmbeddingValue {
                        source_name: source_name.to_string(),
                        line: line_no,
                        token: token.to_string(),
                    })
            })
            .collect::<Result<Vec<f64>>>()?;

        if values.len() != dimension {
            return Err(ParVecMfError::EmbeddingTokenCount {
                source_name: source_name.to_string(),
                line: line_no,
                expected: dimension,
                found: values.len(),
            });
        }

        let idx = index
            .index(id)
            .ok_or_else(|| ParVecMfError::UnknownEmbeddingId {
                source_name: source_name.to_string(),
                line: line_no,
                id: id.to_string(),
            })?;

        if embeddings.insert(idx, values).is_some() {
            return Err(ParVecMfError::DuplicateEmbeddingId {
                source_name: source_name.to_string(),
                line: line_no,
                id: id.to_string(),
            });
        }
    }

    Ok(embeddings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn users() -> IdIndex {
        IdIndex::build("user", vec!["alice".to_string(), "bob".to_string()]).unwrap()
    }

    #[test]
    fn test_parse_skips_header() {
        let input = "2 3\nalice 0.1 0.2 0.3\nbob -1 0 1e-2\n";
        let embeddings = parse_embeddings(input.as_bytes(), "users.vec", 3, &users()).unwrap();

        assert_eq!(embeddings.len(), 2);
        assert_eq!(embeddings[&0], vec![0.1, 0.2, 0.3]);
        assert_eq!(embeddings[&1], vec![-1.0, 0.0, 0.01]);
    }

    #[test]
    fn test_header_only_file_is_empty() {
        let embeddings = parse_embeddings("0 3\n".as_bytes(), "users.vec", 3, &users()).unwrap();
        assert!(embeddings.is_empty());
    }

    #[test]
    fn test_blank_lines_skipped() {
        let input = "1 2\n\nalice 1 2\n   \n";
        let embeddings = parse_embeddings(input.as_bytes(), "users.vec", 2, &users()).unwrap();
        assert_eq!(embeddings.len(), 1);
    }

    #[test]
    fn test_wrong_token_count() {
        let input = "2 3\nalice 0.1 0.2\n";
        match parse_embeddings(input.as_bytes(), "users.vec", 3, &users()) {
            Err(ParVecMfError::EmbeddingTokenCount {
                line,
                expected,
                found,
                ..
            }) => {
                assert_eq!(line, 2);
                assert_eq!(expected, 3);
                assert_eq!(found, 2);
            }
            other => panic!("expected token count error, got {:?}", other),
        }

        let too_many = "2 1\nalice 0.1 0.2\n";
        assert!(matches!(
            parse_embeddings(too_many.as_bytes(), "users.vec", 1, &users()),
            Err(ParVecMfError::EmbeddingTokenCount { found: 2, .. })
        ));
    }

    #[test]
    fn test_non_numeric_value() {
        let input = "2 2\nalice 0.1 abc\n";
        match parse_embeddings(input.as_bytes(), "users.vec", 2, &users()) {
            Err(ParVecMfError::EmbeddingValue { line, token, .. }) => {
                assert_eq!(line, 2);
                assert_eq!(token, "abc");
            }
            other => panic!("expected value error, got {:?}", other),
        }

        let nan = "2 1\nalice NaN\n";
        assert!(matches!(
            parse_embeddings(nan.as_bytes(), "users.vec", 1, &users()),
            Err(ParVecMfError::EmbeddingValue { .. })
        ));
    }

    #[test]
    fn test_unknown_and_duplicate_ids() {
        let unknown = "1 1\nmallory 0.5\n";
        assert!(matches!(
            parse_embeddings(unknown.as_bytes(), "users.vec", 1, &users()),
            Err(ParVecMfError::UnknownEmbeddingId { line: 2, .. })
        ));

        let duplicate = "2 1\nbob 0.5\nbob 0.6\n";
        assert!(matches!(
            parse_embeddings(duplicate.as_bytes(), "users.vec", 1, &users()),
            Err(ParVecMfError::DuplicateEmbeddingId { line: 3, .. })
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "2 2").unwrap();
        writeln!(file, "bob 3 4").unwrap();
        writeln!(file, "alice 1 2").unwrap();

        let embeddings = load_embeddings(file.path(), 2, &users()).unwrap();
        assert_eq!(embeddings[&0], vec![1.0, 2.0]);
        assert_eq!(embeddings[&1], vec![3.0, 4.0]);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = load_embeddings("/nonexistent/parvecmf/users.vec", 2, &users());
        assert!(matches!(result, Err(ParVecMfError::Io { .. })));
    }
}
