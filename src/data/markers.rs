//! Marker feature lists for the dysbiosis index.

use crate::error::{MetricsError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Default name of the feature id column in marker tables.
pub const DEFAULT_ID_COLUMN: &str = "_feature_id";

/// Direction of a marker feature relative to dysbiosis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Increased in dysbiosis.
    Up,
    /// Increased in health.
    Down,
}

impl Direction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }
}

/// Mapping from feature identifier to marker direction.
///
/// Each identifier appears once. Insertion order is kept.
#[derive(Debug, Clone, Default)]
pub struct MarkerTable {
    features: Vec<(String, Direction)>,
    index: HashMap<String, usize>,
}

impl MarkerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one marker. Re-adding with the same direction is a no-op;
    /// a different direction is a [`MetricsError::MarkerConflict`].
    pub fn insert(&mut self, feature_id: &str, direction: Direction) -> Result<()> {
        match self.index.get(feature_id) {
            Some(&i) if self.features[i].1 == direction => Ok(()),
            Some(_) => Err(MetricsError::MarkerConflict(feature_id.to_string())),
            None => {
                self.index.insert(feature_id.to_string(), self.features.len());
                self.features.push((feature_id.to_string(), direction));
                Ok(())
            }
        }
    }

    /// Outer-merge an "up" and a "down" list into one table.
    pub fn from_lists<S: AsRef<str>>(up: &[S], down: &[S]) -> Result<Self> {
        let mut table = Self::new();
        for id in up {
            table.insert(id.as_ref(), Direction::Up)?;
        }
        for id in down {
            table.insert(id.as_ref(), Direction::Down)?;
        }
        Ok(table)
    }

    /// Read the "up" and "down" marker tables (tab-separated, with header)
    /// and merge them.
    ///
    /// Feature ids are taken from `id_column`, or from the first column when
    /// the header has no such column.
    pub fn from_tsv_pair<P: AsRef<Path>, Q: AsRef<Path>>(
        up_path: P,
        down_path: Q,
        id_column: &str,
    ) -> Result<Self> {
        let up = read_id_column(up_path.as_ref(), id_column)?;
        let down = read_id_column(down_path.as_ref(), id_column)?;
        Self::from_lists(&up, &down)
    }

    pub fn direction(&self, feature_id: &str) -> Option<Direction> {
        self.index.get(feature_id).map(|&i| self.features[i].1)
    }

    pub fn up_features(&self) -> Vec<&str> {
        self.with_direction(Direction::Up)
    }

    pub fn down_features(&self) -> Vec<&str> {
        self.with_direction(Direction::Down)
    }

    /// All marker ids, in insertion order.
    pub fn feature_ids(&self) -> Vec<&str> {
        self.features.iter().map(|(id, _)| id.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    fn with_direction(&self, direction: Direction) -> Vec<&str> {
        self.features
            .iter()
            .filter(|(_, d)| *d == direction)
            .map(|(id, _)| id.as_str())
            .collect()
    }
}

fn read_id_column(path: &Path, id_column: &str) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_path(path)?;
    let col = reader
        .headers()?
        .iter()
        .position(|h| h.trim() == id_column)
        .unwrap_or(0);

    let mut ids = Vec::new();
    for record in reader.records() {
        let record = record?;
        if let Some(id) = record.get(col).map(str::trim).filter(|s| !s.is_empty()) {
            ids.push(id.to_string());
        }
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_from_lists() {
        let table = MarkerTable::from_lists(&["AAA", "CCC", "AAA"], &["GGG"]).unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.up_features(), vec!["AAA", "CCC"]);
        assert_eq!(table.down_features(), vec!["GGG"]);
        assert_eq!(table.direction("GGG"), Some(Direction::Down));
        assert_eq!(table.direction("TTT"), None);
    }

    #[test]
    fn test_conflicting_direction() {
        let err = MarkerTable::from_lists(&["AAA"], &["AAA"]).unwrap_err();
        assert!(matches!(err, MetricsError::MarkerConflict(id) if id == "AAA"));
    }

    #[test]
    fn test_from_tsv_pair() {
        let mut up = NamedTempFile::new().unwrap();
        writeln!(up, "taxonomy\t_feature_id\tpval").unwrap();
        writeln!(up, "g__Escherichia\tTACGGAG\t0.001").unwrap();
        writeln!(up, "g__Klebsiella\tTACGTAG\t0.01").unwrap();
        up.flush().unwrap();

        let mut down = NamedTempFile::new().unwrap();
        writeln!(down, "sequence\tpval").unwrap();
        writeln!(down, "TACGGAA\t0.02").unwrap();
        down.flush().unwrap();

        let table = MarkerTable::from_tsv_pair(up.path(), down.path(), DEFAULT_ID_COLUMN).unwrap();
        assert_eq!(table.up_features(), vec!["TACGGAG", "TACGTAG"]);
        assert_eq!(table.down_features(), vec!["TACGGAA"]);
    }
}
