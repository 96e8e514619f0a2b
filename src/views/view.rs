use anyhow::{Context, Result};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::ViewError;
use crate::parallel::{CancelSignal, TaskRunner, WorkerQuota};

/// A materialized record set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct View {
    /// Name the view is registered under, if any
    pub name: Option<String>,
    pub header: Vec<String>,
    pub records: Vec<Vec<String>>,
    /// File the records were loaded from; cleared for derived views
    pub source: Option<PathBuf>,
}

impl View {
    pub fn new(header: Vec<String>, records: Vec<Vec<String>>) -> Self {
        Self {
            name: None,
            header,
            records,
            source: None,
        }
    }

    /// Read CSV records. Without a header row, columns are named `c1`, `c2`, ...
    pub fn from_csv_reader<R: io::Read>(reader: R, has_headers: bool) -> Result<Self> {
        let mut csv = csv::ReaderBuilder::new()
            .has_headers(has_headers)
            .from_reader(reader);

        let mut header: Vec<String> = if has_headers {
            csv.headers()
                .context("Failed to read CSV header")?
                .iter()
                .map(str::to_string)
                .collect()
        } else {
            Vec::new()
        };

        let mut records = Vec::new();
        for (index, row) in csv.records().enumerate() {
            let row = row.with_context(|| format!("Failed to read CSV record {}", index + 1))?;
            records.push(row.iter().map(str::to_string).collect::<Vec<_>>());
        }

        if !has_headers {
            let width = records.first().map_or(0, Vec::len);
            header = (1..=width).map(|i| format!("c{i}")).collect();
        }

        Ok(Self::new(header, records))
    }

    pub fn from_csv_path(path: &Path, has_headers: bool) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        let mut view = Self::from_csv_reader(io::BufReader::new(file), has_headers)
            .with_context(|| format!("Failed to load {}", path.display()))?;
        view.source = Some(path.to_path_buf());
        Ok(view)
    }

    pub fn write_csv<W: io::Write>(&self, writer: W) -> Result<()> {
        let mut csv = csv::Writer::from_writer(writer);
        csv.write_record(&self.header)?;
        for record in &self.records {
            csv.write_record(record)?;
        }
        csv.flush()?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn column_count(&self) -> usize {
        self.header.len()
    }

    /// Case-insensitive column lookup
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.header
            .iter()
            .position(|name| name.eq_ignore_ascii_case(column))
    }

    /// Name the view and optionally rename its columns
    ///
    /// Non-empty `fields` must have exactly one name per column.
    pub fn update_header(&mut self, name: &str, fields: &[String]) -> Result<(), ViewError> {
        if !fields.is_empty() {
            if fields.len() != self.column_count() {
                return Err(ViewError::FieldLength {
                    name: name.to_string(),
                    expected: fields.len(),
                    actual: self.column_count(),
                });
            }
            self.header = fields.to_vec();
        }
        self.name = Some(name.to_string());
        Ok(())
    }

    /// Keep the records matching `predicate`, evaluated in parallel
    ///
    /// Cancellation is reported first; otherwise the first recorded predicate
    /// failure is returned. Record order is preserved.
    pub fn par_filter<C, P>(
        &self,
        quota: &Arc<WorkerQuota>,
        cancel: &C,
        min_per_worker: usize,
        predicate: P,
    ) -> Result<View>
    where
        C: CancelSignal + ?Sized,
        P: Fn(&[String]) -> Result<bool> + Sync,
    {
        let keep: Vec<AtomicBool> = self.records.iter().map(|_| AtomicBool::new(false)).collect();
        let runner = TaskRunner::new(quota.clone(), self.records.len(), min_per_worker);

        runner.run(cancel, |index| {
            let matched = predicate(&self.records[index])
                .with_context(|| format!("Failed to evaluate record {}", index + 1))?;
            if matched {
                keep[index].store(true, Ordering::Relaxed);
            }
            Ok(())
        })?;

        if let Some(err) = runner.take_error() {
            return Err(err);
        }

        let records = self
            .records
            .iter()
            .zip(&keep)
            .filter(|(_, keep)| keep.load(Ordering::Relaxed))
            .map(|(record, _)| record.clone())
            .collect();

        Ok(View {
            name: self.name.clone(),
            header: self.header.clone(),
            records,
            source: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::{CancelToken, Never, RunError};

    fn numbers(count: usize) -> View {
        View::new(
            vec!["n".to_string()],
            (0..count).map(|i| vec![i.to_string()]).collect(),
        )
    }

    #[test]
    fn test_from_csv_reader_with_headers() {
        let data = "id,name\n1,alice\n2,bob\n";
        let view = View::from_csv_reader(data.as_bytes(), true).unwrap();
        assert_eq!(view.header, vec!["id", "name"]);
        assert_eq!(view.len(), 2);
        assert_eq!(view.records[1], vec!["2", "bob"]);
        assert_eq!(view.column_index("NAME"), Some(1));
    }

    #[test]
    fn test_from_csv_reader_without_headers() {
        let data = "1,alice\n2,bob\n";
        let view = View::from_csv_reader(data.as_bytes(), false).unwrap();
        assert_eq!(view.header, vec!["c1", "c2"]);
        assert_eq!(view.len(), 2);
    }

    #[test]
    fn test_ragged_csv_is_rejected() {
        let data = "a,b\n1,2\n3\n";
        assert!(View::from_csv_reader(data.as_bytes(), true).is_err());
    }

    #[test]
    fn test_write_csv() {
        let view = View::new(
            vec!["a".into(), "b".into()],
            vec![vec!["1".into(), "x,y".into()]],
        );
        let mut out = Vec::new();
        view.write_csv(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "a,b\n1,\"x,y\"\n");
    }

    #[test]
    fn test_update_header() {
        let mut view = numbers(3);
        view.update_header("t", &[]).unwrap();
        assert_eq!(view.name.as_deref(), Some("t"));
        assert_eq!(view.header, vec!["n"]);

        view.update_header("t", &["value".to_string()]).unwrap();
        assert_eq!(view.header, vec!["value"]);

        let err = view
            .update_header("t", &["a".to_string(), "b".to_string()])
            .unwrap_err();
        assert_eq!(
            err,
            ViewError::FieldLength {
                name: "t".into(),
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn test_par_filter_preserves_order() {
        let quota = Arc::new(WorkerQuota::new(4));
        let view = numbers(1_000);

        let even = view
            .par_filter(&quota, &Never, 10, |record| {
                Ok(record[0].parse::<usize>()? % 2 == 0)
            })
            .unwrap();

        assert_eq!(even.len(), 500);
        assert_eq!(even.records[0], vec!["0"]);
        assert_eq!(even.records[499], vec!["998"]);
        assert_eq!(quota.reserved_slots(), 0);
    }

    #[test]
    fn test_par_filter_surfaces_predicate_error() {
        let quota = Arc::new(WorkerQuota::new(2));
        let mut view = numbers(100);
        view.records[42] = vec!["not a number".into()];

        let err = view
            .par_filter(&quota, &Never, 1, |record| Ok(record[0].parse::<usize>()? > 0))
            .unwrap_err();

        assert!(format!("{err:#}").contains("record 43"));
        assert!(err.downcast_ref::<RunError>().is_none());
    }

    #[test]
    fn test_par_filter_reports_cancellation() {
        let quota = Arc::new(WorkerQuota::new(2));
        let token = CancelToken::new();
        token.cancel("interrupted");

        let err = numbers(100)
            .par_filter(&quota, &token, 1, |_| Ok(true))
            .unwrap_err();

        let run_err = err.downcast_ref::<RunError>().unwrap();
        assert!(run_err.is_cancelled());
    }
}
