//! Statement execution over an executor capability.
//!
//! # Responsibility
//! - Run query / single-row query / update / batch update.
//! - Wrap every executor fault into `RepoError::Execution`.
//! - Hand result records to the row mapper.
//!
//! # Invariants
//! - `query_one` never picks a row silently: 0 and >1 rows are errors.
//! - Batch results carry one count per input element, in input order.

use crate::error::{RepoError, RepoResult};
use crate::executor::{ExecutorError, Record, SqlExecutor};
use crate::mapper::{map_row, RowTarget};
use crate::params::{bind_object, ParamSource, ParameterSet};
use log::{debug, warn};
use std::time::Instant;

/// Execution engine wrapping one `SqlExecutor`.
pub struct ExecutionEngine<E: SqlExecutor> {
    executor: E,
}

impl<E: SqlExecutor> ExecutionEngine<E> {
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Runs a row-returning statement without mapping.
    pub fn query_records(&self, sql: &str, params: &ParameterSet) -> RepoResult<Vec<Record>> {
        self.run("query", |executor| executor.query(sql, params))
    }

    /// Runs a row-returning statement and maps every row into `T`.
    pub fn query<T: RowTarget>(&self, sql: &str, params: &ParameterSet) -> RepoResult<Vec<T>> {
        let records = self.query_records(sql, params)?;
        records
            .iter()
            .map(|record| map_row::<T>(record).map_err(RepoError::from))
            .collect()
    }

    /// Runs a statement expected to return exactly one row.
    ///
    /// # Errors
    /// - `NoSuchRow` when no row comes back.
    /// - `MultipleRowsReturned` when more than one row comes back.
    pub fn query_one<T: RowTarget>(&self, sql: &str, params: &ParameterSet) -> RepoResult<T> {
        let records = self.run("query_one", |executor| executor.query(sql, params))?;
        match records.as_slice() {
            [] => Err(RepoError::NoSuchRow),
            [record] => Ok(map_row::<T>(record)?),
            _ => Err(RepoError::MultipleRowsReturned {
                count: records.len(),
            }),
        }
    }

    /// Runs a data-modifying statement and returns the affected-row count.
    pub fn update(&self, sql: &str, params: &ParameterSet) -> RepoResult<usize> {
        self.run("update", |executor| executor.execute(sql, params))
    }

    /// Binds every element and runs the statement once per element.
    ///
    /// Atomicity is whatever the executor guarantees for `execute_batch`.
    pub fn batch_update<P: ParamSource>(&self, sql: &str, items: &[P]) -> RepoResult<Vec<usize>> {
        let batch: Vec<ParameterSet> = items.iter().map(|item| bind_object(item)).collect();
        let counts = self.run("batch_update", |executor| {
            executor.execute_batch(sql, &batch)
        })?;

        if counts.len() != batch.len() {
            return Err(RepoError::Execution(ExecutorError::from(format!(
                "executor returned {} counts for {} parameter sets",
                counts.len(),
                batch.len()
            ))));
        }
        Ok(counts)
    }

    fn run<R: Outcome>(
        &self,
        op: &'static str,
        call: impl FnOnce(&E) -> Result<R, ExecutorError>,
    ) -> RepoResult<R> {
        let started_at = Instant::now();
        match call(&self.executor) {
            Ok(outcome) => {
                debug!(
                    "event=sql_execute module=engine op={} status=ok {}={} duration_ms={}",
                    op,
                    R::LABEL,
                    outcome.size(),
                    started_at.elapsed().as_millis()
                );
                Ok(outcome)
            }
            Err(err) => {
                warn!(
                    "event=sql_execute module=engine op={} status=error duration_ms={} error={}",
                    op,
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(RepoError::Execution(err))
            }
        }
    }
}

/// Size summary of one executor result for log lines.
trait Outcome {
    const LABEL: &'static str;
    fn size(&self) -> usize;
}

impl Outcome for Vec<Record> {
    const LABEL: &'static str = "rows";

    fn size(&self) -> usize {
        self.len()
    }
}

impl Outcome for usize {
    const LABEL: &'static str = "affected";

    fn size(&self) -> usize {
        *self
    }
}

impl Outcome for Vec<usize> {
    const LABEL: &'static str = "statements";

    fn size(&self) -> usize {
        self.len()
    }
}

#[cfg(test)]
mod tests {
    use super::ExecutionEngine;
    use crate::error::RepoErrorKind;
    use crate::executor::{ExecutorError, Record, SqlExecutor};
    use crate::params::ParameterSet;
    use rusqlite::types::Value;
    use std::error::Error;
    use std::io;
    use std::sync::Mutex;

    #[derive(Debug, Default, PartialEq)]
    struct Item {
        id: i64,
    }

    crate::row_target!(Item { id });

    /// Executor returning canned rows and recording batches.
    #[derive(Default)]
    struct ScriptedExecutor {
        rows: usize,
        fail: bool,
        short_batch: bool,
        batches: Mutex<Vec<Vec<ParameterSet>>>,
    }

    impl SqlExecutor for ScriptedExecutor {
        fn query(&self, _sql: &str, _params: &ParameterSet) -> Result<Vec<Record>, ExecutorError> {
            if self.fail {
                return Err(Box::new(io::Error::new(io::ErrorKind::Other, "boom")));
            }
            Ok((0..self.rows)
                .map(|index| Record::new().with("ID", Value::Integer(index as i64 + 1)))
                .collect())
        }

        fn execute(&self, _sql: &str, _params: &ParameterSet) -> Result<usize, ExecutorError> {
            if self.fail {
                return Err(Box::new(io::Error::new(io::ErrorKind::Other, "boom")));
            }
            Ok(self.rows)
        }

        fn execute_batch(
            &self,
            _sql: &str,
            batch: &[ParameterSet],
        ) -> Result<Vec<usize>, ExecutorError> {
            self.batches
                .lock()
                .expect("batch log")
                .push(batch.to_vec());
            let len = if self.short_batch {
                batch.len() - 1
            } else {
                batch.len()
            };
            Ok((0..len).collect())
        }
    }

    fn engine(rows: usize) -> ExecutionEngine<ScriptedExecutor> {
        ExecutionEngine::new(ScriptedExecutor {
            rows,
            ..ScriptedExecutor::default()
        })
    }

    #[test]
    fn query_one_distinguishes_zero_one_and_many_rows() {
        let params = ParameterSet::new();

        let none = engine(0)
            .query_one::<Item>("SELECT", &params)
            .expect_err("zero rows must fail");
        assert_eq!(none.kind(), RepoErrorKind::NoSuchRow);

        let one = engine(1)
            .query_one::<Item>("SELECT", &params)
            .expect("one row");
        assert_eq!(one, Item { id: 1 });

        let many = engine(3)
            .query_one::<Item>("SELECT", &params)
            .expect_err("many rows must fail");
        assert_eq!(many.kind(), RepoErrorKind::MultipleRowsReturned);
        assert!(many.to_string().contains('3'));
    }

    #[test]
    fn query_maps_every_row() {
        let items = engine(2)
            .query::<Item>("SELECT", &ParameterSet::new())
            .expect("query");
        assert_eq!(items, vec![Item { id: 1 }, Item { id: 2 }]);
    }

    #[test]
    fn executor_faults_are_wrapped_with_cause() {
        let engine = ExecutionEngine::new(ScriptedExecutor {
            fail: true,
            ..ScriptedExecutor::default()
        });

        let err = engine
            .update("UPDATE", &ParameterSet::new())
            .expect_err("fault must surface");
        assert_eq!(err.kind(), RepoErrorKind::ExecutionFailure);
        assert_eq!(err.source().map(ToString::to_string), Some("boom".to_string()));
    }

    #[test]
    fn batch_binds_each_element_in_order() {
        let engine = engine(0);
        let items = vec![
            ParameterSet::new().with("id", 4),
            ParameterSet::new().with("id", 5),
        ];

        let counts = engine.batch_update("INSERT", &items).expect("batch");
        assert_eq!(counts.len(), items.len());

        let batches = engine.executor().batches.lock().expect("batch log");
        assert_eq!(batches[0], items);
    }

    #[test]
    fn batch_count_mismatch_is_an_execution_failure() {
        let engine = ExecutionEngine::new(ScriptedExecutor {
            short_batch: true,
            ..ScriptedExecutor::default()
        });
        let items = vec![ParameterSet::new(), ParameterSet::new()];

        let err = engine
            .batch_update("INSERT", &items)
            .expect_err("short result must fail");
        assert_eq!(err.kind(), RepoErrorKind::ExecutionFailure);
    }
}
