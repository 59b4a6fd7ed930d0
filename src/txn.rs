//! Nested-savepoint transaction manager
//!
//! A stack of named savepoints over one physical connection. Not safe for
//! concurrent use on the same connection; callers serialize per connection.
//! All operations return `false` on failure instead of erroring: committing
//! or rolling back an unknown name is a no-op failure.

use tracing::{error, warn};

use crate::adapter::Adapter;
use crate::dialect::QueryDialect;

/// Prefix of auto-generated savepoint names
const AUTO_PREFIX: &str = "__transaction_";

#[derive(Debug, Clone)]
struct Savepoint {
    name: String,
}

/// Savepoint stack for one connection
///
/// State lives for the duration of one physical connection; call
/// [`Transactions::reset`] when the connection drops.
pub struct Transactions<'a> {
    adapter: &'a dyn Adapter,
    dialect: &'a dyn QueryDialect,
    stack: Vec<Savepoint>,
    counter: u64,
}

impl<'a> Transactions<'a> {
    pub fn new(adapter: &'a dyn Adapter, dialect: &'a dyn QueryDialect) -> Self {
        Self {
            adapter,
            dialect,
            stack: Vec::new(),
            counter: 0,
        }
    }

    /// Current nesting depth
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Begin a transaction level
    ///
    /// Starts the native transaction when the stack is empty, then pushes a
    /// named savepoint (auto-named when `name` is `None`).
    pub fn begin(&mut self, name: Option<&str>) -> bool {
        if self.stack.is_empty() && !self.run(self.dialect.begin_stmt()) {
            return false;
        }

        let name = match name {
            Some(n) => n.to_string(),
            None => {
                self.counter += 1;
                format!("{}{}", AUTO_PREFIX, self.counter)
            }
        };

        if !self.run(&self.dialect.savepoint_stmt(&name)) {
            return false;
        }
        self.stack.push(Savepoint { name });
        true
    }

    /// Commit down to (and including) the named savepoint, or the most
    /// recent one when unnamed; commits the native transaction when the
    /// match is the bottom of the stack
    pub fn commit(&mut self, name: Option<&str>) -> bool {
        let target = match self.find(name) {
            Some(idx) => idx,
            None => {
                warn!(name = name.unwrap_or("<latest>"), "commit: no matching savepoint");
                return false;
            }
        };

        while self.stack.len() > target {
            let Some(sp) = self.stack.pop() else { break };
            if let Some(stmt) = self.dialect.release_savepoint_stmt(&sp.name) {
                if !self.run(&stmt) {
                    return false;
                }
            }
        }
        if target == 0 {
            return self.run(self.dialect.commit_stmt());
        }
        true
    }

    /// Roll back down to (and including) the named savepoint, or the most
    /// recent one when unnamed; rolls back the native transaction when the
    /// match is the bottom of the stack
    pub fn rollback(&mut self, name: Option<&str>) -> bool {
        let target = match self.find(name) {
            Some(idx) => idx,
            None => {
                warn!(name = name.unwrap_or("<latest>"), "rollback: no matching savepoint");
                return false;
            }
        };

        while self.stack.len() > target {
            let Some(sp) = self.stack.pop() else { break };
            if !self.run(&self.dialect.rollback_to_stmt(&sp.name)) {
                return false;
            }
        }
        if target == 0 {
            return self.run(self.dialect.rollback_stmt());
        }
        true
    }

    /// Clear the stack; call on disconnect/reconnect
    pub fn reset(&mut self) {
        self.stack.clear();
        self.counter = 0;
    }

    // Unnamed operations target the top of the stack: the most recently
    // begun savepoint. A name must match exactly.
    fn find(&self, name: Option<&str>) -> Option<usize> {
        match name {
            Some(n) => self.stack.iter().rposition(|sp| sp.name == n),
            None => self.stack.len().checked_sub(1),
        }
    }

    fn run(&self, stmt: &str) -> bool {
        match self.adapter.execute(stmt) {
            Ok(_) => true,
            Err(e) => {
                error!(statement = stmt, error = %e, "transaction statement failed");
                false
            }
        }
    }
}

/// Transaction manager for the document store
///
/// The targeted document-store version has no multi-document transaction
/// primitive; every operation is a deliberate no-op returning `false`.
#[derive(Debug, Default)]
pub struct NoopTransactions;

impl NoopTransactions {
    pub fn begin(&mut self, _name: Option<&str>) -> bool {
        false
    }

    pub fn commit(&mut self, _name: Option<&str>) -> bool {
        false
    }

    pub fn rollback(&mut self, _name: Option<&str>) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{AdapterResult, ExecResult, QueryResult};
    use crate::dialect::MySqlDialect;
    use std::cell::RefCell;

    /// Records every statement instead of executing it
    struct RecordingAdapter {
        stmts: RefCell<Vec<String>>,
    }

    impl RecordingAdapter {
        fn new() -> Self {
            Self {
                stmts: RefCell::new(Vec::new()),
            }
        }

        fn recorded(&self) -> Vec<String> {
            self.stmts.borrow().clone()
        }
    }

    impl Adapter for RecordingAdapter {
        fn query(&self, _sql: &str) -> AdapterResult<QueryResult> {
            Ok(QueryResult::empty())
        }

        fn execute(&self, sql: &str) -> AdapterResult<ExecResult> {
            self.stmts.borrow_mut().push(sql.to_string());
            Ok(ExecResult {
                affected_rows: 0,
                last_insert_id: None,
            })
        }

        fn test_connection(&self) -> AdapterResult<()> {
            Ok(())
        }

        fn reconnect(&mut self) -> AdapterResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_begin_starts_native_transaction_once() {
        let adapter = RecordingAdapter::new();
        let dialect = MySqlDialect::default();
        let mut txn = Transactions::new(&adapter, &dialect);

        assert!(txn.begin(None));
        assert!(txn.begin(None));
        assert_eq!(
            adapter.recorded(),
            vec![
                "START TRANSACTION",
                "SAVEPOINT __transaction_1",
                "SAVEPOINT __transaction_2",
            ]
        );
        assert_eq!(txn.depth(), 2);
    }

    #[test]
    fn test_named_commit_releases_only_that_level() {
        let adapter = RecordingAdapter::new();
        let dialect = MySqlDialect::default();
        let mut txn = Transactions::new(&adapter, &dialect);

        assert!(txn.begin(None));
        assert!(txn.begin(Some("x")));

        // releases only x's savepoint, outer transaction stays open
        assert!(txn.commit(None));
        assert_eq!(txn.depth(), 1);
        assert_eq!(
            adapter.recorded().last().unwrap(),
            "RELEASE SAVEPOINT x"
        );

        // second unnamed commit closes the outer transaction
        assert!(txn.commit(None));
        assert_eq!(txn.depth(), 0);
        assert_eq!(adapter.recorded().last().unwrap(), "COMMIT");
    }

    #[test]
    fn test_commit_by_name_releases_descendants() {
        let adapter = RecordingAdapter::new();
        let dialect = MySqlDialect::default();
        let mut txn = Transactions::new(&adapter, &dialect);

        txn.begin(Some("outer"));
        txn.begin(Some("mid"));
        txn.begin(Some("inner"));

        assert!(txn.commit(Some("mid")));
        assert_eq!(txn.depth(), 1);
        let recorded = adapter.recorded();
        let tail: Vec<&str> = recorded.iter().map(String::as_str).collect();
        assert_eq!(
            &tail[tail.len() - 2..],
            &["RELEASE SAVEPOINT inner", "RELEASE SAVEPOINT mid"]
        );
        // native transaction still open
        assert!(!recorded.contains(&"COMMIT".to_string()));
    }

    #[test]
    fn test_commit_unknown_name_is_noop_failure() {
        let adapter = RecordingAdapter::new();
        let dialect = MySqlDialect::default();
        let mut txn = Transactions::new(&adapter, &dialect);

        txn.begin(Some("a"));
        let before = adapter.recorded().len();
        assert!(!txn.commit(Some("nope")));
        assert_eq!(adapter.recorded().len(), before);
        assert_eq!(txn.depth(), 1);
    }

    #[test]
    fn test_full_rollback_rolls_back_native_transaction() {
        let adapter = RecordingAdapter::new();
        let dialect = MySqlDialect::default();
        let mut txn = Transactions::new(&adapter, &dialect);

        txn.begin(Some("outer"));
        txn.begin(Some("inner"));

        assert!(txn.rollback(Some("outer")));
        assert_eq!(txn.depth(), 0);
        let recorded = adapter.recorded();
        let tail: Vec<&str> = recorded.iter().map(String::as_str).collect();
        assert_eq!(
            &tail[tail.len() - 3..],
            &[
                "ROLLBACK TO SAVEPOINT inner",
                "ROLLBACK TO SAVEPOINT outer",
                "ROLLBACK",
            ]
        );
    }

    #[test]
    fn test_mssql_save_transaction_has_no_release() {
        let adapter = RecordingAdapter::new();
        let dialect = crate::dialect::MsSqlDialect::default();
        let mut txn = Transactions::new(&adapter, &dialect);

        txn.begin(Some("x"));
        assert!(txn.commit(Some("x")));
        // no release statement exists; only BEGIN, SAVE and COMMIT ran
        assert_eq!(
            adapter.recorded(),
            vec!["BEGIN TRANSACTION", "SAVE TRANSACTION x", "COMMIT"]
        );
    }

    #[test]
    fn test_noop_docstore_transactions() {
        let mut txn = NoopTransactions;
        assert!(!txn.begin(None));
        assert!(!txn.commit(None));
        assert!(!txn.rollback(Some("x")));
    }
}
