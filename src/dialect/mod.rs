//! Dialect compilers
//!
//! [`QueryDialect`] translates filter/sorting/relation/column descriptors
//! into backend-native expression fragments and assembles full retrieval and
//! count queries. Shared behavior lives in the trait's default method bodies;
//! each backend overrides only what its dialect does differently.

pub mod mssql;
pub mod mysql;
pub mod oracle;
pub mod postgres;
pub mod sqlite;

pub use mssql::MsSqlDialect;
pub use mysql::MySqlDialect;
pub use oracle::OracleDialect;
pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;

use std::collections::HashSet;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use thiserror::Error;
use tracing::warn;

use crate::descriptor::{
    Column, Condition, DataType, Filter, FilterGroup, FilterNode, FilterValue, QuerySpec,
    Relation, SortingGroup, Table,
};

/// Fragment compiled for conditions a backend cannot express: matches no row
pub const FALSE_FRAGMENT: &str = "0=1";

/// Language used for multilingual joins when the query names none
pub const DEFAULT_LANGUAGE: &str = "en";

#[derive(Error, Debug)]
pub enum DialectError {
    /// Wrong descriptor shape passed to a compiler method; programmer error
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

pub type DialectResult<T> = Result<T, DialectError>;

/// How a relation is expressed inside a query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinMode {
    /// `JOIN <parent> ON <links>` — the child side is already in the query
    Parent,
    /// `JOIN <child> ON <links>` — the parent side is already in the query
    Child,
    /// Bare AND-criteria fragment; both sides are already joined elsewhere
    CriteriaOnly,
}

/// Tables already joined into a query, keyed by `schema.table.alias`
///
/// Lets diamond-shaped relation graphs compile without redundant joins.
#[derive(Debug, Default)]
pub struct JoinSet {
    keys: HashSet<String>,
}

impl JoinSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, table: &Table) -> bool {
        self.keys.contains(&table.join_key())
    }

    /// Returns false if the table was already present
    pub fn insert(&mut self, table: &Table) -> bool {
        self.keys.insert(table.join_key())
    }
}

/// A compiler targeting one backend's native query syntax
///
/// Every method is a pure string transformation; nothing here touches a
/// connection. Default bodies implement the shared ANSI-ish behavior.
pub trait QueryDialect {
    /// Dialect name, for diagnostics
    fn name(&self) -> &'static str;

    /// The environment timezone date literals are normalized to
    fn env_timezone(&self) -> &str;

    // ----- literals ---------------------------------------------------

    /// Quote and escape a string literal
    fn quote_str(&self, s: &str) -> String {
        format!("'{}'", s.replace('\'', "''"))
    }

    fn bool_literal(&self, b: bool) -> &'static str {
        if b {
            "1"
        } else {
            "0"
        }
    }

    fn date_format(&self) -> &'static str {
        "%Y-%m-%d"
    }

    fn datetime_format(&self) -> &'static str {
        "%Y-%m-%d %H:%M:%S"
    }

    fn time_format(&self) -> &'static str {
        "%H:%M:%S"
    }

    fn date_literal(&self, d: &NaiveDate) -> String {
        self.quote_str(&d.format(self.date_format()).to_string())
    }

    fn datetime_literal(&self, dt: &NaiveDateTime) -> String {
        self.quote_str(&dt.format(self.datetime_format()).to_string())
    }

    fn time_literal(&self, t: &NaiveTime) -> String {
        self.quote_str(&t.format(self.time_format()).to_string())
    }

    /// Compile a scalar filter value into a literal
    ///
    /// Filter values carry no timezone of their own: they are taken to
    /// already be in the environment timezone. Column references compile to
    /// raw identifiers, raw expressions pass through verbatim.
    fn value_literal(&self, value: &FilterValue) -> DialectResult<String> {
        let lit = match value {
            FilterValue::Null => "NULL".to_string(),
            FilterValue::Bool(b) => self.bool_literal(*b).to_string(),
            FilterValue::Int(i) => i.to_string(),
            FilterValue::Float(f) => f.to_string(),
            FilterValue::Text(s) => self.quote_str(s),
            FilterValue::Date(d) => self.date_literal(d),
            FilterValue::DateTime(dt) => self.datetime_literal(dt),
            FilterValue::Time(t) => self.time_literal(t),
            FilterValue::Column(c) => c.qualified_name(),
            FilterValue::Expr(e) => e.clone(),
            FilterValue::List(items) => {
                let parts: DialectResult<Vec<String>> =
                    items.iter().map(|v| self.value_literal(v)).collect();
                parts?.join(",")
            }
            FilterValue::Range(_, _) => {
                return Err(DialectError::InvalidArgument(
                    "range value outside a Between condition".into(),
                ))
            }
        };
        Ok(lit)
    }

    // ----- expression wrappers ----------------------------------------

    /// Convert a date/datetime expression between timezones; `None` when the
    /// backend has no conversion function
    fn tz_convert(&self, _expr: &str, _from_tz: &str, _to_tz: &str) -> Option<String> {
        None
    }

    /// Truncate a temporal expression to its time-of-day part
    fn time_truncate(&self, expr: &str) -> String {
        format!("CAST({} AS time)", expr)
    }

    /// Emit a geo-point column as a `"lat,lng"` concatenation
    fn geo_point_expr(&self, expr: &str) -> String {
        expr.to_string()
    }

    /// Set-membership test (`value` already compiled to a literal); `None`
    /// when the backend has no set functions
    fn set_membership(&self, _column_expr: &str, _value: &str, _negated: bool) -> Option<String> {
        None
    }

    /// Name of the string-length function
    fn length_fn(&self) -> &'static str {
        "length"
    }

    /// Geo-point literal from parsed coordinates; `None` when the backend
    /// cannot construct one
    fn geo_literal(&self, _lat: f64, _lng: f64) -> Option<String> {
        None
    }

    // ----- column compilation -----------------------------------------

    /// Compile a column reference
    ///
    /// `prefix_alias` qualifies the identifier with the table alias;
    /// `suffix_alias` appends `AS <tag>`. With neither flag the plain native
    /// name is returned (INSERT/UPDATE column lists).
    fn column_expr(&self, column: &Column, prefix_alias: bool, suffix_alias: bool) -> String {
        if column.expression {
            return if suffix_alias {
                format!("{} AS {}", column.name, column.tag)
            } else {
                column.name.clone()
            };
        }
        if !prefix_alias && !suffix_alias {
            return column.name.clone();
        }

        let mut expr = if prefix_alias {
            column.qualified_name()
        } else {
            column.name.clone()
        };

        let env = self.env_timezone().to_string();
        let mismatch = column
            .timezone
            .as_deref()
            .map(|tz| tz != env)
            .unwrap_or(false);

        if column.data_type.is_dated() && mismatch {
            if let Some(tz) = column.timezone.as_deref() {
                if let Some(wrapped) = self.tz_convert(&expr, tz, &env) {
                    expr = wrapped;
                }
            }
        } else if column.data_type == DataType::Time && mismatch {
            expr = self.time_truncate(&expr);
        } else if column.data_type == DataType::GeoPoint {
            expr = self.geo_point_expr(&expr);
        }

        if suffix_alias && expr != column.tag {
            format!("{} AS {}", expr, column.tag)
        } else {
            expr
        }
    }

    // ----- filter compilation -----------------------------------------

    /// Compile a filter or filter group into a boolean expression
    ///
    /// An empty group compiles to the empty string; the caller omits the
    /// clause. Conditions this backend cannot express compile to
    /// [`FALSE_FRAGMENT`] with a logged notice.
    fn filter_expr(&self, node: &FilterNode) -> DialectResult<String> {
        match node {
            FilterNode::Leaf(filter) => self.leaf_filter_expr(filter),
            FilterNode::Group(group) => self.group_filter_expr(group),
        }
    }

    fn group_filter_expr(&self, group: &FilterGroup) -> DialectResult<String> {
        let mut parts = Vec::with_capacity(group.items.len());
        for item in &group.items {
            let compiled = self.filter_expr(item)?;
            if !compiled.is_empty() {
                parts.push(compiled);
            }
        }
        if parts.is_empty() {
            return Ok(String::new());
        }
        let joiner = format!(") {} (", group.operand.as_sql());
        Ok(format!("({})", parts.join(&joiner)))
    }

    fn leaf_filter_expr(&self, filter: &Filter) -> DialectResult<String> {
        let col = self.column_expr(&filter.column, true, false);

        let expr = match &filter.condition {
            Condition::Equals => self.binary_expr(&col, "=", &filter.value)?,
            Condition::NotEqual => self.binary_expr(&col, "<>", &filter.value)?,
            Condition::GreaterThan => self.binary_expr(&col, ">", &filter.value)?,
            Condition::LessThan => self.binary_expr(&col, "<", &filter.value)?,
            Condition::GreaterOrEqual => self.binary_expr(&col, ">=", &filter.value)?,
            Condition::LessOrEqual => self.binary_expr(&col, "<=", &filter.value)?,

            Condition::Contains => self.like_expr(&col, &filter.value, "%", "%", false)?,
            Condition::NotContain => self.like_expr(&col, &filter.value, "%", "%", true)?,
            Condition::StartsWith => self.like_expr(&col, &filter.value, "", "%", false)?,
            Condition::NotStartWith => self.like_expr(&col, &filter.value, "", "%", true)?,
            Condition::EndsWith => self.like_expr(&col, &filter.value, "%", "", false)?,
            Condition::NotEndWith => self.like_expr(&col, &filter.value, "%", "", true)?,

            Condition::IsEmpty => format!("({}='' OR {} IS NULL)", col, col),
            Condition::NotEmpty => format!("{}({})>0", self.length_fn(), col),
            Condition::IsNull => format!("{} IS NULL", col),
            Condition::NotNull => format!("{} IS NOT NULL", col),

            Condition::InList => self.in_list_expr(&col, &filter.value, false)?,
            Condition::NotInList => self.in_list_expr(&col, &filter.value, true)?,

            Condition::InSet | Condition::NotInSet => {
                let negated = filter.condition == Condition::NotInSet;
                let value = self.value_literal(&filter.value)?;
                match self.set_membership(&col, &value, negated) {
                    Some(expr) => expr,
                    None => self.fail_closed(filter),
                }
            }

            Condition::Between => match &filter.value {
                FilterValue::Range(lo, hi) => format!(
                    "{} BETWEEN {} AND {}",
                    col,
                    self.value_literal(lo)?,
                    self.value_literal(hi)?
                ),
                _ => {
                    return Err(DialectError::InvalidArgument(
                        "Between condition requires a range value".into(),
                    ))
                }
            },

            Condition::Custom(template) => {
                if template.is_empty() {
                    return Err(DialectError::InvalidArgument(
                        "Custom condition requires a template".into(),
                    ));
                }
                template.replace("{field}", &col)
            }
        };

        Ok(expr)
    }

    fn binary_expr(&self, col: &str, op: &str, value: &FilterValue) -> DialectResult<String> {
        Ok(format!("{}{}{}", col, op, self.value_literal(value)?))
    }

    fn like_expr(
        &self,
        col: &str,
        value: &FilterValue,
        before: &str,
        after: &str,
        negated: bool,
    ) -> DialectResult<String> {
        let needle = match value {
            FilterValue::Text(s) => s.clone(),
            FilterValue::Int(i) => i.to_string(),
            FilterValue::Float(f) => f.to_string(),
            other => {
                return Err(DialectError::InvalidArgument(format!(
                    "pattern condition requires a textual value, got {:?}",
                    other
                )))
            }
        };
        let pattern = self.quote_str(&format!("{}{}{}", before, needle, after));
        let op = if negated { "NOT LIKE" } else { "LIKE" };
        Ok(format!("{} {} {}", col, op, pattern))
    }

    fn in_list_expr(&self, col: &str, value: &FilterValue, negated: bool) -> DialectResult<String> {
        let list = match value {
            FilterValue::List(_) => self.value_literal(value)?,
            // a lone scalar still forms a one-element list
            other => self.value_literal(other)?,
        };
        let op = if negated { "NOT IN" } else { "IN" };
        Ok(format!("{} {} ({})", col, op, list))
    }

    /// Log a notice and neutralize a condition this backend cannot express
    fn fail_closed(&self, filter: &Filter) -> String {
        warn!(
            dialect = self.name(),
            column = %filter.column.tag,
            condition = ?filter.condition,
            "unsupported filter condition compiled to a false fragment"
        );
        FALSE_FRAGMENT.to_string()
    }

    // ----- sorting ----------------------------------------------------

    /// Compile a sorting group; keys stay in input order
    fn sorting_expr(&self, sorting: &SortingGroup) -> String {
        sorting
            .items
            .iter()
            .map(|s| format!("{} {}", self.column_expr(&s.column, true, false), s.direction))
            .collect::<Vec<_>>()
            .join(", ")
    }

    // ----- relations --------------------------------------------------

    /// Compile a relation into a join clause or bare criteria fragment
    fn relation_expr(
        &self,
        relation: &Relation,
        mode: JoinMode,
        _joined: &JoinSet,
    ) -> DialectResult<String> {
        if relation.links.is_empty() {
            return Err(DialectError::InvalidArgument(
                "relation has no link pairs".into(),
            ));
        }

        let mut criteria: Vec<String> = relation
            .links
            .iter()
            .map(|(p, c)| format!("{}={}", p.qualified_name(), c.qualified_name()))
            .collect();

        if let Some(extra) = &relation.criteria {
            let compiled = self.group_filter_expr(extra)?;
            if !compiled.is_empty() {
                criteria.push(compiled);
            }
        }
        let criteria = criteria.join(" AND ");

        let clause = match mode {
            JoinMode::CriteriaOnly => criteria,
            JoinMode::Parent => format!(
                "{} {} ON {}",
                relation.kind.as_sql(),
                table_source(&relation.parent),
                criteria
            ),
            JoinMode::Child => format!(
                "{} {} ON {}",
                relation.kind.as_sql(),
                table_source(&relation.child),
                criteria
            ),
        };
        Ok(clause)
    }

    // ----- pagination -------------------------------------------------

    /// Limit/offset clause, including its leading space; empty when no limit
    fn limit_clause(&self, limit: Option<u64>, offset: u64) -> String {
        match limit {
            Some(n) if offset > 0 => format!(" LIMIT {} OFFSET {}", n, offset),
            Some(n) => format!(" LIMIT {}", n),
            None => String::new(),
        }
    }

    // ----- query assembly ---------------------------------------------

    /// Assemble a full retrieval query
    fn retrieve_query(&self, spec: &QuerySpec) -> DialectResult<String> {
        let body = self.query_body(spec)?;
        let columns: Vec<String> = spec
            .projected_columns()
            .map(|c| self.column_expr(c, true, true))
            .collect();
        let projection = if columns.is_empty() {
            "*".to_string()
        } else {
            columns.join(", ")
        };

        let mut sql = format!("SELECT {} FROM {}", projection, body);

        let order = self.sorting_expr(&spec.sorting);
        if !order.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&order);
        }
        sql.push_str(&self.limit_clause(spec.limit, spec.offset));
        Ok(sql)
    }

    /// Assemble the `COUNT(1)` variant: same joins/filters/grouping/having,
    /// never a sort or limit
    fn count_query(&self, spec: &QuerySpec) -> DialectResult<String> {
        let body = self.query_body(spec)?;
        Ok(format!("SELECT COUNT(1) FROM {}", body))
    }

    /// Shared FROM/JOIN/WHERE/GROUP BY/HAVING assembly
    fn query_body(&self, spec: &QuerySpec) -> DialectResult<String> {
        let root = spec.root_table().ok_or_else(|| {
            DialectError::InvalidArgument("query needs at least one table".into())
        })?;

        let mut sql = table_source(root);
        let mut joined = JoinSet::new();
        joined.insert(root);

        // criteria of relations whose tables are already joined elsewhere
        let mut loose_criteria: Vec<String> = Vec::new();

        for relation in &spec.relations {
            let parent_in = joined.contains(&relation.parent);
            let child_in = joined.contains(&relation.child);
            let (mode, newcomer) = match (parent_in, child_in) {
                (true, true) => (JoinMode::CriteriaOnly, None),
                (false, true) => (JoinMode::Parent, Some(&relation.parent)),
                _ => (JoinMode::Child, Some(&relation.child)),
            };
            let clause = self.relation_expr(relation, mode, &joined)?;
            match newcomer {
                Some(table) => {
                    joined.insert(table);
                    sql.push(' ');
                    sql.push_str(&clause);
                }
                None => loose_criteria.push(clause),
            }
        }

        // implicit translation joins for multilingual tables
        let language = spec.language.as_deref().unwrap_or(DEFAULT_LANGUAGE);
        for table in spec.tables.iter().filter(|t| t.multilingual) {
            if let Some(clause) = self.translation_join(table, language) {
                sql.push(' ');
                sql.push_str(&clause);
            }
        }

        let mut where_parts: Vec<String> = Vec::new();
        if let Some(filters) = &spec.filters {
            let compiled = self.group_filter_expr(filters)?;
            if !compiled.is_empty() {
                where_parts.push(compiled);
            }
        }
        where_parts.extend(loose_criteria);
        if !where_parts.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&where_parts.join(" AND "));
        }

        if !spec.grouping.is_empty() {
            let groups: Vec<String> = spec
                .grouping
                .iter()
                .map(|c| self.column_expr(c, true, false))
                .collect();
            sql.push_str(" GROUP BY ");
            sql.push_str(&groups.join(", "));
        }

        if let Some(having) = &spec.having {
            let compiled = self.group_filter_expr(having)?;
            if !compiled.is_empty() {
                sql.push_str(" HAVING ");
                sql.push_str(&compiled);
            }
        }

        Ok(sql)
    }

    /// Implicit `LEFT JOIN <name>Tr` for a multilingual table; `None` when
    /// the table declares no key columns to join on
    fn translation_join(&self, table: &Table, language: &str) -> Option<String> {
        let keys: Vec<&Column> = table.key_columns().collect();
        if keys.is_empty() {
            return None;
        }
        let tr_alias = format!("{}Tr", table.effective_alias());
        let mut criteria: Vec<String> = keys
            .iter()
            .map(|k| {
                format!(
                    "{}.{}={}.{}",
                    table.effective_alias(),
                    k.name,
                    tr_alias,
                    k.name
                )
            })
            .collect();
        criteria.push(format!(
            "{}.{}={}",
            tr_alias,
            crate::descriptor::table::LANGUAGE_CODE_COLUMN,
            self.quote_str(language)
        ));
        Some(format!(
            "LEFT JOIN {} {} ON {}",
            table.translation_table(),
            tr_alias,
            criteria.join(" AND ")
        ))
    }

    // ----- composite value construction -------------------------------

    /// Backend literal for a composite value (currently geo points)
    ///
    /// Accepts `"lat,lng"` / `"lat lng"` strings or `{lat, lng}` objects.
    /// Returns `None` on unparseable input: the value is omitted, never an
    /// error.
    fn value_expr(&self, column: &Column, value: &serde_json::Value) -> Option<String> {
        if column.data_type != DataType::GeoPoint {
            return None;
        }
        let (lat, lng) = parse_geo_point(value)?;
        self.geo_literal(lat, lng)
    }

    // ----- transaction statements -------------------------------------

    fn begin_stmt(&self) -> &'static str {
        "BEGIN TRANSACTION"
    }

    fn commit_stmt(&self) -> &'static str {
        "COMMIT"
    }

    fn rollback_stmt(&self) -> &'static str {
        "ROLLBACK"
    }

    fn savepoint_stmt(&self, name: &str) -> String {
        format!("SAVEPOINT {}", name)
    }

    /// `None` when the backend has no savepoint release statement
    fn release_savepoint_stmt(&self, name: &str) -> Option<String> {
        Some(format!("RELEASE SAVEPOINT {}", name))
    }

    fn rollback_to_stmt(&self, name: &str) -> String {
        format!("ROLLBACK TO SAVEPOINT {}", name)
    }

    // ----- catalog introspection SQL ----------------------------------

    /// One-round-trip checksum query: rows of
    /// `(table_name, table_checksum, fields_checksum, synonym_of)`.
    /// `None` when checksums must be computed client-side.
    fn checksum_query(&self, _schema: &str) -> Option<String> {
        None
    }

    /// Full field metadata for the named tables: rows of `(table_name,
    /// column_name, native_type, nullable, default_value, is_primary,
    /// max_length, comment, ordinal)`
    fn fields_query(&self, _schema: &str, _tables: &[String]) -> Option<String> {
        None
    }

    /// Foreign-key introspection: rows of `(constraint_name, parent_table,
    /// parent_column, child_table, child_column)`
    fn relations_query(&self, _schema: &str) -> Option<String> {
        None
    }

    /// Most recent DDL/update timestamp; `None` when the backend does not
    /// record one (callers fall back to the epoch sentinel)
    fn last_changed_query(&self, _schema: &str, _table: Option<&str>) -> Option<String> {
        None
    }
}

/// FROM/JOIN source text for a table: `name alias`, or just `name` when the
/// alias matches
pub(crate) fn table_source(table: &Table) -> String {
    let alias = table.effective_alias();
    if alias == table.name {
        table.name.clone()
    } else {
        format!("{} {}", table.name, alias)
    }
}

/// Parse a geo point from `"lat,lng"`, `"lat lng"` or a `{lat, lng}` object
pub(crate) fn parse_geo_point(value: &serde_json::Value) -> Option<(f64, f64)> {
    match value {
        serde_json::Value::String(s) => {
            let sep = if s.contains(',') { ',' } else { ' ' };
            let mut parts = s.splitn(2, sep);
            let lat = parts.next()?.trim().parse::<f64>().ok()?;
            let lng = parts.next()?.trim().parse::<f64>().ok()?;
            Some((lat, lng))
        }
        serde_json::Value::Object(map) => {
            let lat = map.get("lat")?.as_f64()?;
            let lng = map.get("lng")?.as_f64()?;
            Some((lat, lng))
        }
        _ => None,
    }
}
