//! Oracle dialect
//!
//! Dates go through TO_DATE so literals work regardless of NLS settings;
//! synonym tables surface through ALL_SYNONYMS and are cloned from their
//! source table's metadata by the catalog.

use chrono::{NaiveDate, NaiveDateTime};

use crate::descriptor::ConnectionOptions;

use super::QueryDialect;

pub struct OracleDialect {
    timezone: String,
}

impl OracleDialect {
    pub fn new(options: &ConnectionOptions) -> Self {
        Self {
            timezone: options.timezone.clone().unwrap_or_else(|| "UTC".into()),
        }
    }
}

impl Default for OracleDialect {
    fn default() -> Self {
        Self {
            timezone: "UTC".into(),
        }
    }
}

impl QueryDialect for OracleDialect {
    fn name(&self) -> &'static str {
        "oracle"
    }

    fn env_timezone(&self) -> &str {
        &self.timezone
    }

    fn date_literal(&self, d: &NaiveDate) -> String {
        format!("TO_DATE('{}','YYYY-MM-DD')", d.format("%Y-%m-%d"))
    }

    fn datetime_literal(&self, dt: &NaiveDateTime) -> String {
        format!(
            "TO_DATE('{}','YYYY-MM-DD HH24:MI:SS')",
            dt.format("%Y-%m-%d %H:%M:%S")
        )
    }

    fn tz_convert(&self, expr: &str, from_tz: &str, to_tz: &str) -> Option<String> {
        Some(format!(
            "(FROM_TZ(CAST({} AS TIMESTAMP),'{}') AT TIME ZONE '{}')",
            expr, from_tz, to_tz
        ))
    }

    fn time_truncate(&self, expr: &str) -> String {
        format!("TO_CHAR({},'HH24:MI:SS')", expr)
    }

    fn geo_point_expr(&self, expr: &str) -> String {
        format!(
            "({}.SDO_POINT.Y || ',' || {}.SDO_POINT.X)",
            expr, expr
        )
    }

    fn geo_literal(&self, lat: f64, lng: f64) -> Option<String> {
        Some(format!(
            "SDO_GEOMETRY(2001,4326,SDO_POINT_TYPE({},{},NULL),NULL,NULL)",
            lng, lat
        ))
    }

    fn limit_clause(&self, limit: Option<u64>, offset: u64) -> String {
        match limit {
            Some(n) => format!(" OFFSET {} ROWS FETCH NEXT {} ROWS ONLY", offset, n),
            None => String::new(),
        }
    }

    // transactions start implicitly with the first statement
    fn begin_stmt(&self) -> &'static str {
        "SET TRANSACTION READ WRITE"
    }

    fn checksum_query(&self, schema: &str) -> Option<String> {
        Some(format!(
            "SELECT t.table_name, \
             STANDARD_HASH(t.table_name || '|' || NVL(c.comments,''),'SHA256') AS table_checksum, \
             (SELECT STANDARD_HASH(LISTAGG(tc.column_name || '|' || tc.data_type || '|' || tc.nullable || '|' || NVL(tc.data_default,'~'),';') \
             WITHIN GROUP (ORDER BY tc.column_id),'SHA256') \
             FROM all_tab_columns tc WHERE tc.owner=t.owner AND tc.table_name=t.table_name) AS fields_checksum, \
             NULL AS synonym_of \
             FROM all_tables t \
             LEFT JOIN all_tab_comments c ON c.owner=t.owner AND c.table_name=t.table_name \
             WHERE t.owner='{schema}' \
             UNION ALL \
             SELECT s.synonym_name, NULL, NULL, s.table_name \
             FROM all_synonyms s WHERE s.owner='{schema}' \
             ORDER BY 1",
            schema = schema
        ))
    }

    fn fields_query(&self, schema: &str, tables: &[String]) -> Option<String> {
        if tables.is_empty() {
            return None;
        }
        let list = tables
            .iter()
            .map(|t| self.quote_str(t))
            .collect::<Vec<_>>()
            .join(",");
        Some(format!(
            "SELECT tc.table_name, tc.column_name, tc.data_type, \
             CASE tc.nullable WHEN 'Y' THEN 1 ELSE 0 END, tc.data_default, \
             CASE WHEN pkc.column_name IS NULL THEN 0 ELSE 1 END, \
             tc.data_length, cc.comments, tc.column_id \
             FROM all_tab_columns tc \
             LEFT JOIN all_col_comments cc ON cc.owner=tc.owner AND cc.table_name=tc.table_name AND cc.column_name=tc.column_name \
             LEFT JOIN (SELECT acc.owner, acc.table_name, acc.column_name \
             FROM all_constraints ac JOIN all_cons_columns acc ON acc.constraint_name=ac.constraint_name AND acc.owner=ac.owner \
             WHERE ac.constraint_type='P') pkc \
             ON pkc.owner=tc.owner AND pkc.table_name=tc.table_name AND pkc.column_name=tc.column_name \
             WHERE tc.owner='{}' AND tc.table_name IN ({}) \
             ORDER BY tc.table_name, tc.column_id",
            schema, list
        ))
    }

    fn relations_query(&self, schema: &str) -> Option<String> {
        Some(format!(
            "SELECT ac.constraint_name, rcc.table_name, rcc.column_name, \
             acc.table_name, acc.column_name \
             FROM all_constraints ac \
             JOIN all_cons_columns acc ON acc.constraint_name=ac.constraint_name AND acc.owner=ac.owner \
             JOIN all_cons_columns rcc ON rcc.constraint_name=ac.r_constraint_name AND rcc.owner=ac.r_owner AND rcc.position=acc.position \
             WHERE ac.owner='{}' AND ac.constraint_type='R' \
             ORDER BY ac.constraint_name, acc.position",
            schema
        ))
    }

    fn last_changed_query(&self, schema: &str, table: Option<&str>) -> Option<String> {
        let table_clause = table
            .map(|t| format!(" AND o.object_name={}", self.quote_str(t)))
            .unwrap_or_default();
        Some(format!(
            "SELECT TO_CHAR(MAX(o.last_ddl_time),'YYYY-MM-DD HH24:MI:SS') \
             FROM all_objects o \
             WHERE o.owner='{}' AND o.object_type='TABLE'{}",
            schema, table_clause
        ))
    }
}
