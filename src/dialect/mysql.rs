//! MySQL / MariaDB dialect

use crate::descriptor::ConnectionOptions;

use super::QueryDialect;

pub struct MySqlDialect {
    timezone: String,
}

impl MySqlDialect {
    pub fn new(options: &ConnectionOptions) -> Self {
        Self {
            timezone: options.timezone.clone().unwrap_or_else(|| "UTC".into()),
        }
    }
}

impl Default for MySqlDialect {
    fn default() -> Self {
        Self {
            timezone: "UTC".into(),
        }
    }
}

impl QueryDialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn env_timezone(&self) -> &str {
        &self.timezone
    }

    fn tz_convert(&self, expr: &str, from_tz: &str, to_tz: &str) -> Option<String> {
        Some(format!("CONVERT_TZ({},'{}','{}')", expr, from_tz, to_tz))
    }

    fn time_truncate(&self, expr: &str) -> String {
        format!("TIME({})", expr)
    }

    fn geo_point_expr(&self, expr: &str) -> String {
        format!("CONCAT(ST_Y({}),',',ST_X({}))", expr, expr)
    }

    fn set_membership(&self, column_expr: &str, value: &str, negated: bool) -> Option<String> {
        let test = format!("FIND_IN_SET({},{})>0", value, column_expr);
        Some(if negated {
            format!("NOT ({})", test)
        } else {
            test
        })
    }

    fn geo_literal(&self, lat: f64, lng: f64) -> Option<String> {
        // WKT takes lng first
        Some(format!("ST_GeomFromText('POINT({} {})')", lng, lat))
    }

    fn begin_stmt(&self) -> &'static str {
        "START TRANSACTION"
    }

    fn checksum_query(&self, schema: &str) -> Option<String> {
        Some(format!(
            "SELECT t.table_name, \
             MD5(CONCAT_WS('|',t.table_name,IFNULL(t.table_collation,''),IFNULL(t.table_comment,''))) AS table_checksum, \
             IFNULL((SELECT MD5(GROUP_CONCAT(CONCAT_WS('|',c.column_name,c.column_type,c.is_nullable,IFNULL(c.column_default,''),c.column_key) \
             ORDER BY c.ordinal_position SEPARATOR ';')) \
             FROM information_schema.columns c \
             WHERE c.table_schema=t.table_schema AND c.table_name=t.table_name),'') AS fields_checksum, \
             NULL AS synonym_of \
             FROM information_schema.tables t \
             WHERE t.table_schema='{}' AND t.table_type='BASE TABLE' \
             ORDER BY t.table_name",
            schema
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
            "SELECT c.table_name, c.column_name, c.column_type, \
             IF(c.is_nullable='YES',1,0), c.column_default, \
             IF(c.column_key='PRI',1,0), c.character_maximum_length, \
             c.column_comment, c.ordinal_position \
             FROM information_schema.columns c \
             WHERE c.table_schema='{}' AND c.table_name IN ({}) \
             ORDER BY c.table_name, c.ordinal_position",
            schema, list
        ))
    }

    fn relations_query(&self, schema: &str) -> Option<String> {
        Some(format!(
            "SELECT k.constraint_name, k.referenced_table_name, k.referenced_column_name, \
             k.table_name, k.column_name \
             FROM information_schema.key_column_usage k \
             WHERE k.table_schema='{}' AND k.referenced_table_name IS NOT NULL \
             ORDER BY k.constraint_name, k.ordinal_position",
            schema
        ))
    }

    fn last_changed_query(&self, schema: &str, table: Option<&str>) -> Option<String> {
        let table_clause = table
            .map(|t| format!(" AND t.table_name={}", self.quote_str(t)))
            .unwrap_or_default();
        Some(format!(
            "SELECT DATE_FORMAT(MAX(IFNULL(t.update_time,t.create_time)),'%Y-%m-%d %H:%i:%s') \
             FROM information_schema.tables t \
             WHERE t.table_schema='{}'{}",
            schema, table_clause
        ))
    }
}
