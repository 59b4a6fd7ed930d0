//! PostgreSQL dialect

use crate::descriptor::ConnectionOptions;

use super::QueryDialect;

pub struct PostgresDialect {
    timezone: String,
}

impl PostgresDialect {
    pub fn new(options: &ConnectionOptions) -> Self {
        Self {
            timezone: options.timezone.clone().unwrap_or_else(|| "UTC".into()),
        }
    }
}

impl Default for PostgresDialect {
    fn default() -> Self {
        Self {
            timezone: "UTC".into(),
        }
    }
}

impl QueryDialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn env_timezone(&self) -> &str {
        &self.timezone
    }

    // boolean columns reject integer literals
    fn bool_literal(&self, b: bool) -> &'static str {
        if b {
            "TRUE"
        } else {
            "FALSE"
        }
    }

    fn tz_convert(&self, expr: &str, from_tz: &str, to_tz: &str) -> Option<String> {
        Some(format!(
            "({} AT TIME ZONE '{}' AT TIME ZONE '{}')",
            expr, from_tz, to_tz
        ))
    }

    fn geo_point_expr(&self, expr: &str) -> String {
        format!("(ST_Y({}) || ',' || ST_X({}))", expr, expr)
    }

    fn set_membership(&self, column_expr: &str, value: &str, negated: bool) -> Option<String> {
        let test = format!("{} = ANY(string_to_array({},','))", value, column_expr);
        Some(if negated {
            format!("NOT ({})", test)
        } else {
            test
        })
    }

    fn geo_literal(&self, lat: f64, lng: f64) -> Option<String> {
        Some(format!("ST_SetSRID(ST_MakePoint({},{}),4326)", lng, lat))
    }

    fn checksum_query(&self, schema: &str) -> Option<String> {
        Some(format!(
            "SELECT t.table_name, \
             md5(t.table_name || '|' || COALESCE(obj_description((quote_ident(t.table_schema) || '.' || quote_ident(t.table_name))::regclass),'')) AS table_checksum, \
             COALESCE((SELECT md5(string_agg(c.column_name || '|' || c.data_type || '|' || c.is_nullable || '|' || COALESCE(c.column_default,''), ';' ORDER BY c.ordinal_position)) \
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
            "SELECT c.table_name, c.column_name, c.data_type, \
             CASE WHEN c.is_nullable='YES' THEN 1 ELSE 0 END, c.column_default, \
             CASE WHEN tc.constraint_type='PRIMARY KEY' THEN 1 ELSE 0 END, \
             c.character_maximum_length, \
             col_description((quote_ident(c.table_schema) || '.' || quote_ident(c.table_name))::regclass, c.ordinal_position), \
             c.ordinal_position \
             FROM information_schema.columns c \
             LEFT JOIN information_schema.key_column_usage kcu \
             ON kcu.table_schema=c.table_schema AND kcu.table_name=c.table_name AND kcu.column_name=c.column_name \
             LEFT JOIN information_schema.table_constraints tc \
             ON tc.constraint_name=kcu.constraint_name AND tc.constraint_type='PRIMARY KEY' \
             WHERE c.table_schema='{}' AND c.table_name IN ({}) \
             ORDER BY c.table_name, c.ordinal_position",
            schema, list
        ))
    }

    fn relations_query(&self, schema: &str) -> Option<String> {
        Some(format!(
            "SELECT tc.constraint_name, ccu.table_name, ccu.column_name, \
             tc.table_name, kcu.column_name \
             FROM information_schema.table_constraints tc \
             JOIN information_schema.key_column_usage kcu ON kcu.constraint_name=tc.constraint_name \
             JOIN information_schema.constraint_column_usage ccu ON ccu.constraint_name=tc.constraint_name \
             WHERE tc.table_schema='{}' AND tc.constraint_type='FOREIGN KEY' \
             ORDER BY tc.constraint_name",
            schema
        ))
    }

    // information_schema records no DDL timestamps; callers get the epoch
    // sentinel
}
