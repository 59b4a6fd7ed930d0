//! SQL Server dialect

use crate::descriptor::ConnectionOptions;

use super::QueryDialect;

pub struct MsSqlDialect {
    timezone: String,
}

impl MsSqlDialect {
    pub fn new(options: &ConnectionOptions) -> Self {
        Self {
            timezone: options.timezone.clone().unwrap_or_else(|| "UTC".into()),
        }
    }
}

impl Default for MsSqlDialect {
    fn default() -> Self {
        Self {
            timezone: "UTC".into(),
        }
    }
}

impl QueryDialect for MsSqlDialect {
    fn name(&self) -> &'static str {
        "mssql"
    }

    fn env_timezone(&self) -> &str {
        &self.timezone
    }

    fn length_fn(&self) -> &'static str {
        "len"
    }

    fn tz_convert(&self, expr: &str, from_tz: &str, to_tz: &str) -> Option<String> {
        Some(format!(
            "({} AT TIME ZONE '{}' AT TIME ZONE '{}')",
            expr, from_tz, to_tz
        ))
    }

    fn geo_point_expr(&self, expr: &str) -> String {
        format!("CONCAT({}.Lat,',',{}.Long)", expr, expr)
    }

    fn geo_literal(&self, lat: f64, lng: f64) -> Option<String> {
        Some(format!("geography::Point({},{},4326)", lat, lng))
    }

    /// OFFSET/FETCH row limiting; an offset is always emitted because FETCH
    /// requires one
    fn limit_clause(&self, limit: Option<u64>, offset: u64) -> String {
        match limit {
            Some(n) => format!(" OFFSET {} ROWS FETCH NEXT {} ROWS ONLY", offset, n),
            None => String::new(),
        }
    }

    fn savepoint_stmt(&self, name: &str) -> String {
        format!("SAVE TRANSACTION {}", name)
    }

    // SQL Server has no savepoint release
    fn release_savepoint_stmt(&self, _name: &str) -> Option<String> {
        None
    }

    fn rollback_to_stmt(&self, name: &str) -> String {
        format!("ROLLBACK TRANSACTION {}", name)
    }

    fn checksum_query(&self, schema: &str) -> Option<String> {
        Some(format!(
            "SELECT t.name, \
             CONVERT(VARCHAR(64),HASHBYTES('SHA2_256',t.name + '|' + ISNULL(CAST(ep.value AS NVARCHAR(256)),'')),2) AS table_checksum, \
             CONVERT(VARCHAR(64),HASHBYTES('SHA2_256',( \
             SELECT STRING_AGG(c.name + '|' + ty.name + '|' + CAST(c.is_nullable AS VARCHAR(1)) + '|' + CAST(c.max_length AS VARCHAR(8)),';') \
             WITHIN GROUP (ORDER BY c.column_id) \
             FROM sys.columns c JOIN sys.types ty ON ty.user_type_id=c.user_type_id \
             WHERE c.object_id=t.object_id)),2) AS fields_checksum, \
             NULL AS synonym_of \
             FROM sys.tables t \
             LEFT JOIN sys.extended_properties ep ON ep.major_id=t.object_id AND ep.minor_id=0 AND ep.name='MS_Description' \
             WHERE SCHEMA_NAME(t.schema_id)='{}' \
             UNION ALL \
             SELECT sn.name, NULL, NULL, OBJECT_NAME(OBJECT_ID(sn.base_object_name)) \
             FROM sys.synonyms sn \
             WHERE SCHEMA_NAME(sn.schema_id)='{}' \
             ORDER BY 1",
            schema, schema
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
            "SELECT t.name, c.name, ty.name, c.is_nullable, \
             OBJECT_DEFINITION(c.default_object_id), \
             CASE WHEN ic.column_id IS NULL THEN 0 ELSE 1 END, \
             c.max_length, CAST(ep.value AS NVARCHAR(256)), c.column_id \
             FROM sys.tables t \
             JOIN sys.columns c ON c.object_id=t.object_id \
             JOIN sys.types ty ON ty.user_type_id=c.user_type_id \
             LEFT JOIN sys.indexes pk ON pk.object_id=t.object_id AND pk.is_primary_key=1 \
             LEFT JOIN sys.index_columns ic ON ic.object_id=t.object_id AND ic.index_id=pk.index_id AND ic.column_id=c.column_id \
             LEFT JOIN sys.extended_properties ep ON ep.major_id=t.object_id AND ep.minor_id=c.column_id AND ep.name='MS_Description' \
             WHERE SCHEMA_NAME(t.schema_id)='{}' AND t.name IN ({}) \
             ORDER BY t.name, c.column_id",
            schema, list
        ))
    }

    fn relations_query(&self, schema: &str) -> Option<String> {
        Some(format!(
            "SELECT fk.name, OBJECT_NAME(fkc.referenced_object_id), \
             COL_NAME(fkc.referenced_object_id,fkc.referenced_column_id), \
             OBJECT_NAME(fkc.parent_object_id), \
             COL_NAME(fkc.parent_object_id,fkc.parent_column_id) \
             FROM sys.foreign_keys fk \
             JOIN sys.foreign_key_columns fkc ON fkc.constraint_object_id=fk.object_id \
             WHERE SCHEMA_NAME(fk.schema_id)='{}' \
             ORDER BY fk.name",
            schema
        ))
    }

    fn last_changed_query(&self, schema: &str, table: Option<&str>) -> Option<String> {
        let table_clause = table
            .map(|t| format!(" AND o.name={}", self.quote_str(t)))
            .unwrap_or_default();
        Some(format!(
            "SELECT CONVERT(VARCHAR(19),MAX(o.modify_date),120) \
             FROM sys.objects o \
             WHERE o.type='U' AND SCHEMA_NAME(o.schema_id)='{}'{}",
            schema, table_clause
        ))
    }
}
