//! SQLite dialect
//!
//! SQLite has no timezone support and no set functions; schema checksums are
//! computed client-side by the catalog (see `catalog`), so the introspection
//! SQL hooks stay unimplemented here.

use crate::descriptor::ConnectionOptions;

use super::QueryDialect;

pub struct SqliteDialect {
    timezone: String,
}

impl SqliteDialect {
    pub fn new(options: &ConnectionOptions) -> Self {
        Self {
            timezone: options.timezone.clone().unwrap_or_else(|| "UTC".into()),
        }
    }
}

impl Default for SqliteDialect {
    fn default() -> Self {
        Self {
            timezone: "UTC".into(),
        }
    }
}

impl QueryDialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn env_timezone(&self) -> &str {
        &self.timezone
    }

    fn time_truncate(&self, expr: &str) -> String {
        format!("time({})", expr)
    }

    // geo points are stored as "lat,lng" text; nothing to unwrap
    fn geo_literal(&self, lat: f64, lng: f64) -> Option<String> {
        Some(self.quote_str(&format!("{},{}", lat, lng)))
    }
}
