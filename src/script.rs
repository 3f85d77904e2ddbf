//! SQL and dot-command scripts fed to the sqlite3 shell.

pub const TABLE: &str = "map";

pub const INIT_SQL: &str = "CREATE TABLE IF NOT EXISTS map (k TEXT, v TEXT);\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Key,
    Value,
}

impl Column {
    pub fn name(&self) -> &'static str {
        match self {
            Column::Key => "k",
            Column::Value => "v",
        }
    }

    pub fn index_name(&self) -> &'static str {
        match self {
            Column::Key => "idx_k",
            Column::Value => "idx_v",
        }
    }
}

/// Session settings for bulk work: no journal, no fsync, a page cache of
/// `cache_size` pages and an exclusive lock on the file.
pub fn pragmas(cache_size: i64) -> String {
    format!(
        "PRAGMA journal_mode = OFF;\n\
         PRAGMA synchronous = 0;\n\
         PRAGMA cache_size = {};\n\
         PRAGMA locking_mode = EXCLUSIVE;\n",
        cache_size
    )
}

pub fn index_sql(column: Column, cache_size: i64) -> String {
    format!(
        "{}CREATE INDEX IF NOT EXISTS {} ON {}({});\n",
        pragmas(cache_size),
        column.index_name(),
        TABLE,
        column.name()
    )
}

/// Control script passed via `--init`: the batch itself arrives on stdin.
pub fn import_sql(cache_size: i64) -> String {
    format!(
        "{}PRAGMA temp_store = MEMORY;\n.mode tabs\n.import /dev/stdin {}\n",
        pragmas(cache_size),
        TABLE
    )
}
