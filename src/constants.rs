// Constants module for shared string and tuning constants

pub const CONFIG_FILE: &str = "bucketrc.yml";
pub const CONFIG_HOME_DIR: &str = ".bucket";

pub const DATABASE_FILE: &str = "bucket.db";
pub const SUMFILE_FILE: &str = "bucket.sum";
pub const SUMFILE_HEADER: &str = "# bucket local plugin database";

/// Value of the `sumdb` option selecting the flat-file cache
pub const SUMDB_FILE: &str = "file";
/// Value of the `sumdb` option selecting the SQLite cache (default)
pub const SUMDB_SQLITE: &str = "sqlite";

pub const PLUGINS_DIR: &str = "plugins";

/// Minimum comparison index for a candidate to be accepted as a match.
///
/// Tuned by hand, not derived. Overridable with the `threshold` option.
pub const SIMILARITY_THRESHOLD: f64 = 0.51;

/// Cost of a case-only edit relative to a full substitution.
///
/// Tuned by hand, not derived. Overridable with the `case-weight` option.
pub const CASE_MISMATCH_WEIGHT: f64 = 0.8;

/// Relative length difference above which the sliding comparison is used
pub const SHIFT_LENGTH_RATIO: f64 = 0.7;
