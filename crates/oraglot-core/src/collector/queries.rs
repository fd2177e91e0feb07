//! SQL texts for the Oracle dynamic performance views.

/// Physical I/O per instance from `gv$filestat`.
pub(crate) const READ_WRITE_QUERY: &str = r#"
    SELECT
        INST_ID,
        SUM(PHYRDS) AS "PhysicalReads",
        SUM(PHYWRTS) AS "PhysicalWrites",
        SUM(PHYBLKRD) AS "PhysicalBlockReads",
        SUM(PHYBLKWRT) AS "PhysicalBlockWrites",
        SUM(READTIM) AS "ReadTime",
        SUM(WRITETIM) AS "WriteTime"
    FROM gv$filestat
    GROUP BY INST_ID
"#;

/// PGA memory statistics, one row per statistic and instance.
pub(crate) const PGA_QUERY: &str = r#"
    SELECT INST_ID, NAME, VALUE
    FROM gv$pgastat
"#;

/// System metrics from the long-duration (60 s) group only, so each metric
/// appears once per instance.
pub(crate) const SYSMETRIC_QUERY: &str = r#"
    SELECT INST_ID, METRIC_NAME, VALUE
    FROM gv$sysmetric
    WHERE GROUP_ID = 2
"#;

/// Space usage per tablespace from `DBA_DATA_FILES`. A zero-size tablespace
/// reports 0 % used instead of `NULL`, so its other columns are kept.
pub(crate) const TABLESPACE_QUERY: &str = r#"
    SELECT
        TABLESPACE_NAME,
        SUM(BYTES) AS "USED",
        MAX(CASE WHEN STATUS = 'OFFLINE' THEN 1 ELSE 0 END) AS "OFFLINE",
        SUM(GREATEST(MAXBYTES, BYTES)) AS "SIZE",
        COALESCE(SUM(BYTES) / NULLIF(SUM(GREATEST(MAXBYTES, BYTES)), 0) * 100, 0) AS "USED_PERCENT"
    FROM DBA_DATA_FILES
    GROUP BY TABLESPACE_NAME
"#;

/// Initialization parameters per instance, reported as inventory.
pub(crate) const PARAMETER_QUERY: &str = r#"
    SELECT INST_ID, NAME, VALUE
    FROM gv$parameter
"#;
