use fleet_errors::{FleetError, FleetResult};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

/// 行映射的共用工具
pub struct MappingHelpers;

impl MappingHelpers {
    /// 解析 `group_concat` 得到的逗号分隔ID列表，结果升序
    pub fn parse_id_list(row: &SqliteRow, field_name: &str) -> FleetResult<Vec<i64>> {
        let raw: Option<String> = row.try_get(field_name)?;
        let mut ids = match raw {
            Some(raw) if !raw.is_empty() => raw
                .split(',')
                .map(|part| {
                    part.trim().parse::<i64>().map_err(|e| {
                        FleetError::Internal(format!("解析 {field_name} 失败: {part}: {e}"))
                    })
                })
                .collect::<FleetResult<Vec<i64>>>()?,
            _ => Vec::new(),
        };
        ids.sort_unstable();
        Ok(ids)
    }

    /// 生成 `?, ?, ?` 占位符
    pub fn placeholders(count: usize) -> String {
        vec!["?"; count].join(", ")
    }

    pub fn dedup_ids(ids: &[i64]) -> Vec<i64> {
        let mut ids = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}
