use crate::value_objects::ClaimTasksRequest;

/// 目标查询的公共列，`tag_ids` 为逗号分隔的标签ID
pub const TARGET_SELECT: &str = "SELECT t.id, t.name, t.primary_ip, t.hostname, t.machine_uuid, t.primary_mac, t.public_ip, t.created_at, \
(SELECT group_concat(tt.tag_id) FROM target_tags tt WHERE tt.target_id = t.id) AS tag_ids \
FROM targets t";

/// 构建目标相关的动态查询
///
/// 标签选择器被折叠为一组 `EXISTS` 谓词的 AND，每个谓词命中
/// `target_tags` 主键索引，整个选择在一条查询内完成。
pub struct TargetQueryBuilder;

impl TargetQueryBuilder {
    /// 空选择器返回 `None`，调用方应直接得到空集合而不是全部目标
    pub fn build_all_tags_query(tag_ids: &[i64]) -> Option<(String, Vec<TargetQueryParam>)> {
        let mut ids = tag_ids.to_vec();
        ids.sort_unstable();
        ids.dedup();
        if ids.is_empty() {
            return None;
        }

        let predicates = ids
            .iter()
            .map(|_| {
                "EXISTS (SELECT 1 FROM target_tags h WHERE h.target_id = t.id AND h.tag_id = ?)"
            })
            .collect::<Vec<_>>()
            .join(" AND ");

        let query = format!("{TARGET_SELECT} WHERE {predicates} ORDER BY t.id");
        let params = ids.into_iter().map(TargetQueryParam::Int64).collect();
        Some((query, params))
    }

    /// 按主机属性过滤；空过滤器返回 `None`
    pub fn build_host_query(filter: &ClaimTasksRequest) -> Option<(String, Vec<TargetQueryParam>)> {
        let columns = [
            ("t.machine_uuid", &filter.machine_uuid),
            ("t.primary_mac", &filter.primary_mac),
            ("t.hostname", &filter.hostname),
            ("t.primary_ip", &filter.primary_ip),
        ];

        let mut clauses = Vec::new();
        let mut params = Vec::new();
        for (column, value) in columns {
            if let Some(value) = value {
                clauses.push(format!("{column} = ?"));
                params.push(TargetQueryParam::String(value.clone()));
            }
        }

        if clauses.is_empty() {
            return None;
        }

        let query = format!("{TARGET_SELECT} WHERE {} ORDER BY t.id", clauses.join(" AND "));
        Some((query, params))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetQueryParam {
    Int64(i64),
    String(String),
}
