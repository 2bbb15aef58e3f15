use std::sync::Arc;

use fleet_domain::{entities::Target, repositories::TargetRepository};
use fleet_errors::FleetResult;
use tracing::{debug, instrument};

/// 按标签选择目标：返回标签集合包含全部给定标签的目标
pub struct TagResolver {
    target_repo: Arc<dyn TargetRepository>,
}

impl TagResolver {
    pub fn new(target_repo: Arc<dyn TargetRepository>) -> Self {
        Self { target_repo }
    }

    /// 空选择器返回空集合，不会退化为匹配全部目标
    #[instrument(skip(self), fields(tag_count = tag_ids.len()))]
    pub async fn resolve_targets(&self, tag_ids: &[i64]) -> FleetResult<Vec<Target>> {
        if tag_ids.is_empty() {
            debug!("标签选择器为空，不匹配任何目标");
            return Ok(Vec::new());
        }

        let targets = self.target_repo.find_with_all_tags(tag_ids).await?;
        debug!("标签 {:?} 匹配到 {} 个目标", tag_ids, targets.len());
        Ok(targets)
    }
}
