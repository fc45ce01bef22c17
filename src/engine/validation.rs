// ==========================================
// 矿山生产排程系统 - 运行前校验
// ==========================================
// 职责: 致命性输入校验, 失败时运行不得开始
// 输出: 消息列表 (一次返回全部问题, 不短路)
// ==========================================

use crate::config::ScheduleRunConfig;
use crate::engine::schedule::ScheduleInputs;

/// 运行前校验
///
/// 返回非空消息列表即校验失败, 运行不启动 (结果 success=false)
pub fn validate_inputs(inputs: &ScheduleInputs, config: &ScheduleRunConfig) -> Vec<String> {
    let mut messages = Vec::new();

    if config.site_id.trim().is_empty() {
        messages.push("缺少矿场ID (site_id)".to_string());
    }
    if config.schedule_version_id.trim().is_empty() {
        messages.push("缺少排程版本ID (schedule_version_id)".to_string());
    }
    if inputs.version_published {
        messages.push(format!(
            "版本 {} 已发布, 不可重新排程",
            config.schedule_version_id
        ));
    }

    if inputs.calendar.periods.is_empty() {
        messages.push(format!("日历 {} 不含任何周期", inputs.calendar.calendar_id));
    } else if inputs
        .calendar
        .horizon(
            config.horizon_start_period_id.as_deref(),
            config.horizon_end_period_id.as_deref(),
        )
        .is_empty()
    {
        messages.push("排程窗口为空 (horizon 起止周期无效)".to_string());
    }

    if inputs.resources.is_empty() {
        messages.push("无可用资源".to_string());
    }
    for resource in &inputs.resources {
        if resource.base_rate_tpd <= 0.0 {
            messages.push(format!(
                "资源 {} 的基准速率必须为正 (base_rate_tpd={})",
                resource.resource_id, resource.base_rate_tpd
            ));
        }
        if !(0.0..=1.0).contains(&resource.min_rate_factor) {
            messages.push(format!(
                "资源 {} 的速率因子下限越界 (min_rate_factor={})",
                resource.resource_id, resource.min_rate_factor
            ));
        }
    }

    if inputs.areas.is_empty() {
        messages.push("无采区数据".to_string());
    }

    // 质量字段注册表校验 (配置层提供时)
    if let Some(registry) = &inputs.field_registry {
        for area in &inputs.areas {
            for slice in &area.slices {
                for field in registry.unknown_fields(&slice.quality) {
                    messages.push(format!(
                        "采区 {} 切片 {} 含未注册质量字段 {}",
                        area.area_id, slice.slice_index, field
                    ));
                }
            }
        }
        for objective in &inputs.network.objectives {
            if !registry.contains(&objective.field) {
                messages.push(format!(
                    "弧 {} 的质量目标引用未注册字段 {}",
                    objective.arc_id, objective.field
                ));
            }
        }
    }

    messages
}
