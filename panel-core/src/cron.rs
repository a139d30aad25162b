//! 定时表达式的校验与求值
//!
//! 五个字段按固定顺序拼接为表达式，调度引擎只接受这个顺序：
//! ```text
//! ┌───────────── minute (0-59)
//! │ ┌───────────── hour (0-23)
//! │ │ ┌───────────── day_of_month (1-31)
//! │ │ │ ┌───────────── month (1-12)
//! │ │ │ │ ┌───────────── day_of_week (0-6, 0 = 周日)
//! │ │ │ │ │
//! * * * * *
//! ```

use crate::constants::scheduler::MAX_SEARCH_YEARS;
use crate::error::{PanelError, Result};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// 定时表达式字段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CronField {
    Minute,
    Hour,
    DayOfMonth,
    Month,
    DayOfWeek,
}

impl CronField {
    /// 表达式中的字段顺序
    pub const ORDERED: [CronField; 5] = [
        CronField::Minute,
        CronField::Hour,
        CronField::DayOfMonth,
        CronField::Month,
        CronField::DayOfWeek,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CronField::Minute => "minute",
            CronField::Hour => "hour",
            CronField::DayOfMonth => "day_of_month",
            CronField::Month => "month",
            CronField::DayOfWeek => "day_of_week",
        }
    }

    /// 字段允许的取值范围（闭区间）
    pub fn bounds(&self) -> (u32, u32) {
        match self {
            CronField::Minute => (0, 59),
            CronField::Hour => (0, 23),
            CronField::DayOfMonth => (1, 31),
            CronField::Month => (1, 12),
            CronField::DayOfWeek => (0, 6),
        }
    }
}

impl fmt::Display for CronField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CronField {
    type Err = PanelError;

    fn from_str(s: &str) -> Result<Self> {
        CronField::ORDERED
            .into_iter()
            .find(|field| field.name() == s)
            .ok_or_else(|| PanelError::validation(format!("未知的定时字段: {s}")))
    }
}

fn invalid(field: CronField, value: &str, reason: impl Into<String>) -> PanelError {
    PanelError::InvalidCronField {
        field: field.name().to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

/// 按字段名校验单个定时字段
pub fn validate_field(field_name: &str, value: &str) -> Result<()> {
    let field = field_name.parse::<CronField>()?;
    validate(field, value)
}

/// 校验单个定时字段
///
/// 接受 `*`、`*/n`（n >= 1）、逗号分隔的单值列表、`a-b`（a < b）以及单个整数。
pub fn validate(field: CronField, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(invalid(field, value, "不能为空"));
    }

    if value == "*" {
        return Ok(());
    }

    if let Some(step) = value.strip_prefix("*/") {
        return match step.parse::<u32>() {
            Ok(n) if n >= 1 => Ok(()),
            _ => Err(invalid(field, value, "步长必须是大于等于 1 的整数")),
        };
    }

    if value.contains(',') {
        for part in value.split(',') {
            validate_single(field, value, part.trim())?;
        }
        return Ok(());
    }

    if value.contains('-') {
        let parts: Vec<&str> = value.split('-').collect();
        if parts.len() != 2 {
            return Err(invalid(field, value, "范围格式应为 a-b"));
        }
        let start = parts[0].trim().parse::<u32>();
        let end = parts[1].trim().parse::<u32>();
        let (start, end) = match (start, end) {
            (Ok(start), Ok(end)) if start < end => (start, end),
            _ => return Err(invalid(field, value, "范围起点必须小于终点")),
        };
        check_bounds(field, value, start)?;
        return check_bounds(field, value, end);
    }

    validate_single(field, value, value)
}

fn validate_single(field: CronField, value: &str, part: &str) -> Result<()> {
    let num = part
        .parse::<u32>()
        .map_err(|_| invalid(field, value, format!("'{part}' 不是有效的数字")))?;
    check_bounds(field, value, num)
}

fn check_bounds(field: CronField, value: &str, num: u32) -> Result<()> {
    let (min, max) = field.bounds();
    if num < min || num > max {
        return Err(invalid(field, value, format!("取值必须在 {min}-{max} 之间")));
    }
    Ok(())
}

/// 五个定时字段
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CronSpec {
    pub minute: String,
    pub hour: String,
    pub day_of_month: String,
    pub month: String,
    pub day_of_week: String,
}

impl Default for CronSpec {
    fn default() -> Self {
        Self {
            minute: "*".to_string(),
            hour: "*".to_string(),
            day_of_month: "*".to_string(),
            month: "*".to_string(),
            day_of_week: "*".to_string(),
        }
    }
}

impl CronSpec {
    pub fn value(&self, field: CronField) -> &str {
        match field {
            CronField::Minute => &self.minute,
            CronField::Hour => &self.hour,
            CronField::DayOfMonth => &self.day_of_month,
            CronField::Month => &self.month,
            CronField::DayOfWeek => &self.day_of_week,
        }
    }

    /// 校验全部字段
    pub fn validate(&self) -> Result<()> {
        for field in CronField::ORDERED {
            validate(field, self.value(field))?;
        }
        Ok(())
    }

    /// 按 minute hour day_of_month month day_of_week 顺序拼接表达式
    ///
    /// 字段内部的空白（如 `1, 15`）会被去掉，避免破坏字段分隔。
    pub fn expression(&self) -> String {
        CronField::ORDERED
            .iter()
            .map(|field| self.value(*field).split_whitespace().collect::<String>())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// 单个字段展开后的取值集合
#[derive(Debug, Clone, PartialEq, Eq)]
struct FieldSet {
    values: BTreeSet<u32>,
    any: bool,
}

impl FieldSet {
    fn parse(field: CronField, expr: &str) -> Result<Self> {
        let (min, max) = field.bounds();
        let mut values = BTreeSet::new();

        for part in expr.split(',') {
            let part = part.trim();
            let (range_part, step) = match part.split_once('/') {
                Some((range, step)) => {
                    let step = step
                        .parse::<u32>()
                        .ok()
                        .filter(|s| *s >= 1)
                        .ok_or_else(|| invalid(field, expr, "步长必须是大于等于 1 的整数"))?;
                    (range, step)
                }
                None => (part, 1),
            };

            let (start, end) = if range_part == "*" {
                (min, max)
            } else if let Some((a, b)) = range_part.split_once('-') {
                let a = a
                    .trim()
                    .parse::<u32>()
                    .map_err(|_| invalid(field, expr, "范围起点无效"))?;
                let b = b
                    .trim()
                    .parse::<u32>()
                    .map_err(|_| invalid(field, expr, "范围终点无效"))?;
                if a > b {
                    return Err(invalid(field, expr, "范围起点大于终点"));
                }
                (a, b)
            } else {
                let v = range_part
                    .parse::<u32>()
                    .map_err(|_| invalid(field, expr, format!("'{range_part}' 不是有效的数字")))?;
                // 单值带步长时从该值一直展开到上界
                if step > 1 { (v, max) } else { (v, v) }
            };

            if start < min || end > max {
                return Err(invalid(field, expr, format!("取值必须在 {min}-{max} 之间")));
            }

            values.extend((start..=end).step_by(step as usize));
        }

        Ok(Self {
            values,
            any: expr.trim() == "*",
        })
    }

    fn contains(&self, value: u32) -> bool {
        self.values.contains(&value)
    }
}

/// 解析后的定时表达式
#[derive(Debug, Clone)]
pub struct CronExpr {
    expr: String,
    minute: FieldSet,
    hour: FieldSet,
    day_of_month: FieldSet,
    month: FieldSet,
    day_of_week: FieldSet,
}

impl CronExpr {
    /// 解析五段式表达式
    pub fn parse(expr: &str) -> Result<Self> {
        let parts: Vec<&str> = expr.split_whitespace().collect();
        if parts.len() != 5 {
            return Err(PanelError::validation(format!(
                "定时表达式需要 5 个字段，实际为 {}: '{expr}'",
                parts.len()
            )));
        }

        Ok(Self {
            expr: parts.join(" "),
            minute: FieldSet::parse(CronField::Minute, parts[0])?,
            hour: FieldSet::parse(CronField::Hour, parts[1])?,
            day_of_month: FieldSet::parse(CronField::DayOfMonth, parts[2])?,
            month: FieldSet::parse(CronField::Month, parts[3])?,
            day_of_week: FieldSet::parse(CronField::DayOfWeek, parts[4])?,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.expr
    }

    /// 日期是否匹配
    ///
    /// day_of_month 与 day_of_week 同时受限时取并集，任一为 `*` 时取交集。
    fn matches_day(&self, date: NaiveDate) -> bool {
        let dom = self.day_of_month.contains(date.day());
        let dow = self
            .day_of_week
            .contains(date.weekday().num_days_from_sunday());

        if self.day_of_month.any || self.day_of_week.any {
            dom && dow
        } else {
            dom || dow
        }
    }

    /// 给定时间是否匹配（精确到分钟）
    pub fn matches(&self, time: NaiveDateTime) -> bool {
        self.month.contains(time.month())
            && self.matches_day(time.date())
            && self.hour.contains(time.hour())
            && self.minute.contains(time.minute())
    }

    /// 计算严格晚于 `after` 的下一个触发时间
    pub fn next_after(&self, after: NaiveDateTime) -> Option<NaiveDateTime> {
        let mut t = after
            .with_second(0)
            .and_then(|t| t.with_nanosecond(0))?
            + Duration::minutes(1);
        let limit_year = after.year() + MAX_SEARCH_YEARS;

        while t.year() <= limit_year {
            if !self.month.contains(t.month()) {
                let (year, month) = if t.month() == 12 {
                    (t.year() + 1, 1)
                } else {
                    (t.year(), t.month() + 1)
                };
                t = NaiveDate::from_ymd_opt(year, month, 1)?.and_time(NaiveTime::MIN);
                continue;
            }

            if !self.matches_day(t.date()) {
                t = t.date().succ_opt()?.and_time(NaiveTime::MIN);
                continue;
            }

            if !self.hour.contains(t.hour()) {
                t = t.with_minute(0)? + Duration::hours(1);
                continue;
            }

            if !self.minute.contains(t.minute()) {
                t += Duration::minutes(1);
                continue;
            }

            return Some(t);
        }

        None
    }
}

impl FromStr for CronExpr {
    type Err = PanelError;

    fn from_str(s: &str) -> Result<Self> {
        CronExpr::parse(s)
    }
}

impl fmt::Display for CronExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expr)
    }
}
