//! 表达式构建器
//!
//! 构建器按注册顺序组成责任链，第一个 `support` 返回 true 的构建器负责构建。
//! 默认顺序为：CRON语法、计算型（含 `#` 字段）、自然语言相对时间。

use std::sync::Arc;

use chrono::{
    DateTime, Datelike, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike,
    Utc, Weekday,
};
use chrono_tz::Tz;
use rand::Rng;
use tracing::debug;

use scheduler_core::{models::Expression, SchedulerError, SchedulerResult};

use crate::cron_utils::CronScheduler;

pub trait ExpressionBuilder: Send + Sync {
    fn support(&self, raw: &str) -> bool;

    fn build(&self, raw: &str, timezone: Tz) -> SchedulerResult<Expression>;

    fn name(&self) -> &str;
}

/// 构建器责任链
pub struct ExpressionBuilderChain {
    builders: Vec<Arc<dyn ExpressionBuilder>>,
}

impl ExpressionBuilderChain {
    pub fn new(builders: Vec<Arc<dyn ExpressionBuilder>>) -> Self {
        Self { builders }
    }

    pub fn with_default_builders() -> Self {
        Self::new(vec![
            Arc::new(CronExpressionBuilder),
            Arc::new(ComputedExpressionBuilder),
            Arc::new(FluentExpressionBuilder),
        ])
    }

    pub fn add_builder(&mut self, builder: Arc<dyn ExpressionBuilder>) {
        self.builders.push(builder);
    }

    pub fn build(&self, raw: &str, timezone: Tz) -> SchedulerResult<Expression> {
        if self.builders.is_empty() {
            return Err(SchedulerError::Runtime(
                "没有注册任何表达式构建器".to_string(),
            ));
        }

        let builder = self
            .builders
            .iter()
            .find(|builder| builder.support(raw))
            .ok_or_else(|| {
                SchedulerError::InvalidArgument(format!("表达式 \"{raw}\" 无法被任何构建器处理"))
            })?;

        debug!("使用 {} 构建器解析表达式: {}", builder.name(), raw);
        builder.build(raw, timezone)
    }
}

impl Default for ExpressionBuilderChain {
    fn default() -> Self {
        Self::with_default_builders()
    }
}

/// 标准CRON语法和宏
pub struct CronExpressionBuilder;

impl ExpressionBuilder for CronExpressionBuilder {
    fn support(&self, raw: &str) -> bool {
        CronScheduler::validate_cron_expression(raw).is_ok()
    }

    fn build(&self, raw: &str, _timezone: Tz) -> SchedulerResult<Expression> {
        CronScheduler::validate_cron_expression(raw)?;
        Expression::create(raw)
    }

    fn name(&self) -> &str {
        "cron"
    }
}

/// 计算型表达式，字段为 `#` 时随机取该字段范围内的一个值
///
/// 日字段只在 1-28 之间取值，保证每个月都会触发。
pub struct ComputedExpressionBuilder;

const COMPUTED_RANGES: [(u32, u32); 5] = [(0, 59), (0, 23), (1, 28), (1, 12), (0, 6)];

impl ExpressionBuilder for ComputedExpressionBuilder {
    fn support(&self, raw: &str) -> bool {
        let fields: Vec<&str> = raw.split_whitespace().collect();
        fields.len() == 5 && fields.contains(&"#")
    }

    fn build(&self, raw: &str, _timezone: Tz) -> SchedulerResult<Expression> {
        if !self.support(raw) {
            return Err(SchedulerError::InvalidArgument(format!(
                "表达式 \"{raw}\" 不是计算型表达式"
            )));
        }

        let mut rng = rand::rng();
        let computed = raw
            .split_whitespace()
            .zip(COMPUTED_RANGES)
            .map(|(field, (min, max))| {
                if field == "#" {
                    rng.random_range(min..=max).to_string()
                } else {
                    field.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(" ");

        CronScheduler::validate_cron_expression(&computed)?;
        debug!("计算型表达式 {} 计算结果为 {}", raw, computed);
        Expression::create(&computed)
    }

    fn name(&self) -> &str {
        "computed"
    }
}

/// 自然语言相对时间，固定到解析出的那一分钟
///
/// 支持 `now`、`today`、`midnight`、`noon`、`tomorrow`、`+N unit`、
/// `next <unit|weekday>`、`YYYY-MM-DD[ HH:MM[:SS]]`、`HH:MM` 和 RFC3339，
/// 前几种形式可以附带 `HH:MM` 指定时间。
pub struct FluentExpressionBuilder;

impl FluentExpressionBuilder {
    /// 相对于 `now` 解析时间描述
    pub fn resolve(raw: &str, timezone: Tz, now: DateTime<Utc>) -> Option<DateTime<Tz>> {
        let raw = raw.trim().to_lowercase();
        if raw.is_empty() {
            return None;
        }

        if let Ok(parsed) = DateTime::parse_from_rfc3339(&raw) {
            return Some(parsed.with_timezone(&timezone));
        }

        let local_now = now.with_timezone(&timezone);
        if let Some(resolved) = resolve_phrase(&raw, local_now) {
            return Some(resolved);
        }

        let (phrase, time) = raw.rsplit_once(' ')?;
        let time = parse_time(time)?;
        let base = resolve_phrase(phrase.trim(), local_now)?;
        at_local(timezone, base.date_naive().and_time(time))
    }

    pub fn build_at(raw: &str, timezone: Tz, now: DateTime<Utc>) -> SchedulerResult<Expression> {
        let resolved = Self::resolve(raw, timezone, now).ok_or_else(|| {
            SchedulerError::InvalidArgument(format!("无法解析时间描述 \"{raw}\""))
        })?;

        Expression::create(&format!(
            "{} {} {} {} *",
            resolved.minute(),
            resolved.hour(),
            resolved.day(),
            resolved.month()
        ))
    }
}

impl ExpressionBuilder for FluentExpressionBuilder {
    fn support(&self, raw: &str) -> bool {
        Self::resolve(raw, Tz::UTC, Utc::now()).is_some()
    }

    fn build(&self, raw: &str, timezone: Tz) -> SchedulerResult<Expression> {
        Self::build_at(raw, timezone, Utc::now())
    }

    fn name(&self) -> &str {
        "fluent"
    }
}

fn resolve_phrase(phrase: &str, now: DateTime<Tz>) -> Option<DateTime<Tz>> {
    let timezone = now.timezone();
    let today = now.date_naive();

    match phrase {
        "now" => return Some(now),
        "today" | "midnight" => return at_local(timezone, today.and_time(NaiveTime::MIN)),
        "noon" => return at_local(timezone, today.and_hms_opt(12, 0, 0)?),
        "tomorrow" => return at_local(timezone, today.succ_opt()?.and_time(NaiveTime::MIN)),
        _ => {}
    }

    if let Some(rest) = phrase.strip_prefix("next ") {
        let rest = rest.trim();
        if let Some(weekday) = parse_weekday(rest) {
            let mut date = today.succ_opt()?;
            while date.weekday() != weekday {
                date = date.succ_opt()?;
            }
            return at_local(timezone, date.and_time(NaiveTime::MIN));
        }
        return shift(now, 1, rest);
    }

    let rest = phrase.strip_prefix('+').unwrap_or(phrase);
    if let Some((amount, unit)) = rest.split_once(' ') {
        if let Ok(amount) = amount.trim().parse::<u32>() {
            return shift(now, amount, unit.trim());
        }
    }

    if let Ok(time) = parse_time_str(phrase) {
        return at_local(timezone, today.and_time(time));
    }

    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(phrase, format) {
            return at_local(timezone, parsed);
        }
    }

    NaiveDate::parse_from_str(phrase, "%Y-%m-%d")
        .ok()
        .and_then(|date| at_local(timezone, date.and_time(NaiveTime::MIN)))
}

fn shift(now: DateTime<Tz>, amount: u32, unit: &str) -> Option<DateTime<Tz>> {
    let amount_i64 = i64::from(amount);
    match unit.trim_end_matches('s') {
        "minute" | "min" => now.checked_add_signed(Duration::minutes(amount_i64)),
        "hour" => now.checked_add_signed(Duration::hours(amount_i64)),
        "day" => now.checked_add_signed(Duration::days(amount_i64)),
        "week" => now.checked_add_signed(Duration::weeks(amount_i64)),
        "month" => now.checked_add_months(Months::new(amount)),
        "year" => now.checked_add_months(Months::new(amount.checked_mul(12)?)),
        _ => None,
    }
}

fn parse_weekday(value: &str) -> Option<Weekday> {
    match value {
        "monday" | "mon" => Some(Weekday::Mon),
        "tuesday" | "tue" => Some(Weekday::Tue),
        "wednesday" | "wed" => Some(Weekday::Wed),
        "thursday" | "thu" => Some(Weekday::Thu),
        "friday" | "fri" => Some(Weekday::Fri),
        "saturday" | "sat" => Some(Weekday::Sat),
        "sunday" | "sun" => Some(Weekday::Sun),
        _ => None,
    }
}

fn parse_time(value: &str) -> Option<NaiveTime> {
    parse_time_str(value).ok()
}

fn parse_time_str(value: &str) -> Result<NaiveTime, chrono::ParseError> {
    NaiveTime::parse_from_str(value, "%H:%M:%S").or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
}

fn at_local(timezone: Tz, naive: NaiveDateTime) -> Option<DateTime<Tz>> {
    timezone.from_local_datetime(&naive).earliest()
}
