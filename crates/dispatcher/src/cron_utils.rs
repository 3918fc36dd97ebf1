use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{DateTime, Duration, Timelike, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use tracing::{debug, warn};

use scheduler_core::{models::Expression, Result, SchedulerError};

const DAY_NAMES: [&str; 7] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

/// CRON表达式解析和调度工具
///
/// 接收5段式表达式（分 时 日 月 周）或宏，转换为 `cron` 库使用的
/// 带秒字段格式。周字段按标准CRON语义解释：0 和 7 都表示周日。
/// 日和周两个字段同时受限时，任一字段匹配即触发。
#[derive(Debug, Clone)]
pub struct CronScheduler {
    expression: String,
    /// `@reboot` 没有时间表；日和周同时受限时拆成两个时间表
    schedules: Vec<Schedule>,
}

impl CronScheduler {
    /// 创建新的CRON调度器
    pub fn new(cron_expr: &str) -> Result<Self> {
        let cron_expr = cron_expr.trim();
        let expression = Expression::create(cron_expr)?;
        if expression.is_reboot() {
            return Ok(Self {
                expression: cron_expr.to_string(),
                schedules: Vec::new(),
            });
        }

        let fields = Expression::expand_macro(cron_expr).unwrap_or(cron_expr);
        let schedules = to_cron_syntax(fields)?
            .iter()
            .map(|syntax| {
                Schedule::from_str(syntax)
                    .map_err(|e| SchedulerError::invalid_expression(cron_expr, e.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            expression: cron_expr.to_string(),
            schedules,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn is_reboot(&self) -> bool {
        self.schedules.is_empty()
    }

    /// 检查表达式是否匹配给定时刻所在的那一分钟（按指定时区）
    pub fn is_due(&self, at: DateTime<Utc>, timezone: Tz) -> bool {
        if self.schedules.is_empty() {
            return false;
        }

        let local = at.with_timezone(&timezone);
        let Some(minute_start) = local.with_second(0).and_then(|time| time.with_nanosecond(0))
        else {
            warn!("无法截断时间到分钟: {}", local);
            return false;
        };

        let before = minute_start - Duration::seconds(1);
        let due = self.schedules.iter().any(|schedule| {
            schedule
                .after(&before)
                .next()
                .is_some_and(|next| next == minute_start)
        });

        if due {
            debug!(
                "表达式 {} 在 {} ({}) 到期",
                self.expression,
                minute_start.format("%Y-%m-%d %H:%M"),
                timezone
            );
        }
        due
    }

    /// 获取下一次执行时间
    pub fn next_execution_time(&self, from: DateTime<Utc>, timezone: Tz) -> Option<DateTime<Utc>> {
        self.upcoming_times(from, timezone, 1).into_iter().next()
    }

    /// 获取从指定时间开始的多个执行时间
    pub fn upcoming_times(&self, from: DateTime<Utc>, timezone: Tz, count: usize) -> Vec<DateTime<Utc>> {
        let local = from.with_timezone(&timezone);
        let local = &local;
        let times: BTreeSet<DateTime<Utc>> = self
            .schedules
            .iter()
            .flat_map(move |schedule| {
                schedule
                    .after(local)
                    .take(count)
                    .map(|next| next.with_timezone(&Utc))
            })
            .collect();

        times.into_iter().take(count).collect()
    }

    /// 验证CRON表达式是否有效
    pub fn validate_cron_expression(cron_expr: &str) -> Result<()> {
        Self::new(cron_expr).map(|_| ())
    }
}

/// 把5段式表达式转换为 `cron` 库的6段式（补秒字段，周字段换成英文缩写）
///
/// `cron` 库要求日和周同时匹配，两者都受限时拆成只限制日和只限制周的两个表达式。
fn to_cron_syntax(expression: &str) -> Result<Vec<String>> {
    let fields: Vec<&str> = expression.split_whitespace().collect();
    if fields.len() != 5 {
        return Err(SchedulerError::invalid_expression(
            expression,
            format!("需要5个字段，实际为{}个", fields.len()),
        ));
    }

    let day_of_week = translate_day_of_week(fields[4])
        .map_err(|message| SchedulerError::invalid_expression(expression, message))?;
    let day_of_month = fields[2];

    let syntax = |day_of_month: &str, day_of_week: &str| {
        format!(
            "0 {} {} {} {} {}",
            fields[0], fields[1], day_of_month, fields[3], day_of_week
        )
    };

    if is_unrestricted(day_of_month) || is_unrestricted(fields[4]) {
        return Ok(vec![syntax(day_of_month, &day_of_week)]);
    }

    Ok(vec![syntax(day_of_month, "*"), syntax("*", &day_of_week)])
}

fn is_unrestricted(field: &str) -> bool {
    field == "*" || field == "?"
}

fn translate_day_of_week(field: &str) -> std::result::Result<String, String> {
    if is_unrestricted(field) {
        return Ok("*".to_string());
    }

    let mut days = BTreeSet::new();
    for token in field.split(',') {
        let (base, step) = match token.split_once('/') {
            Some((base, step)) => {
                let step: u32 = step
                    .parse()
                    .map_err(|_| format!("无效的步长: {token}"))?;
                if step == 0 {
                    return Err(format!("步长不能为0: {token}"));
                }
                (base, Some(step))
            }
            None => (token, None),
        };

        let (start, end) = if base == "*" {
            (0, 6)
        } else if let Some((start, end)) = base.split_once('-') {
            (parse_day(start)?, parse_day(end)?)
        } else {
            let day = parse_day(base)?;
            if step.is_some() {
                (day, 6)
            } else {
                (day, day)
            }
        };

        if start > end {
            return Err(format!("无效的周范围: {token}"));
        }

        let step = step.unwrap_or(1) as usize;
        for day in (start..=end).step_by(step) {
            days.insert(day % 7);
        }
    }

    if days.len() == 7 {
        return Ok("*".to_string());
    }

    Ok(days
        .into_iter()
        .map(|day| DAY_NAMES[day as usize])
        .collect::<Vec<_>>()
        .join(","))
}

fn parse_day(value: &str) -> std::result::Result<u32, String> {
    if let Ok(day) = value.parse::<u32>() {
        if day <= 7 {
            return Ok(day);
        }
        return Err(format!("周字段取值超出范围: {value}"));
    }

    DAY_NAMES
        .iter()
        .position(|name| name.eq_ignore_ascii_case(value))
        .map(|position| position as u32)
        .ok_or_else(|| format!("无法识别的周字段: {value}"))
}
