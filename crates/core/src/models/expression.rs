use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{errors::SchedulerError, Result};

/// 没有显式表达式时使用的默认值：每分钟执行
pub const DEFAULT_EXPRESSION: &str = "* * * * *";

/// 进程启动时仅执行一次的哨兵宏
pub const REBOOT_MACRO: &str = "@reboot";

const MINUTE: usize = 0;
const HOUR: usize = 1;
const DAY_OF_MONTH: usize = 2;
const MONTH: usize = 3;
const DAY_OF_WEEK: usize = 4;

/// 支持的宏及其展开后的标准5段式表达式，`@reboot` 没有字段形式
const MACROS: [(&str, Option<&str>); 6] = [
    ("@annually", Some("0 0 1 1 *")),
    ("@yearly", Some("0 0 1 1 *")),
    ("@monthly", Some("0 0 1 * *")),
    ("@weekly", Some("0 0 * * 0")),
    ("@daily", Some("0 0 * * *")),
    (REBOOT_MACRO, None),
];

/// CRON表达式值对象
///
/// 保存5段式的CRON字符串（分 时 日 月 周）或一个受支持的宏。
/// 本层只校验宏是否存在，字段合法性由表达式构建器负责。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Expression {
    expression: String,
}

impl Expression {
    pub fn new() -> Self {
        Self {
            expression: DEFAULT_EXPRESSION.to_string(),
        }
    }

    /// 从原始字符串创建表达式
    pub fn create(raw: &str) -> Result<Self> {
        let mut expression = Self::new();
        expression.set_expression(raw)?;

        Ok(expression)
    }

    /// 设置表达式，宏会被原样保存
    pub fn set_expression(&mut self, raw: &str) -> Result<&mut Self> {
        let raw = raw.trim();
        if raw.starts_with('@') && !Self::is_supported_macro(raw) {
            return Err(SchedulerError::invalid_expression(
                raw,
                format!("不支持的宏 \"{raw}\""),
            ));
        }

        self.expression = raw.to_string();
        Ok(self)
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn is_macro(&self) -> bool {
        self.expression.starts_with('@')
    }

    pub fn is_reboot(&self) -> bool {
        self.expression == REBOOT_MACRO
    }

    pub fn is_supported_macro(raw: &str) -> bool {
        MACROS.iter().any(|(name, _)| *name == raw)
    }

    /// 宏对应的标准表达式，`@reboot` 和未知宏返回 `None`
    pub fn expand_macro(raw: &str) -> Option<&'static str> {
        MACROS
            .iter()
            .find(|(name, _)| *name == raw)
            .and_then(|(_, expanded)| *expanded)
    }

    pub fn every_specific_minutes(&mut self, minutes: &str) -> Result<&mut Self> {
        self.change_position(MINUTE, minutes)
    }

    pub fn every_specific_hours(&mut self, hours: &str) -> Result<&mut Self> {
        self.change_position(HOUR, hours)
    }

    pub fn every_specific_days(&mut self, days: &str) -> Result<&mut Self> {
        self.change_position(DAY_OF_MONTH, days)
    }

    pub fn every_specific_months(&mut self, months: &str) -> Result<&mut Self> {
        self.change_position(MONTH, months)
    }

    pub fn every_specific_days_of_week(&mut self, days: &str) -> Result<&mut Self> {
        self.change_position(DAY_OF_WEEK, days)
    }

    pub fn every_five_minutes(&mut self) -> Result<&mut Self> {
        self.change_position(MINUTE, "*/5")
    }

    pub fn every_ten_minutes(&mut self) -> Result<&mut Self> {
        self.change_position(MINUTE, "*/10")
    }

    pub fn every_fifteen_minutes(&mut self) -> Result<&mut Self> {
        self.change_position(MINUTE, "*/15")
    }

    pub fn every_twenty_minutes(&mut self) -> Result<&mut Self> {
        self.change_position(MINUTE, "*/20")
    }

    pub fn every_twenty_five_minutes(&mut self) -> Result<&mut Self> {
        self.change_position(MINUTE, "*/25")
    }

    pub fn every_thirty_minutes(&mut self) -> Result<&mut Self> {
        self.change_position(MINUTE, "*/30")
    }

    pub fn every_hours(&mut self) -> Result<&mut Self> {
        self.change_position(MINUTE, "0")
    }

    pub fn every_days(&mut self) -> Result<&mut Self> {
        self.set_expanded("@daily")
    }

    pub fn every_weeks(&mut self) -> Result<&mut Self> {
        self.set_expanded("@weekly")
    }

    pub fn every_months(&mut self) -> Result<&mut Self> {
        self.set_expanded("@monthly")
    }

    pub fn every_years(&mut self) -> Result<&mut Self> {
        self.set_expanded("@yearly")
    }

    /// 固定执行时间，格式为 `H:M`，只给出小时时分钟取0
    pub fn at(&mut self, time: &str) -> Result<&mut Self> {
        let parts: Vec<&str> = time.trim().split(':').collect();
        let hour = parts[0].trim();
        let minute = match parts.get(1) {
            Some(minute) if parts.len() == 2 => minute.trim(),
            Some(_) => {
                return Err(SchedulerError::InvalidArgument(format!(
                    "无效的时间格式: {time}"
                )))
            }
            None => "0",
        };

        for (value, max) in [(hour, 23u32), (minute, 59u32)] {
            match value.parse::<u32>() {
                Ok(parsed) if parsed <= max => {}
                _ => {
                    return Err(SchedulerError::InvalidArgument(format!(
                        "无效的时间格式: {time}"
                    )))
                }
            }
        }

        self.change_position(MINUTE, minute)?;
        self.change_position(HOUR, hour)
    }

    fn set_expanded(&mut self, name: &str) -> Result<&mut Self> {
        let expanded = Self::expand_macro(name).ok_or_else(|| {
            SchedulerError::invalid_expression(name, format!("不支持的宏 \"{name}\""))
        })?;
        self.expression = expanded.to_string();
        Ok(self)
    }

    fn change_position(&mut self, position: usize, value: &str) -> Result<&mut Self> {
        if self.is_macro() {
            let expanded = Self::expand_macro(&self.expression).ok_or_else(|| {
                SchedulerError::InvalidArgument(format!(
                    "宏 \"{}\" 没有字段形式，无法修改",
                    self.expression
                ))
            })?;
            self.expression = expanded.to_string();
        }

        let mut fields: Vec<String> = self
            .expression
            .split_whitespace()
            .map(str::to_string)
            .collect();

        let field = fields.get_mut(position).ok_or_else(|| {
            SchedulerError::InvalidArgument(format!("表达式位置 {position} 不存在"))
        })?;
        *field = value.to_string();

        self.expression = fields.join(" ");
        Ok(self)
    }
}

impl Default for Expression {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}

impl FromStr for Expression {
    type Err = SchedulerError;

    fn from_str(raw: &str) -> Result<Self> {
        Self::create(raw)
    }
}

impl TryFrom<String> for Expression {
    type Error = SchedulerError;

    fn try_from(raw: String) -> Result<Self> {
        Self::create(&raw)
    }
}

impl From<Expression> for String {
    fn from(expression: Expression) -> Self {
        expression.expression
    }
}
