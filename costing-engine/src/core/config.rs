use std::str::FromStr;

/// 引擎配置 - 后台成本核算引擎的所有配置项
///
/// # 环境变量
///
/// 所有配置项都可以通过环境变量覆盖：
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | DATABASE_PATH | data/costing.db | SQLite 数据库路径 |
/// | STORAGE_TIMEOUT_MS | 5000 | 单次存储调用超时(毫秒) |
/// | DEDUCTION_POLICY | best_effort | 扣减策略: best_effort \| all_or_nothing |
/// | ENVIRONMENT | development | 运行环境 |
///
/// # 示例
///
/// ```ignore
/// DATABASE_PATH=/data/costing.db DEDUCTION_POLICY=all_or_nothing cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite 数据库文件路径
    pub database_path: String,
    /// 单次存储调用的超时时间 (毫秒)；超时视为可重试失败
    pub storage_timeout_ms: u64,
    /// 订单扣减库存的失败策略
    pub deduction_policy: DeductionPolicy,
    /// 运行环境: development | staging | production
    pub environment: String,
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置，使用默认值
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        Self {
            database_path: std::env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "data/costing.db".into()),
            storage_timeout_ms: std::env::var("STORAGE_TIMEOUT_MS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(5000),
            deduction_policy: std::env::var("DEDUCTION_POLICY")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or_default(),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: "data/costing.db".into(),
            storage_timeout_ms: 5000,
            deduction_policy: DeductionPolicy::default(),
            environment: "development".into(),
        }
    }
}

/// How the order deductor handles a failing ingredient line
///
/// An explicit policy choice rather than an implicit fall-through: the
/// historical behavior is best-effort (skip the failing line, keep going),
/// all-or-nothing compensates the lines already applied and fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeductionPolicy {
    /// Continue past per-ingredient failures, report them in the result
    #[default]
    BestEffort,
    /// Reverse already-applied deductions on the first failure and fail
    AllOrNothing,
}

impl FromStr for DeductionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "best_effort" => Ok(DeductionPolicy::BestEffort),
            "all_or_nothing" => Ok(DeductionPolicy::AllOrNothing),
            other => Err(format!("unknown deduction policy: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_parse() {
        assert_eq!(
            "best_effort".parse::<DeductionPolicy>().unwrap(),
            DeductionPolicy::BestEffort
        );
        assert_eq!(
            "ALL_OR_NOTHING".parse::<DeductionPolicy>().unwrap(),
            DeductionPolicy::AllOrNothing
        );
        assert!("sometimes".parse::<DeductionPolicy>().is_err());
    }
}
