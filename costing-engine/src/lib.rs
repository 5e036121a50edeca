//! Costing Engine - 餐厅后台成本核算与库存扣减引擎
//!
//! # 架构概述
//!
//! 本 crate 是后台系统的核心引擎，提供以下功能：
//!
//! - **配方成本** (`services::recipe_cost`): 纯函数成本计算
//! - **菜品成本传播** (`services::dish_cost`): 配方 → 成本记录 → 售价
//! - **库存流水** (`services::stock_ledger`): 原子库存变动 + 追加式日志
//! - **订单扣减** (`services::deduction`): 按份数比例扣减配料库存
//! - **存储端口** (`db`): SQLite (sqlx) 与内存两种适配器
//!
//! # 模块结构
//!
//! ```text
//! costing-engine/src/
//! ├── core/          # 配置
//! ├── db/            # 存储端口 + SQLite/内存适配器
//! ├── services/      # 领域服务
//! ├── notify/        # 通知端口
//! └── utils/         # 错误、校验、Decimal 计算、日志
//! ```
//!
//! The engine owns no HTTP surface; the surrounding application wires the
//! storage and notification ports and calls the services.

pub mod core;
pub mod db;
pub mod notify;
pub mod services;
pub mod utils;

// Re-export 公共类型
pub use self::core::{Config, DeductionPolicy};
pub use db::{CostingStore, DbService, MemoryStore, SqliteStore, StoreError, StoreResult};
pub use notify::{Notifier, RecordingNotifier, TracingNotifier};
pub use services::{
    DishCostService, IngredientCatalog, OrderDeductor, Services, StockLedger,
    compute_recipe_cost,
};
pub use utils::{CostingError, CostingResult};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};
