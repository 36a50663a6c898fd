use diesel::deserialize::{self, FromSql, FromSqlRow};
use diesel::expression::AsExpression;
use diesel::pg::Pg;
use diesel::serialize::{self, Output, ToSql};
use diesel::sql_types::Text;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;

/// Physical engine that owns a data category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreTarget {
    /// Append-optimized time-series store (TimescaleDB hypertables)
    TimeSeries,

    /// Relational bookkeeping store (PostgreSQL)
    Relational,
}

impl StoreTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreTarget::TimeSeries => "timeseries",
            StoreTarget::Relational => "relational",
        }
    }
}

impl fmt::Display for StoreTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Semantic tag for a market-data dataset
///
/// The set is fixed at build time. Five high-frequency categories live in the
/// time-series store; everything else is relational bookkeeping.
/// Stored as TEXT wherever it is persisted (e.g. `transaction_log.business_type`).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, AsExpression, FromSqlRow,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "snake_case")]
pub enum DataCategory {
    // High-frequency market data
    TickData,
    MinuteKline,
    OrderBookDepth,
    Level2Snapshot,
    IndexQuotes,

    // Lower-frequency bars
    DailyKline,
    WeeklyKline,
    MonthlyKline,

    // Reference data
    SymbolsInfo,
    ContractInfo,
    ConstituentInfo,
    TradeCalendar,
    IndustryClass,
    ConceptClass,
    MarketRules,

    // Fundamentals
    FinancialData,
    DividendData,
    ShareholderData,
    FundFlow,

    // Derived data
    TechnicalIndicators,
    QuantFactors,
    ModelOutput,
    TradingSignals,
    BacktestResults,
    RiskMetrics,

    // Trading records
    RealtimePositions,
    RealtimeAccount,
    OrderRecords,
    TradeRecords,
    PositionHistory,

    // Platform bookkeeping
    SystemConfig,
    DataSourceStatus,
    TaskSchedule,
    SyncWatermarks,
}

impl DataCategory {
    /// Database / wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            DataCategory::TickData => "tick_data",
            DataCategory::MinuteKline => "minute_kline",
            DataCategory::OrderBookDepth => "order_book_depth",
            DataCategory::Level2Snapshot => "level2_snapshot",
            DataCategory::IndexQuotes => "index_quotes",
            DataCategory::DailyKline => "daily_kline",
            DataCategory::WeeklyKline => "weekly_kline",
            DataCategory::MonthlyKline => "monthly_kline",
            DataCategory::SymbolsInfo => "symbols_info",
            DataCategory::ContractInfo => "contract_info",
            DataCategory::ConstituentInfo => "constituent_info",
            DataCategory::TradeCalendar => "trade_calendar",
            DataCategory::IndustryClass => "industry_class",
            DataCategory::ConceptClass => "concept_class",
            DataCategory::MarketRules => "market_rules",
            DataCategory::FinancialData => "financial_data",
            DataCategory::DividendData => "dividend_data",
            DataCategory::ShareholderData => "shareholder_data",
            DataCategory::FundFlow => "fund_flow",
            DataCategory::TechnicalIndicators => "technical_indicators",
            DataCategory::QuantFactors => "quant_factors",
            DataCategory::ModelOutput => "model_output",
            DataCategory::TradingSignals => "trading_signals",
            DataCategory::BacktestResults => "backtest_results",
            DataCategory::RiskMetrics => "risk_metrics",
            DataCategory::RealtimePositions => "realtime_positions",
            DataCategory::RealtimeAccount => "realtime_account",
            DataCategory::OrderRecords => "order_records",
            DataCategory::TradeRecords => "trade_records",
            DataCategory::PositionHistory => "position_history",
            DataCategory::SystemConfig => "system_config",
            DataCategory::DataSourceStatus => "data_source_status",
            DataCategory::TaskSchedule => "task_schedule",
            DataCategory::SyncWatermarks => "sync_watermarks",
        }
    }

    /// Parse string to DataCategory
    pub fn from_str(s: &str) -> Option<Self> {
        Self::all().into_iter().find(|c| c.as_str() == s)
    }

    /// Get all category variants
    pub fn all() -> Vec<Self> {
        vec![
            DataCategory::TickData,
            DataCategory::MinuteKline,
            DataCategory::OrderBookDepth,
            DataCategory::Level2Snapshot,
            DataCategory::IndexQuotes,
            DataCategory::DailyKline,
            DataCategory::WeeklyKline,
            DataCategory::MonthlyKline,
            DataCategory::SymbolsInfo,
            DataCategory::ContractInfo,
            DataCategory::ConstituentInfo,
            DataCategory::TradeCalendar,
            DataCategory::IndustryClass,
            DataCategory::ConceptClass,
            DataCategory::MarketRules,
            DataCategory::FinancialData,
            DataCategory::DividendData,
            DataCategory::ShareholderData,
            DataCategory::FundFlow,
            DataCategory::TechnicalIndicators,
            DataCategory::QuantFactors,
            DataCategory::ModelOutput,
            DataCategory::TradingSignals,
            DataCategory::BacktestResults,
            DataCategory::RiskMetrics,
            DataCategory::RealtimePositions,
            DataCategory::RealtimeAccount,
            DataCategory::OrderRecords,
            DataCategory::TradeRecords,
            DataCategory::PositionHistory,
            DataCategory::SystemConfig,
            DataCategory::DataSourceStatus,
            DataCategory::TaskSchedule,
            DataCategory::SyncWatermarks,
        ]
    }

    /// Store that owns this category when no routing table override exists
    pub fn default_target(&self) -> StoreTarget {
        match self {
            DataCategory::TickData
            | DataCategory::MinuteKline
            | DataCategory::OrderBookDepth
            | DataCategory::Level2Snapshot
            | DataCategory::IndexQuotes => StoreTarget::TimeSeries,
            _ => StoreTarget::Relational,
        }
    }

    /// Table a category is written to unless the caller names another one
    pub fn default_table(&self) -> &'static str {
        self.as_str()
    }

    pub fn description(&self) -> &'static str {
        match self {
            DataCategory::TickData => "Trade-by-trade ticks",
            DataCategory::MinuteKline => "Intraday minute bars",
            DataCategory::OrderBookDepth => "Order book depth levels",
            DataCategory::Level2Snapshot => "Level-2 quote snapshots",
            DataCategory::IndexQuotes => "Real-time index quotes",
            DataCategory::DailyKline => "Daily bars",
            DataCategory::WeeklyKline => "Weekly bars",
            DataCategory::MonthlyKline => "Monthly bars",
            DataCategory::SymbolsInfo => "Symbol reference data",
            DataCategory::ContractInfo => "Derivative contract specifications",
            DataCategory::ConstituentInfo => "Index and sector constituents",
            DataCategory::TradeCalendar => "Exchange trading calendar",
            DataCategory::IndustryClass => "Industry classification",
            DataCategory::ConceptClass => "Concept / theme classification",
            DataCategory::MarketRules => "Exchange trading rules",
            DataCategory::FinancialData => "Financial statements",
            DataCategory::DividendData => "Dividends and corporate actions",
            DataCategory::ShareholderData => "Shareholder structure",
            DataCategory::FundFlow => "Capital flow statistics",
            DataCategory::TechnicalIndicators => "Computed technical indicators",
            DataCategory::QuantFactors => "Quantitative factor values",
            DataCategory::ModelOutput => "Model predictions",
            DataCategory::TradingSignals => "Generated trading signals",
            DataCategory::BacktestResults => "Backtest runs and results",
            DataCategory::RiskMetrics => "Risk metrics",
            DataCategory::RealtimePositions => "Current positions",
            DataCategory::RealtimeAccount => "Current account state",
            DataCategory::OrderRecords => "Order history",
            DataCategory::TradeRecords => "Fill history",
            DataCategory::PositionHistory => "Historical positions",
            DataCategory::SystemConfig => "Platform configuration",
            DataCategory::DataSourceStatus => "Data source health",
            DataCategory::TaskSchedule => "Scheduled ingestion tasks",
            DataCategory::SyncWatermarks => "Per-symbol sync watermarks",
        }
    }
}

impl fmt::Display for DataCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl ToSql<Text, Pg> for DataCategory {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(self.as_str().as_bytes())?;
        Ok(serialize::IsNull::No)
    }
}

impl FromSql<Text, Pg> for DataCategory {
    fn from_sql(bytes: <Pg as diesel::backend::Backend>::RawValue<'_>) -> deserialize::Result<Self> {
        let text = <String as FromSql<Text, Pg>>::from_sql(bytes)?;
        DataCategory::from_str(&text).ok_or_else(|| format!("Invalid data category: {}", text).into())
    }
}
