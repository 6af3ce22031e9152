//! Filtering, aggregation and commentary for the dashboard

mod aggregate;
mod commentary;
mod filter;

pub use aggregate::{
    distribution, funnel, kpis, leaderboard, AggregateResult, AggregationEngine, Distribution,
    Funnel, FunnelStage, KpiSamples, Kpis, LeaderboardRow, ValueCount,
};
pub use commentary::{commentary, Insight, Tier};
pub use filter::{filter_options, DateRange, FilterOptions, FilterSpec, FILTERABLE_FIELDS};
