//! Dashboard analytics
//!
//! Every call re-reads the filtered range and rebuilds the snapshot. A fetch
//! failure never reaches the caller: the snapshot comes back empty with
//! `degraded = true`.

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::models::{Order, OrderStatus, ServiceId, ServiceOrder, UserProfile};
use std::collections::{BTreeMap, HashSet};

use crate::auth::Identity;
use crate::db::{RepoError, Repository};

const DAY_MS: i64 = 86_400_000;
/// Range used when the query names no start
const DEFAULT_RANGE_DAYS: i64 = 30;
/// Longest range served; wider queries keep the most recent part
const MAX_RANGE_DAYS: i64 = 3 * 366;
/// 9999-12-31T23:59:59.999Z
const MAX_TIMESTAMP: i64 = 253_402_300_799_999;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalyticsQuery {
    /// Unix millis, inclusive
    pub start: Option<i64>,
    /// Unix millis, inclusive
    pub end: Option<i64>,
    pub status: Option<OrderStatus>,
    pub service: Option<ServiceId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Day,
    Week,
    Month,
}

impl Granularity {
    /// More than 90 days buckets by month, more than 30 by week
    pub fn for_range(start: i64, end: i64) -> Self {
        let days = end.saturating_sub(start) / DAY_MS;
        if days > 90 {
            Self::Month
        } else if days > 30 {
            Self::Week
        } else {
            Self::Day
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
        }
    }

    fn floor(&self, date: NaiveDate) -> NaiveDate {
        match self {
            Self::Day => date,
            Self::Week => date - Days::new(u64::from(date.weekday().num_days_from_monday())),
            Self::Month => date.with_day(1).unwrap_or(date),
        }
    }

    fn next(&self, date: NaiveDate) -> Option<NaiveDate> {
        match self {
            Self::Day => date.checked_add_days(Days::new(1)),
            Self::Week => date.checked_add_days(Days::new(7)),
            Self::Month => date.checked_add_months(Months::new(1)),
        }
    }

    fn label(&self, date: NaiveDate) -> String {
        match self {
            Self::Day => date.format("%Y-%m-%d").to_string(),
            Self::Week => date.format("%G-W%V").to_string(),
            Self::Month => date.format("%Y-%m").to_string(),
        }
    }
}

fn date_of(ts: i64) -> NaiveDate {
    DateTime::<Utc>::from_timestamp_millis(ts)
        .unwrap_or(DateTime::UNIX_EPOCH)
        .date_naive()
}

fn millis_of(date: NaiveDate) -> i64 {
    Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN))
        .timestamp_millis()
}

#[derive(Debug, Clone, Serialize)]
pub struct RangeInfo {
    pub start: i64,
    pub end: i64,
    pub granularity: Granularity,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Kpis {
    pub total_orders: u64,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_revenue: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub service_revenue: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub average_order_value: Decimal,
    pub new_users: u64,
    pub active_buyers: u64,
    /// Percentage of orders completed, one decimal place
    #[serde(with = "rust_decimal::serde::float")]
    pub completion_rate: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct RevenuePoint {
    pub bucket: String,
    pub start: i64,
    pub orders: u64,
    #[serde(with = "rust_decimal::serde::float")]
    pub revenue: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct GrowthPoint {
    pub bucket: String,
    pub start: i64,
    pub new_users: u64,
    pub cumulative: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusCount {
    pub status: OrderStatus,
    pub label: &'static str,
    pub color: &'static str,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServicePerformance {
    pub service: ServiceId,
    pub label: &'static str,
    /// Trade orders that selected it plus standalone service orders
    pub orders: u64,
    #[serde(with = "rust_decimal::serde::float")]
    pub revenue: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct CountryCount {
    pub country: String,
    pub users: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsSnapshot {
    pub range: RangeInfo,
    pub kpis: Kpis,
    pub revenue: Vec<RevenuePoint>,
    pub user_growth: Vec<GrowthPoint>,
    pub status_distribution: Vec<StatusCount>,
    pub service_performance: Vec<ServicePerformance>,
    pub geography: Vec<CountryCount>,
    pub insights: Vec<String>,
    /// A fetch failed and every figure is empty
    pub degraded: bool,
}

impl AnalyticsSnapshot {
    /// All-zero snapshot for a range
    pub fn empty(range: RangeInfo) -> Self {
        Self {
            range,
            kpis: Kpis::default(),
            revenue: Vec::new(),
            user_growth: Vec::new(),
            status_distribution: Vec::new(),
            service_performance: Vec::new(),
            geography: Vec::new(),
            insights: Vec::new(),
            degraded: false,
        }
    }
}

/// Resolve the query's range against `now`
///
/// Bounds are clamped to `[0, 9999-12-31]`, a reversed range is swapped and
/// anything wider than [`MAX_RANGE_DAYS`] is cut down to its most recent part.
pub fn resolve_range(query: &AnalyticsQuery, now: i64) -> RangeInfo {
    let end = query.end.unwrap_or(now).clamp(0, MAX_TIMESTAMP);
    let start = query
        .start
        .map(|s| s.clamp(0, MAX_TIMESTAMP))
        .unwrap_or_else(|| end.saturating_sub(DEFAULT_RANGE_DAYS * DAY_MS).max(0));
    let (start, end) = if start <= end { (start, end) } else { (end, start) };
    let start = start.max(end - MAX_RANGE_DAYS * DAY_MS);
    RangeInfo {
        start,
        end,
        granularity: Granularity::for_range(start, end),
    }
}

struct Dataset {
    orders: Vec<Order>,
    service_orders: Vec<ServiceOrder>,
    users: Vec<UserProfile>,
}

/// Issue the three scoped reads concurrently, then apply the filters
async fn fetch(
    repo: &dyn Repository,
    range: &RangeInfo,
    query: &AnalyticsQuery,
    identity: &Identity,
) -> Result<Dataset, RepoError> {
    let scope = identity.order_scope();
    let (orders, service_orders, users) = tokio::join!(
        repo.list_orders_between(&scope, range.start, range.end),
        repo.list_service_orders_between(&scope, range.start, range.end),
        async {
            if identity.is_admin() {
                repo.list_users_between(range.start, range.end).await
            } else {
                Ok(Vec::new())
            }
        }
    );

    let orders = orders?
        .into_iter()
        .filter(|o| query.status.is_none_or(|s| o.status == s))
        .filter(|o| {
            query
                .service
                .is_none_or(|s| o.selected_services.get(&s).copied().unwrap_or(false))
        })
        .collect();

    let service_orders = service_orders?
        .into_iter()
        .filter(|o| query.status.is_none_or(|s| o.status == s))
        .filter(|o| query.service.is_none_or(|s| o.service_type == s))
        .collect();

    Ok(Dataset {
        orders,
        service_orders,
        users: users?,
    })
}

/// Snapshot for `identity`; admins see every user, others only their own orders
pub async fn compute_analytics(
    repo: &dyn Repository,
    query: &AnalyticsQuery,
    identity: &Identity,
    now: i64,
) -> AnalyticsSnapshot {
    let range = resolve_range(query, now);
    match fetch(repo, &range, query, identity).await {
        Ok(data) => build_snapshot(range, &data),
        Err(e) => {
            tracing::warn!(error = %e, user_id = %identity.user_id, "Analytics fetch failed, returning empty snapshot");
            AnalyticsSnapshot {
                degraded: true,
                ..AnalyticsSnapshot::empty(range)
            }
        }
    }
}

/// Bucket starts covering `[start, end]`, oldest first
fn buckets(range: &RangeInfo) -> Vec<NaiveDate> {
    let g = range.granularity;
    let last = g.floor(date_of(range.end));
    let mut current = g.floor(date_of(range.start));
    let mut out = Vec::new();
    while current <= last {
        out.push(current);
        match g.next(current) {
            Some(next) => current = next,
            None => break,
        }
    }
    out
}

fn percent(part: u64, whole: u64) -> Decimal {
    if whole == 0 {
        return Decimal::ZERO;
    }
    (Decimal::from(part) * Decimal::ONE_HUNDRED / Decimal::from(whole)).round_dp(1)
}

fn build_snapshot(range: RangeInfo, data: &Dataset) -> AnalyticsSnapshot {
    let g = range.granularity;
    let starts = buckets(&range);

    // Revenue counts trade orders and standalone service orders alike
    let mut revenue: BTreeMap<NaiveDate, (u64, Decimal)> =
        starts.iter().map(|d| (*d, (0, Decimal::ZERO))).collect();
    let entries = data
        .orders
        .iter()
        .map(|o| (o.created_at, o.total_amount))
        .chain(data.service_orders.iter().map(|o| (o.created_at, o.total_amount)));
    for (created_at, amount) in entries {
        let slot = revenue.entry(g.floor(date_of(created_at))).or_default();
        slot.0 += 1;
        slot.1 += amount;
    }

    let mut growth: BTreeMap<NaiveDate, u64> = starts.iter().map(|d| (*d, 0)).collect();
    for user in &data.users {
        *growth.entry(g.floor(date_of(user.created_at))).or_default() += 1;
    }
    let mut cumulative = 0;
    let user_growth = if data.users.is_empty() {
        Vec::new()
    } else {
        growth
            .into_iter()
            .map(|(date, new_users)| {
                cumulative += new_users;
                GrowthPoint {
                    bucket: g.label(date),
                    start: millis_of(date),
                    new_users,
                    cumulative,
                }
            })
            .collect()
    };

    let status_distribution: Vec<StatusCount> = OrderStatus::ALL
        .iter()
        .map(|status| {
            let meta = status.meta();
            StatusCount {
                status: *status,
                label: meta.label,
                color: meta.color,
                count: data.orders.iter().filter(|o| o.status == *status).count() as u64,
            }
        })
        .collect();

    let service_performance: Vec<ServicePerformance> = ServiceId::ALL
        .iter()
        .map(|service| {
            let attached = data
                .orders
                .iter()
                .filter(|o| o.selected_services.get(service).copied().unwrap_or(false))
                .count() as u64;
            let standalone: Vec<&ServiceOrder> = data
                .service_orders
                .iter()
                .filter(|o| o.service_type == *service)
                .collect();
            let standalone_revenue: Decimal = standalone.iter().map(|o| o.service_cost).sum();
            ServicePerformance {
                service: *service,
                label: service.label(),
                orders: attached + standalone.len() as u64,
                revenue: (service.fixed_cost() * Decimal::from(attached) + standalone_revenue)
                    .round_dp(2),
            }
        })
        .collect();

    let mut countries: BTreeMap<String, u64> = BTreeMap::new();
    for user in &data.users {
        let country = user
            .country
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or("Unknown");
        *countries.entry(country.to_string()).or_default() += 1;
    }
    let mut geography: Vec<CountryCount> = countries
        .into_iter()
        .map(|(country, users)| CountryCount { country, users })
        .collect();
    geography.sort_by(|a, b| b.users.cmp(&a.users).then_with(|| a.country.cmp(&b.country)));

    let total_orders = (data.orders.len() + data.service_orders.len()) as u64;
    let total_revenue: Decimal = revenue.values().map(|(_, r)| *r).sum::<Decimal>().round_dp(2);
    let service_revenue = service_performance
        .iter()
        .map(|s| s.revenue)
        .sum::<Decimal>()
        .round_dp(2);
    let completed = data
        .orders
        .iter()
        .filter(|o| o.status == OrderStatus::Completed)
        .count() as u64;
    let buyers: HashSet<&str> = data
        .orders
        .iter()
        .map(|o| o.buyer_id.as_str())
        .chain(data.service_orders.iter().map(|o| o.buyer_id.as_str()))
        .collect();

    let kpis = Kpis {
        total_orders,
        total_revenue,
        service_revenue,
        average_order_value: if total_orders == 0 {
            Decimal::ZERO
        } else {
            (total_revenue / Decimal::from(total_orders)).round_dp(2)
        },
        new_users: data.users.len() as u64,
        active_buyers: buyers.len() as u64,
        completion_rate: percent(completed, data.orders.len() as u64),
    };

    let revenue: Vec<RevenuePoint> = revenue
        .into_iter()
        .map(|(date, (orders, amount))| RevenuePoint {
            bucket: g.label(date),
            start: millis_of(date),
            orders,
            revenue: amount.round_dp(2),
        })
        .collect();

    let insights = insights(g, &kpis, &revenue, &status_distribution, &service_performance);

    AnalyticsSnapshot {
        range,
        kpis,
        revenue,
        user_growth,
        status_distribution,
        service_performance,
        geography,
        insights,
        degraded: false,
    }
}

fn insights(
    g: Granularity,
    kpis: &Kpis,
    revenue: &[RevenuePoint],
    statuses: &[StatusCount],
    services: &[ServicePerformance],
) -> Vec<String> {
    let mut out = Vec::new();
    if kpis.total_orders == 0 {
        out.push("No orders were placed in this period.".to_string());
        return out;
    }

    if let [.., previous, latest] = revenue
        && !previous.revenue.is_zero()
    {
        let change = ((latest.revenue - previous.revenue) * Decimal::ONE_HUNDRED
            / previous.revenue)
            .round_dp(1);
        let direction = if change.is_sign_negative() { "down" } else { "up" };
        out.push(format!(
            "Revenue is {direction} {}% versus the previous {}.",
            change.abs(),
            g.as_str()
        ));
    }

    if let Some(top) = services
        .iter()
        .filter(|s| !s.revenue.is_zero())
        .max_by(|a, b| a.revenue.cmp(&b.revenue))
    {
        out.push(format!(
            "{} generated the most service revenue ({}).",
            top.label, top.revenue
        ));
    }

    for status in statuses {
        match status.status {
            OrderStatus::PendingReview if status.count > 0 => {
                out.push(format!("{} order(s) are awaiting review.", status.count));
            }
            OrderStatus::PendingSupplierRegistration if status.count > 0 => {
                out.push(format!(
                    "{} order(s) are waiting for a new supplier to register.",
                    status.count
                ));
            }
            OrderStatus::Disputed if status.count > 0 => {
                out.push(format!("{} order(s) are disputed.", status.count));
            }
            _ => {}
        }
    }

    out.push(format!(
        "Completion rate is {}% across {} order(s).",
        kpis.completion_rate, kpis.total_orders
    ));
    out
}
