//! In-memory collaborators for unit tests

use async_trait::async_trait;
use rust_decimal::Decimal;
use shared::models::{
    Order, OrderRequest, OrderStatus, ServiceId, ServiceOrder, UserProfile, UserRole,
};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use crate::db::{OrderScope, RepoError, RepoErrorKind, Repository};
use crate::email::{DeliveryError, DeliveryErrorKind, EmailTransport, TemplateKind, TemplateParams};

// ── Transport ──────────────────────────────────────────────────────

/// One recorded send
#[derive(Debug, Clone)]
pub struct SentEmail {
    pub template: TemplateKind,
    pub params: TemplateParams,
}

enum Script {
    /// Per-call outcomes; calls past the end succeed
    Outcomes(Mutex<VecDeque<Result<(), DeliveryError>>>),
    /// Every call fails with this error
    Always(DeliveryError),
}

/// Recording transport with scripted outcomes
pub struct MockTransport {
    script: Script,
    calls: Mutex<Vec<SentEmail>>,
    latency: Option<Duration>,
}

impl MockTransport {
    fn with_outcomes(outcomes: impl IntoIterator<Item = Result<(), DeliveryError>>) -> Self {
        Self {
            script: Script::Outcomes(Mutex::new(outcomes.into_iter().collect())),
            calls: Mutex::new(Vec::new()),
            latency: None,
        }
    }

    /// Every call sleeps this long before it is recorded
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// `true` accepts the call at that position, `false` fails it
    pub fn scripted<const N: usize>(outcomes: [bool; N]) -> Self {
        Self::with_outcomes(outcomes.into_iter().map(|ok| {
            if ok {
                Ok(())
            } else {
                Err(DeliveryError::new(DeliveryErrorKind::Generic, "scripted failure"))
            }
        }))
    }

    pub fn succeeding() -> Self {
        Self::with_outcomes([])
    }

    pub fn failing(error: DeliveryError) -> Self {
        Self {
            script: Script::Always(error),
            calls: Mutex::new(Vec::new()),
            latency: None,
        }
    }

    /// Fails the first N calls with these messages in order
    pub fn failing_with_messages<const N: usize>(messages: [&str; N]) -> Self {
        Self::with_outcomes(
            messages
                .into_iter()
                .map(|m| Err(DeliveryError::new(DeliveryErrorKind::Generic, m))),
        )
    }

    pub fn calls(&self) -> Vec<SentEmail> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailTransport for MockTransport {
    async fn send(
        &self,
        template: TemplateKind,
        params: &TemplateParams,
    ) -> Result<(), DeliveryError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.calls.lock().unwrap().push(SentEmail {
            template,
            params: params.clone(),
        });
        match &self.script {
            Script::Always(error) => Err(error.clone()),
            Script::Outcomes(queue) => queue.lock().unwrap().pop_front().unwrap_or(Ok(())),
        }
    }
}

// ── Repository ─────────────────────────────────────────────────────

#[derive(Default)]
struct Tables {
    orders: Vec<Order>,
    service_orders: Vec<ServiceOrder>,
    requests: Vec<OrderRequest>,
    users: Vec<UserProfile>,
    executed_sql: Vec<String>,
    next_id: i64,
}

#[derive(Default)]
struct Failures {
    order_insert: Option<RepoErrorKind>,
    request_insert: Option<RepoErrorKind>,
    execute_sql: Option<RepoErrorKind>,
    reads: bool,
}

/// In-memory repository with switchable failures
#[derive(Default)]
pub struct MockRepository {
    tables: Mutex<Tables>,
    failures: Mutex<Failures>,
    /// Remaining inserts that report a uniqueness conflict
    conflicts: AtomicU32,
}

fn injected(kind: RepoErrorKind) -> RepoError {
    RepoError::new(kind, format!("injected {kind} failure"))
}

impl MockRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(self, user: UserProfile) -> Self {
        self.tables.lock().unwrap().users.push(user);
        self
    }

    pub fn with_order(self, order: Order) -> Self {
        self.tables.lock().unwrap().orders.push(order);
        self
    }

    /// The next `n` order/service-order inserts fail with a conflict
    pub fn conflicts(self, n: u32) -> Self {
        self.conflicts.store(n, Ordering::SeqCst);
        self
    }

    pub fn fail_order_insert(self, kind: RepoErrorKind) -> Self {
        self.failures.lock().unwrap().order_insert = Some(kind);
        self
    }

    pub fn fail_typed_request_insert(self, kind: RepoErrorKind) -> Self {
        self.failures.lock().unwrap().request_insert = Some(kind);
        self
    }

    pub fn fail_execute_sql(self, kind: RepoErrorKind) -> Self {
        self.failures.lock().unwrap().execute_sql = Some(kind);
        self
    }

    pub fn fail_reads(self) -> Self {
        self.failures.lock().unwrap().reads = true;
        self
    }

    pub fn orders(&self) -> Vec<Order> {
        self.tables.lock().unwrap().orders.clone()
    }

    pub fn service_orders(&self) -> Vec<ServiceOrder> {
        self.tables.lock().unwrap().service_orders.clone()
    }

    pub fn requests(&self) -> Vec<OrderRequest> {
        self.tables.lock().unwrap().requests.clone()
    }

    pub fn executed_sql(&self) -> Vec<String> {
        self.tables.lock().unwrap().executed_sql.clone()
    }

    fn check_reads(&self) -> Result<(), RepoError> {
        if self.failures.lock().unwrap().reads {
            return Err(injected(RepoErrorKind::Generic));
        }
        Ok(())
    }

    fn take_conflict(&self) -> bool {
        self.conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl Repository for MockRepository {
    async fn insert_order(&self, order: &Order) -> Result<Order, RepoError> {
        if let Some(kind) = self.failures.lock().unwrap().order_insert {
            return Err(injected(kind));
        }
        if self.take_conflict() {
            return Err(injected(RepoErrorKind::Conflict));
        }
        let mut tables = self.tables.lock().unwrap();
        tables.next_id += 1;
        let stored = Order {
            id: Some(tables.next_id),
            ..order.clone()
        };
        tables.orders.push(stored.clone());
        Ok(stored)
    }

    async fn find_order(&self, order_id: &str) -> Result<Option<Order>, RepoError> {
        self.check_reads()?;
        let tables = self.tables.lock().unwrap();
        Ok(tables.orders.iter().find(|o| o.order_id == order_id).cloned())
    }

    async fn list_orders(&self, scope: &OrderScope) -> Result<Vec<Order>, RepoError> {
        self.check_reads()?;
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .orders
            .iter()
            .filter(|o| scope.includes(o))
            .cloned()
            .collect())
    }

    async fn list_orders_between(
        &self,
        scope: &OrderScope,
        start: i64,
        end: i64,
    ) -> Result<Vec<Order>, RepoError> {
        self.check_reads()?;
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .orders
            .iter()
            .filter(|o| scope.includes(o) && (start..=end).contains(&o.created_at))
            .cloned()
            .collect())
    }

    async fn insert_service_order(&self, order: &ServiceOrder) -> Result<ServiceOrder, RepoError> {
        if let Some(kind) = self.failures.lock().unwrap().order_insert {
            return Err(injected(kind));
        }
        if self.take_conflict() {
            return Err(injected(RepoErrorKind::Conflict));
        }
        let mut tables = self.tables.lock().unwrap();
        tables.next_id += 1;
        let stored = ServiceOrder {
            id: Some(tables.next_id),
            ..order.clone()
        };
        tables.service_orders.push(stored.clone());
        Ok(stored)
    }

    async fn list_service_orders(
        &self,
        buyer_id: Option<&str>,
    ) -> Result<Vec<ServiceOrder>, RepoError> {
        self.check_reads()?;
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .service_orders
            .iter()
            .filter(|o| buyer_id.is_none_or(|id| o.buyer_id == id))
            .cloned()
            .collect())
    }

    async fn list_service_orders_between(
        &self,
        scope: &OrderScope,
        start: i64,
        end: i64,
    ) -> Result<Vec<ServiceOrder>, RepoError> {
        self.check_reads()?;
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .service_orders
            .iter()
            .filter(|o| match scope {
                OrderScope::Supplier(_) => false,
                _ => scope.buyer_id().is_none_or(|id| o.buyer_id == id),
            })
            .filter(|o| (start..=end).contains(&o.created_at))
            .cloned()
            .collect())
    }

    async fn insert_order_request(
        &self,
        request: &OrderRequest,
    ) -> Result<OrderRequest, RepoError> {
        if let Some(kind) = self.failures.lock().unwrap().request_insert {
            return Err(injected(kind));
        }
        let mut tables = self.tables.lock().unwrap();
        tables.requests.push(request.clone());
        Ok(request.clone())
    }

    async fn list_order_requests(&self, order_id: &str) -> Result<Vec<OrderRequest>, RepoError> {
        self.check_reads()?;
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .requests
            .iter()
            .filter(|r| r.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn find_user(&self, id: &str) -> Result<Option<UserProfile>, RepoError> {
        self.check_reads()?;
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .users
            .iter()
            .find(|u| u.user_id == id || u.public_id == id)
            .cloned())
    }

    async fn list_users_between(
        &self,
        start: i64,
        end: i64,
    ) -> Result<Vec<UserProfile>, RepoError> {
        self.check_reads()?;
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .users
            .iter()
            .filter(|u| (start..=end).contains(&u.created_at))
            .cloned()
            .collect())
    }

    async fn execute_sql(&self, sql: &str) -> Result<u64, RepoError> {
        if let Some(kind) = self.failures.lock().unwrap().execute_sql {
            return Err(injected(kind));
        }
        self.tables.lock().unwrap().executed_sql.push(sql.to_string());
        Ok(1)
    }
}

// ── Fixtures ───────────────────────────────────────────────────────

pub const BUYER_ID: &str = "7d1f0c1e-buyer";
pub const SUPPLIER_ID: &str = "3a9b2e44-supplier";

pub fn sample_buyer() -> UserProfile {
    UserProfile {
        user_id: BUYER_ID.into(),
        public_id: "BUYAB12CD34".into(),
        email: "buyer@acme.test".into(),
        full_name: Some("Ann Buyer".into()),
        company_name: Some("Acme Imports".into()),
        phone: None,
        wechat: None,
        country: Some("Germany".into()),
        role: UserRole::Buyer,
        created_at: 1_700_000_000_000,
    }
}

pub fn sample_supplier() -> UserProfile {
    UserProfile {
        user_id: SUPPLIER_ID.into(),
        public_id: "SUPZX98YW76".into(),
        email: "sales@shenzhen-parts.test".into(),
        full_name: Some("Li Wei".into()),
        company_name: Some("Shenzhen Parts Co".into()),
        phone: Some("+86 755 0000 0000".into()),
        wechat: Some("liwei_parts".into()),
        country: Some("China".into()),
        role: UserRole::Supplier,
        created_at: 1_700_000_000_000,
    }
}

/// An order from the sample buyer to a new (unregistered) supplier
pub fn sample_order() -> Order {
    Order {
        id: Some(1),
        order_id: "ORDA1B2C3D4E5".into(),
        buyer_id: BUYER_ID.into(),
        buyer_email: "buyer@acme.test".into(),
        buyer_company: Some("Acme Imports".into()),
        supplier_id: None,
        supplier_name: "Ningbo Valves".into(),
        supplier_email: Some("info@ningbo-valves.test".into()),
        supplier_phone: None,
        supplier_wechat: None,
        product_description: "2000 brass ball valves".into(),
        deal_amount: Decimal::new(1000, 0),
        supplier_bank_account: None,
        selected_services: [(ServiceId::Verification, true)].into_iter().collect(),
        service_cost: Decimal::new(50, 0),
        total_amount: Decimal::new(1050, 0),
        status: OrderStatus::PendingSupplierRegistration,
        created_at: 1_700_000_000_000,
        updated_at: 1_700_000_000_000,
    }
}
