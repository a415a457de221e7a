use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::domain::{
    AutoApprovalRule, CompanyPolicy, Department, Employee, LeaveBalance, LeaveRequest, RequestId,
    TenantId, UserId,
};
use super::evaluation::ambiguous_rule_types;
use super::repository::{BalanceFilter, LeaveStore, RequestFilter, StoreError};

/// Point-in-time copy of everything one tenant's decisions depend on.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TenantSnapshot {
    pub requests: Vec<LeaveRequest>,
    pub balances: Vec<LeaveBalance>,
    pub rules: Vec<AutoApprovalRule>,
    pub employees: Vec<Employee>,
    pub departments: Vec<Department>,
    pub policy: CompanyPolicy,
}

impl TenantSnapshot {
    pub async fn load<S>(store: &S, tenant: &TenantId) -> Result<Self, StoreError>
    where
        S: LeaveStore + ?Sized,
    {
        let requests = store.list_requests(tenant, &RequestFilter::all()).await?;
        let balances = store.list_balances(tenant, &BalanceFilter::all()).await?;
        let rules = store.list_rules(tenant).await?;
        let employees = store.list_employees(tenant).await?;
        let departments = store.list_departments(tenant).await?;
        let policy = store.get_policy(tenant).await?.unwrap_or_default();

        Ok(Self {
            requests,
            balances,
            rules,
            employees,
            departments,
            policy,
        })
    }

    pub fn request(&self, id: &RequestId) -> Option<&LeaveRequest> {
        self.requests.iter().find(|request| &request.id == id)
    }

    pub fn employee(&self, id: &UserId) -> Option<&Employee> {
        self.employees.iter().find(|employee| &employee.id == id)
    }

    pub fn balances_for(&self, user_id: &UserId) -> Vec<LeaveBalance> {
        self.balances
            .iter()
            .filter(|balance| &balance.user_id == user_id)
            .cloned()
            .collect()
    }
}

/// Session-scoped cache of tenant snapshots, replaced wholesale on [`SnapshotCache::refresh`].
#[derive(Debug, Default)]
pub struct SnapshotCache {
    entries: RwLock<HashMap<TenantId, Arc<TenantSnapshot>>>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, tenant: &TenantId) -> Option<Arc<TenantSnapshot>> {
        self.entries.read().await.get(tenant).cloned()
    }

    /// Cached snapshot, loading it on first use.
    pub async fn get_or_load<S>(
        &self,
        store: &S,
        tenant: &TenantId,
    ) -> Result<Arc<TenantSnapshot>, StoreError>
    where
        S: LeaveStore + ?Sized,
    {
        if let Some(snapshot) = self.get(tenant).await {
            return Ok(snapshot);
        }
        self.refresh(store, tenant).await
    }

    pub async fn refresh<S>(
        &self,
        store: &S,
        tenant: &TenantId,
    ) -> Result<Arc<TenantSnapshot>, StoreError>
    where
        S: LeaveStore + ?Sized,
    {
        let snapshot = Arc::new(TenantSnapshot::load(store, tenant).await?);

        for leave_type in ambiguous_rule_types(&snapshot.rules) {
            warn!(%tenant, %leave_type, "several enabled auto-approval rules; only the first applies");
        }

        debug!(
            %tenant,
            requests = snapshot.requests.len(),
            balances = snapshot.balances.len(),
            rules = snapshot.rules.len(),
            "tenant snapshot refreshed"
        );

        self.entries
            .write()
            .await
            .insert(tenant.clone(), Arc::clone(&snapshot));
        Ok(snapshot)
    }

    pub async fn invalidate(&self, tenant: &TenantId) {
        self.entries.write().await.remove(tenant);
    }
}
