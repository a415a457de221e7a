use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::info;

use super::domain::{
    AutoApprovalRule, BalanceId, BalanceUsage, CompanyPolicy, Department, DepartmentId,
    Employee, LeaveBalance, LeaveRequest, LeaveStatus, RequestId, RuleId, TenantId, UserId,
};
use super::repository::{
    BalanceFilter, DecisionNotice, DecisionNotifier, LeaveStore, NotifyError, RequestFilter,
    StoreError,
};

#[derive(Debug, Default, Clone)]
struct TenantTables {
    requests: Vec<LeaveRequest>,
    balances: Vec<LeaveBalance>,
    rules: Vec<AutoApprovalRule>,
    employees: Vec<Employee>,
    departments: Vec<Department>,
    policy: Option<CompanyPolicy>,
}

/// Process-local store keeping rows in insertion order per tenant.
#[derive(Debug, Default)]
pub struct InMemoryLeaveStore {
    tenants: RwLock<BTreeMap<TenantId, TenantTables>>,
}

impl InMemoryLeaveStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LeaveStore for InMemoryLeaveStore {
    async fn list_tenants(&self) -> Result<Vec<TenantId>, StoreError> {
        Ok(self.tenants.read().await.keys().cloned().collect())
    }

    async fn list_requests(
        &self,
        tenant: &TenantId,
        filter: &RequestFilter,
    ) -> Result<Vec<LeaveRequest>, StoreError> {
        let guard = self.tenants.read().await;
        Ok(guard
            .get(tenant)
            .map(|tables| {
                tables
                    .requests
                    .iter()
                    .filter(|request| filter.matches(request))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get_request(
        &self,
        tenant: &TenantId,
        id: &RequestId,
    ) -> Result<Option<LeaveRequest>, StoreError> {
        let guard = self.tenants.read().await;
        Ok(guard
            .get(tenant)
            .and_then(|tables| tables.requests.iter().find(|request| &request.id == id))
            .cloned())
    }

    async fn insert_request(&self, request: LeaveRequest) -> Result<LeaveRequest, StoreError> {
        let mut guard = self.tenants.write().await;
        let tables = guard.entry(request.tenant_id.clone()).or_default();
        if tables.requests.iter().any(|existing| existing.id == request.id) {
            return Err(StoreError::Conflict);
        }
        tables.requests.push(request.clone());
        Ok(request)
    }

    async fn update_request_status(
        &self,
        tenant: &TenantId,
        id: &RequestId,
        expected: LeaveStatus,
        next: LeaveStatus,
    ) -> Result<(), StoreError> {
        let mut guard = self.tenants.write().await;
        let request = guard
            .get_mut(tenant)
            .and_then(|tables| tables.requests.iter_mut().find(|request| &request.id == id))
            .ok_or(StoreError::NotFound)?;
        if request.status != expected {
            return Err(StoreError::StatusMismatch {
                actual: request.status,
            });
        }
        request.status = next;
        Ok(())
    }

    async fn delete_request(
        &self,
        tenant: &TenantId,
        id: &RequestId,
        expected: LeaveStatus,
    ) -> Result<(), StoreError> {
        let mut guard = self.tenants.write().await;
        let tables = guard.get_mut(tenant).ok_or(StoreError::NotFound)?;
        let position = tables
            .requests
            .iter()
            .position(|request| &request.id == id)
            .ok_or(StoreError::NotFound)?;
        let actual = tables.requests[position].status;
        if actual != expected {
            return Err(StoreError::StatusMismatch { actual });
        }
        tables.requests.remove(position);
        Ok(())
    }

    async fn list_balances(
        &self,
        tenant: &TenantId,
        filter: &BalanceFilter,
    ) -> Result<Vec<LeaveBalance>, StoreError> {
        let guard = self.tenants.read().await;
        Ok(guard
            .get(tenant)
            .map(|tables| {
                tables
                    .balances
                    .iter()
                    .filter(|balance| filter.matches(balance))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn update_balance(
        &self,
        tenant: &TenantId,
        id: &BalanceId,
        usage: BalanceUsage,
    ) -> Result<(), StoreError> {
        let mut guard = self.tenants.write().await;
        let balance = guard
            .get_mut(tenant)
            .and_then(|tables| tables.balances.iter_mut().find(|balance| &balance.id == id))
            .ok_or(StoreError::NotFound)?;
        balance.used = usage.used;
        balance.remaining = usage.remaining;
        Ok(())
    }

    async fn upsert_balances(
        &self,
        tenant: &TenantId,
        rows: Vec<LeaveBalance>,
    ) -> Result<(), StoreError> {
        if let Some(row) = rows.iter().find(|row| &row.tenant_id != tenant) {
            return Err(StoreError::Write(format!(
                "balance {} belongs to tenant {}",
                row.id, row.tenant_id
            )));
        }

        let mut guard = self.tenants.write().await;
        let tables = guard.entry(tenant.clone()).or_default();
        for row in rows {
            match tables.balances.iter_mut().find(|existing| existing.id == row.id) {
                Some(existing) => *existing = row,
                None => tables.balances.push(row),
            }
        }
        Ok(())
    }

    async fn delete_balances(
        &self,
        tenant: &TenantId,
        filter: &BalanceFilter,
    ) -> Result<usize, StoreError> {
        let mut guard = self.tenants.write().await;
        let Some(tables) = guard.get_mut(tenant) else {
            return Ok(0);
        };
        let before = tables.balances.len();
        tables.balances.retain(|balance| !filter.matches(balance));
        Ok(before - tables.balances.len())
    }

    async fn list_rules(&self, tenant: &TenantId) -> Result<Vec<AutoApprovalRule>, StoreError> {
        let guard = self.tenants.read().await;
        Ok(guard
            .get(tenant)
            .map(|tables| tables.rules.clone())
            .unwrap_or_default())
    }

    async fn insert_rule(&self, rule: AutoApprovalRule) -> Result<AutoApprovalRule, StoreError> {
        let mut guard = self.tenants.write().await;
        let tables = guard.entry(rule.tenant_id.clone()).or_default();
        if tables.rules.iter().any(|existing| existing.id == rule.id) {
            return Err(StoreError::Conflict);
        }
        tables.rules.push(rule.clone());
        Ok(rule)
    }

    async fn update_rule(&self, rule: AutoApprovalRule) -> Result<(), StoreError> {
        let mut guard = self.tenants.write().await;
        let existing = guard
            .get_mut(&rule.tenant_id)
            .and_then(|tables| tables.rules.iter_mut().find(|existing| existing.id == rule.id))
            .ok_or(StoreError::NotFound)?;
        *existing = rule;
        Ok(())
    }

    async fn delete_rule(&self, tenant: &TenantId, id: &RuleId) -> Result<(), StoreError> {
        let mut guard = self.tenants.write().await;
        let tables = guard.get_mut(tenant).ok_or(StoreError::NotFound)?;
        let before = tables.rules.len();
        tables.rules.retain(|rule| &rule.id != id);
        if tables.rules.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list_employees(&self, tenant: &TenantId) -> Result<Vec<Employee>, StoreError> {
        let guard = self.tenants.read().await;
        Ok(guard
            .get(tenant)
            .map(|tables| tables.employees.clone())
            .unwrap_or_default())
    }

    async fn insert_employee(&self, employee: Employee) -> Result<Employee, StoreError> {
        let mut guard = self.tenants.write().await;
        let tables = guard.entry(employee.tenant_id.clone()).or_default();
        if tables
            .employees
            .iter()
            .any(|existing| existing.id == employee.id || existing.email == employee.email)
        {
            return Err(StoreError::Conflict);
        }
        tables.employees.push(employee.clone());
        Ok(employee)
    }

    async fn update_employee(&self, employee: Employee) -> Result<(), StoreError> {
        let mut guard = self.tenants.write().await;
        let tables = guard
            .get_mut(&employee.tenant_id)
            .ok_or(StoreError::NotFound)?;
        if tables
            .employees
            .iter()
            .any(|existing| existing.id != employee.id && existing.email == employee.email)
        {
            return Err(StoreError::Conflict);
        }
        let existing = tables
            .employees
            .iter_mut()
            .find(|existing| existing.id == employee.id)
            .ok_or(StoreError::NotFound)?;
        *existing = employee;
        Ok(())
    }

    async fn delete_employee(&self, tenant: &TenantId, id: &UserId) -> Result<(), StoreError> {
        let mut guard = self.tenants.write().await;
        let tables = guard.get_mut(tenant).ok_or(StoreError::NotFound)?;
        let before = tables.employees.len();
        tables.employees.retain(|employee| &employee.id != id);
        if tables.employees.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list_departments(&self, tenant: &TenantId) -> Result<Vec<Department>, StoreError> {
        let guard = self.tenants.read().await;
        Ok(guard
            .get(tenant)
            .map(|tables| tables.departments.clone())
            .unwrap_or_default())
    }

    async fn insert_department(
        &self,
        department: Department,
    ) -> Result<Department, StoreError> {
        let mut guard = self.tenants.write().await;
        let tables = guard.entry(department.tenant_id.clone()).or_default();
        if tables.departments.iter().any(|existing| {
            existing.id == department.id || existing.name.eq_ignore_ascii_case(&department.name)
        }) {
            return Err(StoreError::Conflict);
        }
        tables.departments.push(department.clone());
        Ok(department)
    }

    async fn update_department(&self, department: Department) -> Result<(), StoreError> {
        let mut guard = self.tenants.write().await;
        let existing = guard
            .get_mut(&department.tenant_id)
            .and_then(|tables| {
                tables
                    .departments
                    .iter_mut()
                    .find(|existing| existing.id == department.id)
            })
            .ok_or(StoreError::NotFound)?;
        *existing = department;
        Ok(())
    }

    async fn delete_department(
        &self,
        tenant: &TenantId,
        id: &DepartmentId,
    ) -> Result<(), StoreError> {
        let mut guard = self.tenants.write().await;
        let tables = guard.get_mut(tenant).ok_or(StoreError::NotFound)?;
        let before = tables.departments.len();
        tables.departments.retain(|department| &department.id != id);
        if tables.departments.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn get_policy(&self, tenant: &TenantId) -> Result<Option<CompanyPolicy>, StoreError> {
        let guard = self.tenants.read().await;
        Ok(guard.get(tenant).and_then(|tables| tables.policy))
    }

    async fn put_policy(
        &self,
        tenant: &TenantId,
        policy: CompanyPolicy,
    ) -> Result<(), StoreError> {
        let mut guard = self.tenants.write().await;
        guard.entry(tenant.clone()).or_default().policy = Some(policy);
        Ok(())
    }
}

/// Notifier that only logs the verdict.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

#[async_trait]
impl DecisionNotifier for TracingNotifier {
    async fn notify(&self, notice: DecisionNotice) -> Result<(), NotifyError> {
        info!(request_id = %notice.request_id(), message = %notice.message(), "leave decision");
        Ok(())
    }
}
