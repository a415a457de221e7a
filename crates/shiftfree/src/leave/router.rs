use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{
    CompanyPolicy, DepartmentId, EmployeeProfile, LeaveStatus, LeaveSubmission, LeaveType,
    NewEmployee, RequestId, RuleDraft, RuleId, TenantId, UserId,
};
use super::ledger::LedgerOp;
use super::repository::{DecisionNotifier, LeaveStore, RequestFilter};
use super::service::{LeaveService, LeaveServiceError};

type SharedService<S, N> = Arc<LeaveService<S, N>>;

#[derive(Debug, Deserialize)]
pub struct DecisionPayload {
    pub status: LeaveStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct RequestQuery {
    pub status: Option<LeaveStatus>,
    pub user_id: Option<UserId>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BalanceQuery {
    pub user_id: Option<UserId>,
}

#[derive(Debug, Deserialize)]
pub struct BalanceAdjustment {
    pub user_id: UserId,
    pub leave_type: LeaveType,
    pub days: i32,
    pub op: LedgerOp,
}

#[derive(Debug, Deserialize)]
pub struct BalanceCorrection {
    pub user_id: UserId,
    pub leave_type: LeaveType,
    pub total: i32,
    pub used: i32,
}

#[derive(Debug, Deserialize)]
pub struct DepartmentPayload {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct RolePayload {
    pub role: String,
}

/// Tenant-scoped HTTP surface for requests, balances, policy, rules, and the roster.
pub fn leave_router<S, N>(service: SharedService<S, N>) -> Router
where
    S: LeaveStore + 'static,
    N: DecisionNotifier + 'static,
{
    Router::new()
        .route(
            "/api/v1/tenants/:tenant_id/leave-requests",
            post(submit_handler::<S, N>).get(list_requests_handler::<S, N>),
        )
        .route(
            "/api/v1/tenants/:tenant_id/leave-requests/:request_id",
            delete(delete_request_handler::<S, N>),
        )
        .route(
            "/api/v1/tenants/:tenant_id/leave-requests/:request_id/decision",
            post(decision_handler::<S, N>),
        )
        .route(
            "/api/v1/tenants/:tenant_id/sweep",
            post(sweep_handler::<S, N>),
        )
        .route(
            "/api/v1/tenants/:tenant_id/balances",
            get(list_balances_handler::<S, N>).put(correct_balance_handler::<S, N>),
        )
        .route(
            "/api/v1/tenants/:tenant_id/balances/adjust",
            post(adjust_balance_handler::<S, N>),
        )
        .route(
            "/api/v1/tenants/:tenant_id/policy",
            put(policy_handler::<S, N>),
        )
        .route(
            "/api/v1/tenants/:tenant_id/policy/renew",
            post(renew_handler::<S, N>),
        )
        .route(
            "/api/v1/tenants/:tenant_id/rules",
            get(list_rules_handler::<S, N>).post(add_rule_handler::<S, N>),
        )
        .route(
            "/api/v1/tenants/:tenant_id/rules/:rule_id",
            put(update_rule_handler::<S, N>).delete(delete_rule_handler::<S, N>),
        )
        .route(
            "/api/v1/tenants/:tenant_id/rules/:rule_id/toggle",
            post(toggle_rule_handler::<S, N>),
        )
        .route(
            "/api/v1/tenants/:tenant_id/employees",
            get(list_employees_handler::<S, N>).post(provision_employee_handler::<S, N>),
        )
        .route(
            "/api/v1/tenants/:tenant_id/employees/:user_id",
            put(update_employee_handler::<S, N>).delete(remove_employee_handler::<S, N>),
        )
        .route(
            "/api/v1/tenants/:tenant_id/departments",
            get(list_departments_handler::<S, N>).post(add_department_handler::<S, N>),
        )
        .route(
            "/api/v1/tenants/:tenant_id/departments/:department_id",
            delete(delete_department_handler::<S, N>),
        )
        .route(
            "/api/v1/tenants/:tenant_id/departments/:department_id/roles",
            post(add_role_handler::<S, N>),
        )
        .route(
            "/api/v1/tenants/:tenant_id/departments/:department_id/roles/:role",
            delete(remove_role_handler::<S, N>),
        )
        .with_state(service)
}

fn error_response(err: LeaveServiceError) -> Response {
    let payload = json!({
        "error": err.to_string(),
    });
    (err.status_code(), Json(payload)).into_response()
}

fn respond<T: serde::Serialize>(status: StatusCode, result: Result<T, LeaveServiceError>) -> Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(err) => error_response(err),
    }
}

fn no_content(result: Result<(), LeaveServiceError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn submit_handler<S, N>(
    State(service): State<SharedService<S, N>>,
    Path(tenant_id): Path<String>,
    Json(submission): Json<LeaveSubmission>,
) -> Response
where
    S: LeaveStore + 'static,
    N: DecisionNotifier + 'static,
{
    let tenant = TenantId(tenant_id);
    respond(
        StatusCode::CREATED,
        service.submit_request(&tenant, submission).await,
    )
}

pub(crate) async fn list_requests_handler<S, N>(
    State(service): State<SharedService<S, N>>,
    Path(tenant_id): Path<String>,
    Query(query): Query<RequestQuery>,
) -> Response
where
    S: LeaveStore + 'static,
    N: DecisionNotifier + 'static,
{
    let tenant = TenantId(tenant_id);
    let filter = RequestFilter {
        status: query.status,
        user_id: query.user_id,
    };
    let listing = service.snapshot(&tenant).await.map(|snapshot| {
        snapshot
            .requests
            .iter()
            .filter(|request| filter.matches(request))
            .cloned()
            .collect::<Vec<_>>()
    });
    respond(StatusCode::OK, listing)
}

pub(crate) async fn decision_handler<S, N>(
    State(service): State<SharedService<S, N>>,
    Path((tenant_id, request_id)): Path<(String, String)>,
    Json(payload): Json<DecisionPayload>,
) -> Response
where
    S: LeaveStore + 'static,
    N: DecisionNotifier + 'static,
{
    let tenant = TenantId(tenant_id);
    let request_id = RequestId(request_id);
    respond(
        StatusCode::OK,
        service
            .decide_request(&tenant, &request_id, payload.status)
            .await,
    )
}

pub(crate) async fn delete_request_handler<S, N>(
    State(service): State<SharedService<S, N>>,
    Path((tenant_id, request_id)): Path<(String, String)>,
) -> Response
where
    S: LeaveStore + 'static,
    N: DecisionNotifier + 'static,
{
    let tenant = TenantId(tenant_id);
    no_content(service.delete_request(&tenant, &RequestId(request_id)).await)
}

pub(crate) async fn sweep_handler<S, N>(
    State(service): State<SharedService<S, N>>,
    Path(tenant_id): Path<String>,
) -> Response
where
    S: LeaveStore + 'static,
    N: DecisionNotifier + 'static,
{
    let tenant = TenantId(tenant_id);
    respond(StatusCode::OK, service.run_sweep(&tenant).await)
}

pub(crate) async fn list_balances_handler<S, N>(
    State(service): State<SharedService<S, N>>,
    Path(tenant_id): Path<String>,
    Query(query): Query<BalanceQuery>,
) -> Response
where
    S: LeaveStore + 'static,
    N: DecisionNotifier + 'static,
{
    let tenant = TenantId(tenant_id);
    let listing = service.snapshot(&tenant).await.map(|snapshot| match &query.user_id {
        Some(user_id) => snapshot.balances_for(user_id),
        None => snapshot.balances.clone(),
    });
    respond(StatusCode::OK, listing)
}

pub(crate) async fn adjust_balance_handler<S, N>(
    State(service): State<SharedService<S, N>>,
    Path(tenant_id): Path<String>,
    Json(adjustment): Json<BalanceAdjustment>,
) -> Response
where
    S: LeaveStore + 'static,
    N: DecisionNotifier + 'static,
{
    let tenant = TenantId(tenant_id);
    respond(
        StatusCode::OK,
        service
            .adjust_balance(
                &tenant,
                &adjustment.user_id,
                adjustment.leave_type,
                adjustment.days,
                adjustment.op,
            )
            .await,
    )
}

pub(crate) async fn correct_balance_handler<S, N>(
    State(service): State<SharedService<S, N>>,
    Path(tenant_id): Path<String>,
    Json(correction): Json<BalanceCorrection>,
) -> Response
where
    S: LeaveStore + 'static,
    N: DecisionNotifier + 'static,
{
    let tenant = TenantId(tenant_id);
    respond(
        StatusCode::OK,
        service
            .set_user_balance(
                &tenant,
                &correction.user_id,
                correction.leave_type,
                correction.total,
                correction.used,
            )
            .await,
    )
}

pub(crate) async fn policy_handler<S, N>(
    State(service): State<SharedService<S, N>>,
    Path(tenant_id): Path<String>,
    Json(policy): Json<CompanyPolicy>,
) -> Response
where
    S: LeaveStore + 'static,
    N: DecisionNotifier + 'static,
{
    let tenant = TenantId(tenant_id);
    respond(StatusCode::OK, service.update_policy(&tenant, policy).await)
}

pub(crate) async fn renew_handler<S, N>(
    State(service): State<SharedService<S, N>>,
    Path(tenant_id): Path<String>,
) -> Response
where
    S: LeaveStore + 'static,
    N: DecisionNotifier + 'static,
{
    let tenant = TenantId(tenant_id);
    respond(StatusCode::OK, service.renew_yearly_balances(&tenant).await)
}

pub(crate) async fn list_rules_handler<S, N>(
    State(service): State<SharedService<S, N>>,
    Path(tenant_id): Path<String>,
) -> Response
where
    S: LeaveStore + 'static,
    N: DecisionNotifier + 'static,
{
    let tenant = TenantId(tenant_id);
    let rules = service
        .snapshot(&tenant)
        .await
        .map(|snapshot| snapshot.rules.clone());
    respond(StatusCode::OK, rules)
}

pub(crate) async fn add_rule_handler<S, N>(
    State(service): State<SharedService<S, N>>,
    Path(tenant_id): Path<String>,
    Json(draft): Json<RuleDraft>,
) -> Response
where
    S: LeaveStore + 'static,
    N: DecisionNotifier + 'static,
{
    let tenant = TenantId(tenant_id);
    respond(StatusCode::CREATED, service.add_rule(&tenant, draft).await)
}

pub(crate) async fn update_rule_handler<S, N>(
    State(service): State<SharedService<S, N>>,
    Path((tenant_id, rule_id)): Path<(String, String)>,
    Json(draft): Json<RuleDraft>,
) -> Response
where
    S: LeaveStore + 'static,
    N: DecisionNotifier + 'static,
{
    let tenant = TenantId(tenant_id);
    respond(
        StatusCode::OK,
        service.update_rule(&tenant, &RuleId(rule_id), draft).await,
    )
}

pub(crate) async fn toggle_rule_handler<S, N>(
    State(service): State<SharedService<S, N>>,
    Path((tenant_id, rule_id)): Path<(String, String)>,
) -> Response
where
    S: LeaveStore + 'static,
    N: DecisionNotifier + 'static,
{
    let tenant = TenantId(tenant_id);
    respond(
        StatusCode::OK,
        service.toggle_rule(&tenant, &RuleId(rule_id)).await,
    )
}

pub(crate) async fn delete_rule_handler<S, N>(
    State(service): State<SharedService<S, N>>,
    Path((tenant_id, rule_id)): Path<(String, String)>,
) -> Response
where
    S: LeaveStore + 'static,
    N: DecisionNotifier + 'static,
{
    let tenant = TenantId(tenant_id);
    no_content(service.delete_rule(&tenant, &RuleId(rule_id)).await)
}

pub(crate) async fn provision_employee_handler<S, N>(
    State(service): State<SharedService<S, N>>,
    Path(tenant_id): Path<String>,
    Json(new_employee): Json<NewEmployee>,
) -> Response
where
    S: LeaveStore + 'static,
    N: DecisionNotifier + 'static,
{
    let tenant = TenantId(tenant_id);
    respond(
        StatusCode::CREATED,
        service.provision_employee(&tenant, new_employee).await,
    )
}

pub(crate) async fn list_employees_handler<S, N>(
    State(service): State<SharedService<S, N>>,
    Path(tenant_id): Path<String>,
) -> Response
where
    S: LeaveStore + 'static,
    N: DecisionNotifier + 'static,
{
    let tenant = TenantId(tenant_id);
    let employees = service
        .snapshot(&tenant)
        .await
        .map(|snapshot| snapshot.employees.clone());
    respond(StatusCode::OK, employees)
}

pub(crate) async fn update_employee_handler<S, N>(
    State(service): State<SharedService<S, N>>,
    Path((tenant_id, user_id)): Path<(String, String)>,
    Json(profile): Json<EmployeeProfile>,
) -> Response
where
    S: LeaveStore + 'static,
    N: DecisionNotifier + 'static,
{
    let tenant = TenantId(tenant_id);
    respond(
        StatusCode::OK,
        service
            .update_employee(&tenant, &UserId(user_id), profile)
            .await,
    )
}

pub(crate) async fn remove_employee_handler<S, N>(
    State(service): State<SharedService<S, N>>,
    Path((tenant_id, user_id)): Path<(String, String)>,
) -> Response
where
    S: LeaveStore + 'static,
    N: DecisionNotifier + 'static,
{
    let tenant = TenantId(tenant_id);
    no_content(service.remove_employee(&tenant, &UserId(user_id)).await)
}

pub(crate) async fn list_departments_handler<S, N>(
    State(service): State<SharedService<S, N>>,
    Path(tenant_id): Path<String>,
) -> Response
where
    S: LeaveStore + 'static,
    N: DecisionNotifier + 'static,
{
    let tenant = TenantId(tenant_id);
    let departments = service
        .snapshot(&tenant)
        .await
        .map(|snapshot| snapshot.departments.clone());
    respond(StatusCode::OK, departments)
}

pub(crate) async fn add_department_handler<S, N>(
    State(service): State<SharedService<S, N>>,
    Path(tenant_id): Path<String>,
    Json(payload): Json<DepartmentPayload>,
) -> Response
where
    S: LeaveStore + 'static,
    N: DecisionNotifier + 'static,
{
    let tenant = TenantId(tenant_id);
    respond(
        StatusCode::CREATED,
        service.add_department(&tenant, &payload.name).await,
    )
}

pub(crate) async fn delete_department_handler<S, N>(
    State(service): State<SharedService<S, N>>,
    Path((tenant_id, department_id)): Path<(String, String)>,
) -> Response
where
    S: LeaveStore + 'static,
    N: DecisionNotifier + 'static,
{
    let tenant = TenantId(tenant_id);
    no_content(
        service
            .delete_department(&tenant, &DepartmentId(department_id))
            .await,
    )
}

pub(crate) async fn add_role_handler<S, N>(
    State(service): State<SharedService<S, N>>,
    Path((tenant_id, department_id)): Path<(String, String)>,
    Json(payload): Json<RolePayload>,
) -> Response
where
    S: LeaveStore + 'static,
    N: DecisionNotifier + 'static,
{
    let tenant = TenantId(tenant_id);
    respond(
        StatusCode::OK,
        service
            .add_role_to_department(&tenant, &DepartmentId(department_id), &payload.role)
            .await,
    )
}

pub(crate) async fn remove_role_handler<S, N>(
    State(service): State<SharedService<S, N>>,
    Path((tenant_id, department_id, role)): Path<(String, String, String)>,
) -> Response
where
    S: LeaveStore + 'static,
    N: DecisionNotifier + 'static,
{
    let tenant = TenantId(tenant_id);
    respond(
        StatusCode::OK,
        service
            .remove_role_from_department(&tenant, &DepartmentId(department_id), &role)
            .await,
    )
}
