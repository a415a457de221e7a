use crate::infra::LocalLeaveService;
use chrono::{Days, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use clap::Args;
use shiftfree::error::AppError;
use shiftfree::leave::{
    CompanyPolicy, FixedClock, InMemoryLeaveStore, LeaveService, LeaveStatus, LeaveSubmission,
    LeaveType, LedgerOutcome, NewEmployee, Role, RuleDraft, SubmissionOutcome, TenantId,
    TracingNotifier, UserId,
};
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Reference date for the walkthrough (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Tenant the demo data is written under.
    #[arg(long, default_value = "demo-co")]
    pub(crate) tenant: String,
}

const ROSTER: [(&str, &str); 2] = [("peter", "Peter Gibbons"), ("samir", "Samir Nagheenanajar")];

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let today = args.today.unwrap_or_else(|| Local::now().date_naive());
    let tenant = TenantId::new(args.tenant);
    let service = demo_service(today);

    println!("Leave auto-approval demo");
    println!("  Tenant: {tenant}");
    println!("  Reference date: {today}");

    for (id, name) in ROSTER {
        service
            .provision_employee(
                &tenant,
                NewEmployee {
                    id: UserId::new(id),
                    name: name.to_string(),
                    email: format!("{id}@example.test"),
                    role: Role::Employee,
                    job_title: Some("Analyst".to_string()),
                    department: "Software".to_string(),
                },
            )
            .await?;
        service
            .set_user_balance(&tenant, &UserId::new(id), LeaveType::Casual, 10, 0)
            .await?;
    }
    let rule = service
        .add_rule(
            &tenant,
            RuleDraft {
                leave_type: LeaveType::Casual,
                enabled: true,
                min_days_notice: 1,
                max_duration: 2,
                require_sufficient_balance: true,
            },
        )
        .await?;
    println!(
        "  Casual rule {}: notice >= 1 day, at most 2 day(s), balance required",
        rule.id
    );

    println!("\n1. One casual day, two days out");
    let approved = submit(&service, &tenant, "peter", LeaveType::Casual, today, 2, 2).await?;
    print_outcome(&approved);

    println!("\n2. Three casual days");
    let too_long = submit(&service, &tenant, "peter", LeaveType::Casual, today, 5, 7).await?;
    print_outcome(&too_long);

    println!("\n3. Casual day starting today");
    let short_notice = submit(&service, &tenant, "samir", LeaveType::Casual, today, 0, 0).await?;
    print_outcome(&short_notice);

    println!("\n4. Manager overrides an approval and then restores it");
    for next in [LeaveStatus::Rejected, LeaveStatus::Approved] {
        let change = service
            .decide_request(&tenant, &approved.request.id, next)
            .await?;
        println!(
            "  {} -> {}{}",
            change.previous,
            change.current,
            change
                .ledger
                .as_ref()
                .map(describe_ledger)
                .unwrap_or_default()
        );
    }

    println!("\n5. Annual allotment raised to 18 days");
    let update = service
        .update_policy(
            &tenant,
            CompanyPolicy {
                annual: 18,
                ..CompanyPolicy::default()
            },
        )
        .await?;
    println!("  {} balance row(s) updated", update.balances_updated);

    println!("\n6. Overlapping requests filed while the rule is off, then swept");
    service.toggle_rule(&tenant, &rule.id).await?;
    let first = submit(&service, &tenant, "samir", LeaveType::Casual, today, 9, 10).await?;
    let second = submit(&service, &tenant, "peter", LeaveType::Casual, today, 9, 10).await?;
    println!(
        "  {} and {} wait as {}",
        first.request.id, second.request.id, second.request.status
    );
    service.toggle_rule(&tenant, &rule.id).await?;
    let report = service.run_sweep(&tenant).await?;
    println!(
        "  Sweep evaluated {}, approved {}, rejected {}",
        report.evaluated, report.approved, report.rejected
    );

    println!("\nClosing balances");
    let snapshot = service.snapshot(&tenant).await?;
    for (id, _) in ROSTER {
        for row in snapshot.balances_for(&UserId::new(id)) {
            println!(
                "  {id:<6} {:<7} total {:>2} used {:>2} remaining {:>2}",
                row.leave_type.label(), row.total, row.used, row.remaining
            );
        }
    }

    Ok(())
}

fn demo_service(today: NaiveDate) -> LocalLeaveService {
    let now = Utc.from_utc_datetime(&today.and_time(NaiveTime::MIN));
    LeaveService::new(
        Arc::new(InMemoryLeaveStore::new()),
        Arc::new(TracingNotifier),
    )
    .with_clock(Arc::new(FixedClock(now)))
}

async fn submit(
    service: &LocalLeaveService,
    tenant: &TenantId,
    user: &str,
    leave_type: LeaveType,
    today: NaiveDate,
    from: u64,
    to: u64,
) -> Result<SubmissionOutcome, AppError> {
    let outcome = service
        .submit_request(
            tenant,
            LeaveSubmission {
                user_id: UserId::new(user),
                leave_type,
                start_date: today + Days::new(from),
                end_date: today + Days::new(to),
                reason: "demo".to_string(),
                utc_offset_minutes: None,
            },
        )
        .await?;
    Ok(outcome)
}

fn print_outcome(outcome: &SubmissionOutcome) {
    println!(
        "  {} for {} ({} day(s)): {}{}",
        outcome.request.id,
        outcome.request.user_name,
        outcome.request.days,
        outcome.decision.summary(),
        outcome
            .ledger
            .as_ref()
            .map(describe_ledger)
            .unwrap_or_default()
    );
}

fn describe_ledger(outcome: &LedgerOutcome) -> String {
    match outcome.balance() {
        Some(row) => format!(" [{} remaining {}]", row.leave_type, row.remaining),
        None => " [no balance row]".to_string(),
    }
}
