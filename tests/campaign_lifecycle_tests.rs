//! End-to-end campaign lifecycle tests against a real database.
//!
//! Each test gets an isolated database via `#[sqlx::test]` with the crate
//! migrator, so tests seed their own contractors and never see each other.

use sqlx::PgPool;

use outreach_core::config::OutreachConfig;
use outreach_core::error::OutreachError;
use outreach_core::models::{
    CampaignStrategy, CheckIn, Escalation, NewCampaign, NewOutreachItem, OutreachChannel,
};
use outreach_core::orchestration::{
    BidRecording, CampaignManager, CompletionOutcome, ContractorPool, DispatchOutcome,
    EnqueueOutcome, OutcomeDisposition, SelectionFilters, TierRequest,
};
use outreach_core::state_machine::states::{CampaignPriority, EscalationLevel, PerformanceStatus};
use outreach_core::state_machine::{CampaignEvent, CampaignStateMachine};

fn manager(pool: &PgPool) -> CampaignManager {
    CampaignManager::new(pool.clone(), OutreachConfig::default())
}

fn new_campaign(bids_needed: i32, timeline_hours: i32) -> NewCampaign {
    NewCampaign {
        bid_card_id: 7001,
        strategy: CampaignStrategy {
            bids_needed,
            timeline_hours,
            expected_responses: 0,
            confidence_score: 1.0,
        },
        location: None,
        specialties: None,
    }
}

async fn seed_contractors(pool: &PgPool, tier: i32, count: i32) {
    let response_rate = match tier {
        1 => 0.9,
        2 => 0.5,
        _ => 0.33,
    };
    for i in 0..count {
        sqlx::query(
            r#"
            INSERT INTO contractors (company_name, tier, rating, historical_response_rate, service_area)
            VALUES ($1, $2, 4.0, $3, 'austin')
            "#,
        )
        .bind(format!("tier{tier}-co-{i}"))
        .bind(tier)
        .bind(response_rate)
        .execute(pool)
        .await
        .unwrap();
    }
}

/// Full pool: caps are 4/8/12 so seed exactly to the caps
async fn seed_full_pool(pool: &PgPool) {
    seed_contractors(pool, 1, 4).await;
    seed_contractors(pool, 2, 8).await;
    seed_contractors(pool, 3, 12).await;
}

/// Pull check-in scheduled times into the past so due-detection fires
async fn rewind_check_ins(pool: &PgPool, campaign_id: i64, through_number: i32) {
    sqlx::query(
        r#"
        UPDATE campaign_check_ins
        SET scheduled_at = NOW() - INTERVAL '1 hour'
        WHERE campaign_id = $1 AND check_in_number <= $2
        "#,
    )
    .bind(campaign_id)
    .bind(through_number)
    .execute(pool)
    .await
    .unwrap();
}

async fn rewind_campaign_start(pool: &PgPool, campaign_id: i64, hours: i32) {
    sqlx::query(
        "UPDATE outreach_campaigns SET started_at = NOW() - make_interval(hours => $2) WHERE campaign_id = $1",
    )
    .bind(campaign_id)
    .bind(hours)
    .execute(pool)
    .await
    .unwrap();
}

async fn item_count(pool: &PgPool, campaign_id: i64, status: Option<&str>) -> i64 {
    let row: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM outreach_queue_items WHERE campaign_id = $1 AND ($2::text IS NULL OR status = $2)",
    )
    .bind(campaign_id)
    .bind(status)
    .fetch_one(pool)
    .await
    .unwrap();
    row.0
}

#[sqlx::test(migrator = "outreach_core::test_helpers::MIGRATOR")]
async fn test_create_campaign_builds_full_schedule(pool: PgPool) {
    let manager = manager(&pool);
    let campaign = manager.create_campaign(new_campaign(10, 24)).await.unwrap();

    assert_eq!(campaign.status, "scheduled");
    assert_eq!(campaign.priority, "normal");

    let check_ins = CheckIn::for_campaign(&pool, campaign.campaign_id)
        .await
        .unwrap();
    assert_eq!(check_ins.len(), 4);

    let percentages: Vec<i32> = check_ins.iter().map(|ci| ci.check_in_percentage).collect();
    assert_eq!(percentages, vec![25, 50, 75, 100]);

    let expected: Vec<i32> = check_ins.iter().map(|ci| ci.expected_bids).collect();
    assert_eq!(expected, vec![3, 5, 8, 10]);

    for pair in check_ins.windows(2) {
        assert!(pair[0].scheduled_at < pair[1].scheduled_at);
    }

    // Deadline is exactly timeline_hours out from creation: both columns are
    // written from the same database NOW(), so there is no clock drift against
    // the check-in schedule anchored at created_at
    let deadline_offset = campaign.deadline_at - campaign.created_at;
    assert_eq!(deadline_offset, chrono::Duration::hours(24));
}

#[sqlx::test(migrator = "outreach_core::test_helpers::MIGRATOR")]
async fn test_invalid_strategy_is_rejected(pool: PgPool) {
    let manager = manager(&pool);

    let result = manager.create_campaign(new_campaign(0, 24)).await;
    match result {
        Err(err @ OutreachError::InvalidStrategy { .. }) => assert!(err.is_hard_failure()),
        other => panic!("expected InvalidStrategy, got {other:?}"),
    }

    let result = manager.create_campaign(new_campaign(10, -1)).await;
    assert!(matches!(result, Err(OutreachError::InvalidStrategy { .. })));
}

#[sqlx::test(migrator = "outreach_core::test_helpers::MIGRATOR")]
async fn test_start_campaign_enqueues_tier1_first(pool: PgPool) {
    seed_full_pool(&pool).await;
    let manager = manager(&pool);

    // 3 bids at the tier-1 prior of 0.9 needs 4 tier-1 contractors
    let campaign = manager.create_campaign(new_campaign(3, 24)).await.unwrap();
    let campaign = manager.start_campaign(campaign.campaign_id).await.unwrap();
    assert_eq!(campaign.status, "running");
    assert!(campaign.started_at.is_some());

    assert_eq!(item_count(&pool, campaign.campaign_id, None).await, 4);

    let tiers: Vec<(i32,)> = sqlx::query_as(
        r#"
        SELECT c.tier FROM outreach_queue_items oqi
        JOIN contractors c ON c.contractor_id = oqi.contractor_id
        WHERE oqi.campaign_id = $1
        "#,
    )
    .bind(campaign.campaign_id)
    .fetch_all(&pool)
    .await
    .unwrap();
    assert!(tiers.iter().all(|(tier,)| *tier == 1));

    // Starting again is rejected
    let result = manager.start_campaign(campaign.campaign_id).await;
    assert!(matches!(result, Err(OutreachError::AlreadyRunning { .. })));
}

#[sqlx::test(migrator = "outreach_core::test_helpers::MIGRATOR")]
async fn test_duplicate_bid_is_idempotent(pool: PgPool) {
    seed_contractors(&pool, 1, 4).await;
    let manager = manager(&pool);

    let campaign = manager.create_campaign(new_campaign(10, 24)).await.unwrap();
    manager.start_campaign(campaign.campaign_id).await.unwrap();

    let first = manager
        .record_bid_submitted(campaign.campaign_id, 9001)
        .await
        .unwrap();
    assert_eq!(first, BidRecording::Recorded);

    let second = manager
        .record_bid_submitted(campaign.campaign_id, 9001)
        .await
        .unwrap();
    assert_eq!(second, BidRecording::Duplicate);

    let row: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM campaign_bids WHERE campaign_id = $1")
            .bind(campaign.campaign_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(row.0, 1);
}

#[sqlx::test(migrator = "outreach_core::test_helpers::MIGRATOR")]
async fn test_campaign_completes_when_target_met(pool: PgPool) {
    seed_contractors(&pool, 1, 4).await;
    let manager = manager(&pool);

    let campaign = manager.create_campaign(new_campaign(2, 24)).await.unwrap();
    manager.start_campaign(campaign.campaign_id).await.unwrap();

    manager
        .record_bid_submitted(campaign.campaign_id, 9001)
        .await
        .unwrap();
    manager
        .record_bid_submitted(campaign.campaign_id, 9002)
        .await
        .unwrap();

    let campaign = outreach_core::models::Campaign::find_by_id(&pool, campaign.campaign_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(campaign.status, "completed");
    assert_eq!(campaign.final_bid_count, Some(2));
    assert!(campaign.completed_at.is_some());

    // Still-pending outreach is withdrawn on completion
    assert_eq!(item_count(&pool, campaign.campaign_id, Some("pending")).await, 0);
    assert!(item_count(&pool, campaign.campaign_id, Some("cancelled")).await > 0);

    let status = manager.campaign_status(campaign.campaign_id).await.unwrap();
    assert_eq!(status.performance_status, PerformanceStatus::Success);
}

#[sqlx::test(migrator = "outreach_core::test_helpers::MIGRATOR")]
async fn test_deadline_completion_below_target(pool: PgPool) {
    seed_contractors(&pool, 1, 4).await;
    let manager = manager(&pool);

    let campaign = manager.create_campaign(new_campaign(10, 24)).await.unwrap();
    manager.start_campaign(campaign.campaign_id).await.unwrap();
    manager
        .record_bid_submitted(campaign.campaign_id, 9001)
        .await
        .unwrap();

    // Not due yet
    let outcome = manager.complete_campaign(campaign.campaign_id).await.unwrap();
    assert_eq!(outcome, CompletionOutcome::NotDue);

    sqlx::query(
        "UPDATE outreach_campaigns SET deadline_at = NOW() - INTERVAL '1 minute' WHERE campaign_id = $1",
    )
    .bind(campaign.campaign_id)
    .execute(&pool)
    .await
    .unwrap();

    let outcome = manager.complete_campaign(campaign.campaign_id).await.unwrap();
    assert_eq!(
        outcome,
        CompletionOutcome::DeadlineCompleted { final_bid_count: 1 }
    );
}

#[sqlx::test(migrator = "outreach_core::test_helpers::MIGRATOR")]
async fn test_scenario_half_timeline_behind_escalates_severe(pool: PgPool) {
    seed_full_pool(&pool).await;
    let manager = manager(&pool);

    let campaign = manager.create_campaign(new_campaign(10, 24)).await.unwrap();
    manager.start_campaign(campaign.campaign_id).await.unwrap();
    rewind_campaign_start(&pool, campaign.campaign_id, 12).await;

    manager
        .record_bid_submitted(campaign.campaign_id, 9001)
        .await
        .unwrap();
    manager
        .record_bid_submitted(campaign.campaign_id, 9002)
        .await
        .unwrap();

    // Both the 25% and 50% check-ins come due; only the 50% one evaluates
    rewind_check_ins(&pool, campaign.campaign_id, 2).await;
    let now = chrono::Utc::now().naive_utc();
    let evaluations = manager.process_due_check_ins(now).await.unwrap();

    assert_eq!(evaluations.len(), 1);
    let evaluation = &evaluations[0];
    assert_eq!(evaluation.check_in.check_in_percentage, 50);
    assert!((evaluation.performance_ratio - 0.4).abs() < f64::EPSILON);
    assert!(!evaluation.on_track);
    assert_eq!(evaluation.level, EscalationLevel::Severe);

    let escalation = evaluation.escalation.as_ref().unwrap();
    assert_eq!(escalation.escalation_level, "severe");
    assert!(escalation.total_contractors_added() > 0);
    assert_eq!(
        escalation.priority_raised_to.as_deref(),
        Some("urgent")
    );

    let campaign = outreach_core::models::Campaign::find_by_id(&pool, campaign.campaign_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(campaign.current_priority(), CampaignPriority::Urgent);
    assert!(campaign.escalated);

    // The stale 25% check-in was skipped, never evaluated
    let check_ins = CheckIn::for_campaign(&pool, campaign.campaign_id).await.unwrap();
    assert!(check_ins[0].skipped);
    assert!(check_ins[0].completed_at.is_some());
    assert!(check_ins[0].actual_bids.is_none());
    assert!(!check_ins[1].skipped);
    assert_eq!(check_ins[1].actual_bids, Some(2));

    let status = manager.campaign_status(campaign.campaign_id).await.unwrap();
    assert_eq!(status.performance_status, PerformanceStatus::Escalated);
}

#[sqlx::test(migrator = "outreach_core::test_helpers::MIGRATOR")]
async fn test_scenario_on_pace_no_escalation(pool: PgPool) {
    seed_full_pool(&pool).await;
    let manager = manager(&pool);

    let campaign = manager.create_campaign(new_campaign(10, 24)).await.unwrap();
    manager.start_campaign(campaign.campaign_id).await.unwrap();
    rewind_campaign_start(&pool, campaign.campaign_id, 12).await;

    for contractor_id in 9001..9006 {
        manager
            .record_bid_submitted(campaign.campaign_id, contractor_id)
            .await
            .unwrap();
    }

    rewind_check_ins(&pool, campaign.campaign_id, 2).await;
    let now = chrono::Utc::now().naive_utc();
    let evaluations = manager.process_due_check_ins(now).await.unwrap();

    assert_eq!(evaluations.len(), 1);
    assert!(evaluations[0].on_track);
    assert_eq!(evaluations[0].level, EscalationLevel::None);
    assert!(evaluations[0].escalation.is_none());

    let escalations = manager.escalation_history(campaign.campaign_id).await.unwrap();
    assert!(escalations.is_empty());

    let status = manager.campaign_status(campaign.campaign_id).await.unwrap();
    assert_eq!(status.performance_status, PerformanceStatus::OnTrack);
    assert_eq!(status.bids_submitted, 5);
    // 5 bids at hour 12 of 24 projects linearly to 10
    assert_eq!(status.projected_final_bids, 10);
}

#[sqlx::test(migrator = "outreach_core::test_helpers::MIGRATOR")]
async fn test_escalation_success_backfilled_at_next_check_in(pool: PgPool) {
    seed_full_pool(&pool).await;
    let manager = manager(&pool);

    let campaign = manager.create_campaign(new_campaign(10, 24)).await.unwrap();
    manager.start_campaign(campaign.campaign_id).await.unwrap();
    rewind_campaign_start(&pool, campaign.campaign_id, 12).await;

    manager
        .record_bid_submitted(campaign.campaign_id, 9001)
        .await
        .unwrap();
    manager
        .record_bid_submitted(campaign.campaign_id, 9002)
        .await
        .unwrap();

    rewind_check_ins(&pool, campaign.campaign_id, 2).await;
    let now = chrono::Utc::now().naive_utc();
    manager.process_due_check_ins(now).await.unwrap();

    let escalations = manager.escalation_history(campaign.campaign_id).await.unwrap();
    assert_eq!(escalations.len(), 1);
    assert!(escalations[0].resolved_at.is_none());

    // The escalation works: 4 more bids arrive before the 75% check-in,
    // lifting the ratio from 0.4 to 6/8 = 0.75
    for contractor_id in 9003..9007 {
        manager
            .record_bid_submitted(campaign.campaign_id, contractor_id)
            .await
            .unwrap();
    }
    rewind_check_ins(&pool, campaign.campaign_id, 3).await;
    manager
        .process_due_check_ins(chrono::Utc::now().naive_utc())
        .await
        .unwrap();

    let escalations = Escalation::for_campaign(&pool, campaign.campaign_id).await.unwrap();
    assert!(escalations[0].resolved_at.is_some());
    assert_eq!(escalations[0].escalation_successful, Some(true));
}

#[sqlx::test(migrator = "outreach_core::test_helpers::MIGRATOR")]
async fn test_paused_campaign_skips_due_check_ins(pool: PgPool) {
    seed_contractors(&pool, 1, 4).await;
    let manager = manager(&pool);

    let campaign = manager.create_campaign(new_campaign(10, 24)).await.unwrap();
    manager.start_campaign(campaign.campaign_id).await.unwrap();
    manager.pause_campaign(campaign.campaign_id).await.unwrap();

    rewind_check_ins(&pool, campaign.campaign_id, 1).await;
    let evaluations = manager
        .process_due_check_ins(chrono::Utc::now().naive_utc())
        .await
        .unwrap();
    assert!(evaluations.is_empty());

    let check_ins = CheckIn::for_campaign(&pool, campaign.campaign_id).await.unwrap();
    assert!(check_ins[0].completed_at.is_none());

    // After resume the same check-in evaluates normally
    manager.resume_campaign(campaign.campaign_id).await.unwrap();
    rewind_campaign_start(&pool, campaign.campaign_id, 6).await;
    let evaluations = manager
        .process_due_check_ins(chrono::Utc::now().naive_utc())
        .await
        .unwrap();
    assert_eq!(evaluations.len(), 1);
    assert_eq!(evaluations[0].check_in.check_in_percentage, 25);
}

#[sqlx::test(migrator = "outreach_core::test_helpers::MIGRATOR")]
async fn test_cancel_campaign_withdraws_pending_outreach(pool: PgPool) {
    seed_contractors(&pool, 1, 4).await;
    let manager = manager(&pool);

    let campaign = manager.create_campaign(new_campaign(3, 24)).await.unwrap();
    manager.start_campaign(campaign.campaign_id).await.unwrap();
    assert!(item_count(&pool, campaign.campaign_id, Some("pending")).await > 0);

    let campaign = manager.cancel_campaign(campaign.campaign_id).await.unwrap();
    assert_eq!(campaign.status, "cancelled");
    assert_eq!(item_count(&pool, campaign.campaign_id, Some("pending")).await, 0);

    // Terminal: no transitions out of cancelled
    let result = manager.start_campaign(campaign.campaign_id).await;
    assert!(matches!(result, Err(OutreachError::InvalidTransition { .. })));
}

#[sqlx::test(migrator = "outreach_core::test_helpers::MIGRATOR")]
async fn test_stale_transition_cannot_revive_cancelled_campaign(pool: PgPool) {
    seed_contractors(&pool, 1, 4).await;
    let manager = manager(&pool);

    let campaign = manager.create_campaign(new_campaign(3, 24)).await.unwrap();
    let running = manager.start_campaign(campaign.campaign_id).await.unwrap();
    manager.cancel_campaign(campaign.campaign_id).await.unwrap();

    // A pause built from the pre-cancel read loses the compare-and-swap and
    // must not pull the campaign back out of its terminal state
    let mut stale =
        CampaignStateMachine::new(running, pool.clone(), manager.event_publisher().clone());
    let result = stale.transition(CampaignEvent::Pause).await;
    assert!(matches!(result, Err(OutreachError::InvalidTransition { .. })));

    let campaign = outreach_core::models::Campaign::find_by_id(&pool, campaign.campaign_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(campaign.status, "cancelled");
}

#[sqlx::test(migrator = "outreach_core::test_helpers::MIGRATOR")]
async fn test_scenario_pool_exhausted_escalation_marks_at_risk(pool: PgPool) {
    // Far fewer contractors than the strategy wants: 4 tier-1 and 2 tier-2,
    // nothing in tier 3
    seed_contractors(&pool, 1, 4).await;
    seed_contractors(&pool, 2, 2).await;
    let manager = manager(&pool);

    let campaign = manager.create_campaign(new_campaign(10, 24)).await.unwrap();
    manager.start_campaign(campaign.campaign_id).await.unwrap();
    // Initial selection already drained the whole pool
    assert_eq!(item_count(&pool, campaign.campaign_id, None).await, 6);

    rewind_campaign_start(&pool, campaign.campaign_id, 12).await;
    manager
        .record_bid_submitted(campaign.campaign_id, 9001)
        .await
        .unwrap();
    manager
        .record_bid_submitted(campaign.campaign_id, 9002)
        .await
        .unwrap();

    rewind_check_ins(&pool, campaign.campaign_id, 2).await;
    let evaluations = manager
        .process_due_check_ins(chrono::Utc::now().naive_utc())
        .await
        .unwrap();

    // 2/5 at half timeline still escalates severe, but nobody is left to add
    assert_eq!(evaluations.len(), 1);
    let evaluation = &evaluations[0];
    assert_eq!(evaluation.level, EscalationLevel::Severe);
    assert!(evaluation.pool_exhausted);

    let escalation = evaluation.escalation.as_ref().unwrap();
    assert_eq!(escalation.total_contractors_added(), 0);
    assert!(escalation.escalation_successful.is_none());
    assert!(escalation.resolved_at.is_none());

    // An escalation that could add nobody needs human attention
    let status = manager.campaign_status(campaign.campaign_id).await.unwrap();
    assert_eq!(status.performance_status, PerformanceStatus::AtRisk);
}

#[sqlx::test(migrator = "outreach_core::test_helpers::MIGRATOR")]
async fn test_monthly_capped_contractor_excluded_from_selection(pool: PgPool) {
    seed_contractors(&pool, 1, 2).await;

    // Contractor 1 is at the monthly cap of 8; the contacts sit outside the
    // weekly window so only the monthly filter can exclude them
    for _ in 0..8 {
        sqlx::query(
            "INSERT INTO contractor_contacts (contractor_id, contacted_at) VALUES (1, NOW() - INTERVAL '10 days')",
        )
        .execute(&pool)
        .await
        .unwrap();
    }

    let contractor_pool = ContractorPool::new(pool.clone());
    let filters = SelectionFilters {
        location: Some("austin".to_string()),
        specialties: None,
        relaxed: false,
    };
    let result = contractor_pool
        .select_contractors(
            7001,
            TierRequest {
                tier1: 2,
                tier2: 0,
                tier3: 0,
            },
            &filters,
            3,
            8,
        )
        .await
        .unwrap();

    // Both match tier and location; only the uncapped contractor is selected
    assert!(result.partial);
    assert_eq!(result.contractors.len(), 1);
    assert_eq!(result.contractors[0].contractor_id, 2);
}

#[sqlx::test(migrator = "outreach_core::test_helpers::MIGRATOR")]
async fn test_contact_cap_blocks_enqueue(pool: PgPool) {
    seed_contractors(&pool, 1, 1).await;
    let manager = manager(&pool);
    let campaign = manager.create_campaign(new_campaign(5, 24)).await.unwrap();

    // Contractor 1 already at the weekly cap of 3
    for _ in 0..3 {
        sqlx::query(
            "INSERT INTO contractor_contacts (contractor_id, contacted_at) VALUES (1, NOW() - INTERVAL '1 day')",
        )
        .execute(&pool)
        .await
        .unwrap();
    }

    let outcome = manager
        .outreach_queue()
        .enqueue(NewOutreachItem {
            campaign_id: campaign.campaign_id,
            contractor_id: 1,
            bid_card_id: campaign.bid_card_id,
            channel: OutreachChannel::Email,
            priority: CampaignPriority::Normal,
            max_retries: 3,
        })
        .await
        .unwrap();
    assert!(matches!(outcome, EnqueueOutcome::CapExceeded));
    assert_eq!(item_count(&pool, campaign.campaign_id, None).await, 0);
}

#[sqlx::test(migrator = "outreach_core::test_helpers::MIGRATOR")]
async fn test_duplicate_send_suppressed_and_slot_released(pool: PgPool) {
    seed_contractors(&pool, 1, 1).await;
    let manager = manager(&pool);
    let campaign = manager.create_campaign(new_campaign(5, 24)).await.unwrap();

    let item = NewOutreachItem {
        campaign_id: campaign.campaign_id,
        contractor_id: 1,
        bid_card_id: campaign.bid_card_id,
        channel: OutreachChannel::Email,
        priority: CampaignPriority::Normal,
        max_retries: 3,
    };

    let first = manager.outreach_queue().enqueue(item.clone()).await.unwrap();
    assert!(first.is_enqueued());

    let second = manager.outreach_queue().enqueue(item).await.unwrap();
    assert!(matches!(second, EnqueueOutcome::DuplicateSuppressed));

    // The suppressed attempt released its contact-cap reservation
    let row: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM contractor_contacts WHERE contractor_id = 1")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(row.0, 1);
    assert_eq!(item_count(&pool, campaign.campaign_id, None).await, 1);
}

#[sqlx::test(migrator = "outreach_core::test_helpers::MIGRATOR")]
async fn test_dispatch_retry_until_exhaustion(pool: PgPool) {
    seed_contractors(&pool, 1, 1).await;
    let manager = manager(&pool);
    let campaign = manager.create_campaign(new_campaign(5, 24)).await.unwrap();

    manager
        .outreach_queue()
        .enqueue(NewOutreachItem {
            campaign_id: campaign.campaign_id,
            contractor_id: 1,
            bid_card_id: campaign.bid_card_id,
            channel: OutreachChannel::Email,
            priority: CampaignPriority::Normal,
            max_retries: 3,
        })
        .await
        .unwrap();

    let batch = manager.outreach_queue().dequeue(10).await.unwrap();
    assert_eq!(batch.len(), 1);
    let item_id = batch[0].outreach_item_id;

    let failed = DispatchOutcome::Failed {
        error: "smtp timeout".to_string(),
    };
    let first = manager
        .outreach_queue()
        .report_outcome(item_id, failed.clone())
        .await
        .unwrap();
    assert_eq!(first, OutcomeDisposition::RetryScheduled { retry_count: 1 });

    let second = manager
        .outreach_queue()
        .report_outcome(item_id, failed.clone())
        .await
        .unwrap();
    assert_eq!(second, OutcomeDisposition::RetryScheduled { retry_count: 2 });

    let third = manager
        .outreach_queue()
        .report_outcome(item_id, failed)
        .await
        .unwrap();
    assert_eq!(third, OutcomeDisposition::RetriesExhausted);

    let row: (String, String) = sqlx::query_as(
        "SELECT status, last_error FROM outreach_queue_items WHERE outreach_item_id = $1",
    )
    .bind(item_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(row.0, "failed");
    assert_eq!(row.1, "smtp timeout");

    // A terminal failure still counts against the contractor's contact caps
    let row: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM contractor_contacts WHERE contractor_id = 1")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(row.0, 1);
}

#[sqlx::test(migrator = "outreach_core::test_helpers::MIGRATOR")]
async fn test_lifecycle_events_published(pool: PgPool) {
    seed_contractors(&pool, 1, 4).await;
    let manager = manager(&pool);
    let mut receiver = manager.event_publisher().subscribe();

    let campaign = manager.create_campaign(new_campaign(3, 24)).await.unwrap();
    manager.start_campaign(campaign.campaign_id).await.unwrap();

    let mut names = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        names.push(event.name);
    }
    assert!(names.iter().any(|n| n == "campaign.created"));
    assert!(names.iter().any(|n| n == "campaign.started"));
    assert!(names.iter().any(|n| n == "outreach.enqueued"));
}
