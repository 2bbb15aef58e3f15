use chrono::Utc;
use fleet_api::FleetService;
use fleet_auth::{Signer, Verifier};
use fleet_domain::{
    entities::TaskState,
    value_objects::{ClaimTasksRequest, CreateJobRequest, SubmitTaskResultRequest, TargetFieldsUpdate},
    Target,
};
use fleet_errors::FleetError;
use fleet_infrastructure::TimeoutHandler;
use fleet_testing_utils::{TargetBuilder, TestDatabase};

const SERVICE: &str = "fleet-agent";

async fn setup() -> anyhow::Result<(TestDatabase, FleetService)> {
    let db = TestDatabase::new().await?;
    let service = FleetService::new(
        db.repositories(),
        Verifier::new(300),
        TimeoutHandler::from_seconds(5),
    );
    Ok((db, service))
}

async fn enroll(service: &FleetService, target: &Target) -> anyhow::Result<Signer> {
    let signer = Signer::generate(SERVICE);
    service
        .register_identity(SERVICE, &signer.identity(), Some(target.id))
        .await?;
    Ok(signer)
}

fn filter_for(target: &Target) -> ClaimTasksRequest {
    ClaimTasksRequest {
        primary_ip: Some(target.primary_ip.clone()),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_end_to_end_scenario_with_signed_agents() -> anyhow::Result<()> {
    let (_db, service) = setup().await?;

    let tags = service
        .create_tags(&["linux".to_string(), "prod".to_string()])
        .await?;
    let (linux, prod) = (tags[0].id, tags[1].id);
    let x = service
        .create_target(&TargetBuilder::new("x").with_ip("10.0.0.1").with_tags(&[linux, prod]).build())
        .await?;
    let y = service
        .create_target(&TargetBuilder::new("y").with_ip("10.0.0.2").with_tags(&[linux]).build())
        .await?;
    let agent_x = enroll(&service, &x).await?;
    let agent_y = enroll(&service, &y).await?;

    let dispatched = service
        .create_job(&CreateJobRequest::new("hi", "echo hi", vec![linux, prod]))
        .await?;
    assert_eq!(dispatched.tasks.len(), 1);
    let task_id = dispatched.tasks[0].id;
    assert_eq!(dispatched.tasks[0].target_id, x.id);

    let none = service
        .claim_tasks(&agent_y.sign_request(), &filter_for(&y))
        .await?;
    assert!(none.is_empty());

    // y 不能认领 x 的任务
    let stolen = service.claim_task(&agent_y.sign_request(), task_id).await;
    assert!(matches!(stolen, Err(FleetError::Auth(_))));

    let headers = agent_x.sign_request();
    let (first, second) = tokio::join!(
        service.claim_task(&headers, task_id),
        service.claim_task(&headers, task_id)
    );
    let results = [first, second];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(FleetError::AlreadyClaimed { .. }))));

    let start = Utc::now();
    let result = SubmitTaskResultRequest::new(task_id, "hi\n").with_execution_window(start, Utc::now());
    let done = service
        .submit_task_result(&agent_x.sign_request(), &result)
        .await?;
    assert_eq!(done.state, TaskState::Completed);
    assert_eq!(done.exec_start_time, Some(start));

    let again = service
        .submit_task_result(&agent_x.sign_request(), &SubmitTaskResultRequest::new(task_id, "x"))
        .await;
    assert!(matches!(again, Err(FleetError::InvalidTransition { .. })));
    assert_eq!(service.get_task(task_id).await?.output.as_deref(), Some("hi\n"));
    Ok(())
}

#[tokio::test]
async fn test_agent_operations_reject_unknown_or_stale_callers() -> anyhow::Result<()> {
    let (_db, service) = setup().await?;
    let target = service
        .create_target(&TargetBuilder::new("x").build())
        .await?;

    let stranger = Signer::generate(SERVICE);
    let unregistered = service
        .claim_tasks(&stranger.sign_request(), &filter_for(&target))
        .await;
    assert!(matches!(unregistered, Err(FleetError::Auth(_))));

    let agent = enroll(&service, &target).await?;
    let stale = agent.sign_request_at(Utc::now().timestamp() - 301);
    assert!(matches!(
        service.claim_tasks(&stale, &filter_for(&target)).await,
        Err(FleetError::Auth(_))
    ));

    let mut wrong_service = agent.sign_request();
    wrong_service.service = "other".to_string();
    assert!(matches!(
        service.claim_tasks(&wrong_service, &filter_for(&target)).await,
        Err(FleetError::Auth(_))
    ));

    let unbound = Signer::generate(SERVICE);
    service
        .register_identity(SERVICE, &unbound.identity(), None)
        .await?;
    assert!(matches!(
        service.claim_tasks(&unbound.sign_request(), &filter_for(&target)).await,
        Err(FleetError::Auth(_))
    ));

    let fresh = service
        .claim_tasks(&agent.sign_request(), &filter_for(&target))
        .await?;
    assert!(fresh.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_claim_filter_errors_surface_to_agents() -> anyhow::Result<()> {
    let (_db, service) = setup().await?;
    let x = service
        .create_target(&TargetBuilder::new("x").with_ip("10.0.0.1").build())
        .await?;
    let y = service
        .create_target(&TargetBuilder::new("y").with_ip("10.0.0.2").build())
        .await?;
    let agent = enroll(&service, &x).await?;

    let empty = service
        .claim_tasks(&agent.sign_request(), &ClaimTasksRequest::default())
        .await;
    assert!(matches!(empty, Err(FleetError::Validation(_))));

    let unknown = ClaimTasksRequest {
        primary_ip: Some("172.16.0.9".to_string()),
        ..Default::default()
    };
    assert!(matches!(
        service.claim_tasks(&agent.sign_request(), &unknown).await,
        Err(FleetError::TargetNotFound(_))
    ));

    assert!(matches!(
        service.claim_tasks(&agent.sign_request(), &filter_for(&y)).await,
        Err(FleetError::Auth(_))
    ));
    Ok(())
}

#[tokio::test]
async fn test_tag_and_target_management() -> anyhow::Result<()> {
    let (_db, service) = setup().await?;

    let linux = service.create_tag("linux").await?;
    assert!(matches!(
        service.create_tag("linux").await,
        Err(FleetError::Conflict(_))
    ));
    assert!(matches!(
        service.create_tag("  ").await,
        Err(FleetError::Validation(_))
    ));

    let created = service
        .create_tags(&["a".to_string(), "a".to_string(), "b".to_string()])
        .await?;
    assert_eq!(created.len(), 2);
    assert_eq!(service.list_tags().await?.len(), 3);
    service.create_tags(&["a".to_string()]).await?;
    assert_eq!(service.list_tags().await?.len(), 3);

    let target = service
        .create_target(&TargetBuilder::new("web").with_ip("10.1.0.1").build())
        .await?;
    service.apply_tag_to_target(target.id, linux.id).await?;
    service.apply_tag_to_target(target.id, linux.id).await?;
    assert_eq!(service.get_target(target.id).await?.tag_ids, vec![linux.id]);
    assert_eq!(service.targets_with_tag(linux.id).await?.len(), 1);

    let updated = service
        .set_target_fields(
            target.id,
            &TargetFieldsUpdate {
                public_ip: Some("203.0.113.7".to_string()),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(updated.public_ip.as_deref(), Some("203.0.113.7"));
    assert!(matches!(
        service.set_target_fields(target.id, &TargetFieldsUpdate::default()).await,
        Err(FleetError::Validation(_))
    ));

    service.remove_tag_from_target(target.id, linux.id).await?;
    assert!(service.targets_with_tag(linux.id).await?.is_empty());

    service.delete_target(target.id).await?;
    assert!(matches!(
        service.get_target(target.id).await,
        Err(FleetError::NotFound { .. })
    ));
    Ok(())
}

#[tokio::test]
async fn test_job_chain_navigation() -> anyhow::Result<()> {
    let (_db, service) = setup().await?;

    let first = service
        .create_job(&CreateJobRequest::new("first", "echo 1", vec![]))
        .await?
        .job;
    let second = service
        .create_job(&CreateJobRequest::new("second", "echo 2", vec![]).after(first.id))
        .await?
        .job;

    assert_eq!(service.job_prev(second.id).await?.map(|j| j.id), Some(first.id));
    assert_eq!(service.job_next(first.id).await?.map(|j| j.id), Some(second.id));
    assert!(service.job_prev(first.id).await?.is_none());
    assert!(service.job_next(second.id).await?.is_none());
    assert!(matches!(
        service.job_next(9999).await,
        Err(FleetError::NotFound { .. })
    ));
    Ok(())
}

#[tokio::test]
async fn test_credentials_and_identity_registry() -> anyhow::Result<()> {
    let (_db, service) = setup().await?;
    let target = service
        .create_target(&TargetBuilder::new("db").build())
        .await?;

    let credential = service
        .add_credential_for_target(target.id, "postgres", "s3cret")
        .await?;
    assert_eq!(service.report_credential_failure(credential.id).await?, 1);
    assert_eq!(service.report_credential_failure(credential.id).await?, 2);
    assert_eq!(service.credentials_of_target(target.id).await?[0].fails, 2);
    assert!(matches!(
        service.add_credential_for_target(target.id + 100, "root", "x").await,
        Err(FleetError::NotFound { .. })
    ));

    assert!(matches!(
        service.register_identity(SERVICE, "not-a-key", None).await,
        Err(FleetError::Validation(_))
    ));
    let signer = Signer::generate(SERVICE);
    assert!(matches!(
        service
            .register_identity(SERVICE, &signer.identity(), Some(target.id + 100))
            .await,
        Err(FleetError::NotFound { .. })
    ));

    service
        .register_identity(SERVICE, &signer.identity(), Some(target.id))
        .await?;
    assert_eq!(service.list_identities().await?.len(), 1);

    // 删除目标后身份保留但解除绑定，凭据随目标删除
    service.delete_target(target.id).await?;
    let identities = service.list_identities().await?;
    assert_eq!(identities[0].target_id, None);
    assert!(service.list_credentials().await?.is_empty());

    service.revoke_identity(&signer.identity()).await?;
    assert!(matches!(
        service.revoke_identity(&signer.identity()).await,
        Err(FleetError::NotFound { .. })
    ));
    Ok(())
}
