use std::sync::Arc;

use chrono::Utc;
use fleet_core::DatabaseConfig;
use fleet_domain::{
    entities::TaskState,
    repositories::*,
    value_objects::{
        ClaimTasksRequest, CreateJobRequest, NewTarget, NewTask, SubmitTaskResultRequest,
        TargetFieldsUpdate,
    },
};
use fleet_errors::{FleetError, FleetResult};
use fleet_infrastructure::{
    DatabaseManager, SqliteCredentialRepository, SqliteIdentityRepository, SqliteJobRepository,
    SqliteTagRepository, SqliteTargetRepository, SqliteTaskRepository,
};
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    manager: DatabaseManager,
}

impl Fixture {
    async fn new() -> FleetResult<Self> {
        let dir = tempfile::tempdir().map_err(|e| FleetError::Internal(e.to_string()))?;
        let config = DatabaseConfig {
            url: format!("sqlite://{}", dir.path().join("fleet.db").display()),
            max_connections: 8,
            min_connections: 1,
            ..Default::default()
        };
        let manager = DatabaseManager::new(&config).await?;
        manager.migrate().await?;
        Ok(Self { _dir: dir, manager })
    }

    fn targets(&self) -> SqliteTargetRepository {
        SqliteTargetRepository::new(self.manager.pool().clone())
    }
    fn tags(&self) -> SqliteTagRepository {
        SqliteTagRepository::new(self.manager.pool().clone())
    }
    fn jobs(&self) -> SqliteJobRepository {
        SqliteJobRepository::new(self.manager.pool().clone())
    }
    fn tasks(&self) -> SqliteTaskRepository {
        SqliteTaskRepository::new(self.manager.pool().clone())
    }
    fn credentials(&self) -> SqliteCredentialRepository {
        SqliteCredentialRepository::new(self.manager.pool().clone())
    }
    fn identities(&self) -> SqliteIdentityRepository {
        SqliteIdentityRepository::new(self.manager.pool().clone())
    }
}

#[tokio::test]
async fn test_migrations_are_idempotent() -> FleetResult<()> {
    let fx = Fixture::new().await?;
    fx.manager.migrate().await?;
    fx.manager.health_check().await?;
    Ok(())
}

#[tokio::test]
async fn test_tag_names_are_unique() -> FleetResult<()> {
    let fx = Fixture::new().await?;
    let tags = fx.tags();

    let linux = tags.create("linux").await?;
    assert_eq!(linux.name, "linux");

    let err = tags.create("linux").await.unwrap_err();
    assert!(matches!(err, FleetError::Conflict(_)), "{err:?}");

    assert_eq!(tags.get_by_name("linux").await?, Some(linux));
    Ok(())
}

#[tokio::test]
async fn test_get_or_create_many_reuses_existing_names() -> FleetResult<()> {
    let fx = Fixture::new().await?;
    let tags = fx.tags();

    let names = vec!["a".to_string(), "a".to_string(), "b".to_string()];
    let first = tags.get_or_create_many(&names).await?;
    assert_eq!(first.len(), 2);
    assert_eq!(first[0].name, "a");
    assert_eq!(first[1].name, "b");
    assert_eq!(tags.list().await?.len(), 2);

    let again = tags.get_or_create_many(&["a".to_string()]).await?;
    assert_eq!(again, vec![first[0].clone()]);
    assert_eq!(tags.list().await?.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_target_crud_and_partial_update() -> FleetResult<()> {
    let fx = Fixture::new().await?;
    let targets = fx.targets();
    let tag = fx.tags().create("linux").await?;

    let created = targets
        .create(&NewTarget::new("web-1", "10.0.0.1").with_tags(vec![tag.id, tag.id]))
        .await?;
    assert_eq!(created.tag_ids, vec![tag.id]);

    let updated = targets
        .update_fields(
            created.id,
            &TargetFieldsUpdate {
                hostname: Some("web-1.internal".to_string()),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(updated.hostname.as_deref(), Some("web-1.internal"));
    assert_eq!(updated.name, "web-1");
    assert_eq!(updated.primary_ip, "10.0.0.1");

    let dup = targets.create(&NewTarget::new("web-1", "10.0.0.1")).await;
    assert!(matches!(dup, Err(FleetError::Conflict(_))));

    targets.delete(created.id).await?;
    assert!(targets.get_by_id(created.id).await?.is_none());
    assert!(matches!(
        targets.delete(created.id).await,
        Err(FleetError::NotFound { .. })
    ));
    Ok(())
}

#[tokio::test]
async fn test_find_with_all_tags_is_a_logical_and() -> FleetResult<()> {
    let fx = Fixture::new().await?;
    let tags = fx.tags();
    let targets = fx.targets();

    let linux = tags.create("linux").await?;
    let prod = tags.create("prod").await?;
    let x = targets
        .create(&NewTarget::new("x", "10.0.0.1").with_tags(vec![linux.id, prod.id]))
        .await?;
    let y = targets
        .create(&NewTarget::new("y", "10.0.0.2").with_tags(vec![linux.id]))
        .await?;

    let both = targets.find_with_all_tags(&[linux.id, prod.id]).await?;
    assert_eq!(both.iter().map(|t| t.id).collect::<Vec<_>>(), vec![x.id]);

    let only_linux = targets.find_with_all_tags(&[linux.id]).await?;
    assert_eq!(
        only_linux.iter().map(|t| t.id).collect::<Vec<_>>(),
        vec![x.id, y.id]
    );

    assert!(targets.find_with_all_tags(&[]).await?.is_empty());
    assert!(targets.find_with_all_tags(&[linux.id, 9999]).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_tag_links_have_set_semantics() -> FleetResult<()> {
    let fx = Fixture::new().await?;
    let targets = fx.targets();
    let tag = fx.tags().create("linux").await?;
    let target = targets.create(&NewTarget::new("x", "10.0.0.1")).await?;

    targets.add_tags(target.id, &[tag.id]).await?;
    targets.add_tags(target.id, &[tag.id]).await?;
    assert_eq!(targets.get_by_id(target.id).await?.unwrap().tag_ids, vec![tag.id]);

    targets.remove_tags(target.id, &[tag.id]).await?;
    targets.remove_tags(target.id, &[tag.id]).await?;
    assert!(targets.get_by_id(target.id).await?.unwrap().tag_ids.is_empty());

    let unknown_tag = targets.add_tags(target.id, &[4242]).await;
    assert!(matches!(unknown_tag, Err(FleetError::Validation(_))));

    let unknown_target = targets.add_tags(4242, &[tag.id]).await;
    assert!(matches!(unknown_target, Err(FleetError::NotFound { .. })));
    Ok(())
}

#[tokio::test]
async fn test_find_by_host_ands_fields() -> FleetResult<()> {
    let fx = Fixture::new().await?;
    let targets = fx.targets();

    let mut a = NewTarget::new("a", "10.0.0.1");
    a.hostname = Some("shared".to_string());
    let a = targets.create(&a).await?;
    let mut b = NewTarget::new("b", "10.0.0.2");
    b.hostname = Some("shared".to_string());
    targets.create(&b).await?;

    let filter = ClaimTasksRequest {
        hostname: Some("shared".to_string()),
        primary_ip: Some("10.0.0.1".to_string()),
        ..Default::default()
    };
    let found = targets.find_by_host(&filter).await?;
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, a.id);

    assert!(targets.find_by_host(&ClaimTasksRequest::default()).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_job_chain_next_is_derived_from_prev() -> FleetResult<()> {
    let fx = Fixture::new().await?;
    let jobs = fx.jobs();
    let now = Utc::now();

    let first = jobs.create(&CreateJobRequest::new("first", "echo 1", vec![]), now).await?;
    let second = jobs
        .create(&CreateJobRequest::new("second", "echo 2", vec![]).after(first.id), now)
        .await?;

    assert_eq!(second.prev_id, Some(first.id));
    assert_eq!(jobs.find_next(first.id).await?.map(|j| j.id), Some(second.id));
    assert!(jobs.find_next(second.id).await?.is_none());

    let dangling = jobs
        .create(&CreateJobRequest::new("dangling", "x", vec![]).after(9999), now)
        .await;
    assert!(matches!(dangling, Err(FleetError::Validation(_))));
    Ok(())
}

#[tokio::test]
async fn test_task_claim_and_complete_are_conditional() -> FleetResult<()> {
    let fx = Fixture::new().await?;
    let target = fx.targets().create(&NewTarget::new("x", "10.0.0.1")).await?;
    let job = fx
        .jobs()
        .create(&CreateJobRequest::new("job", "echo hi", vec![]), Utc::now())
        .await?;
    let tasks = fx.tasks();

    let task = tasks
        .create(&NewTask {
            job_id: job.id,
            target_id: target.id,
            content: job.content.clone(),
            queue_time: job.created_at,
            tag_ids: vec![],
        })
        .await?;
    assert_eq!(task.state, TaskState::Queued);
    assert_eq!(task.queue_time, job.created_at);

    // 排队状态下不能完成
    let early = tasks
        .complete(&SubmitTaskResultRequest::new(task.id, "x"), Utc::now())
        .await?;
    assert!(early.is_none());

    let claimed = tasks.claim(task.id, Utc::now()).await?.expect("first claim wins");
    assert_eq!(claimed.state, TaskState::Claimed);
    assert!(claimed.claim_time.is_some());
    assert!(tasks.claim(task.id, Utc::now()).await?.is_none());

    let done = tasks
        .complete(&SubmitTaskResultRequest::new(task.id, "hi\n"), Utc::now())
        .await?
        .expect("claimed task completes");
    assert_eq!(done.state, TaskState::Completed);
    assert_eq!(done.output.as_deref(), Some("hi\n"));

    let again = tasks
        .complete(&SubmitTaskResultRequest::new(task.id, "overwrite"), Utc::now())
        .await?;
    assert!(again.is_none());
    let stored = tasks.get_by_id(task.id).await?.unwrap();
    assert_eq!(stored.output.as_deref(), Some("hi\n"));
    Ok(())
}

#[tokio::test]
async fn test_concurrent_claims_have_one_winner() -> FleetResult<()> {
    let fx = Fixture::new().await?;
    let target = fx.targets().create(&NewTarget::new("x", "10.0.0.1")).await?;
    let job = fx
        .jobs()
        .create(&CreateJobRequest::new("job", "echo hi", vec![]), Utc::now())
        .await?;
    let tasks = Arc::new(fx.tasks());
    let task = tasks
        .create(&NewTask {
            job_id: job.id,
            target_id: target.id,
            content: job.content.clone(),
            queue_time: job.created_at,
            tag_ids: vec![],
        })
        .await?;

    let attempts = (0..16).map(|_| {
        let tasks = Arc::clone(&tasks);
        tokio::spawn(async move { tasks.claim(task.id, Utc::now()).await })
    });
    let results = futures::future::join_all(attempts).await;

    let mut winners = 0;
    for result in results {
        let claimed = result.map_err(|e| FleetError::Internal(e.to_string()))??;
        if claimed.is_some() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
    Ok(())
}

#[tokio::test]
async fn test_claim_queued_for_target_skips_other_targets() -> FleetResult<()> {
    let fx = Fixture::new().await?;
    let x = fx.targets().create(&NewTarget::new("x", "10.0.0.1")).await?;
    let y = fx.targets().create(&NewTarget::new("y", "10.0.0.2")).await?;
    let job = fx
        .jobs()
        .create(&CreateJobRequest::new("job", "echo hi", vec![]), Utc::now())
        .await?;
    let tasks = fx.tasks();

    for target_id in [x.id, x.id, y.id] {
        tasks
            .create(&NewTask {
                job_id: job.id,
                target_id,
                content: job.content.clone(),
                queue_time: job.created_at,
                tag_ids: vec![],
            })
            .await?;
    }

    let claimed = tasks.claim_queued_for_target(x.id, Utc::now()).await?;
    assert_eq!(claimed.len(), 2);
    assert!(claimed.iter().all(|t| t.target_id == x.id && t.is_claimed()));
    assert!(tasks.claim_queued_for_target(x.id, Utc::now()).await?.is_empty());

    let remaining = tasks.list_by_target(y.id).await?;
    assert!(remaining.iter().all(|t| t.is_queued()));
    Ok(())
}

#[tokio::test]
async fn test_credential_fail_counter() -> FleetResult<()> {
    let fx = Fixture::new().await?;
    let target = fx.targets().create(&NewTarget::new("x", "10.0.0.1")).await?;
    let credentials = fx.credentials();

    let credential = credentials.create(target.id, "root", "toor").await?;
    assert_eq!(credential.fails, 0);
    assert_eq!(credentials.increment_fails(credential.id).await?, Some(1));
    assert_eq!(credentials.increment_fails(credential.id).await?, Some(2));
    assert_eq!(credentials.increment_fails(4242).await?, None);

    assert_eq!(credentials.list_by_target(target.id).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_identity_registration_upserts() -> FleetResult<()> {
    let fx = Fixture::new().await?;
    let target = fx.targets().create(&NewTarget::new("x", "10.0.0.1")).await?;
    let identities = fx.identities();

    identities.register("fleet-agent", "cHVia2V5", None).await?;
    let rebound = identities
        .register("fleet-agent", "cHVia2V5", Some(target.id))
        .await?;
    assert_eq!(rebound.target_id, Some(target.id));
    assert_eq!(identities.list().await?.len(), 1);

    assert!(identities.find("fleet-agent", "cHVia2V5").await?.is_some());
    assert!(identities.find("other-service", "cHVia2V5").await?.is_none());

    assert!(identities.revoke("cHVia2V5").await?);
    assert!(!identities.revoke("cHVia2V5").await?);
    Ok(())
}
