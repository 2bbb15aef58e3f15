use fleet_dispatcher::CredentialTracker;
use fleet_errors::FleetError;
use fleet_infrastructure::TimeoutHandler;
use fleet_testing_utils::TestDatabase;

#[tokio::test]
async fn test_failure_counter_increments() -> anyhow::Result<()> {
    let db = TestDatabase::new().await?;
    let target = db.seed_target("x", "10.0.0.1", &[]).await?;
    let repos = db.repositories();
    let tracker = CredentialTracker::new(
        repos.credentials.clone(),
        repos.targets.clone(),
        TimeoutHandler::from_seconds(5),
    );

    let credential = tracker.add_credential(target.id, "root", "hunter2").await?;
    assert_eq!(credential.fails, 0);

    for expected in 1..=3 {
        assert_eq!(tracker.report_failure(credential.id).await?, expected);
    }
    assert_eq!(tracker.list_for_target(target.id).await?[0].fails, 3);
    Ok(())
}

#[tokio::test]
async fn test_unknown_ids_are_not_found() -> anyhow::Result<()> {
    let db = TestDatabase::new().await?;
    let repos = db.repositories();
    let tracker = CredentialTracker::new(
        repos.credentials.clone(),
        repos.targets.clone(),
        TimeoutHandler::from_seconds(5),
    );

    assert!(matches!(
        tracker.report_failure(77).await,
        Err(FleetError::NotFound { .. })
    ));
    assert!(matches!(
        tracker.add_credential(77, "root", "x").await,
        Err(FleetError::NotFound { .. })
    ));
    assert!(matches!(
        tracker.add_credential(77, "  ", "x").await,
        Err(FleetError::Validation(_))
    ));
    assert!(repos.credentials.list().await?.is_empty());
    Ok(())
}
