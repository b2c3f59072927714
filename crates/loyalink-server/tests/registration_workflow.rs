mod common;

use common::{build_test_context, build_test_context_with, CrmCall, FakeCrm, BASE_URL, TEST_KEY};
use loyalink_server::registration::{EnrollmentWorkflow, RegistrationError};
use loyalink_storage::TokenCodec;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn issued_link_decrypts_to_stored_unused_token() {
    let ctx = build_test_context().await.unwrap();

    let link = ctx
        .registration()
        .issue_link("https://x.test/register?token=")
        .await
        .unwrap();
    let encrypted = link.strip_prefix("https://x.test/register?token=").unwrap();
    assert!(encrypted
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));

    let token = TokenCodec::new(&TEST_KEY).unwrap().decrypt(encrypted).unwrap();
    assert_eq!(token.len(), 32);
    assert!(!ctx.store.get_by_token(&token).await.unwrap().used);

    assert_eq!(
        ctx.registration().validate_and_decode(encrypted).await.unwrap(),
        token
    );
}

#[tokio::test]
async fn each_link_carries_a_fresh_token() {
    let ctx = build_test_context().await.unwrap();

    let a = ctx.issue_encrypted_token().await;
    let b = ctx.issue_encrypted_token().await;
    assert_ne!(a, b);
    assert_eq!(ctx.registration().token_snapshot().await.unwrap().unused.len(), 2);
}

#[tokio::test]
async fn garbage_is_invalid_token() {
    let ctx = build_test_context().await.unwrap();

    for input in ["", "!!!", "abc", "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA"] {
        assert!(matches!(
            ctx.registration().validate_and_decode(input).await,
            Err(RegistrationError::InvalidToken)
        ));
    }
}

#[tokio::test]
async fn never_issued_token_is_invalid_or_used() {
    let ctx = build_test_context().await.unwrap();
    let forged = TokenCodec::new(&TEST_KEY)
        .unwrap()
        .encrypt("deadbeefdeadbeefdeadbeefdeadbeef")
        .unwrap();

    assert!(matches!(
        ctx.registration().validate_and_decode(&forged).await,
        Err(RegistrationError::InvalidOrUsedToken)
    ));
}

#[tokio::test]
async fn used_token_is_invalid_or_used() {
    let ctx = build_test_context().await.unwrap();
    let encrypted = ctx.issue_encrypted_token().await;
    let token = ctx.registration().validate_and_decode(&encrypted).await.unwrap();

    ctx.store.mark_used(&token, "Anna", "+1000").await.unwrap();

    assert!(matches!(
        ctx.registration().validate_and_decode(&encrypted).await,
        Err(RegistrationError::InvalidOrUsedToken)
    ));
}

#[tokio::test]
async fn register_user_enrolls_and_consumes() {
    let ctx = build_test_context().await.unwrap();
    let encrypted = ctx.issue_encrypted_token().await;
    let token = ctx.registration().validate_and_decode(&encrypted).await.unwrap();

    ctx.workflow()
        .register_user(&token, "Anna", "+1000", "2000-01-01")
        .await
        .unwrap();

    assert!(ctx.store.get_by_token(&token).await.unwrap().used);
    let usage = ctx.registration().token_usage(&token).await.unwrap();
    assert_eq!((usage.username.as_str(), usage.phone.as_str()), ("Anna", "+1000"));

    let calls = ctx.crm.calls();
    assert_eq!(calls.len(), 2);
    assert!(matches!(&calls[0], CrmCall::FindOrCreate { phone, .. } if phone == "+1000"));
    assert_eq!(
        calls[1],
        CrmCall::GrantBonus {
            client_id: 1,
            amount: 1000
        }
    );

    let snapshot = ctx.registration().token_snapshot().await.unwrap();
    assert_eq!(snapshot.used.len(), 1);
    assert!(snapshot.unused.is_empty());
}

#[tokio::test]
async fn failed_client_creation_stops_before_bonus() {
    let ctx = build_test_context().await.unwrap();
    let encrypted = ctx.issue_encrypted_token().await;
    let token = ctx.registration().validate_and_decode(&encrypted).await.unwrap();

    ctx.crm.fail_find_or_create.store(true, Ordering::SeqCst);
    let err = ctx
        .workflow()
        .register_user(&token, "Anna", "+1000", "2000-01-01")
        .await
        .unwrap_err();

    assert!(matches!(err, RegistrationError::Crm(_)));
    assert_eq!(ctx.crm.calls().len(), 1);
    assert!(!ctx.store.get_by_token(&token).await.unwrap().used);
}

#[tokio::test]
async fn failed_bonus_leaves_client_created_and_token_unused() {
    let ctx = build_test_context().await.unwrap();
    let encrypted = ctx.issue_encrypted_token().await;
    let token = ctx.registration().validate_and_decode(&encrypted).await.unwrap();

    ctx.crm.fail_bonus.store(true, Ordering::SeqCst);
    let err = ctx
        .workflow()
        .register_user(&token, "Anna", "+1000", "2000-01-01")
        .await
        .unwrap_err();

    assert!(matches!(err, RegistrationError::Crm(_)));
    assert_eq!(ctx.crm.client_count(), 1);
    assert!(!ctx.store.get_by_token(&token).await.unwrap().used);
    assert!(matches!(
        ctx.registration().token_usage(&token).await,
        Err(RegistrationError::NotFound)
    ));
}

#[tokio::test]
async fn unknown_token_never_reaches_crm() {
    let ctx = build_test_context().await.unwrap();

    let err = ctx
        .workflow()
        .register_user("never-issued", "Anna", "+1000", "2000-01-01")
        .await
        .unwrap_err();
    assert!(matches!(err, RegistrationError::InvalidOrUsedToken));
    assert!(ctx.crm.calls().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_registrations_have_single_winner() {
    let crm = Arc::new(FakeCrm::with_delay(Duration::from_millis(100)));
    let ctx = build_test_context_with(crm.clone()).await.unwrap();
    let encrypted = ctx.issue_encrypted_token().await;
    let token = ctx.registration().validate_and_decode(&encrypted).await.unwrap();

    let workflow = ctx.state.workflow.clone();
    let mut handles = Vec::new();
    for i in 0..2 {
        let workflow = workflow.clone();
        let token = token.clone();
        handles.push(tokio::spawn(async move {
            workflow
                .register_user(&token, &format!("user-{i}"), "+1000", "2000-01-01")
                .await
        }));
    }

    let mut wins = 0;
    for h in handles {
        match h.await.unwrap() {
            Ok(()) => wins += 1,
            Err(e) => assert!(
                matches!(
                    e,
                    RegistrationError::InProgress
                        | RegistrationError::AlreadyConsumed
                        | RegistrationError::InvalidOrUsedToken
                ),
                "unexpected error: {e}"
            ),
        }
    }
    assert_eq!(wins, 1);
    assert!(ctx.store.get_by_token(&token).await.unwrap().used);
    let bonuses = crm
        .calls()
        .into_iter()
        .filter(|c| matches!(c, CrmCall::GrantBonus { .. }))
        .count();
    assert_eq!(bonuses, 1, "the losing request must not reach the CRM");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn separate_workflows_still_consume_once() {
    // Two workflow instances share the store but not the in-flight claims,
    // so only the store's conditional update decides the winner.
    let ctx = build_test_context().await.unwrap();
    let encrypted = ctx.issue_encrypted_token().await;
    let token = ctx.registration().validate_and_decode(&encrypted).await.unwrap();

    let crm = Arc::new(FakeCrm::with_delay(Duration::from_millis(100)));
    let workflows: Vec<Arc<EnrollmentWorkflow>> = (0..2)
        .map(|_| Arc::new(EnrollmentWorkflow::new(ctx.store.clone(), crm.clone(), 1000, 0)))
        .collect();

    let mut handles = Vec::new();
    for (i, workflow) in workflows.into_iter().enumerate() {
        let token = token.clone();
        handles.push(tokio::spawn(async move {
            workflow
                .register_user(&token, &format!("user-{i}"), "+1000", "2000-01-01")
                .await
        }));
    }

    let mut wins = 0;
    let mut consumed = 0;
    for h in handles {
        match h.await.unwrap() {
            Ok(()) => wins += 1,
            Err(RegistrationError::AlreadyConsumed) => consumed += 1,
            Err(RegistrationError::InvalidOrUsedToken) => consumed += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(wins, 1);
    assert_eq!(consumed, 1);
    assert!(ctx.registration().token_usage(&token).await.is_ok());
    assert_eq!(crm.client_count(), 1);
}

#[tokio::test]
async fn base_url_is_prepended_verbatim() {
    let ctx = build_test_context().await.unwrap();
    let link = ctx.registration().issue_link(BASE_URL).await.unwrap();
    assert!(link.starts_with(BASE_URL));
    assert!(link.len() > BASE_URL.len());
}
