//! Integration tests for the engagement ledger
//!
//! Exercises the real ledger against the in-memory stores, including
//! the concurrency-sensitive paths (provisioning races, quota floor)
//! and the partial-update surfacing.

use std::sync::Arc;

use tally::auth::ResolvedIdentity;
use tally::db::schemas::{IdeaDoc, SubscriptionTier, UserDoc};
use tally::ledger::EngagementLedger;
use tally::store::{IdeaStore, MemoryIdeaStore, MemoryUserStore, UserStore};
use tally::LedgerError;

const FREE_QUOTA: i64 = 6;

struct Harness {
    ledger: Arc<EngagementLedger>,
    users: Arc<MemoryUserStore>,
    ideas: Arc<MemoryIdeaStore>,
}

fn harness(idea_ids: &[&str]) -> Harness {
    let users = Arc::new(MemoryUserStore::new());
    let ideas = Arc::new(MemoryIdeaStore::new());
    for id in idea_ids {
        ideas.seed_idea(IdeaDoc {
            idea_id: id.to_string(),
            title: format!("Idea {}", id),
            ..Default::default()
        });
    }
    let ledger = Arc::new(EngagementLedger::new(
        users.clone() as Arc<dyn UserStore>,
        ideas.clone() as Arc<dyn IdeaStore>,
        FREE_QUOTA,
    ));
    Harness {
        ledger,
        users,
        ideas,
    }
}

fn identity(subject: &str) -> ResolvedIdentity {
    ResolvedIdentity {
        subject_id: subject.into(),
        email: format!("{}@example.com", subject),
        display_name: subject.into(),
    }
}

async fn provision(h: &Harness, subject: &str) -> UserDoc {
    h.ledger.ensure_user(&identity(subject)).await.unwrap()
}

// =============================================================================
// Provisioning
// =============================================================================

#[tokio::test]
async fn test_provisioning_defaults() {
    let h = harness(&[]);
    let user = provision(&h, "alice").await;

    assert_eq!(user.subject_id, "alice");
    assert_eq!(user.email, "alice@example.com");
    assert_eq!(user.views_remaining, FREE_QUOTA);
    assert!(!user.is_premium);
    assert_eq!(user.subscription_tier, SubscriptionTier::Free);
    assert_eq!(user.reward_points, 0);
    assert!(user.rewards.is_empty());
    assert!(user.saved_idea_ids.is_empty());
    assert!(user.liked_idea_ids.is_empty());
    assert!(user.viewed_idea_ids.is_empty());
}

#[tokio::test]
async fn test_provisioning_never_overwrites_profile() {
    let h = harness(&[]);
    provision(&h, "alice").await;

    let changed = ResolvedIdentity {
        subject_id: "alice".into(),
        email: "new@example.com".into(),
        display_name: "New Name".into(),
    };
    let user = h.ledger.ensure_user(&changed).await.unwrap();
    assert_eq!(user.email, "alice@example.com");
    assert_eq!(user.display_name, "alice");
}

#[tokio::test]
async fn test_first_contact_without_email_is_unresolved() {
    let h = harness(&[]);
    let incomplete = ResolvedIdentity {
        subject_id: "bob".into(),
        email: "".into(),
        display_name: "Bob".into(),
    };

    let err = h.ledger.ensure_user(&incomplete).await.unwrap_err();
    assert!(matches!(err, LedgerError::IdentityUnresolved(_)));
    assert!(h.users.find_user("bob").await.unwrap().is_none());
}

#[tokio::test]
async fn test_concurrent_provisioning_yields_one_record() {
    let h = harness(&[]);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let ledger = Arc::clone(&h.ledger);
        handles.push(tokio::spawn(async move {
            ledger.ensure_user(&identity("alice")).await
        }));
    }

    for handle in handles {
        let user = handle.await.unwrap().unwrap();
        // Every contact sees the single winner record with full quota
        assert_eq!(user.subject_id, "alice");
        assert_eq!(user.views_remaining, FREE_QUOTA);
        assert!(user.rewards.is_empty());
    }

    let stored = h.users.find_user("alice").await.unwrap().unwrap();
    assert_eq!(stored.views_remaining, FREE_QUOTA);
}

// =============================================================================
// View quota
// =============================================================================

#[tokio::test]
async fn test_six_views_then_quota_exceeded() {
    let ids = ["i1", "i2", "i3", "i4", "i5", "i6", "i7"];
    let h = harness(&ids);
    provision(&h, "alice").await;

    let mut last_remaining = FREE_QUOTA;
    for (n, id) in ids.iter().take(6).enumerate() {
        let receipt = h.ledger.consume_view("alice", id).await.unwrap();
        last_remaining = receipt.views_remaining;
        assert_eq!(receipt.views_remaining, FREE_QUOTA - n as i64 - 1);
        assert_eq!(receipt.idea_views, 1);
    }
    assert_eq!(last_remaining, 0);

    let err = h.ledger.consume_view("alice", "i7").await.unwrap_err();
    assert!(matches!(err, LedgerError::QuotaExceeded));

    // Nothing changed on the seventh attempt
    let user = h.users.find_user("alice").await.unwrap().unwrap();
    assert_eq!(user.views_remaining, 0);
    assert_eq!(user.viewed_idea_ids.len(), 6);
    assert_eq!(h.ideas.find_idea("i7").await.unwrap().unwrap().views, 0);
}

#[tokio::test]
async fn test_repeat_view_consumes_quota_again() {
    // Existing behavior preserved: membership is deduplicated but the
    // quota is charged per call, and the idea counter moves per call.
    let h = harness(&["i1"]);
    provision(&h, "alice").await;

    h.ledger.consume_view("alice", "i1").await.unwrap();
    let receipt = h.ledger.consume_view("alice", "i1").await.unwrap();

    assert_eq!(receipt.views_remaining, FREE_QUOTA - 2);
    assert_eq!(receipt.idea_views, 2);

    let user = h.users.find_user("alice").await.unwrap().unwrap();
    assert_eq!(user.viewed_idea_ids, vec!["i1"]);
}

#[tokio::test]
async fn test_premium_views_do_not_touch_quota() {
    let h = harness(&["i1", "i2"]);

    let mut premium = UserDoc::provision(
        "vip".into(),
        "vip@example.com".into(),
        "Vip".into(),
        0,
    );
    premium.is_premium = true;
    premium.subscription_tier = SubscriptionTier::Premium;
    h.users.create_user_if_absent(premium).await.unwrap();

    let first = h.ledger.consume_view("vip", "i1").await.unwrap();
    let second = h.ledger.consume_view("vip", "i2").await.unwrap();

    assert_eq!(first.views_remaining, 0);
    assert_eq!(second.views_remaining, 0);
    assert_eq!(h.ideas.find_idea("i2").await.unwrap().unwrap().views, 1);

    let user = h.users.find_user("vip").await.unwrap().unwrap();
    assert_eq!(user.viewed_idea_ids.len(), 2);
}

#[tokio::test]
async fn test_view_unknown_idea() {
    let h = harness(&[]);
    provision(&h, "alice").await;

    let err = h.ledger.consume_view("alice", "ghost").await.unwrap_err();
    assert!(matches!(err, LedgerError::IdeaNotFound(_)));

    let user = h.users.find_user("alice").await.unwrap().unwrap();
    assert_eq!(user.views_remaining, FREE_QUOTA);
}

#[tokio::test]
async fn test_concurrent_views_never_drive_quota_negative() {
    let ids: Vec<String> = (0..12).map(|n| format!("i{}", n)).collect();
    let id_refs: Vec<&str> = ids.iter().map(|s| s.as_str()).collect();
    let h = harness(&id_refs);
    provision(&h, "alice").await;

    let mut handles = Vec::new();
    for id in &ids {
        let ledger = Arc::clone(&h.ledger);
        let id = id.clone();
        handles.push(tokio::spawn(async move {
            ledger.consume_view("alice", &id).await
        }));
    }

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(receipt) => {
                successes += 1;
                assert!(receipt.views_remaining >= 0);
            }
            Err(LedgerError::QuotaExceeded) => {}
            Err(other) => panic!("Unexpected error: {:?}", other),
        }
    }

    assert_eq!(successes, FREE_QUOTA);
    let user = h.users.find_user("alice").await.unwrap().unwrap();
    assert_eq!(user.views_remaining, 0);
}

// =============================================================================
// Like / unlike
// =============================================================================

#[tokio::test]
async fn test_double_like_is_an_explicit_conflict() {
    let h = harness(&["i1"]);
    provision(&h, "alice").await;

    let receipt = h.ledger.like("alice", "i1").await.unwrap();
    assert!(receipt.liked);
    assert_eq!(receipt.likes_total, 1);
    assert_eq!(receipt.reward_points, 1);

    // The caller sees a conflict, never a silent success
    let err = h.ledger.like("alice", "i1").await.unwrap_err();
    assert!(matches!(err, LedgerError::AlreadyLiked(_)));
    assert_eq!(err.code(), "ALREADY_LIKED");

    // Neither counter moved on the rejected call
    assert_eq!(h.ideas.find_idea("i1").await.unwrap().unwrap().likes, 1);
    let user = h.users.find_user("alice").await.unwrap().unwrap();
    assert_eq!(user.reward_points, 1);
    assert_eq!(user.rewards.len(), 1);
}

#[tokio::test]
async fn test_like_awards_one_reward_record() {
    let h = harness(&["i1"]);
    provision(&h, "alice").await;

    h.ledger.like("alice", "i1").await.unwrap();

    let user = h.users.find_user("alice").await.unwrap().unwrap();
    assert_eq!(user.rewards.len(), 1);
    let reward = &user.rewards[0];
    assert_eq!(reward.kind, "points");
    assert_eq!(reward.value, 1);
    assert!(!reward.redeemed);
}

#[tokio::test]
async fn test_like_both_ideas_then_unlike_first() {
    // likes A (A: 0->1, points 0->1), likes B (B: 0->1, points 1->2),
    // unlikes A (A: 1->0, points stay 2)
    let h = harness(&["a", "b"]);
    provision(&h, "alice").await;

    let like_a = h.ledger.like("alice", "a").await.unwrap();
    assert_eq!(like_a.likes_total, 1);
    assert_eq!(like_a.reward_points, 1);

    let like_b = h.ledger.like("alice", "b").await.unwrap();
    assert_eq!(like_b.likes_total, 1);
    assert_eq!(like_b.reward_points, 2);

    let unlike_a = h.ledger.unlike("alice", "a").await.unwrap();
    assert!(!unlike_a.liked);
    assert_eq!(unlike_a.likes_total, 0);
    assert_eq!(unlike_a.reward_points, 2);

    assert_eq!(h.ideas.find_idea("a").await.unwrap().unwrap().likes, 0);
    assert_eq!(h.ideas.find_idea("b").await.unwrap().unwrap().likes, 1);
}

#[tokio::test]
async fn test_unlike_without_like() {
    let h = harness(&["i1"]);
    provision(&h, "alice").await;

    let err = h.ledger.unlike("alice", "i1").await.unwrap_err();
    assert!(matches!(err, LedgerError::NotLiked(_)));

    assert_eq!(h.ideas.find_idea("i1").await.unwrap().unwrap().likes, 0);
    let user = h.users.find_user("alice").await.unwrap().unwrap();
    assert_eq!(user.reward_points, 0);
}

#[tokio::test]
async fn test_like_unknown_idea() {
    let h = harness(&[]);
    provision(&h, "alice").await;

    assert!(matches!(
        h.ledger.like("alice", "ghost").await.unwrap_err(),
        LedgerError::IdeaNotFound(_)
    ));
    assert!(matches!(
        h.ledger.unlike("alice", "ghost").await.unwrap_err(),
        LedgerError::IdeaNotFound(_)
    ));
}

#[tokio::test]
async fn test_likes_counter_tracks_distinct_users() {
    let h = harness(&["i1"]);
    provision(&h, "alice").await;
    provision(&h, "bob").await;

    h.ledger.like("alice", "i1").await.unwrap();
    let receipt = h.ledger.like("bob", "i1").await.unwrap();
    assert_eq!(receipt.likes_total, 2);

    h.ledger.unlike("alice", "i1").await.unwrap();
    assert_eq!(h.ideas.find_idea("i1").await.unwrap().unwrap().likes, 1);
    assert_eq!(h.users.count_likers("i1").await.unwrap(), 1);
}

// =============================================================================
// Save / unsave
// =============================================================================

#[tokio::test]
async fn test_save_is_idempotent() {
    let h = harness(&["i1"]);
    provision(&h, "alice").await;

    let first = h.ledger.save("alice", "i1").await.unwrap();
    assert!(first.saved);
    assert!(first.changed);

    // Repeat save is a no-op success, not a conflict
    let second = h.ledger.save("alice", "i1").await.unwrap();
    assert!(second.saved);
    assert!(!second.changed);

    let user = h.users.find_user("alice").await.unwrap().unwrap();
    assert_eq!(user.saved_idea_ids, vec!["i1"]);
}

#[tokio::test]
async fn test_unsave_nonmember_is_noop_success() {
    let h = harness(&["i1"]);
    provision(&h, "alice").await;

    let receipt = h.ledger.unsave("alice", "i1").await.unwrap();
    assert!(!receipt.saved);
    assert!(!receipt.changed);

    h.ledger.save("alice", "i1").await.unwrap();
    let removed = h.ledger.unsave("alice", "i1").await.unwrap();
    assert!(!removed.saved);
    assert!(removed.changed);
}

#[tokio::test]
async fn test_save_has_no_counter_or_reward() {
    let h = harness(&["i1"]);
    provision(&h, "alice").await;

    h.ledger.save("alice", "i1").await.unwrap();

    assert_eq!(h.ideas.find_idea("i1").await.unwrap().unwrap().likes, 0);
    let user = h.users.find_user("alice").await.unwrap().unwrap();
    assert_eq!(user.reward_points, 0);
    assert!(user.rewards.is_empty());
}

#[tokio::test]
async fn test_save_unknown_idea() {
    let h = harness(&[]);
    provision(&h, "alice").await;

    assert!(matches!(
        h.ledger.save("alice", "ghost").await.unwrap_err(),
        LedgerError::IdeaNotFound(_)
    ));
}

// =============================================================================
// Partial updates and reconciliation
// =============================================================================

#[tokio::test]
async fn test_second_half_failure_surfaces_partial_update() {
    let h = harness(&["i1"]);
    provision(&h, "alice").await;

    h.ideas.set_counter_writes_unavailable(true);
    let err = h.ledger.like("alice", "i1").await.unwrap_err();

    match err {
        LedgerError::PartialUpdate {
            operation,
            committed,
            failed,
            ..
        } => {
            assert_eq!(operation, "like");
            assert_eq!(committed, tally::types::WriteHalf::User);
            assert_eq!(failed, tally::types::WriteHalf::Idea);
        }
        other => panic!("Expected PartialUpdate, got {:?}", other),
    }

    // The user half stands: membership recorded, counter behind
    let user = h.users.find_user("alice").await.unwrap().unwrap();
    assert_eq!(user.liked_idea_ids, vec!["i1"]);
    assert_eq!(h.ideas.find_idea("i1").await.unwrap().unwrap().likes, 0);

    // Reconciliation repairs the drift once the store is back
    h.ideas.set_counter_writes_unavailable(false);
    let report = h.ledger.reconcile_idea_likes("i1").await.unwrap();
    assert_eq!(report.stored_likes, 0);
    assert_eq!(report.derived_likes, 1);
    assert!(report.repaired);
    assert_eq!(h.ideas.find_idea("i1").await.unwrap().unwrap().likes, 1);
}

#[tokio::test]
async fn test_reconcile_clean_counter_is_untouched() {
    let h = harness(&["i1"]);
    provision(&h, "alice").await;
    h.ledger.like("alice", "i1").await.unwrap();

    let report = h.ledger.reconcile_idea_likes("i1").await.unwrap();
    assert_eq!(report.stored_likes, 1);
    assert_eq!(report.derived_likes, 1);
    assert!(!report.repaired);
}

#[tokio::test]
async fn test_reconcile_unknown_idea() {
    let h = harness(&[]);
    assert!(matches!(
        h.ledger.reconcile_idea_likes("ghost").await.unwrap_err(),
        LedgerError::IdeaNotFound(_)
    ));
}
