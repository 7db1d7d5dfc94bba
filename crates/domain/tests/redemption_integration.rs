//! Integration tests for coupon redemption against the in-memory store.
//!
//! These tests drive many redemptions concurrently and check that the global
//! budget is never exceeded and that rolled-back work leaves no trace.

use std::sync::Arc;

use chrono::Utc;
use common::{CouponId, Money, PurchaseId, ToolkitId, UserId};
use domain::{CouponCode, CouponError, RedemptionError, redeem_coupon};
use purchase_store::{InMemoryPurchaseStore, NewCoupon, NewPurchase, PaymentStatus, PurchaseStore};

async fn seed_coupon(store: &InMemoryPurchaseStore, code: &str, max_uses: Option<i32>) -> CouponId {
    store
        .insert_coupon(&NewCoupon {
            id: CouponId::new(),
            code: code.to_string(),
            discount_amount: Money::from_minor(500),
            max_uses,
            max_uses_per_user: None,
            is_active: true,
            expires_at: None,
        })
        .await
        .unwrap()
        .id
}

/// Redeems and records a pending purchase in one transaction.
async fn redeem_with_purchase(
    store: &InMemoryPurchaseStore,
    code: &CouponCode,
    toolkit_id: ToolkitId,
) -> Result<(), RedemptionError> {
    let user_id = UserId::new();
    let mut tx = store.begin().await?;
    let redeemed = redeem_coupon(tx.as_mut(), code, user_id, Utc::now()).await?;
    tx.insert_purchase(&NewPurchase {
        id: PurchaseId::new(),
        user_id,
        toolkit_id,
        coupon_id: Some(redeemed.coupon_id),
        payment_status: PaymentStatus::Pending,
        amount_paid: Money::from_minor(500),
    })
    .await?;
    tx.commit().await?;
    Ok(())
}

mod concurrency {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_redemptions_never_exceed_budget() {
        for max_uses in [1, 3, 7] {
            let store = InMemoryPurchaseStore::new();
            let coupon_id = seed_coupon(&store, "RACE", Some(max_uses)).await;
            let code = Arc::new(CouponCode::parse("race").unwrap());
            let toolkit_id = ToolkitId::new();

            let mut handles = Vec::new();
            for _ in 0..10 {
                let store = store.clone();
                let code = Arc::clone(&code);
                handles.push(tokio::spawn(async move {
                    redeem_with_purchase(&store, &code, toolkit_id).await
                }));
            }

            let mut successes = 0;
            for handle in handles {
                match handle.await.unwrap() {
                    Ok(()) => successes += 1,
                    Err(RedemptionError::Coupon(CouponError::CouponLimitReached)) => {}
                    Err(other) => panic!("unexpected error: {other}"),
                }
            }

            let coupon = store.get_coupon(coupon_id).await.unwrap().unwrap();
            assert_eq!(successes, max_uses, "max_uses {max_uses}");
            assert_eq!(coupon.current_uses, max_uses);
            assert_eq!(
                store.purchases_with_coupon(coupon_id).unwrap().len(),
                max_uses as usize
            );
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn unlimited_coupon_counts_every_use() {
        let store = InMemoryPurchaseStore::new();
        let coupon_id = seed_coupon(&store, "OPEN", None).await;
        let code = Arc::new(CouponCode::parse("OPEN").unwrap());

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let store = store.clone();
                let code = Arc::clone(&code);
                tokio::spawn(async move {
                    redeem_with_purchase(&store, &code, ToolkitId::new()).await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let coupon = store.get_coupon(coupon_id).await.unwrap().unwrap();
        assert_eq!(coupon.current_uses, 20);
    }
}

mod rollback {
    use super::*;

    #[tokio::test]
    async fn rollback_restores_uses_and_discards_purchase() {
        let store = InMemoryPurchaseStore::new();
        let coupon_id = seed_coupon(&store, "UNDO", Some(1)).await;
        let code = CouponCode::parse("UNDO").unwrap();
        let user_id = UserId::new();

        let mut tx = store.begin().await.unwrap();
        let redeemed = redeem_coupon(tx.as_mut(), &code, user_id, Utc::now())
            .await
            .unwrap();
        tx.insert_purchase(&NewPurchase {
            id: PurchaseId::new(),
            user_id,
            toolkit_id: ToolkitId::new(),
            coupon_id: Some(redeemed.coupon_id),
            payment_status: PaymentStatus::Pending,
            amount_paid: Money::from_minor(100),
        })
        .await
        .unwrap();
        tx.rollback().await.unwrap();

        let coupon = store.get_coupon(coupon_id).await.unwrap().unwrap();
        assert_eq!(coupon.current_uses, 0);
        assert_eq!(store.purchase_count().unwrap(), 0);

        // The single use is still available afterwards
        redeem_with_purchase(&store, &code, ToolkitId::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn dropped_transaction_rolls_back() {
        let store = InMemoryPurchaseStore::new();
        let coupon_id = seed_coupon(&store, "DROP", Some(2)).await;
        let code = CouponCode::parse("DROP").unwrap();

        {
            let mut tx = store.begin().await.unwrap();
            redeem_coupon(tx.as_mut(), &code, UserId::new(), Utc::now())
                .await
                .unwrap();
        }

        let coupon = store.get_coupon(coupon_id).await.unwrap().unwrap();
        assert_eq!(coupon.current_uses, 0);
    }
}
