//! Integration tests for the purchase flow against the in-memory store.
//!
//! These tests walk the full lifecycle: coupon preview, initiation on the
//! free and paid paths, signed payment callbacks, access checks, coupon
//! administration and the concurrent coupon budget.

use std::sync::Arc;

use checkout::{
    CheckoutError, CouponAdmin, InMemoryPaymentGateway, IngestService, PaymentCallback,
    PurchaseManager,
};
use common::{CouponId, Money, ToolkitId, UserId};
use domain::{CouponCode, CouponDraft, CouponError, PaymentVerifier, TokenAuthenticator};
use purchase_store::{
    CouponUpdate, InMemoryPurchaseStore, NewCoupon, NewOpportunity, PaymentStatus, PurchaseId,
    PurchaseRecord, PurchaseStore, PurchaseUpdate, Toolkit,
};

const SECRET: &str = "s3cret";

type Manager = PurchaseManager<InMemoryPurchaseStore, InMemoryPaymentGateway>;

struct Harness {
    store: InMemoryPurchaseStore,
    gateway: InMemoryPaymentGateway,
    manager: Manager,
    verifier: PaymentVerifier,
}

fn harness() -> Harness {
    let store = InMemoryPurchaseStore::new();
    let gateway = InMemoryPaymentGateway::new();
    let verifier = PaymentVerifier::new(SECRET).unwrap();
    let manager = PurchaseManager::new(store.clone(), gateway.clone(), verifier.clone(), "INR");
    Harness {
        store,
        gateway,
        manager,
        verifier,
    }
}

async fn seed_toolkit(store: &InMemoryPurchaseStore, price: i64) -> ToolkitId {
    let toolkit = Toolkit::new("Resume Toolkit", Money::from_minor(price));
    store.upsert_toolkit(&toolkit).await.unwrap();
    toolkit.id
}

async fn seed_coupon(
    store: &InMemoryPurchaseStore,
    code: &str,
    discount: i64,
    max_uses: Option<i32>,
    max_uses_per_user: Option<i32>,
) -> CouponId {
    store
        .insert_coupon(&NewCoupon {
            id: CouponId::new(),
            code: code.to_string(),
            discount_amount: Money::from_minor(discount),
            max_uses,
            max_uses_per_user,
            is_active: true,
            expires_at: None,
        })
        .await
        .unwrap()
        .id
}

fn callback(verifier: &PaymentVerifier, order_id: &str, payment_id: &str) -> PaymentCallback {
    PaymentCallback {
        order_id: order_id.to_string(),
        payment_id: payment_id.to_string(),
        signature: verifier.sign(order_id, payment_id),
    }
}

mod scenarios {
    use super::*;

    #[tokio::test]
    async fn save500_on_999_toolkit_then_already_used() {
        let h = harness();
        let toolkit_id = seed_toolkit(&h.store, 999).await;
        seed_coupon(&h.store, "SAVE500", 500, None, Some(1)).await;
        let user_id = UserId::new();

        let initiated = h
            .manager
            .initiate(user_id, toolkit_id, Some("save500"))
            .await
            .unwrap();
        assert!(!initiated.free);
        assert_eq!(initiated.final_price, Money::from_minor(499));
        assert_eq!(initiated.discount_amount, Money::from_minor(500));

        let order = initiated.order.clone().unwrap();
        assert_eq!(order.amount, Money::from_minor(499));
        assert_eq!(order.currency, "INR");
        assert_eq!(h.gateway.order_count(), 1);

        let record = h
            .store
            .get_purchase(initiated.purchase_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.payment_status, PaymentStatus::Pending);
        assert_eq!(record.amount_paid, Money::from_minor(499));
        assert_eq!(record.order_id.as_deref(), Some(order.id.as_str()));

        // Pay and complete the first purchase
        let verified = h
            .manager
            .finalize(user_id, toolkit_id, &callback(&h.verifier, &order.id, "pay_1"))
            .await
            .unwrap();
        assert!(verified.success);

        // The same user cannot use the coupon again, even on another toolkit
        let other_toolkit = seed_toolkit(&h.store, 999).await;
        let second = h
            .manager
            .initiate(user_id, other_toolkit, Some("SAVE500"))
            .await;
        assert!(matches!(
            second,
            Err(CheckoutError::Coupon(CouponError::CouponAlreadyUsed))
        ));
    }

    #[tokio::test]
    async fn free100_skips_gateway_and_completes() {
        let h = harness();
        let toolkit_id = seed_toolkit(&h.store, 500).await;
        seed_coupon(&h.store, "FREE100", 100_000, None, None).await;
        let user_id = UserId::new();

        let initiated = h
            .manager
            .initiate(user_id, toolkit_id, Some("FREE100"))
            .await
            .unwrap();
        assert!(initiated.free);
        assert!(initiated.order.is_none());
        assert_eq!(initiated.final_price, Money::zero());
        assert_eq!(h.gateway.order_count(), 0);

        let record = h
            .store
            .get_purchase(initiated.purchase_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.payment_status, PaymentStatus::Completed);
        assert_eq!(record.amount_paid, Money::zero());
        assert!(h.manager.has_access(user_id, toolkit_id).await.unwrap());
    }

    #[tokio::test]
    async fn purchase_without_coupon() {
        let h = harness();
        let toolkit_id = seed_toolkit(&h.store, 1000).await;
        let user_id = UserId::new();

        let initiated = h.manager.initiate(user_id, toolkit_id, None).await.unwrap();
        assert_eq!(initiated.final_price, Money::from_minor(1000));
        assert_eq!(initiated.discount_amount, Money::zero());

        // A blank code counts as no code
        let again = h
            .manager
            .initiate(user_id, toolkit_id, Some("   "))
            .await
            .unwrap();
        assert_eq!(again.final_price, Money::from_minor(1000));
    }
}

mod boundaries {
    use super::*;

    #[tokio::test]
    async fn last_use_succeeds_once() {
        let h = harness();
        let toolkit_id = seed_toolkit(&h.store, 1000).await;
        let coupon_id = seed_coupon(&h.store, "LAST", 100, Some(2), None).await;

        h.manager
            .initiate(UserId::new(), toolkit_id, Some("LAST"))
            .await
            .unwrap();
        h.manager
            .initiate(UserId::new(), toolkit_id, Some("LAST"))
            .await
            .unwrap();

        let result = h
            .manager
            .initiate(UserId::new(), toolkit_id, Some("LAST"))
            .await;
        assert!(matches!(
            result,
            Err(CheckoutError::Coupon(CouponError::CouponLimitReached))
        ));

        let coupon = h.store.get_coupon(coupon_id).await.unwrap().unwrap();
        assert_eq!(coupon.current_uses, 2);
        assert_eq!(h.store.purchase_count().unwrap(), 2);
    }

    #[tokio::test]
    async fn validate_coupon_never_consumes() {
        let h = harness();
        let toolkit_id = seed_toolkit(&h.store, 999).await;
        let coupon_id = seed_coupon(&h.store, "SAVE500", 500, Some(1), None).await;

        for _ in 0..5 {
            let preview = h
                .manager
                .validate_coupon("save500", toolkit_id, None)
                .await
                .unwrap();
            assert!(preview.valid);
            assert_eq!(preview.final_price, Some(Money::from_minor(499)));
        }

        let coupon = h.store.get_coupon(coupon_id).await.unwrap().unwrap();
        assert_eq!(coupon.current_uses, 0);
    }

    #[tokio::test]
    async fn validate_coupon_reports_reason() {
        let h = harness();
        let toolkit_id = seed_toolkit(&h.store, 999).await;

        let preview = h
            .manager
            .validate_coupon("missing", toolkit_id, None)
            .await
            .unwrap();
        assert!(!preview.valid);
        assert_eq!(preview.error.as_deref(), Some("Invalid coupon code"));
        assert_eq!(preview.final_price, None);
    }

    #[tokio::test]
    async fn unknown_or_inactive_toolkit() {
        let h = harness();
        let result = h
            .manager
            .initiate(UserId::new(), ToolkitId::new(), None)
            .await;
        assert!(matches!(result, Err(CheckoutError::ToolkitNotFound(_))));

        let mut toolkit = Toolkit::new("Retired", Money::from_minor(100));
        toolkit.is_active = false;
        h.store.upsert_toolkit(&toolkit).await.unwrap();
        let result = h.manager.initiate(UserId::new(), toolkit.id, None).await;
        assert!(matches!(result, Err(CheckoutError::ToolkitNotFound(_))));
    }

    #[tokio::test]
    async fn owner_cannot_buy_twice() {
        let h = harness();
        let toolkit_id = seed_toolkit(&h.store, 500).await;
        seed_coupon(&h.store, "FREE100", 100_000, None, None).await;
        let user_id = UserId::new();

        h.manager
            .initiate(user_id, toolkit_id, Some("FREE100"))
            .await
            .unwrap();
        let result = h.manager.initiate(user_id, toolkit_id, None).await;
        assert!(matches!(result, Err(CheckoutError::AlreadyPurchased)));
    }

    #[tokio::test]
    async fn gateway_failure_keeps_coupon_use() {
        let h = harness();
        let toolkit_id = seed_toolkit(&h.store, 1000).await;
        let coupon_id = seed_coupon(&h.store, "SAVE10", 10, Some(5), None).await;
        h.gateway.set_fail_on_create(true);

        let result = h
            .manager
            .initiate(UserId::new(), toolkit_id, Some("SAVE10"))
            .await;
        assert!(matches!(result, Err(CheckoutError::Gateway(_))));

        let coupon = h.store.get_coupon(coupon_id).await.unwrap().unwrap();
        assert_eq!(coupon.current_uses, 1);
        let records = h.store.purchases_with_coupon(coupon_id).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].payment_status, PaymentStatus::Pending);
        assert_eq!(records[0].order_id, None);
    }

    /// Store whose order attachment never matches a row.
    #[derive(Clone)]
    struct DetachedOrderStore(InMemoryPurchaseStore);

    #[async_trait::async_trait]
    impl PurchaseStore for DetachedOrderStore {
        async fn begin(&self) -> purchase_store::Result<Box<dyn purchase_store::StoreTransaction>> {
            self.0.begin().await
        }

        async fn upsert_toolkit(&self, toolkit: &Toolkit) -> purchase_store::Result<()> {
            self.0.upsert_toolkit(toolkit).await
        }

        async fn get_toolkit(&self, id: ToolkitId) -> purchase_store::Result<Option<Toolkit>> {
            self.0.get_toolkit(id).await
        }

        async fn insert_coupon(
            &self,
            coupon: &NewCoupon,
        ) -> purchase_store::Result<purchase_store::Coupon> {
            self.0.insert_coupon(coupon).await
        }

        async fn get_coupon(
            &self,
            id: CouponId,
        ) -> purchase_store::Result<Option<purchase_store::Coupon>> {
            self.0.get_coupon(id).await
        }

        async fn find_coupon_by_code(
            &self,
            code: &str,
        ) -> purchase_store::Result<Option<purchase_store::Coupon>> {
            self.0.find_coupon_by_code(code).await
        }

        async fn update_coupon(
            &self,
            id: CouponId,
            update: &CouponUpdate,
        ) -> purchase_store::Result<u64> {
            self.0.update_coupon(id, update).await
        }

        async fn get_purchase(
            &self,
            id: PurchaseId,
        ) -> purchase_store::Result<Option<PurchaseRecord>> {
            self.0.get_purchase(id).await
        }

        async fn find_purchase_by_order(
            &self,
            order_id: &str,
            toolkit_id: ToolkitId,
        ) -> purchase_store::Result<Option<PurchaseRecord>> {
            self.0.find_purchase_by_order(order_id, toolkit_id).await
        }

        async fn has_completed_purchase(
            &self,
            user_id: UserId,
            toolkit_id: ToolkitId,
        ) -> purchase_store::Result<bool> {
            self.0.has_completed_purchase(user_id, toolkit_id).await
        }

        async fn count_completed_with_coupon(
            &self,
            user_id: UserId,
            coupon_id: CouponId,
        ) -> purchase_store::Result<i64> {
            self.0.count_completed_with_coupon(user_id, coupon_id).await
        }

        async fn update_purchase(
            &self,
            id: PurchaseId,
            update: &PurchaseUpdate,
            only_if: Option<PaymentStatus>,
        ) -> purchase_store::Result<u64> {
            if update.order_id.is_some() {
                return Ok(0);
            }
            self.0.update_purchase(id, update, only_if).await
        }

        async fn insert_opportunities(
            &self,
            records: &[NewOpportunity],
        ) -> purchase_store::Result<u64> {
            self.0.insert_opportunities(records).await
        }
    }

    #[tokio::test]
    async fn unattached_order_is_an_error() {
        let inner = InMemoryPurchaseStore::new();
        let toolkit_id = seed_toolkit(&inner, 1000).await;
        let gateway = InMemoryPaymentGateway::new();
        let manager = PurchaseManager::new(
            DetachedOrderStore(inner.clone()),
            gateway.clone(),
            PaymentVerifier::new(SECRET).unwrap(),
            "INR",
        );

        let result = manager.initiate(UserId::new(), toolkit_id, None).await;
        assert!(matches!(result, Err(CheckoutError::OrderNotAttached(_))));
        assert_eq!(gateway.order_count(), 1);
        assert_eq!(inner.purchase_count().unwrap(), 1);
    }
}

mod verification {
    use super::*;

    async fn pending_order(h: &Harness, user_id: UserId) -> (ToolkitId, String) {
        let toolkit_id = seed_toolkit(&h.store, 750).await;
        let initiated = h.manager.initiate(user_id, toolkit_id, None).await.unwrap();
        (toolkit_id, initiated.order.unwrap().id)
    }

    #[tokio::test]
    async fn bad_signature_leaves_record_pending() {
        let h = harness();
        let user_id = UserId::new();
        let (toolkit_id, order_id) = pending_order(&h, user_id).await;

        let mut cb = callback(&h.verifier, &order_id, "pay_1");
        cb.signature = "0".repeat(64);
        let result = h.manager.finalize(user_id, toolkit_id, &cb).await;
        assert!(matches!(result, Err(CheckoutError::Signature(_))));
        assert!(!h.manager.has_access(user_id, toolkit_id).await.unwrap());
    }

    #[tokio::test]
    async fn other_user_is_forbidden() {
        let h = harness();
        let owner = UserId::new();
        let (toolkit_id, order_id) = pending_order(&h, owner).await;

        let result = h
            .manager
            .finalize(
                UserId::new(),
                toolkit_id,
                &callback(&h.verifier, &order_id, "pay_1"),
            )
            .await;
        assert!(matches!(result, Err(CheckoutError::Forbidden)));
        assert!(!h.manager.has_access(owner, toolkit_id).await.unwrap());
    }

    #[tokio::test]
    async fn unknown_order_not_found() {
        let h = harness();
        let user_id = UserId::new();
        let (toolkit_id, _) = pending_order(&h, user_id).await;

        let result = h
            .manager
            .finalize(
                user_id,
                toolkit_id,
                &callback(&h.verifier, "order_9999", "pay_1"),
            )
            .await;
        assert!(matches!(result, Err(CheckoutError::PurchaseNotFound)));
    }

    #[tokio::test]
    async fn order_is_matched_per_toolkit() {
        let h = harness();
        let user_id = UserId::new();
        let (_, order_id) = pending_order(&h, user_id).await;
        let other_toolkit = seed_toolkit(&h.store, 750).await;

        let result = h
            .manager
            .finalize(
                user_id,
                other_toolkit,
                &callback(&h.verifier, &order_id, "pay_1"),
            )
            .await;
        assert!(matches!(result, Err(CheckoutError::PurchaseNotFound)));
    }

    #[tokio::test]
    async fn repeated_callback_is_idempotent() {
        let h = harness();
        let user_id = UserId::new();
        let (toolkit_id, order_id) = pending_order(&h, user_id).await;
        let cb = callback(&h.verifier, &order_id, "pay_1");

        let first = h.manager.finalize(user_id, toolkit_id, &cb).await.unwrap();
        let second = h.manager.finalize(user_id, toolkit_id, &cb).await.unwrap();
        assert_eq!(first, second);
        assert!(h.manager.has_access(user_id, toolkit_id).await.unwrap());

        let replaced = callback(&h.verifier, &order_id, "pay_2");
        let result = h.manager.finalize(user_id, toolkit_id, &replaced).await;
        assert!(matches!(result, Err(CheckoutError::AlreadyPurchased)));

        let record = h.store.get_purchase(first.purchase_id).await.unwrap().unwrap();
        assert_eq!(record.payment_id.as_deref(), Some("pay_1"));
    }

    #[tokio::test]
    async fn missing_fields_rejected() {
        let h = harness();
        let cb = PaymentCallback {
            order_id: String::new(),
            payment_id: "pay_1".to_string(),
            signature: "abc".to_string(),
        };
        let result = h.manager.finalize(UserId::new(), ToolkitId::new(), &cb).await;
        assert!(matches!(result, Err(CheckoutError::Validation(_))));
    }
}

mod concurrency {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn completed_purchases_never_exceed_max_uses() {
        const MAX_USES: i32 = 4;

        let h = harness();
        let toolkit_id = seed_toolkit(&h.store, 900).await;
        let coupon_id = seed_coupon(&h.store, "RUSH", 100, Some(MAX_USES), None).await;
        let manager = Arc::new(h.manager);

        let handles: Vec<_> = (0..10 * MAX_USES)
            .map(|_| {
                let manager = Arc::clone(&manager);
                let verifier = h.verifier.clone();
                tokio::spawn(async move {
                    let user_id = UserId::new();
                    let initiated = manager.initiate(user_id, toolkit_id, Some("rush")).await?;
                    let order_id = initiated.order.map(|o| o.id).unwrap_or_default();
                    let payment_id = format!("pay_{user_id}");
                    manager
                        .finalize(
                            user_id,
                            toolkit_id,
                            &callback(&verifier, &order_id, &payment_id),
                        )
                        .await
                })
            })
            .collect();

        let mut completed = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => completed += 1,
                Err(CheckoutError::Coupon(CouponError::CouponLimitReached)) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(completed, MAX_USES);
        let coupon = h.store.get_coupon(coupon_id).await.unwrap().unwrap();
        assert_eq!(coupon.current_uses, MAX_USES);

        let completed_records = h
            .store
            .purchases_with_coupon(coupon_id)
            .unwrap()
            .into_iter()
            .filter(|p| p.payment_status == PaymentStatus::Completed)
            .count();
        assert_eq!(completed_records, MAX_USES as usize);
    }
}

mod administration {
    use super::*;

    fn draft(code: &str, max_uses: Option<i32>) -> CouponDraft {
        CouponDraft {
            code: CouponCode::parse(code).unwrap(),
            discount_amount: Money::from_minor(250),
            max_uses,
            max_uses_per_user: None,
            is_active: true,
            expires_at: None,
        }
    }

    #[tokio::test]
    async fn create_and_get() {
        let store = InMemoryPurchaseStore::new();
        let admin = CouponAdmin::new(store.clone());

        let created = admin.create(draft(" spring ", Some(10))).await.unwrap();
        assert_eq!(created.code, "SPRING");
        assert_eq!(created.current_uses, 0);

        let fetched = admin.get(created.id).await.unwrap();
        assert_eq!(fetched, created);

        let missing = admin.get(CouponId::new()).await;
        assert!(matches!(missing, Err(CheckoutError::CouponNotFound(_))));
    }

    #[tokio::test]
    async fn duplicate_code_rejected() {
        let admin = CouponAdmin::new(InMemoryPurchaseStore::new());
        admin.create(draft("SPRING", None)).await.unwrap();

        let result = admin.create(draft("spring", None)).await;
        assert!(matches!(result, Err(CheckoutError::DuplicateCouponCode(_))));
    }

    #[tokio::test]
    async fn max_uses_cannot_drop_below_current_uses() {
        let h = harness();
        let toolkit_id = seed_toolkit(&h.store, 1000).await;
        let admin = CouponAdmin::new(h.store.clone());
        let coupon = admin.create(draft("LIMITED", Some(5))).await.unwrap();

        for _ in 0..3 {
            h.manager
                .initiate(UserId::new(), toolkit_id, Some("LIMITED"))
                .await
                .unwrap();
        }

        let lower = CouponUpdate {
            max_uses: Some(Some(2)),
            ..Default::default()
        };
        let result = admin.update(coupon.id, lower).await;
        assert!(matches!(
            result,
            Err(CheckoutError::MaxUsesBelowCurrentUses {
                max_uses: 2,
                current_uses: 3
            })
        ));

        let exact = CouponUpdate {
            max_uses: Some(Some(3)),
            is_active: Some(false),
            ..Default::default()
        };
        let updated = admin.update(coupon.id, exact).await.unwrap();
        assert_eq!(updated.max_uses, Some(3));
        assert!(!updated.is_active);

        let preview = h
            .manager
            .validate_coupon("LIMITED", toolkit_id, None)
            .await
            .unwrap();
        assert_eq!(preview.error.as_deref(), Some("This coupon is no longer active"));
    }

    #[tokio::test]
    async fn empty_update_rejected() {
        let admin = CouponAdmin::new(InMemoryPurchaseStore::new());
        let coupon = admin.create(draft("NOOP", None)).await.unwrap();
        let result = admin.update(coupon.id, CouponUpdate::default()).await;
        assert!(matches!(result, Err(CheckoutError::Validation(_))));
    }

    #[tokio::test]
    async fn deactivated_coupon_stays_inactive() {
        let h = harness();
        let toolkit_id = seed_toolkit(&h.store, 1000).await;
        let admin = CouponAdmin::new(h.store.clone());
        let coupon = admin.create(draft("PAUSED", None)).await.unwrap();

        let deactivate = CouponUpdate {
            is_active: Some(false),
            ..Default::default()
        };
        admin.update(coupon.id, deactivate).await.unwrap();

        let reactivate = CouponUpdate {
            is_active: Some(true),
            ..Default::default()
        };
        let result = admin.update(coupon.id, reactivate).await;
        assert!(matches!(
            result,
            Err(CheckoutError::Validation(
                domain::ValidationError::IrreversibleChange {
                    field: "is_active",
                    ..
                }
            ))
        ));

        let result = h
            .manager
            .initiate(UserId::new(), toolkit_id, Some("PAUSED"))
            .await;
        assert!(matches!(
            result,
            Err(CheckoutError::Coupon(CouponError::CouponNotActive))
        ));
        assert!(!admin.get(coupon.id).await.unwrap().is_active);
    }

    #[tokio::test]
    async fn expired_coupon_stays_expired() {
        let h = harness();
        let toolkit_id = seed_toolkit(&h.store, 1000).await;
        let admin = CouponAdmin::new(h.store.clone());
        let mut expired = draft("LAPSED", None);
        expired.expires_at = Some(chrono::Utc::now() - chrono::Duration::hours(1));
        let coupon = admin.create(expired).await.unwrap();

        for expires_at in [None, Some(chrono::Utc::now() + chrono::Duration::days(30))] {
            let extend = CouponUpdate {
                expires_at: Some(expires_at),
                ..Default::default()
            };
            let result = admin.update(coupon.id, extend).await;
            assert!(
                matches!(
                    result,
                    Err(CheckoutError::Validation(
                        domain::ValidationError::IrreversibleChange {
                            field: "expires_at",
                            ..
                        }
                    ))
                ),
                "expires_at {expires_at:?}"
            );
        }

        let result = h
            .manager
            .initiate(UserId::new(), toolkit_id, Some("LAPSED"))
            .await;
        assert!(matches!(
            result,
            Err(CheckoutError::Coupon(CouponError::CouponExpired))
        ));
    }
}

mod ingest {
    use super::*;

    fn batch(len: usize) -> Vec<NewOpportunity> {
        (0..len)
            .map(|i| NewOpportunity {
                title: format!("Fellowship {i}"),
                organization: "Research Institute".to_string(),
                url: Some(format!("https://example.org/{i}")),
                deadline: None,
            })
            .collect()
    }

    #[tokio::test]
    async fn authenticated_batch_is_stored() {
        let store = InMemoryPurchaseStore::new();
        let service = IngestService::new(
            store.clone(),
            TokenAuthenticator::new(Some("ingest-token".to_string())),
        );

        service.authenticate(Some("ingest-token")).unwrap();
        assert!(service.authenticate(Some("ingest-toke")).is_err());

        assert_eq!(service.ingest(&batch(3)).await.unwrap(), 3);
        assert_eq!(store.opportunity_count().unwrap(), 3);
    }

    #[tokio::test]
    async fn invalid_batch_writes_nothing() {
        let store = InMemoryPurchaseStore::new();
        let service = IngestService::new(store.clone(), TokenAuthenticator::new(None));

        let mut records = batch(2);
        records[1].organization = String::new();
        assert!(matches!(
            service.ingest(&records).await,
            Err(CheckoutError::Validation(_))
        ));
        assert_eq!(store.opportunity_count().unwrap(), 0);
    }
}
