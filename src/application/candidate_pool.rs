use crate::domain::amount::Amount;
use crate::domain::endpoint::Endpoint;
use crate::domain::method::PaymentMethod;
use crate::domain::ports::SessionFlagsBox;
use crate::error::{Result, RoutingError};
use rand::Rng;
use rand::seq::SliceRandom;

/// Filters and orders the endpoints eligible for one method and amount.
///
/// Owns the session's sticky-selection markers. A sticky method is
/// weight-ordered until [`CandidatePool::record_match`] marks it, and uniformly
/// shuffled after that; a non-sticky method is always weight-ordered.
pub struct CandidatePool {
    flags: SessionFlagsBox,
}

impl CandidatePool {
    pub fn new(flags: SessionFlagsBox) -> Self {
        Self { flags }
    }

    pub async fn select<R: Rng + ?Sized>(
        &self,
        endpoints: &[Endpoint],
        method: PaymentMethod,
        amount: &Amount,
        rng: &mut R,
    ) -> Result<Vec<Endpoint>> {
        let mut candidates: Vec<Endpoint> = endpoints
            .iter()
            .filter(|e| e.accepts(method, amount.value()))
            .cloned()
            .collect();

        if candidates.is_empty() {
            return Err(RoutingError::NoEligibleChannel {
                method,
                amount: amount.value(),
            });
        }

        // Pre-shuffle so the stable sort below breaks weight ties randomly.
        candidates.shuffle(rng);

        if method.is_sticky() && self.flags.get(method).await {
            candidates.shuffle(rng);
        } else {
            candidates.sort_by_key(|e| e.sort_weight);
        }

        tracing::debug!(
            method = %method,
            amount = %amount,
            candidates = candidates.len(),
            first = %candidates[0].id,
            "candidate pool ordered"
        );
        Ok(candidates)
    }

    /// Marks a sticky method as matched for the rest of the session.
    ///
    /// Called once a submission has actually gone out, so a match that is
    /// cancelled or rejected locally leaves the next ordering untouched.
    pub async fn record_match(&self, method: PaymentMethod) {
        if method.is_sticky() && !self.flags.get(method).await {
            tracing::debug!(method = %method, "sticky method matched");
            self.flags.set(method).await;
        }
    }

    /// Forgets every sticky marker, as when the payer leaves the screen.
    pub async fn reset_session(&self) {
        self.flags.clear().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::in_memory::InMemorySessionFlags;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn pool() -> CandidatePool {
        CandidatePool::new(Box::new(InMemorySessionFlags::new()))
    }

    fn amount(v: rust_decimal::Decimal) -> Amount {
        Amount::new(v).unwrap()
    }

    fn wechat_endpoints() -> Vec<Endpoint> {
        vec![
            Endpoint::new("w3", PaymentMethod::Wechat, 3),
            Endpoint::new("w1", PaymentMethod::Wechat, 1),
            Endpoint::new("w2", PaymentMethod::Wechat, 2),
            Endpoint::new("a1", PaymentMethod::Alipay, 0),
        ]
    }

    #[tokio::test]
    async fn test_filters_by_method_and_range() {
        let endpoints = vec![
            Endpoint::new("small", PaymentMethod::UnionPay, 1).with_range(None, Some(dec!(50))),
            Endpoint::new("large", PaymentMethod::UnionPay, 2).with_range(Some(dec!(50)), None),
            Endpoint::new("wallet", PaymentMethod::Wechat, 0),
        ];
        let mut rng = StdRng::seed_from_u64(7);
        let picked = pool()
            .select(&endpoints, PaymentMethod::UnionPay, &amount(dec!(80)), &mut rng)
            .await
            .unwrap();
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].id.as_str(), "large");
    }

    #[tokio::test]
    async fn test_empty_pool_is_terminal() {
        let mut rng = StdRng::seed_from_u64(7);
        let result = pool()
            .select(
                &wechat_endpoints(),
                PaymentMethod::BankCard,
                &amount(dec!(10)),
                &mut rng,
            )
            .await;
        assert!(matches!(result, Err(RoutingError::NoEligibleChannel { .. })));
    }

    #[tokio::test]
    async fn test_non_sticky_always_weight_ordered() {
        let endpoints = vec![
            Endpoint::new("u2", PaymentMethod::UnionPay, 2),
            Endpoint::new("u1", PaymentMethod::UnionPay, 1),
        ];
        let pool = pool();
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..20 {
            let picked = pool
                .select(&endpoints, PaymentMethod::UnionPay, &amount(dec!(10)), &mut rng)
                .await
                .unwrap();
            assert_eq!(picked[0].id.as_str(), "u1");
        }
    }

    #[tokio::test]
    async fn test_sticky_first_match_is_weight_ordered() {
        for seed in 0..50 {
            let pool = pool();
            let mut rng = StdRng::seed_from_u64(seed);
            let picked = pool
                .select(
                    &wechat_endpoints(),
                    PaymentMethod::Wechat,
                    &amount(dec!(100)),
                    &mut rng,
                )
                .await
                .unwrap();
            let ids: Vec<&str> = picked.iter().map(|e| e.id.as_str()).collect();
            assert_eq!(ids, vec!["w1", "w2", "w3"]);
            assert!(!pool.flags.get(PaymentMethod::Wechat).await);

            pool.record_match(PaymentMethod::Wechat).await;
            assert!(pool.flags.get(PaymentMethod::Wechat).await);
            assert!(!pool.flags.get(PaymentMethod::Alipay).await);
        }
    }

    #[tokio::test]
    async fn test_weight_ties_are_randomised() {
        let endpoints = vec![
            Endpoint::new("t1", PaymentMethod::UnionPay, 1),
            Endpoint::new("t2", PaymentMethod::UnionPay, 1),
        ];
        let pool = pool();
        let mut rng = StdRng::seed_from_u64(99);
        let mut firsts = HashMap::new();
        for _ in 0..200 {
            let picked = pool
                .select(&endpoints, PaymentMethod::UnionPay, &amount(dec!(10)), &mut rng)
                .await
                .unwrap();
            *firsts.entry(picked[0].id.clone()).or_insert(0) += 1;
        }
        assert_eq!(firsts.len(), 2);
    }

    #[tokio::test]
    async fn test_sticky_repeat_match_is_uniform() {
        let pool = pool();
        let mut rng = StdRng::seed_from_u64(2024);
        let endpoints = wechat_endpoints();
        let amt = amount(dec!(100));

        pool.select(&endpoints, PaymentMethod::Wechat, &amt, &mut rng)
            .await
            .unwrap();
        pool.record_match(PaymentMethod::Wechat).await;

        let trials = 3000;
        let mut counts: HashMap<String, usize> = HashMap::new();
        for _ in 0..trials {
            let picked = pool
                .select(&endpoints, PaymentMethod::Wechat, &amt, &mut rng)
                .await
                .unwrap();
            *counts.entry(picked[0].id.0.clone()).or_insert(0) += 1;
        }

        assert_eq!(counts.len(), 3);
        let expected = trials / 3;
        for (id, count) in counts {
            let deviation = count.abs_diff(expected);
            assert!(
                deviation < expected / 5,
                "{id} picked {count} times, expected about {expected}"
            );
        }
    }

    #[tokio::test]
    async fn test_reset_session_restores_weight_order() {
        let pool = pool();
        let mut rng = StdRng::seed_from_u64(3);
        let endpoints = wechat_endpoints();
        let amt = amount(dec!(100));
        pool.select(&endpoints, PaymentMethod::Wechat, &amt, &mut rng)
            .await
            .unwrap();
        pool.record_match(PaymentMethod::Wechat).await;
        pool.reset_session().await;
        assert!(!pool.flags.get(PaymentMethod::Wechat).await);
        let picked = pool
            .select(&endpoints, PaymentMethod::Wechat, &amt, &mut rng)
            .await
            .unwrap();
        assert_eq!(picked[0].id.as_str(), "w1");
    }

    #[tokio::test]
    async fn test_unrecorded_selection_keeps_weight_order() {
        let pool = pool();
        let mut rng = StdRng::seed_from_u64(5);
        let endpoints = wechat_endpoints();
        let amt = amount(dec!(100));
        for _ in 0..20 {
            let picked = pool
                .select(&endpoints, PaymentMethod::Wechat, &amt, &mut rng)
                .await
                .unwrap();
            assert_eq!(picked[0].id.as_str(), "w1");
        }

        pool.record_match(PaymentMethod::UnionPay).await;
        assert!(!pool.flags.get(PaymentMethod::UnionPay).await);
    }
}
