//! # Entitlement Service
//!
//! Plan entitlements and their aggregation per customer.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use utoipa::ToSchema;

use crate::error::{RepositoryError, RepositoryResult};
use crate::models::entitlement;
use crate::models::feature::FeatureType;
use crate::models::subscription::SubscriptionStatus;
use crate::repositories::{
    CustomerRepository, EntitlementRepository, FeatureRepository, PlanRepository,
    SubscriptionRepository, now,
};
use crate::types::{BillingPeriod, Status, TenantScope, ids};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateEntitlementRequest {
    pub plan_id: String,
    pub feature_id: String,
    pub is_enabled: Option<bool>,
    /// `null` means unlimited
    pub usage_limit: Option<i64>,
    pub usage_reset_period: Option<BillingPeriod>,
    #[serde(default)]
    pub is_soft_limit: bool,
    pub static_value: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EntitlementSource {
    pub subscription_id: String,
    pub plan_id: String,
    pub entitlement_id: String,
}

/// One feature as the customer experiences it across all subscriptions.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AggregatedFeature {
    pub feature_id: String,
    pub lookup_key: String,
    pub name: String,
    pub feature_type: FeatureType,
    pub is_enabled: bool,
    pub usage_limit: Option<i64>,
    pub is_soft_limit: bool,
    pub static_values: Vec<String>,
    pub sources: Vec<EntitlementSource>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CustomerEntitlements {
    pub customer_id: String,
    pub features: Vec<AggregatedFeature>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AccessCheck {
    pub feature_id: String,
    pub lookup_key: String,
    pub allowed: bool,
    pub reason: String,
    pub usage_limit: Option<i64>,
    pub is_soft_limit: bool,
}

#[derive(Clone)]
pub struct EntitlementService {
    db: Arc<DatabaseConnection>,
}

impl EntitlementService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip_all, fields(tenant_id = %scope.tenant_id, plan_id = %req.plan_id))]
    pub async fn create_entitlement(
        &self,
        scope: &TenantScope,
        req: CreateEntitlementRequest,
    ) -> RepositoryResult<entitlement::Model> {
        scope.validate()?;
        let db = self.db.as_ref();
        PlanRepository::new(db, scope).get(&req.plan_id).await?;
        let feature = FeatureRepository::new(db, scope)
            .get(&req.feature_id)
            .await?;

        match feature.feature_type {
            FeatureType::Metered if req.usage_reset_period.is_none() => {
                return Err(RepositoryError::validation_error(
                    "usage_reset_period is required for metered features",
                ));
            }
            FeatureType::Static
                if req
                    .static_value
                    .as_deref()
                    .is_none_or(|value| value.trim().is_empty()) =>
            {
                return Err(RepositoryError::validation_error(
                    "static_value is required for static features",
                ));
            }
            _ => {}
        }
        if req.usage_limit.is_some_and(|limit| limit < 0) {
            return Err(RepositoryError::validation_error(
                "usage_limit must not be negative",
            ));
        }

        let repo = EntitlementRepository::new(db, scope);
        if repo
            .exists_for_plan_feature(&req.plan_id, &req.feature_id)
            .await?
        {
            return Err(RepositoryError::Constraint(format!(
                "plan {} already has an entitlement for feature {}",
                req.plan_id, req.feature_id
            )));
        }

        let metered = feature.feature_type == FeatureType::Metered;
        let now = now();
        repo.insert(entitlement::Model {
            id: ids::generate(ids::ENTITLEMENT),
            tenant_id: scope.tenant_id.clone(),
            environment_id: scope.environment_id.clone(),
            status: Status::Published,
            created_at: now,
            updated_at: now,
            created_by: scope.actor(),
            updated_by: scope.actor(),
            plan_id: req.plan_id,
            feature_id: req.feature_id,
            feature_type: feature.feature_type,
            is_enabled: req.is_enabled.unwrap_or(true),
            usage_limit: if metered { req.usage_limit } else { None },
            usage_reset_period: if metered { req.usage_reset_period } else { None },
            is_soft_limit: metered && req.is_soft_limit,
            static_value: match feature.feature_type {
                FeatureType::Static => req.static_value,
                _ => None,
            },
        })
        .await
    }

    /// Entitlements of every plan behind the customer's active or trialing
    /// subscriptions, merged per feature.
    pub async fn customer_entitlements(
        &self,
        scope: &TenantScope,
        customer_id: &str,
    ) -> RepositoryResult<CustomerEntitlements> {
        let db = self.db.as_ref();
        CustomerRepository::new(db, scope).get(customer_id).await?;

        let subscriptions = SubscriptionRepository::new(db, scope)
            .list_for_customer(
                customer_id,
                &[SubscriptionStatus::Active, SubscriptionStatus::Trialing],
            )
            .await?;
        let plan_ids: Vec<String> = subscriptions
            .iter()
            .map(|s| s.plan_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut by_plan: HashMap<String, Vec<entitlement::Model>> = HashMap::new();
        for ent in EntitlementRepository::new(db, scope)
            .list_by_plan_ids(&plan_ids)
            .await?
        {
            by_plan.entry(ent.plan_id.clone()).or_default().push(ent);
        }

        let mut grouped: BTreeMap<String, Vec<(&str, &entitlement::Model)>> = BTreeMap::new();
        for subscription in &subscriptions {
            for ent in by_plan.get(&subscription.plan_id).into_iter().flatten() {
                grouped
                    .entry(ent.feature_id.clone())
                    .or_default()
                    .push((subscription.id.as_str(), ent));
            }
        }

        let feature_ids: Vec<String> = grouped.keys().cloned().collect();
        let features: HashMap<String, _> = FeatureRepository::new(db, scope)
            .list_by_ids(&feature_ids)
            .await?
            .into_iter()
            .map(|feature| (feature.id.clone(), feature))
            .collect();

        let mut aggregated = Vec::with_capacity(grouped.len());
        for (feature_id, entries) in grouped {
            // Entitlements of deleted features no longer grant anything.
            let Some(feature) = features.get(&feature_id) else {
                continue;
            };
            let entitlements: Vec<&entitlement::Model> = entries.iter().map(|(_, e)| *e).collect();
            let (usage_limit, is_soft_limit) = merge_limits(&entitlements);
            aggregated.push(AggregatedFeature {
                feature_id: feature.id.clone(),
                lookup_key: feature.lookup_key.clone(),
                name: feature.name.clone(),
                feature_type: feature.feature_type,
                is_enabled: entitlements.iter().any(|e| e.is_enabled),
                usage_limit,
                is_soft_limit,
                static_values: entitlements
                    .iter()
                    .filter(|e| e.is_enabled)
                    .filter_map(|e| e.static_value.clone())
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect(),
                sources: entries
                    .iter()
                    .map(|(subscription_id, e)| EntitlementSource {
                        subscription_id: subscription_id.to_string(),
                        plan_id: e.plan_id.clone(),
                        entitlement_id: e.id.clone(),
                    })
                    .collect(),
            });
        }

        Ok(CustomerEntitlements {
            customer_id: customer_id.to_string(),
            features: aggregated,
        })
    }

    pub async fn check_access(
        &self,
        scope: &TenantScope,
        customer_id: &str,
        lookup_key: &str,
        requested_usage: Option<i64>,
    ) -> RepositoryResult<AccessCheck> {
        let feature = FeatureRepository::new(self.db.as_ref(), scope)
            .get_by_lookup_key(lookup_key)
            .await?;
        let entitlements = self.customer_entitlements(scope, customer_id).await?;

        let Some(aggregated) = entitlements
            .features
            .into_iter()
            .find(|f| f.feature_id == feature.id)
        else {
            return Ok(AccessCheck {
                feature_id: feature.id,
                lookup_key: feature.lookup_key,
                allowed: false,
                reason: "no active subscription grants this feature".to_string(),
                usage_limit: None,
                is_soft_limit: false,
            });
        };

        let (allowed, reason) = decide_access(&aggregated, requested_usage);
        Ok(AccessCheck {
            feature_id: aggregated.feature_id,
            lookup_key: aggregated.lookup_key,
            allowed,
            reason: reason.to_string(),
            usage_limit: aggregated.usage_limit,
            is_soft_limit: aggregated.is_soft_limit,
        })
    }
}

/// Sum of the enabled limits. Any enabled unlimited entitlement makes the
/// total unlimited; the total is soft if any part is soft.
fn merge_limits(entitlements: &[&entitlement::Model]) -> (Option<i64>, bool) {
    let enabled: Vec<_> = entitlements.iter().filter(|e| e.is_enabled).collect();
    if enabled.is_empty() {
        return (Some(0), false);
    }
    let soft = enabled.iter().any(|e| e.is_soft_limit);
    let limit = enabled
        .iter()
        .try_fold(0i64, |total, e| e.usage_limit.map(|limit| total.saturating_add(limit)));
    (limit, soft)
}

fn decide_access(feature: &AggregatedFeature, requested_usage: Option<i64>) -> (bool, &'static str) {
    if !feature.is_enabled {
        return (false, "feature is disabled");
    }
    match feature.feature_type {
        FeatureType::Boolean => (true, "feature is enabled"),
        FeatureType::Static if feature.static_values.is_empty() => (false, "no value configured"),
        FeatureType::Static => (true, "feature is enabled"),
        FeatureType::Metered => match (feature.usage_limit, requested_usage) {
            (None, _) => (true, "unlimited usage"),
            (Some(_), None) => (true, "feature is enabled"),
            (Some(limit), Some(usage)) if usage <= limit => (true, "within usage limit"),
            (Some(_), Some(_)) if feature.is_soft_limit => (true, "soft usage limit exceeded"),
            (Some(_), Some(_)) => (false, "usage limit exceeded"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ent(limit: Option<i64>, soft: bool, enabled: bool) -> entitlement::Model {
        entitlement::Model {
            id: ids::generate(ids::ENTITLEMENT),
            tenant_id: "t".into(),
            environment_id: "e".into(),
            status: Status::Published,
            created_at: now(),
            updated_at: now(),
            created_by: None,
            updated_by: None,
            plan_id: "plan_1".into(),
            feature_id: "feat_1".into(),
            feature_type: FeatureType::Metered,
            is_enabled: enabled,
            usage_limit: limit,
            usage_reset_period: Some(BillingPeriod::Monthly),
            is_soft_limit: soft,
            static_value: None,
        }
    }

    fn metered(limit: Option<i64>, soft: bool) -> AggregatedFeature {
        AggregatedFeature {
            feature_id: "feat_1".into(),
            lookup_key: "api_calls".into(),
            name: "API calls".into(),
            feature_type: FeatureType::Metered,
            is_enabled: true,
            usage_limit: limit,
            is_soft_limit: soft,
            static_values: Vec::new(),
            sources: Vec::new(),
        }
    }

    #[test]
    fn limits_sum_and_null_means_unlimited() {
        let (a, b, c) = (ent(Some(100), false, true), ent(Some(50), true, true), ent(None, false, true));
        assert_eq!(merge_limits(&[&a, &b]), (Some(150), true));
        assert_eq!(merge_limits(&[&a, &c]), (None, false));

        let disabled = ent(None, false, false);
        assert_eq!(merge_limits(&[&a, &disabled]), (Some(100), false));
    }

    #[test]
    fn metered_access_respects_hard_and_soft_limits() {
        assert!(decide_access(&metered(Some(10), false), Some(10)).0);
        assert!(!decide_access(&metered(Some(10), false), Some(11)).0);
        assert!(decide_access(&metered(Some(10), true), Some(11)).0);
        assert!(decide_access(&metered(None, false), Some(1_000_000)).0);
    }
}
