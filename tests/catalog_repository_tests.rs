//! Catalog repository tests: customers, meters, features, plans, prices,
//! credit grants and environments against a migrated SQLite database.

use anyhow::Result;
use billing::error::RepositoryError;
use billing::models::credit_grant::GrantScope;
use billing::models::environment::EnvironmentType;
use billing::models::feature::FeatureType;
use billing::models::price::{PriceTier, RoundMode, TransformQuantity};
use billing::repositories::credit_grant::NewCreditGrant;
use billing::repositories::customer::{CustomerFilter, NewCustomer, UpdateCustomer};
use billing::repositories::environment::NewEnvironment;
use billing::repositories::feature::NewFeature;
use billing::repositories::{
    CreditGrantRepository, CustomerRepository, EnvironmentRepository, FeatureRepository,
    PlanRepository, PriceRepository,
};
use billing::types::{BillingModel, Pagination, TenantScope, TierMode};
use rust_decimal_macros::dec;

#[path = "test_utils/mod.rs"]
mod test_utils;

use test_utils::{
    create_customer, create_meter, create_plan, create_price, fixed_price, scope, setup_test_db,
    usage_price,
};

#[tokio::test]
async fn customer_crud_round_trip() -> Result<()> {
    let db = setup_test_db().await?;
    let scope = scope();
    let repo = CustomerRepository::new(&db, &scope);

    let created = repo
        .create(NewCustomer {
            external_id: "acme".into(),
            name: "Acme Corp".into(),
            email: Some("billing@acme.io".into()),
            address_country: Some("us".into()),
            ..Default::default()
        })
        .await?;
    assert!(created.id.starts_with("cust_"));
    assert_eq!(created.address_country.as_deref(), Some("US"));
    assert_eq!(created.created_by.as_deref(), Some("user_test"));

    let by_external = repo.get_by_external_id("acme").await?;
    assert_eq!(by_external.id, created.id);

    let updated = repo
        .update(
            &created.id,
            UpdateCustomer {
                name: Some("Acme Inc".into()),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(updated.name, "Acme Inc");
    assert_eq!(updated.email.as_deref(), Some("billing@acme.io"));

    repo.delete(&created.id).await?;
    assert!(matches!(
        repo.get(&created.id).await,
        Err(RepositoryError::NotFound(_))
    ));
    assert!(matches!(
        repo.delete(&created.id).await,
        Err(RepositoryError::NotFound(_))
    ));
    Ok(())
}

#[tokio::test]
async fn duplicate_external_id_is_a_constraint_error_until_deleted() -> Result<()> {
    let db = setup_test_db().await?;
    let scope = scope();
    let first = create_customer(&db, &scope, "dup").await?;

    let err = create_customer(&db, &scope, "dup").await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RepositoryError>(),
        Some(RepositoryError::Constraint(_))
    ));

    CustomerRepository::new(&db, &scope).delete(&first.id).await?;
    let second = create_customer(&db, &scope, "dup").await?;
    assert_ne!(second.id, first.id);
    Ok(())
}

#[tokio::test]
async fn customer_input_is_validated() -> Result<()> {
    let db = setup_test_db().await?;
    let scope = scope();
    let repo = CustomerRepository::new(&db, &scope);

    for (email, country) in [
        (Some("not-an-email"), None),
        (Some("a@localhost"), None),
        (None, Some("USA")),
    ] {
        let result = repo
            .create(NewCustomer {
                external_id: "x".into(),
                name: "X".into(),
                email: email.map(String::from),
                address_country: country.map(String::from),
                ..Default::default()
            })
            .await;
        assert!(
            matches!(result, Err(RepositoryError::Validation(_))),
            "email {email:?} country {country:?} should be rejected"
        );
    }

    let blank = repo
        .create(NewCustomer {
            external_id: "  ".into(),
            name: "X".into(),
            ..Default::default()
        })
        .await;
    assert!(matches!(blank, Err(RepositoryError::Validation(_))));
    Ok(())
}

#[tokio::test]
async fn rows_are_invisible_to_other_tenants_and_environments() -> Result<()> {
    let db = setup_test_db().await?;
    let owner = scope();
    let customer = create_customer(&db, &owner, "isolated").await?;

    for other in [
        TenantScope::new("tenant_other", "env_test"),
        TenantScope::new("tenant_test", "env_other"),
    ] {
        let repo = CustomerRepository::new(&db, &other);
        assert!(matches!(
            repo.get(&customer.id).await,
            Err(RepositoryError::NotFound(_))
        ));
        assert!(matches!(
            repo.delete(&customer.id).await,
            Err(RepositoryError::NotFound(_))
        ));
        let page = repo
            .list(&CustomerFilter::default(), &Pagination::default())
            .await?;
        assert!(page.items.is_empty());

        // The same external id is free in another scope.
        create_customer(&db, &other, "isolated").await?;
    }
    Ok(())
}

#[tokio::test]
async fn customer_list_paginates_newest_first() -> Result<()> {
    let db = setup_test_db().await?;
    let scope = scope();
    for n in 0..5 {
        create_customer(&db, &scope, &format!("page-{n}")).await?;
    }
    let repo = CustomerRepository::new(&db, &scope);

    let first = repo
        .list(&CustomerFilter::default(), &Pagination::new(2, 0))
        .await?;
    assert_eq!(first.items.len(), 2);
    assert_eq!(first.pagination.total, 5);
    assert!(first.pagination.has_more);

    let last = repo
        .list(&CustomerFilter::default(), &Pagination::new(2, 4))
        .await?;
    assert_eq!(last.items.len(), 1);
    assert!(!last.pagination.has_more);

    let filtered = repo
        .list(
            &CustomerFilter {
                external_id: Some("page-3".into()),
                email: None,
            },
            &Pagination::default(),
        )
        .await?;
    assert_eq!(filtered.items.len(), 1);
    assert_eq!(filtered.items[0].external_id, "page-3");
    Ok(())
}

#[tokio::test]
async fn metered_features_require_an_existing_meter() -> Result<()> {
    let db = setup_test_db().await?;
    let scope = scope();
    let repo = FeatureRepository::new(&db, &scope);
    let feature = |lookup_key: &str, feature_type, meter_id: Option<String>| NewFeature {
        lookup_key: lookup_key.into(),
        name: lookup_key.into(),
        description: None,
        feature_type,
        meter_id,
        unit_singular: None,
        unit_plural: None,
        metadata: None,
    };

    let missing = repo
        .create(feature("api_calls", FeatureType::Metered, None))
        .await;
    assert!(matches!(missing, Err(RepositoryError::Validation(_))));

    let unknown = repo
        .create(feature(
            "api_calls",
            FeatureType::Metered,
            Some("meter_missing".into()),
        ))
        .await;
    assert!(unknown.is_err());

    let meter = create_meter(&db, &scope, "api.call").await?;
    let metered = repo
        .create(feature(
            "api_calls",
            FeatureType::Metered,
            Some(meter.id.clone()),
        ))
        .await?;
    assert_eq!(metered.meter_id.as_deref(), Some(meter.id.as_str()));

    let boolean_with_meter = repo
        .create(feature("sso", FeatureType::Boolean, Some(meter.id.clone())))
        .await;
    assert!(matches!(
        boolean_with_meter,
        Err(RepositoryError::Validation(_))
    ));

    let duplicate = repo
        .create(feature("api_calls", FeatureType::Metered, Some(meter.id)))
        .await;
    assert!(matches!(duplicate, Err(RepositoryError::Constraint(_))));
    Ok(())
}

#[tokio::test]
async fn price_shapes_are_validated_on_create() -> Result<()> {
    let db = setup_test_db().await?;
    let scope = scope();
    let plan = create_plan(&db, &scope, "pro").await?;
    let meter = create_meter(&db, &scope, "tokens").await?;
    let repo = PriceRepository::new(&db, &scope);

    let fixed = repo.create(fixed_price(&plan.id, dec!(20), "USD")).await?;
    assert_eq!(fixed.currency, "usd");
    assert!(fixed.id.starts_with("price_"));

    let mut usage_without_meter = usage_price(&plan.id, &meter.id, dec!(1), "usd");
    usage_without_meter.meter_id = None;
    assert!(matches!(
        repo.create(usage_without_meter).await,
        Err(RepositoryError::Validation(_))
    ));

    let mut package = usage_price(&plan.id, &meter.id, dec!(5), "usd");
    package.billing_model = BillingModel::Package;
    package.transform_quantity = Some(TransformQuantity {
        divide_by: 0,
        round: RoundMode::Up,
    });
    assert!(matches!(
        repo.create(package.clone()).await,
        Err(RepositoryError::Validation(_))
    ));
    package.transform_quantity = Some(TransformQuantity {
        divide_by: 100,
        round: RoundMode::Up,
    });
    repo.create(package).await?;

    let tier = |up_to: Option<u64>, unit: rust_decimal::Decimal| PriceTier {
        up_to,
        unit_amount: unit,
        flat_amount: None,
    };
    let mut tiered = usage_price(&plan.id, &meter.id, dec!(0), "usd");
    tiered.billing_model = BillingModel::Tiered;
    tiered.tier_mode = Some(TierMode::Slab);
    tiered.tiers = Some(vec![tier(None, dec!(1)), tier(Some(10), dec!(2))]);
    assert!(matches!(
        repo.create(tiered.clone()).await,
        Err(RepositoryError::Validation(_))
    ));
    tiered.tiers = Some(vec![tier(Some(10), dec!(2)), tier(Some(10), dec!(1))]);
    assert!(matches!(
        repo.create(tiered.clone()).await,
        Err(RepositoryError::Validation(_))
    ));
    tiered.tiers = Some(vec![tier(Some(10), dec!(2)), tier(None, dec!(1))]);
    let stored = repo.create(tiered).await?;
    assert_eq!(stored.parsed_tiers()?.len(), 2);

    assert_eq!(repo.list_by_plan(&plan.id).await?.len(), 3);
    Ok(())
}

#[tokio::test]
async fn prices_need_an_existing_plan() -> Result<()> {
    let db = setup_test_db().await?;
    let scope = scope();
    let result = create_price(&db, &scope, fixed_price("plan_missing", dec!(1), "usd")).await;
    assert!(result.is_err());
    Ok(())
}

#[tokio::test]
async fn plan_lookup_keys_are_unique_per_scope() -> Result<()> {
    let db = setup_test_db().await?;
    let scope = scope();
    let plan = create_plan(&db, &scope, "starter").await?;

    let again = create_plan(&db, &scope, "starter").await.unwrap_err();
    assert!(matches!(
        again.downcast_ref::<RepositoryError>(),
        Some(RepositoryError::Constraint(_))
    ));

    let found = PlanRepository::new(&db, &scope)
        .get_by_lookup_key("starter")
        .await?;
    assert_eq!(found.id, plan.id);
    Ok(())
}

#[tokio::test]
async fn credit_grants_attach_to_plans() -> Result<()> {
    let db = setup_test_db().await?;
    let scope = scope();
    let plan = create_plan(&db, &scope, "credits").await?;
    let repo = CreditGrantRepository::new(&db, &scope);
    let grant = |credits| NewCreditGrant {
        name: "Monthly credits".into(),
        scope: GrantScope::Plan,
        plan_id: Some(plan.id.clone()),
        subscription_id: None,
        credits,
        currency: "USD".into(),
        cadence: None,
        expiration_days: Some(30),
        priority: None,
        metadata: None,
    };

    assert!(matches!(
        repo.create(grant(dec!(0))).await,
        Err(RepositoryError::Validation(_))
    ));
    let created = repo.create(grant(dec!(100))).await?;
    assert_eq!(created.currency, "usd");

    let mut unscoped = grant(dec!(5));
    unscoped.plan_id = None;
    assert!(matches!(
        repo.create(unscoped).await,
        Err(RepositoryError::Validation(_))
    ));

    let for_plan = repo.list_for_plan(&plan.id).await?;
    assert_eq!(for_plan.len(), 1);
    assert_eq!(for_plan[0].id, created.id);
    Ok(())
}

#[tokio::test]
async fn environments_are_scoped_by_tenant() -> Result<()> {
    let db = setup_test_db().await?;
    let repo = EnvironmentRepository::new(&db, "tenant_a");

    let production = repo
        .create(
            NewEnvironment {
                name: "Production".into(),
                environment_type: EnvironmentType::Production,
            },
            Some("user_a".into()),
        )
        .await?;
    repo.create(
        NewEnvironment {
            name: "Sandbox".into(),
            environment_type: EnvironmentType::Development,
        },
        None,
    )
    .await?;

    assert_eq!(repo.list().await?.len(), 2);
    assert_eq!(repo.get(&production.id).await?.name, "Production");

    let other = EnvironmentRepository::new(&db, "tenant_b");
    assert!(other.list().await?.is_empty());
    assert!(matches!(
        other.get(&production.id).await,
        Err(RepositoryError::NotFound(_))
    ));
    Ok(())
}
