//! Customer repository.

use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, IntoActiveModel, QueryFilter, Set};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use super::{find_one, get_scoped, now, paginate, require, scoped, soft_delete};
use crate::error::{RepositoryError, RepositoryResult};
use crate::models::customer;
use crate::types::{ListResult, Pagination, Status, TenantScope, ids};

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct NewCustomer {
    pub external_id: String,
    pub name: String,
    pub email: Option<String>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub address_city: Option<String>,
    pub address_state: Option<String>,
    pub address_postal_code: Option<String>,
    pub address_country: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// Partial update; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateCustomer {
    pub external_id: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub address_city: Option<String>,
    pub address_state: Option<String>,
    pub address_postal_code: Option<String>,
    pub address_country: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct CustomerFilter {
    pub external_id: Option<String>,
    pub email: Option<String>,
}

pub struct CustomerRepository<'a, C> {
    db: &'a C,
    scope: &'a TenantScope,
}

fn validate_email(email: &Option<String>) -> RepositoryResult<()> {
    if let Some(email) = email {
        let valid = email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
        if !valid {
            return Err(RepositoryError::validation_error(format!(
                "invalid email '{email}'"
            )));
        }
    }
    Ok(())
}

fn validate_country(country: &Option<String>) -> RepositoryResult<()> {
    if let Some(country) = country
        && (country.len() != 2 || !country.chars().all(|c| c.is_ascii_alphabetic()))
    {
        return Err(RepositoryError::validation_error(
            "address_country must be an ISO 3166-1 alpha-2 code",
        ));
    }
    Ok(())
}

impl<'a, C: ConnectionTrait> CustomerRepository<'a, C> {
    pub fn new(db: &'a C, scope: &'a TenantScope) -> Self {
        Self { db, scope }
    }

    pub async fn create(&self, input: NewCustomer) -> RepositoryResult<customer::Model> {
        self.scope.validate()?;
        require(&input.external_id, "external_id")?;
        require(&input.name, "name")?;
        validate_email(&input.email)?;
        validate_country(&input.address_country)?;

        let now = now();
        let model = customer::ActiveModel {
            id: Set(ids::generate(ids::CUSTOMER)),
            tenant_id: Set(self.scope.tenant_id.clone()),
            environment_id: Set(self.scope.environment_id.clone()),
            status: Set(Status::Published),
            created_at: Set(now),
            updated_at: Set(now),
            created_by: Set(self.scope.actor()),
            updated_by: Set(self.scope.actor()),
            external_id: Set(input.external_id),
            name: Set(input.name),
            email: Set(input.email),
            address_line1: Set(input.address_line1),
            address_line2: Set(input.address_line2),
            address_city: Set(input.address_city),
            address_state: Set(input.address_state),
            address_postal_code: Set(input.address_postal_code),
            address_country: Set(input.address_country.map(|c| c.to_ascii_uppercase())),
            metadata: Set(input.metadata),
        }
        .insert(self.db)
        .await?;

        tracing::info!(
            tenant_id = %self.scope.tenant_id,
            customer_id = %model.id,
            "Created customer"
        );
        Ok(model)
    }

    pub async fn get(&self, id: &str) -> RepositoryResult<customer::Model> {
        get_scoped::<customer::Entity, _>(self.db, self.scope, "customer", id).await
    }

    pub async fn get_by_external_id(&self, external_id: &str) -> RepositoryResult<customer::Model> {
        let select = scoped::<customer::Entity>(self.scope)
            .filter(customer::Column::ExternalId.eq(external_id));
        find_one(self.db, select, &format!("customer with external_id {external_id}")).await
    }

    pub async fn list(
        &self,
        filter: &CustomerFilter,
        page: &Pagination,
    ) -> RepositoryResult<ListResult<customer::Model>> {
        let mut select = scoped::<customer::Entity>(self.scope);
        if let Some(external_id) = &filter.external_id {
            select = select.filter(customer::Column::ExternalId.eq(external_id.as_str()));
        }
        if let Some(email) = &filter.email {
            select = select.filter(customer::Column::Email.eq(email.as_str()));
        }
        paginate(self.db, select, page).await
    }

    pub async fn update(
        &self,
        id: &str,
        input: UpdateCustomer,
    ) -> RepositoryResult<customer::Model> {
        validate_email(&input.email)?;
        validate_country(&input.address_country)?;
        let mut model = self.get(id).await?.into_active_model();

        if let Some(external_id) = input.external_id {
            require(&external_id, "external_id")?;
            model.external_id = Set(external_id);
        }
        if let Some(name) = input.name {
            require(&name, "name")?;
            model.name = Set(name);
        }
        if input.email.is_some() {
            model.email = Set(input.email);
        }
        if input.address_line1.is_some() {
            model.address_line1 = Set(input.address_line1);
        }
        if input.address_line2.is_some() {
            model.address_line2 = Set(input.address_line2);
        }
        if input.address_city.is_some() {
            model.address_city = Set(input.address_city);
        }
        if input.address_state.is_some() {
            model.address_state = Set(input.address_state);
        }
        if input.address_postal_code.is_some() {
            model.address_postal_code = Set(input.address_postal_code);
        }
        if input.address_country.is_some() {
            model.address_country = Set(input.address_country.map(|c| c.to_ascii_uppercase()));
        }
        if input.metadata.is_some() {
            model.metadata = Set(input.metadata);
        }
        model.updated_at = Set(now());
        model.updated_by = Set(self.scope.actor());

        Ok(model.update(self.db).await?)
    }

    pub async fn delete(&self, id: &str) -> RepositoryResult<()> {
        soft_delete::<customer::Entity, _>(self.db, self.scope, "customer", id).await
    }
}
