use sea_orm::{
    ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use uuid::Uuid;

use crate::entity::environment::{self, Entity as EnvironmentEntity};
use crate::entity::variable::{self, Column as VariableColumn, Entity as VariableEntity};
use crate::error::AppResult;
use crate::models::{Environment, Variable};

/// Environments and their variables
pub struct EnvironmentRepository;

impl EnvironmentRepository {
    pub async fn find_by_id(db: &DatabaseConnection, id: Uuid) -> AppResult<Option<Environment>> {
        let model = EnvironmentEntity::find_by_id(id).one(db).await?;
        Ok(model.map(|m| m.into()))
    }

    /// Variables of an environment ordered by `display_order`
    pub async fn list_variables(db: &DatabaseConnection, env_id: Uuid) -> AppResult<Vec<Variable>> {
        let models = VariableEntity::find()
            .filter(VariableColumn::EnvId.eq(env_id))
            .order_by_asc(VariableColumn::DisplayOrder)
            .order_by_asc(VariableColumn::Id)
            .all(db)
            .await?;

        Ok(models.into_iter().map(|m| m.into()).collect())
    }

    pub fn tx(txn: &DatabaseTransaction) -> EnvironmentWriter<'_> {
        EnvironmentWriter { txn }
    }
}

pub struct EnvironmentWriter<'a> {
    txn: &'a DatabaseTransaction,
}

impl EnvironmentWriter<'_> {
    pub async fn insert(&self, env: &Environment) -> AppResult<()> {
        let model = environment::ActiveModel {
            id: Set(env.id),
            workspace_id: Set(env.workspace_id),
            name: Set(env.name.clone()),
            description: Set(env.description.clone()),
            created_at: Set(env.created_at),
        };

        EnvironmentEntity::insert(model)
            .exec_without_returning(self.txn)
            .await?;

        Ok(())
    }

    pub async fn insert_variable(&self, var: &Variable) -> AppResult<()> {
        VariableEntity::insert(to_active(var))
            .exec_without_returning(self.txn)
            .await?;

        Ok(())
    }

    pub async fn update_variable(&self, var: &Variable) -> AppResult<()> {
        VariableEntity::update_many()
            .set(to_active(var))
            .filter(VariableColumn::Id.eq(var.id))
            .exec(self.txn)
            .await?;

        Ok(())
    }
}

fn to_active(v: &Variable) -> variable::ActiveModel {
    variable::ActiveModel {
        id: Set(v.id),
        env_id: Set(v.env_id),
        key: Set(v.key.clone()),
        value: Set(v.value.clone()),
        enabled: Set(v.enabled),
        description: Set(v.description.clone()),
        display_order: Set(v.display_order),
    }
}

impl From<environment::Model> for Environment {
    fn from(m: environment::Model) -> Self {
        Self {
            id: m.id,
            workspace_id: m.workspace_id,
            name: m.name,
            description: m.description,
            created_at: m.created_at,
        }
    }
}

impl From<variable::Model> for Variable {
    fn from(m: variable::Model) -> Self {
        Self {
            id: m.id,
            env_id: m.env_id,
            key: m.key,
            value: m.value,
            enabled: m.enabled,
            description: m.description,
            display_order: m.display_order,
        }
    }
}
