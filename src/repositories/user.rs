use sea_orm::{DatabaseConnection, EntityTrait, Set};
use uuid::Uuid;

use crate::entity::user::{self, Entity as UserEntity};
use crate::error::{AppError, AppResult};
use crate::ids;
use crate::models::{CreateUser, User};

/// User repository. Accounts are provisioned by the identity layer, so this
/// only covers lookups plus the insert used by provisioning tooling.
pub struct UserRepository;

impl UserRepository {
    /// Create a new user
    pub async fn create(db: &DatabaseConnection, input: &CreateUser) -> AppResult<User> {
        let user = User {
            id: ids::new_id(),
            email: input.email.clone(),
            name: input.name.clone(),
            created_at: ids::now_unix(),
        };

        let model = user::ActiveModel {
            id: Set(user.id),
            email: Set(user.email.clone()),
            name: Set(user.name.clone()),
            created_at: Set(user.created_at),
        };

        UserEntity::insert(model).exec_without_returning(db).await?;
        Ok(user)
    }

    pub async fn find_by_id(db: &DatabaseConnection, id: Uuid) -> AppResult<User> {
        let model = UserEntity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| AppError::NotFound("User".to_string()))?;

        Ok(model.into())
    }
}

impl From<user::Model> for User {
    fn from(m: user::Model) -> Self {
        Self {
            id: m.id,
            email: m.email,
            name: m.name,
            created_at: m.created_at,
        }
    }
}
