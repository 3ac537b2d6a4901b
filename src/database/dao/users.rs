use crate::database::entities::{UserRecord, users};
use crate::database::{DatabaseError, DatabaseResult};
use sea_orm::{ActiveValue, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use sea_orm_migration::sea_query::OnConflict;

/// Users DAO for database operations
#[derive(Clone)]
pub struct UsersDao {
    db: DatabaseConnection,
}

impl UsersDao {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create or update user using native upsert keyed on
    /// (platform, platform_user_id)
    pub async fn upsert(&self, user: &UserRecord) -> DatabaseResult<i32> {
        let active_model = users::ActiveModel {
            id: ActiveValue::NotSet, // Let database auto-assign ID
            platform_user_id: Set(user.platform_user_id.clone()),
            platform: Set(user.platform.clone()),
            email: Set(user.email.clone()),
            display_name: Set(user.display_name.clone()),
            created_at: Set(user.created_at),
            updated_at: Set(user.updated_at),
            last_login: Set(user.last_login),
        };

        let on_conflict =
            OnConflict::columns([users::Column::Platform, users::Column::PlatformUserId])
                .update_columns([
                    users::Column::Email,
                    users::Column::DisplayName,
                    users::Column::UpdatedAt,
                    users::Column::LastLogin,
                ])
                .to_owned();

        users::Entity::insert(active_model)
            .on_conflict(on_conflict)
            .exec(&self.db)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))?;

        // SQLite does not refresh last_insert_rowid on a conflict-update, so
        // the id reported by the insert cannot be trusted; resolve it by the
        // unique key instead
        let stored = self
            .find_by_platform(&user.platform, &user.platform_user_id)
            .await?
            .ok_or(DatabaseError::NotFound)?;

        Ok(stored.id)
    }

    /// Find user by platform and platform user ID
    pub async fn find_by_platform(
        &self,
        platform: &str,
        platform_user_id: &str,
    ) -> DatabaseResult<Option<UserRecord>> {
        let user = users::Entity::find()
            .filter(users::Column::Platform.eq(platform))
            .filter(users::Column::PlatformUserId.eq(platform_user_id))
            .one(&self.db)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))?;

        Ok(user)
    }

    /// Find user by ID
    pub async fn find_by_id(&self, user_id: i32) -> DatabaseResult<Option<UserRecord>> {
        let user = users::Entity::find_by_id(user_id)
            .one(&self.db)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))?;

        Ok(user)
    }
}
