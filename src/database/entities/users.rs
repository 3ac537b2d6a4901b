use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub platform_user_id: String,
    pub platform: String,
    pub email: String,
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Default for Model {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: 0, // Auto-assigned by database
            platform_user_id: String::new(),
            platform: String::new(),
            email: String::new(),
            display_name: None,
            created_at: now,
            updated_at: now,
            last_login: None,
        }
    }
}

impl Model {
    pub fn new(
        platform: impl Into<String>,
        platform_user_id: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            platform: platform.into(),
            platform_user_id: platform_user_id.into(),
            email: email.into(),
            ..Default::default()
        }
    }

    pub fn with_display_name(mut self, display_name: Option<String>) -> Self {
        self.display_name = display_name;
        self
    }

    pub fn with_last_login(mut self, last_login: DateTime<Utc>) -> Self {
        self.last_login = Some(last_login);
        self
    }
}
