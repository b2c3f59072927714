use chrono::Utc;
use loyalink_common::types::{Registration, TokenSnapshot, TokenUsage};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ActiveValue::Set, ColumnTrait, EntityTrait,
    QueryFilter, QueryOrder, TransactionTrait,
};

use crate::entities::{registration, token_usage};
use crate::error::{Result, StorageError};
use crate::store::RegistrationStore;

fn to_registration(m: registration::Model) -> Registration {
    Registration {
        id: m.id,
        token: m.token,
        used: m.used,
        created_at: m.created_at.with_timezone(&Utc),
    }
}

fn to_usage(m: token_usage::Model) -> TokenUsage {
    TokenUsage {
        id: m.id,
        token: m.token,
        username: m.username,
        phone: m.phone,
        used_at: m.used_at.with_timezone(&Utc),
    }
}

impl RegistrationStore {
    /// Inserts a fresh, unused registration for `token`.
    pub async fn create(&self, token: &str) -> Result<Registration> {
        let am = registration::ActiveModel {
            id: NotSet,
            token: Set(token.to_owned()),
            used: Set(false),
            created_at: Set(Utc::now().fixed_offset()),
        };
        let model = am
            .insert(self.db())
            .await
            .map_err(|e| StorageError::from_write(e, StorageError::DuplicateToken))?;
        Ok(to_registration(model))
    }

    pub async fn get_by_token(&self, token: &str) -> Result<Registration> {
        registration::Entity::find()
            .filter(registration::Column::Token.eq(token))
            .one(self.db())
            .await?
            .map(to_registration)
            .ok_or(StorageError::NotFound {
                entity: "registration",
            })
    }

    /// Consumes `token`: flips `used` and records who used it, all or nothing.
    ///
    /// Fails with `AlreadyUsed` if the token was consumed before, and with
    /// `NotFound` if it was never issued. Neither case writes anything.
    pub async fn mark_used(&self, token: &str, username: &str, phone: &str) -> Result<TokenUsage> {
        let txn = self.db().begin().await?;

        // Conditional update: of two concurrent consumers only one sees a changed row.
        let updated = registration::Entity::update_many()
            .col_expr(registration::Column::Used, Expr::value(true))
            .filter(registration::Column::Token.eq(token))
            .filter(registration::Column::Used.eq(false))
            .exec(&txn)
            .await?;

        if updated.rows_affected == 0 {
            let exists = registration::Entity::find()
                .filter(registration::Column::Token.eq(token))
                .one(&txn)
                .await?
                .is_some();
            txn.rollback().await?;
            return Err(if exists {
                StorageError::AlreadyUsed
            } else {
                StorageError::NotFound {
                    entity: "registration",
                }
            });
        }

        let usage = token_usage::ActiveModel {
            id: NotSet,
            token: Set(token.to_owned()),
            username: Set(username.to_owned()),
            phone: Set(phone.to_owned()),
            used_at: Set(Utc::now().fixed_offset()),
        };
        // Dropping `txn` on the error path rolls the flag update back.
        let usage = usage
            .insert(&txn)
            .await
            .map_err(|e| StorageError::from_write(e, StorageError::AlreadyUsed))?;

        txn.commit().await?;
        Ok(to_usage(usage))
    }

    pub async fn get_usage(&self, token: &str) -> Result<TokenUsage> {
        token_usage::Entity::find()
            .filter(token_usage::Column::Token.eq(token))
            .one(self.db())
            .await?
            .map(to_usage)
            .ok_or(StorageError::NotFound {
                entity: "token_usage",
            })
    }

    pub async fn list_used(&self) -> Result<Vec<Registration>> {
        self.list_by_state(true).await
    }

    pub async fn list_unused(&self) -> Result<Vec<Registration>> {
        self.list_by_state(false).await
    }

    async fn list_by_state(&self, used: bool) -> Result<Vec<Registration>> {
        let models = registration::Entity::find()
            .filter(registration::Column::Used.eq(used))
            .order_by_asc(registration::Column::Id)
            .all(self.db())
            .await?;
        Ok(models.into_iter().map(to_registration).collect())
    }

    /// Reads every registration in one query and splits it by state.
    pub async fn snapshot(&self) -> Result<TokenSnapshot> {
        let models = registration::Entity::find()
            .order_by_asc(registration::Column::Id)
            .all(self.db())
            .await?;
        let (used, unused) = models
            .into_iter()
            .map(to_registration)
            .partition(|r| r.used);
        Ok(TokenSnapshot { used, unused })
    }
}
