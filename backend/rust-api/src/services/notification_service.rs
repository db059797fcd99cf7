use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId};
use mongodb::Database;

use crate::middlewares::auth::Principal;
use crate::models::notification::{Notification, NotificationKind, NotificationView};

pub struct NotificationService {
    mongo: Database,
}

impl NotificationService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    fn notifications(&self) -> mongodb::Collection<Notification> {
        self.mongo.collection("notifications")
    }

    pub async fn notify(
        &self,
        recipient_id: ObjectId,
        title: &str,
        message: &str,
        kind: NotificationKind,
    ) -> Result<()> {
        let notification = Notification {
            id: None,
            recipient_id,
            title: title.to_string(),
            message: message.to_string(),
            kind,
            is_read: false,
            created_at: Utc::now(),
        };

        self.notifications()
            .insert_one(&notification)
            .await
            .context("Failed to insert notification")?;

        Ok(())
    }

    /// Newest first, capped; dashboards poll this
    pub async fn list_for(&self, principal: &Principal) -> Result<Vec<NotificationView>> {
        let cursor = self
            .notifications()
            .find(doc! { "recipient_id": principal.id })
            .sort(doc! { "created_at": -1 })
            .limit(100)
            .await
            .context("Failed to query notifications")?;

        let notifications: Vec<Notification> = cursor
            .try_collect()
            .await
            .context("Failed to collect notifications")?;

        Ok(notifications
            .into_iter()
            .map(NotificationView::from)
            .collect())
    }

    /// Recipients may only mark their own rows
    pub async fn mark_read(&self, principal: &Principal, notification_id: &ObjectId) -> Result<()> {
        let update_result = self
            .notifications()
            .update_one(
                doc! { "_id": notification_id, "recipient_id": principal.id },
                doc! { "$set": { "is_read": true } },
            )
            .await
            .context("Failed to mark notification read")?;

        if update_result.matched_count == 0 {
            return Err(anyhow!("Notification not found"));
        }

        Ok(())
    }
}
