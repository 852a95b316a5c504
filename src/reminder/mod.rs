
use std::{sync::Arc, time::Duration};

use chrono_tz::Tz;
use futures::{StreamExt, stream};
use teloxide::types::ChatId;
use thiserror::Error;

use crate::{
    clock::{self, Clock},
    garden::{GardenService, GardenServiceError},
    messaging::{MessagingError, MessagingService},
    storage::{GardenStorage, StorageError, User},
};

#[derive(Debug, Error)]
pub enum ReminderError {
    #[error("Failed to access storage")]
    Storage(#[from] StorageError),
    #[error("Failed to compute tasks")]
    Garden(#[from] GardenServiceError),
    #[error("Failed to send message to Telegram")]
    Messaging(#[from] MessagingError),
}

type Result<T> = std::result::Result<T, ReminderError>;

/// Sends every user the care tasks due today, once per local day.
#[derive(Clone)]
pub struct TaskReminder {
    storage: Arc<dyn GardenStorage>,
    garden_service: Arc<dyn GardenService>,
    messaging_service: Arc<dyn MessagingService>,
    clock: Arc<dyn Clock>,
    default_timezone: Tz,
    // Local hour from which the reminder is sent.
    reminder_hour: u32,
    poll_interval: Duration,
    max_concurrency: usize,
}

impl TaskReminder {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        storage: Arc<dyn GardenStorage>,
        garden_service: Arc<dyn GardenService>,
        messaging_service: Arc<dyn MessagingService>,
        clock: Arc<dyn Clock>,
        default_timezone: Tz,
        reminder_hour: u32,
        poll_interval: Duration,
        max_concurrency: usize,
    ) -> Self {
        Self {
            storage,
            garden_service,
            messaging_service,
            clock,
            default_timezone,
            reminder_hour,
            poll_interval,
            max_concurrency,
        }
    }

    /// Runs reminder rounds forever. Only a failure to list users ends the loop.
    pub async fn run(&self) -> Result<()> {
        tracing::debug!("Starting task reminder");

        let mut interval = tokio::time::interval(self.poll_interval);

        loop {
            interval.tick().await;
            let users = self.storage.all_users().await?;
            self.remind_all(users).await;
        }
    }

    async fn remind_all(&self, users: Vec<User>) {
        let tasks = users.into_iter().map(|user| {
            let self_clone = self.clone();
            async move {
                let user_id = user.id;
                (user_id, self_clone.remind_user(user).await)
            }
        });

        let mut buffered_tasks = stream::iter(tasks).buffer_unordered(self.max_concurrency);

        while let Some((user_id, result)) = buffered_tasks.next().await {
            if let Err(e) = result {
                tracing::error!("Error reminding user {user_id}: {e:?}");
            }
        }
    }

    /// Sends today's tasks to one user. Returns whether a reminder was sent.
    async fn remind_user(&self, user: User) -> Result<bool> {
        let now = self.clock.now();
        let tz = user.tz().unwrap_or(self.default_timezone);
        let today = clock::local_date(now, tz);

        if clock::local_hour(now, tz) < self.reminder_hour {
            return Ok(false);
        }
        if user.last_reminded_on.is_some_and(|last| last >= today) {
            return Ok(false);
        }

        let tasks = self.garden_service.today_tasks(user.id, today).await?;
        if tasks.is_empty() {
            tracing::debug!("No tasks for user {} on {today}", user.id);
            return Ok(false);
        }

        // A failed send leaves the date untouched so the next round retries.
        let chat_id = ChatId::from(user.id);
        if let Err(e) = self.messaging_service.send_today_tasks_msg(chat_id, tasks).await {
            tracing::warn!("Failed to send reminder to user {}: {e}. Will be retried", user.id);
            return Ok(false);
        }

        self.storage.set_last_reminded_on(user.id, today).await?;
        tracing::debug!("Sent reminder to user {} for {today}", user.id);
        Ok(true)
    }
}
