//! Daily delivery scheduler.
//!
//! A long-lived worker that waits for the configured wall-clock instant,
//! then fans one `daily` message per subscriber onto the bus at every
//! interval tick. Cancellation unwinds promptly from either state.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, TimeZone};
use data::Data;
use messaging::Publisher;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time;
use tracing::{error, info};

use crate::config::DeliveryConfig;

/// Deadline for the membership read backing one fan-out.
const CTX_TIMEOUT: Duration = Duration::from_secs(3);

/// Compute the first firing instant: the least `T + k * interval` strictly
/// after `now`, where `T` is today's configured delivery time.
pub fn first_firing<Tz: TimeZone>(config: &DeliveryConfig, now: DateTime<Tz>) -> DateTime<Tz> {
    let interval =
        chrono::Duration::from_std(config.interval).expect("delivery interval fits chrono range");
    let todays_delivery = now
        .date_naive()
        .and_hms_opt(config.hour, config.minute, config.second)
        .expect("delivery time components are validated at startup");

    let mut firing = match now.timezone().from_local_datetime(&todays_delivery) {
        chrono::LocalResult::Single(instant) => instant,
        // DST transitions: take the earliest mapping, or fall back to now
        // and let the advance loop find the next valid firing.
        chrono::LocalResult::Ambiguous(earliest, _) => earliest,
        chrono::LocalResult::None => now.clone(),
    };
    while firing <= now {
        firing = firing + interval;
    }
    firing
}

/// The scheduler worker owned by the user-handling service.
pub struct DailyScheduler<D, P> {
    data: Arc<D>,
    publisher: Arc<P>,
    config: DeliveryConfig,
}

impl<D, P> DailyScheduler<D, P>
where
    D: Data + 'static,
    P: Publisher + 'static,
{
    pub fn new(data: Arc<D>, publisher: Arc<P>, config: DeliveryConfig) -> Self {
        Self {
            data,
            publisher,
            config,
        }
    }

    /// Run until cancelled: wait for the first firing instant, then fan out
    /// on every interval tick.
    pub async fn run(&self, mut shutdown_rx: watch::Receiver<bool>) {
        let now = Local::now();
        let firing = first_firing(&self.config, now);
        let delay = (firing - now).to_std().unwrap_or(Duration::ZERO);
        info!(
            "Daily delivery scheduled for {}, interval {:?}",
            firing.format("%Y-%m-%d %H:%M:%S"),
            self.config.interval
        );

        let deadline = time::Instant::now() + delay;
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Daily scheduler cancelled while waiting");
                        return;
                    }
                }
                _ = time::sleep_until(deadline) => break,
            }
        }

        // The first tick completes immediately, at the firing instant.
        let mut ticker = time::interval(self.config.interval);
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Daily scheduler stopped");
                        return;
                    }
                }
                _ = ticker.tick() => self.fanout_daily().await,
            }
        }
    }

    /// Publish one daily message per subscriber, concurrently. Individual
    /// publish failures are logged; the fan-out itself never aborts.
    pub async fn fanout_daily(&self) {
        info!("Starting to send daily messages.");

        let users = match time::timeout(CTX_TIMEOUT, self.data.list_users()).await {
            Ok(Ok(users)) => users,
            Ok(Err(e)) => {
                error!("An error occurred while executing database operation: {}", e);
                return;
            }
            Err(_) => {
                error!("Timed out while listing users for daily delivery");
                return;
            }
        };

        let mut publishes = JoinSet::new();
        for user in users {
            let publisher = self.publisher.clone();
            publishes.spawn(async move {
                if let Err(e) = publisher.publish_daily(&user.email, &user.nickname).await {
                    error!(
                        nickname = %user.nickname,
                        "An error occurred while sending message to MB: {}", e
                    );
                }
            });
        }
        while publishes.join_next().await.is_some() {}

        info!("Daily messages sent.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use data::{DataResult, Method, Operation, User};
    use messaging::BusError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn config(hour: u32, minute: u32, second: u32, interval: Duration) -> DeliveryConfig {
        DeliveryConfig {
            hour,
            minute,
            second,
            interval,
        }
    }

    #[test]
    fn test_first_firing_later_today() {
        let now = Utc.with_ymd_and_hms(2026, 8, 2, 11, 0, 0).unwrap();
        let firing = first_firing(&config(12, 0, 0, Duration::from_secs(86400)), now);
        assert_eq!(firing, Utc.with_ymd_and_hms(2026, 8, 2, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_first_firing_already_past_advances_a_day() {
        let now = Utc.with_ymd_and_hms(2026, 8, 2, 13, 0, 0).unwrap();
        let firing = first_firing(&config(12, 0, 0, Duration::from_secs(86400)), now);
        assert_eq!(firing, Utc.with_ymd_and_hms(2026, 8, 3, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_first_firing_is_strictly_in_the_future() {
        let now = Utc.with_ymd_and_hms(2026, 8, 2, 12, 0, 0).unwrap();
        let firing = first_firing(&config(12, 0, 0, Duration::from_secs(86400)), now);
        assert_eq!(firing, Utc.with_ymd_and_hms(2026, 8, 3, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_first_firing_with_sub_day_interval() {
        let now = Utc.with_ymd_and_hms(2026, 8, 2, 17, 30, 0).unwrap();
        let firing = first_firing(&config(12, 0, 0, Duration::from_secs(3600)), now);
        assert_eq!(firing, Utc.with_ymd_and_hms(2026, 8, 2, 18, 0, 0).unwrap());
    }

    /// Membership-only Data double for fan-out tests.
    struct MockMembership {
        users: Mutex<Vec<User>>,
    }

    impl MockMembership {
        fn new(users: Vec<User>) -> Self {
            Self {
                users: Mutex::new(users),
            }
        }
    }

    #[async_trait]
    impl Data for MockMembership {
        async fn get_operation(&self, _key: &str) -> DataResult<Option<Operation>> {
            Ok(None)
        }

        async fn set_operation(&self, _user: &User, _method: Method) -> DataResult<String> {
            Ok(String::new())
        }

        async fn delete_operation(&self, _key: &str) -> DataResult<()> {
            Ok(())
        }

        async fn check_nickname(&self, _nickname: &str) -> DataResult<bool> {
            Ok(false)
        }

        async fn email_by_nickname(&self, _nickname: &str) -> DataResult<String> {
            Ok(String::new())
        }

        async fn add_user(&self, _user: &User) -> DataResult<()> {
            Ok(())
        }

        async fn delete_user(&self, _user: &User) -> DataResult<()> {
            Ok(())
        }

        async fn list_users(&self) -> DataResult<Vec<User>> {
            Ok(self.users.lock().unwrap().clone())
        }
    }

    /// Publisher double that fails every fifth publish.
    #[derive(Default)]
    struct FlakyPublisher {
        attempts: AtomicUsize,
        delivered: AtomicUsize,
    }

    #[async_trait]
    impl Publisher for FlakyPublisher {
        async fn publish_auth(&self, _: &str, _: &str, _: &str) -> Result<(), BusError> {
            Ok(())
        }

        async fn publish_daily(&self, _email: &str, _nickname: &str) -> Result<(), BusError> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if attempt % 5 == 0 {
                return Err(BusError::PublishFailed("mock broker refused".into()));
            }
            self.delivered.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_fanout_attempts_every_subscriber_despite_failures() {
        let users: Vec<User> = (0..10)
            .map(|i| User::new(format!("melon{}", i), format!("melon{}@example.com", i)))
            .collect();
        let data = Arc::new(MockMembership::new(users));
        let publisher = Arc::new(FlakyPublisher::default());
        let scheduler = DailyScheduler::new(
            data,
            publisher.clone(),
            config(12, 0, 0, Duration::from_secs(86400)),
        );

        scheduler.fanout_daily().await;

        // Every subscriber was attempted; the two failures were only logged.
        assert_eq!(publisher.attempts.load(Ordering::SeqCst), 10);
        assert_eq!(publisher.delivered.load(Ordering::SeqCst), 8);
    }

    #[tokio::test]
    async fn test_scheduler_unwinds_on_cancel() {
        let data = Arc::new(MockMembership::new(vec![]));
        let publisher = Arc::new(FlakyPublisher::default());
        let scheduler = DailyScheduler::new(
            data,
            publisher,
            config(12, 0, 0, Duration::from_secs(86400)),
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        shutdown_tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(1), scheduler.run(shutdown_rx))
            .await
            .expect("scheduler should exit promptly on cancel");
    }
}
