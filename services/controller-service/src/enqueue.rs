use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::clients::{ClientError, RunStateStore, TaskQueue};
use crate::models::{Account, RunState, WorkItem};

/// Outcome of the phase-1 fan-out. Failed accounts are reported, not raised:
/// one bad account must not block the rest of the batch.
#[derive(Debug, Default)]
pub struct ReportEnqueueOutcome {
    pub enqueued: usize,
    pub failed: Vec<String>,
}

/// Target URL for one report task. `startdate` is present only when the
/// account has run before; its absence tells the handler to use the default
/// lookback window.
pub fn report_task_url(
    handler_base: &str,
    account: &Account,
    last_run: Option<NaiveDate>,
) -> String {
    let mut url = format!(
        "{handler_base}?cid={}&name={}",
        account.id,
        urlencoding::encode(&account.display_name)
    );
    if let Some(date) = last_run {
        url.push_str(&format!("&startdate={date}"));
    }
    url
}

/// Submits one report task per leaf account and records today as the
/// account's last run date on success.
pub async fn enqueue_reports(
    accounts: &BTreeSet<Account>,
    run_state: &mut RunState,
    today: NaiveDate,
    queue: &dyn TaskQueue,
    queue_name: &str,
    handler_base: &str,
    store: &dyn RunStateStore,
) -> ReportEnqueueOutcome {
    let mut outcome = ReportEnqueueOutcome::default();

    for account in accounts {
        let url = report_task_url(handler_base, account, run_state.get(&account.id).copied());
        let item = WorkItem {
            target_url: url.clone(),
        };
        if let Err(err) = queue.submit(queue_name, &item).await {
            tracing::error!(
                cid = %account.id,
                url = %url,
                queue = queue_name,
                error = %err,
                "failed to enqueue report task"
            );
            outcome.failed.push(account.id.clone());
            continue;
        }
        match store.record_run(&account.id, today).await {
            Ok(()) => {
                run_state.insert(account.id.clone(), today);
            }
            Err(err) => {
                // The task is already queued; the next run simply re-requests
                // a wider window for this account.
                tracing::error!(cid = %account.id, error = %err, "failed to persist last run date");
            }
        }
        outcome.enqueued += 1;
    }

    tracing::info!(
        enqueued = outcome.enqueued,
        failed = outcome.failed.len(),
        queue = queue_name,
        "report fan-out complete"
    );
    outcome
}

/// Submits one audit task per base URL. Unlike the report fan-out, the first
/// failure aborts the phase.
pub async fn enqueue_audits(
    base_urls: &[String],
    queue: &dyn TaskQueue,
    queue_name: &str,
    handler_base: &str,
) -> Result<usize, ClientError> {
    for url in base_urls {
        let item = WorkItem {
            target_url: format!("{handler_base}?url={}", urlencoding::encode(url)),
        };
        queue.submit(queue_name, &item).await?;
    }
    Ok(base_urls.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeQueue {
        submitted: Mutex<Vec<(String, String)>>,
        fail_when_url_contains: Option<&'static str>,
    }

    impl FakeQueue {
        fn urls(&self, queue: &str) -> Vec<String> {
            self.submitted
                .lock()
                .unwrap()
                .iter()
                .filter(|(name, _)| name == queue)
                .map(|(_, url)| url.clone())
                .collect()
        }
    }

    #[async_trait]
    impl TaskQueue for FakeQueue {
        async fn submit(&self, queue: &str, item: &WorkItem) -> Result<(), ClientError> {
            if let Some(marker) = self.fail_when_url_contains {
                if item.target_url.contains(marker) {
                    return Err(ClientError::Api("submit rejected".to_string()));
                }
            }
            self.submitted
                .lock()
                .unwrap()
                .push((queue.to_string(), item.target_url.clone()));
            Ok(())
        }

        async fn pending_count(&self, _queue: &str) -> Result<usize, ClientError> {
            Ok(self.submitted.lock().unwrap().len())
        }
    }

    #[derive(Default)]
    struct FakeRunStateStore {
        recorded: Mutex<Vec<(String, NaiveDate)>>,
        fail_for: Option<&'static str>,
    }

    #[async_trait]
    impl RunStateStore for FakeRunStateStore {
        async fn load(&self) -> Result<RunState, ClientError> {
            Ok(RunState::new())
        }

        async fn record_run(&self, account_id: &str, date: NaiveDate) -> Result<(), ClientError> {
            if self.fail_for == Some(account_id) {
                return Err(ClientError::Api("write rejected".to_string()));
            }
            self.recorded
                .lock()
                .unwrap()
                .push((account_id.to_string(), date));
            Ok(())
        }
    }

    fn leaf(id: &str, name: &str) -> Account {
        Account {
            id: id.to_string(),
            display_name: name.to_string(),
            is_manager: false,
        }
    }

    fn date(text: &str) -> NaiveDate {
        text.parse().unwrap()
    }

    #[test]
    fn startdate_omitted_without_prior_run() {
        let url = report_task_url("http://handler", &leaf("333", "Acme"), None);
        assert_eq!(url, "http://handler?cid=333&name=Acme");
        assert!(!url.contains("startdate"));
    }

    #[test]
    fn startdate_present_with_prior_run() {
        let url = report_task_url("http://handler", &leaf("444", "Beta"), Some(date("2024-01-01")));
        assert_eq!(url, "http://handler?cid=444&name=Beta&startdate=2024-01-01");
    }

    #[test]
    fn display_name_is_url_escaped() {
        let url = report_task_url("http://handler", &leaf("333", "Acme & Co"), None);
        assert_eq!(url, "http://handler?cid=333&name=Acme%20%26%20Co");
    }

    #[tokio::test]
    async fn records_run_date_per_enqueued_account() {
        let queue = FakeQueue::default();
        let store = FakeRunStateStore::default();
        let accounts: BTreeSet<Account> = [leaf("333", "Acme"), leaf("444", "Beta")].into();
        let mut run_state = RunState::from([("444".to_string(), date("2024-03-01"))]);
        let today = date("2024-03-15");

        let outcome = enqueue_reports(
            &accounts,
            &mut run_state,
            today,
            &queue,
            "ads-queue",
            "http://handler",
            &store,
        )
        .await;

        assert_eq!(outcome.enqueued, 2);
        assert!(outcome.failed.is_empty());
        assert_eq!(
            queue.urls("ads-queue"),
            vec![
                "http://handler?cid=333&name=Acme".to_string(),
                "http://handler?cid=444&name=Beta&startdate=2024-03-01".to_string(),
            ]
        );
        assert_eq!(run_state.get("333"), Some(&today));
        assert_eq!(run_state.get("444"), Some(&today));
        assert_eq!(store.recorded.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn one_failed_submission_does_not_block_the_batch() {
        let queue = FakeQueue {
            fail_when_url_contains: Some("cid=444"),
            ..FakeQueue::default()
        };
        let store = FakeRunStateStore::default();
        let accounts: BTreeSet<Account> =
            [leaf("333", "Acme"), leaf("444", "Beta"), leaf("555", "Gamma")].into();
        let mut run_state = RunState::new();
        let today = date("2024-03-15");

        let outcome = enqueue_reports(
            &accounts,
            &mut run_state,
            today,
            &queue,
            "ads-queue",
            "http://handler",
            &store,
        )
        .await;

        assert_eq!(outcome.enqueued, 2);
        assert_eq!(outcome.failed, vec!["444".to_string()]);
        assert_eq!(run_state.get("333"), Some(&today));
        assert_eq!(run_state.get("444"), None);
        assert_eq!(run_state.get("555"), Some(&today));
    }

    #[tokio::test]
    async fn run_state_write_failure_keeps_old_date() {
        let queue = FakeQueue::default();
        let store = FakeRunStateStore {
            fail_for: Some("333"),
            ..FakeRunStateStore::default()
        };
        let accounts: BTreeSet<Account> = [leaf("333", "Acme")].into();
        let mut run_state = RunState::new();

        let outcome = enqueue_reports(
            &accounts,
            &mut run_state,
            date("2024-03-15"),
            &queue,
            "ads-queue",
            "http://handler",
            &store,
        )
        .await;

        // Task still counts as enqueued, but no run date is recorded.
        assert_eq!(outcome.enqueued, 1);
        assert!(run_state.is_empty());
        assert!(store.recorded.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn audit_urls_are_escaped() {
        let queue = FakeQueue::default();
        let urls = vec!["https://example.com/landing?a=1".to_string()];
        let count = enqueue_audits(&urls, &queue, "lh-queue", "http://lh-handler")
            .await
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(
            queue.urls("lh-queue"),
            vec!["http://lh-handler?url=https%3A%2F%2Fexample.com%2Flanding%3Fa%3D1".to_string()]
        );
    }

    #[tokio::test]
    async fn audit_enqueue_aborts_on_first_failure() {
        let queue = FakeQueue {
            fail_when_url_contains: Some("second"),
            ..FakeQueue::default()
        };
        let urls = vec![
            "https://first.example".to_string(),
            "https://second.example".to_string(),
            "https://third.example".to_string(),
        ];
        let result = enqueue_audits(&urls, &queue, "lh-queue", "http://lh-handler").await;
        assert!(matches!(result, Err(ClientError::Api(_))));
        assert_eq!(queue.urls("lh-queue").len(), 1);
    }
}
