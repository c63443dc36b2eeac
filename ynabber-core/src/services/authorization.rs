//! Authorization manager - turns "no usable consent" into a requisition
//!
//! Lifecycle for one bank id:
//! 1. Load the stored requisition. `LN` (authorized) is returned as is.
//! 2. Anything else (absent, unparseable, expired, pending, unknown) creates a
//!    fresh requisition and notifies the hook with its link.
//! 3. Poll the aggregator until the user approves or the tries run out.
//! 4. Persist whatever came out of polling (best effort) and return it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tracing::Instrument;

use crate::config::DEFAULT_REDIRECT;
use crate::domain::result::{Error, Result};
use crate::domain::{ConsentState, NewRequisition, Requisition};
use crate::ports::{ConsentStore, LoadOutcome, RequisitionClient, RequisitionHook, Sleeper, TokioSleeper};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_MAX_POLLS: u32 = 5;

pub struct AuthorizationManager {
    client: Arc<dyn RequisitionClient>,
    store: Arc<dyn ConsentStore>,
    hook: Option<Arc<dyn RequisitionHook>>,
    sleeper: Arc<dyn Sleeper>,
    default_bank_id: String,
    redirect: String,
    poll_interval: Duration,
    max_polls: u32,
    /// One lock per storage key; held across load, create, poll and save
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl AuthorizationManager {
    pub fn new(
        client: Arc<dyn RequisitionClient>,
        store: Arc<dyn ConsentStore>,
        default_bank_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            store,
            hook: None,
            sleeper: Arc::new(TokioSleeper),
            default_bank_id: default_bank_id.into(),
            redirect: DEFAULT_REDIRECT.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_polls: DEFAULT_MAX_POLLS,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_hook(mut self, hook: Arc<dyn RequisitionHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_redirect(mut self, redirect: impl Into<String>) -> Self {
        self.redirect = redirect.into();
        self
    }

    pub fn with_polling(mut self, interval: Duration, max_polls: u32) -> Self {
        self.poll_interval = interval;
        self.max_polls = max_polls;
        self
    }

    /// Explicit bank id, or the configured default when empty
    pub fn resolve_bank_id<'a>(&'a self, bank_id: &'a str) -> Result<&'a str> {
        let resolved = if bank_id.is_empty() {
            self.default_bank_id.as_str()
        } else {
            bank_id
        };
        if resolved.is_empty() {
            return Err(Error::config("no bank id given and no default bank id configured"));
        }
        Ok(resolved)
    }

    /// Return a requisition for `bank_id`, creating and polling a new one
    /// when the stored record is missing or unusable.
    ///
    /// The result may still be unauthorized if the user did not approve in
    /// time; see [`AuthorizationManager::obtain_authorized`].
    pub async fn obtain(&self, bank_id: &str) -> Result<Requisition> {
        let bank_id = self.resolve_bank_id(bank_id)?;
        let key = self.store.key_for(bank_id);
        let span = tracing::info_span!("requisition", bank_id, key = %key);

        async {
            let lock = self.lock_for(&key);
            let _guard = lock.lock().await;

            match self.store.load(bank_id).await? {
                LoadOutcome::Absent => {
                    tracing::info!("requisition is not found");
                }
                LoadOutcome::Corrupt(reason) => {
                    tracing::warn!(%reason, "failed to parse requisition file");
                }
                LoadOutcome::Found(requisition) => match requisition.state() {
                    ConsentState::Authorized => return Ok(requisition),
                    ConsentState::Expired => tracing::info!("requisition is expired"),
                    state => tracing::info!(
                        status = %requisition.status,
                        ?state,
                        "unusable requisition status"
                    ),
                },
            }

            self.create(bank_id).await
        }
        .instrument(span)
        .await
    }

    /// Like [`AuthorizationManager::obtain`] but anything short of authorized
    /// is an error carrying the status and consent link.
    pub async fn obtain_authorized(&self, bank_id: &str) -> Result<Requisition> {
        let requisition = self.obtain(bank_id).await?;
        if requisition.is_authorized() {
            return Ok(requisition);
        }
        Err(Error::ConsentPending {
            bank_id: self.resolve_bank_id(bank_id)?.to_string(),
            status: requisition.status.to_string(),
            link: requisition.link,
        })
    }

    async fn create(&self, bank_id: &str) -> Result<Requisition> {
        let request = NewRequisition::new(bank_id, &self.redirect);
        let mut requisition = self
            .client
            .create_requisition(&request)
            .await
            .map_err(|e| Error::upstream(format!("CreateRequisition: {}", e)))?;

        self.notify(&requisition).await;
        tracing::info!(link = %requisition.link, "initiate requisition by going to the link");

        let mut polls = 0;
        while !requisition.is_authorized() && polls < self.max_polls {
            if polls > 0 {
                self.sleeper.sleep(self.poll_interval).await;
            }
            requisition = self
                .client
                .get_requisition(&requisition.id)
                .await
                .map_err(|e| Error::upstream(format!("GetRequisition: {}", e)))?;
            polls += 1;
            tracing::debug!(poll = polls, status = %requisition.status, "polled requisition");

            if requisition.is_authorized() {
                self.notify(&requisition).await;
            }
        }

        if !requisition.is_authorized() {
            tracing::warn!(
                status = %requisition.status,
                polls,
                "requisition still not authorized after polling"
            );
        }

        if let Err(e) = self.store.save(bank_id, &requisition).await {
            tracing::error!(error = %e, "failed to write requisition to store");
        }

        Ok(requisition)
    }

    async fn notify(&self, requisition: &Requisition) {
        if let Some(hook) = &self.hook {
            hook.notify(requisition).await;
        }
    }

    fn lock_for(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(key.to_string()).or_default().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryConsentStore;
    use crate::domain::RequisitionStatus;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    fn requisition(id: &str, status: RequisitionStatus) -> Requisition {
        Requisition {
            id: id.to_string(),
            created: None,
            redirect: DEFAULT_REDIRECT.to_string(),
            status,
            institution_id: "SANDBOXFINANCE_SFIN0000".to_string(),
            agreement: None,
            reference: "1700000000000".to_string(),
            accounts: vec!["acc-1".to_string()],
            link: format!("https://ob.example/start/{}", id),
        }
    }

    /// Scripted aggregator: create returns `CR`, each poll pops the next status
    struct ScriptedClient {
        polls: Mutex<VecDeque<RequisitionStatus>>,
        created: Mutex<Vec<NewRequisition>>,
        get_calls: AtomicUsize,
    }

    impl ScriptedClient {
        fn new(polls: Vec<RequisitionStatus>) -> Self {
            Self {
                polls: Mutex::new(polls.into()),
                created: Mutex::new(Vec::new()),
                get_calls: AtomicUsize::new(0),
            }
        }

        fn create_calls(&self) -> usize {
            self.created.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl RequisitionClient for ScriptedClient {
        async fn create_requisition(&self, request: &NewRequisition) -> Result<Requisition> {
            self.created.lock().unwrap().push(request.clone());
            Ok(requisition("new-req", RequisitionStatus::Created))
        }

        async fn get_requisition(&self, id: &str) -> Result<Requisition> {
            self.get_calls.fetch_add(1, Ordering::SeqCst);
            let status = self
                .polls
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(RequisitionStatus::Created);
            Ok(requisition(id, status))
        }
    }

    /// Fails every call; proves the fast path never touches the network
    struct TrapClient;

    #[async_trait]
    impl RequisitionClient for TrapClient {
        async fn create_requisition(&self, _: &NewRequisition) -> Result<Requisition> {
            Err(Error::upstream("create_requisition must not be called"))
        }

        async fn get_requisition(&self, _: &str) -> Result<Requisition> {
            Err(Error::upstream("get_requisition must not be called"))
        }
    }

    #[derive(Default)]
    struct RecordingSleeper {
        sleeps: Mutex<Vec<Duration>>,
    }

    impl RecordingSleeper {
        fn count(&self) -> usize {
            self.sleeps.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.sleeps.lock().unwrap().push(duration);
        }
    }

    #[derive(Default)]
    struct RecordingHook {
        calls: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl RequisitionHook for RecordingHook {
        async fn notify(&self, requisition: &Requisition) {
            self.calls
                .lock()
                .unwrap()
                .push((requisition.status.code().to_string(), requisition.link.clone()));
        }
    }

    /// Store whose writes always fail
    struct ReadOnlyStore(MemoryConsentStore);

    #[async_trait]
    impl ConsentStore for ReadOnlyStore {
        fn key_for(&self, bank_id: &str) -> String {
            self.0.key_for(bank_id)
        }

        async fn load(&self, bank_id: &str) -> Result<LoadOutcome> {
            self.0.load(bank_id).await
        }

        async fn save(&self, _: &str, _: &Requisition) -> Result<()> {
            Err(Error::Io(std::io::Error::other("disk full")))
        }
    }

    /// Store whose reads fail with something other than "not found"
    struct UnreadableStore;

    #[async_trait]
    impl ConsentStore for UnreadableStore {
        fn key_for(&self, bank_id: &str) -> String {
            bank_id.to_string()
        }

        async fn load(&self, _: &str) -> Result<LoadOutcome> {
            Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "permission denied",
            )))
        }

        async fn save(&self, _: &str, _: &Requisition) -> Result<()> {
            panic!("save must not be reached after a failed load");
        }
    }

    /// Requisition ids carry the bank; only bank `B` ever gets approved
    struct PerBankClient;

    #[async_trait]
    impl RequisitionClient for PerBankClient {
        async fn create_requisition(&self, request: &NewRequisition) -> Result<Requisition> {
            Ok(requisition(
                &format!("req-{}", request.institution_id),
                RequisitionStatus::Created,
            ))
        }

        async fn get_requisition(&self, id: &str) -> Result<Requisition> {
            let status = if id == "req-B" {
                RequisitionStatus::Linked
            } else {
                RequisitionStatus::Created
            };
            Ok(requisition(id, status))
        }
    }

    /// Signals `entered` and then waits for `release` on every sleep
    #[derive(Default)]
    struct GateSleeper {
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl Sleeper for GateSleeper {
        async fn sleep(&self, _: Duration) {
            self.entered.notify_one();
            self.release.notified().await;
        }
    }

    fn manager(
        client: Arc<dyn RequisitionClient>,
        store: Arc<dyn ConsentStore>,
        sleeper: Arc<RecordingSleeper>,
    ) -> AuthorizationManager {
        AuthorizationManager::new(client, store, "DEFAULT_BANK").with_sleeper(sleeper)
    }

    #[tokio::test]
    async fn test_authorized_record_takes_fast_path() {
        let store = Arc::new(MemoryConsentStore::new());
        let stored = requisition("old", RequisitionStatus::Linked);
        store.save("BANK", &stored).await.unwrap();
        let sleeper = Arc::new(RecordingSleeper::default());

        let auth = manager(Arc::new(TrapClient), store, sleeper.clone());
        let got = auth.obtain("BANK").await.unwrap();

        assert_eq!(got, stored);
        assert_eq!(sleeper.count(), 0);
    }

    #[tokio::test]
    async fn test_absent_record_creates_and_polls_until_authorized() {
        let store = Arc::new(MemoryConsentStore::new());
        let client = Arc::new(ScriptedClient::new(vec![
            RequisitionStatus::Created,
            RequisitionStatus::GivingConsent,
            RequisitionStatus::Linked,
        ]));
        let sleeper = Arc::new(RecordingSleeper::default());

        let auth = manager(client.clone(), store.clone(), sleeper.clone());
        let got = auth.obtain("BANK").await.unwrap();

        assert!(got.is_authorized());
        assert_eq!(client.create_calls(), 1);
        assert_eq!(client.get_calls.load(Ordering::SeqCst), 3);
        assert_eq!(sleeper.count(), 2);
        assert_eq!(store.load("BANK").await.unwrap(), LoadOutcome::Found(got));
    }

    #[tokio::test]
    async fn test_authorized_on_first_poll_never_sleeps() {
        let client = Arc::new(ScriptedClient::new(vec![RequisitionStatus::Linked]));
        let sleeper = Arc::new(RecordingSleeper::default());

        let auth = manager(client.clone(), Arc::new(MemoryConsentStore::new()), sleeper.clone());
        auth.obtain("BANK").await.unwrap();

        assert_eq!(client.get_calls.load(Ordering::SeqCst), 1);
        assert_eq!(sleeper.count(), 0);
    }

    #[tokio::test]
    async fn test_poll_exhaustion_returns_and_persists_pending() {
        let store = Arc::new(MemoryConsentStore::new());
        let client = Arc::new(ScriptedClient::new(vec![]));
        let sleeper = Arc::new(RecordingSleeper::default());

        let auth = manager(client.clone(), store.clone(), sleeper.clone());
        let got = auth.obtain("BANK").await.unwrap();

        assert_eq!(got.state(), ConsentState::PendingConsent);
        assert_eq!(client.get_calls.load(Ordering::SeqCst), DEFAULT_MAX_POLLS as usize);
        assert_eq!(sleeper.count(), DEFAULT_MAX_POLLS as usize - 1);
        assert!(sleeper
            .sleeps
            .lock()
            .unwrap()
            .iter()
            .all(|d| *d == DEFAULT_POLL_INTERVAL));
        assert_eq!(store.load("BANK").await.unwrap(), LoadOutcome::Found(got));
    }

    #[tokio::test]
    async fn test_unusable_records_are_replaced() {
        for stored in [
            Some(requisition("old", RequisitionStatus::Expired)),
            Some(requisition("old", RequisitionStatus::Other("??".to_string()))),
            Some(requisition("old", RequisitionStatus::Rejected)),
            Some(requisition("old", RequisitionStatus::Created)),
            None,
        ] {
            let store = Arc::new(MemoryConsentStore::new());
            match &stored {
                Some(req) => store.save("BANK", req).await.unwrap(),
                None => store.put_raw("BANK", "{ definitely not json"),
            }
            let client = Arc::new(ScriptedClient::new(vec![RequisitionStatus::Linked]));

            let auth = manager(client.clone(), store.clone(), Arc::new(RecordingSleeper::default()));
            let got = auth.obtain("BANK").await.unwrap();

            assert_eq!(client.create_calls(), 1, "stored: {:?}", stored);
            assert_eq!(got.id, "new-req");
            assert_eq!(store.load("BANK").await.unwrap(), LoadOutcome::Found(got));
        }
    }

    #[tokio::test]
    async fn test_creation_uses_resolved_bank_and_redirect() {
        let client = Arc::new(ScriptedClient::new(vec![RequisitionStatus::Linked]));
        let auth = manager(
            client.clone(),
            Arc::new(MemoryConsentStore::new()),
            Arc::new(RecordingSleeper::default()),
        )
        .with_redirect("https://example.com/done");

        auth.obtain("").await.unwrap();

        let created = client.created.lock().unwrap();
        assert_eq!(created[0].institution_id, "DEFAULT_BANK");
        assert_eq!(created[0].redirect, "https://example.com/done");
        assert!(!created[0].reference.is_empty());
    }

    #[tokio::test]
    async fn test_missing_bank_id_is_config_error() {
        let auth = AuthorizationManager::new(
            Arc::new(TrapClient),
            Arc::new(MemoryConsentStore::new()),
            "",
        );
        assert!(matches!(auth.obtain("").await, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_hook_sees_link_and_authorization() {
        let hook = Arc::new(RecordingHook::default());
        let client = Arc::new(ScriptedClient::new(vec![
            RequisitionStatus::Created,
            RequisitionStatus::Linked,
        ]));
        let auth = manager(
            client,
            Arc::new(MemoryConsentStore::new()),
            Arc::new(RecordingSleeper::default()),
        )
        .with_hook(hook.clone());

        auth.obtain("BANK").await.unwrap();

        let calls = hook.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, "CR");
        assert_eq!(calls[0].1, "https://ob.example/start/new-req");
        assert_eq!(calls[1].0, "LN");
    }

    #[tokio::test]
    async fn test_save_failure_is_not_fatal() {
        let client = Arc::new(ScriptedClient::new(vec![RequisitionStatus::Linked]));
        let store = Arc::new(ReadOnlyStore(MemoryConsentStore::new()));

        let auth = manager(client, store, Arc::new(RecordingSleeper::default()));
        let got = auth.obtain("BANK").await.unwrap();
        assert!(got.is_authorized());
    }

    #[tokio::test]
    async fn test_obtain_authorized_rejects_pending() {
        let client = Arc::new(ScriptedClient::new(vec![]));
        let auth = manager(
            client,
            Arc::new(MemoryConsentStore::new()),
            Arc::new(RecordingSleeper::default()),
        )
        .with_polling(Duration::from_secs(1), 2);

        match auth.obtain_authorized("BANK").await {
            Err(Error::ConsentPending { bank_id, status, link }) => {
                assert_eq!(bank_id, "BANK");
                assert_eq!(status, "CR");
                assert_eq!(link, "https://ob.example/start/new-req");
            }
            other => panic!("expected ConsentPending, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_concurrent_obtains_for_same_key_create_once() {
        let store = Arc::new(MemoryConsentStore::new());
        let client = Arc::new(ScriptedClient::new(vec![RequisitionStatus::Linked]));
        let auth = Arc::new(manager(
            client.clone(),
            store,
            Arc::new(RecordingSleeper::default()),
        ));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let auth = Arc::clone(&auth);
                tokio::spawn(async move { auth.obtain("BANK").await })
            })
            .collect();
        for handle in handles {
            assert!(handle.await.unwrap().unwrap().is_authorized());
        }

        // The first caller created and stored; the rest hit the fast path
        assert_eq!(client.create_calls(), 1);
    }

    #[tokio::test]
    async fn test_unreadable_store_is_fatal() {
        let sleeper = Arc::new(RecordingSleeper::default());
        let auth = manager(Arc::new(TrapClient), Arc::new(UnreadableStore), sleeper.clone());

        match auth.obtain("BANK").await {
            Err(Error::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::PermissionDenied),
            other => panic!("expected the read error, got {:?}", other),
        }
        assert_eq!(sleeper.count(), 0);
    }

    #[tokio::test]
    async fn test_polling_bank_does_not_block_other_banks() {
        let sleeper = Arc::new(GateSleeper::default());
        let auth = Arc::new(
            AuthorizationManager::new(
                Arc::new(PerBankClient),
                Arc::new(MemoryConsentStore::new()),
                "A",
            )
            .with_sleeper(sleeper.clone())
            .with_polling(Duration::from_secs(60), 2),
        );

        let slow = tokio::spawn({
            let auth = Arc::clone(&auth);
            async move { auth.obtain("A").await }
        });
        // Bank A is now parked between polls while holding its own lock
        tokio::time::timeout(Duration::from_secs(5), sleeper.entered.notified())
            .await
            .unwrap();

        let other = tokio::time::timeout(Duration::from_secs(5), auth.obtain("B"))
            .await
            .expect("bank B must not wait for bank A")
            .unwrap();
        assert!(other.is_authorized());
        assert!(!slow.is_finished());

        sleeper.release.notify_one();
        let slow = slow.await.unwrap().unwrap();
        assert_eq!(slow.id, "req-A");
        assert_eq!(slow.state(), ConsentState::PendingConsent);
    }
}
