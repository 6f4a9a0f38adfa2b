use crate::Error;
use crate::account::Account;
use crate::library::{CryptoLibrary, LibraryVersion, Olm};
use crate::megolm::{InboundGroupSession, OutboundGroupSession};
use crate::pk::{PkDecryption, PkEncryption, PkSigning};
use crate::session::Session;
use crate::utility::Utility;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Readiness of an [`OlmDelegate`]. The only transition is
/// `Uninitialized -> Initialized`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DelegateState {
    Uninitialized,
    Initialized(LibraryVersion),
}

/// Gatekeeper between the application and a [`CryptoLibrary`].
///
/// Nothing can be constructed through the delegate until [`init`](Self::init)
/// has loaded the library and confirmed it reports a version. Every `create_*`
/// call returns a fresh object that the caller owns from then on.
pub struct OlmDelegate<L: CryptoLibrary = Olm> {
    library: Arc<L>,
    readiness: OnceCell<LibraryVersion>,
}

impl Default for OlmDelegate<Olm> {
    /// Binds to the process-wide [`Olm::shared`] library.
    fn default() -> Self {
        Self::new(Olm::shared())
    }
}

impl<L: CryptoLibrary> OlmDelegate<L> {
    pub fn new(library: Arc<L>) -> Self {
        Self {
            library,
            readiness: OnceCell::new(),
        }
    }

    /// Loads the library once.
    ///
    /// Calls made while a load is in flight wait for it instead of starting
    /// another one, and calls after a successful load return immediately. A
    /// failed load leaves the delegate uninitialized, so calling `init` again
    /// retries it.
    pub async fn init(&self) -> Result<(), Error> {
        self.readiness
            .get_or_try_init(|| self.load_library())
            .await
            .map(|_| ())
    }

    async fn load_library(&self) -> Result<LibraryVersion, Error> {
        if let Err(err) = self.library.load().await {
            warn!(error = %err, "crypto library failed to load");
            return Err(match err {
                Error::LibraryLoad(_) => err,
                other => Error::LibraryLoad(other.to_string()),
            });
        }

        match self.library.version() {
            Some(version) => {
                info!(%version, "crypto library ready");
                Ok(version)
            }
            None => {
                warn!("crypto library loaded but reports no version");
                Err(Error::LibraryLoad(
                    "the library did not report a version after loading".to_string(),
                ))
            }
        }
    }

    pub fn initialized(&self) -> bool {
        self.readiness.initialized()
    }

    pub fn state(&self) -> DelegateState {
        match self.readiness.get() {
            Some(version) => DelegateState::Initialized(*version),
            None => DelegateState::Uninitialized,
        }
    }

    /// The library this delegate builds objects from.
    pub fn library(&self) -> &Arc<L> {
        &self.library
    }

    fn ready(&self, object: &'static str) -> Result<&L, Error> {
        if !self.initialized() {
            return Err(Error::NotInitialized);
        }
        debug!(object, "creating protocol object");
        Ok(&*self.library)
    }

    pub fn create_account(&self) -> Result<Account, Error> {
        Ok(self.ready("account")?.account())
    }

    pub fn create_session(&self) -> Result<Session, Error> {
        Ok(self.ready("session")?.session())
    }

    pub fn create_inbound_group_session(&self) -> Result<InboundGroupSession, Error> {
        Ok(self.ready("inbound group session")?.inbound_group_session())
    }

    pub fn create_outbound_group_session(&self) -> Result<OutboundGroupSession, Error> {
        Ok(self.ready("outbound group session")?.outbound_group_session())
    }

    pub fn create_pk_encryption(&self) -> Result<PkEncryption, Error> {
        Ok(self.ready("pk encryption")?.pk_encryption())
    }

    pub fn create_pk_decryption(&self) -> Result<PkDecryption, Error> {
        Ok(self.ready("pk decryption")?.pk_decryption())
    }

    pub fn create_pk_signing(&self) -> Result<PkSigning, Error> {
        Ok(self.ready("pk signing")?.pk_signing())
    }

    pub fn create_olm_util(&self) -> Result<Utility, Error> {
        Ok(self.ready("utility")?.utility())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OlmConfig;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingLibrary {
        config: OlmConfig,
        loads: AtomicUsize,
        fail: AtomicBool,
        fail_with_other_error: AtomicBool,
        hide_version: AtomicBool,
        loaded: AtomicBool,
    }

    impl CountingLibrary {
        fn loads(&self) -> usize {
            self.loads.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl CryptoLibrary for CountingLibrary {
        async fn load(&self) -> Result<(), Error> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;

            if self.fail.load(Ordering::SeqCst) {
                return Err(Error::LibraryLoad("wasm fetch failed".to_string()));
            }
            if self.fail_with_other_error.load(Ordering::SeqCst) {
                return Err(Error::Random);
            }
            self.loaded.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn version(&self) -> Option<LibraryVersion> {
            if self.hide_version.load(Ordering::SeqCst) || !self.loaded.load(Ordering::SeqCst) {
                return None;
            }
            Some(LibraryVersion {
                major: 3,
                minor: 2,
                patch: 1,
            })
        }

        fn config(&self) -> &OlmConfig {
            &self.config
        }
    }

    fn all_factories<L: CryptoLibrary>(delegate: &OlmDelegate<L>) -> Vec<Result<(), Error>> {
        vec![
            delegate.create_account().map(|_| ()),
            delegate.create_session().map(|_| ()),
            delegate.create_inbound_group_session().map(|_| ()),
            delegate.create_outbound_group_session().map(|_| ()),
            delegate.create_pk_encryption().map(|_| ()),
            delegate.create_pk_decryption().map(|_| ()),
            delegate.create_pk_signing().map(|_| ()),
            delegate.create_olm_util().map(|_| ()),
        ]
    }

    #[tokio::test]
    async fn test_factories_are_gated_on_init() {
        let library = Arc::new(CountingLibrary::default());
        let delegate = OlmDelegate::new(Arc::clone(&library));

        for result in all_factories(&delegate) {
            assert_eq!(result, Err(Error::NotInitialized));
        }
        assert_eq!(library.loads(), 0);
        assert_eq!(delegate.state(), DelegateState::Uninitialized);

        delegate.init().await.unwrap();

        for result in all_factories(&delegate) {
            assert!(result.is_ok());
        }
        assert_eq!(
            delegate.state(),
            DelegateState::Initialized(LibraryVersion {
                major: 3,
                minor: 2,
                patch: 1
            })
        );
    }

    #[tokio::test]
    async fn test_sequential_init_loads_once() {
        let library = Arc::new(CountingLibrary::default());
        let delegate = OlmDelegate::new(Arc::clone(&library));

        for _ in 0..5 {
            delegate.init().await.unwrap();
        }

        assert_eq!(library.loads(), 1);
        assert!(delegate.initialized());
    }

    #[tokio::test]
    async fn test_concurrent_init_coalesces() {
        let library = Arc::new(CountingLibrary::default());
        let delegate = OlmDelegate::new(Arc::clone(&library));

        let (first, second) = tokio::join!(delegate.init(), delegate.init());

        assert!(first.is_ok());
        assert!(second.is_ok());
        assert_eq!(library.loads(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_init_across_tasks() {
        let library = Arc::new(CountingLibrary::default());
        let delegate = Arc::new(OlmDelegate::new(Arc::clone(&library)));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let delegate = Arc::clone(&delegate);
                tokio::spawn(async move { delegate.init().await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(library.loads(), 1);
    }

    #[tokio::test]
    async fn test_failed_load_can_be_retried() {
        let library = Arc::new(CountingLibrary::default());
        library.fail.store(true, Ordering::SeqCst);
        let delegate = OlmDelegate::new(Arc::clone(&library));

        let err = delegate.init().await.unwrap_err();
        assert_eq!(err, Error::LibraryLoad("wasm fetch failed".to_string()));
        assert!(!delegate.initialized());
        assert_eq!(delegate.create_account().err(), Some(Error::NotInitialized));

        library.fail.store(false, Ordering::SeqCst);
        delegate.init().await.unwrap();

        assert_eq!(library.loads(), 2);
        assert!(delegate.create_account().is_ok());
    }

    #[tokio::test]
    async fn test_other_load_errors_become_load_errors() {
        let library = Arc::new(CountingLibrary::default());
        library.fail_with_other_error.store(true, Ordering::SeqCst);
        let delegate = OlmDelegate::new(library);

        let err = delegate.init().await.unwrap_err();
        assert!(matches!(err, Error::LibraryLoad(_)));
    }

    #[tokio::test]
    async fn test_missing_version_fails_init() {
        let library = Arc::new(CountingLibrary::default());
        library.hide_version.store(true, Ordering::SeqCst);
        let delegate = OlmDelegate::new(Arc::clone(&library));

        assert!(matches!(
            delegate.init().await,
            Err(Error::LibraryLoad(_))
        ));
        assert_eq!(delegate.state(), DelegateState::Uninitialized);

        library.hide_version.store(false, Ordering::SeqCst);
        delegate.init().await.unwrap();
        assert!(delegate.initialized());
    }

    #[tokio::test]
    async fn test_each_call_returns_a_new_object() {
        let delegate = OlmDelegate::new(Arc::new(Olm::new()));
        delegate.init().await.unwrap();

        let mut first = delegate.create_account().unwrap();
        let mut second = delegate.create_account().unwrap();
        first.create().unwrap();
        second.create().unwrap();

        assert_ne!(
            first.identity_keys().unwrap(),
            second.identity_keys().unwrap()
        );
    }

    #[tokio::test]
    async fn test_default_delegate_uses_the_shared_library() {
        let delegate = OlmDelegate::default();
        assert!(Arc::ptr_eq(delegate.library(), &Olm::shared()));

        delegate.init().await.unwrap();
        assert!(delegate.create_olm_util().is_ok());
    }
}
