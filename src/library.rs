//! The crypto library seam.
//!
//! [`CryptoLibrary`] is what an [`OlmDelegate`](crate::OlmDelegate) loads and
//! then builds protocol objects from. [`Olm`] is the implementation shipped with
//! this crate; tests and embedders can substitute their own.

use crate::Error;
use crate::account::Account;
use crate::config::OlmConfig;
use crate::megolm::{InboundGroupSession, OutboundGroupSession};
use crate::pk::{PkDecryption, PkEncryption, PkSigning};
use crate::session::Session;
use crate::utility::Utility;
use ed25519_dalek::{Signer, SigningKey};
use std::fmt;
use std::sync::{Arc, LazyLock, OnceLock};
use x25519_dalek::{PublicKey, StaticSecret};

/// Version reported by a loaded library.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LibraryVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl LibraryVersion {
    fn of_this_crate() -> Self {
        Self {
            major: env!("CARGO_PKG_VERSION_MAJOR").parse().unwrap_or_default(),
            minor: env!("CARGO_PKG_VERSION_MINOR").parse().unwrap_or_default(),
            patch: env!("CARGO_PKG_VERSION_PATCH").parse().unwrap_or_default(),
        }
    }
}

impl fmt::Display for LibraryVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// A cryptographic primitives library that must be loaded before use.
///
/// Implementors provide [`load`](CryptoLibrary::load) and the readiness probe
/// [`version`](CryptoLibrary::version); the constructors have default
/// implementations that build objects configured by
/// [`config`](CryptoLibrary::config).
#[async_trait::async_trait]
pub trait CryptoLibrary: Send + Sync {
    /// Loads the library. May be slow, and is not guaranteed to be re-entrant.
    async fn load(&self) -> Result<(), Error>;

    /// The loaded library's version, or `None` if it is not usable.
    fn version(&self) -> Option<LibraryVersion>;

    /// Configuration passed to every account and session.
    fn config(&self) -> &OlmConfig;

    fn account(&self) -> Account {
        Account::new(self.config().clone())
    }

    fn session(&self) -> Session {
        Session::new(self.config().clone())
    }

    fn inbound_group_session(&self) -> InboundGroupSession {
        InboundGroupSession::new()
    }

    fn outbound_group_session(&self) -> OutboundGroupSession {
        OutboundGroupSession::new()
    }

    fn pk_encryption(&self) -> PkEncryption {
        PkEncryption::new()
    }

    fn pk_decryption(&self) -> PkDecryption {
        PkDecryption::new()
    }

    fn pk_signing(&self) -> PkSigning {
        PkSigning::new()
    }

    fn utility(&self) -> Utility {
        Utility::new()
    }
}

static DEFAULT_LIBRARY: LazyLock<Arc<Olm>> = LazyLock::new(|| Arc::new(Olm::default()));

/// The built-in library: Olm and Megolm on top of the dalek curves, AES-GCM-SIV
/// and HKDF-SHA256.
///
/// Loading runs known-answer tests against the primitives, so a broken backend
/// shows up as [`Error::LibraryLoad`] instead of as undecryptable messages.
#[derive(Debug, Default)]
pub struct Olm {
    config: OlmConfig,
    loaded: OnceLock<LibraryVersion>,
}

impl Olm {
    /// A library with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: OlmConfig) -> Self {
        Self {
            config,
            loaded: OnceLock::new(),
        }
    }

    /// The process-wide default instance, used by
    /// [`OlmDelegate::default`](crate::OlmDelegate::default). It lives for the
    /// rest of the process.
    pub fn shared() -> Arc<Olm> {
        Arc::clone(&DEFAULT_LIBRARY)
    }

    fn self_test() -> Result<(), Error> {
        // RFC 7748, section 6.1
        const ALICE_PRIVATE: [u8; 32] = [
            0x77, 0x07, 0x6d, 0x0a, 0x73, 0x18, 0xa5, 0x7d, 0x3c, 0x16, 0xc1, 0x72, 0x51, 0xb2,
            0x66, 0x45, 0xdf, 0x4c, 0x2f, 0x87, 0xeb, 0xc0, 0x99, 0x2a, 0xb1, 0x77, 0xfb, 0xa5,
            0x1d, 0xb9, 0x2c, 0x2a,
        ];
        const ALICE_PUBLIC: [u8; 32] = [
            0x85, 0x20, 0xf0, 0x09, 0x89, 0x30, 0xa7, 0x54, 0x74, 0x8b, 0x7d, 0xdc, 0xb4, 0x3e,
            0xf7, 0x5a, 0x0d, 0xbf, 0x3a, 0x0d, 0x26, 0x38, 0x1a, 0xf4, 0xeb, 0xa4, 0xa9, 0x8e,
            0xaa, 0x9b, 0x4e, 0x6a,
        ];
        const BOB_PUBLIC: [u8; 32] = [
            0xde, 0x9e, 0xdb, 0x7d, 0x7b, 0x7d, 0xc1, 0xb4, 0xd3, 0x5b, 0x61, 0xc2, 0xec, 0xe4,
            0x35, 0x37, 0x3f, 0x83, 0x43, 0xc8, 0x5b, 0x78, 0x67, 0x4d, 0xad, 0xfc, 0x7e, 0x14,
            0x6f, 0x88, 0x2b, 0x4f,
        ];
        const SHARED_SECRET: [u8; 32] = [
            0x4a, 0x5d, 0x9d, 0x5b, 0xa4, 0xce, 0x2d, 0xe1, 0x72, 0x8e, 0x3b, 0xf4, 0x80, 0x35,
            0x0f, 0x25, 0xe0, 0x7e, 0x21, 0xc9, 0x47, 0xd1, 0x9e, 0x33, 0x76, 0xf0, 0x9b, 0x3c,
            0x1e, 0x16, 0x17, 0x42,
        ];

        let alice = StaticSecret::from(ALICE_PRIVATE);
        if PublicKey::from(&alice).as_bytes() != &ALICE_PUBLIC {
            return Err(Error::LibraryLoad(
                "Curve25519 public key derivation failed its self test".to_string(),
            ));
        }
        if alice.diffie_hellman(&PublicKey::from(BOB_PUBLIC)).as_bytes() != &SHARED_SECRET {
            return Err(Error::LibraryLoad(
                "Curve25519 key agreement failed its self test".to_string(),
            ));
        }

        let signing_key = SigningKey::from_bytes(&[0x42; 32]);
        let signature = signing_key.sign(b"self test");
        let verifying_key = signing_key.verifying_key();
        if verifying_key.verify_strict(b"self test", &signature).is_err()
            || verifying_key.verify_strict(b"self tesT", &signature).is_ok()
        {
            return Err(Error::LibraryLoad(
                "Ed25519 signatures failed their self test".to_string(),
            ));
        }

        Ok(())
    }
}

#[async_trait::async_trait]
impl CryptoLibrary for Olm {
    async fn load(&self) -> Result<(), Error> {
        if self.loaded.get().is_some() {
            return Ok(());
        }

        Self::self_test()?;
        let version = *self.loaded.get_or_init(LibraryVersion::of_this_crate);
        tracing::debug!(%version, "primitives passed their self tests");

        Ok(())
    }

    fn version(&self) -> Option<LibraryVersion> {
        self.loaded.get().copied()
    }

    fn config(&self) -> &OlmConfig {
        &self.config
    }
}
