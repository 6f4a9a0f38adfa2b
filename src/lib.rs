//! Olm and Megolm session cryptography behind an initialization-gated delegate.
//!
//! Everything starts from an [`OlmDelegate`]. Once [`OlmDelegate::init`] has
//! loaded the [`CryptoLibrary`], its `create_*` methods hand out accounts,
//! pairwise sessions, group sessions and Pk objects.
//!
//! ```
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), mecholm::Error> {
//! use mecholm::{MessageType, OlmDelegate};
//!
//! let olm = OlmDelegate::default();
//! olm.init().await?;
//!
//! let mut alice = olm.create_account()?;
//! let mut bob = olm.create_account()?;
//! alice.create()?;
//! bob.create()?;
//! bob.generate_one_time_keys(1)?;
//!
//! let bob_key = *bob.one_time_keys()?.values().next().ok_or(mecholm::Error::Session)?;
//! let mut outbound = olm.create_session()?;
//! outbound.create_outbound(&alice, &bob.curve25519_key()?, &bob_key)?;
//!
//! let message = outbound.encrypt(b"Hello Bob")?;
//! assert_eq!(message.message_type, MessageType::PreKey);
//!
//! let mut inbound = olm.create_session()?;
//! inbound.create_inbound(&bob, &message.body)?;
//! bob.remove_one_time_keys(&inbound)?;
//! assert_eq!(inbound.decrypt(message.message_type, &message.body)?, b"Hello Bob");
//! # Ok(())
//! # }
//! ```
//!
//! Protocol objects are released with `free()`, which consumes them:
//!
//! ```compile_fail
//! fn use_after_free(account: mecholm::Account) {
//!     account.free();
//!     let _ = account.identity_keys();
//! }
//! ```

mod cipher;
mod pickle;
mod proto;
mod ratchet;
mod triple_dh;

mod error;
pub use error::Error;

mod config;
pub use config::OlmConfig;

mod types;
pub use types::{
    Ed25519PublicKey, Ed25519Signature, KeyId, X25519PublicKey, base64_decode, base64_encode,
};

mod account;
pub use account::{Account, IdentityKeys};

mod session;
pub use session::{MessageType, OlmMessage, Session};

mod megolm;
pub use megolm::{GroupDecryption, InboundGroupSession, OutboundGroupSession};

mod pk;
pub use pk::{PkDecryption, PkEncryption, PkMessage, PkSigning};

mod utility;
pub use utility::Utility;

mod library;
pub use library::{CryptoLibrary, LibraryVersion, Olm};

mod delegate;
pub use delegate::{DelegateState, OlmDelegate};
