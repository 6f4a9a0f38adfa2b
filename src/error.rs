/// Errors that can occur while initializing the library or driving a protocol object.
#[derive(thiserror::Error, Debug, Clone, Eq, PartialEq)]
pub enum Error {
    /// A factory method was called before [`OlmDelegate::init`](crate::OlmDelegate::init)
    /// completed successfully.
    #[error("The crypto library has not been initialized, call init() first")]
    NotInitialized,

    /// The crypto library failed to load or did not pass its readiness probe.
    #[error("Failed to load the crypto library: {0}")]
    LibraryLoad(String),

    /// Key material was read from an account before `create()` was called.
    #[error("The account has not been created")]
    AccountNotCreated,

    /// `create()` was called on an account that already holds keys.
    #[error("The account has already been created")]
    AccountAlreadyCreated,

    /// The session has not been established or is unusable.
    #[error("Session state error")]
    Session,

    /// The group session has not been created or imported.
    #[error("The group session has not been created")]
    GroupSessionNotCreated,

    /// A cryptographic primitive failed.
    #[error("Cryptographic operation failed: {0}")]
    Crypto(String),

    /// A protocol rule was violated.
    #[error("Protocol Violation: {0}")]
    Protocol(String),

    /// The ciphertext could not be authenticated.
    #[error("Message decryption failed")]
    Decryption,

    /// A group message precedes the first index this session can decrypt.
    #[error("Unknown message index {requested}, the first known index is {first_known}")]
    UnknownMessageIndex {
        /// The first index the inbound session holds a ratchet for.
        first_known: u32,
        /// The index carried by the message.
        requested: u32,
    },

    /// An Ed25519 signature did not verify.
    #[error("Signature verification failed: {0}")]
    Signature(String),

    /// Pre-key operation failed.
    #[error("Pre-key error: {0}")]
    PreKey(String),

    /// The pickle could not be decrypted with the given pickle key.
    #[error("The pickle key does not match the pickled data")]
    BadPickleKey,

    /// Input was not valid unpadded base64.
    #[error("Invalid base64: {0}")]
    Base64(String),

    /// Random number generation failed.
    #[error("Random number generation failed")]
    Random,

    /// Serialization or deserialization failed.
    #[error("Serialization/deserialization failed: {0}")]
    Serde(String),
}

impl From<base64::DecodeError> for Error {
    fn from(value: base64::DecodeError) -> Self {
        Self::Base64(value.to_string())
    }
}

impl From<prost::DecodeError> for Error {
    fn from(value: prost::DecodeError) -> Self {
        Self::Serde(value.to_string())
    }
}

impl From<ed25519_dalek::SignatureError> for Error {
    fn from(value: ed25519_dalek::SignatureError) -> Self {
        Self::Signature(value.to_string())
    }
}
