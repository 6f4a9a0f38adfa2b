/// Tunables shared by every account and session a library instance creates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OlmConfig {
    /// How many message keys a single receiving chain may skip ahead.
    pub max_skipped_messages: u32,
    /// How many skipped message keys a session keeps across all its chains.
    /// The oldest are dropped first.
    pub max_skipped_message_keys: usize,
    /// Size of the one-time key pool. Generating past it evicts the oldest keys.
    pub max_one_time_keys: usize,
    /// Context info fed to HKDF when deriving the 3DH root secret.
    pub protocol_info: Vec<u8>,
}

impl Default for OlmConfig {
    fn default() -> Self {
        Self {
            max_skipped_messages: 1000,
            max_skipped_message_keys: 40,
            max_one_time_keys: 100,
            protocol_info: b"Mecholm-Olm-Root".to_vec(),
        }
    }
}
