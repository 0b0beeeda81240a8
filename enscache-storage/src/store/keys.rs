//! Persisted key layout for ENS data.
//!
//! Every key lives in a namespace derived from what it stores, so two data
//! types cached for the same name can never collide:
//!
//! | key                                | contents                      |
//! |------------------------------------|-------------------------------|
//! | `ens.<dataType>.<name>`            | one ENS data category         |
//! | `ens.profile.<name>`               | full profile blob             |
//! | `ensDomains.<account>`             | domains owned by an account   |
//! | `ensLabelhashes.<labelhash>`       | labelhash reverse mapping     |
//! | `ensProfile.seenOnchainDisclaimer` | disclaimer flag               |

use enscache_core::EnsDataType;

const DATA_NAMESPACE: &str = "ens";
const PROFILE_SEGMENT: &str = "profile";
const DOMAINS_NAMESPACE: &str = "ensDomains";
const LABELHASH_NAMESPACE: &str = "ensLabelhashes";
const SEEN_ONCHAIN_DISCLAIMER_KEY: &str = "ensProfile.seenOnchainDisclaimer";

/// A key in the local store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StorageKey {
    Data { data_type: EnsDataType, name: String },
    Profile { name: String },
    Domains { account: String },
    Labelhash { labelhash: String },
    SeenOnchainDisclaimer,
}

impl StorageKey {
    pub fn data(data_type: EnsDataType, name: impl Into<String>) -> Self {
        Self::Data {
            data_type,
            name: name.into(),
        }
    }

    pub fn profile(name: impl Into<String>) -> Self {
        Self::Profile { name: name.into() }
    }

    pub fn domains(account: impl Into<String>) -> Self {
        Self::Domains {
            account: account.into(),
        }
    }

    pub fn labelhash(labelhash: impl Into<String>) -> Self {
        Self::Labelhash {
            labelhash: labelhash.into(),
        }
    }

    /// Encode to the string key used by the backend.
    pub fn encode(&self) -> String {
        match self {
            Self::Data { data_type, name } => {
                format!("{}.{}.{}", DATA_NAMESPACE, data_type.as_str(), name)
            }
            Self::Profile { name } => format!("{}.{}.{}", DATA_NAMESPACE, PROFILE_SEGMENT, name),
            Self::Domains { account } => format!("{}.{}", DOMAINS_NAMESPACE, account),
            Self::Labelhash { labelhash } => format!("{}.{}", LABELHASH_NAMESPACE, labelhash),
            Self::SeenOnchainDisclaimer => SEEN_ONCHAIN_DISCLAIMER_KEY.to_string(),
        }
    }

    /// Parse a backend key back into a `StorageKey`.
    ///
    /// Names may themselves contain dots (`nick.eth`), so only the leading
    /// namespace segments are split off.
    pub fn decode(key: &str) -> Option<Self> {
        if key == SEEN_ONCHAIN_DISCLAIMER_KEY {
            return Some(Self::SeenOnchainDisclaimer);
        }
        let (namespace, rest) = key.split_once('.')?;
        if rest.is_empty() {
            return None;
        }
        match namespace {
            DATA_NAMESPACE => {
                let (segment, name) = rest.split_once('.')?;
                if name.is_empty() {
                    return None;
                }
                if segment == PROFILE_SEGMENT {
                    Some(Self::profile(name))
                } else {
                    let data_type = segment.parse::<EnsDataType>().ok()?;
                    Some(Self::data(data_type, name))
                }
            }
            DOMAINS_NAMESPACE => Some(Self::domains(rest)),
            LABELHASH_NAMESPACE => Some(Self::labelhash(rest)),
            _ => None,
        }
    }

    /// Prefix shared by every key of one data type, for prefix scans.
    pub fn data_type_prefix(data_type: EnsDataType) -> String {
        format!("{}.{}.", DATA_NAMESPACE, data_type.as_str())
    }
}

impl std::fmt::Display for StorageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.encode())
    }
}
