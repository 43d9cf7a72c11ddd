use std::fmt;

/// Opaque stable service identifier: a 16-hex-char prefix of a
/// collision-resistant hash of `(namespace, name, owner, createdAtNanos)`.
///
/// Stored as 8 raw bytes rather than a `String` so the type stays `Copy`,
/// following the newtype-ID convention used throughout this crate
/// (`Ordinal`, `Owner`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ServiceId([u8; 8]);

impl ServiceId {
    /// Derives an id from the registration identity. `created_at_nanos`
    /// must be supplied by the caller (this crate has no clock access).
    #[must_use]
    pub fn derive(namespace: &str, name: &str, owner: Owner, created_at_nanos: u64) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(namespace.as_bytes());
        hasher.update(b"\0");
        hasher.update(name.as_bytes());
        hasher.update(b"\0");
        hasher.update(&owner.0);
        hasher.update(&created_at_nanos.to_be_bytes());
        let hash = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash.as_bytes()[..8]);
        Self(bytes)
    }

    #[must_use]
    pub fn as_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_hex())
    }
}

impl From<ServiceId> for String {
    fn from(id: ServiceId) -> Self {
        id.as_hex()
    }
}

impl TryFrom<String> for ServiceId {
    type Error = ParseIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.len() != 16 {
            return Err(ParseIdError::WrongLength {
                expected: 16,
                actual: value.len(),
            });
        }
        let mut bytes = [0u8; 8];
        for (i, chunk) in bytes.iter_mut().enumerate() {
            let start = i * 2;
            *chunk = u8::from_str_radix(&value[start..start + 2], 16)
                .map_err(|_| ParseIdError::NotHex(value.clone()))?;
        }
        Ok(Self(bytes))
    }
}

/// Opaque 20-byte account identifier. Equality is case-insensitive in its
/// hex-encoded source representation; storing the raw bytes rather than
/// the hex string makes that equality automatic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Owner([u8; 20]);

impl Owner {
    #[must_use]
    pub fn as_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_hex())
    }
}

impl From<Owner> for String {
    fn from(owner: Owner) -> Self {
        owner.as_hex()
    }
}

impl TryFrom<String> for Owner {
    type Error = ParseIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let lower = value.to_ascii_lowercase();
        if lower.len() != 40 {
            return Err(ParseIdError::WrongLength {
                expected: 40,
                actual: lower.len(),
            });
        }
        let mut bytes = [0u8; 20];
        for (i, chunk) in bytes.iter_mut().enumerate() {
            let start = i * 2;
            *chunk = u8::from_str_radix(&lower[start..start + 2], 16)
                .map_err(|_| ParseIdError::NotHex(value.clone()))?;
        }
        Ok(Self(bytes))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ParseIdError {
    #[error("expected {expected} hex characters, got {actual}")]
    WrongLength { expected: usize, actual: usize },
    #[error("not a valid hex string: {0}")]
    NotHex(String),
}

/// 0-based, dense, monotonically assigned replica index. Determines pod
/// identity, DNS name, MPC party id, and termination order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct Ordinal(pub u32);

impl Ordinal {
    #[must_use]
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    #[must_use]
    pub fn get(self) -> u32 {
        self.0
    }

    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Ordinal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for Ordinal {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<Ordinal> for u32 {
    fn from(ordinal: Ordinal) -> Self {
        ordinal.0
    }
}

/// Validated namespace string. Namespaces share `name`'s validation rule;
/// the default namespace is `"default"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct Namespace(String);

impl Namespace {
    pub fn parse(raw: impl Into<String>) -> Result<Self, NameValidationError> {
        let raw = raw.into();
        validate_dns_label(&raw)?;
        Ok(Self(raw))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn default_namespace() -> Self {
        Self("default".to_string())
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validated service name: `^[a-z0-9][a-z0-9-]*[a-z0-9]$`, length 1-63.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct Name(String);

impl Name {
    pub fn parse(raw: impl Into<String>) -> Result<Self, NameValidationError> {
        let raw = raw.into();
        validate_dns_label(&raw)?;
        Ok(Self(raw))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NameValidationError {
    #[error("name must be 1-63 characters, got {0}")]
    WrongLength(usize),
    #[error("name must match ^[a-z0-9][a-z0-9-]*[a-z0-9]$, got {0:?}")]
    InvalidPattern(String),
}

fn validate_dns_label(raw: &str) -> Result<(), NameValidationError> {
    if raw.is_empty() || raw.len() > 63 {
        return Err(NameValidationError::WrongLength(raw.len()));
    }
    let bytes = raw.as_bytes();
    let is_alnum = |b: u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    let valid = is_alnum(bytes[0])
        && is_alnum(bytes[bytes.len() - 1])
        && bytes.iter().all(|&b| is_alnum(b) || b == b'-');
    if valid {
        Ok(())
    } else {
        Err(NameValidationError::InvalidPattern(raw.to_string()))
    }
}
