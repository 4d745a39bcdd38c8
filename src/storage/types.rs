//! core type-safe wrappers around git primitives and caller identity.

use std::fmt;

use git2::Oid;
use serde::{Deserialize, Serialize};

/// length of the revision identifiers handed out to callers
pub const REVISION_LEN: usize = 10;

/// A full git commit identifier.
///
/// The inner Oid is only accessible within the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommitId(pub(crate) Oid);

impl CommitId {
    pub(crate) fn new(oid: Oid) -> Self {
        Self(oid)
    }

    /// raw Oid (for internal use only)
    pub(crate) fn raw(&self) -> Oid {
        self.0
    }

    /// parse CommitId from a full hex string
    pub fn from_hex(hex: &str) -> Result<Self, git2::Error> {
        Oid::from_str(hex).map(CommitId)
    }

    /// the truncated form exposed as a tiddler revision
    pub fn revision(&self) -> RevisionId {
        RevisionId(self.0.to_string()[..REVISION_LEN].to_string())
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An opaque tiddler revision identifier.
///
/// Revisions produced by the store are always [`REVISION_LEN`] lowercase hex
/// characters taken from the front of a commit id. Callers may construct
/// arbitrary values to request a revision; malformed ones simply resolve to
/// nothing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RevisionId(String);

impl RevisionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// whether this looks like an abbreviated or full commit hash
    pub fn is_well_formed(&self) -> bool {
        (4..=40).contains(&self.0.len()) && self.0.chars().all(|c| c.is_ascii_hexdigit())
    }
}

impl fmt::Display for RevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for RevisionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// git signature (author/committer info)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitSignature {
    pub name: String,
    pub email: String,
}

impl GitSignature {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    /// `{name} <{name}@{host}>`
    pub fn at_host(name: &str, host: &ServerHost) -> Self {
        Self::new(name, format!("{}@{}", name, host))
    }

    /// convert to git2::Signature
    pub(crate) fn to_git2_signature(&self) -> Result<git2::Signature<'static>, git2::Error> {
        git2::Signature::now(&self.name, &self.email)
    }
}

impl fmt::Display for GitSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}

/// The host the store is being served from. Only used in commit signatures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerHost {
    pub host: String,
    #[serde(default = "ServerHost::default_port")]
    pub port: u16,
}

impl ServerHost {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    fn default_port() -> u16 {
        80
    }
}

impl Default for ServerHost {
    fn default() -> Self {
        Self::new("localhost", 80)
    }
}

impl fmt::Display for ServerHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.port == 80 {
            write!(f, "{}", self.host)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Who is making a change, as supplied per request by the serving layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub usersign: String,
    pub host: ServerHost,
}

impl Identity {
    /// the account name used for unauthenticated callers
    pub const GUEST: &'static str = "GUEST";

    pub fn new(usersign: impl Into<String>, host: ServerHost) -> Self {
        Self {
            usersign: usersign.into(),
            host,
        }
    }

    pub fn guest(host: ServerHost) -> Self {
        Self::new(Self::GUEST, host)
    }

    /// commit author for changes made by this caller
    pub fn author(&self) -> GitSignature {
        GitSignature::at_host(&self.usersign, &self.host)
    }

    /// commit committer: the service itself, at the caller's host
    pub fn committer(&self, service: &str) -> GitSignature {
        GitSignature::at_host(service, &self.host)
    }
}
