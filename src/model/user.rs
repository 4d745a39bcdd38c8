use std::collections::BTreeSet;

/// A user account, identified by its sign-in name.
///
/// The password is kept as an opaque digest; hashing and checking belong
/// to the authentication layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct User {
    pub usersign: String,
    pub note: String,
    pub password: Option<String>,
    roles: BTreeSet<String>,
}

impl User {
    pub fn new(usersign: impl Into<String>) -> Self {
        Self {
            usersign: usersign.into(),
            ..Default::default()
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }

    pub fn add_role(&mut self, role: impl Into<String>) {
        self.roles.insert(role.into());
    }

    pub fn del_role(&mut self, role: &str) {
        self.roles.remove(role);
    }

    /// roles in sorted order
    pub fn list_roles(&self) -> Vec<&str> {
        self.roles.iter().map(String::as_str).collect()
    }

    pub(crate) fn roles(&self) -> &BTreeSet<String> {
        &self.roles
    }

    pub(crate) fn set_roles(&mut self, roles: BTreeSet<String>) {
        self.roles = roles;
    }
}
