use crate::model::Policy;

/// A named collection of tiddlers plus an access policy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bag {
    pub name: String,
    pub desc: String,
    pub policy: Policy,
}

impl Bag {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = desc.into();
        self
    }

    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }
}
