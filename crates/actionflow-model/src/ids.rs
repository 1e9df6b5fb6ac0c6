use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! record_id {
  ($(#[$meta:meta])* $name:ident) => {
    $(#[$meta])*
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct $name(pub u64);

    impl fmt::Display for $name {
      fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
      }
    }

    impl From<u64> for $name {
      fn from(id: u64) -> Self {
        Self(id)
      }
    }
  };
}

record_id!(
  /// Identity of a workflow, assigned by the remote store.
  WorkflowId
);

record_id!(
  /// Identity of a trigger, assigned by the remote store.
  TriggerId
);

record_id!(
  /// Identity of an action, assigned by the remote store.
  ///
  /// There is no local id allocation: an action that has not been created
  /// remotely has no `ActionId` and cannot be linked to.
  ActionId
);
