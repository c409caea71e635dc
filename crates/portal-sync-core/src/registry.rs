//! Resource registry
//!
//! Every piece of data the portal synchronizes is named by a [`ResourceId`].
//! Shared resources (visible to all users) have a fixed local key and remote
//! key; private resources are namespaced per user.
//!
//! Adding a shared resource means adding a [`SharedResource`] variant; the
//! exhaustive matches below refuse to compile until it has a logical key,
//! local key, remote key and fallback.
//!
//! ## Key layout
//!
//! | Resource | Local key | Remote |
//! |---|---|---|
//! | shared `classes` | `portal-classes` | `classes` in `shared` |
//! | private `results` for `u1` | `results-for-u1` | `results` in `private:u1` |

use std::fmt;
use std::str::FromStr;

use serde_json::{json, Value};

/// Identifier of the authenticated user
pub type UserId = String;

/// Resource category name, used to key subscriptions
///
/// Private resources share one logical key across users, so a binding
/// mounted before login still hears about the user's hydration.
pub type LogicalKey = &'static str;

/// Key in the local caches (memory and persistent)
pub type StorageKey = String;

/// Resources shared by every user of the portal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SharedResource {
    Classes,
    Drugs,
    LabValues,
    QuestionBanks,
    Flashcards,
    Handouts,
    GradingQueue,
    Announcements,
}

impl SharedResource {
    /// Every shared resource, in hydration order
    pub const ALL: [SharedResource; 8] = [
        SharedResource::Classes,
        SharedResource::Drugs,
        SharedResource::LabValues,
        SharedResource::QuestionBanks,
        SharedResource::Flashcards,
        SharedResource::Handouts,
        SharedResource::GradingQueue,
        SharedResource::Announcements,
    ];

    pub fn logical_key(self) -> LogicalKey {
        match self {
            SharedResource::Classes => "classes",
            SharedResource::Drugs => "drugs",
            SharedResource::LabValues => "lab_values",
            SharedResource::QuestionBanks => "question_banks",
            SharedResource::Flashcards => "flashcards",
            SharedResource::Handouts => "handouts",
            SharedResource::GradingQueue => "grading_queue",
            SharedResource::Announcements => "announcements",
        }
    }

    pub fn local_key(self) -> &'static str {
        match self {
            SharedResource::Classes => "portal-classes",
            SharedResource::Drugs => "portal-drugs",
            SharedResource::LabValues => "portal-lab-values",
            SharedResource::QuestionBanks => "portal-question-banks",
            SharedResource::Flashcards => "portal-flashcards",
            SharedResource::Handouts => "portal-handouts",
            SharedResource::GradingQueue => "portal-grading-queue",
            SharedResource::Announcements => "portal-announcements",
        }
    }

    pub fn remote_key(self) -> &'static str {
        match self {
            SharedResource::Classes => "classes",
            SharedResource::Drugs => "drugs",
            SharedResource::LabValues => "labValues",
            SharedResource::QuestionBanks => "questionBanks",
            SharedResource::Flashcards => "flashcards",
            SharedResource::Handouts => "handouts",
            SharedResource::GradingQueue => "gradingQueue",
            SharedResource::Announcements => "announcements",
        }
    }

    /// Value served before anything has been cached
    pub fn fallback(self) -> Value {
        match self {
            SharedResource::Classes
            | SharedResource::Drugs
            | SharedResource::QuestionBanks
            | SharedResource::Flashcards
            | SharedResource::Handouts
            | SharedResource::GradingQueue
            | SharedResource::Announcements => json!([]),
            // Lab values are grouped by panel name
            SharedResource::LabValues => json!({}),
        }
    }
}

/// Resources owned by a single user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrivateResource {
    Results,
    Timetable,
    FlashcardProgress,
    Bookmarks,
}

impl PrivateResource {
    /// Every private resource, in hydration order
    pub const ALL: [PrivateResource; 4] = [
        PrivateResource::Results,
        PrivateResource::Timetable,
        PrivateResource::FlashcardProgress,
        PrivateResource::Bookmarks,
    ];

    pub fn suffix(self) -> &'static str {
        match self {
            PrivateResource::Results => "results",
            PrivateResource::Timetable => "timetable",
            PrivateResource::FlashcardProgress => "flashcard_progress",
            PrivateResource::Bookmarks => "bookmarks",
        }
    }

    pub fn fallback(self) -> Value {
        match self {
            PrivateResource::Results | PrivateResource::Bookmarks => json!([]),
            PrivateResource::Timetable | PrivateResource::FlashcardProgress => json!({}),
        }
    }

    /// Local key for this resource owned by `user`
    pub fn local_key(self, user: &str) -> StorageKey {
        format!("{}-for-{}", self.suffix(), user)
    }
}

/// Remote namespace a key lives in
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Partition {
    Shared,
    Private(UserId),
}

impl Partition {
    /// Fully qualified remote key, e.g. `shared:classes` or `private:u1:results`
    pub fn qualify(&self, key: &str) -> String {
        match self {
            Partition::Shared => format!("shared:{}", key),
            Partition::Private(user) => format!("private:{}:{}", user, key),
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Partition::Shared => write!(f, "shared"),
            Partition::Private(user) => write!(f, "private:{}", user),
        }
    }
}

/// Any resource the sync layer can read, write or bind to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceId {
    Shared(SharedResource),
    /// Private resource of whoever is currently logged in
    Private(PrivateResource),
    /// Private resource of an explicit user
    PrivateFor {
        user: UserId,
        resource: PrivateResource,
    },
}

/// A resource with its user resolved, ready to hit the caches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedKey {
    pub logical: LogicalKey,
    pub storage: StorageKey,
    pub remote_key: &'static str,
    pub partition: Partition,
}

impl ResourceId {
    pub fn logical_key(&self) -> LogicalKey {
        match self {
            ResourceId::Shared(shared) => shared.logical_key(),
            ResourceId::Private(resource) | ResourceId::PrivateFor { resource, .. } => {
                resource.suffix()
            }
        }
    }

    pub fn fallback(&self) -> Value {
        match self {
            ResourceId::Shared(shared) => shared.fallback(),
            ResourceId::Private(resource) | ResourceId::PrivateFor { resource, .. } => {
                resource.fallback()
            }
        }
    }

    pub fn is_private(&self) -> bool {
        !matches!(self, ResourceId::Shared(_))
    }

    /// Resolve local and remote keys
    ///
    /// `current_user` is consulted only for [`ResourceId::Private`]; returns
    /// `None` when that variant is used with nobody logged in.
    pub fn resolve(&self, current_user: Option<&str>) -> Option<ResolvedKey> {
        match self {
            ResourceId::Shared(shared) => Some(ResolvedKey {
                logical: shared.logical_key(),
                storage: shared.local_key().to_string(),
                remote_key: shared.remote_key(),
                partition: Partition::Shared,
            }),
            ResourceId::Private(resource) => {
                let user = current_user.filter(|u| !u.is_empty())?;
                Some(resolve_private(*resource, user))
            }
            ResourceId::PrivateFor { user, resource } => Some(resolve_private(*resource, user)),
        }
    }
}

fn resolve_private(resource: PrivateResource, user: &str) -> ResolvedKey {
    ResolvedKey {
        logical: resource.suffix(),
        storage: resource.local_key(user),
        remote_key: resource.suffix(),
        partition: Partition::Private(user.to_string()),
    }
}

impl From<SharedResource> for ResourceId {
    fn from(shared: SharedResource) -> Self {
        ResourceId::Shared(shared)
    }
}

impl From<PrivateResource> for ResourceId {
    fn from(resource: PrivateResource) -> Self {
        ResourceId::Private(resource)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceId::Shared(shared) => write!(f, "{}", shared.logical_key()),
            ResourceId::Private(resource) => write!(f, "{}", resource.suffix()),
            ResourceId::PrivateFor { user, resource } => {
                write!(f, "{}@{}", resource.suffix(), user)
            }
        }
    }
}

/// Error parsing a resource name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown resource '{0}'")]
pub struct UnknownResource(pub String);

impl FromStr for ResourceId {
    type Err = UnknownResource;

    /// Parses `classes`, `results` or `results@user`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, user) = match s.split_once('@') {
            Some((name, user)) if !user.is_empty() => (name, Some(user)),
            Some(_) => return Err(UnknownResource(s.to_string())),
            None => (s, None),
        };

        if user.is_none() {
            if let Some(shared) = SharedResource::ALL
                .iter()
                .find(|r| r.logical_key() == name)
            {
                return Ok(ResourceId::Shared(*shared));
            }
        }

        let resource = PrivateResource::ALL
            .iter()
            .find(|r| r.suffix() == name)
            .copied()
            .ok_or_else(|| UnknownResource(s.to_string()))?;

        Ok(match user {
            Some(user) => ResourceId::PrivateFor {
                user: user.to_string(),
                resource,
            },
            None => ResourceId::Private(resource),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_shared_keys_are_unique() {
        let locals: HashSet<_> = SharedResource::ALL.iter().map(|r| r.local_key()).collect();
        let remotes: HashSet<_> = SharedResource::ALL.iter().map(|r| r.remote_key()).collect();
        let logicals: HashSet<_> = SharedResource::ALL.iter().map(|r| r.logical_key()).collect();

        assert_eq!(locals.len(), SharedResource::ALL.len());
        assert_eq!(remotes.len(), SharedResource::ALL.len());
        assert_eq!(logicals.len(), SharedResource::ALL.len());
    }

    #[test]
    fn test_private_and_shared_logical_keys_do_not_collide() {
        for private in PrivateResource::ALL {
            assert!(SharedResource::ALL
                .iter()
                .all(|shared| shared.logical_key() != private.suffix()));
        }
    }

    #[test]
    fn test_private_local_key_layout() {
        assert_eq!(PrivateResource::Results.local_key("u1"), "results-for-u1");
        assert_eq!(
            PrivateResource::Timetable.local_key("student@uni"),
            "timetable-for-student@uni"
        );
    }

    #[test]
    fn test_resolve_shared() {
        let key = ResourceId::Shared(SharedResource::LabValues)
            .resolve(None)
            .unwrap();
        assert_eq!(key.logical, "lab_values");
        assert_eq!(key.storage, "portal-lab-values");
        assert_eq!(key.remote_key, "labValues");
        assert_eq!(key.partition, Partition::Shared);
    }

    #[test]
    fn test_resolve_private_needs_user() {
        let id = ResourceId::Private(PrivateResource::Results);
        assert!(id.resolve(None).is_none());
        assert!(id.resolve(Some("")).is_none());

        let key = id.resolve(Some("u1")).unwrap();
        assert_eq!(key.storage, "results-for-u1");
        assert_eq!(key.partition, Partition::Private("u1".to_string()));
    }

    #[test]
    fn test_resolve_private_for_ignores_current_user() {
        let id = ResourceId::PrivateFor {
            user: "u2".to_string(),
            resource: PrivateResource::Bookmarks,
        };
        let key = id.resolve(Some("u1")).unwrap();
        assert_eq!(key.storage, "bookmarks-for-u2");
        assert_eq!(key.logical, "bookmarks");
    }

    #[test]
    fn test_partition_qualify() {
        assert_eq!(Partition::Shared.qualify("classes"), "shared:classes");
        assert_eq!(
            Partition::Private("u1".to_string()).qualify("results"),
            "private:u1:results"
        );
    }

    #[test]
    fn test_parse_resource_names() {
        assert_eq!(
            "classes".parse::<ResourceId>().unwrap(),
            ResourceId::Shared(SharedResource::Classes)
        );
        assert_eq!(
            "timetable".parse::<ResourceId>().unwrap(),
            ResourceId::Private(PrivateResource::Timetable)
        );
        assert_eq!(
            "results@u9".parse::<ResourceId>().unwrap(),
            ResourceId::PrivateFor {
                user: "u9".to_string(),
                resource: PrivateResource::Results
            }
        );
        assert!("classes@u9".parse::<ResourceId>().is_err());
        assert!("results@".parse::<ResourceId>().is_err());
        assert!("gradebook".parse::<ResourceId>().is_err());
    }

    #[test]
    fn test_display_parses_back() {
        let ids = [
            ResourceId::Shared(SharedResource::Handouts),
            ResourceId::Private(PrivateResource::FlashcardProgress),
            ResourceId::PrivateFor {
                user: "u3".to_string(),
                resource: PrivateResource::Results,
            },
        ];
        for id in ids {
            assert_eq!(id.to_string().parse::<ResourceId>().unwrap(), id);
        }
    }
}
