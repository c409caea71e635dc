//! Command handlers

pub mod config;
pub mod get;
pub mod hydrate;
pub mod keys;
pub mod set;
pub mod status;

use anyhow::{bail, Result};

use portal_sync_core::ResourceId;

/// Parse a resource name, binding private resources to `user`
///
/// The CLI has no login session, so a private resource needs a user either
/// as `name@user` or through `--user`.
pub fn parse_resource(name: &str, user: Option<String>) -> Result<ResourceId> {
    let resource: ResourceId = name.parse()?;

    match (resource, user) {
        (ResourceId::Shared(_), Some(_)) => {
            bail!("'{}' is shared; --user only applies to private resources", name)
        }
        (ResourceId::Private(resource), Some(user)) => Ok(ResourceId::PrivateFor { user, resource }),
        (ResourceId::Private(_), None) => {
            bail!("'{}' is private; pass --user or use '{}@<user>'", name, name)
        }
        (ResourceId::PrivateFor { user: inline, .. }, Some(user)) if inline != user => {
            bail!("Conflicting users '{}' and '{}'", inline, user)
        }
        (resource, _) => Ok(resource),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_sync_core::{PrivateResource, SharedResource};

    #[test]
    fn test_parse_shared() {
        assert_eq!(
            parse_resource("classes", None).unwrap(),
            ResourceId::Shared(SharedResource::Classes)
        );
        assert!(parse_resource("classes", Some("u1".to_string())).is_err());
    }

    #[test]
    fn test_parse_private_needs_user() {
        assert!(parse_resource("results", None).is_err());

        let expected = ResourceId::PrivateFor {
            user: "u1".to_string(),
            resource: PrivateResource::Results,
        };
        assert_eq!(
            parse_resource("results", Some("u1".to_string())).unwrap(),
            expected
        );
        assert_eq!(parse_resource("results@u1", None).unwrap(), expected);
        assert_eq!(
            parse_resource("results@u1", Some("u1".to_string())).unwrap(),
            expected
        );
        assert!(parse_resource("results@u1", Some("u2".to_string())).is_err());
    }

    #[test]
    fn test_parse_unknown() {
        let err = parse_resource("grades", None).unwrap_err();
        assert!(err.to_string().contains("grades"));
    }
}
