use crate::types::{NetworkAcl, RouteTable, SecurityGroup};

/// A provider object that diagnostics can point an operator at, e.g.
/// `network acl acl-0a1b` or `route table rtb-77f0`.
pub trait NetworkResource {
    /// Human readable kind, used as the prefix in diagnostics.
    fn resource_kind(&self) -> &'static str;

    /// The provider identifier.
    fn resource_id(&self) -> &str;

    /// `"<kind> <id>"`.
    fn describe(&self) -> String {
        format!("{} {}", self.resource_kind(), self.resource_id())
    }
}

impl NetworkResource for NetworkAcl {
    fn resource_kind(&self) -> &'static str {
        "network acl"
    }

    fn resource_id(&self) -> &str {
        &self.id
    }
}

impl NetworkResource for SecurityGroup {
    fn resource_kind(&self) -> &'static str {
        "security group"
    }

    fn resource_id(&self) -> &str {
        &self.id
    }
}

impl NetworkResource for RouteTable {
    fn resource_kind(&self) -> &'static str {
        "route table"
    }

    fn resource_id(&self) -> &str {
        &self.id
    }
}

/// Comma separated identifiers of `resources`.
pub fn resource_ids<'a, R, I>(resources: I) -> String
where
    R: NetworkResource + 'a,
    I: IntoIterator<Item = &'a R>,
{
    resources
        .into_iter()
        .map(NetworkResource::resource_id)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe() {
        assert_eq!(
            NetworkAcl::new("acl-1", Vec::new()).describe(),
            "network acl acl-1"
        );
        assert_eq!(SecurityGroup::new("sg-1").describe(), "security group sg-1");
        assert_eq!(
            RouteTable::new("rtb-1", Vec::new()).describe(),
            "route table rtb-1"
        );
    }

    #[test]
    fn test_resource_ids() {
        let groups = [SecurityGroup::new("sg-a"), SecurityGroup::new("sg-b")];
        assert_eq!(resource_ids(&groups), "sg-a, sg-b");
        assert_eq!(resource_ids::<SecurityGroup, _>([]), "");
    }
}
