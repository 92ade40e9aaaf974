//! Options objects: optional query parameters contributed after the
//! positional ones, in the order the caller declared them.

use base64::Engine;

/// Ordered bag of optional query parameters.
///
/// Setting the same name twice replaces the earlier value in place, so the
/// position of a parameter is fixed by its first declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    params: Vec<(String, String)>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, name: &str, value: impl ToString) -> Self {
        let value = value.to_string();
        match self.params.iter_mut().find(|(key, _)| key == name) {
            Some(existing) => existing.1 = value,
            None => self.params.push((name.to_string(), value)),
        }
        self
    }

    /// Comma-joined list value, e.g. `accounts=fred,bob`.
    pub fn list<I, S>(self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = values
            .into_iter()
            .map(|v| v.as_ref().to_string())
            .collect::<Vec<_>>()
            .join(",");
        self.param(name, joined)
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

macro_rules! typed_options {
    ($name:ident) => {
        #[derive(Debug, Clone, Default, PartialEq, Eq)]
        pub struct $name(QueryOptions);

        impl $name {
            pub fn new() -> Self {
                Self::default()
            }
        }

        impl From<$name> for QueryOptions {
            fn from(options: $name) -> Self {
                options.0
            }
        }
    };
}

typed_options!(ListOptions);
typed_options!(DeployVirtualMachineOptions);
typed_options!(UpdateIsoPermissionsOptions);
typed_options!(DeleteIsoOptions);

/// Filters accepted by the `list*` commands.
impl ListOptions {
    pub fn id(self, id: &str) -> Self {
        Self(self.0.param("id", id))
    }

    pub fn zone_id(self, zone_id: &str) -> Self {
        Self(self.0.param("zoneid", zone_id))
    }

    pub fn name(self, name: &str) -> Self {
        Self(self.0.param("name", name))
    }

    pub fn keyword(self, keyword: &str) -> Self {
        Self(self.0.param("keyword", keyword))
    }

    pub fn account_in_domain(self, account: &str, domain_id: &str) -> Self {
        Self(self.0.param("account", account).param("domainid", domain_id))
    }

    pub fn list_all(self, list_all: bool) -> Self {
        Self(self.0.param("listall", list_all))
    }
}

impl DeployVirtualMachineOptions {
    pub fn name(self, name: &str) -> Self {
        Self(self.0.param("name", name))
    }

    pub fn display_name(self, display_name: &str) -> Self {
        Self(self.0.param("displayname", display_name))
    }

    pub fn keypair(self, keypair: &str) -> Self {
        Self(self.0.param("keypair", keypair))
    }

    pub fn security_group_ids<I, S>(self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(self.0.list("securitygroupids", ids))
    }

    pub fn network_ids<I, S>(self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(self.0.list("networkids", ids))
    }

    pub fn ip_address(self, ip: &str) -> Self {
        Self(self.0.param("ipaddress", ip))
    }

    /// The API expects user data base64-encoded.
    pub fn user_data(self, data: &[u8]) -> Self {
        let encoded = base64::engine::general_purpose::STANDARD.encode(data);
        Self(self.0.param("userdata", encoded))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionOperation {
    Add,
    Remove,
    Reset,
}

impl PermissionOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionOperation::Add => "add",
            PermissionOperation::Remove => "remove",
            PermissionOperation::Reset => "reset",
        }
    }
}

impl UpdateIsoPermissionsOptions {
    pub fn accounts<I, S>(self, accounts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(self.0.list("accounts", accounts))
    }

    pub fn is_extractable(self, value: bool) -> Self {
        Self(self.0.param("isextractable", value))
    }

    pub fn is_featured(self, value: bool) -> Self {
        Self(self.0.param("isfeatured", value))
    }

    pub fn is_public(self, value: bool) -> Self {
        Self(self.0.param("ispublic", value))
    }

    pub fn operation(self, op: PermissionOperation) -> Self {
        Self(self.0.param("op", op.as_str()))
    }
}

impl DeleteIsoOptions {
    pub fn zone_id(self, zone_id: &str) -> Self {
        Self(self.0.param("zoneid", zone_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_keep_call_order() {
        let options = QueryOptions::new().param("zoneid", "5").param("name", "bob");
        assert_eq!(
            options.params(),
            &[
                ("zoneid".to_string(), "5".to_string()),
                ("name".to_string(), "bob".to_string())
            ]
        );
    }

    #[test]
    fn resetting_a_param_keeps_first_position() {
        let options = QueryOptions::new()
            .param("zoneid", "5")
            .param("name", "bob")
            .param("zoneid", "7");
        assert_eq!(options.params()[0], ("zoneid".to_string(), "7".to_string()));
        assert_eq!(options.params().len(), 2);
    }

    #[test]
    fn permissions_options_in_declared_order() {
        let options: QueryOptions = UpdateIsoPermissionsOptions::new()
            .accounts(["fred", "bob"])
            .is_extractable(true)
            .is_featured(true)
            .is_public(true)
            .operation(PermissionOperation::Add)
            .into();
        let names: Vec<_> = options.params().iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, vec!["accounts", "isextractable", "isfeatured", "ispublic", "op"]);
        assert_eq!(options.get("accounts"), Some("fred,bob"));
        assert_eq!(options.get("op"), Some("add"));
    }

    #[test]
    fn user_data_is_base64_encoded() {
        let options: QueryOptions = DeployVirtualMachineOptions::new()
            .user_data(b"#!/bin/sh\necho hi")
            .into();
        assert_eq!(options.get("userdata"), Some("IyEvYmluL3NoCmVjaG8gaGk="));
    }

    #[test]
    fn account_in_domain_sets_both() {
        let options: QueryOptions = ListOptions::new().account_in_domain("adrian", "6").into();
        assert_eq!(options.get("account"), Some("adrian"));
        assert_eq!(options.get("domainid"), Some("6"));
    }
}
