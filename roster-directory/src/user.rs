use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::Entry;

/// Directory user profile. Every field is optional: an absent attribute
/// leaves the field unset, never an error.
#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employee_number: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub member_of: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ou: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub o: Option<String>,
}

/// Directory attribute name for each mapped profile field. Defaults
/// follow the standard inetOrgPerson schema.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeNames {
    pub uid: String,
    pub cn: String,
    pub sn: String,
    pub given_name: String,
    pub display_name: String,
    pub mail: String,
    pub employee_number: String,
    pub member_of: String,
    pub role: String,
    pub title: String,
    pub ou: String,
    pub o: String,
}

impl Default for AttributeNames {
    fn default() -> Self {
        Self {
            uid: "uid".to_owned(),
            cn: "cn".to_owned(),
            sn: "sn".to_owned(),
            given_name: "givenName".to_owned(),
            display_name: "displayName".to_owned(),
            mail: "mail".to_owned(),
            employee_number: "employeeNumber".to_owned(),
            member_of: "memberOf".to_owned(),
            role: "role".to_owned(),
            title: "title".to_owned(),
            ou: "ou".to_owned(),
            o: "o".to_owned(),
        }
    }
}

/// Maps a directory entry to a profile. Total: missing attributes leave
/// fields unset. Single-valued attributes read their first value; the
/// membership attribute flattens all values in order.
pub fn map_entry(entry: &Entry, names: &AttributeNames) -> User {
    User {
        uid: entry.single(&names.uid).map(ToOwned::to_owned),
        cn: entry.single(&names.cn).map(ToOwned::to_owned),
        sn: entry.single(&names.sn).map(ToOwned::to_owned),
        given_name: entry.single(&names.given_name).map(ToOwned::to_owned),
        display_name: entry.single(&names.display_name).map(ToOwned::to_owned),
        mail: entry.single(&names.mail).map(ToOwned::to_owned),
        employee_number: entry
            .single(&names.employee_number)
            .map(ToOwned::to_owned),
        member_of: entry
            .values(&names.member_of)
            .map(|values| values.to_vec())
            .unwrap_or_default(),
        role: entry.single(&names.role).map(ToOwned::to_owned),
        title: entry.single(&names.title).map(ToOwned::to_owned),
        ou: entry.single(&names.ou).map(ToOwned::to_owned),
        o: entry.single(&names.o).map(ToOwned::to_owned),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn map_entry_is_total_on_empty_entry() {
        let entry = Entry::default();
        let user = map_entry(&entry, &AttributeNames::default());
        assert_eq!(user, User::default());
    }

    #[test]
    fn map_entry_copies_present_attributes() {
        let entry = Entry {
            dn: "uid=jdoe,ou=people,dc=example,dc=com".to_owned(),
            attrs: HashMap::from([
                ("uid".to_owned(), vec!["jdoe".to_owned()]),
                ("sn".to_owned(), vec!["Doe".to_owned()]),
                ("title".to_owned(), vec!["Analyst".to_owned()]),
                (
                    "memberOf".to_owned(),
                    vec![
                        "cn=ops,ou=groups,dc=example,dc=com".to_owned(),
                        "cn=audit,ou=groups,dc=example,dc=com".to_owned(),
                    ],
                ),
            ]),
        };
        let user = map_entry(&entry, &AttributeNames::default());
        assert_eq!(user.uid.as_deref(), Some("jdoe"));
        assert_eq!(user.sn.as_deref(), Some("Doe"));
        assert_eq!(user.title.as_deref(), Some("Analyst"));
        assert_eq!(user.member_of.len(), 2);
        assert_eq!(
            user.member_of[0],
            "cn=ops,ou=groups,dc=example,dc=com"
        );
        assert_eq!(user.mail, None);
    }

    #[test]
    fn map_entry_honors_custom_attribute_names() {
        let entry = Entry {
            dn: "sAMAccountName=jdoe,ou=people,dc=example,dc=com".to_owned(),
            attrs: HashMap::from([(
                "sAMAccountName".to_owned(),
                vec!["jdoe".to_owned()],
            )]),
        };
        let names = AttributeNames {
            uid: "sAMAccountName".to_owned(),
            ..Default::default()
        };
        let user = map_entry(&entry, &names);
        assert_eq!(user.uid.as_deref(), Some("jdoe"));
    }

    #[test]
    fn serializes_camel_case_and_skips_unset_fields() {
        let user = User {
            uid: Some("jdoe".to_owned()),
            given_name: Some("Jane".to_owned()),
            member_of: vec!["cn=ops,ou=groups,dc=example,dc=com".to_owned()],
            ..Default::default()
        };
        let value = serde_json::to_value(&user).unwrap();
        assert_eq!(value["uid"], "jdoe");
        assert_eq!(value["givenName"], "Jane");
        assert_eq!(value["memberOf"][0], "cn=ops,ou=groups,dc=example,dc=com");
        assert!(value.get("mail").is_none());
        assert!(value.get("employeeNumber").is_none());
    }
}
