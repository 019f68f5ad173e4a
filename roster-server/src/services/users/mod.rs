use std::collections::HashSet;

use anyhow::anyhow;
use tracing::{debug, info, warn};

use roster_directory::{
    ldap::escape_filter_value,
    user::{map_entry, AttributeNames, User},
    Entry, Interface,
};
use roster_slo::{errors, Result};

/// Directory schema for group resolution: which object class groups
/// carry, which attribute names the group, which holds the member DNs,
/// and which attribute is the first RDN of a member DN.
#[derive(Debug, Clone)]
pub struct GroupSchema {
    pub object_class: String,
    pub member_attribute: String,
    pub name_attribute: String,
    pub user_id_attribute: String,
}

/// Resolves a role name to the full profiles of the matching group's
/// members.
///
/// Oversized groups are walked through the server's range-retrieval
/// mechanism: when a returned entry carries a `member;range=<start>-<end>`
/// marker, the group search is reissued requesting members from `end+1`
/// onward, until the marker disappears or its end bound is `*`.
pub async fn list_by_role<S: Interface>(
    store: &S,
    schema: &GroupSchema,
    names: &AttributeNames,
    role: &str,
) -> Result<Vec<User>> {
    info!("searching for users with role: {}", role);

    let mut users = Vec::new();
    let mut seen = HashSet::new();
    let mut offset = 0;
    loop {
        let filter = build_group_filter(schema, role, offset);
        debug!("executing group search with filter: {}", filter);
        let entries = store.search("", &filter).await.map_err(|err| {
            errors::anyhow(anyhow!(
                "error retrieving users for role {}: {}",
                role,
                err
            ))
        })?;

        let mut next_offset = None;
        for entry in &entries {
            for member_dn in member_values(entry, &schema.member_attribute) {
                let Some(id) =
                    extract_user_id(member_dn, &schema.user_id_attribute)
                else {
                    warn!(
                        "member dn without a {} component, skipping: {}",
                        schema.user_id_attribute, member_dn
                    );
                    continue;
                };
                if !seen.insert(id.to_owned()) {
                    continue;
                }
                match get_details(store, schema, names, id).await {
                    Ok(Some(user)) => {
                        debug!(
                            "found user details for {} in role {}",
                            id, role
                        );
                        users.push(user);
                    }
                    Ok(None) => {}
                    Err(err) => {
                        warn!("skipping member {} of role {}: {}", id, role, err);
                    }
                }
            }
            if next_offset.is_none() {
                next_offset =
                    next_range_offset(entry, &schema.member_attribute);
            }
        }

        match next_offset {
            Some(value) => offset = value,
            None => break,
        }
    }

    info!("found {} users with details for role {}", users.len(), role);
    Ok(users)
}

/// Fetches the full profile for one user id, `None` when the id does
/// not resolve to a directory entry.
pub async fn get_details<S: Interface>(
    store: &S,
    schema: &GroupSchema,
    names: &AttributeNames,
    id: &str,
) -> Result<Option<User>> {
    debug!(
        "searching for user details with {}: {}",
        schema.user_id_attribute, id
    );

    let filter = format!(
        "({}={})",
        schema.user_id_attribute,
        escape_filter_value(id)
    );
    let entries = store.search("", &filter).await.map_err(|err| {
        errors::anyhow(anyhow!(
            "error retrieving user details for {}: {}",
            id,
            err
        ))
    })?;

    match entries.first() {
        Some(entry) => Ok(Some(map_entry(entry, names))),
        None => {
            warn!("no user found with {}: {}", schema.user_id_attribute, id);
            Ok(None)
        }
    }
}

fn build_group_filter(
    schema: &GroupSchema,
    role: &str,
    offset: usize,
) -> String {
    let role = escape_filter_value(role);
    if offset > 0 {
        format!(
            "(&(objectClass={})({}={})({};range={}-*))",
            schema.object_class,
            schema.name_attribute,
            role,
            schema.member_attribute,
            offset,
        )
    } else {
        format!(
            "(&(objectClass={})({}={}))",
            schema.object_class, schema.name_attribute, role,
        )
    }
}

/// Member DN values of a group entry. On a ranged response the server
/// returns them under the ranged attribute name instead of the plain one.
fn member_values<'a>(entry: &'a Entry, member_attribute: &str) -> &'a [String] {
    if let Some(values) = entry.values(member_attribute) {
        return values;
    }
    entry
        .attr_starting_with(&format!("{};range", member_attribute))
        .and_then(|name| entry.values(name))
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Next range offset signaled by the entry's range marker, if any.
///
/// The marker is an attribute named `<member>;range=<start>-<end>`; both
/// bounds must parse for the walk to continue at `end+1`. The final page
/// carries `<start>-*`, which terminates.
fn next_range_offset(entry: &Entry, member_attribute: &str) -> Option<usize> {
    let name =
        entry.attr_starting_with(&format!("{};range", member_attribute))?;
    let range = name.split_once("range=")?.1;
    let (start, end) = range.split_once('-')?;
    start.parse::<usize>().ok()?;
    let end = end.parse::<usize>().ok()?;
    Some(end + 1)
}

/// Extracts the bare user id from a member DN, assuming the id attribute
/// is the first RDN component: the text after `<attr>=` up to the next
/// comma, or the rest of the string.
fn extract_user_id<'a>(dn: &'a str, id_attribute: &str) -> Option<&'a str> {
    let start = dn.find(&format!("{}=", id_attribute))?
        + id_attribute.len()
        + 1;
    let rest = &dn[start..];
    Some(match rest.find(',') {
        Some(end) => &rest[..end],
        None => rest,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    use async_trait::async_trait;
    use mockall::mock;

    mock! {
        pub DirStore {
            fn search(&self, base: &str, filter: &str) -> Result<Vec<Entry>>;
        }
    }

    #[async_trait]
    impl Interface for MockDirStore {
        async fn search(&self, base: &str, filter: &str) -> Result<Vec<Entry>> {
            self.search(base, filter)
        }
    }

    fn schema() -> GroupSchema {
        GroupSchema {
            object_class: "groupOfUniqueNames".to_owned(),
            member_attribute: "uniqueMember".to_owned(),
            name_attribute: "cn".to_owned(),
            user_id_attribute: "uid".to_owned(),
        }
    }

    fn group_entry(attr: &str, members: &[&str]) -> Entry {
        Entry {
            dn: "cn=ops,ou=groups,dc=example,dc=com".to_owned(),
            attrs: HashMap::from([(
                attr.to_owned(),
                members.iter().map(|dn| (*dn).to_owned()).collect(),
            )]),
        }
    }

    fn person_entry(uid: &str) -> Entry {
        Entry {
            dn: format!("uid={},ou=people,dc=example,dc=com", uid),
            attrs: HashMap::from([
                ("uid".to_owned(), vec![uid.to_owned()]),
                ("cn".to_owned(), vec![format!("User {}", uid)]),
            ]),
        }
    }

    fn person_for_filter(filter: &str) -> Vec<Entry> {
        let uid = filter
            .trim_start_matches("(uid=")
            .trim_end_matches(')');
        vec![person_entry(uid)]
    }

    #[tokio::test]
    async fn role_without_group_yields_empty_list() {
        let mut store = MockDirStore::new();
        store
            .expect_search()
            .times(1)
            .returning(|_, _| Ok(vec![]));

        let users = list_by_role(
            &store,
            &schema(),
            &AttributeNames::default(),
            "nobody",
        )
        .await
        .unwrap();
        assert!(users.is_empty());
    }

    #[tokio::test]
    async fn one_detail_lookup_per_member() {
        let mut store = MockDirStore::new();
        store
            .expect_search()
            .withf(|_, filter| filter.starts_with("(&(objectClass="))
            .times(1)
            .returning(|_, _| {
                Ok(vec![group_entry(
                    "uniqueMember",
                    &[
                        "uid=jdoe,ou=people,dc=example,dc=com",
                        "uid=asmith,ou=people,dc=example,dc=com",
                        "uid=ghost,ou=people,dc=example,dc=com",
                    ],
                )])
            });
        store
            .expect_search()
            .withf(|_, filter| filter == "(uid=ghost)")
            .times(1)
            .returning(|_, _| Ok(vec![]));
        store
            .expect_search()
            .withf(|_, filter| {
                filter.starts_with("(uid=") && filter != "(uid=ghost)"
            })
            .times(2)
            .returning(|_, filter| Ok(person_for_filter(filter)));

        let users = list_by_role(
            &store,
            &schema(),
            &AttributeNames::default(),
            "ops",
        )
        .await
        .unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].uid.as_deref(), Some("jdoe"));
        assert_eq!(users[1].uid.as_deref(), Some("asmith"));
    }

    #[tokio::test]
    async fn range_marker_drives_second_group_search() {
        let mut store = MockDirStore::new();
        store
            .expect_search()
            .withf(|_, filter| {
                filter == "(&(objectClass=groupOfUniqueNames)(cn=ops))"
            })
            .times(1)
            .returning(|_, _| {
                Ok(vec![group_entry(
                    "uniqueMember;range=0-999",
                    &["uid=jdoe,ou=people,dc=example,dc=com"],
                )])
            });
        store
            .expect_search()
            .withf(|_, filter| {
                filter == "(&(objectClass=groupOfUniqueNames)(cn=ops)(uniqueMember;range=1000-*))"
            })
            .times(1)
            .returning(|_, _| {
                Ok(vec![group_entry(
                    "uniqueMember",
                    &["uid=asmith,ou=people,dc=example,dc=com"],
                )])
            });
        store
            .expect_search()
            .withf(|_, filter| filter.starts_with("(uid="))
            .times(2)
            .returning(|_, filter| Ok(person_for_filter(filter)));

        let users = list_by_role(
            &store,
            &schema(),
            &AttributeNames::default(),
            "ops",
        )
        .await
        .unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].uid.as_deref(), Some("jdoe"));
        assert_eq!(users[1].uid.as_deref(), Some("asmith"));
    }

    #[tokio::test]
    async fn terminal_range_marker_stops_the_walk() {
        let mut store = MockDirStore::new();
        store
            .expect_search()
            .withf(|_, filter| filter.starts_with("(&(objectClass="))
            .times(2)
            .returning(|_, filter| {
                if filter.contains(";range=") {
                    Ok(vec![group_entry(
                        "uniqueMember;range=1000-*",
                        &["uid=asmith,ou=people,dc=example,dc=com"],
                    )])
                } else {
                    Ok(vec![group_entry(
                        "uniqueMember;range=0-999",
                        &["uid=jdoe,ou=people,dc=example,dc=com"],
                    )])
                }
            });
        store
            .expect_search()
            .withf(|_, filter| filter.starts_with("(uid="))
            .times(2)
            .returning(|_, filter| Ok(person_for_filter(filter)));

        let users = list_by_role(
            &store,
            &schema(),
            &AttributeNames::default(),
            "ops",
        )
        .await
        .unwrap();
        assert_eq!(users.len(), 2);
    }

    #[tokio::test]
    async fn duplicate_member_ids_resolve_once() {
        let mut store = MockDirStore::new();
        store
            .expect_search()
            .withf(|_, filter| filter.starts_with("(&(objectClass="))
            .times(1)
            .returning(|_, _| {
                Ok(vec![group_entry(
                    "uniqueMember",
                    &[
                        "uid=jdoe,ou=people,dc=example,dc=com",
                        "uid=jdoe,ou=contractors,dc=example,dc=com",
                    ],
                )])
            });
        store
            .expect_search()
            .withf(|_, filter| filter.starts_with("(uid="))
            .times(1)
            .returning(|_, filter| Ok(person_for_filter(filter)));

        let users = list_by_role(
            &store,
            &schema(),
            &AttributeNames::default(),
            "ops",
        )
        .await
        .unwrap();
        assert_eq!(users.len(), 1);
    }

    #[tokio::test]
    async fn failing_member_lookup_omits_only_that_member() {
        let mut store = MockDirStore::new();
        store
            .expect_search()
            .withf(|_, filter| filter.starts_with("(&(objectClass="))
            .times(1)
            .returning(|_, _| {
                Ok(vec![group_entry(
                    "uniqueMember",
                    &[
                        "uid=jdoe,ou=people,dc=example,dc=com",
                        "uid=asmith,ou=people,dc=example,dc=com",
                    ],
                )])
            });
        store
            .expect_search()
            .withf(|_, filter| filter == "(uid=jdoe)")
            .times(1)
            .returning(|_, _| {
                Err(errors::anyhow(anyhow!("directory unavailable")))
            });
        store
            .expect_search()
            .withf(|_, filter| filter == "(uid=asmith)")
            .times(1)
            .returning(|_, filter| Ok(person_for_filter(filter)));

        let users = list_by_role(
            &store,
            &schema(),
            &AttributeNames::default(),
            "ops",
        )
        .await
        .unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].uid.as_deref(), Some("asmith"));
    }

    #[tokio::test]
    async fn failing_group_search_fails_the_request() {
        let mut store = MockDirStore::new();
        store.expect_search().times(1).returning(|_, _| {
            Err(errors::anyhow(anyhow!("directory unavailable")))
        });

        let err = list_by_role(
            &store,
            &schema(),
            &AttributeNames::default(),
            "ops",
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("role ops"));
    }

    #[tokio::test]
    async fn get_details_returns_first_match() {
        let mut store = MockDirStore::new();
        store
            .expect_search()
            .withf(|_, filter| filter == "(uid=jdoe)")
            .times(1)
            .returning(|_, filter| Ok(person_for_filter(filter)));

        let user = get_details(
            &store,
            &schema(),
            &AttributeNames::default(),
            "jdoe",
        )
        .await
        .unwrap();
        assert_eq!(user.unwrap().uid.as_deref(), Some("jdoe"));
    }

    #[tokio::test]
    async fn get_details_for_unknown_id_is_absent_not_error() {
        let mut store = MockDirStore::new();
        store
            .expect_search()
            .times(1)
            .returning(|_, _| Ok(vec![]));

        let user = get_details(
            &store,
            &schema(),
            &AttributeNames::default(),
            "nobody",
        )
        .await
        .unwrap();
        assert!(user.is_none());
    }

    #[test]
    fn group_filter_shapes() {
        assert_eq!(
            build_group_filter(&schema(), "ops", 0),
            "(&(objectClass=groupOfUniqueNames)(cn=ops))"
        );
        assert_eq!(
            build_group_filter(&schema(), "ops", 1500),
            "(&(objectClass=groupOfUniqueNames)(cn=ops)(uniqueMember;range=1500-*))"
        );
        assert_eq!(
            build_group_filter(&schema(), "op(s)", 0),
            "(&(objectClass=groupOfUniqueNames)(cn=op\\28s\\29))"
        );
    }

    #[test]
    fn user_id_extraction() {
        assert_eq!(
            extract_user_id("uid=jdoe,ou=people,dc=example,dc=com", "uid"),
            Some("jdoe")
        );
        assert_eq!(extract_user_id("uid=jdoe", "uid"), Some("jdoe"));
        assert_eq!(
            extract_user_id("cn=Jane Doe,ou=people,dc=example,dc=com", "uid"),
            None
        );
    }

    #[test]
    fn range_offset_parsing() {
        let marked = group_entry("uniqueMember;range=0-999", &[]);
        assert_eq!(next_range_offset(&marked, "uniqueMember"), Some(1000));

        let terminal = group_entry("uniqueMember;range=1000-*", &[]);
        assert_eq!(next_range_offset(&terminal, "uniqueMember"), None);

        let malformed = group_entry("uniqueMember;range=abc-def", &[]);
        assert_eq!(next_range_offset(&malformed, "uniqueMember"), None);

        let plain = group_entry("uniqueMember", &[]);
        assert_eq!(next_range_offset(&plain, "uniqueMember"), None);
    }

    #[test]
    fn member_values_reads_plain_and_ranged_names() {
        let plain = group_entry(
            "uniqueMember",
            &["uid=jdoe,ou=people,dc=example,dc=com"],
        );
        assert_eq!(member_values(&plain, "uniqueMember").len(), 1);

        let ranged = group_entry(
            "uniqueMember;range=0-999",
            &["uid=jdoe,ou=people,dc=example,dc=com"],
        );
        assert_eq!(member_values(&ranged, "uniqueMember").len(), 1);

        let empty = Entry::default();
        assert!(member_values(&empty, "uniqueMember").is_empty());
    }
}
