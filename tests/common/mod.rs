use std::{
	collections::HashMap,
	error::Error,
	sync::atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use ldap3::{LdapConnAsync, SearchEntry};
use ldap_user_object::{Directory, UserRecord};

/// An in-memory directory with two users, counting its user lookups.
#[derive(Debug, Default)]
pub struct StubDirectory {
	pub user_lookups: AtomicUsize,
	pub membership_lookups: AtomicUsize,
}

impl StubDirectory {
	pub fn user_lookups(&self) -> usize {
		self.user_lookups.load(Ordering::SeqCst)
	}
}

pub fn entry(dn: &str, cn: &str) -> SearchEntry {
	SearchEntry {
		dn: dn.to_owned(),
		attrs: HashMap::from([("cn".to_owned(), vec![cn.to_owned()])]),
		bin_attrs: HashMap::new(),
	}
}

fn group(cn: &str, dn_name: &str) -> SearchEntry {
	entry(&format!("CN={dn_name},CN=Users,DC=mediasuite,DC=local"), cn)
}

#[async_trait]
impl Directory for StubDirectory {
	async fn find_user(
		&self,
		username: &str,
	) -> Result<Option<UserRecord>, ldap_user_object::Error> {
		self.user_lookups.fetch_add(1, Ordering::SeqCst);
		match username {
			"andrew" | "sam" => Ok(Some(UserRecord {
				username: username.to_owned(),
				entry: entry(&format!("CN={username},CN=Users,DC=mediasuite,DC=local"), username),
			})),
			"broken" => Err(ldap_user_object::Error::Directory("connection refused".to_owned())),
			_ => Ok(None),
		}
	}

	async fn find_memberships(
		&self,
		user: &UserRecord,
		property: &str,
	) -> Result<Vec<SearchEntry>, ldap_user_object::Error> {
		self.membership_lookups.fetch_add(1, Ordering::SeqCst);
		Ok(match (user.username.as_str(), property) {
			("andrew", "groups" | "group") => {
				vec![group("group 1", "Group 1"), group("group 2", "Group 2")]
			}
			("sam", "groups" | "group") => vec![
				group("group 1", "Group 1"),
				group("group 3", "Group 3"),
				group("group 4", "Group 4"),
			],
			("sam", "departments") => vec![group("dept 1", "Dept 1")],
			_ => Vec::new(),
		})
	}
}

pub async fn ldap_add_organizational_unit(
	ldap: &mut ldap3::Ldap,
	ou: &str,
) -> Result<(), Box<dyn Error>> {
	ldap.add(
		&format!("ou={},dc=example,dc=org", ou),
		vec![("objectClass", ["organizationalUnit"].into())],
	)
	.await?
	.success()?;
	Ok(())
}

pub async fn ldap_delete_organizational_unit(
	ldap: &mut ldap3::Ldap,
	ou: &str,
) -> Result<(), Box<dyn Error>> {
	ldap.delete(&format!("ou={},dc=example,dc=org", ou)).await?.success()?;
	Ok(())
}

pub async fn ldap_connect() -> Result<ldap3::Ldap, Box<dyn Error>> {
	let (conn, mut ldap) = LdapConnAsync::new("ldap://localhost:1389").await?;
	let _handle = tokio::spawn(async move {
		if let Err(err) = conn.drive().await {
			panic!("Ldap connection error {err}");
		}
	});
	ldap.simple_bind("cn=admin,dc=example,dc=org", "adminpassword").await?;
	Ok(ldap)
}

pub async fn ldap_add_user(
	ldap: &mut ldap3::Ldap,
	cn: &str,
	sn: &str,
) -> Result<(), Box<dyn Error>> {
	ldap.add(
		&format!("cn={},ou=users,dc=example,dc=org", cn),
		vec![("objectClass", ["inetOrgPerson"].into()), ("sn", [sn].into())],
	)
	.await?
	.success()?;
	Ok(())
}

pub async fn ldap_delete_user(ldap: &mut ldap3::Ldap, cn: &str) -> Result<(), Box<dyn Error>> {
	ldap.delete(&format!("cn={},ou=users,dc=example,dc=org", cn)).await?.success()?;
	Ok(())
}

pub async fn ldap_add_group(
	ldap: &mut ldap3::Ldap,
	cn: &str,
	members: &[&str],
) -> Result<(), Box<dyn Error>> {
	let members: Vec<String> =
		members.iter().map(|member| format!("cn={},ou=users,dc=example,dc=org", member)).collect();
	ldap.add(
		&format!("cn={},ou=groups,dc=example,dc=org", cn),
		vec![
			("objectClass", ["groupOfNames"].into()),
			("member", members.iter().map(String::as_str).collect()),
		],
	)
	.await?
	.success()?;
	Ok(())
}

pub async fn ldap_delete_group(ldap: &mut ldap3::Ldap, cn: &str) -> Result<(), Box<dyn Error>> {
	ldap.delete(&format!("cn={},ou=groups,dc=example,dc=org", cn)).await?.success()?;
	Ok(())
}
