//! 検証済み claims からのロール抽出。

use serde_json::Value;

use crate::claims::Claims;

/// RoleSet は重複のないロール名の集合。挿入順を保持する。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleSet(Vec<String>);

impl RoleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// ロールを追加する。既に含まれていれば false を返す。
    pub fn insert(&mut self, role: impl Into<String>) -> bool {
        let role = role.into();
        if self.contains(&role) {
            return false;
        }
        self.0.push(role);
        true
    }

    pub fn contains(&self, role: &str) -> bool {
        self.0.iter().any(|r| r == role)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl<S: Into<String>> FromIterator<S> for RoleSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = Self::new();
        for role in iter {
            set.insert(role);
        }
        set
    }
}

impl<'a> IntoIterator for &'a RoleSet {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// `resource_access.<client_id>.roles` を読み出す。
///
/// `include_realm_roles` が true なら `realm_access.roles` も合算する。
/// claim の形が想定と異なる場合はエラーにせず、読めた分だけを返す。
pub fn extract_roles(claims: &Claims, client_id: &str, include_realm_roles: bool) -> RoleSet {
    let mut roles = RoleSet::new();

    let client_roles = claims
        .get("resource_access")
        .and_then(|access| access.get(client_id))
        .and_then(|client| client.get("roles"));
    collect(client_roles, &mut roles);

    if include_realm_roles {
        let realm_roles = claims
            .get("realm_access")
            .and_then(|access| access.get("roles"));
        collect(realm_roles, &mut roles);
    }

    roles
}

fn collect(value: Option<&Value>, roles: &mut RoleSet) {
    let Some(Value::Array(items)) = value else {
        return;
    };
    for item in items {
        match item {
            Value::String(role) => {
                roles.insert(role.as_str());
            }
            // null はロールとして扱わない
            Value::Null => {}
            other => {
                roles.insert(other.to_string());
            }
        }
    }
}
