//! RBAC ゲート: 必須ロールがすべて付与されているかを判定する。

use crate::roles::RoleSet;

/// RequiredRoles はエンドポイントが要求するロールの集合。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequiredRoles(Vec<String>);

impl RequiredRoles {
    pub fn new<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut required: Vec<String> = Vec::new();
        for role in roles {
            let role = role.into();
            if !required.contains(&role) {
                required.push(role);
            }
        }
        Self(required)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Decision は認可判定の結果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    /// 不足しているロールを保持する（ログ専用）
    Deny { missing: Vec<String> },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// 必須ロールがすべて含まれていれば Allow を返す。空の要求は常に Allow。
pub fn authorize(roles: &RoleSet, required: &RequiredRoles) -> Decision {
    let missing: Vec<String> = required
        .0
        .iter()
        .filter(|role| !roles.contains(role))
        .cloned()
        .collect();

    if missing.is_empty() {
        Decision::Allow
    } else {
        Decision::Deny { missing }
    }
}
