//! Access control: users, groups and resource pools.
//!
//! All mutating calls are independent remote operations — "create group
//! then add members" is a sequence, not a transaction, and a partial
//! failure leaves the group present with the members added so far. The
//! caller reports which steps failed.

use crate::api::ProxmoxApi;
use crate::error::{ProxmoxError, ProxmoxResult};
use crate::types::{GroupInfo, PoolInfo, UserConfig, UserDetails};

/// User / group / pool operations backed by `ProxmoxApi`.
pub struct AccessManager<'a> {
    api: &'a ProxmoxApi,
}

impl<'a> AccessManager<'a> {
    pub fn new(api: &'a ProxmoxApi) -> Self {
        Self { api }
    }

    // ── Users ───────────────────────────────────────────────────────

    /// List all user ids (`name@realm`).
    pub async fn list_user_ids(&self) -> ProxmoxResult<Vec<String>> {
        let users: Vec<UserDetails> = self.api.get("/api2/json/access/users").await?;
        Ok(users.into_iter().filter_map(|u| u.userid).collect())
    }

    /// Full record for one user.
    pub async fn get_user(&self, userid: &str) -> ProxmoxResult<UserDetails> {
        require_id(userid, "user id")?;
        self.api.get(&format!("/api2/json/access/users/{userid}")).await
    }

    /// Create a user with the supplied sparse attributes.
    pub async fn create_user(&self, userid: &str, config: &UserConfig) -> ProxmoxResult<()> {
        require_id(userid, "user id")?;
        let mut params = vec![("userid".to_string(), userid.to_string())];
        params.extend(user_config_params(config));
        self.api.post_form("/api2/json/access/users", &params).await
    }

    /// Update a user; only the supplied attributes are transmitted.
    pub async fn update_user(&self, userid: &str, config: &UserConfig) -> ProxmoxResult<()> {
        require_id(userid, "user id")?;
        let params = user_config_params(config);
        self.api
            .put_form(&format!("/api2/json/access/users/{userid}"), &params)
            .await
    }

    pub async fn delete_user(&self, userid: &str) -> ProxmoxResult<()> {
        require_id(userid, "user id")?;
        self.api.delete(&format!("/api2/json/access/users/{userid}")).await
    }

    // ── Groups ──────────────────────────────────────────────────────

    pub async fn list_groups(&self) -> ProxmoxResult<Vec<GroupInfo>> {
        self.api.get("/api2/json/access/groups").await
    }

    pub async fn get_group(&self, groupid: &str) -> ProxmoxResult<GroupInfo> {
        require_id(groupid, "group id")?;
        self.api.get(&format!("/api2/json/access/groups/{groupid}")).await
    }

    pub async fn create_group(&self, groupid: &str, comment: Option<&str>) -> ProxmoxResult<()> {
        require_id(groupid, "group id")?;
        let mut params = vec![("groupid".to_string(), groupid.to_string())];
        if let Some(comment) = comment.filter(|c| !c.is_empty()) {
            params.push(("comment".to_string(), comment.to_string()));
        }
        self.api.post_form("/api2/json/access/groups", &params).await
    }

    /// Update a group's comment and/or member set. The member list
    /// replaces the stored one wholesale (comma-joined on the wire).
    pub async fn update_group(
        &self,
        groupid: &str,
        comment: Option<&str>,
        members: Option<&[String]>,
    ) -> ProxmoxResult<()> {
        require_id(groupid, "group id")?;
        let mut params = Vec::new();
        if let Some(comment) = comment {
            params.push(("comment".to_string(), comment.to_string()));
        }
        if let Some(members) = members {
            params.push(("users".to_string(), members.join(",")));
        }
        self.api
            .put_form(&format!("/api2/json/access/groups/{groupid}"), &params)
            .await
    }

    pub async fn delete_group(&self, groupid: &str) -> ProxmoxResult<()> {
        require_id(groupid, "group id")?;
        self.api.delete(&format!("/api2/json/access/groups/{groupid}")).await
    }

    // ── Pools ───────────────────────────────────────────────────────

    pub async fn list_pools(&self) -> ProxmoxResult<Vec<PoolInfo>> {
        self.api.get("/api2/json/pools").await
    }

    pub async fn get_pool(&self, poolid: &str) -> ProxmoxResult<PoolInfo> {
        require_id(poolid, "pool id")?;
        self.api.get(&format!("/api2/json/pools/{poolid}")).await
    }

    pub async fn create_pool(&self, poolid: &str, comment: Option<&str>) -> ProxmoxResult<()> {
        require_id(poolid, "pool id")?;
        let mut params = vec![("poolid".to_string(), poolid.to_string())];
        if let Some(comment) = comment.filter(|c| !c.is_empty()) {
            params.push(("comment".to_string(), comment.to_string()));
        }
        self.api.post_form("/api2/json/pools", &params).await
    }

    /// Add or remove pool members. `vms` and `storage` name the members
    /// to attach (or detach when `delete_members` is set).
    pub async fn update_pool(
        &self,
        poolid: &str,
        comment: Option<&str>,
        vms: Option<&[u32]>,
        storage: Option<&[String]>,
        delete_members: bool,
    ) -> ProxmoxResult<()> {
        require_id(poolid, "pool id")?;
        let mut params = Vec::new();
        if let Some(comment) = comment {
            params.push(("comment".to_string(), comment.to_string()));
        }
        if let Some(vms) = vms.filter(|v| !v.is_empty()) {
            let joined = vms.iter().map(u32::to_string).collect::<Vec<_>>().join(",");
            params.push(("vms".to_string(), joined));
        }
        if let Some(storage) = storage.filter(|s| !s.is_empty()) {
            params.push(("storage".to_string(), storage.join(",")));
        }
        if delete_members {
            params.push(("delete".to_string(), "1".to_string()));
        }
        self.api
            .put_form(&format!("/api2/json/pools/{poolid}"), &params)
            .await
    }

    pub async fn delete_pool(&self, poolid: &str) -> ProxmoxResult<()> {
        require_id(poolid, "pool id")?;
        self.api.delete(&format!("/api2/json/pools/{poolid}")).await
    }
}

fn require_id(id: &str, what: &str) -> ProxmoxResult<()> {
    if id.trim().is_empty() {
        return Err(ProxmoxError::argument(format!("{what} cannot be empty")));
    }
    Ok(())
}

/// Serialize only the supplied user attributes into form parameters.
pub(crate) fn user_config_params(config: &UserConfig) -> Vec<(String, String)> {
    let mut params = Vec::new();

    if let Some(comment) = config.comment.as_deref().filter(|v| !v.is_empty()) {
        params.push(("comment".to_string(), comment.to_string()));
    }
    if let Some(email) = config.email.as_deref().filter(|v| !v.is_empty()) {
        params.push(("email".to_string(), email.to_string()));
    }
    if let Some(enable) = config.enable {
        params.push(("enable".to_string(), if enable { "1" } else { "0" }.to_string()));
    }
    if let Some(expire) = config.expire {
        params.push(("expire".to_string(), expire.to_string()));
    }
    if let Some(firstname) = config.firstname.as_deref().filter(|v| !v.is_empty()) {
        params.push(("firstname".to_string(), firstname.to_string()));
    }
    if !config.groups.is_empty() {
        params.push(("groups".to_string(), config.groups.join(",")));
    }
    if let Some(keys) = config.keys.as_deref().filter(|v| !v.is_empty()) {
        params.push(("keys".to_string(), keys.to_string()));
    }
    if let Some(lastname) = config.lastname.as_deref().filter(|v| !v.is_empty()) {
        params.push(("lastname".to_string(), lastname.to_string()));
    }
    if let Some(password) = config.password.as_deref().filter(|v| !v.is_empty()) {
        params.push(("password".to_string(), password.to_string()));
    }

    params
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_config_params_are_sparse() {
        let config = UserConfig {
            email: Some("ops@lab.local".into()),
            enable: Some(true),
            groups: vec!["admins".into(), "ops".into()],
            ..UserConfig::default()
        };
        let params = user_config_params(&config);
        assert_eq!(
            params,
            vec![
                ("email".to_string(), "ops@lab.local".to_string()),
                ("enable".to_string(), "1".to_string()),
                ("groups".to_string(), "admins,ops".to_string()),
            ]
        );
    }

    #[test]
    fn user_config_params_empty_for_default() {
        assert!(user_config_params(&UserConfig::default()).is_empty());
    }

    #[test]
    fn user_config_enable_false_serializes_as_zero() {
        let config = UserConfig {
            enable: Some(false),
            ..UserConfig::default()
        };
        assert_eq!(
            user_config_params(&config),
            vec![("enable".to_string(), "0".to_string())]
        );
    }

    #[tokio::test]
    async fn empty_ids_fail_fast() {
        let cfg = crate::types::ProxmoxConfig {
            api_url: "https://127.0.0.1:1".into(),
            username: "root".into(),
            password: "s".into(),
            realm: "pam".into(),
            timeout_secs: 1,
        };
        let api = ProxmoxApi::new(&cfg).unwrap();
        let access = AccessManager::new(&api);
        assert!(matches!(
            access.delete_user("").await.unwrap_err(),
            ProxmoxError::Argument(_)
        ));
        assert!(matches!(
            access.get_group("  ").await.unwrap_err(),
            ProxmoxError::Argument(_)
        ));
        assert!(matches!(
            access.create_pool("", None).await.unwrap_err(),
            ProxmoxError::Argument(_)
        ));
    }
}
