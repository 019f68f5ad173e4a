use std::{ops::Deref, sync::Arc};

use anyhow::Result;
use axum::extract::{FromRef, FromRequestParts};
use http::request::Parts;
use tracing::info;

use roster_directory::{
    ldap::{LdapConfig, LdapImpl},
    user::AttributeNames,
};
use roster_slo::errors;

use crate::{services::users::GroupSchema, AppConfig};

pub struct App {
    pub config: AppConfig,
    pub store: Store,
    pub names: AttributeNames,
    pub schema: GroupSchema,
}

impl App {
    pub fn new(config: AppConfig) -> Result<Self> {
        info!("initializing directory client...");

        let store = Store::new(LdapConfig {
            url: config.ldap_url.clone(),
            port: config.ldap_port,
            base_dn: config.base_dn.clone(),
            bind_dn: config.bind_dn.clone(),
            bind_password: config.bind_passwd.clone(),
            conn_timeout_secs: config.conn_timeout_secs,
        });

        let names = AttributeNames {
            uid: config.attr_uid.clone(),
            cn: config.attr_cn.clone(),
            sn: config.attr_sn.clone(),
            given_name: config.attr_given_name.clone(),
            display_name: config.attr_display_name.clone(),
            mail: config.attr_mail.clone(),
            employee_number: config.attr_employee_number.clone(),
            member_of: config.attr_member_of.clone(),
            role: config.attr_role.clone(),
            title: config.attr_title.clone(),
            ou: config.attr_ou.clone(),
            o: config.attr_o.clone(),
        };

        let schema = GroupSchema {
            object_class: config.group_object_class.clone(),
            member_attribute: config.group_member_attribute.clone(),
            name_attribute: config.group_name_attribute.clone(),
            user_id_attribute: config.user_id_attribute.clone(),
        };

        info!("directory client successfully initialized!");
        Ok(Self {
            config,
            store,
            names,
            schema,
        })
    }
}

pub struct Store {
    pub directory: LdapImpl,
}

impl Store {
    pub fn new(config: LdapConfig) -> Self {
        Self {
            directory: LdapImpl::new(config),
        }
    }
}

#[derive(Clone)]
pub struct AppState(pub Arc<App>);

// deref so you can still access the inner fields easily
impl Deref for AppState {
    type Target = App;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S> FromRequestParts<S> for AppState
where
    Self: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = errors::WithBacktrace;
    async fn from_request_parts(
        _: &mut Parts,
        state: &S,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self::from_ref(state))
    }
}
