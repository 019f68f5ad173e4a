use std::{fs, ops::RangeInclusive};

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;

#[derive(Parser, Debug, Clone, Deserialize)]
#[command(name = "roster")]
#[command(author, version, about, long_about = None)]
pub struct AppConfig {
    #[clap(long)]
    #[arg(short = 'c')]
    #[serde(default)]
    pub config: Option<String>,
    /// Directory server scheme and host, e.g. ldap://dir.example.com
    #[clap(long, env)]
    pub ldap_url: String,
    #[clap(long, env)]
    #[arg(default_value_t = 389)]
    #[serde(default = "default_ldap_port")]
    pub ldap_port: u16,
    #[clap(long, env)]
    pub base_dn: String,
    #[clap(long, env)]
    pub bind_dn: String,
    #[clap(long, env)]
    pub bind_passwd: String,
    #[clap(long, env)]
    #[arg(default_value_t = 30)]
    #[serde(default = "default_conn_timeout_secs")]
    pub conn_timeout_secs: u64,
    #[clap(long, env)]
    #[arg(default_value_t = String::from("roster_server=info"))]
    #[serde(default = "default_rust_log")]
    pub rust_log: String,
    #[clap(long, env)]
    #[arg(value_parser = port_in_range, short = 'p', default_value_t = 8081)]
    #[serde(default = "default_port")]
    pub port: u16,
    #[clap(long, env)]
    #[arg(default_value_t = String::from("*"))]
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
    #[clap(long, env)]
    #[arg(default_value_t = String::from("groupOfUniqueNames"))]
    #[serde(default = "default_group_object_class")]
    pub group_object_class: String,
    #[clap(long, env)]
    #[arg(default_value_t = String::from("uniqueMember"))]
    #[serde(default = "default_group_member_attribute")]
    pub group_member_attribute: String,
    #[clap(long, env)]
    #[arg(default_value_t = String::from("cn"))]
    #[serde(default = "default_cn")]
    pub group_name_attribute: String,
    #[clap(long, env)]
    #[arg(default_value_t = String::from("uid"))]
    #[serde(default = "default_uid")]
    pub user_id_attribute: String,
    #[clap(long, env)]
    #[arg(default_value_t = String::from("uid"))]
    #[serde(default = "default_uid")]
    pub attr_uid: String,
    #[clap(long, env)]
    #[arg(default_value_t = String::from("cn"))]
    #[serde(default = "default_cn")]
    pub attr_cn: String,
    #[clap(long, env)]
    #[arg(default_value_t = String::from("sn"))]
    #[serde(default = "default_attr_sn")]
    pub attr_sn: String,
    #[clap(long, env)]
    #[arg(default_value_t = String::from("givenName"))]
    #[serde(default = "default_attr_given_name")]
    pub attr_given_name: String,
    #[clap(long, env)]
    #[arg(default_value_t = String::from("displayName"))]
    #[serde(default = "default_attr_display_name")]
    pub attr_display_name: String,
    #[clap(long, env)]
    #[arg(default_value_t = String::from("mail"))]
    #[serde(default = "default_attr_mail")]
    pub attr_mail: String,
    #[clap(long, env)]
    #[arg(default_value_t = String::from("employeeNumber"))]
    #[serde(default = "default_attr_employee_number")]
    pub attr_employee_number: String,
    #[clap(long, env)]
    #[arg(default_value_t = String::from("memberOf"))]
    #[serde(default = "default_attr_member_of")]
    pub attr_member_of: String,
    #[clap(long, env)]
    #[arg(default_value_t = String::from("role"))]
    #[serde(default = "default_attr_role")]
    pub attr_role: String,
    #[clap(long, env)]
    #[arg(default_value_t = String::from("title"))]
    #[serde(default = "default_attr_title")]
    pub attr_title: String,
    #[clap(long, env)]
    #[arg(default_value_t = String::from("ou"))]
    #[serde(default = "default_attr_ou")]
    pub attr_ou: String,
    #[clap(long, env)]
    #[arg(default_value_t = String::from("o"))]
    #[serde(default = "default_attr_o")]
    pub attr_o: String,
}

fn default_ldap_port() -> u16 {
    389
}

fn default_conn_timeout_secs() -> u64 {
    30
}

fn default_rust_log() -> String {
    String::from("roster_server=info")
}

fn default_port() -> u16 {
    8081
}

fn default_cors_origin() -> String {
    String::from("*")
}

fn default_group_object_class() -> String {
    String::from("groupOfUniqueNames")
}

fn default_group_member_attribute() -> String {
    String::from("uniqueMember")
}

fn default_cn() -> String {
    String::from("cn")
}

fn default_uid() -> String {
    String::from("uid")
}

fn default_attr_sn() -> String {
    String::from("sn")
}

fn default_attr_given_name() -> String {
    String::from("givenName")
}

fn default_attr_display_name() -> String {
    String::from("displayName")
}

fn default_attr_mail() -> String {
    String::from("mail")
}

fn default_attr_employee_number() -> String {
    String::from("employeeNumber")
}

fn default_attr_member_of() -> String {
    String::from("memberOf")
}

fn default_attr_role() -> String {
    String::from("role")
}

fn default_attr_title() -> String {
    String::from("title")
}

fn default_attr_ou() -> String {
    String::from("ou")
}

fn default_attr_o() -> String {
    String::from("o")
}

const PORT_RANGE: RangeInclusive<usize> = 1..=65535;

fn port_in_range(s: &str) -> Result<u16, String> {
    let port: usize = s
        .parse()
        .map_err(|_| format!("`{s}` isn't a port number"))?;
    if PORT_RANGE.contains(&port) {
        Ok(port as u16)
    } else {
        Err(format!(
            "port not in range {}-{}",
            PORT_RANGE.start(),
            PORT_RANGE.end()
        ))
    }
}

pub fn load(cfg: &str) -> Result<AppConfig> {
    let content =
        fs::read_to_string(cfg).context("could not read config file")?;
    toml::from_str(&content).context("could not parse config file")
}
