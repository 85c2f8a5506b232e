//! Persisted installer records and their declared shapes.
//!
//! Every record is soft-deleted through `deleted_at`; rows are never removed
//! by this crate outside of versioned migration steps.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::entity::{Entity, EntityShape, FieldDecl, FieldKind, StorageType};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credential {
    pub id: String,
    pub secret: String,
    pub name: String,
    /// `aws` or `digital_ocean`.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, with = "time::serde::rfc3339::option", skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<OffsetDateTime>,
}

impl Entity for Credential {
    fn shape() -> EntityShape {
        EntityShape::new(
            "credential",
            vec![
                FieldDecl::text("id").indexed(),
                FieldDecl::text("secret"),
                FieldDecl::text("name"),
                FieldDecl::text("type"),
                FieldDecl::timestamp("deleted_at"),
            ],
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BaseCluster {
    pub id: String,
    #[serde(skip)]
    pub credential_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    /// `starting`, `error`, `running` or `deleting`.
    pub state: String,
    pub name: String,
    pub num_instances: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub controller_key: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub controller_pin: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub dashboard_login_token: String,
    pub domain: Option<Domain>,
    pub ca_cert: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ssh_key_name: String,
    #[serde(default, rename = "vpc_cidr_block", skip_serializing_if = "String::is_empty")]
    pub vpc_cidr: String,
    #[serde(default, rename = "subnet_cidr_block", skip_serializing_if = "String::is_empty")]
    pub subnet_cidr: String,
    pub discovery_token: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub instance_ips: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub dns_zone_id: String,
    #[serde(default, with = "time::serde::rfc3339::option", skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<OffsetDateTime>,
}

impl Entity for BaseCluster {
    fn shape() -> EntityShape {
        EntityShape::new(
            "base_cluster",
            vec![
                FieldDecl::text("id").indexed(),
                FieldDecl::text("credential_id"),
                FieldDecl::text("type"),
                FieldDecl::text("state").indexed(),
                FieldDecl::text("name").transient(),
                FieldDecl::integer("num_instances"),
                FieldDecl::text("controller_key"),
                FieldDecl::text("controller_pin"),
                FieldDecl::text("dashboard_login_token"),
                FieldDecl::new("domain", FieldKind::Reference("domain")).transient(),
                FieldDecl::text("ca_cert"),
                FieldDecl::text("ssh_key_name"),
                FieldDecl::text("vpc_cidr"),
                FieldDecl::text("subnet_cidr"),
                FieldDecl::text("discovery_token"),
                FieldDecl::new("instance_ips", FieldKind::List(StorageType::Text)).transient(),
                FieldDecl::text("dns_zone_id"),
                FieldDecl::timestamp("deleted_at"),
            ],
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AwsCluster {
    pub cluster_id: String,
    pub stack_id: String,
    pub stack_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image_id: String,
    pub region: String,
    pub instance_type: String,
    pub vpc_cidr: String,
    pub subnet_cidr: String,
    pub dns_zone_id: String,
    #[serde(default, with = "time::serde::rfc3339::option", skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<OffsetDateTime>,
}

impl Entity for AwsCluster {
    fn shape() -> EntityShape {
        EntityShape::new(
            "aws_cluster",
            vec![
                FieldDecl::text("cluster_id").indexed(),
                FieldDecl::text("stack_id"),
                FieldDecl::text("stack_name"),
                FieldDecl::text("image_id"),
                FieldDecl::text("region"),
                FieldDecl::text("instance_type"),
                FieldDecl::text("vpc_cidr"),
                FieldDecl::text("subnet_cidr"),
                FieldDecl::text("dns_zone_id"),
                FieldDecl::timestamp("deleted_at"),
            ],
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DigitalOceanCluster {
    pub cluster_id: String,
    pub region: String,
    #[serde(default, with = "time::serde::rfc3339::option", skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<OffsetDateTime>,
}

impl Entity for DigitalOceanCluster {
    fn shape() -> EntityShape {
        EntityShape::new(
            "digital_ocean_cluster",
            vec![
                FieldDecl::text("cluster_id").indexed(),
                FieldDecl::text("region"),
                FieldDecl::timestamp("deleted_at"),
            ],
        )
    }
}

/// One instance address of a cluster.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstanceIp {
    pub cluster_id: String,
    pub ip: String,
    #[serde(default, with = "time::serde::rfc3339::option", skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<OffsetDateTime>,
}

impl Entity for InstanceIp {
    fn shape() -> EntityShape {
        EntityShape::new(
            "instance_ip",
            vec![
                FieldDecl::text("cluster_id").indexed(),
                FieldDecl::text("ip"),
                FieldDecl::timestamp("deleted_at"),
            ],
        )
    }
}

/// Lifecycle event, linked to the prompt or other resource that caused it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Event {
    pub id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cluster_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<Box<BaseCluster>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, with = "time::serde::rfc3339::option", skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<OffsetDateTime>,
}

impl Entity for Event {
    fn shape() -> EntityShape {
        EntityShape::new(
            "event",
            vec![
                FieldDecl::text("id").indexed(),
                FieldDecl::timestamp("timestamp"),
                FieldDecl::text("type"),
                FieldDecl::text("cluster_id"),
                FieldDecl::new("cluster", FieldKind::Reference("base_cluster")).transient(),
                FieldDecl::text("resource_type"),
                FieldDecl::text("resource_id"),
                FieldDecl::text("description"),
                FieldDecl::timestamp("deleted_at"),
            ],
        )
    }
}

/// A question put to the operator during installation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Prompt {
    pub id: String,
    #[serde(default, rename = "type", skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default)]
    pub yes: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub input: String,
    #[serde(default)]
    pub resolved: bool,
    #[serde(default, with = "time::serde::rfc3339::option", skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<OffsetDateTime>,
}

impl Entity for Prompt {
    fn shape() -> EntityShape {
        EntityShape::new(
            "prompt",
            vec![
                FieldDecl::text("id"),
                FieldDecl::text("type"),
                FieldDecl::text("message"),
                FieldDecl::boolean("yes"),
                FieldDecl::text("input"),
                FieldDecl::boolean("resolved"),
                FieldDecl::timestamp("deleted_at"),
            ],
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Domain {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cluster_id: String,
    #[serde(rename = "domain")]
    pub name: String,
    pub token: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ca_cert: String,
    #[serde(default, with = "time::serde::rfc3339::option", skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<OffsetDateTime>,
}

impl Entity for Domain {
    fn shape() -> EntityShape {
        EntityShape::new(
            "domain",
            vec![
                FieldDecl::text("cluster_id").indexed(),
                FieldDecl::text("name"),
                FieldDecl::text("token"),
                FieldDecl::text("ca_cert"),
                FieldDecl::timestamp("deleted_at"),
            ],
        )
    }
}
