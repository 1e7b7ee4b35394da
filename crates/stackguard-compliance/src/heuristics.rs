//! Property checks used by the control catalog
//!
//! Providers and discovery tools record the same property in different
//! places, so each check accepts any of several signals: a metadata flag, a
//! relationship edge, a neighbouring resource, or a tag.

use serde_json::Value;

use crate::ControlEvaluationContext;

/// Tags every resource is expected to carry
pub const REQUIRED_TAGS: &[&str] = &["owner", "environment"];

/// Encryption at rest
pub fn has_encryption(ctx: &ControlEvaluationContext) -> bool {
    flag(
        ctx,
        &[
            "encrypted",
            "encryption_enabled",
            "encryptionEnabled",
            "storage_encrypted",
            "storageEncrypted",
            "server_side_encryption",
            "serverSideEncryption",
        ],
    ) || present(ctx, &["kms_key_id", "kmsKeyId", "encryption_key"])
        || ctx.has_edge("encrypted-by")
        || ctx.has_edge("uses-kms-key")
        || tag_in(ctx, "encryption", &["enabled", "true", "aes256", "kms"])
}

/// Private network placement or restrictive network boundary
pub fn has_network_isolation(ctx: &ControlEvaluationContext) -> bool {
    if flag(ctx, &["publicly_accessible", "publiclyAccessible", "public"]) {
        return false;
    }
    flag(ctx, &["private", "in_vpc", "inVpc", "private_endpoint"])
        || present(ctx, &["vpc_id", "vpcId", "subnet_id", "subnetId"])
        || ctx.has_edge("in-vpc")
        || ctx.has_edge("in-subnet")
        || ctx.has_edge("protected-by")
        || tag_in(ctx, "network", &["private", "isolated"])
}

/// Access or audit logging
pub fn has_logging(ctx: &ControlEvaluationContext) -> bool {
    flag(
        ctx,
        &[
            "logging_enabled",
            "loggingEnabled",
            "access_logging",
            "accessLogging",
            "audit_logging",
            "auditLogging",
            "flow_logs_enabled",
        ],
    ) || present(ctx, &["log_group", "logGroup", "logging_target"])
        || ctx.has_edge("logs-to")
        || ctx.has_neighbor_type("log_group")
        || ctx.has_neighbor_type("trail")
        || tag_in(ctx, "logging", &["enabled", "true"])
}

/// Backups or point-in-time recovery
pub fn has_backup(ctx: &ControlEvaluationContext) -> bool {
    flag(
        ctx,
        &[
            "backup_enabled",
            "backupEnabled",
            "point_in_time_recovery",
            "pointInTimeRecovery",
        ],
    ) || number(ctx, &["backup_retention_days", "backupRetentionPeriod"]).is_some_and(|days| days > 0.0)
        || ctx.has_edge("backed-up-by")
        || ctx.has_neighbor_type("backup")
        || ctx
            .tag("backup")
            .is_some_and(|v| !matches!(v.to_ascii_lowercase().as_str(), "" | "none" | "false" | "disabled"))
}

/// Metrics, alarms, or detailed monitoring
pub fn has_monitoring(ctx: &ControlEvaluationContext) -> bool {
    flag(
        ctx,
        &[
            "monitoring_enabled",
            "monitoringEnabled",
            "detailed_monitoring",
            "detailedMonitoring",
        ],
    ) || present(ctx, &["alarms", "monitoring_role"])
        || ctx.has_edge("monitored-by")
        || ctx.has_neighbor_type("alarm")
        || tag_in(ctx, "monitoring", &["enabled", "true"])
}

/// Every tag in `required` is present and non-empty
pub fn has_required_tags(ctx: &ControlEvaluationContext, required: &[&str]) -> bool {
    required.iter().all(|t| ctx.tag(t).is_some_and(|v| !v.trim().is_empty()))
}

/// Some, but not all, of `required` are present
pub fn has_some_required_tags(ctx: &ControlEvaluationContext, required: &[&str]) -> bool {
    required.iter().any(|t| ctx.tag(t).is_some_and(|v| !v.trim().is_empty()))
}

/// An access policy, role binding, or guarding security group
pub fn has_access_control(ctx: &ControlEvaluationContext) -> bool {
    flag(ctx, &["rbac_enabled", "rbacEnabled", "iam_auth", "iamDatabaseAuthentication"])
        || present(ctx, &["iam_policy", "iamPolicy", "access_policy", "accessPolicy", "bucket_policy"])
        || ctx.has_edge("has-policy")
        || ctx.has_edge("has-role")
        || ctx.has_edge("assumes-role")
        || ctx.has_edge("protected-by")
        || tag_in(ctx, "access", &["restricted", "private"])
}

/// Redundancy across zones or replicas
pub fn has_high_availability(ctx: &ControlEvaluationContext) -> bool {
    flag(ctx, &["multi_az", "multiAz", "zone_redundant", "zoneRedundant"])
        || number(ctx, &["replicas", "replica_count", "min_size"]).is_some_and(|n| n >= 2.0)
        || ctx.has_edge("replicates-to")
        || tag_in(ctx, "ha", &["true", "enabled"])
}

/// Object versioning
pub fn has_versioning(ctx: &ControlEvaluationContext) -> bool {
    flag(ctx, &["versioning_enabled", "versioningEnabled", "versioning"])
        || tag_in(ctx, "versioning", &["enabled", "true"])
}

/// MFA, SSO, or a strong password policy
pub fn has_strong_authentication(ctx: &ControlEvaluationContext) -> bool {
    flag(ctx, &["mfa_enabled", "mfaEnabled", "mfa", "sso_enabled", "ssoEnabled"])
        || number(ctx, &["password_min_length", "minimumPasswordLength"]).is_some_and(|n| n >= 14.0)
        || ctx.has_edge("authenticates-via")
        || tag_in(ctx, "mfa", &["enabled", "true", "required"])
}

/// Any key holds a truthy value (`true`, `"enabled"`, non-zero, ...)
fn flag(ctx: &ControlEvaluationContext, keys: &[&str]) -> bool {
    keys.iter().filter_map(|k| ctx.metadata.get(*k)).any(truthy)
}

/// Any key holds something other than null, false, or an empty value
fn present(ctx: &ControlEvaluationContext, keys: &[&str]) -> bool {
    keys.iter().filter_map(|k| ctx.metadata.get(*k)).any(|v| match v {
        Value::Null | Value::Bool(false) => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        _ => true,
    })
}

fn number(ctx: &ControlEvaluationContext, keys: &[&str]) -> Option<f64> {
    keys.iter().filter_map(|k| ctx.metadata.get(*k)).find_map(|v| match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "true" | "yes" | "enabled" | "on"
        ),
        _ => false,
    }
}

fn tag_in(ctx: &ControlEvaluationContext, key: &str, accepted: &[&str]) -> bool {
    ctx.tag(key)
        .is_some_and(|v| accepted.iter().any(|a| a.eq_ignore_ascii_case(v.trim())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackguard_core::{Edge, Resource};

    fn ctx(resource: Resource) -> ControlEvaluationContext {
        ControlEvaluationContext::new(resource)
    }

    #[test]
    fn test_encryption_signals() {
        let bare = ctx(Resource::new("b", "s3_bucket", "aws"));
        assert!(!has_encryption(&bare));

        assert!(has_encryption(&ctx(
            Resource::new("b", "s3_bucket", "aws").with_metadata("encrypted", true)
        )));
        assert!(has_encryption(&ctx(
            Resource::new("b", "s3_bucket", "aws").with_metadata("serverSideEncryption", "Enabled")
        )));
        assert!(has_encryption(&ctx(
            Resource::new("d", "rds_instance", "aws").with_metadata("kms_key_id", "arn:aws:kms:key/1")
        )));
        assert!(has_encryption(&ctx(
            Resource::new("b", "s3_bucket", "aws").with_tag("encryption", "AES256")
        )));

        let with_edge = ctx(Resource::new("b", "s3_bucket", "aws"))
            .with_relationships(vec![Edge::new("b", "k", "ENCRYPTED_BY")], Vec::new());
        assert!(has_encryption(&with_edge));

        assert!(!has_encryption(&ctx(
            Resource::new("b", "s3_bucket", "aws").with_metadata("encrypted", false)
        )));
    }

    #[test]
    fn test_public_resource_is_not_isolated() {
        let public_in_vpc = Resource::new("db", "rds_instance", "aws")
            .with_metadata("vpc_id", "vpc-1")
            .with_metadata("publicly_accessible", true);
        assert!(!has_network_isolation(&ctx(public_in_vpc)));

        let private = Resource::new("db", "rds_instance", "aws").with_metadata("vpc_id", "vpc-1");
        assert!(has_network_isolation(&ctx(private)));
    }

    #[test]
    fn test_numeric_signals() {
        let backed_up = Resource::new("db", "rds_instance", "aws").with_metadata("backup_retention_days", 7);
        assert!(has_backup(&ctx(backed_up)));

        let no_retention = Resource::new("db", "rds_instance", "aws").with_metadata("backup_retention_days", 0);
        assert!(!has_backup(&ctx(no_retention)));

        let replicated = Resource::new("c", "kubernetes_cluster", "aws").with_metadata("replicas", "3");
        assert!(has_high_availability(&ctx(replicated)));

        let weak = Resource::new("u", "iam_user", "aws").with_metadata("password_min_length", 8);
        assert!(!has_strong_authentication(&ctx(weak)));
    }

    #[test]
    fn test_neighbor_signals() {
        let trail = Resource::new("t", "cloudtrail", "aws");
        let logged = ctx(Resource::new("b", "s3_bucket", "aws"))
            .with_relationships(vec![Edge::new("t", "b", "watches")], vec![trail]);
        assert!(has_logging(&logged));
        assert!(!has_monitoring(&logged));
    }

    #[test]
    fn test_required_tags() {
        let partial = ctx(Resource::new("v", "ec2_instance", "aws").with_tag("owner", "ops"));
        assert!(!has_required_tags(&partial, REQUIRED_TAGS));
        assert!(has_some_required_tags(&partial, REQUIRED_TAGS));

        let full = ctx(
            Resource::new("v", "ec2_instance", "aws")
                .with_tag("owner", "ops")
                .with_tag("environment", "prod"),
        );
        assert!(has_required_tags(&full, REQUIRED_TAGS));

        let blank = ctx(Resource::new("v", "ec2_instance", "aws").with_tag("owner", " "));
        assert!(!has_some_required_tags(&blank, REQUIRED_TAGS));
    }

    #[test]
    fn test_versioning_and_access() {
        assert!(has_versioning(&ctx(
            Resource::new("b", "s3_bucket", "aws").with_metadata("versioning", "Enabled")
        )));
        assert!(!has_versioning(&ctx(
            Resource::new("b", "s3_bucket", "aws").with_metadata("versioning", "Suspended")
        )));

        let guarded = ctx(Resource::new("b", "s3_bucket", "aws"))
            .with_relationships(vec![Edge::new("b", "p", "has_policy")], Vec::new());
        assert!(has_access_control(&guarded));
    }
}
