//! Built-in control catalogs

use stackguard_policy::Severity;

use crate::heuristics::{self, REQUIRED_TAGS};
use crate::{ComplianceControl, ControlEvaluationContext, ControlStatus, Framework};

const STORAGE: &[&str] = &[
    "s3_bucket",
    "ebs_volume",
    "efs_file_system",
    "storage_account",
    "blob_container",
    "gcs_bucket",
];

const DATABASES: &[&str] = &[
    "rds_instance",
    "rds_cluster",
    "dynamodb_table",
    "database",
    "sql_database",
    "cosmosdb_account",
    "cloudsql_instance",
];

const DATA_STORES: &[&str] = &[
    "s3_bucket",
    "ebs_volume",
    "efs_file_system",
    "storage_account",
    "blob_container",
    "gcs_bucket",
    "rds_instance",
    "rds_cluster",
    "dynamodb_table",
    "database",
    "sql_database",
    "cosmosdb_account",
    "cloudsql_instance",
];

const COMPUTE: &[&str] = &[
    "ec2_instance",
    "virtual_machine",
    "compute_instance",
    "lambda_function",
    "kubernetes_cluster",
];

const NETWORKED: &[&str] = &[
    "ec2_instance",
    "virtual_machine",
    "compute_instance",
    "kubernetes_cluster",
    "rds_instance",
    "rds_cluster",
    "database",
    "sql_database",
    "cloudsql_instance",
];

const IDENTITIES: &[&str] = &["iam_user", "iam_role", "user", "service_account"];

const ACCESS_GUARDED: &[&str] = &[
    "s3_bucket",
    "storage_account",
    "gcs_bucket",
    "rds_instance",
    "dynamodb_table",
    "database",
    "iam_role",
    "service_account",
];

const LOGGED: &[&str] = &[
    "s3_bucket",
    "rds_instance",
    "database",
    "load_balancer",
    "vpc",
    "api_gateway",
    "ec2_instance",
    "virtual_machine",
];

const HIGHLY_AVAILABLE: &[&str] = &["rds_instance", "rds_cluster", "database", "load_balancer", "kubernetes_cluster"];

const VERSIONED: &[&str] = &["s3_bucket", "blob_container", "gcs_bucket"];

const EVERYTHING: &[&str] = &["*"];

/// Defines a status fn and a reason fn for a boolean heuristic
macro_rules! heuristic_check {
    ($status:ident, $reason:ident, $check:path, $pass:literal, $fail:literal) => {
        fn $status(ctx: &ControlEvaluationContext) -> ControlStatus {
            ControlStatus::from_check($check(ctx))
        }

        fn $reason(ctx: &ControlEvaluationContext, status: ControlStatus) -> String {
            match status {
                ControlStatus::Pass => format!("{} {}", ctx.node.id, $pass),
                _ => format!("{} {}", ctx.node.id, $fail),
            }
        }
    };
}

heuristic_check!(
    encryption_status,
    encryption_reason,
    heuristics::has_encryption,
    "is encrypted at rest",
    "has no encryption at rest (no encryption flag, key, edge, or tag)"
);
heuristic_check!(
    isolation_status,
    isolation_reason,
    heuristics::has_network_isolation,
    "is placed on a private network",
    "is publicly reachable or outside a private network"
);
heuristic_check!(
    logging_status,
    logging_reason,
    heuristics::has_logging,
    "has logging enabled",
    "has no access or audit logging"
);
heuristic_check!(
    backup_status,
    backup_reason,
    heuristics::has_backup,
    "is backed up",
    "has no backup or point-in-time recovery"
);
heuristic_check!(
    monitoring_status,
    monitoring_reason,
    heuristics::has_monitoring,
    "is monitored",
    "has no monitoring or alarms"
);
heuristic_check!(
    access_status,
    access_reason,
    heuristics::has_access_control,
    "is guarded by an access policy",
    "has no access policy, role binding, or security group"
);
heuristic_check!(
    availability_status,
    availability_reason,
    heuristics::has_high_availability,
    "is deployed redundantly",
    "runs without zone redundancy or replicas"
);
heuristic_check!(
    versioning_status,
    versioning_reason,
    heuristics::has_versioning,
    "has versioning enabled",
    "has versioning disabled"
);
heuristic_check!(
    authentication_status,
    authentication_reason,
    heuristics::has_strong_authentication,
    "requires strong authentication",
    "does not require MFA or a strong password policy"
);

fn tagging_status(ctx: &ControlEvaluationContext) -> ControlStatus {
    if heuristics::has_required_tags(ctx, REQUIRED_TAGS) {
        ControlStatus::Pass
    } else if heuristics::has_some_required_tags(ctx, REQUIRED_TAGS) {
        ControlStatus::Warning
    } else {
        ControlStatus::Fail
    }
}

fn tagging_reason(ctx: &ControlEvaluationContext, status: ControlStatus) -> String {
    let missing: Vec<&str> = REQUIRED_TAGS
        .iter()
        .copied()
        .filter(|t| ctx.tag(t).map_or(true, |v| v.trim().is_empty()))
        .collect();
    match status {
        ControlStatus::Pass => format!("{} carries all required tags", ctx.node.id),
        _ => format!("{} is missing tags: {}", ctx.node.id, missing.join(", ")),
    }
}

/// Builds a catalog entry; keeps the tables below readable
#[allow(clippy::too_many_arguments)]
const fn control(
    id: &'static str,
    framework: Framework,
    section: &'static str,
    title: &'static str,
    description: &'static str,
    severity: Severity,
    applicable_resource_types: &'static [&'static str],
    evaluate: crate::EvaluateFn,
    reason: crate::ReasonFn,
) -> ComplianceControl {
    ComplianceControl {
        id,
        framework,
        section,
        title,
        description,
        severity,
        applicable_resource_types,
        evaluate,
        reason,
    }
}

static SOC2: &[ComplianceControl] = &[
    control(
        "SOC2-CC6.1-ENC",
        Framework::Soc2,
        "CC6.1",
        "Encryption of data at rest",
        "Data stores encrypt stored data with managed keys",
        Severity::High,
        DATA_STORES,
        encryption_status,
        encryption_reason,
    ),
    control(
        "SOC2-CC6.1-IAM",
        Framework::Soc2,
        "CC6.1",
        "Logical access controls",
        "Access to data stores and roles is restricted by policy",
        Severity::High,
        ACCESS_GUARDED,
        access_status,
        access_reason,
    ),
    control(
        "SOC2-CC6.1-MFA",
        Framework::Soc2,
        "CC6.1",
        "Strong authentication",
        "Human identities authenticate with MFA or SSO",
        Severity::Critical,
        IDENTITIES,
        authentication_status,
        authentication_reason,
    ),
    control(
        "SOC2-CC6.6-NET",
        Framework::Soc2,
        "CC6.6",
        "Network boundary protection",
        "Workloads and databases sit behind a private network boundary",
        Severity::Medium,
        NETWORKED,
        isolation_status,
        isolation_reason,
    ),
    control(
        "SOC2-CC7.2-LOG",
        Framework::Soc2,
        "CC7.2",
        "System activity logging",
        "Security-relevant activity is logged",
        Severity::Medium,
        LOGGED,
        logging_status,
        logging_reason,
    ),
    control(
        "SOC2-CC7.2-MON",
        Framework::Soc2,
        "CC7.2",
        "System monitoring",
        "Compute and databases are monitored for anomalies",
        Severity::Medium,
        COMPUTE,
        monitoring_status,
        monitoring_reason,
    ),
    control(
        "SOC2-A1.2-BAK",
        Framework::Soc2,
        "A1.2",
        "Backup and recovery",
        "Databases are backed up and recoverable",
        Severity::High,
        DATABASES,
        backup_status,
        backup_reason,
    ),
    control(
        "SOC2-A1.2-HA",
        Framework::Soc2,
        "A1.2",
        "Availability",
        "Critical services run redundantly",
        Severity::Medium,
        HIGHLY_AVAILABLE,
        availability_status,
        availability_reason,
    ),
    control(
        "SOC2-CC1.3-TAG",
        Framework::Soc2,
        "CC1.3",
        "Asset ownership",
        "Every resource names its owner and environment",
        Severity::Low,
        EVERYTHING,
        tagging_status,
        tagging_reason,
    ),
];

static CIS: &[ComplianceControl] = &[
    control(
        "CIS-1.10",
        Framework::Cis,
        "1.10",
        "MFA for console users",
        "Multi-factor authentication is enabled for all users",
        Severity::Critical,
        IDENTITIES,
        authentication_status,
        authentication_reason,
    ),
    control(
        "CIS-2.1.1",
        Framework::Cis,
        "2.1.1",
        "Bucket encryption",
        "Object storage enforces server-side encryption",
        Severity::High,
        STORAGE,
        encryption_status,
        encryption_reason,
    ),
    control(
        "CIS-2.1.3",
        Framework::Cis,
        "2.1.3",
        "Bucket versioning",
        "Object storage keeps prior versions",
        Severity::Medium,
        VERSIONED,
        versioning_status,
        versioning_reason,
    ),
    control(
        "CIS-2.3.1",
        Framework::Cis,
        "2.3.1",
        "Database encryption",
        "Database storage is encrypted",
        Severity::High,
        DATABASES,
        encryption_status,
        encryption_reason,
    ),
    control(
        "CIS-3.1",
        Framework::Cis,
        "3.1",
        "Logging enabled",
        "Access and flow logging is enabled",
        Severity::Medium,
        LOGGED,
        logging_status,
        logging_reason,
    ),
    control(
        "CIS-5.2",
        Framework::Cis,
        "5.2",
        "No unrestricted ingress",
        "Instances and databases are not publicly reachable",
        Severity::High,
        NETWORKED,
        isolation_status,
        isolation_reason,
    ),
];

static HIPAA: &[ComplianceControl] = &[
    control(
        "HIPAA-164.312(a)(1)",
        Framework::Hipaa,
        "164.312(a)(1)",
        "Access control",
        "Only authorised identities can reach ePHI stores",
        Severity::High,
        ACCESS_GUARDED,
        access_status,
        access_reason,
    ),
    control(
        "HIPAA-164.312(a)(2)(iv)",
        Framework::Hipaa,
        "164.312(a)(2)(iv)",
        "Encryption and decryption",
        "ePHI at rest is encrypted",
        Severity::Critical,
        DATA_STORES,
        encryption_status,
        encryption_reason,
    ),
    control(
        "HIPAA-164.312(b)",
        Framework::Hipaa,
        "164.312(b)",
        "Audit controls",
        "Activity on systems holding ePHI is recorded",
        Severity::High,
        LOGGED,
        logging_status,
        logging_reason,
    ),
    control(
        "HIPAA-164.312(d)",
        Framework::Hipaa,
        "164.312(d)",
        "Person or entity authentication",
        "Identities are verified with strong authentication",
        Severity::High,
        IDENTITIES,
        authentication_status,
        authentication_reason,
    ),
    control(
        "HIPAA-164.312(e)(1)",
        Framework::Hipaa,
        "164.312(e)(1)",
        "Transmission security",
        "Systems holding ePHI are isolated from public networks",
        Severity::Medium,
        NETWORKED,
        isolation_status,
        isolation_reason,
    ),
    control(
        "HIPAA-164.308(a)(7)",
        Framework::Hipaa,
        "164.308(a)(7)",
        "Contingency plan",
        "ePHI stores are backed up",
        Severity::High,
        DATABASES,
        backup_status,
        backup_reason,
    ),
];

static PCI_DSS: &[ComplianceControl] = &[
    control(
        "PCI-1.3",
        Framework::PciDss,
        "1.3",
        "Restrict cardholder data environment access",
        "No direct public access to systems in the cardholder data environment",
        Severity::High,
        NETWORKED,
        isolation_status,
        isolation_reason,
    ),
    control(
        "PCI-3.4",
        Framework::PciDss,
        "3.4",
        "Render stored account data unreadable",
        "Stored cardholder data is encrypted",
        Severity::Critical,
        DATA_STORES,
        encryption_status,
        encryption_reason,
    ),
    control(
        "PCI-7.1",
        Framework::PciDss,
        "7.1",
        "Restrict access by need to know",
        "Access to cardholder data stores is limited by policy",
        Severity::High,
        ACCESS_GUARDED,
        access_status,
        access_reason,
    ),
    control(
        "PCI-8.3",
        Framework::PciDss,
        "8.3",
        "Multi-factor authentication",
        "Access into the cardholder data environment requires MFA",
        Severity::Critical,
        IDENTITIES,
        authentication_status,
        authentication_reason,
    ),
    control(
        "PCI-10.2",
        Framework::PciDss,
        "10.2",
        "Audit logs",
        "Audit logs capture access to system components",
        Severity::High,
        LOGGED,
        logging_status,
        logging_reason,
    ),
    control(
        "PCI-12.5.1",
        Framework::PciDss,
        "12.5.1",
        "Inventory of system components",
        "System components carry ownership and environment tags",
        Severity::Low,
        EVERYTHING,
        tagging_status,
        tagging_reason,
    ),
];

/// Built-in controls for a framework
pub fn controls_for(framework: Framework) -> &'static [ComplianceControl] {
    match framework {
        Framework::Soc2 => SOC2,
        Framework::Cis => CIS,
        Framework::Hipaa => HIPAA,
        Framework::PciDss => PCI_DSS,
    }
}
